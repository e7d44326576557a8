//! Kubeconfig/REST-config bootstrap (§1 external collaborator): build the
//! `kube::Client` the live `ClusterClients` bundle wraps, honoring
//! `--context`.

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::error::Result;

pub async fn client(context: Option<&str>) -> Result<Client> {
    let Some(context) = context else {
        return Ok(Client::try_default().await?);
    };

    let kubeconfig = Kubeconfig::read()?;
    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..Default::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
    Ok(Client::try_from(config)?)
}
