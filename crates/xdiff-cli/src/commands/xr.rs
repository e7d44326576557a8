//! `xdiff xr`: diff candidate XRs/Claims loaded from disk against the live
//! cluster (§1, §6.2).

use std::sync::Arc;

use xdiff_client::{ClusterClients, RequestBudget};
use xdiff_pipeline::Processor;
use xdiff_render::{GlobalRenderLock, RenderDriver};

use crate::cli::{CommonArgs, XrArgs};
use crate::error::Result;
use crate::{bootstrap, commands, credentials, input};

pub async fn run(args: XrArgs, common: &CommonArgs) -> Result<i32> {
    let kube_client = bootstrap::client(common.context.as_deref()).await?;
    let clients = Arc::new(ClusterClients::new(
        kube_client,
        RequestBudget { qps: common.qps, burst: common.burst },
    ));

    let resources = input::load_paths(&args.paths)?;
    let mut xrs = Vec::with_capacity(resources.len());
    for resource in resources {
        xrs.push(input::resolve_to_xr(resource, clients.as_ref()).await?);
    }

    let credential_overrides = credentials::load(common.function_credentials.as_deref())?;
    let config = commands::processor_config(common, credential_overrides)?;

    let driver = Arc::new(RenderDriver::new(commands::renderer(common), GlobalRenderLock::new(), clients.clone()));
    let processor = Processor::new(clients, driver, config);

    let report = processor.process(xrs).await;
    commands::print_report(&report, common)
}
