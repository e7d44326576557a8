//! Parses the `--function-credentials` local-testing override file
//! (SUPPLEMENT 5): a YAML map of `secretRef.name -> namespace`.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{CliError, Result};

pub fn load(path: Option<&Path>) -> Result<HashMap<String, String>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let overrides: HashMap<String, String> = serde_yaml::from_str(&contents).map_err(xdiff_core::CoreError::from)?;
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_secret_name_to_namespace_map() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "cloud-provider-creds: local-testing\nother-creds: team-a\n").unwrap();
        let overrides = load(Some(file.path())).unwrap();
        assert_eq!(overrides.get("cloud-provider-creds").map(String::as_str), Some("local-testing"));
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn absent_path_yields_empty_map() {
        assert!(load(None).unwrap().is_empty());
    }
}
