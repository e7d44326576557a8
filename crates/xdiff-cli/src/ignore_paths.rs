//! Merges `--ignore-paths` with the newline-delimited `--ignore-paths-file`
//! (SUPPLEMENT 3).

use std::path::Path;

use crate::error::{CliError, Result};

pub fn collect(flag_paths: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut paths = flag_paths.to_vec();
    if let Some(file) = file {
        let contents = std::fs::read_to_string(file).map_err(|source| CliError::Io {
            path: file.display().to_string(),
            source,
        })?;
        for line in contents.lines() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') {
                paths.push(line.to_string());
            }
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_flag_and_file_paths_skipping_blanks_and_comments() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "metadata.labels[foo]\n\n# a comment\nspec.size\n").unwrap();
        let merged = collect(&["metadata.annotations[bar]".to_string()], Some(file.path())).unwrap();
        assert_eq!(
            merged,
            vec!["metadata.annotations[bar]", "metadata.labels[foo]", "spec.size"]
        );
    }

    #[test]
    fn no_file_just_returns_flag_paths() {
        let merged = collect(&["a".to_string()], None).unwrap();
        assert_eq!(merged, vec!["a".to_string()]);
    }
}
