use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::AppPaths;

#[derive(Debug, Clone, Default)]
pub struct ContentRequest {
    pub enabled_mods: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ContentDiscoveryError {
    #[error("enabled mod list contains an empty mod id")]
    EmptyEnabledMod,
    #[error("enabled mod '{mod_id}' is listed more than once")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod '{mod_id}' not found at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub source_dir: PathBuf,
}

pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<Vec<ModSource>, ContentDiscoveryError> {
    let mut seen = HashSet::<String>::new();
    let mut sources = vec![ModSource {
        mod_id: "base".to_string(),
        source_dir: app_paths.base_content_dir.clone(),
    }];

    for mod_id in &request.enabled_mods {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentDiscoveryError::EmptyEnabledMod);
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(ContentDiscoveryError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = app_paths.mods_dir.join(trimmed);
        ensure_dir_exists(trimmed, &mod_dir)?;
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}

fn ensure_dir_exists(mod_id: &str, path: &Path) -> Result<(), ContentDiscoveryError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ContentDiscoveryError::EnabledModMissing {
            mod_id: mod_id.to_string(),
            expected_dir: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn base_is_first_then_enabled_order() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = AppPaths::under(temp.path());
        fs::create_dir_all(&app_paths.base_content_dir).expect("create base");
        fs::create_dir_all(app_paths.mods_dir.join("b")).expect("create mod b");
        fs::create_dir_all(app_paths.mods_dir.join("a")).expect("create mod a");
        let request = ContentRequest {
            enabled_mods: vec!["b".to_string(), "a".to_string()],
        };

        let sources = discover_mod_sources(&app_paths, &request).expect("discover");
        let ids = sources
            .iter()
            .map(|source| source.mod_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["base", "b", "a"]);
    }

    #[test]
    fn duplicate_and_empty_mod_ids_are_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = AppPaths::under(temp.path());
        fs::create_dir_all(app_paths.mods_dir.join("a")).expect("create mod a");

        let duplicate = ContentRequest {
            enabled_mods: vec!["a".to_string(), " a ".to_string()],
        };
        assert!(matches!(
            discover_mod_sources(&app_paths, &duplicate),
            Err(ContentDiscoveryError::DuplicateEnabledMod { .. })
        ));

        let empty = ContentRequest {
            enabled_mods: vec!["  ".to_string()],
        };
        assert!(matches!(
            discover_mod_sources(&app_paths, &empty),
            Err(ContentDiscoveryError::EmptyEnabledMod)
        ));
    }
}
