use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod combat;
pub mod content;
pub mod entity;
pub mod metrics;
pub mod npc;
pub mod persistence;
pub mod scripting;
pub mod turn;
pub mod world;

pub use content::{
    compile_def_database, ContentCompileError, ContentErrorCode, ContentRequest, DefDatabase,
    SourceLocation,
};
pub use entity::{EntityId, Player, ZoneId};
pub use metrics::{TurnMetrics, TurnMetricsAccumulator, TurnMetricsSnapshot};
pub use scripting::{ScriptEnvironment, ScriptModule};
pub use turn::TurnNotifier;
pub use world::{CombatEvent, TurnAction, TurnReport, World};

pub const ROOT_ENV_VAR: &str = "RPG_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub script_dir: PathBuf,
    pub save_dir: PathBuf,
}

impl AppPaths {
    /// The standard layout below `root`; nothing is created.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            base_content_dir: root.join("assets").join("base"),
            mods_dir: root.join("mods"),
            script_dir: root.join("data").join("script"),
            save_dir: root.join("saves"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "RPG_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/server\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let paths = AppPaths::under(resolve_root()?);

    fs::create_dir_all(&paths.save_dir).map_err(|source| StartupError::CreateSaveDir {
        path: paths.save_dir.clone(),
        source,
    })?;

    Ok(paths)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(!is_repo_marker(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn layout_under_root() {
        let paths = AppPaths::under("/srv/rpg");
        assert_eq!(paths.base_content_dir, PathBuf::from("/srv/rpg/assets/base"));
        assert_eq!(paths.script_dir, PathBuf::from("/srv/rpg/data/script"));
        assert_eq!(paths.save_dir, PathBuf::from("/srv/rpg/saves"));
    }
}
