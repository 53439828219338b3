use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

pub(crate) const CONFIG_ENV_VAR: &str = "RPG_SERVER_CONFIG";
pub(crate) const ENABLED_MODS_ENV_VAR: &str = "RPG_ENABLED_MODS";
pub(crate) const MAX_TURNS_ENV_VAR: &str = "RPG_MAX_TURNS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub(crate) struct ServerConfig {
    pub(crate) turn_duration_ms: u64,
    pub(crate) max_turns_per_frame: u32,
    pub(crate) metrics_interval_secs: u64,
    /// Stop after this many turns; unset runs until `quit`.
    pub(crate) max_turns: Option<u64>,
    /// Relative paths resolve against the project root.
    pub(crate) script_dir: PathBuf,
    pub(crate) enabled_mods: Vec<String>,
    pub(crate) start_zone: String,
    pub(crate) console: bool,
    pub(crate) rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            turn_duration_ms: 300,
            max_turns_per_frame: 5,
            metrics_interval_secs: 10,
            max_turns: None,
            script_dir: PathBuf::from("data").join("script"),
            enabled_mods: Vec::new(),
            start_zone: "0_semos_city".to_string(),
            console: true,
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    pub(crate) fn turn_duration(&self) -> Duration {
        normalize_non_zero_duration(
            Duration::from_millis(self.turn_duration_ms),
            Duration::from_millis(300),
        )
    }

    pub(crate) fn metrics_interval(&self) -> Duration {
        normalize_non_zero_duration(
            Duration::from_secs(self.metrics_interval_secs),
            Duration::from_secs(10),
        )
    }

    pub(crate) fn resolved_script_dir(&self, root: &Path) -> PathBuf {
        if self.script_dir.is_absolute() {
            self.script_dir.clone()
        } else {
            root.join(&self.script_dir)
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read server config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid server config {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Defaults, then the JSON file named by `RPG_SERVER_CONFIG`, then env overrides.
pub(crate) fn load_config() -> Result<ServerConfig, ConfigError> {
    let mut config = match env::var(CONFIG_ENV_VAR) {
        Ok(path) => {
            let path = PathBuf::from(path);
            let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let config = parse_config(&path, &raw)?;
            info!(path = %path.display(), "server_config_loaded");
            config
        }
        Err(env::VarError::NotPresent) => ServerConfig::default(),
        Err(error) => {
            warn!(
                env_var = CONFIG_ENV_VAR,
                error = %error,
                "unable to read config env var; using defaults"
            );
            ServerConfig::default()
        }
    };

    apply_env_overrides(&mut config, |name| env::var(name));
    Ok(config)
}

pub(crate) fn parse_config(path: &Path, raw: &str) -> Result<ServerConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, ServerConfig>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        ConfigError::Parse {
            path: path.to_path_buf(),
            field: if field.is_empty() { ".".to_string() } else { field },
            source: error.into_inner(),
        }
    })
}

pub(crate) fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F)
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(ENABLED_MODS_ENV_VAR) {
        Ok(raw) => config.enabled_mods = parse_enabled_mods(&raw),
        Err(env::VarError::NotPresent) => {}
        Err(error) => warn!(
            env_var = ENABLED_MODS_ENV_VAR,
            error = %error,
            "unable to read enabled-mods env var; keeping config value"
        ),
    }

    match lookup(MAX_TURNS_ENV_VAR) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(turns) => config.max_turns = Some(turns),
            Err(_) => warn!(
                env_var = MAX_TURNS_ENV_VAR,
                value = raw.as_str(),
                "invalid max-turns env var value; falling back to config"
            ),
        },
        Err(env::VarError::NotPresent) => {}
        Err(error) => warn!(
            env_var = MAX_TURNS_ENV_VAR,
            error = %error,
            "unable to read max-turns env var; falling back to config"
        ),
    }
}

fn parse_enabled_mods(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            Path::new("server.json"),
            r#"{ "turnDurationMs": 100, "enabledMods": ["atlantis_extra"] }"#,
        )
        .expect("parse");
        assert_eq!(config.turn_duration(), Duration::from_millis(100));
        assert_eq!(config.enabled_mods, vec!["atlantis_extra"]);
        assert_eq!(config.max_turns_per_frame, 5);
        assert_eq!(config.start_zone, "0_semos_city");
    }

    #[test]
    fn parse_error_names_the_field() {
        let error = parse_config(
            Path::new("server.json"),
            r#"{ "maxTurnsPerFrame": "many" }"#,
        )
        .expect_err("wrong type");
        match error {
            ConfigError::Parse { field, .. } => assert_eq!(field, "maxTurnsPerFrame"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(parse_config(Path::new("server.json"), r#"{ "tps": 3 }"#).is_err());
    }

    #[test]
    fn env_overrides_apply_and_invalid_values_fall_back() {
        let mut config = ServerConfig {
            max_turns: Some(7),
            ..ServerConfig::default()
        };
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                (ENABLED_MODS_ENV_VAR, " base_extra , ,night "),
                (MAX_TURNS_ENV_VAR, "soon"),
            ]),
        );
        assert_eq!(config.enabled_mods, vec!["base_extra", "night"]);
        assert_eq!(config.max_turns, Some(7));

        apply_env_overrides(&mut config, lookup_from(&[(MAX_TURNS_ENV_VAR, "40")]));
        assert_eq!(config.max_turns, Some(40));
    }

    #[test]
    fn zero_durations_fall_back_and_script_dir_resolves() {
        let config = ServerConfig {
            turn_duration_ms: 0,
            metrics_interval_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.turn_duration(), Duration::from_millis(300));
        assert_eq!(config.metrics_interval(), Duration::from_secs(10));
        assert_eq!(
            config.resolved_script_dir(Path::new("/srv/rpg")),
            PathBuf::from("/srv/rpg/data/script")
        );
    }
}
