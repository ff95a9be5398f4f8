//! Layered configuration: CLI flags (with env-var fallback via `clap`'s
//! `env` feature) over an optional TOML config file over built-in
//! defaults (SPEC_FULL.md §10.3), grounded on the teacher's `Cli` struct
//! in `crates/app/src/main.rs` and its `Settings` layering idiom.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use sidecar_foundation::error::ConfigError;
use sidecar_stt::types::ModelSize;

#[derive(Parser, Debug)]
#[command(name = "sidecar", author, version, about = "Speech-to-text sidecar process")]
pub struct Cli {
    /// Run STT model discovery/loading in offline mode only (SPEC_FULL.md §4.4/§4.5).
    #[arg(long, env = "SIDECAR_OFFLINE")]
    pub offline: bool,

    /// Idle timeout for stdin reads, in seconds (SPEC_FULL.md §4.1).
    #[arg(long, env = "SIDECAR_IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Resource monitor tick interval, in seconds (SPEC_FULL.md §4.5).
    #[arg(long, env = "SIDECAR_MONITOR_INTERVAL_SECS")]
    pub monitor_interval_secs: Option<u64>,

    /// Overrides the startup model-size selection (SPEC_FULL.md §4.5).
    #[arg(long, env = "SIDECAR_MODEL_SIZE")]
    pub model_size: Option<String>,

    /// Directory for rotating daily log files (SPEC_FULL.md §10.1).
    #[arg(long, env = "SIDECAR_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to an optional TOML config file (SPEC_FULL.md §10.3).
    #[arg(long, env = "SIDECAR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// A parsed TOML config file's contents. Every field is optional: CLI flags
/// and environment variables (via `clap`'s `env` feature, which already
/// takes precedence over `Cli`'s field defaults) override these, and these
/// override the built-in defaults in [`Settings::default`].
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub offline: Option<bool>,
    pub idle_timeout_secs: Option<u64>,
    pub monitor_interval_secs: Option<u64>,
    pub model_size: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Fully resolved, validated settings the rest of the process reads from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub offline: bool,
    pub idle_timeout_secs: u64,
    pub monitor_interval_secs: u64,
    pub model_size_override: Option<ModelSize>,
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            offline: false,
            idle_timeout_secs: 10,
            monitor_interval_secs: 30,
            model_size_override: None,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Settings {
    /// Layers `cli` over an optional config file at `cli.config` over
    /// [`Settings::default`], in CLI > env > config file > default
    /// precedence (env is already folded into `cli`'s fields by `clap`).
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();

        if let Some(path) = &cli.config {
            let file = read_config_file(path)?;
            apply_config_file(&mut settings, file);
        }

        if cli.offline {
            settings.offline = true;
        }
        if let Some(secs) = cli.idle_timeout_secs {
            settings.idle_timeout_secs = secs;
        }
        if let Some(secs) = cli.monitor_interval_secs {
            settings.monitor_interval_secs = secs;
        }
        if let Some(size) = &cli.model_size {
            settings.model_size_override = Some(parse_model_size(size)?);
        }
        if let Some(dir) = &cli.log_dir {
            settings.log_dir = dir.clone();
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Eager startup validation (SPEC_FULL.md §10.3): a failure here is
    /// fatal, not a warning, so the process refuses to start rather than
    /// run with a nonsensical configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor_interval_secs == 0 {
            return Err(ConfigError::Validation {
                field: "monitor_interval_secs".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "idle_timeout_secs".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

fn apply_config_file(settings: &mut Settings, file: ConfigFile) {
    if let Some(offline) = file.offline {
        settings.offline = offline;
    }
    if let Some(secs) = file.idle_timeout_secs {
        settings.idle_timeout_secs = secs;
    }
    if let Some(secs) = file.monitor_interval_secs {
        settings.monitor_interval_secs = secs;
    }
    if let Some(size) = &file.model_size {
        if let Ok(parsed) = parse_model_size(size) {
            settings.model_size_override = Some(parsed);
        }
    }
    if let Some(dir) = file.log_dir {
        settings.log_dir = dir;
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Parse(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse(format!("invalid TOML in {}: {e}", path.display())))
}

fn parse_model_size(raw: &str) -> Result<ModelSize, ConfigError> {
    ModelSize::parse(raw).ok_or_else(|| ConfigError::Validation {
        field: "model_size".to_string(),
        reason: format!("'{raw}' is not a recognized model size"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            offline: false,
            idle_timeout_secs: None,
            monitor_interval_secs: None,
            model_size: None,
            log_dir: None,
            config: None,
        }
    }

    #[test]
    fn defaults_match_spec_when_nothing_is_overridden() {
        let settings = Settings::resolve(&base_cli()).unwrap();
        assert!(!settings.offline);
        assert_eq!(settings.idle_timeout_secs, 10);
        assert_eq!(settings.monitor_interval_secs, 30);
        assert_eq!(settings.model_size_override, None);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let mut cli = base_cli();
        cli.offline = true;
        cli.monitor_interval_secs = Some(5);
        cli.model_size = Some("small".to_string());
        let settings = Settings::resolve(&cli).unwrap();
        assert!(settings.offline);
        assert_eq!(settings.monitor_interval_secs, 5);
        assert_eq!(settings.model_size_override, Some(ModelSize::Small));
    }

    #[test]
    fn zero_monitor_interval_fails_validation() {
        let mut cli = base_cli();
        cli.monitor_interval_secs = Some(0);
        let err = Settings::resolve(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { field, .. } if field == "monitor_interval_secs"));
    }

    #[test]
    fn unrecognized_model_size_fails_validation() {
        let mut cli = base_cli();
        cli.model_size = Some("huge".to_string());
        let err = Settings::resolve(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { field, .. } if field == "model_size"));
    }

    #[test]
    fn config_file_values_are_overridden_by_cli() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("sidecar.toml");
        std::fs::write(&config_path, "monitor_interval_secs = 45\noffline = true\n").unwrap();

        let mut cli = base_cli();
        cli.config = Some(config_path);
        cli.monitor_interval_secs = Some(15);
        let settings = Settings::resolve(&cli).unwrap();
        assert_eq!(settings.monitor_interval_secs, 15, "CLI must win over config file");
        assert!(settings.offline, "config file value kept when CLI doesn't override it");
    }
}
