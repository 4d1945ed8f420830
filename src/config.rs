//! Resolved runtime settings: defaults < config file < command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::Args;
use crate::store::DEFAULT_STORE_PATH;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 2;

/// Optional TOML config file. Every field may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub mode: Option<String>,
    pub role_a: Option<String>,
    pub role_b: Option<String>,
    pub max_iterations: Option<u32>,
    pub message_delay_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub metrics_interval_secs: Option<u64>,
    pub export_dir: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
}

impl FileConfig {
    /// Parse a TOML config file. Unknown keys are ignored.
    pub fn load(path: &Path) -> Result<FileConfig, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
        toml::from_str(&text).map_err(|e| format!("cannot parse config {}: {e}", path.display()))
    }
}

/// Fully resolved settings the rest of the program runs on.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub mode: String,
    pub role_a: String,
    pub role_b: String,
    pub max_iterations: u32,
    pub message_delay: Duration,
    pub poll_interval: Duration,
    pub metrics_interval: Duration,
    pub export_dir: PathBuf,
    pub store_path: PathBuf,
    /// Objective passed on the command line, overriding the stored one.
    pub objective: Option<String>,
}

impl Settings {
    /// Merge flags over the file config over the built-in defaults.
    pub fn resolve(args: &Args, file: &FileConfig) -> Settings {
        Settings {
            base_url: args
                .base_url
                .clone()
                .or_else(|| file.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            mode: args
                .mode
                .clone()
                .or_else(|| file.mode.clone())
                .unwrap_or_else(|| "specialized".to_string()),
            role_a: args
                .role_a
                .clone()
                .or_else(|| file.role_a.clone())
                .unwrap_or_else(|| "controller".to_string()),
            role_b: args
                .role_b
                .clone()
                .or_else(|| file.role_b.clone())
                .unwrap_or_else(|| "executor".to_string()),
            max_iterations: args.max_iterations.or(file.max_iterations).unwrap_or(10),
            message_delay: Duration::from_secs(
                args.message_delay.or(file.message_delay_secs).unwrap_or(3),
            ),
            poll_interval: Duration::from_secs(
                args.poll_interval
                    .or(file.poll_interval_secs)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            metrics_interval: Duration::from_secs(
                args.metrics_interval
                    .or(file.metrics_interval_secs)
                    .unwrap_or(DEFAULT_METRICS_INTERVAL_SECS),
            ),
            export_dir: args
                .export_dir
                .clone()
                .or_else(|| file.export_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            store_path: args
                .store
                .clone()
                .or_else(|| file.store_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            objective: args.objective.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args_from(argv: &[&str]) -> Args {
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let settings = Settings::resolve(&args_from(&["ai-bridge"]), &FileConfig::default());
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.mode, "specialized");
        assert_eq!(settings.role_a, "controller");
        assert_eq!(settings.role_b, "executor");
        assert_eq!(settings.max_iterations, 10);
        assert_eq!(settings.message_delay, Duration::from_secs(3));
        assert_eq!(settings.poll_interval, Duration::from_secs(3));
        assert_eq!(settings.metrics_interval, Duration::from_secs(2));
        assert_eq!(settings.export_dir, PathBuf::from("."));
        assert_eq!(settings.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        assert!(settings.objective.is_none());
    }

    #[test]
    fn file_config_overrides_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            base_url = "http://10.0.0.2:8000"
            max_iterations = 50
            poll_interval_secs = 7
            "#,
        )
        .unwrap();
        let settings = Settings::resolve(&args_from(&["ai-bridge"]), &file);
        assert_eq!(settings.base_url, "http://10.0.0.2:8000");
        assert_eq!(settings.max_iterations, 50);
        assert_eq!(settings.poll_interval, Duration::from_secs(7));
        // untouched fields keep defaults
        assert_eq!(settings.metrics_interval, Duration::from_secs(2));
    }

    #[test]
    fn flags_override_file_config() {
        let file: FileConfig = toml::from_str(r#"base_url = "http://from-file:8000""#).unwrap();
        let args = args_from(&["ai-bridge", "--base-url", "http://from-flag:8000"]);
        let settings = Settings::resolve(&args, &file);
        assert_eq!(settings.base_url, "http://from-flag:8000");
    }

    #[test]
    fn objective_flag_carried_through() {
        let args = args_from(&["ai-bridge", "--objective", "ship the demo"]);
        let settings = Settings::resolve(&args, &FileConfig::default());
        assert_eq!(settings.objective.as_deref(), Some("ship the demo"));
    }

    #[test]
    fn empty_toml_parses_to_all_none() {
        let file: FileConfig = toml::from_str("").unwrap();
        assert!(file.base_url.is_none());
        assert!(file.max_iterations.is_none());
    }

    #[test]
    fn load_missing_config_file_errors() {
        let err = FileConfig::load(Path::new("/nonexistent/ai-bridge.toml")).unwrap_err();
        assert!(err.contains("cannot read config"));
    }

    #[test]
    fn load_parses_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "role_a = \"executor\"\nrole_b = \"controller\"\n").unwrap();
        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.role_a.as_deref(), Some("executor"));
        assert_eq!(file.role_b.as_deref(), Some("controller"));
    }
}
