//! Runtime configuration loaded from the environment (and an optional `.env`).
//!
//! Training options live in [`crate::training::TrainConfig`]; this module only
//! covers process-level settings.

use std::env;
use std::path::{Path, PathBuf};

use crate::common::error::{RealtyError, RealtyResult};

/// Output format of the log subscriber.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Snapshot of configuration values consumed by the core.
#[derive(Clone, Debug)]
pub struct AppCfg {
    pub data_root: PathBuf,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            log_filter: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl AppCfg {
    /// Create a configuration snapshot from the process environment.
    ///
    /// Recognised variables:
    /// - `REALTY_DATA_ROOT`: root directory for artifacts (default `./data`)
    /// - `REALTY_LOG`: `EnvFilter` directive (default `info`)
    /// - `REALTY_LOG_FORMAT`: `json` or `pretty` (default `json`)
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when a variable holds an unusable value.
    pub fn load() -> RealtyResult<Self> {
        dotenvy::dotenv().ok();

        fn env_or(key: &str, default: &str) -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        }

        let log_format = match env_or("REALTY_LOG_FORMAT", "json").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(RealtyError::config(
                    "REALTY_LOG_FORMAT",
                    format!("expected `json` or `pretty`, got `{other}`"),
                ))
            }
        };

        let cfg = Self {
            data_root: PathBuf::from(env_or("REALTY_DATA_ROOT", "./data")),
            log_filter: env_or("REALTY_LOG", "info"),
            log_format,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Configuration rooted at an explicit directory, everything else default.
    pub fn with_data_root(root: impl AsRef<Path>) -> Self {
        Self {
            data_root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> RealtyResult<()> {
        if self.data_root.as_os_str().is_empty() {
            return Err(RealtyError::config("data_root", "must not be empty"));
        }
        if self.log_filter.trim().is_empty() {
            return Err(RealtyError::config("log_filter", "must not be empty"));
        }
        Ok(())
    }

    /// Directory holding persisted model artifacts.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.data_root.join("artifacts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_is_valid() {
        let cfg = AppCfg::with_data_root("/tmp/realty");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.artifacts_dir(), PathBuf::from("/tmp/realty/artifacts"));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn empty_root_is_rejected() {
        let cfg = AppCfg::with_data_root("");
        assert!(matches!(
            cfg.validate(),
            Err(RealtyError::InvalidConfig { name: "data_root", .. })
        ));
    }
}
