//! Logging setup on top of `tracing`.
//!
//! Events are emitted as JSON lines by default so they can be shipped as-is;
//! call sites attach structured fields (`artifact_id`, `dur_ms`, ...).

use tracing_subscriber::EnvFilter;

use crate::common::config::{AppCfg, LogFormat};

/// Install the global subscriber. Returns `false` when one was already set.
pub fn init(cfg: &AppCfg) -> bool {
    let filter = EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match cfg.log_format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    }
}
