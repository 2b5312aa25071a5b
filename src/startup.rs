//! Startup initialization: tracing and the probe-and-bootstrap path.
//!
//! Embedding callers (the CLI or a network frontend) call
//! [`init_tracing`] once, then [`bootstrap`] to probe the host, resolve
//! the execution profile, and get a ready [`Session`].

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::OpsConfig;
use crate::probe::BackendSelector;
use crate::session::Session;

/// Initialise the global tracing subscriber.
///
/// Filter via `RUST_LOG`; defaults to `info`. Safe to call more than once —
/// later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Load the config (if present), probe the environment, and build a
/// session.
///
/// `operator_confirms_mobile` carries the operator's answer for the
/// ambiguous probe outcome; pass `None` when nobody asked.
///
/// # Errors
///
/// Returns an error only if an existing config file cannot be parsed; a
/// missing config file falls back to defaults.
pub fn bootstrap(operator_confirms_mobile: Option<bool>) -> anyhow::Result<Session> {
    let config_path = OpsConfig::default_config_path();
    let config = if config_path.exists() {
        OpsConfig::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        OpsConfig::default()
    };

    let selector = BackendSelector::detect(operator_confirms_mobile);
    info!("resolved execution profile: {}", selector.current_profile());
    Ok(Session::new(config, selector))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn bootstrap_resolves_some_profile() {
        let session = bootstrap(None).unwrap();
        // Whatever the host looks like, a profile is always resolved.
        let _ = session.profile();
    }
}
