//! Centralized application directory paths.
//!
//! Single source of truth for the filesystem locations used by the crate:
//! the config file, recordings, and situation reports. Uses the [`dirs`]
//! crate for platform-appropriate resolution.
//!
//! All paths can be overridden for testing or custom deployments:
//! - `KELPIE_DATA_DIR` — overrides [`data_dir`]
//! - `KELPIE_CONFIG_DIR` — overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Default location for recordings and situation reports when the caller
/// does not name an output path. Resolves to `dirs::data_dir()/kelpie/`;
/// override with `KELPIE_DATA_DIR`.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("KELPIE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("kelpie"))
        .unwrap_or_else(|| PathBuf::from("/tmp/kelpie-data"))
}

/// Application config directory.
///
/// Holds `config.toml`. Resolves to `dirs::config_dir()/kelpie/`; override
/// with `KELPIE_CONFIG_DIR`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("KELPIE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("kelpie"))
        .unwrap_or_else(|| PathBuf::from("/tmp/kelpie-config"))
}
