//! On-demand installation of missing tool packages.
//!
//! Only meaningful under the unprivileged mobile profile, where the Termux
//! package manager is assumed reachable. The healer never retries an
//! install and never removes packages; installing software on the host is a
//! side effect that is always logged.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::invoke::{InvokeError, ToolInvoker, accept_any};
use crate::probe::ExecutionProfile;

/// Root of the Termux installation; its presence is required before any
/// install is attempted.
pub const TERMUX_ROOT: &str = "/data/data/com.termux";

/// Result of a remediation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    /// The providing package was installed; the caller should retry once.
    Remediated,
    /// No remediation was possible or the install failed.
    NotRemediated,
}

/// Maps a missing tool to the package that provides it.
pub fn package_for(tool: &str) -> Option<&'static str> {
    match tool {
        "termux-bluetooth-scan" | "termux-bluetooth-connect" | "termux-microphone-record"
        | "termux-telephony-deviceinfo" => Some("termux-api"),
        "bluetoothctl" | "btmgmt" | "hcitool" | "hciconfig" | "sdptool" | "l2ping" => {
            Some("bluez")
        }
        "pactl" | "parecord" | "paplay" => Some("pulseaudio"),
        "obexftp" => Some("obexftp"),
        "rfkill" => Some("util-linux"),
        _ => None,
    }
}

/// Decides whether a missing tool can be installed on demand and performs
/// the single install attempt.
#[derive(Debug)]
pub struct DependencyHealer {
    profile: ExecutionProfile,
    termux_root: PathBuf,
}

impl DependencyHealer {
    /// Create a healer for the given execution profile.
    pub fn new(profile: ExecutionProfile) -> Self {
        Self {
            profile,
            termux_root: PathBuf::from(TERMUX_ROOT),
        }
    }

    /// Override the Termux root location (tests).
    pub fn with_termux_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.termux_root = root.into();
        self
    }

    /// Whether this environment supports on-demand installation at all.
    pub fn enabled(&self) -> bool {
        self.profile == ExecutionProfile::UnprivilegedMobile && Path::new(&self.termux_root).exists()
    }

    /// Attempt to install the package providing `tool`, once.
    ///
    /// Returns [`Remediation::Remediated`] only if the install command ran
    /// successfully; the caller is then expected to retry the original
    /// invocation exactly once.
    pub fn attempt(&self, invoker: &dyn ToolInvoker, tool: &str) -> Remediation {
        if !self.enabled() {
            return Remediation::NotRemediated;
        }

        let Some(package) = package_for(tool) else {
            return Remediation::NotRemediated;
        };

        info!("auto-heal: `{tool}` missing, installing package `{package}`");
        match invoker.invoke("pkg", &["install", package, "-y"], accept_any) {
            Ok(_) => {
                info!("auto-heal: installed `{package}`, retrying operation");
                Remediation::Remediated
            }
            Err(InvokeError::ToolMissing { .. }) => {
                warn!("auto-heal: package manager not found, cannot install `{package}`");
                Remediation::NotRemediated
            }
            Err(e) => {
                warn!("auto-heal: failed to install `{package}`: {e}");
                Remediation::NotRemediated
            }
        }
    }
}
