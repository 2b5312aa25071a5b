//! Host environment probing and execution-profile selection.
//!
//! Probes the fixed checklist of external tools once, classifies the host
//! into one of three execution profiles, and exposes the resolved profile
//! plus per-tool capability answers for the lifetime of the process. The
//! profile is never recomputed mid-run.

use std::fmt;
use std::path::Path;

use tracing::{info, warn};

/// External tools required for the full privileged desktop stack.
pub const REQUIRED_TOOLS: &[&str] = &[
    "bluetoothctl",
    "btmgmt",
    "pactl",
    "parecord",
    "paplay",
    "hcitool",
    "sdptool",
    "obexftp",
];

/// The mobile API scanner binary, probed both on PATH and at the fixed
/// Termux install location.
pub const MOBILE_SCAN_TOOL: &str = "termux-bluetooth-scan";

/// Fixed binary directory of the Termux installation.
pub const TERMUX_BIN_DIR: &str = "/data/data/com.termux/files/usr/bin";

/// Resolved capability tier of the current host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionProfile {
    /// Full desktop stack (BlueZ + PulseAudio), typically elevated.
    Privileged,
    /// Non-rooted mobile host driving the Termux API layer.
    UnprivilegedMobile,
    /// No usable radio stack; operations are synthesized.
    Simulated,
}

impl fmt::Display for ExecutionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Privileged => "privileged",
            Self::UnprivilegedMobile => "unprivileged-mobile",
            Self::Simulated => "simulated",
        };
        write!(f, "{name}")
    }
}

/// Snapshot of one probe pass over the host.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Whether the host OS can drive the desktop radio stack at all.
    pub platform_supported: bool,
    /// Whether the mobile API scanner is present (PATH or fixed location).
    pub mobile_api: bool,
    /// Checklist tools not found on the search path.
    pub missing: Vec<String>,
}

/// Probes the host for the tool checklist and platform identity.
#[derive(Debug, Default)]
pub struct EnvironmentProbe;

impl EnvironmentProbe {
    /// Run one probe pass.
    pub fn run() -> ProbeReport {
        let platform_supported = std::env::consts::OS != "windows";

        let missing: Vec<String> = REQUIRED_TOOLS
            .iter()
            .filter(|tool| which::which(tool).is_err())
            .map(|tool| (*tool).to_owned())
            .collect();

        let mobile_api = which::which(MOBILE_SCAN_TOOL).is_ok()
            || Path::new(TERMUX_BIN_DIR).join(MOBILE_SCAN_TOOL).exists();

        ProbeReport {
            platform_supported,
            mobile_api,
            missing,
        }
    }
}

/// Classify a probe report into an execution profile.
///
/// Pure function of its inputs, in priority order:
/// 1. unsupported platform → `Simulated`
/// 2. mobile scanner present → `UnprivilegedMobile`
/// 3. full checklist present → `Privileged`
/// 4. ambiguous: the operator's confirmation decides; without it the host
///    proceeds as degraded `Privileged` and missing-tool failures surface
///    per-operation instead of blocking startup.
pub fn classify(report: &ProbeReport, operator_confirms_mobile: Option<bool>) -> ExecutionProfile {
    if !report.platform_supported {
        return ExecutionProfile::Simulated;
    }
    if report.mobile_api {
        return ExecutionProfile::UnprivilegedMobile;
    }
    if report.missing.is_empty() {
        return ExecutionProfile::Privileged;
    }
    if operator_confirms_mobile == Some(true) {
        return ExecutionProfile::UnprivilegedMobile;
    }
    ExecutionProfile::Privileged
}

/// Owns the profile decision for the lifetime of the process.
///
/// Built once at startup from a probe report; never mutated afterwards.
/// Pass it (or a clone) into each session so the active profile is explicit
/// state rather than a hidden global.
#[derive(Debug, Clone)]
pub struct BackendSelector {
    profile: ExecutionProfile,
    missing: Vec<String>,
}

impl BackendSelector {
    /// Probe the host and resolve the profile.
    ///
    /// `operator_confirms_mobile` carries the operator's answer for the
    /// ambiguous case (rule 4); pass `None` when nobody asked.
    pub fn detect(operator_confirms_mobile: Option<bool>) -> Self {
        Self::from_report(&EnvironmentProbe::run(), operator_confirms_mobile)
    }

    /// Resolve the profile from an existing report.
    pub fn from_report(report: &ProbeReport, operator_confirms_mobile: Option<bool>) -> Self {
        let profile = classify(report, operator_confirms_mobile);
        match profile {
            ExecutionProfile::Simulated => {
                warn!("desktop radio stack unavailable on this platform, running simulated");
            }
            ExecutionProfile::UnprivilegedMobile => {
                info!("mobile API layer detected, running without elevated privileges");
            }
            ExecutionProfile::Privileged if !report.missing.is_empty() => {
                warn!(
                    "continuing in degraded privileged mode, missing tools: {}",
                    report.missing.join(", ")
                );
            }
            ExecutionProfile::Privileged => {
                info!("full desktop stack present");
            }
        }
        Self {
            profile,
            missing: report.missing.clone(),
        }
    }

    /// Build a selector with a fixed profile (tests, embedders).
    pub fn fixed(profile: ExecutionProfile) -> Self {
        Self {
            profile,
            missing: Vec::new(),
        }
    }

    /// The resolved execution profile.
    pub fn current_profile(&self) -> ExecutionProfile {
        self.profile
    }

    /// Whether a checklist tool was present at probe time.
    pub fn has_capability(&self, tool: &str) -> bool {
        !self.missing.iter().any(|m| m == tool)
    }

    /// Checklist tools that were missing at probe time.
    pub fn missing_tools(&self) -> &[String] {
        &self.missing
    }
}
