//! Privileged desktop backend: drives the BlueZ management tools and the
//! PulseAudio toolset directly.
//!
//! Pairing uses a silent no-input/no-output request first and falls back to
//! the interactive controller; capture routes the device's Pulse card to
//! the headset profile and records from the derived source.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OpsConfig;
use crate::error::Result;
use crate::invoke::InvokeError;
use crate::outcome::{
    ConnectOutcome, Device, DisruptOutcome, IdentityOutcome, PairOutcome, PlaybackOutcome,
    RecordOutcome,
};
use crate::probe::ExecutionProfile;
use crate::runner::{ChainStep, CommandRunner};
use crate::target::{IoCapability, Target};

use super::{Backend, CaptureEnd, pulse_set_sink_mute, run_capture_child};

/// Status line the management tool emits when the target refuses the bond.
const AUTH_REJECTED_MARKER: &str = "status 0x05 (Authentication Failed)";

/// Marker the controller emits when a connect attempt fails.
const CONNECT_FAILED_MARKER: &str = "Failed to connect";

/// Headset capture profile for the device's Pulse card.
const HEADSET_PROFILE: &str = "headset-head-unit-msbc";

/// Accept silent-pair output unless it reports a failure that is not the
/// benign "Already Paired" status.
fn pair_output_acceptable(out: &str) -> bool {
    !(out.contains("failed") && !out.contains("Already Paired"))
}

/// Reject connect output that carries the controller's failure marker.
fn connect_output_acceptable(out: &str) -> bool {
    !out.contains(CONNECT_FAILED_MARKER)
}

/// Whether a rejected pairing response was an authentication refusal.
fn is_authentication_rejected(err: &InvokeError) -> bool {
    err.output()
        .is_some_and(|out| out.contains(AUTH_REJECTED_MARKER))
}

/// Parse `bluetoothctl devices` output: one `Device <address> <name>` line
/// per known device.
fn parse_device_lines(out: &str) -> Vec<Device> {
    out.lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, ' ');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("Device"), Some(address), Some(name)) => Some(Device {
                    address: address.to_owned(),
                    name: name.to_owned(),
                    rssi: None,
                    connected: false,
                    bonded: false,
                }),
                _ => None,
            }
        })
        .collect()
}

/// Parse `hcitool rssi` output: `RSSI return value: -55`.
fn parse_rssi(out: &str) -> Option<i16> {
    out.lines()
        .find(|line| line.contains("RSSI return value"))
        .and_then(|line| line.rsplit(':').next())
        .and_then(|value| value.trim().parse::<i16>().ok())
}

/// Backend for the full BlueZ/PulseAudio stack.
pub struct PrivilegedBackend {
    runner: CommandRunner,
    config: OpsConfig,
}

impl PrivilegedBackend {
    /// Create the backend over a command runner.
    pub fn new(runner: CommandRunner, config: OpsConfig) -> Self {
        Self { runner, config }
    }

    /// Make the local adapter bondable and pairable and drop link-level
    /// security. Individual failures here are logged, not fatal: the
    /// pairing attempt itself decides the outcome.
    fn prepare_adapter(&self) {
        for args in [
            ["bondable", "true"],
            ["pairable", "true"],
            ["linksec", "false"],
        ] {
            if let Err(e) = self.runner.run("btmgmt", &args) {
                warn!("adapter setup `btmgmt {}` failed: {e}", args.join(" "));
            }
        }
    }
}

#[async_trait]
impl Backend for PrivilegedBackend {
    fn name(&self) -> &str {
        "privileged"
    }

    fn profile(&self) -> ExecutionProfile {
        ExecutionProfile::Privileged
    }

    async fn pair(&self, target: &Target) -> Result<PairOutcome> {
        self.prepare_adapter();

        let capability = IoCapability::NoInputNoOutput.value().to_string();
        let address_type = target.address_type().value().to_string();
        let address = target.address().to_owned();

        let chain = [
            ChainStep::new("silent-pair", || {
                self.runner.run_validated(
                    "btmgmt",
                    &["pair", "-c", &capability, "-t", &address_type, &address],
                    pair_output_acceptable,
                )
            }),
            // The interactive controller may ask the remote side to
            // confirm; pairing it and trusting it are two calls.
            ChainStep::new("interactive-pair", || {
                self.runner.run("bluetoothctl", &["pair", &address])?;
                self.runner.run("bluetoothctl", &["trust", &address])
            }),
        ];

        let outcome = self.runner.run_chain(&chain);
        match (outcome.step, outcome.result) {
            (_, Ok(_)) => {
                info!("paired with {target}");
                Ok(PairOutcome::Paired)
            }
            ("silent-pair", Err(e)) if is_authentication_rejected(&e) => {
                warn!("target {target} rejected authentication");
                Ok(PairOutcome::Failed {
                    reason: "authentication rejected by target".to_owned(),
                })
            }
            ("silent-pair", Err(e)) => Ok(PairOutcome::Failed {
                reason: e.to_string(),
            }),
            (_, Err(e)) => {
                // The interactive fallback could not finish; the operator
                // may complete pairing by hand, so the flow continues.
                warn!("standard pairing failed: {e}");
                Ok(PairOutcome::PairedAssumed {
                    guidance: "pair the device manually in the system Bluetooth settings"
                        .to_owned(),
                })
            }
        }
    }

    async fn connect(&self, target: &Target, timeout_secs: u32) -> Result<ConnectOutcome> {
        let timeout = timeout_secs.to_string();
        match self
            .runner
            .run("bluetoothctl", &["--timeout", &timeout, "scan", "on"])
        {
            Ok(_) => {}
            Err(InvokeError::ToolMissing { .. }) => {
                return Ok(ConnectOutcome::Assumed {
                    guidance: "bluetoothctl not found; connect the device manually".to_owned(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        match self.runner.run_validated(
            "bluetoothctl",
            &["connect", target.address()],
            connect_output_acceptable,
        ) {
            Ok(_) => {
                info!("connected to {target}");
                Ok(ConnectOutcome::Connected)
            }
            Err(InvokeError::ToolMissing { .. }) => Ok(ConnectOutcome::Assumed {
                guidance: "bluetoothctl not found; connect the device manually".to_owned(),
            }),
            Err(e @ (InvokeError::ValidationRejected { .. } | InvokeError::NonZeroExit { .. })) => {
                Ok(ConnectOutcome::Failed {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn scan(&self, _deep: bool, timeout_secs: u32) -> Result<Vec<Device>> {
        let timeout = timeout_secs.to_string();
        // May fail if a scan is already running; the device list below is
        // still worth reading.
        if let Err(e) = self
            .runner
            .run("bluetoothctl", &["--timeout", &timeout, "scan", "on"])
        {
            debug!("discovery scan: {e}");
        }

        match self.runner.run("bluetoothctl", &["devices"]) {
            Ok(out) => Ok(parse_device_lines(&out)),
            Err(InvokeError::ToolMissing { .. }) => {
                warn!("bluetoothctl not found; no devices to list");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn record(
        &self,
        target: &Target,
        output: &Path,
        cancel: CancellationToken,
    ) -> Result<RecordOutcome> {
        let card = target.pulse_card_name();
        match self
            .runner
            .run("pactl", &["set-card-profile", &card, HEADSET_PROFILE])
        {
            Ok(_) => {}
            Err(InvokeError::ToolMissing { .. }) => {
                debug!("pactl not found, skipping card profile switch");
            }
            Err(e) => {
                return Ok(RecordOutcome::Failed {
                    reason: format!("could not switch {card} to the headset profile: {e}"),
                });
            }
        }

        let source = target.pulse_source_name();
        let outfile = output.to_string_lossy().into_owned();
        let poll = Duration::from_millis(self.config.capture.poll_interval_ms);

        info!("recording from {source} into {outfile}");
        match run_capture_child("parecord", &["-d", &source, &outfile], poll, &cancel).await {
            Ok(end) => {
                if end == CaptureEnd::Cancelled {
                    info!("capture stopped, data saved to {outfile}");
                }
                Ok(RecordOutcome::Stopped {
                    path: output.to_path_buf(),
                })
            }
            Err(InvokeError::ToolMissing { .. }) => {
                warn!("parecord not found, falling back to the mobile recorder");
                match run_capture_child("termux-microphone-record", &["-f", &outfile], poll, &cancel)
                    .await
                {
                    Ok(_) => Ok(RecordOutcome::Stopped {
                        path: output.to_path_buf(),
                    }),
                    Err(InvokeError::ToolMissing { .. }) => Ok(RecordOutcome::Failed {
                        reason: "no capture tool available; install PulseAudio (parecord) or \
                                 the Termux API package (pkg install termux-api)"
                            .to_owned(),
                    }),
                    Err(e) => Ok(RecordOutcome::Failed {
                        reason: e.to_string(),
                    }),
                }
            }
            Err(e) => Ok(RecordOutcome::Failed {
                reason: e.to_string(),
            }),
        }
    }

    async fn playback(&self, sink: &str, file: &Path) -> Result<PlaybackOutcome> {
        let path = file.to_string_lossy();
        match self.runner.run("paplay", &["-d", sink, path.as_ref()]) {
            Ok(_) => Ok(PlaybackOutcome::Completed),
            Err(e) => Ok(PlaybackOutcome::Failed {
                reason: e.to_string(),
            }),
        }
    }

    async fn set_identity(
        &self,
        name: Option<&str>,
        device_class_hex: Option<&str>,
    ) -> Result<IdentityOutcome> {
        if let Some(class) = device_class_hex {
            let digits = class.strip_prefix("0x").unwrap_or(class);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Ok(IdentityOutcome::Failed {
                    reason: format!("device class must be a hex literal like 0x240404, got {class}"),
                });
            }
        }

        let mut steps: Vec<Vec<&str>> = vec![vec!["hci0", "down"]];
        if let Some(name) = name {
            steps.push(vec!["hci0", "name", name]);
        }
        if let Some(class) = device_class_hex {
            steps.push(vec!["hci0", "class", class]);
        }
        steps.push(vec!["hci0", "up"]);
        steps.push(vec!["hci0", "sspmode", "1"]);

        let mut applied = 0usize;
        for args in &steps {
            match self.runner.run("hciconfig", args) {
                Ok(_) => applied += 1,
                Err(e) => warn!("identity step `hciconfig {}` failed: {e}", args.join(" ")),
            }
        }

        if applied == 0 {
            Ok(IdentityOutcome::Failed {
                reason: "could not drive hciconfig (requires BlueZ and elevation)".to_owned(),
            })
        } else {
            info!("adapter identity updated");
            Ok(IdentityOutcome::Applied)
        }
    }

    async fn disrupt_audio(&self, target: &Target, mute: bool) -> Result<DisruptOutcome> {
        Ok(pulse_set_sink_mute(&self.runner, target, mute))
    }

    async fn signal_strength(&self, target: &Target) -> Result<Option<i16>> {
        match self.runner.run("hcitool", &["rssi", target.address()]) {
            Ok(out) => Ok(parse_rssi(&out)),
            Err(e) => {
                debug!("rssi read failed: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::heal::DependencyHealer;
    use crate::test_utils::ScriptedInvoker;

    fn backend_with(invoker: &ScriptedInvoker) -> PrivilegedBackend {
        let runner = CommandRunner::new(
            Box::new(invoker.clone()),
            DependencyHealer::new(ExecutionProfile::Privileged),
        );
        PrivilegedBackend::new(runner, OpsConfig::default())
    }

    fn target() -> Target {
        Target::classic("AA:BB:CC:DD:EE:FF").unwrap()
    }

    // ── validators and parsers ──────────────────────────────────

    #[test]
    fn pair_validator_rejects_plain_failure() {
        assert!(!pair_output_acceptable("Pairing failed with status 0x05"));
    }

    #[test]
    fn pair_validator_accepts_already_paired_despite_failed_substring() {
        assert!(pair_output_acceptable(
            "command failed: status 0x12 (Already Paired)"
        ));
    }

    #[test]
    fn pair_validator_accepts_clean_success() {
        assert!(pair_output_acceptable("Paired with aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn connect_validator_rejects_failure_marker() {
        assert!(!connect_output_acceptable("Failed to connect: le-connection"));
        assert!(connect_output_acceptable("Connection successful"));
    }

    #[test]
    fn parses_device_lines() {
        let out = "Device AA:BB:CC:DD:EE:FF Kitchen Speaker\n\
                   not a device line\n\
                   Device 11:22:33:44:55:66 Buds\n";
        let devices = parse_device_lines(out);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(devices[0].name, "Kitchen Speaker");
        assert_eq!(devices[1].name, "Buds");
    }

    #[test]
    fn parses_rssi_line() {
        assert_eq!(parse_rssi("RSSI return value: -55\n"), Some(-55));
        assert_eq!(parse_rssi("Not connected.\n"), None);
    }

    // ── pairing ─────────────────────────────────────────────────

    #[tokio::test]
    async fn authentication_rejection_is_terminal_failure() {
        let invoker = ScriptedInvoker::new();
        // Three adapter-setup calls precede the pair call.
        for _ in 0..3 {
            invoker.expect("btmgmt", Ok(String::new()));
        }
        invoker.expect(
            "btmgmt",
            Ok("pairing failed, status 0x05 (Authentication Failed)".to_owned()),
        );
        let backend = backend_with(&invoker);

        let outcome = backend.pair(&target()).await.unwrap();
        assert!(
            matches!(outcome, PairOutcome::Failed { reason } if reason.contains("authentication"))
        );
        // The interactive fallback never ran.
        assert_eq!(invoker.calls_to("bluetoothctl"), 0);
    }

    #[tokio::test]
    async fn already_paired_counts_as_paired() {
        let invoker = ScriptedInvoker::new();
        for _ in 0..3 {
            invoker.expect("btmgmt", Ok(String::new()));
        }
        invoker.expect(
            "btmgmt",
            Ok("command failed: status 0x12 (Already Paired)".to_owned()),
        );
        let backend = backend_with(&invoker);

        let outcome = backend.pair(&target()).await.unwrap();
        assert_eq!(outcome, PairOutcome::Paired);
    }

    #[tokio::test]
    async fn missing_pair_tool_falls_back_to_interactive_controller() {
        let invoker = ScriptedInvoker::new();
        // Setup calls and the silent pair all miss the tool.
        for _ in 0..4 {
            invoker.expect_missing("btmgmt");
        }
        invoker.expect("bluetoothctl", Ok("Pairing successful".to_owned()));
        invoker.expect("bluetoothctl", Ok("trust succeeded".to_owned()));
        let backend = backend_with(&invoker);

        let outcome = backend.pair(&target()).await.unwrap();
        assert_eq!(outcome, PairOutcome::Paired);
        assert_eq!(invoker.calls_to("bluetoothctl"), 2);
    }

    #[tokio::test]
    async fn failing_fallback_is_assumed_not_failed() {
        let invoker = ScriptedInvoker::new();
        for _ in 0..4 {
            invoker.expect_missing("btmgmt");
        }
        invoker.expect(
            "bluetoothctl",
            Err(InvokeError::NonZeroExit {
                command: "bluetoothctl pair aa:bb:cc:dd:ee:ff".to_owned(),
                code: 1,
                stderr: "AuthenticationCanceled".to_owned(),
            }),
        );
        let backend = backend_with(&invoker);

        let outcome = backend.pair(&target()).await.unwrap();
        assert!(matches!(outcome, PairOutcome::PairedAssumed { .. }));
    }

    #[tokio::test]
    async fn everything_missing_is_assumed() {
        let invoker = ScriptedInvoker::new();
        for _ in 0..4 {
            invoker.expect_missing("btmgmt");
        }
        invoker.expect_missing("bluetoothctl");
        let backend = backend_with(&invoker);

        let outcome = backend.pair(&target()).await.unwrap();
        assert!(matches!(outcome, PairOutcome::PairedAssumed { .. }));
    }

    // ── connect ─────────────────────────────────────────────────

    #[tokio::test]
    async fn connect_success_after_discovery() {
        let invoker = ScriptedInvoker::new();
        invoker.expect("bluetoothctl", Ok("Discovery started".to_owned()));
        invoker.expect("bluetoothctl", Ok("Connection successful".to_owned()));
        let backend = backend_with(&invoker);

        let outcome = backend.connect(&target(), 2).await.unwrap();
        assert_eq!(outcome, ConnectOutcome::Connected);
        assert_eq!(
            invoker.calls(),
            [
                "bluetoothctl --timeout 2 scan on",
                "bluetoothctl connect aa:bb:cc:dd:ee:ff"
            ]
        );
    }

    #[tokio::test]
    async fn connect_failure_marker_is_failed() {
        let invoker = ScriptedInvoker::new();
        invoker.expect("bluetoothctl", Ok("Discovery started".to_owned()));
        invoker.expect("bluetoothctl", Ok("Failed to connect: page-timeout".to_owned()));
        let backend = backend_with(&invoker);

        let outcome = backend.connect(&target(), 2).await.unwrap();
        assert!(matches!(outcome, ConnectOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn connect_missing_tool_is_assumed() {
        let invoker = ScriptedInvoker::new();
        invoker.expect_missing("bluetoothctl");
        let backend = backend_with(&invoker);

        let outcome = backend.connect(&target(), 2).await.unwrap();
        assert!(matches!(outcome, ConnectOutcome::Assumed { .. }));
    }

    // ── scan / identity / audio ─────────────────────────────────

    #[tokio::test]
    async fn scan_lists_known_devices() {
        let invoker = ScriptedInvoker::new();
        invoker.expect("bluetoothctl", Ok("Discovery started".to_owned()));
        invoker.expect(
            "bluetoothctl",
            Ok("Device AA:BB:CC:DD:EE:FF Kitchen Speaker\n".to_owned()),
        );
        let backend = backend_with(&invoker);

        let devices = backend.scan(false, 5).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Kitchen Speaker");
    }

    #[tokio::test]
    async fn scan_without_controller_returns_empty() {
        let invoker = ScriptedInvoker::new();
        invoker.expect_missing("bluetoothctl");
        invoker.expect_missing("bluetoothctl");
        let backend = backend_with(&invoker);

        let devices = backend.scan(false, 5).await.unwrap();
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn identity_sequence_survives_step_failures() {
        let invoker = ScriptedInvoker::new();
        invoker.expect(
            "hciconfig",
            Err(InvokeError::NonZeroExit {
                command: "hciconfig hci0 down".to_owned(),
                code: 1,
                stderr: "Operation not permitted".to_owned(),
            }),
        );
        let backend = backend_with(&invoker);

        let outcome = backend
            .set_identity(Some("AirPods"), Some("0x240404"))
            .await
            .unwrap();
        assert_eq!(outcome, IdentityOutcome::Applied);
        // down, name, class, up, sspmode
        assert_eq!(invoker.calls_to("hciconfig"), 5);
    }

    #[tokio::test]
    async fn identity_rejects_bad_device_class() {
        let invoker = ScriptedInvoker::new();
        let backend = backend_with(&invoker);

        let outcome = backend
            .set_identity(None, Some("not-hex"))
            .await
            .unwrap();
        assert!(matches!(outcome, IdentityOutcome::Failed { .. }));
        assert_eq!(invoker.calls_to("hciconfig"), 0);
    }

    #[tokio::test]
    async fn identity_all_steps_missing_is_failed() {
        let invoker = ScriptedInvoker::new();
        for _ in 0..3 {
            invoker.expect_missing("hciconfig");
        }
        let backend = backend_with(&invoker);

        let outcome = backend.set_identity(None, None).await.unwrap();
        assert!(matches!(outcome, IdentityOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn disrupt_audio_muted_and_unmuted() {
        let invoker = ScriptedInvoker::new();
        let backend = backend_with(&invoker);

        let outcome = backend.disrupt_audio(&target(), true).await.unwrap();
        assert_eq!(outcome, DisruptOutcome::Applied);
        let outcome = backend.disrupt_audio(&target(), false).await.unwrap();
        assert_eq!(outcome, DisruptOutcome::Applied);
        let calls = invoker.calls();
        assert!(calls[0].contains("set-sink-mute bluez_card.AA_BB_CC_DD_EE_FF 1"));
        assert!(calls[1].contains("set-sink-mute bluez_card.AA_BB_CC_DD_EE_FF 0"));
    }

    #[tokio::test]
    async fn signal_strength_parses_tool_output() {
        let invoker = ScriptedInvoker::new();
        invoker.expect("hcitool", Ok("RSSI return value: -63\n".to_owned()));
        let backend = backend_with(&invoker);

        let rssi = backend.signal_strength(&target()).await.unwrap();
        assert_eq!(rssi, Some(-63));
    }

    #[tokio::test]
    async fn signal_strength_missing_tool_is_none() {
        let invoker = ScriptedInvoker::new();
        invoker.expect_missing("hcitool");
        let backend = backend_with(&invoker);

        let rssi = backend.signal_strength(&target()).await.unwrap();
        assert_eq!(rssi, None);
    }

    // ── record ──────────────────────────────────────────────────

    #[tokio::test]
    async fn record_profile_switch_error_is_failed() {
        let invoker = ScriptedInvoker::new();
        invoker.expect(
            "pactl",
            Err(InvokeError::NonZeroExit {
                command: "pactl set-card-profile".to_owned(),
                code: 1,
                stderr: "no such card".to_owned(),
            }),
        );
        let backend = backend_with(&invoker);

        let outcome = backend
            .record(&target(), Path::new("/tmp/out.wav"), CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, RecordOutcome::Failed { .. }));
    }
}
