//! Execution backends — the per-profile implementations of every
//! user-facing operation.
//!
//! The active [`ExecutionProfile`] is resolved once at startup; this module
//! turns it into a concrete backend:
//!
//! - **Privileged**: drives the BlueZ/PulseAudio tool stack directly
//! - **UnprivilegedMobile**: drives the Termux API layer, no root required
//! - **Simulated**: synthesizes every operation, no hardware needed
//!
//! Each backend owns its fallback chains; callers never branch on the
//! profile themselves.

pub mod mobile;
pub mod privileged;
pub mod simulated;

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::OpsConfig;
use crate::error::Result;
use crate::heal::DependencyHealer;
use crate::invoke::{InvokeError, ProcessInvoker, render_command};
use crate::outcome::{
    ConnectOutcome, Device, DisruptOutcome, IdentityOutcome, PairOutcome, PlaybackOutcome,
    RecordOutcome,
};
use crate::probe::{BackendSelector, ExecutionProfile};
use crate::runner::CommandRunner;
use crate::target::Target;

/// Profile-specific implementation of the core operations.
///
/// Implementations wrap external tool invocations (or synthetic delays)
/// and translate results into the shared outcome types. Soft failures stay
/// inside the outcome enums; only unclassified errors surface as `Err`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// The profile this backend serves.
    fn profile(&self) -> ExecutionProfile;

    /// Attempt to bond with the target.
    async fn pair(&self, target: &Target) -> Result<PairOutcome>;

    /// Attempt to establish (or dispatch) a connection to the target.
    async fn connect(&self, target: &Target, timeout_secs: u32) -> Result<ConnectOutcome>;

    /// Run one discovery cycle and return the observed devices.
    async fn scan(&self, deep: bool, timeout_secs: u32) -> Result<Vec<Device>>;

    /// Capture audio from the target into `output` until completion or
    /// cancellation. Cancellation is a normal outcome: the child process is
    /// terminated and the partial file is kept.
    async fn record(
        &self,
        target: &Target,
        output: &Path,
        cancel: CancellationToken,
    ) -> Result<RecordOutcome>;

    /// Play a captured file back through the named sink.
    async fn playback(&self, sink: &str, file: &Path) -> Result<PlaybackOutcome>;

    /// Rewrite the local adapter identity (display name, device class).
    async fn set_identity(
        &self,
        name: Option<&str>,
        device_class_hex: Option<&str>,
    ) -> Result<IdentityOutcome>;

    /// Mute or unmute the target's audio sink.
    async fn disrupt_audio(&self, target: &Target, mute: bool) -> Result<DisruptOutcome>;

    /// Read the target's current signal strength, if the host can.
    async fn signal_strength(&self, target: &Target) -> Result<Option<i16>>;
}

/// Build the backend for a resolved profile.
///
/// The runner (invoker + healer) is constructed here so every backend goes
/// through the same single-retry command path.
pub fn create_backend(selector: &BackendSelector, config: &OpsConfig) -> Box<dyn Backend> {
    let profile = selector.current_profile();
    let runner = CommandRunner::new(
        Box::new(ProcessInvoker::new()),
        DependencyHealer::new(profile),
    );
    match profile {
        ExecutionProfile::Privileged => {
            Box::new(privileged::PrivilegedBackend::new(runner, config.clone()))
        }
        ExecutionProfile::UnprivilegedMobile => {
            Box::new(mobile::MobileBackend::new(runner, config.clone()))
        }
        ExecutionProfile::Simulated => Box::new(simulated::SimulatedBackend::new()),
    }
}

/// How a capture child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaptureEnd {
    /// The tool exited on its own.
    Completed,
    /// The operator stopped the capture; the child was terminated.
    Cancelled,
}

/// Spawn a capture tool and babysit it until it exits or the cancellation
/// token fires. On cancellation the child is killed and reaped before
/// returning, so no recorder is left holding the device.
pub(crate) async fn run_capture_child(
    program: &str,
    args: &[&str],
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> std::result::Result<CaptureEnd, InvokeError> {
    let command_line = render_command(program, args);
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InvokeError::ToolMissing {
                    tool: program.to_owned(),
                }
            } else {
                InvokeError::Spawn {
                    command: command_line.clone(),
                    source: e,
                }
            }
        })?;

    loop {
        if cancel.is_cancelled() {
            info!("capture stop requested, terminating `{program}`");
            let _ = child.kill();
            let _ = child.wait();
            return Ok(CaptureEnd::Cancelled);
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                let stderr = child
                    .stderr
                    .take()
                    .map(|mut s| {
                        let mut buf = String::new();
                        let _ = s.read_to_string(&mut buf);
                        buf
                    })
                    .unwrap_or_default();

                if !status.success() && !stderr.is_empty() {
                    return Err(InvokeError::NonZeroExit {
                        command: command_line,
                        code: status.code().unwrap_or(-1),
                        stderr,
                    });
                }
                return Ok(CaptureEnd::Completed);
            }
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(e) => {
                return Err(InvokeError::Spawn {
                    command: command_line,
                    source: e,
                });
            }
        }
    }
}

/// Set the mute state of the target's PulseAudio sink.
///
/// Shared by the privileged and mobile backends: under Termux the healer
/// can install PulseAudio on demand.
pub(crate) fn pulse_set_sink_mute(
    runner: &CommandRunner,
    target: &Target,
    mute: bool,
) -> DisruptOutcome {
    let card = target.pulse_card_name();
    let flag = if mute { "1" } else { "0" };
    match runner.run("pactl", &["set-sink-mute", &card, flag]) {
        Ok(_) => DisruptOutcome::Applied,
        Err(e) => DisruptOutcome::Failed {
            reason: e.to_string(),
        },
    }
}
