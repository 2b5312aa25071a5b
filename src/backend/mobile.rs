//! Unprivileged mobile backend: drives the Termux API layer.
//!
//! No management-level access is available here — pairing is delegated to
//! the OS settings UI, connecting is a fire-and-forget intent dispatch, and
//! scanning samples the platform scanner several times because a single
//! pass under-reports due to radio variance.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::OpsConfig;
use crate::error::Result;
use crate::invoke::InvokeError;
use crate::outcome::{
    ConnectOutcome, Device, DisruptOutcome, IdentityOutcome, PairOutcome, PlaybackOutcome,
    RecordOutcome,
};
use crate::probe::{ExecutionProfile, MOBILE_SCAN_TOOL};
use crate::runner::CommandRunner;
use crate::target::Target;

use super::{Backend, pulse_set_sink_mute};

/// The platform connect dispatcher.
const MOBILE_CONNECT_TOOL: &str = "termux-bluetooth-connect";

/// The platform microphone recorder.
const MOBILE_RECORD_TOOL: &str = "termux-microphone-record";

/// Signal strength assumed when the scanner omits one.
const DEFAULT_RSSI: i16 = -100;

/// One entry of the scanner's JSON output.
#[derive(Debug, Deserialize)]
struct ScanEntry {
    address: Option<String>,
    name: Option<String>,
    rssi: Option<i16>,
    #[serde(default)]
    connected: bool,
    #[serde(default)]
    bonded: bool,
}

/// Fold one scanner entry into the running device map, keeping the maximum
/// observed signal strength per address; passes that omit the name keep the
/// one already seen.
fn merge_entry(devices: &mut BTreeMap<String, Device>, entry: ScanEntry) {
    let Some(address) = entry.address else {
        return;
    };
    let rssi = entry.rssi.unwrap_or(DEFAULT_RSSI);

    match devices.get_mut(&address) {
        Some(existing) => {
            if let Some(name) = entry.name {
                existing.name = name;
            }
            if rssi > existing.rssi.unwrap_or(i16::MIN) {
                existing.rssi = Some(rssi);
                existing.connected = entry.connected;
                existing.bonded = entry.bonded;
            }
        }
        None => {
            devices.insert(
                address.clone(),
                Device {
                    address,
                    name: entry.name.unwrap_or_else(|| "Unknown".to_owned()),
                    rssi: Some(rssi),
                    connected: entry.connected,
                    bonded: entry.bonded,
                },
            );
        }
    }
}

/// Backend for non-rooted mobile hosts.
pub struct MobileBackend {
    runner: CommandRunner,
    config: OpsConfig,
}

impl MobileBackend {
    /// Create the backend over a command runner.
    pub fn new(runner: CommandRunner, config: OpsConfig) -> Self {
        Self { runner, config }
    }

    /// Run one scanner pass and fold its entries into `devices`.
    fn scan_pass(&self, devices: &mut BTreeMap<String, Device>) {
        match self.runner.run(MOBILE_SCAN_TOOL, &[]) {
            Ok(out) if out.trim().is_empty() => {}
            Ok(out) => match serde_json::from_str::<Vec<ScanEntry>>(&out) {
                Ok(entries) => {
                    for entry in entries {
                        merge_entry(devices, entry);
                    }
                }
                Err(e) => warn!("scanner produced unparseable output: {e}"),
            },
            Err(e) => warn!("scan cycle error: {e}"),
        }
    }
}

#[async_trait]
impl Backend for MobileBackend {
    fn name(&self) -> &str {
        "mobile"
    }

    fn profile(&self) -> ExecutionProfile {
        ExecutionProfile::UnprivilegedMobile
    }

    async fn pair(&self, _target: &Target) -> Result<PairOutcome> {
        // No management API without root; the OS raises its own pairing
        // prompt when the connect intent arrives.
        Ok(PairOutcome::PairedAssumed {
            guidance: "pair the device in the system Bluetooth settings; connecting will \
                       raise the pairing prompt"
                .to_owned(),
        })
    }

    async fn connect(&self, target: &Target, _timeout_secs: u32) -> Result<ConnectOutcome> {
        // Fire-and-forget: the request being accepted is the success
        // condition, the OS confirmation UI is never awaited.
        match self.runner.run(MOBILE_CONNECT_TOOL, &[target.address()]) {
            Ok(_) => {
                info!("connect request dispatched for {target}");
                Ok(ConnectOutcome::Assumed {
                    guidance: "connection request dispatched; accept any system prompt".to_owned(),
                })
            }
            Err(InvokeError::ToolMissing { tool }) => Ok(ConnectOutcome::Failed {
                reason: format!("`{tool}` not found; install the Termux API package (pkg install termux-api)"),
            }),
            Err(e) => Ok(ConnectOutcome::Failed {
                reason: e.to_string(),
            }),
        }
    }

    async fn scan(&self, deep: bool, _timeout_secs: u32) -> Result<Vec<Device>> {
        let passes = if deep {
            self.config.scan.deep_passes.max(1)
        } else {
            1
        };
        let mut devices = BTreeMap::new();

        for pass in 0..passes {
            self.scan_pass(&mut devices);
            if pass + 1 < passes {
                tokio::time::sleep(Duration::from_secs(self.config.scan.pass_delay_secs)).await;
            }
        }

        Ok(devices.into_values().collect())
    }

    async fn record(
        &self,
        _target: &Target,
        output: &Path,
        cancel: CancellationToken,
    ) -> Result<RecordOutcome> {
        let outfile = output.to_string_lossy().into_owned();
        let limit = self.config.capture.mobile_limit_secs;
        let limit_arg = limit.to_string();

        match self
            .runner
            .run(MOBILE_RECORD_TOOL, &["-f", &outfile, "-l", &limit_arg])
        {
            Ok(_) => {}
            Err(InvokeError::ToolMissing { tool }) => {
                return Ok(RecordOutcome::Failed {
                    reason: format!("`{tool}` not found; install the Termux API package (pkg install termux-api)"),
                });
            }
            Err(e) => {
                return Ok(RecordOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        }

        info!("mobile recorder started, limit {limit}s, file {outfile}");
        tokio::select! {
            _ = cancel.cancelled() => {
                // Ask the recorder to stop; a failure here only means it
                // already finished.
                if let Err(e) = self.runner.run(MOBILE_RECORD_TOOL, &["-q"]) {
                    warn!("recorder quit request failed: {e}");
                }
                info!("capture stopped, data saved to {outfile}");
            }
            _ = tokio::time::sleep(Duration::from_secs(u64::from(limit))) => {}
        }

        Ok(RecordOutcome::Stopped {
            path: output.to_path_buf(),
        })
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
        _name: Option<&str>,
        _device_class_hex: Option<&str>,
    ) -> Result<IdentityOutcome> {
        Ok(IdentityOutcome::Unsupported {
            reason: "adapter identity changes require elevated privileges".to_owned(),
        })
    }

    async fn disrupt_audio(&self, target: &Target, mute: bool) -> Result<DisruptOutcome> {
        // The healer can install PulseAudio on demand here.
        Ok(pulse_set_sink_mute(&self.runner, target, mute))
    }

    async fn signal_strength(&self, target: &Target) -> Result<Option<i16>> {
        let mut devices = BTreeMap::new();
        self.scan_pass(&mut devices);
        Ok(devices
            .values()
            .find(|d| d.address.eq_ignore_ascii_case(target.address()))
            .and_then(|d| d.rssi))
    }
}
