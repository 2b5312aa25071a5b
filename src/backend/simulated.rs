//! Simulated backend: synthesizes every operation with bounded delays.
//!
//! Keeps the whole API exercisable on hosts with no usable radio stack —
//! demos, development machines, and the integration tests.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Result;
use crate::outcome::{
    ConnectOutcome, Device, DisruptOutcome, IdentityOutcome, PairOutcome, PlaybackOutcome,
    RecordOutcome,
};
use crate::probe::ExecutionProfile;
use crate::target::Target;

use super::Backend;

/// Synthetic connect delay.
const CONNECT_DELAY: Duration = Duration::from_millis(500);

/// Synthetic scan delay.
const SCAN_DELAY: Duration = Duration::from_millis(750);

/// One tick of the synthetic capture session.
const CAPTURE_TICK: Duration = Duration::from_millis(250);

/// Delay between synthetic identity steps.
const IDENTITY_STEP_DELAY: Duration = Duration::from_millis(100);

/// Backend that synthesizes all operations.
#[derive(Debug, Default)]
pub struct SimulatedBackend;

impl SimulatedBackend {
    /// Create the simulated backend.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn profile(&self) -> ExecutionProfile {
        ExecutionProfile::Simulated
    }

    async fn pair(&self, target: &Target) -> Result<PairOutcome> {
        // No external call: pairing is synthesized immediately.
        info!("[simulated] adapter bondable/pairable, paired with {target}");
        Ok(PairOutcome::Paired)
    }

    async fn connect(&self, target: &Target, _timeout_secs: u32) -> Result<ConnectOutcome> {
        info!("[simulated] connecting to {target}");
        tokio::time::sleep(CONNECT_DELAY).await;
        info!("[simulated] connected");
        Ok(ConnectOutcome::Connected)
    }

    async fn scan(&self, _deep: bool, _timeout_secs: u32) -> Result<Vec<Device>> {
        tokio::time::sleep(SCAN_DELAY).await;
        Ok(vec![
            Device {
                address: "00:11:22:33:AA:BB".to_owned(),
                name: "Pixel 8".to_owned(),
                rssi: Some(-52),
                connected: false,
                bonded: true,
            },
            Device {
                address: "AA:11:22:33:44:01".to_owned(),
                name: "JBL Flip 6".to_owned(),
                rssi: Some(-64),
                connected: false,
                bonded: false,
            },
            Device {
                address: "DE:AD:BE:EF:CA:FE".to_owned(),
                name: "Unknown".to_owned(),
                rssi: Some(-81),
                connected: false,
                bonded: false,
            },
        ])
    }

    async fn record(
        &self,
        target: &Target,
        output: &Path,
        cancel: CancellationToken,
    ) -> Result<RecordOutcome> {
        info!(
            "[simulated] recording from {target} into {}",
            output.display()
        );
        // Block on a cancellable wait loop, one tick per iteration; the
        // output counts as already written when the stop arrives.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[simulated] capture stopped, data saved");
                    return Ok(RecordOutcome::Stopped {
                        path: output.to_path_buf(),
                    });
                }
                _ = tokio::time::sleep(CAPTURE_TICK) => {}
            }
        }
    }

    async fn playback(&self, sink: &str, file: &Path) -> Result<PlaybackOutcome> {
        info!("[simulated] playing {} through {sink}", file.display());
        tokio::time::sleep(CONNECT_DELAY).await;
        Ok(PlaybackOutcome::Completed)
    }

    async fn set_identity(
        &self,
        name: Option<&str>,
        device_class_hex: Option<&str>,
    ) -> Result<IdentityOutcome> {
        info!("[simulated] adapter down");
        tokio::time::sleep(IDENTITY_STEP_DELAY).await;
        if let Some(name) = name {
            info!("[simulated] adapter name set to '{name}'");
            tokio::time::sleep(IDENTITY_STEP_DELAY).await;
        }
        if let Some(class) = device_class_hex {
            info!("[simulated] device class set to {class}");
            tokio::time::sleep(IDENTITY_STEP_DELAY).await;
        }
        info!("[simulated] adapter up, secure simple pairing enabled");
        Ok(IdentityOutcome::Applied)
    }

    async fn disrupt_audio(&self, target: &Target, mute: bool) -> Result<DisruptOutcome> {
        let action = if mute { "muting" } else { "unmuting" };
        info!("[simulated] {action} speaker on {target}");
        Ok(DisruptOutcome::Applied)
    }

    async fn signal_strength(&self, _target: &Target) -> Result<Option<i16>> {
        Ok(Some(rand::thread_rng().gen_range(-90..=-40)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn target() -> Target {
        Target::classic("AA:BB:CC:DD:EE:FF").unwrap()
    }

    #[tokio::test]
    async fn pair_is_immediate() {
        let backend = SimulatedBackend::new();
        let started = std::time::Instant::now();
        let outcome = backend.pair(&target()).await.unwrap();
        assert_eq!(outcome, PairOutcome::Paired);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn connect_succeeds_after_bounded_delay() {
        let backend = SimulatedBackend::new();
        let outcome = backend.connect(&target(), 2).await.unwrap();
        assert_eq!(outcome, ConnectOutcome::Connected);
    }

    #[tokio::test]
    async fn scan_returns_illustrative_devices() {
        let backend = SimulatedBackend::new();
        let devices = backend.scan(false, 5).await.unwrap();
        assert_eq!(devices.len(), 3);
        assert!(devices.iter().any(|d| d.name == "JBL Flip 6"));
    }

    #[tokio::test]
    async fn record_stops_on_cancellation_with_requested_path() {
        let backend = SimulatedBackend::new();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let outcome = backend
            .record(&target(), Path::new("/tmp/session.wav"), cancel)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RecordOutcome::Stopped {
                path: "/tmp/session.wav".into()
            }
        );
    }

    #[tokio::test]
    async fn identity_sequence_applies() {
        let backend = SimulatedBackend::new();
        let outcome = backend
            .set_identity(Some("AirPods"), Some("0x240404"))
            .await
            .unwrap();
        assert_eq!(outcome, IdentityOutcome::Applied);
    }

    #[tokio::test]
    async fn signal_strength_is_in_plausible_band() {
        let backend = SimulatedBackend::new();
        for _ in 0..20 {
            let rssi = backend.signal_strength(&target()).await.unwrap().unwrap();
            assert!((-90..=-40).contains(&rssi), "rssi out of band: {rssi}");
        }
    }
}
