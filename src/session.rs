//! Core-facing facade over the resolved backend.
//!
//! A [`Session`] holds the configuration, the profile resolved at startup,
//! and the backend serving it. The CLI/HTTP layers that embed this crate
//! call these methods and render the outcomes; nothing here prints.
//!
//! The underlying adapter is a singleton resource: the session does not
//! enforce mutual exclusion and assumes one operation at a time against one
//! adapter. Hosts serving concurrent requests must serialize per adapter.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{Backend, create_backend};
use crate::config::OpsConfig;
use crate::error::Result;
use crate::outcome::{
    ConnectOutcome, Device, DisruptOutcome, IdentityOutcome, PairOutcome, PlaybackOutcome,
    RecordOutcome, SignalSample,
};
use crate::probe::{BackendSelector, ExecutionProfile};
use crate::report::SituationReport;
use crate::target::Target;

/// One orchestration session against the local adapter.
pub struct Session {
    config: OpsConfig,
    selector: BackendSelector,
    backend: Box<dyn Backend>,
}

impl Session {
    /// Build a session from a resolved selector.
    pub fn new(config: OpsConfig, selector: BackendSelector) -> Self {
        let backend = create_backend(&selector, &config);
        info!("session started on the {} backend", backend.name());
        Self {
            config,
            selector,
            backend,
        }
    }

    /// Build a session over an explicit backend (tests, embedders).
    pub fn with_backend(
        config: OpsConfig,
        selector: BackendSelector,
        backend: Box<dyn Backend>,
    ) -> Self {
        Self {
            config,
            selector,
            backend,
        }
    }

    /// The execution profile this session resolved at startup.
    pub fn profile(&self) -> ExecutionProfile {
        self.selector.current_profile()
    }

    /// Whether a checklist tool was present at probe time.
    pub fn has_capability(&self, tool: &str) -> bool {
        self.selector.has_capability(tool)
    }

    /// Session configuration.
    pub fn config(&self) -> &OpsConfig {
        &self.config
    }

    /// Run one discovery cycle.
    ///
    /// `deep` enables the mobile sampler's multi-pass merge; the privileged
    /// scanner runs one bounded pass either way.
    ///
    /// # Errors
    ///
    /// Unclassified tool failures bubble up; an absent scanner yields an
    /// empty list instead.
    pub async fn scan(&self, deep: bool, timeout_secs: u32) -> Result<Vec<Device>> {
        self.backend.scan(deep, timeout_secs).await
    }

    /// Attempt to bond with the target.
    ///
    /// # Errors
    ///
    /// Only unclassified failures; refusals and downgrades are in the
    /// outcome.
    pub async fn pair(&self, target: &Target) -> Result<PairOutcome> {
        let outcome = self.backend.pair(target).await?;
        if let PairOutcome::PairedAssumed { guidance } = &outcome {
            warn!("pairing unconfirmed: {guidance}");
        }
        Ok(outcome)
    }

    /// Attempt to connect to the target. `timeout_secs` bounds the
    /// pre-connect discovery window; `None` uses the configured default.
    ///
    /// # Errors
    ///
    /// Only unclassified failures; see [`ConnectOutcome`].
    pub async fn connect(
        &self,
        target: &Target,
        timeout_secs: Option<u32>,
    ) -> Result<ConnectOutcome> {
        let timeout = timeout_secs.unwrap_or(self.config.connect.timeout_secs);
        self.backend.connect(target, timeout).await
    }

    /// Capture audio from the target into `output` until the cancellation
    /// token fires or the tool completes. Cancellation terminates the
    /// capture child and keeps the partial file.
    ///
    /// # Errors
    ///
    /// Only unclassified failures; a stopped capture is a normal
    /// [`RecordOutcome::Stopped`].
    pub async fn record(
        &self,
        target: &Target,
        output: &Path,
        cancel: CancellationToken,
    ) -> Result<RecordOutcome> {
        self.backend.record(target, output, cancel).await
    }

    /// Play a captured file through a sink, defaulting to the configured
    /// one when `sink` is `None`.
    ///
    /// # Errors
    ///
    /// Only unclassified failures.
    pub async fn playback(&self, sink: Option<&str>, file: &Path) -> Result<PlaybackOutcome> {
        let sink = sink.unwrap_or(&self.config.capture.default_sink);
        self.backend.playback(sink, file).await
    }

    /// Rewrite the local adapter identity.
    ///
    /// # Errors
    ///
    /// Only unclassified failures.
    pub async fn set_identity(
        &self,
        name: Option<&str>,
        device_class_hex: Option<&str>,
    ) -> Result<IdentityOutcome> {
        self.backend.set_identity(name, device_class_hex).await
    }

    /// Mute or unmute the target's audio sink.
    ///
    /// # Errors
    ///
    /// Only unclassified failures.
    pub async fn disrupt_audio(&self, target: &Target, mute: bool) -> Result<DisruptOutcome> {
        self.backend.disrupt_audio(target, mute).await
    }

    /// Sample the target's signal strength until cancelled, pushing one
    /// [`SignalSample`] per interval into `tx`.
    ///
    /// The token is polled at every iteration boundary; the loop ends when
    /// it fires or the receiver goes away.
    ///
    /// # Errors
    ///
    /// Only unclassified sampling failures.
    pub async fn monitor_signal(
        &self,
        target: &Target,
        tx: mpsc::Sender<SignalSample>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let interval = std::time::Duration::from_millis(self.config.monitor.interval_ms);
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let rssi = self.backend.signal_strength(target).await?;
            let sample = SignalSample {
                rssi,
                at: Utc::now(),
            };
            if tx.send(sample).await.is_err() {
                // Receiver dropped; nobody is watching anymore.
                return Ok(());
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Write a situation report for a target and return the file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    pub fn write_report(
        &self,
        target: &Target,
        target_name: &str,
        note: &str,
    ) -> Result<PathBuf> {
        let dir = self.config.report.resolve_dir();
        SituationReport::new(target, target_name, note).write_to(&dir)
    }

    /// Timestamp-derived default output path for a capture, under the app
    /// data dir.
    pub fn default_recording_path(&self) -> PathBuf {
        let name = format!("capture_{}.wav", Utc::now().format("%Y%m%d-%H%M%S"));
        crate::paths::data_dir().join(name)
    }
}

/// Probe the host once and report the profile a session would run on.
///
/// Convenience for callers that want to show the environment before
/// constructing a [`Session`]; the session itself still owns its selector.
pub fn probe_environment() -> ExecutionProfile {
    BackendSelector::detect(None).current_profile()
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("profile", &self.profile())
            .field("backend", &self.backend.name())
            .finish()
    }
}
