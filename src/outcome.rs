//! Operation outcomes and transient data produced by the backends.
//!
//! Several operations deliberately downgrade a failure into a soft
//! "assumed success with manual-action guidance" outcome; those downgrades
//! are separate variants so a caller can always tell them apart from a
//! confirmed success.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Terminal state of a pairing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// The target confirmed the bond (or reported it already exists).
    Paired,
    /// Pairing could not be confirmed; the operator may need to finish it
    /// manually. Connecting is still worth attempting.
    PairedAssumed { guidance: String },
    /// The target refused, or the pairing tools failed.
    Failed { reason: String },
}

/// Terminal state of a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The link was established and validated.
    Connected,
    /// The request was dispatched or must be finished manually; link state
    /// is unconfirmed.
    Assumed { guidance: String },
    /// The connect command failed.
    Failed { reason: String },
}

/// Terminal state of an audio capture.
///
/// Cancellation is a normal terminal outcome, not an error: a stopped
/// capture reports the (possibly partial) file it wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Capture ended (completed or operator-stopped); data saved at `path`.
    Stopped { path: PathBuf },
    /// No audio was captured.
    Failed { reason: String },
}

/// Terminal state of a playback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Failed { reason: String },
}

/// Terminal state of an adapter identity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityOutcome {
    /// The identity sequence was applied.
    Applied,
    /// The active profile cannot reconfigure the adapter.
    Unsupported { reason: String },
    /// The sequence could not be driven at all.
    Failed { reason: String },
}

/// Terminal state of an audio disruption request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisruptOutcome {
    Applied,
    Failed { reason: String },
}

/// One discovered device. A snapshot: produced by a scan cycle, consumed by
/// the caller, never kept in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Hardware address as reported by the scanner.
    pub address: String,
    /// Display name, `"Unknown"` when the scanner omits it.
    pub name: String,
    /// Strongest observed signal, dBm, when the scanner reports one.
    pub rssi: Option<i16>,
    /// Whether the device is currently connected to this host.
    pub connected: bool,
    /// Whether the device is bonded with this host.
    pub bonded: bool,
}

impl Device {
    /// Short status label in scan listings.
    pub fn status_label(&self) -> &'static str {
        if self.connected {
            "CONNECTED"
        } else if self.bonded {
            "BONDED"
        } else {
            "AVAILABLE"
        }
    }
}

/// One sample from the signal monitor loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSample {
    /// Observed signal strength, dBm; `None` when the host could not read
    /// one this iteration.
    pub rssi: Option<i16>,
    /// When the sample was taken.
    pub at: DateTime<Utc>,
}
