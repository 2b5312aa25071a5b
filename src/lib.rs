//! Kelpie: Bluetooth peripheral orchestration over platform command-line
//! tools.
//!
//! Discovers, pairs with, connects to, and captures audio from nearby
//! Bluetooth peripherals by driving pre-existing platform tools — the
//! BlueZ/PulseAudio stack on a privileged desktop, the Termux API layer on
//! a non-rooted mobile host, or a simulated backend when neither exists.
//!
//! # Architecture
//!
//! Operations flow through a small stack of layers:
//! - **Probe**: classify the host into an execution profile, once
//! - **Backend**: the profile's implementation of every operation
//! - **Runner**: one tool invocation with a single heal-and-retry, plus
//!   ordered fallback chains
//! - **Invoker**: spawn the tool, capture output, validate, classify
//!
//! The [`Session`] facade ties these together for embedding callers; menu
//! and network frontends live outside this crate.

pub mod backend;
pub mod config;
pub mod error;
pub mod heal;
pub mod invoke;
pub mod outcome;
pub mod paths;
pub mod probe;
pub mod report;
pub mod runner;
pub mod session;
pub mod startup;
pub mod target;

#[cfg(test)]
pub mod test_utils;

pub use config::OpsConfig;
pub use error::{KelpieError, Result};
pub use outcome::{
    ConnectOutcome, Device, DisruptOutcome, IdentityOutcome, PairOutcome, PlaybackOutcome,
    RecordOutcome, SignalSample,
};
pub use probe::{BackendSelector, ExecutionProfile};
pub use session::{Session, probe_environment};
pub use target::{AddressType, Target};
