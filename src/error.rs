//! Error types for the orchestration core.

use crate::invoke::InvokeError;

/// Top-level error type for the orchestration core.
///
/// Tool-level failures (`ToolMissing`, `ValidationRejected`, `NonZeroExit`)
/// are carried verbatim in the [`Invoke`](KelpieError::Invoke) variant; the
/// backends catch the kinds they use to drive fallback chains and let the
/// rest bubble up unchanged.
#[derive(Debug, thiserror::Error)]
pub enum KelpieError {
    /// Malformed target address or address type.
    #[error("invalid target: {0}")]
    Target(String),

    /// External tool invocation failure.
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    /// Configuration load/save error.
    #[error("config error: {0}")]
    Config(String),

    /// The operation is not available on the active execution profile.
    #[error("unsupported on this profile: {0}")]
    Unsupported(String),

    /// Report file error.
    #[error("report error: {0}")]
    Report(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, KelpieError>;
