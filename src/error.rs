//! Error kinds raised by probe operations.

/// Errors returned by probe construction and lifecycle calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// A probe was requested with an empty marker.
    #[error("Marker must be specified")]
    InvalidMarker,

    /// `end()` or `checkpoint()` was called on a probe that is already closed.
    #[error("Probe '{marker}' is already ended")]
    AlreadyEnded { marker: String },

    /// Process-wide settings were already established.
    #[error("Probe settings are already initialized")]
    AlreadyInitialized,
}

/// Convenience alias for probe results.
pub type Result<T> = std::result::Result<T, ProbeError>;
