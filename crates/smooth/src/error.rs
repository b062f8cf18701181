//! Error types for the kronos-smooth crate.

use kronos_kalman::KalmanError;

/// Error type for fallible smoothing operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SmoothError {
    /// The diffuse phase had not concluded by the fixed-point reference
    /// time, so the frozen state cannot be given a proper prior.
    #[error("diffuse phase not resolved at position {fixpos} (proper recursion starts at {proper_start})")]
    DiffuseNotResolved {
        /// Requested reference position.
        fixpos: usize,
        /// First position of the proper recursion.
        proper_start: usize,
    },

    /// An underlying filter pass failed.
    #[error(transparent)]
    Filter(#[from] KalmanError),
}
