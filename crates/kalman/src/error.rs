//! Error types for the kronos-kalman crate.

use kronos_ssf::SsfError;

/// Error type for fallible filtering operations.
///
/// Only legitimate model/data outcomes live here; programming errors
/// (out-of-range reads, saving out of order) panic instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KalmanError {
    /// The initialization strategy could not produce a usable starting
    /// `(a, P)` pair.
    #[error("filter initialization failed: {0}")]
    InitializationFailed(#[from] SsfError),
}
