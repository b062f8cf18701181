//! Error types for the kronos-ssf crate.

/// Error type for fallible model-level operations.
///
/// Only legitimate model/data outcomes live here; violations of caller
/// contracts (out-of-range positions, wrong buffer shapes) panic instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SsfError {
    /// The model admits no finite stationary covariance (unit root or
    /// explosive transition).
    #[error("model admits no finite stationary covariance")]
    NonStationary,

    /// Caller-supplied data does not match the model's state dimension.
    #[error("state dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// The model's state dimension.
        expected: usize,
        /// The dimension actually supplied.
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_non_stationary() {
        assert_eq!(
            SsfError::NonStationary.to_string(),
            "model admits no finite stationary covariance"
        );
    }

    #[test]
    fn error_dimension_mismatch() {
        let err = SsfError::DimensionMismatch {
            expected: 2,
            got: 1,
        };
        assert_eq!(err.to_string(), "state dimension mismatch: expected 2, got 1");
    }

    #[test]
    fn error_is_std_error() {
        fn assert_impl<T: std::error::Error + Send + Sync>() {}
        assert_impl::<SsfError>();
    }
}
