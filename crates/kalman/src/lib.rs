//! # kronos-kalman
//!
//! Univariate Kalman filtering over the [`kronos_ssf::Ssf`] operator
//! contract:
//!
//! - [`OrdinaryFilter`] — the forward recursion producing one-step-ahead
//!   predictions and prediction errors,
//! - [`DefaultFilteringResults`] — append-only per-step storage (light or
//!   full) consumed by the smoothers in `kronos-smooth`,
//! - [`PredictionErrorDecomposition`] — streaming Gaussian log-likelihood
//!   accumulator over the same `(e, f)` pairs,
//! - [`FastFilter`] — re-applies the gains of a completed pass to
//!   auxiliary series without recomputing covariances.
//!
//! All recursions are strictly sequential in the time index; one filter
//! pass owns its scratch exclusively. Completed results storage is
//! read-only and may be shared across concurrent downstream passes.

mod error;
mod fast;
mod filter;
mod likelihood;
mod results;

pub use error::KalmanError;
pub use fast::FastFilter;
pub use filter::OrdinaryFilter;
pub use likelihood::PredictionErrorDecomposition;
pub use results::{DefaultFilteringResults, DiscardSink, FilterSink, FilterStep};
