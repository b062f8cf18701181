//! # kronos-smooth
//!
//! Backward-pass companions to the ordinary filter in `kronos-kalman`:
//!
//! - [`DisturbanceSmoother`] — the backward recursion producing smoothed
//!   estimates of the transition innovations and of the measurement
//!   error, with optional covariances,
//! - [`FixedPointSmoother`] — augments the state with a frozen copy (or
//!   linear transform) of the state at one reference time and keeps
//!   filtering, tracking how the estimate of that frozen quantity is
//!   revised as more data arrive.
//!
//! Both consume completed, read-only
//! [`DefaultFilteringResults`](kronos_kalman::DefaultFilteringResults);
//! running them over a range the filter did not complete is a programming
//! error and panics.

mod disturbance;
mod error;
mod fixed_point;

pub use disturbance::{DisturbanceSmoother, SmoothedDisturbances};
pub use error::SmoothError;
pub use fixed_point::{FixedPointResults, FixedPointSmoother};
