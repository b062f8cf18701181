//! # kronos-ssf
//!
//! Linear Gaussian state-space model contract for univariate observations:
//!
//! ```text
//! a[t+1] = T(t) * a[t] + S(t) * u[t]     (state transition, u ~ N(0, I))
//! y[t]   = Z(t) * a[t] + eps[t]          (observation, eps ~ N(0, H(t)))
//! ```
//!
//! The model is exposed as an *operator* contract ([`Ssf`]) rather than as
//! stored matrices, so that structured models (companion forms, local
//! levels) can apply `T` in O(d) instead of O(d²). Filtering and smoothing
//! engines in `kronos-kalman` and `kronos-smooth` are fully generic over
//! this contract.
//!
//! Also provided here:
//! - [`Observations`] — a bounded sequence with an explicit missing test,
//! - [`Initializer`] — pluggable strategy producing the starting `(a, P)`,
//!   with [`StationaryInitializer`] and [`FixedInitializer`],
//! - two concrete models: [`ArmaSsf`] (companion form) and [`LocalLevel`],
//! - small dense linear-algebra helpers shared by the engines.

mod arma;
mod error;
mod initialization;
mod local_level;
mod model;
mod observations;

pub mod linalg;

pub use arma::ArmaSsf;
pub use error::SsfError;
pub use initialization::{FixedInitializer, Initializer, StationaryInitializer};
pub use local_level::LocalLevel;
pub use model::Ssf;
pub use observations::Observations;
