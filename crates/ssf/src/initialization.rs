//! Initialization strategies producing the filter's starting `(a, P)`.

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::error::SsfError;
use crate::linalg::{lu_solve_in_place, symmetrize};
use crate::model::Ssf;

/// Pluggable strategy producing the starting state and covariance of a
/// filter pass.
///
/// `initialize` fills `a` and `p` (preallocated at the model's dimension)
/// and returns `Ok(proper_start)`, the first index at which the proper
/// (non-diffuse) recursion holds — callers skip prediction-error
/// contributions before it. Failure (e.g. a non-stationary model handed
/// to the stationary strategy, or a prior of the wrong dimension) is a
/// legitimate model/data outcome that the caller must branch on, never a
/// panic.
pub trait Initializer {
    /// Produces the initial `(a, P)` for a pass beginning at `start`.
    ///
    /// # Errors
    ///
    /// [`SsfError::NonStationary`] when no finite starting covariance
    /// exists, [`SsfError::DimensionMismatch`] when a supplied prior does
    /// not fit the model.
    fn initialize(
        &self,
        model: &dyn Ssf,
        start: usize,
        a: &mut Array1<f64>,
        p: &mut Array2<f64>,
    ) -> Result<usize, SsfError>;
}

/// Stationary initialization: `a(0) = 0` and `P(0)` solving the discrete
/// Lyapunov equation `P = T P T' + V`.
///
/// Dense `T` and `V` are materialized once through the operator contract
/// (unit-vector probes), outside the recursion loop, and the vectorized
/// system `(I - T (x) T) vec(P) = vec(V)` is LU-solved. A unit root makes
/// the system singular and the strategy reports failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct StationaryInitializer;

impl StationaryInitializer {
    /// Creates the stationary strategy.
    pub fn new() -> Self {
        Self
    }
}

impl Initializer for StationaryInitializer {
    fn initialize(
        &self,
        model: &dyn Ssf,
        start: usize,
        a: &mut Array1<f64>,
        p: &mut Array2<f64>,
    ) -> Result<usize, SsfError> {
        let d = model.dim();
        debug_assert_eq!(a.len(), d);

        // Dense T via unit-vector probes of the transition operator.
        let mut t = Array2::zeros((d, d));
        for j in 0..d {
            let mut e = Array1::zeros(d);
            e[j] = 1.0;
            model.tx(start, e.view_mut());
            for i in 0..d {
                t[[i, j]] = e[i];
            }
        }

        // Dense V = S S'.
        let mut v = Array2::zeros((d, d));
        model.add_v(start, v.view_mut());

        // (I - T (x) T) vec(P) = vec(V), row-major vec indexing.
        let n = d * d;
        let mut sys = Array2::zeros((n, n));
        let mut rhs = Array1::zeros(n);
        for i in 0..d {
            for j in 0..d {
                let row = i * d + j;
                rhs[row] = v[[i, j]];
                for k in 0..d {
                    for l in 0..d {
                        let col = k * d + l;
                        let mut val = -t[[i, k]] * t[[j, l]];
                        if row == col {
                            val += 1.0;
                        }
                        sys[[row, col]] = val;
                    }
                }
            }
        }

        if !lu_solve_in_place(&mut sys, &mut rhs) {
            debug!(dim = d, "stationary initialization failed: singular Lyapunov system");
            return Err(SsfError::NonStationary);
        }

        for i in 0..d {
            for j in 0..d {
                p[[i, j]] = rhs[i * d + j];
            }
        }
        symmetrize(p.view_mut());

        // A valid stationary covariance is finite with a non-negative
        // diagonal; anything else means the model is not stationary.
        for i in 0..d {
            let pii = p[[i, i]];
            if !pii.is_finite() || pii < -1e-10 {
                debug!(dim = d, "stationary initialization failed: invalid covariance");
                return Err(SsfError::NonStationary);
            }
        }
        if p.iter().any(|x| !x.is_finite()) {
            return Err(SsfError::NonStationary);
        }

        a.fill(0.0);
        Ok(start)
    }
}

/// Caller-provided initial conditions.
///
/// Used for non-stationary models where the prior is chosen externally,
/// and by the fixed-point smoother to seed the augmented pass with the
/// state predicted at the reference time.
#[derive(Clone, Debug)]
pub struct FixedInitializer {
    a0: Array1<f64>,
    p0: Array2<f64>,
    diffuse_end: Option<usize>,
}

impl FixedInitializer {
    /// Wraps an explicit `(a0, P0)` pair; the proper recursion starts
    /// immediately.
    pub fn new(a0: Array1<f64>, p0: Array2<f64>) -> Self {
        Self {
            a0,
            p0,
            diffuse_end: None,
        }
    }

    /// Declares the position at which the diffuse phase concludes.
    pub fn with_diffuse_end(mut self, pos: usize) -> Self {
        self.diffuse_end = Some(pos);
        self
    }
}

impl Initializer for FixedInitializer {
    fn initialize(
        &self,
        model: &dyn Ssf,
        start: usize,
        a: &mut Array1<f64>,
        p: &mut Array2<f64>,
    ) -> Result<usize, SsfError> {
        if self.a0.len() != model.dim() {
            return Err(SsfError::DimensionMismatch {
                expected: model.dim(),
                got: self.a0.len(),
            });
        }
        a.assign(&self.a0);
        p.assign(&self.p0);
        Ok(self.diffuse_end.unwrap_or(start).max(start))
    }
}
