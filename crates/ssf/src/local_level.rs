//! Scalar local-level (random walk plus noise) model.

use ndarray::{ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::model::Ssf;

/// Local-level model: `a[t+1] = a[t] + u[t]`, `y[t] = a[t] + eps[t]`,
/// with state noise variance `q` and measurement variance `h`.
///
/// The state is non-stationary (unit root), so the stationary initializer
/// rejects it; use [`FixedInitializer`](crate::FixedInitializer) with an
/// explicit prior. With `q = 0` the model degenerates to a constant level
/// observed in noise.
#[derive(Clone, Copy, Debug)]
pub struct LocalLevel {
    q: f64,
    h: f64,
}

impl LocalLevel {
    /// Builds a local-level model with state noise `q` and measurement
    /// noise `h` (both variances, `>= 0`).
    pub fn new(q: f64, h: f64) -> Self {
        Self { q, h }
    }
}

impl Ssf for LocalLevel {
    fn dim(&self) -> usize {
        1
    }

    fn innovations_dim(&self) -> usize {
        usize::from(self.q > 0.0)
    }

    fn has_innovations(&self, _pos: usize) -> bool {
        self.q > 0.0
    }

    fn is_time_invariant(&self) -> bool {
        true
    }

    fn tx(&self, _pos: usize, _x: ArrayViewMut1<f64>) {
        // T = 1
    }

    fn xt(&self, _pos: usize, _x: ArrayViewMut1<f64>) {}

    fn add_v(&self, _pos: usize, mut p: ArrayViewMut2<f64>) {
        p[[0, 0]] += self.q;
    }

    fn xs(&self, _pos: usize, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        out[0] = self.q.sqrt() * x[0];
    }

    fn s(&self, _pos: usize, mut out: ArrayViewMut2<f64>) {
        out[[0, 0]] = self.q.sqrt();
    }

    fn z_dot(&self, _pos: usize, x: ArrayView1<f64>) -> f64 {
        x[0]
    }

    fn add_z_scaled(&self, _pos: usize, mut x: ArrayViewMut1<f64>, d: f64) {
        x[0] += d;
    }

    fn error_variance(&self, _pos: usize) -> f64 {
        self.h
    }
}
