//! The state-space model operator contract.

use ndarray::{ArrayView1, ArrayViewMut1, ArrayViewMut2, Axis};

/// Operator contract of a linear Gaussian state-space model with scalar
/// observations.
///
/// All operations are time-indexed by a zero-based `pos`. Every operator
/// must be linear and consistent across calls at the same `pos` within one
/// filter or smoother pass: no hidden mutable state keyed by call order.
///
/// Implementations are free to apply `T` in less than O(d²) — the filter
/// never asks for the transition matrix itself, only for its action on
/// vectors and matrix columns.
pub trait Ssf {
    /// State dimension `d`.
    fn dim(&self) -> usize;

    /// Number of independent innovations `k <= d`.
    fn innovations_dim(&self) -> usize;

    /// Whether innovations enter the transition at `pos`.
    fn has_innovations(&self, pos: usize) -> bool;

    /// Whether `T`, `Z`, `S` and `H` are the same at every `pos`.
    ///
    /// Lets consumers hoist per-step derived quantities (such as the dense
    /// `Z` vector used by the smoother's N-recursion) out of the loop.
    fn is_time_invariant(&self) -> bool;

    /// In place, `x <- T(pos) * x`.
    fn tx(&self, pos: usize, x: ArrayViewMut1<f64>);

    /// In place, `x <- T'(pos) * x` (transpose application, used by the
    /// backward recursions).
    fn xt(&self, pos: usize, x: ArrayViewMut1<f64>);

    /// Applies `T(pos)` to every column of `m`.
    fn t_columns(&self, pos: usize, mut m: ArrayViewMut2<f64>) {
        for col in m.axis_iter_mut(Axis(1)) {
            self.tx(pos, col);
        }
    }

    /// Applies `T'(pos)` to every column of `m`.
    fn xt_columns(&self, pos: usize, mut m: ArrayViewMut2<f64>) {
        for col in m.axis_iter_mut(Axis(1)) {
            self.xt(pos, col);
        }
    }

    /// In place, `p += S(pos) * S'(pos)` (innovation covariance
    /// contribution of the time update).
    fn add_v(&self, pos: usize, p: ArrayViewMut2<f64>);

    /// `out = S'(pos) * x`, the projection of a state-adjoint vector onto
    /// innovation space. `out` has length [`Ssf::innovations_dim`].
    fn xs(&self, pos: usize, x: ArrayView1<f64>, out: ArrayViewMut1<f64>);

    /// Writes the `d x k` innovation loading matrix `S(pos)` into `out`.
    fn s(&self, pos: usize, out: ArrayViewMut2<f64>);

    /// `Z(pos) . x`.
    fn z_dot(&self, pos: usize, x: ArrayView1<f64>) -> f64;

    /// In place, `x += d * Z'(pos)`.
    fn add_z_scaled(&self, pos: usize, x: ArrayViewMut1<f64>, d: f64);

    /// Measurement error variance `H(pos)`, 0 if the model has none.
    fn error_variance(&self, pos: usize) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArmaSsf;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2};

    #[test]
    fn object_safe() {
        fn takes_dyn(m: &dyn Ssf) -> usize {
            m.dim()
        }
        let m = ArmaSsf::new(&[0.5], &[0.3]);
        assert_eq!(takes_dyn(&m), 2);
    }

    #[test]
    fn default_t_columns_matches_tx() {
        let m = ArmaSsf::new(&[0.5, -0.3], &[0.4]);
        let d = m.dim();

        let mut cols = Array2::zeros((d, d));
        for j in 0..d {
            cols[[j, j]] = 1.0;
        }
        m.t_columns(0, cols.view_mut());

        for j in 0..d {
            let mut e = Array1::zeros(d);
            e[j] = 1.0;
            m.tx(0, e.view_mut());
            for i in 0..d {
                assert_abs_diff_eq!(cols[[i, j]], e[i], epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn xt_is_transpose_of_tx() {
        let m = ArmaSsf::new(&[0.5, -0.3], &[0.4, 0.2]);
        let d = m.dim();

        // T[i][j] via tx probes, T'[j][i] via xt probes; must agree.
        for j in 0..d {
            let mut e = Array1::zeros(d);
            e[j] = 1.0;
            m.tx(0, e.view_mut());
            for i in 0..d {
                let mut u = Array1::zeros(d);
                u[i] = 1.0;
                m.xt(0, u.view_mut());
                assert_abs_diff_eq!(e[i], u[j], epsilon = 1e-14);
            }
        }
    }
}
