//! Companion-form state space for ARMA(p,q) models.
//!
//! ```text
//! a[t+1] = T * a[t] + S * u[t]     (state transition)
//! y[t]   = a[t][0] + eps[t]        (observation)
//! ```
//!
//! `T` is the r×r companion matrix (`r = max(p, q+1)`, minimum 1) with the
//! AR coefficients in its first column and ones on the super-diagonal;
//! `S = sqrt(sigma2) * [1, theta_1, …, theta_q, 0, …]'` carries the single
//! innovation into the state. The structure makes both `T` and `T'`
//! applicable in O(r) per vector.

use ndarray::{ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::model::Ssf;

/// ARMA(p,q) model in companion state-space form.
///
/// ARMA(0,0) degenerates to white noise (`T = 0`, `r = 1`). An optional
/// measurement error variance can be attached for signal-plus-noise
/// set-ups.
///
/// # Example
///
/// ```
/// use kronos_ssf::{ArmaSsf, Ssf};
///
/// let m = ArmaSsf::new(&[0.7], &[0.3]).with_sigma2(2.0);
/// assert_eq!(m.dim(), 2);
/// assert_eq!(m.innovations_dim(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct ArmaSsf {
    ar: Vec<f64>,
    dim: usize,
    /// `[1, theta_1, …, theta_q, 0, …]`, unscaled.
    psi: Vec<f64>,
    sigma2: f64,
    h: f64,
}

impl ArmaSsf {
    /// Builds the companion form from AR and MA coefficients, with unit
    /// innovation variance and no measurement error.
    pub fn new(ar: &[f64], ma: &[f64]) -> Self {
        let p = ar.len();
        let q = ma.len();
        let dim = p.max(q + 1).max(1);

        let mut psi = vec![0.0; dim];
        psi[0] = 1.0;
        psi[1..=q].copy_from_slice(ma);

        Self {
            ar: ar.to_vec(),
            dim,
            psi,
            sigma2: 1.0,
            h: 0.0,
        }
    }

    /// Sets the innovation variance (`sigma2 > 0`).
    pub fn with_sigma2(mut self, sigma2: f64) -> Self {
        self.sigma2 = sigma2;
        self
    }

    /// Attaches a measurement error variance `H`.
    pub fn with_error_variance(mut self, h: f64) -> Self {
        self.h = h;
        self
    }

    /// Innovation variance.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }
}

impl Ssf for ArmaSsf {
    fn dim(&self) -> usize {
        self.dim
    }

    fn innovations_dim(&self) -> usize {
        1
    }

    fn has_innovations(&self, _pos: usize) -> bool {
        true
    }

    fn is_time_invariant(&self) -> bool {
        true
    }

    fn tx(&self, _pos: usize, mut x: ArrayViewMut1<f64>) {
        // (Tx)[i] = ar[i]*x[0] + x[i+1], with x[r] taken as 0.
        let x0 = x[0];
        let d = self.dim;
        for i in 0..d {
            let shifted = if i + 1 < d { x[i + 1] } else { 0.0 };
            let phi = self.ar.get(i).copied().unwrap_or(0.0);
            x[i] = phi * x0 + shifted;
        }
    }

    fn xt(&self, _pos: usize, mut x: ArrayViewMut1<f64>) {
        // (T'x)[0] = sum_i ar[i]*x[i]; (T'x)[j] = x[j-1] for j >= 1.
        let mut dot = 0.0;
        for (i, &phi) in self.ar.iter().enumerate() {
            dot += phi * x[i];
        }
        let d = self.dim;
        for j in (1..d).rev() {
            x[j] = x[j - 1];
        }
        x[0] = dot;
    }

    fn add_v(&self, _pos: usize, mut p: ArrayViewMut2<f64>) {
        for i in 0..self.dim {
            for j in 0..self.dim {
                p[[i, j]] += self.sigma2 * self.psi[i] * self.psi[j];
            }
        }
    }

    fn xs(&self, _pos: usize, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        let scale = self.sigma2.sqrt();
        let mut acc = 0.0;
        for i in 0..self.dim {
            acc += self.psi[i] * x[i];
        }
        out[0] = scale * acc;
    }

    fn s(&self, _pos: usize, mut out: ArrayViewMut2<f64>) {
        let scale = self.sigma2.sqrt();
        for i in 0..self.dim {
            out[[i, 0]] = scale * self.psi[i];
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2};

    /// Materializes T by probing `tx` with unit vectors.
    fn dense_t(m: &ArmaSsf) -> Array2<f64> {
        let d = m.dim();
        let mut t = Array2::zeros((d, d));
        for j in 0..d {
            let mut e = Array1::zeros(d);
            e[j] = 1.0;
            m.tx(0, e.view_mut());
            for i in 0..d {
                t[[i, j]] = e[i];
            }
        }
        t
    }

    #[test]
    fn ar1() {
        let m = ArmaSsf::new(&[0.5], &[]);
        assert_eq!(m.dim(), 1);
        let t = dense_t(&m);
        assert_abs_diff_eq!(t[[0, 0]], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn ma1_companion_layout() {
        let m = ArmaSsf::new(&[], &[0.8]);
        assert_eq!(m.dim(), 2);
        let t = dense_t(&m);

        // T = [[0, 1], [0, 0]]
        assert_abs_diff_eq!(t[[0, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[0, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[1, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[1, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn arma21_companion_layout() {
        let m = ArmaSsf::new(&[0.5, -0.3], &[0.4]);
        assert_eq!(m.dim(), 2);
        let t = dense_t(&m);

        // T = [[0.5, 1.0], [-0.3, 0.0]]
        assert_abs_diff_eq!(t[[0, 0]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[0, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[1, 0]], -0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[1, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn arma22_companion_layout() {
        let m = ArmaSsf::new(&[0.5, -0.3], &[0.4, 0.2]);
        assert_eq!(m.dim(), 3);
        let t = dense_t(&m);

        // T = [[0.5, 1, 0], [-0.3, 0, 1], [0, 0, 0]]
        assert_abs_diff_eq!(t[[0, 0]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[0, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[0, 2]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[1, 0]], -0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[1, 2]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[2, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t[[2, 2]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn arma00_is_white_noise() {
        let m = ArmaSsf::new(&[], &[]);
        assert_eq!(m.dim(), 1);
        let t = dense_t(&m);
        assert_abs_diff_eq!(t[[0, 0]], 0.0, epsilon = 1e-12);

        let mut s = Array2::zeros((1, 1));
        m.s(0, s.view_mut());
        assert_abs_diff_eq!(s[[0, 0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn innovation_loading_scaled_by_sigma() {
        let m = ArmaSsf::new(&[0.7], &[0.3]).with_sigma2(4.0);
        let mut s = Array2::zeros((2, 1));
        m.s(0, s.view_mut());
        assert_abs_diff_eq!(s[[0, 0]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s[[1, 0]], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn add_v_is_outer_product() {
        let m = ArmaSsf::new(&[0.5, -0.3], &[0.4]).with_sigma2(2.0);
        let d = m.dim();
        let mut p = Array2::zeros((d, d));
        m.add_v(0, p.view_mut());

        let mut s = Array2::zeros((d, 1));
        m.s(0, s.view_mut());
        for i in 0..d {
            for j in 0..d {
                assert_abs_diff_eq!(p[[i, j]], s[[i, 0]] * s[[j, 0]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn xs_matches_s_dot() {
        let m = ArmaSsf::new(&[0.5], &[0.4, 0.2]).with_sigma2(1.5);
        let d = m.dim();
        let x = Array1::from(vec![0.3, -1.2, 2.0]);

        let mut u = Array1::zeros(1);
        m.xs(0, x.view(), u.view_mut());

        let mut s = Array2::zeros((d, 1));
        m.s(0, s.view_mut());
        let expected: f64 = (0..d).map(|i| s[[i, 0]] * x[i]).sum();
        assert_abs_diff_eq!(u[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn loading_reads_first_component() {
        let m = ArmaSsf::new(&[0.7], &[0.3]);
        let x = Array1::from(vec![1.5, -2.0]);
        assert_abs_diff_eq!(m.z_dot(0, x.view()), 1.5, epsilon = 1e-14);

        let mut y = Array1::zeros(2);
        m.add_z_scaled(0, y.view_mut(), 3.0);
        assert_abs_diff_eq!(y[0], 3.0, epsilon = 1e-14);
        assert_abs_diff_eq!(y[1], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn error_variance_default_zero() {
        let m = ArmaSsf::new(&[0.7], &[]);
        assert_eq!(m.error_variance(0), 0.0);
        let m = m.with_error_variance(0.25);
        assert_eq!(m.error_variance(5), 0.25);
    }
}
