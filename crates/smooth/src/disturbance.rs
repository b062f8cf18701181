//! Backward disturbance smoothing over stored filtering results.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tracing::debug;

use kronos_kalman::DefaultFilteringResults;
use kronos_ssf::linalg::{quad_form, symmetrize, transpose_in_place};
use kronos_ssf::Ssf;

/// Backward recursion producing smoothed transition innovations and
/// smoothed measurement errors from a completed filter pass.
///
/// One forward pass stored in [`DefaultFilteringResults`] (light storage
/// suffices) feeds any number of backward passes. The recursion carries
/// the weighted residual sum `R` and, when variances are requested, the
/// information matrix `N`; the smoothed innovation attributed to position
/// `pos` is the one entering the transition from `pos - 1` to `pos`,
/// `U(pos) = S'(pos-1) R(pos-1)`, with variance `I - S' N S`.
///
/// Variance computation roughly doubles the per-step cost (the `N`
/// recursion is O(d^2) per step), so it is off by default.
#[derive(Clone, Debug)]
pub struct DisturbanceSmoother {
    variances: bool,
    rescale: bool,
}

impl Default for DisturbanceSmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl DisturbanceSmoother {
    /// Smoother computing means only, with unit-variance scaling.
    pub fn new() -> Self {
        Self {
            variances: false,
            rescale: false,
        }
    }

    /// Also carries the `N` recursion and stores smoothed variances.
    pub fn with_variances(mut self, variances: bool) -> Self {
        self.variances = variances;
        self
    }

    /// Rescales all stored variances by the filter's residual variance
    /// estimator, for models specified up to an unknown common scale.
    pub fn with_rescale(mut self, rescale: bool) -> Self {
        self.rescale = rescale;
        self
    }

    /// Runs the backward pass over `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics when `results` does not hold a completed pass covering the
    /// range at the model's dimension, or when `start >= end`.
    #[tracing::instrument(skip(self, model, results))]
    pub fn process<M>(
        &self,
        model: &M,
        results: &DefaultFilteringResults,
        start: usize,
        end: usize,
    ) -> SmoothedDisturbances
    where
        M: Ssf + ?Sized,
    {
        assert!(
            results.is_initialized(start, end),
            "range [{start}, {end}) not covered by the filtering results"
        );
        assert_eq!(
            model.dim(),
            results.dim(),
            "model and results dimensions differ"
        );
        assert!(start < end, "empty smoothing range");

        let d = model.dim();
        let k = model.innovations_dim();
        let mut out = SmoothedDisturbances::new(start, end, self.variances);

        let mut r = Array1::zeros(d);
        let mut n_mat = self.variances.then(|| Array2::zeros((d, d)));
        let mut kg = Array1::zeros(d);
        let mut w = Array1::zeros(d);
        let mut z = Array1::zeros(d);
        let mut s_mat = Array2::zeros((d, k));
        if model.is_time_invariant() {
            model.add_z_scaled(end - 1, z.view_mut(), 1.0);
        }

        for pos in (start..end).rev() {
            // e present implies f > 0; f == 0 steps carry no information
            // and are treated like missing ones.
            let mut c_coef = f64::NAN;
            let mut v_coef = f64::NAN;

            if let Some(e) = results.error(pos) {
                let f = results
                    .error_variance(pos)
                    .expect("recorded error without a variance");
                if !model.is_time_invariant() {
                    z.fill(0.0);
                    model.add_z_scaled(pos, z.view_mut(), 1.0);
                }

                // K = T (C / f)
                kg.assign(&results.m(pos));
                kg.mapv_inplace(|x| x / f);
                model.tx(pos, kg.view_mut());

                c_coef = e / f - r.dot(&kg);

                if let Some(n) = n_mat.as_mut() {
                    // v and W use the pre-update N.
                    v_coef = 1.0 / f + quad_form(n.view(), kg.view());
                    w.assign(&n.dot(&kg));
                    model.xt(pos, w.view_mut());

                    // N <- T' N T, exploiting symmetry of N.
                    model.xt_columns(pos, n.view_mut());
                    transpose_in_place(n.view_mut());
                    model.xt_columns(pos, n.view_mut());
                    for i in 0..d {
                        for j in 0..d {
                            n[[i, j]] += v_coef * z[i] * z[j] - w[i] * z[j] - z[i] * w[j];
                        }
                    }
                    symmetrize(n.view_mut());
                }

                // R <- T' R + c Z'
                model.xt(pos, r.view_mut());
                model.add_z_scaled(pos, r.view_mut(), c_coef);
            } else {
                if let Some(n) = n_mat.as_mut() {
                    model.xt_columns(pos, n.view_mut());
                    transpose_in_place(n.view_mut());
                    model.xt_columns(pos, n.view_mut());
                    symmetrize(n.view_mut());
                }
                model.xt(pos, r.view_mut());
            }

            // Innovation entering the transition into pos; undefined at the
            // start of the range (no transition inside the range precedes it).
            if pos > start && model.has_innovations(pos - 1) {
                let mut u = Array1::zeros(k);
                model.xs(pos - 1, r.view(), u.view_mut());
                out.u[pos - start] = Some(u);
                if let (Some(n), Some(u_var)) = (n_mat.as_ref(), out.u_var.as_mut()) {
                    model.s(pos - 1, s_mat.view_mut());
                    let mut v = Array2::eye(k);
                    v -= &s_mat.t().dot(&n.dot(&s_mat));
                    symmetrize(v.view_mut());
                    u_var[pos - start] = Some(v);
                }
            }

            // Smoothed measurement error at pos, expressed through the
            // residual coefficient of this step.
            if pos > start && c_coef.is_finite() {
                let h = model.error_variance(pos - 1);
                out.esm[pos - start] = c_coef * h;
                if self.variances && pos - 1 > start {
                    out.esm_var[pos - start] = h - h * h * v_coef;
                }
            }
        }

        out.a0 = results.initial_state().to_owned();
        out.p0 = results.initial_cov().to_owned();
        out.r_final = r;

        if self.rescale {
            let factor = results.var();
            debug!(factor, "rescaling smoothed variances");
            if let Some(u_var) = out.u_var.as_mut() {
                for v in u_var.iter_mut().flatten() {
                    v.mapv_inplace(|x| x * factor);
                }
            }
            for v in &mut out.esm_var {
                *v *= factor;
            }
        }

        out
    }
}

/// Output of one backward pass of the [`DisturbanceSmoother`].
///
/// Quantities are indexed by the positions of the smoothed range; readers
/// panic outside it. `None` / absent values mark positions where the
/// quantity is undefined (no innovations enter at that transition, the
/// observation was missing, or the position is the start of the range).
#[derive(Clone, Debug)]
pub struct SmoothedDisturbances {
    start: usize,
    end: usize,
    u: Vec<Option<Array1<f64>>>,
    u_var: Option<Vec<Option<Array2<f64>>>>,
    esm: Vec<f64>,
    esm_var: Vec<f64>,
    a0: Array1<f64>,
    p0: Array2<f64>,
    r_final: Array1<f64>,
}

impl SmoothedDisturbances {
    fn new(start: usize, end: usize, variances: bool) -> Self {
        let len = end - start;
        Self {
            start,
            end,
            u: vec![None; len],
            u_var: variances.then(|| vec![None; len]),
            esm: vec![f64::NAN; len],
            esm_var: vec![f64::NAN; len],
            a0: Array1::zeros(0),
            p0: Array2::zeros((0, 0)),
            r_final: Array1::zeros(0),
        }
    }

    fn idx(&self, pos: usize) -> usize {
        assert!(
            pos >= self.start && pos < self.end,
            "position {} outside the smoothed range [{}, {})",
            pos,
            self.start,
            self.end
        );
        pos - self.start
    }

    /// First smoothed position.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last smoothed position.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Smoothed (standardized) innovation entering the transition from
    /// `pos - 1` to `pos`. `None` at the range start and where the model
    /// has no innovations.
    pub fn u(&self, pos: usize) -> Option<ArrayView1<'_, f64>> {
        self.u[self.idx(pos)].as_ref().map(|u| u.view())
    }

    /// Covariance of [`SmoothedDisturbances::u`]; `None` unless variances
    /// were requested and the innovation is defined at `pos`.
    pub fn u_var(&self, pos: usize) -> Option<ArrayView2<'_, f64>> {
        self.u_var
            .as_ref()
            .and_then(|v| v[self.idx(pos)].as_ref().map(|m| m.view()))
    }

    /// Smoothed measurement error associated with position `pos`.
    pub fn measurement_error(&self, pos: usize) -> Option<f64> {
        let e = self.esm[self.idx(pos)];
        e.is_finite().then_some(e)
    }

    /// Variance of [`SmoothedDisturbances::measurement_error`].
    pub fn measurement_error_var(&self, pos: usize) -> Option<f64> {
        let v = self.esm_var[self.idx(pos)];
        v.is_finite().then_some(v)
    }

    /// Smoothed state at the start of the range, `a0 + P0 R`, where
    /// `(a0, P0)` is the prior the filter pass started from.
    pub fn first_smoothed_state(&self) -> Array1<f64> {
        &self.a0 + &self.p0.dot(&self.r_final)
    }
}
