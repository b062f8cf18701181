//! Prediction-error-decomposition likelihood accumulator.

use ndarray::{ArrayView1, ArrayView2};

use crate::results::{FilterSink, FilterStep};

/// Streaming accumulator of the Gaussian log-likelihood via prediction
/// error decomposition.
///
/// Consumes the per-step `(e, f)` pairs — either live, as a
/// [`FilterSink`] during the filter pass, or after the fact through
/// [`PredictionErrorDecomposition::add`] — and keeps only three scalars:
/// `sum(e^2/f)`, `sum(ln f)` and the count of information-bearing steps.
/// Missing steps contribute to none of them, which makes the two sums
/// additive and separable across sub-ranges.
///
/// As a sink it also honors the initializer's proper-start index: steps
/// of the diffuse phase are excluded from all three sums.
///
/// Standardized residuals `e/sqrt(f)` can optionally be retained for
/// diagnostics.
#[derive(Clone, Debug, Default)]
pub struct PredictionErrorDecomposition {
    ssq: f64,
    log_det: f64,
    n: usize,
    proper_start: usize,
    residuals: Option<Vec<f64>>,
}

impl PredictionErrorDecomposition {
    /// Accumulator keeping only the sums.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator additionally retaining standardized residuals.
    pub fn with_residuals() -> Self {
        Self {
            residuals: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Adds one prediction error with variance `f > 0`.
    pub fn add(&mut self, e: f64, f: f64) {
        debug_assert!(f > 0.0);
        self.ssq += e * e / f;
        self.log_det += f.ln();
        self.n += 1;
        if let Some(res) = &mut self.residuals {
            res.push(e / f.sqrt());
        }
    }

    /// Count of accumulated (non-missing) steps.
    pub fn n(&self) -> usize {
        self.n
    }

    /// `sum(e^2 / f)`.
    pub fn ssq(&self) -> f64 {
        self.ssq
    }

    /// `sum(ln f)`.
    pub fn log_determinant(&self) -> f64 {
        self.log_det
    }

    /// Estimated residual variance `ssq / n`; 0 when nothing accumulated.
    pub fn sigma2(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.ssq / self.n as f64
        }
    }

    /// Gaussian log-likelihood with unit scale:
    /// `-0.5 * (n ln(2 pi) + sum(ln f) + sum(e^2/f))`.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.n as f64;
        -0.5 * (n * (2.0 * std::f64::consts::PI).ln() + self.log_det + self.ssq)
    }

    /// Log-likelihood concentrated over the scale, evaluated at
    /// `sigma2 = ssq/n`:
    /// `-0.5 * (n ln(2 pi) + n ln(ssq/n) + n + sum(ln f))`.
    pub fn concentrated_log_likelihood(&self) -> f64 {
        let n = self.n as f64;
        -0.5 * (n * (2.0 * std::f64::consts::PI).ln() + n * self.sigma2().ln() + n + self.log_det)
    }

    /// Retained standardized residuals, if requested at construction.
    pub fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }
}

impl FilterSink for PredictionErrorDecomposition {
    fn save_initial(&mut self, _a0: ArrayView1<f64>, _p0: ArrayView2<f64>, proper_start: usize) {
        self.proper_start = proper_start;
    }

    fn save(&mut self, pos: usize, step: &FilterStep<'_>) {
        if pos < self.proper_start {
            return;
        }
        if let (Some(e), Some(f)) = (step.e, step.f) {
            self.add(e, f);
        }
    }
}
