//! Per-step filtering output: the sink contract and its default storage.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// One step of filter output, valid during a single `save` call.
///
/// `a`, `p` and `c` are the *predicted* quantities `a(t|t-1)`,
/// `P(t|t-1)` and `C(t) = P(t|t-1) Z'` — before the correction and time
/// updates of step `t`.
///
/// `f` is present whenever the observation at `t` is; `e` is present only
/// when additionally `f > 0` (a structurally singular variance makes the
/// step information-free, like a missing observation).
#[derive(Clone, Copy, Debug)]
pub struct FilterStep<'a> {
    /// Predicted state `a(t|t-1)`.
    pub a: ArrayView1<'a, f64>,
    /// Predicted covariance `P(t|t-1)`.
    pub p: ArrayView2<'a, f64>,
    /// Gain-related column `C(t) = P(t|t-1) Z'`.
    pub c: ArrayView1<'a, f64>,
    /// Prediction error variance `f(t) = Z C + H`; `None` when the
    /// observation is missing.
    pub f: Option<f64>,
    /// Prediction error `e(t) = y(t) - Z a(t|t-1)`; `None` when missing
    /// or when `f <= 0`.
    pub e: Option<f64>,
}

/// Consumer of per-step filter output.
///
/// `save` is invoked exactly once per position, in increasing order,
/// during one filter pass. Implementations range from full storage
/// ([`DefaultFilteringResults`]) to streaming accumulators
/// ([`PredictionErrorDecomposition`](crate::PredictionErrorDecomposition)).
pub trait FilterSink {
    /// Receives the initialization output before the first step: the
    /// starting `(a, P)` and the index at which the proper recursion
    /// begins.
    fn save_initial(&mut self, _a0: ArrayView1<f64>, _p0: ArrayView2<f64>, _proper_start: usize) {}

    /// Receives the output of step `pos`.
    fn save(&mut self, pos: usize, step: &FilterStep<'_>);
}

/// Sink that ignores everything; for passes where only the filter's final
/// state matters.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardSink;

impl FilterSink for DiscardSink {
    fn save(&mut self, _pos: usize, _step: &FilterStep<'_>) {}
}

/// Random-access storage of filtering results over a contiguous range.
///
/// Two variants share one type: [`DefaultFilteringResults::light`] keeps
/// what the disturbance smoother needs (`a`, `C`, `e`, `f`) and
/// [`DefaultFilteringResults::full`] additionally keeps every `P(t|t-1)`,
/// for callers that must reconstruct component covariances later. The
/// choice is a memory/fidelity trade-off, not a behavioral difference.
///
/// After the producing pass completes the storage is read-only and may be
/// shared by several concurrent consumers.
///
/// # Panics
///
/// Readers panic on positions outside the recorded range, `p()` panics on
/// light storage, and `save` panics when called out of order — these are
/// programming errors, not data outcomes.
#[derive(Clone, Debug)]
pub struct DefaultFilteringResults {
    dim: usize,
    keep_covariances: bool,
    initialized: bool,
    start: usize,
    proper_start: usize,
    a0: Array1<f64>,
    p0: Array2<f64>,
    states: Vec<Array1<f64>>,
    gains: Vec<Array1<f64>>,
    covs: Vec<Array2<f64>>,
    errors: Vec<f64>,
    variances: Vec<f64>,
}

impl DefaultFilteringResults {
    fn new(dim: usize, keep_covariances: bool) -> Self {
        Self {
            dim,
            keep_covariances,
            initialized: false,
            start: 0,
            proper_start: 0,
            a0: Array1::zeros(dim),
            p0: Array2::zeros((dim, dim)),
            states: Vec::new(),
            gains: Vec::new(),
            covs: Vec::new(),
            errors: Vec::new(),
            variances: Vec::new(),
        }
    }

    /// Storage keeping `a`, `C`, `e`, `f` only.
    pub fn light(dim: usize) -> Self {
        Self::new(dim, false)
    }

    /// Storage additionally keeping every predicted covariance `P`.
    pub fn full(dim: usize) -> Self {
        Self::new(dim, true)
    }

    /// State dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// First recorded position.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last recorded position.
    pub fn end(&self) -> usize {
        self.start + self.errors.len()
    }

    /// Whether a filter pass has populated this storage over the whole of
    /// `[start, end)`.
    pub fn is_initialized(&self, start: usize, end: usize) -> bool {
        self.initialized && start >= self.start && end <= self.end()
    }

    /// Index at which the proper (non-diffuse) recursion began.
    pub fn proper_start(&self) -> usize {
        assert!(self.initialized, "no filter pass has been recorded");
        self.proper_start
    }

    /// Initial state produced by the pass's initializer.
    pub fn initial_state(&self) -> ArrayView1<'_, f64> {
        assert!(self.initialized, "no filter pass has been recorded");
        self.a0.view()
    }

    /// Initial covariance produced by the pass's initializer.
    pub fn initial_cov(&self) -> ArrayView2<'_, f64> {
        assert!(self.initialized, "no filter pass has been recorded");
        self.p0.view()
    }

    fn idx(&self, pos: usize) -> usize {
        assert!(
            pos >= self.start && pos < self.end(),
            "position {} outside the recorded range [{}, {})",
            pos,
            self.start,
            self.end()
        );
        pos - self.start
    }

    /// Prediction error `e(pos)`, `None` for information-free steps.
    pub fn error(&self, pos: usize) -> Option<f64> {
        let e = self.errors[self.idx(pos)];
        e.is_finite().then_some(e)
    }

    /// Prediction error variance `f(pos)`, `None` when the observation was
    /// missing. May be `Some(0.0)` for structurally singular steps.
    pub fn error_variance(&self, pos: usize) -> Option<f64> {
        let f = self.variances[self.idx(pos)];
        f.is_finite().then_some(f)
    }

    /// Predicted state `a(pos|pos-1)`.
    pub fn a(&self, pos: usize) -> ArrayView1<'_, f64> {
        self.states[self.idx(pos)].view()
    }

    /// Gain-related column `C(pos) = P(pos|pos-1) Z'`.
    pub fn m(&self, pos: usize) -> ArrayView1<'_, f64> {
        self.gains[self.idx(pos)].view()
    }

    /// Predicted covariance `P(pos|pos-1)`.
    ///
    /// # Panics
    ///
    /// Panics on light storage.
    pub fn p(&self, pos: usize) -> ArrayView2<'_, f64> {
        assert!(
            self.keep_covariances,
            "covariances were not recorded (light storage)"
        );
        self.covs[self.idx(pos)].view()
    }

    /// Mean standardized squared error `mean(e^2 / f)` over recorded
    /// information-bearing steps; 0 when there are none.
    pub fn var(&self) -> f64 {
        let mut ssq = 0.0;
        let mut n = 0usize;
        for (e, f) in self.errors.iter().zip(&self.variances) {
            if e.is_finite() {
                ssq += e * e / f;
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            ssq / n as f64
        }
    }

    /// Sum of `ln f(t)` over information-bearing steps, the log-determinant
    /// term of the prediction error decomposition.
    pub fn log_determinant(&self) -> f64 {
        self.errors
            .iter()
            .zip(&self.variances)
            .filter(|(e, _)| e.is_finite())
            .map(|(_, f)| f.ln())
            .sum()
    }
}

impl FilterSink for DefaultFilteringResults {
    fn save_initial(&mut self, a0: ArrayView1<f64>, p0: ArrayView2<f64>, proper_start: usize) {
        self.initialized = true;
        self.proper_start = proper_start;
        self.a0.assign(&a0);
        self.p0.assign(&p0);
        self.states.clear();
        self.gains.clear();
        self.covs.clear();
        self.errors.clear();
        self.variances.clear();
    }

    fn save(&mut self, pos: usize, step: &FilterStep<'_>) {
        assert!(
            self.initialized,
            "save_initial must precede the first save"
        );
        if self.errors.is_empty() {
            self.start = pos;
        } else {
            assert_eq!(
                pos,
                self.end(),
                "save must be called exactly once per position, in increasing order"
            );
        }
        self.states.push(step.a.to_owned());
        self.gains.push(step.c.to_owned());
        if self.keep_covariances {
            self.covs.push(step.p.to_owned());
        }
        self.errors.push(step.e.unwrap_or(f64::NAN));
        self.variances.push(step.f.unwrap_or(f64::NAN));
    }
}
