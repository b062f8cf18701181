//! Fixed-point smoothing through state augmentation.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

use kronos_kalman::{DiscardSink, FilterSink, FilterStep, OrdinaryFilter};
use kronos_ssf::linalg::symmetrize;
use kronos_ssf::{FixedInitializer, Initializer, Observations, Ssf};

use crate::error::SmoothError;

/// Wraps a model with a frozen trailing block: the live state evolves as
/// in the inner model while the extra components have identity dynamics,
/// no innovations and no observation loading. Correlation between the two
/// blocks is carried entirely by the covariance, so filtering the
/// augmented model revises the frozen block as data arrive.
struct AugmentedSsf<'a, M: Ssf + ?Sized> {
    inner: &'a M,
    live: usize,
    frozen: usize,
}

impl<M: Ssf + ?Sized> Ssf for AugmentedSsf<'_, M> {
    fn dim(&self) -> usize {
        self.live + self.frozen
    }

    fn innovations_dim(&self) -> usize {
        self.inner.innovations_dim()
    }

    fn has_innovations(&self, pos: usize) -> bool {
        self.inner.has_innovations(pos)
    }

    fn is_time_invariant(&self) -> bool {
        self.inner.is_time_invariant()
    }

    fn tx(&self, pos: usize, x: ArrayViewMut1<f64>) {
        let (head, _) = x.split_at(ndarray::Axis(0), self.live);
        self.inner.tx(pos, head);
    }

    fn xt(&self, pos: usize, x: ArrayViewMut1<f64>) {
        let (head, _) = x.split_at(ndarray::Axis(0), self.live);
        self.inner.xt(pos, head);
    }

    fn add_v(&self, pos: usize, p: ArrayViewMut2<f64>) {
        self.inner
            .add_v(pos, p.slice_move(s![..self.live, ..self.live]));
    }

    fn xs(&self, pos: usize, x: ArrayView1<f64>, out: ArrayViewMut1<f64>) {
        self.inner.xs(pos, x.slice_move(s![..self.live]), out);
    }

    fn s(&self, pos: usize, mut out: ArrayViewMut2<f64>) {
        out.fill(0.0);
        self.inner.s(pos, out.slice_move(s![..self.live, ..]));
    }

    fn z_dot(&self, pos: usize, x: ArrayView1<f64>) -> f64 {
        self.inner.z_dot(pos, x.slice_move(s![..self.live]))
    }

    fn add_z_scaled(&self, pos: usize, x: ArrayViewMut1<f64>, d: f64) {
        let (head, _) = x.split_at(ndarray::Axis(0), self.live);
        self.inner.add_z_scaled(pos, head, d);
    }

    fn error_variance(&self, pos: usize) -> f64 {
        self.inner.error_variance(pos)
    }
}

/// Tracks how the estimate of the state at one reference time — or a
/// linear transform of it — is revised by later observations.
///
/// Runs two filter passes: an ordinary one up to the reference position
/// `fixpos` to obtain the predicted `(a, P)` there, then a pass over
/// `[fixpos, end)` on the model augmented with a frozen copy of the
/// reference quantity, recording the frozen block's mean and covariance at
/// every step.
#[derive(Clone, Debug)]
pub struct FixedPointSmoother {
    fixpos: usize,
    map: Option<Array2<f64>>,
}

impl FixedPointSmoother {
    /// Smoother for the full state at position `fixpos`.
    pub fn new(fixpos: usize) -> Self {
        Self { fixpos, map: None }
    }

    /// Tracks `map * state(fixpos)` instead of the state itself; `map` has
    /// one row per tracked component.
    pub fn with_map(mut self, map: Array2<f64>) -> Self {
        self.map = Some(map);
        self
    }

    /// Runs both passes over `[start, end)`.
    ///
    /// # Errors
    ///
    /// [`SmoothError::DiffuseNotResolved`] when the diffuse phase extends
    /// past `fixpos` (the frozen block would have no proper prior), and
    /// any failure of the underlying filter passes.
    ///
    /// # Panics
    ///
    /// Panics unless `start <= fixpos <= end`, or when the map's column
    /// count differs from the model dimension.
    #[tracing::instrument(skip(self, model, obs, initializer))]
    pub fn process(
        &self,
        model: &dyn Ssf,
        obs: &Observations<'_>,
        initializer: &dyn Initializer,
        start: usize,
        end: usize,
    ) -> Result<FixedPointResults, SmoothError> {
        assert!(
            start <= self.fixpos && self.fixpos <= end,
            "reference position {} outside [{start}, {end}]",
            self.fixpos
        );
        let d = model.dim();
        if let Some(map) = &self.map {
            assert_eq!(map.ncols(), d, "map column count must match the model dimension");
        }

        let mut pre = OrdinaryFilter::new();
        let proper = pre.process(model, obs, initializer, start, self.fixpos, &mut DiscardSink)?;
        if proper > self.fixpos {
            return Err(SmoothError::DiffuseNotResolved {
                fixpos: self.fixpos,
                proper_start: proper,
            });
        }
        let a = pre.final_state();
        let p = pre.final_cov();

        // Augmented prior: the frozen block is M a with covariance M P M'
        // and cross-covariance P M' (M = identity when no map is set).
        let frozen = self.map.as_ref().map_or(d, |m| m.nrows());
        let mut a_aug = Array1::zeros(d + frozen);
        a_aug.slice_mut(s![..d]).assign(&a);
        let cross = match &self.map {
            Some(m) => {
                a_aug.slice_mut(s![d..]).assign(&m.dot(&a));
                p.dot(&m.t())
            }
            None => {
                a_aug.slice_mut(s![d..]).assign(&a);
                p.to_owned()
            }
        };
        let corner = match &self.map {
            Some(m) => m.dot(&cross),
            None => cross.clone(),
        };
        let mut p_aug = Array2::zeros((d + frozen, d + frozen));
        p_aug.slice_mut(s![..d, ..d]).assign(&p);
        p_aug.slice_mut(s![..d, d..]).assign(&cross);
        p_aug.slice_mut(s![d.., ..d]).assign(&cross.t());
        p_aug.slice_mut(s![d.., d..]).assign(&corner);
        symmetrize(p_aug.view_mut());

        let aug = AugmentedSsf {
            inner: model,
            live: d,
            frozen,
        };
        let init = FixedInitializer::new(a_aug, p_aug);
        let mut results = FixedPointResults::new(d, frozen);
        let mut filter = OrdinaryFilter::new();
        filter.process(&aug, obs, &init, self.fixpos, end, &mut results)?;
        results.final_mean = filter.final_state().slice(s![d..]).to_owned();
        results.final_cov = filter.final_cov().slice(s![d.., d..]).to_owned();
        Ok(results)
    }
}

/// Per-step history of the frozen-block estimate.
///
/// `a(pos)` and `p(pos)` are the estimate given data *before* `pos`; the
/// `final_*` accessors give the estimate after the whole range.
#[derive(Clone, Debug)]
pub struct FixedPointResults {
    live: usize,
    frozen: usize,
    start: usize,
    means: Vec<Array1<f64>>,
    covs: Vec<Array2<f64>>,
    final_mean: Array1<f64>,
    final_cov: Array2<f64>,
}

impl FixedPointResults {
    fn new(live: usize, frozen: usize) -> Self {
        Self {
            live,
            frozen,
            start: 0,
            means: Vec::new(),
            covs: Vec::new(),
            final_mean: Array1::zeros(frozen),
            final_cov: Array2::zeros((frozen, frozen)),
        }
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

    /// Number of tracked components.
    pub fn frozen_dim(&self) -> usize {
        self.frozen
    }

    /// First recorded position (the reference position).
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last recorded position.
    pub fn end(&self) -> usize {
        self.start + self.means.len()
    }

    /// Estimate of the frozen quantity given observations before `pos`.
    pub fn a(&self, pos: usize) -> ArrayView1<'_, f64> {
        self.means[self.idx(pos)].view()
    }

    /// Covariance of the estimate given observations before `pos`.
    pub fn p(&self, pos: usize) -> ArrayView2<'_, f64> {
        self.covs[self.idx(pos)].view()
    }

    /// Estimate after all observations in the range.
    pub fn final_state(&self) -> ArrayView1<'_, f64> {
        self.final_mean.view()
    }

    /// Covariance of the final estimate.
    pub fn final_cov(&self) -> ArrayView2<'_, f64> {
        self.final_cov.view()
    }
}

impl FilterSink for FixedPointResults {
    fn save(&mut self, pos: usize, step: &FilterStep<'_>) {
        if self.means.is_empty() {
            self.start = pos;
        }
        self.means.push(step.a.slice(s![self.live..]).to_owned());
        self.covs
            .push(step.p.slice(s![self.live.., self.live..]).to_owned());
    }
}
