//! Ordinary (forward) Kalman filter over the operator contract.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tracing::debug;

use kronos_ssf::linalg::{symmetrize, transpose_in_place};
use kronos_ssf::{Initializer, Observations, Ssf};

use crate::error::KalmanError;
use crate::results::{FilterSink, FilterStep};

/// Pass life-cycle of the ordinary filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FilterState {
    Uninitialized,
    Running,
    Done,
}

/// The univariate Kalman filter: a forward recursion producing, per step,
/// the one-step-ahead predicted state/covariance and the prediction
/// error/variance.
///
/// The filter owns its scratch (`a`, `P`, `C`) for exactly one pass; the
/// per-step output goes to a [`FilterSink`]. After a completed pass the
/// final `(a, P)` pair — the prediction for the step *after* the range —
/// remains available for continuation.
///
/// Missing observations and structurally singular variances (`f <= 0`)
/// are information-free: the state propagates through the transition with
/// no correction. Initialization failure aborts the pass and is returned
/// as a value; it is an expected outcome for some model/data combinations.
#[derive(Clone, Debug)]
pub struct OrdinaryFilter {
    state: FilterState,
    a: Array1<f64>,
    p: Array2<f64>,
    c: Array1<f64>,
    ssq: f64,
    nobs: usize,
}

impl Default for OrdinaryFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl OrdinaryFilter {
    /// Creates an uninitialized filter.
    pub fn new() -> Self {
        Self {
            state: FilterState::Uninitialized,
            a: Array1::zeros(0),
            p: Array2::zeros((0, 0)),
            c: Array1::zeros(0),
            ssq: 0.0,
            nobs: 0,
        }
    }

    /// Runs one filter pass over `[start, end)`, sending per-step output
    /// to `sink`.
    ///
    /// Returns the index at which the proper (non-diffuse) recursion
    /// begins, as reported by the initializer, so callers can skip
    /// prediction-error contributions from the diffuse phase.
    ///
    /// # Errors
    ///
    /// [`KalmanError::InitializationFailed`] when the initializer cannot
    /// produce a usable starting `(a, P)` pair, carrying the underlying
    /// [`kronos_ssf::SsfError`].
    ///
    /// # Panics
    ///
    /// Panics when `start > end` or when called on a pass already running.
    #[tracing::instrument(skip(self, model, obs, initializer, sink))]
    pub fn process<S>(
        &mut self,
        model: &dyn Ssf,
        obs: &Observations<'_>,
        initializer: &dyn Initializer,
        start: usize,
        end: usize,
        sink: &mut S,
    ) -> Result<usize, KalmanError>
    where
        S: FilterSink + ?Sized,
    {
        assert!(start <= end, "invalid range [{start}, {end})");
        assert!(
            self.state != FilterState::Running,
            "filter pass already running"
        );

        let d = model.dim();
        self.a = Array1::zeros(d);
        self.p = Array2::zeros((d, d));
        self.c = Array1::zeros(d);
        self.ssq = 0.0;
        self.nobs = 0;
        self.state = FilterState::Running;

        let proper_start = match initializer.initialize(model, start, &mut self.a, &mut self.p) {
            Ok(pos) => pos,
            Err(err) => {
                self.state = FilterState::Uninitialized;
                return Err(KalmanError::InitializationFailed(err));
            }
        };
        debug!(dim = d, proper_start, "filter pass initialized");
        sink.save_initial(self.a.view(), self.p.view(), proper_start);

        for pos in start..end {
            // C = P Z' (P is symmetric, so Z applied to columns works
            // row-wise too).
            for i in 0..d {
                self.c[i] = model.z_dot(pos, self.p.column(i));
            }

            let (f, e) = if obs.is_missing(pos) {
                (None, None)
            } else {
                let f = (model.z_dot(pos, self.c.view()) + model.error_variance(pos)).max(0.0);
                let e = if f > 0.0 {
                    Some(obs.get(pos) - model.z_dot(pos, self.a.view()))
                } else {
                    None
                };
                (Some(f), e)
            };

            sink.save(
                pos,
                &FilterStep {
                    a: self.a.view(),
                    p: self.p.view(),
                    c: self.c.view(),
                    f,
                    e,
                },
            );

            // Correction step, only when the observation carries
            // information.
            if let (Some(e), Some(f)) = (e, f) {
                self.ssq += e * e / f;
                self.nobs += 1;

                let finv = 1.0 / f;
                self.a.scaled_add(e * finv, &self.c);
                for i in 0..d {
                    for j in 0..d {
                        self.p[[i, j]] -= finv * self.c[i] * self.c[j];
                    }
                }
                symmetrize(self.p.view_mut());
            }

            // Time update: a <- T a, P <- T P T' + V. The congruence is
            // computed as T (T P)' using the symmetry of P.
            model.tx(pos, self.a.view_mut());
            model.t_columns(pos, self.p.view_mut());
            transpose_in_place(self.p.view_mut());
            model.t_columns(pos, self.p.view_mut());
            model.add_v(pos, self.p.view_mut());
            symmetrize(self.p.view_mut());
        }

        self.state = FilterState::Done;
        Ok(proper_start)
    }

    /// Final state prediction `a(end|end-1)` of the completed pass.
    ///
    /// # Panics
    ///
    /// Panics unless a pass has completed.
    pub fn final_state(&self) -> ArrayView1<'_, f64> {
        assert!(
            self.state == FilterState::Done,
            "no completed filter pass"
        );
        self.a.view()
    }

    /// Final covariance prediction `P(end|end-1)` of the completed pass.
    ///
    /// # Panics
    ///
    /// Panics unless a pass has completed.
    pub fn final_cov(&self) -> ArrayView2<'_, f64> {
        assert!(
            self.state == FilterState::Done,
            "no completed filter pass"
        );
        self.p.view()
    }

    /// Generalized residual variance: mean of `e^2/f` over the
    /// information-bearing steps of the completed pass; 0 when there were
    /// none.
    pub fn residual_variance(&self) -> f64 {
        assert!(
            self.state == FilterState::Done,
            "no completed filter pass"
        );
        if self.nobs == 0 {
            0.0
        } else {
            self.ssq / self.nobs as f64
        }
    }
}
