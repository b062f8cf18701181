//! Fast filter: re-applies the gains of a completed pass.

use ndarray::{Array1, Array2};

use kronos_ssf::Ssf;

use crate::results::DefaultFilteringResults;

/// Residuals no larger than this are treated as exact zeros on
/// structurally singular steps (`f == 0`).
const RESIDUAL_TOL: f64 = 1e-9;

/// Applies the linear transformation implied by an already-computed filter
/// pass — its gains `C(t)` and variances `f(t)` — to auxiliary data
/// sharing the same dynamics, without re-deriving `P`, `C` or `f`.
///
/// Typical uses: decorrelating residuals, or filtering regression
/// variables through the dynamics of the dependent series. States start
/// at zero, so the output is the pure linear transform of the input; fed
/// the original observations (with a zero-mean prior) it reproduces the
/// ordinary filter's standardized residuals.
///
/// Reusing the recorded gains avoids the O(d^2) covariance recursion per
/// auxiliary column.
#[derive(Debug)]
pub struct FastFilter<'a, M: Ssf + ?Sized> {
    model: &'a M,
    results: &'a DefaultFilteringResults,
}

impl<'a, M: Ssf + ?Sized> FastFilter<'a, M> {
    /// Borrows a model and the completed results of a filter pass over it.
    ///
    /// # Panics
    ///
    /// Panics when the results hold no completed pass or their dimension
    /// does not match the model.
    pub fn new(model: &'a M, results: &'a DefaultFilteringResults) -> Self {
        assert!(
            results.is_initialized(results.start(), results.end()),
            "fast filter requires completed filtering results"
        );
        assert_eq!(
            model.dim(),
            results.dim(),
            "model and results dimensions differ"
        );
        Self { model, results }
    }

    /// Number of output elements the streaming mode produces over
    /// `[start, end)`: the count of steps with a recorded variance.
    ///
    /// # Panics
    ///
    /// Panics when the range is not covered by the results.
    pub fn output_length(&self, start: usize, end: usize) -> usize {
        assert!(
            self.results.is_initialized(start, end),
            "range [{start}, {end}) not covered by the filtering results"
        );
        (start..end)
            .filter(|&pos| self.results.error_variance(pos).is_some())
            .count()
    }

    /// Standardizes one residual given the step variance.
    fn standardize(e: f64, f: f64) -> f64 {
        if f > 0.0 {
            e / f.sqrt()
        } else if e.abs() <= RESIDUAL_TOL {
            // Zero variance and a consistent residual: exactly zero.
            0.0
        } else {
            // Zero variance but a non-negligible residual: numerically
            // inconsistent with the recorded pass.
            f64::NAN
        }
    }

    /// Batch mode: residualizes an `n x k` matrix whose rows align
    /// one-to-one with the recorded range, in place.
    ///
    /// Each row becomes `(row - Z state) / sqrt(f)`; on singular steps the
    /// consistent/inconsistent distinction of [`FastFilter::output_length`]
    /// streaming applies elementwise; on missing steps the row is zeroed
    /// and the per-column states propagate through the transition only.
    ///
    /// # Panics
    ///
    /// Panics when `x.nrows()` differs from the recorded range length.
    pub fn transform(&self, x: &mut Array2<f64>) {
        let (start, end) = (self.results.start(), self.results.end());
        assert_eq!(
            x.nrows(),
            end - start,
            "row count must match the recorded range"
        );
        let d = self.model.dim();
        let k = x.ncols();
        let mut states = Array2::zeros((d, k));

        for pos in start..end {
            let row_idx = pos - start;
            match self.results.error_variance(pos) {
                Some(f) => {
                    let c = self.results.m(pos);
                    let finv = if f > 0.0 { 1.0 / f } else { 0.0 };
                    for j in 0..k {
                        let e = x[[row_idx, j]] - self.model.z_dot(pos, states.column(j));
                        x[[row_idx, j]] = Self::standardize(e, f);
                        states.column_mut(j).scaled_add(e * finv, &c);
                    }
                }
                None => {
                    for j in 0..k {
                        x[[row_idx, j]] = 0.0;
                    }
                }
            }
            self.model.t_columns(pos, states.view_mut());
        }
    }

    /// Streaming mode: residualizes a flat sequence aligned with the
    /// recorded range, carrying a single state vector forward.
    ///
    /// Missing steps contribute no output element, so `out` must have
    /// exactly [`FastFilter::output_length`] elements; size it before the
    /// call.
    ///
    /// # Panics
    ///
    /// Panics when `x` does not span the recorded range or `out` has the
    /// wrong length.
    pub fn transform_seq(&self, x: &[f64], out: &mut [f64]) {
        let (start, end) = (self.results.start(), self.results.end());
        assert_eq!(x.len(), end - start, "input must span the recorded range");
        assert_eq!(
            out.len(),
            self.output_length(start, end),
            "output length must match output_length()"
        );

        let d = self.model.dim();
        let mut state = Array1::zeros(d);
        let mut next = 0usize;

        for pos in start..end {
            if let Some(f) = self.results.error_variance(pos) {
                let e = x[pos - start] - self.model.z_dot(pos, state.view());
                out[next] = Self::standardize(e, f);
                next += 1;
                if f > 0.0 {
                    state.scaled_add(e / f, &self.results.m(pos));
                }
            }
            self.model.tx(pos, state.view_mut());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::OrdinaryFilter;
    use crate::likelihood::PredictionErrorDecomposition;
    use approx::assert_abs_diff_eq;
    use kronos_ssf::{ArmaSsf, FixedInitializer, LocalLevel, Observations, StationaryInitializer};
    use ndarray::Array2 as Mat;

    fn filtered(
        model: &ArmaSsf,
        data: &[f64],
    ) -> DefaultFilteringResults {
        let obs = Observations::new(data);
        let mut results = DefaultFilteringResults::light(model.dim());
        let mut filter = OrdinaryFilter::new();
        filter
            .process(model, &obs, &StationaryInitializer::new(), 0, data.len(), &mut results)
            .unwrap();
        results
    }

    #[test]
    fn streaming_reproduces_standardized_residuals() {
        let model = ArmaSsf::new(&[0.6], &[0.2]);
        let data = [0.4, -1.1, 0.7, 0.3, -0.2, 1.5];
        let obs = Observations::new(&data);

        let mut pde = PredictionErrorDecomposition::with_residuals();
        let mut filter = OrdinaryFilter::new();
        filter
            .process(&model, &obs, &StationaryInitializer::new(), 0, data.len(), &mut pde)
            .unwrap();

        let results = filtered(&model, &data);
        let fast = FastFilter::new(&model, &results);
        let mut out = vec![0.0; fast.output_length(0, data.len())];
        fast.transform_seq(&data, &mut out);

        assert_eq!(out.len(), pde.residuals().unwrap().len());
        for (a, b) in out.iter().zip(pde.residuals().unwrap()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn batch_matches_streaming_per_column() {
        let model = ArmaSsf::new(&[0.5, -0.2], &[0.3]);
        let data = [1.0, 0.2, -0.4, 0.9, -1.3];
        let results = filtered(&model, &data);
        let fast = FastFilter::new(&model, &results);

        // Two different auxiliary series.
        let aux0 = [0.5, -0.1, 0.3, 0.8, -0.2];
        let aux1 = [2.0, 1.0, 0.0, -1.0, -2.0];
        let mut batch = Mat::zeros((5, 2));
        for t in 0..5 {
            batch[[t, 0]] = aux0[t];
            batch[[t, 1]] = aux1[t];
        }
        fast.transform(&mut batch);

        for (j, aux) in [aux0, aux1].iter().enumerate() {
            let mut out = vec![0.0; fast.output_length(0, 5)];
            fast.transform_seq(aux, &mut out);
            for t in 0..5 {
                assert_abs_diff_eq!(batch[[t, j]], out[t], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn missing_steps_are_skipped_in_streaming_and_zeroed_in_batch() {
        let model = ArmaSsf::new(&[0.6], &[]);
        let data = [0.4, f64::NAN, 0.7, f64::NAN, -0.2];
        let results = filtered(&model, &data);
        let fast = FastFilter::new(&model, &results);

        assert_eq!(fast.output_length(0, 5), 3);

        let aux = [1.0, 9.0, 2.0, 9.0, 3.0];
        let mut out = vec![0.0; 3];
        fast.transform_seq(&aux, &mut out);

        let mut batch = Mat::zeros((5, 1));
        for t in 0..5 {
            batch[[t, 0]] = aux[t];
        }
        fast.transform(&mut batch);

        assert_eq!(batch[[1, 0]], 0.0);
        assert_eq!(batch[[3, 0]], 0.0);
        assert_abs_diff_eq!(batch[[0, 0]], out[0], epsilon = 1e-12);
        assert_abs_diff_eq!(batch[[2, 0]], out[1], epsilon = 1e-12);
        assert_abs_diff_eq!(batch[[4, 0]], out[2], epsilon = 1e-12);
    }

    #[test]
    fn singular_variance_distinguishes_consistent_residuals() {
        // Constant level, no noise anywhere: f(t) = 0 at every step.
        let model = LocalLevel::new(0.0, 0.0);
        let data = [0.0, 0.0, 0.0];
        let obs = Observations::new(&data);
        let init = FixedInitializer::new(
            ndarray::Array1::zeros(1),
            ndarray::Array2::zeros((1, 1)),
        );

        let mut results = DefaultFilteringResults::light(1);
        let mut filter = OrdinaryFilter::new();
        filter
            .process(&model, &obs, &init, 0, 3, &mut results)
            .unwrap();
        assert_eq!(results.error_variance(0), Some(0.0));

        let fast = FastFilter::new(&model, &results);
        // Consistent residuals (zeros) yield zeros; an inconsistent one
        // yields NaN.
        let mut out = vec![0.0; 3];
        fast.transform_seq(&[0.0, 1.0, 0.0], &mut out);
        assert_eq!(out[0], 0.0);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 0.0);
    }

    #[test]
    #[should_panic(expected = "must span the recorded range")]
    fn wrong_input_length_panics() {
        let model = ArmaSsf::new(&[0.6], &[]);
        let data = [0.4, 0.7];
        let results = filtered(&model, &data);
        let fast = FastFilter::new(&model, &results);
        let mut out = vec![0.0; 2];
        fast.transform_seq(&[1.0], &mut out);
    }
}
