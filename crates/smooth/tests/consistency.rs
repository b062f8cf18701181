//! Cross-crate consistency: smoothed output must reproduce the data it
//! was derived from when the model leaves no room for measurement noise.

use approx::assert_abs_diff_eq;
use kronos_kalman::{DefaultFilteringResults, OrdinaryFilter};
use kronos_smooth::{DisturbanceSmoother, FixedPointSmoother};
use kronos_ssf::{ArmaSsf, Observations, Ssf, StationaryInitializer};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

fn simulate(model: &ArmaSsf, n: usize, seed: u64) -> Vec<f64> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let d = model.dim();
    let k = model.innovations_dim();
    let mut state = Array1::zeros(d);
    let mut s = Array2::zeros((d, k));
    let mut data = vec![0.0; n];
    for (pos, y) in data.iter_mut().enumerate() {
        if pos > 0 {
            model.tx(pos - 1, state.view_mut());
            model.s(pos - 1, s.view_mut());
            for j in 0..k {
                let eta: f64 = normal.sample(&mut rng);
                for i in 0..d {
                    state[i] += s[[i, j]] * eta;
                }
            }
        }
        *y = model.z_dot(pos, state.view());
    }
    data
}

fn filtered(model: &ArmaSsf, data: &[f64]) -> DefaultFilteringResults {
    let obs = Observations::new(data);
    let mut results = DefaultFilteringResults::light(model.dim());
    let mut filter = OrdinaryFilter::new();
    filter
        .process(model, &obs, &StationaryInitializer::new(), 0, data.len(), &mut results)
        .unwrap();
    results
}

/// Propagates the smoothed initial state forward with the smoothed
/// innovations and checks the observation is reproduced at every step.
fn assert_reconstruction(model: &ArmaSsf, data: &[f64]) {
    let results = filtered(model, data);
    let smoothed = DisturbanceSmoother::new().process(model, &results, 0, data.len());

    let d = model.dim();
    let k = model.innovations_dim();
    let mut state = smoothed.first_smoothed_state();
    let mut s = Array2::zeros((d, k));
    assert_abs_diff_eq!(model.z_dot(0, state.view()), data[0], epsilon = 1e-7);

    for pos in 1..data.len() {
        model.tx(pos - 1, state.view_mut());
        model.s(pos - 1, s.view_mut());
        let u = smoothed.u(pos).unwrap();
        for j in 0..k {
            for i in 0..d {
                state[i] += s[[i, j]] * u[j];
            }
        }
        assert_abs_diff_eq!(model.z_dot(pos, state.view()), data[pos], epsilon = 1e-7);
    }
}

#[test]
fn ar1_smoothed_path_reproduces_the_data() {
    let model = ArmaSsf::new(&[0.7], &[]).with_sigma2(1.5);
    let data = simulate(&model, 40, 3);
    assert_reconstruction(&model, &data);
}

#[test]
fn arma11_smoothed_path_reproduces_the_data() {
    let model = ArmaSsf::new(&[0.6], &[0.4]).with_sigma2(0.8);
    let data = simulate(&model, 40, 17);
    assert_reconstruction(&model, &data);
}

#[test]
fn ar1_innovations_are_scaled_one_step_differences() {
    let (phi, sigma2) = (0.55, 2.0);
    let model = ArmaSsf::new(&[phi], &[]).with_sigma2(sigma2);
    let data = simulate(&model, 30, 8);
    let results = filtered(&model, &data);

    let smoothed = DisturbanceSmoother::new().process(&model, &results, 0, data.len());
    for pos in 1..data.len() {
        let expected = (data[pos] - phi * data[pos - 1]) / sigma2.sqrt();
        assert_abs_diff_eq!(smoothed.u(pos).unwrap()[0], expected, epsilon = 1e-7);
    }
}

#[test]
fn fixed_point_final_estimate_agrees_with_exact_observation() {
    // With H = 0 the fixed-point estimate of the state at the reference
    // time converges to the observed value the moment it is observed.
    let model = ArmaSsf::new(&[0.7], &[]).with_sigma2(1.5);
    let data = simulate(&model, 25, 5);
    let obs = Observations::new(&data);

    for fixpos in [0, 7, 24] {
        let fp = FixedPointSmoother::new(fixpos)
            .process(&model, &obs, &StationaryInitializer::new(), 0, data.len())
            .unwrap();
        assert_abs_diff_eq!(fp.final_state()[0], data[fixpos], epsilon = 1e-8);
        assert!(fp.final_cov()[[0, 0]].abs() < 1e-8);
    }
}

#[test]
fn smoothing_noisy_observations_interpolates_a_gap() {
    // With measurement noise and a hole in the data, the smoothed path
    // still reproduces the transition identity across the gap.
    let model = ArmaSsf::new(&[0.8], &[]).with_sigma2(1.0).with_error_variance(0.0);
    let mut data = simulate(&model, 20, 21);
    data[10] = f64::NAN;
    let results = filtered(&model, &data);

    let smoothed = DisturbanceSmoother::new().process(&model, &results, 0, data.len());
    // The innovation into the missing step is still defined, and the
    // reconstructed state there bridges its observed neighbors.
    let u10 = smoothed.u(10).unwrap()[0];
    let u11 = smoothed.u(11).unwrap()[0];
    let x10 = 0.8 * data[9] + u10;
    assert_abs_diff_eq!(data[11], 0.8 * x10 + u11, epsilon = 1e-7);
}
