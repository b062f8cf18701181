//! Dense linear-algebra helpers for the filtering and smoothing hot loops.
//!
//! Dimensions are runtime values (the state dimension depends on the
//! model), so these work on `ndarray` views rather than stack arrays.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2};

/// Averages a square matrix with its transpose, in place.
///
/// Covariance matrices are only ever updated through congruence transforms
/// that preserve symmetry up to floating-point error; this removes the
/// accumulated drift. Downstream recursions assume exact symmetry.
pub fn symmetrize(mut p: ArrayViewMut2<f64>) {
    let n = p.nrows();
    debug_assert_eq!(n, p.ncols());
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (p[[i, j]] + p[[j, i]]);
            p[[i, j]] = avg;
            p[[j, i]] = avg;
        }
    }
}

/// Transposes a square matrix in place.
pub fn transpose_in_place(mut m: ArrayViewMut2<f64>) {
    let n = m.nrows();
    debug_assert_eq!(n, m.ncols());
    for i in 0..n {
        for j in (i + 1)..n {
            let tmp = m[[i, j]];
            m[[i, j]] = m[[j, i]];
            m[[j, i]] = tmp;
        }
    }
}

/// Quadratic form `x' * N * x`.
pub fn quad_form(n: ArrayView2<f64>, x: ArrayView1<f64>) -> f64 {
    let d = x.len();
    let mut acc = 0.0;
    for i in 0..d {
        let mut row = 0.0;
        for j in 0..d {
            row += n[[i, j]] * x[j];
        }
        acc += x[i] * row;
    }
    acc
}

/// Solves `A * x = b` in place by LU decomposition with partial pivoting.
///
/// On success `b` holds the solution and the return value is `true`; a
/// (numerically) singular `A` returns `false` and leaves `b` unspecified.
/// `A` is destroyed either way. Used once per pass by the stationary
/// initializer, never inside the recursion loops.
pub fn lu_solve_in_place(a: &mut Array2<f64>, b: &mut Array1<f64>) -> bool {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols());
    debug_assert_eq!(n, b.len());

    for col in 0..n {
        // Pivot selection.
        let mut pivot = col;
        let mut max = a[[col, col]].abs();
        for row in (col + 1)..n {
            let v = a[[row, col]].abs();
            if v > max {
                max = v;
                pivot = row;
            }
        }
        if !max.is_finite() || max < 1e-13 {
            return false;
        }
        if pivot != col {
            for j in 0..n {
                let tmp = a[[col, j]];
                a[[col, j]] = a[[pivot, j]];
                a[[pivot, j]] = tmp;
            }
            b.swap(col, pivot);
        }

        // Eliminate below the pivot.
        let inv = 1.0 / a[[col, col]];
        for row in (col + 1)..n {
            let factor = a[[row, col]] * inv;
            if factor == 0.0 {
                continue;
            }
            for j in (col + 1)..n {
                a[[row, j]] -= factor * a[[col, j]];
            }
            b[row] -= factor * b[col];
        }
    }

    // Back substitution.
    for col in (0..n).rev() {
        let mut sum = b[col];
        for j in (col + 1)..n {
            sum -= a[[col, j]] * b[j];
        }
        b[col] = sum / a[[col, col]];
    }
    true
}
