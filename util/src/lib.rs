use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// Converts a CSR matrix to a dense matrix, summing explicitly stored entries.
pub fn csr_to_dense(matrix: &CsrMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(matrix.nrows(), matrix.ncols());
    for (i, j, v) in matrix.triplet_iter() {
        dense[(i, j)] += *v;
    }
    dense
}

/// Largest absolute entry of `A - A^T`, relative to the largest absolute entry of `A`.
pub fn relative_asymmetry(matrix: &DMatrix<f64>) -> f64 {
    assert_eq!(matrix.nrows(), matrix.ncols(), "Matrix must be square");
    let scale = matrix.abs().max().max(f64::MIN_POSITIVE);
    (matrix - matrix.transpose()).abs().max() / scale
}

/// A deterministic, non-trivial vector useful for probing linear operators in tests.
pub fn probe_vector(len: usize, seed: usize) -> DVector<f64> {
    DVector::from_fn(len, |i, _| {
        let k = (i + 1) * (seed + 3);
        ((k as f64) * 0.618_033_988_75).fract() - 0.5
    })
}
