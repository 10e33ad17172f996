//! Least-squares projection.
//!
//! Residuals are computed by modified Gram-Schmidt orthogonalisation of the
//! design columns. Columns that are linearly dependent on earlier ones are
//! skipped, so a rank-deficient design yields the projection onto its column
//! space, the same fit a pseudo-inverse produces.

use crate::{Result, StatsError};
use ndarray::{Array1, Array2};

/// Relative norm below which an orthogonalised column counts as dependent.
const RANK_TOLERANCE: f64 = 1e-10;

/// Residuals of regressing `y` on the columns of `design`.
///
/// `design` holds one row per observation. The residual vector is orthogonal
/// to every design column.
pub fn projection_residuals(design: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
    let (n_rows, n_cols) = design.dim();
    if n_rows != y.len() {
        return Err(StatsError::DimensionMismatch {
            expected: n_rows,
            actual: y.len(),
        });
    }

    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(n_cols);
    for j in 0..n_cols {
        let mut v = design.column(j).to_owned();
        let scale = v.dot(&v).sqrt().max(1.0);
        for q in &basis {
            let r = q.dot(&v);
            v.scaled_add(-r, q);
        }
        let norm = v.dot(&v).sqrt();
        if norm > RANK_TOLERANCE * scale {
            basis.push(v / norm);
        }
    }

    let mut residual = y.clone();
    for q in &basis {
        let r = q.dot(&residual);
        residual.scaled_add(-r, q);
    }
    Ok(residual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_exact_fit_has_zero_residuals() {
        let design = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![2.0, 5.0, 8.0, 11.0];

        let resid = projection_residuals(&design, &y).unwrap();
        for r in resid.iter() {
            assert_relative_eq!(*r, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_intercept_only_demeans() {
        let design = Array2::<f64>::ones((4, 1));
        let y = array![1.0, 2.0, 3.0, 6.0];

        let resid = projection_residuals(&design, &y).unwrap();
        assert_relative_eq!(resid[0], -2.0, epsilon = 1e-12);
        assert_relative_eq!(resid[3], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_residuals_orthogonal_to_design() {
        let design = array![
            [1.0, 1.0, 0.0],
            [1.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 0.0, 1.0],
            [1.0, 0.0, 0.0]
        ];
        let y = array![3.0, 1.0, 4.0, 1.0, 5.0, 9.0];

        let resid = projection_residuals(&design, &y).unwrap();
        for j in 0..design.ncols() {
            assert_relative_eq!(design.column(j).dot(&resid), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_rank_deficient_matches_reduced_design() {
        // Third column is absent (all zero) and fourth duplicates the second.
        let full = array![
            [1.0, 1.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0, 1.0]
        ];
        let reduced = array![[1.0, 1.0], [1.0, 0.0], [1.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![2.0, 7.0, 4.0, 1.0, 3.0];

        let a = projection_residuals(&full, &y).unwrap();
        let b = projection_residuals(&reduced, &y).unwrap();
        for (x, z) in a.iter().zip(b.iter()) {
            assert_relative_eq!(*x, *z, epsilon = 1e-10);
        }
        // Group means are 3.0 and 4.0.
        assert_relative_eq!(a[0], -1.0, epsilon = 1e-10);
        assert_relative_eq!(a[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_dimension_mismatch() {
        let design = Array2::<f64>::ones((3, 1));
        let y = array![1.0, 2.0];
        assert!(matches!(
            projection_residuals(&design, &y),
            Err(StatsError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }
}
