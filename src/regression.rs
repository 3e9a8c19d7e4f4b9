//! Ordinary least squares linear regression with an intercept.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegressionError {
    #[error("no training samples")]
    Empty,

    #[error("sample {index} has {got} features, expected {expected}")]
    DimensionMismatch { index: usize, expected: usize, got: usize },

    #[error("{targets} targets for {samples} samples")]
    TargetMismatch { samples: usize, targets: usize },

    #[error("need at least {needed} samples to fit {needed} parameters, got {got}")]
    NotEnoughSamples { needed: usize, got: usize },

    #[error("features are collinear; the normal equations have no unique solution")]
    Singular,
}

/// Fitted model `y = intercept + coefficients · x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Coefficient of determination on the training data
    pub r_squared: f64,
    pub samples: usize,
}

impl LinearModel {
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.intercept + self.coefficients.iter().zip(features).map(|(c, x)| c * x).sum::<f64>()
    }
}

const PIVOT_EPSILON: f64 = 1e-10;

/// Fits by solving the normal equations `(XᵀX) β = Xᵀy`.
///
/// Feature columns are standardised first so that inputs on very different
/// scales (GDP per capita next to an inflation rate) stay well conditioned.
pub fn fit(features: &[Vec<f64>], targets: &[f64]) -> Result<LinearModel, RegressionError> {
    let n = features.len();
    if n == 0 {
        return Err(RegressionError::Empty);
    }
    if targets.len() != n {
        return Err(RegressionError::TargetMismatch { samples: n, targets: targets.len() });
    }

    let p = features[0].len();
    if let Some((index, row)) = features.iter().enumerate().find(|(_, r)| r.len() != p) {
        return Err(RegressionError::DimensionMismatch { index, expected: p, got: row.len() });
    }
    if n < p + 1 {
        return Err(RegressionError::NotEnoughSamples { needed: p + 1, got: n });
    }

    let (means, scales) = column_stats(features, p);

    // Design matrix with a leading column of ones for the intercept.
    let design: Vec<Vec<f64>> = features
        .iter()
        .map(|row| {
            std::iter::once(1.0)
                .chain(row.iter().enumerate().map(|(j, x)| (x - means[j]) / scales[j]))
                .collect()
        })
        .collect();

    let k = p + 1;
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, y) in design.iter().zip(targets) {
        for a in 0..k {
            xty[a] += row[a] * y;
            for b in 0..k {
                xtx[a][b] += row[a] * row[b];
            }
        }
    }

    let beta = solve(xtx, xty)?;

    // Undo the standardisation.
    let coefficients: Vec<f64> = (0..p).map(|j| beta[j + 1] / scales[j]).collect();
    let intercept = beta[0] - coefficients.iter().zip(&means).map(|(c, m)| c * m).sum::<f64>();

    let mut model = LinearModel { coefficients, intercept, r_squared: 0.0, samples: n };
    model.r_squared = r_squared(&model, features, targets);
    Ok(model)
}

fn column_stats(features: &[Vec<f64>], p: usize) -> (Vec<f64>, Vec<f64>) {
    let n = features.len() as f64;
    let means: Vec<f64> = (0..p).map(|j| features.iter().map(|r| r[j]).sum::<f64>() / n).collect();
    let scales = (0..p)
        .map(|j| {
            let var = features.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
            // A constant column keeps scale 1 and is caught as singular later.
            if var > 0.0 {
                var.sqrt()
            } else {
                1.0
            }
        })
        .collect();
    (means, scales)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, RegressionError> {
    let k = b.len();

    for col in 0..k {
        let pivot = (col..k)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(RegressionError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..k {
            let factor = a[row][col] / a[col][col];
            for c in col..k {
                a[row][c] -= factor * a[col][c];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; k];
    for row in (0..k).rev() {
        let tail: f64 = (row + 1..k).map(|c| a[row][c] * x[c]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

fn r_squared(model: &LinearModel, features: &[Vec<f64>], targets: &[f64]) -> f64 {
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_tot: f64 = targets.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 =
        features.iter().zip(targets).map(|(x, y)| (y - model.predict(x)).powi(2)).sum();
    if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
    }

    #[test]
    fn test_recovers_exact_plane() {
        // y = 4 + 2·a - 0.001·b + 0.5·c
        let features = vec![
            vec![1.0, 20000.0, 3.0],
            vec![2.0, 35000.0, 1.5],
            vec![0.5, 60000.0, 8.0],
            vec![3.5, 12000.0, 2.2],
            vec![1.8, 45000.0, 5.1],
            vec![2.7, 15000.0, 0.3],
        ];
        let targets: Vec<f64> =
            features.iter().map(|x| 4.0 + 2.0 * x[0] - 0.001 * x[1] + 0.5 * x[2]).collect();

        let model = fit(&features, &targets).unwrap();

        assert_close(model.intercept, 4.0);
        assert_close(model.coefficients[0], 2.0);
        assert_close(model.coefficients[1], -0.001);
        assert_close(model.coefficients[2], 0.5);
        assert_close(model.r_squared, 1.0);
        assert_eq!(model.samples, 6);
        assert_close(model.predict(&[1.0, 20000.0, 3.0]), targets[0]);
    }

    #[test]
    fn test_single_feature_least_squares() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let targets = vec![2.0, 4.1, 5.9, 8.0];

        let model = fit(&features, &targets).unwrap();
        assert_close(model.coefficients[0], 1.97);
        assert_close(model.intercept, 0.05);
        assert!(model.r_squared > 0.99 && model.r_squared < 1.0);
    }

    #[test]
    fn test_errors() {
        assert_eq!(fit(&[], &[]), Err(RegressionError::Empty));
        assert_eq!(
            fit(&[vec![1.0], vec![2.0]], &[1.0]),
            Err(RegressionError::TargetMismatch { samples: 2, targets: 1 })
        );
        assert_eq!(
            fit(&[vec![1.0, 2.0], vec![2.0]], &[1.0, 2.0]),
            Err(RegressionError::DimensionMismatch { index: 1, expected: 2, got: 1 })
        );
        assert_eq!(
            fit(&[vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0]], &[1.0, 2.0]),
            Err(RegressionError::NotEnoughSamples { needed: 4, got: 2 })
        );
    }

    #[test]
    fn test_collinear_is_singular() {
        // second column is exactly twice the first
        let features = vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0], vec![4.0, 8.0]];
        let targets = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(fit(&features, &targets), Err(RegressionError::Singular));
    }

    #[test]
    fn test_constant_feature_is_singular() {
        let features = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0]];
        assert_eq!(fit(&features, &[1.0, 2.0, 3.0]), Err(RegressionError::Singular));
    }
}
