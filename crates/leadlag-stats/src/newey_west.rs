//! Newey-West adjusted t-test of a zero mean
//!
//! The long-run variance of the sample mean is estimated with Bartlett kernel
//! weights on the demeaned autocovariances:
//! ```text
//! S = γ_0 + 2 Σ_{l=1}^{L} w_l γ_l
//! where:
//! - γ_l = (1/T) Σ_{t=l+1}^T (x_t - μ)(x_{t-l} - μ)
//! - w_l = 1 - l/(L+1) (Bartlett kernel weights)
//! - L = ceil(4*(T/100)^(2/9)) unless configured, clamped to T - 1
//! ```
//! and the statistic is `t = μ / sqrt(S / T)`, compared against the standard
//! normal distribution.
//!
//! # References
//! - Newey, W. K., & West, K. D. (1987). "A Simple, Positive Semi-Definite,
//!   Heteroskedasticity and Autocorrelation Consistent Covariance Matrix."
//!   Econometrica, 55(3), 703-708.

use crate::{Result, StatsError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Newey-West test configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeweyWestConfig {
    /// Number of lags to use for HAC adjustment (None = automatic selection)
    /// When None, uses ceil(4*(T/100)^(2/9)) as recommended by Newey-West
    pub lags: Option<usize>,
}

/// Outcome of a Newey-West adjusted t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTest {
    /// Sample mean
    pub mean: f64,
    /// HAC standard error of the mean
    pub std_error: f64,
    /// Test statistic
    pub t_value: f64,
    /// Two-sided p-value
    pub p_value: f64,
    /// Lags used in the variance estimate
    pub lags: usize,
    /// Number of observations
    pub n: usize,
}

/// Newey-West adjusted t-test
#[derive(Debug, Default)]
pub struct NeweyWestTest {
    config: NeweyWestConfig,
}

impl NeweyWestTest {
    /// Create a new test with the given configuration
    pub const fn new(config: NeweyWestConfig) -> Self {
        Self { config }
    }

    /// Lag length: configured, or the Newey-West rule of thumb
    ///
    /// Formula: L = ceil(4 * (T/100)^(2/9))
    fn optimal_lags(&self, n_periods: usize) -> usize {
        self.config.lags.unwrap_or_else(|| {
            let t = n_periods as f64;
            let lags = 4.0 * (t / 100.0).powf(2.0 / 9.0);
            lags.ceil() as usize
        })
    }

    /// Bartlett weight, `w_l = 1 - l/(L+1)` for l = 1, ..., L
    fn bartlett_weight(&self, lag: usize, max_lag: usize) -> f64 {
        if lag == 0 {
            1.0
        } else if lag <= max_lag {
            1.0 - (lag as f64) / (max_lag as f64 + 1.0)
        } else {
            0.0
        }
    }

    /// Autocovariance of demeaned values at `lag`, normalised by T
    fn autocovariance(&self, demeaned: &Array1<f64>, lag: usize) -> f64 {
        let n = demeaned.len();
        let mut sum = 0.0;
        for t in lag..n {
            sum += demeaned[t] * demeaned[t - lag];
        }
        sum / n as f64
    }

    /// Long-run variance `S` and the number of lags used.
    pub fn long_run_variance(&self, values: &Array1<f64>) -> Result<(f64, usize)> {
        let n = values.len();
        if n < 2 {
            return Err(StatsError::InsufficientData {
                required: 2,
                actual: n,
            });
        }

        let max_lag = self.optimal_lags(n).min(n - 1);
        let mean = values.sum() / n as f64;
        let demeaned = values.mapv(|v| v - mean);

        let mut variance = self.autocovariance(&demeaned, 0);
        for lag in 1..=max_lag {
            let weight = self.bartlett_weight(lag, max_lag);
            variance += 2.0 * weight * self.autocovariance(&demeaned, lag);
        }

        Ok((variance, max_lag))
    }

    /// Test `mean != 0`. Non-finite values are ignored.
    pub fn ttest(&self, values: &[f64]) -> Result<TTest> {
        let values: Array1<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let n = values.len();
        let (variance, lags) = self.long_run_variance(&values)?;
        if variance.is_nan() || variance <= 0.0 {
            return Err(StatsError::ZeroVariance(variance));
        }

        let mean = values.sum() / n as f64;
        let std_error = (variance / n as f64).sqrt();
        let t_value = mean / std_error;

        Ok(TTest {
            mean,
            std_error,
            t_value,
            p_value: two_sided_p_value(t_value)?,
            lags,
            n,
        })
    }
}

/// Two-sided p-value of `t` under the standard normal distribution.
pub fn two_sided_p_value(t: f64) -> Result<f64> {
    let normal =
        Normal::new(0.0, 1.0).map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok(2.0 * normal.sf(t.abs()))
}

/// Newey-West adjusted t-test with automatic lag selection.
pub fn newey_west_ttest(values: &[f64]) -> Result<TTest> {
    NeweyWestTest::default().ttest(values)
}
