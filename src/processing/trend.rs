//! Ordinary least squares of value on position.
//!
//! Positions are the zero-based indices of the cleaned series, so the last
//! observation sits at `n - 1` and the forecast for step `k` is evaluated at
//! `n - 1 + k`.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{AnalysisError, Result};
use crate::processing::sanitizer::NumericSeries;

/// Fits explaining less than this share of variance are logged as weak.
pub const MIN_GOOD_R_SQUARED: f64 = 0.5;

/// Keeps the t statistic finite for a perfect fit.
const TINY: f64 = 1.0e-20;

/// A fitted linear trend y = intercept + slope * t.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation between position and value.
    pub r_value: f64,
    pub r_squared: f64,
    /// Two-sided p-value for the null hypothesis slope = 0.
    pub p_value: f64,
    /// Standard error of the slope estimate.
    pub std_err: f64,
    /// Number of observations fitted.
    pub n_observations: usize,
}

impl TrendFit {
    pub fn fit(series: &NumericSeries) -> Result<Self> {
        let values = series.values();
        let n = values.len();
        if n < 2 {
            return Err(AnalysisError::InsufficientData {
                column: series.column().to_string(),
                found: n,
            });
        }

        let nf = n as f64;
        let mean_t = (nf - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / nf;

        let mut ss_t = 0.0;
        let mut ss_y = 0.0;
        let mut ss_ty = 0.0;
        for (t, y) in series.points() {
            let dt = t - mean_t;
            let dy = y - mean_y;
            ss_t += dt * dt;
            ss_y += dy * dy;
            ss_ty += dt * dy;
        }

        let slope = ss_ty / ss_t;
        let intercept = mean_y - slope * mean_t;

        let r_value = if ss_t == 0.0 || ss_y == 0.0 {
            0.0
        } else {
            (ss_ty / (ss_t * ss_y).sqrt()).clamp(-1.0, 1.0)
        };
        let r_squared = r_value * r_value;

        let (p_value, std_err) = if n == 2 {
            // A line through two points is exact; only a flat one is "no trend".
            let p = if values[0] == values[1] { 1.0 } else { 0.0 };
            (p, 0.0)
        } else {
            let df = nf - 2.0;
            let t_stat = r_value * (df / ((1.0 - r_value + TINY) * (1.0 + r_value + TINY))).sqrt();
            let t_dist = StudentsT::new(0.0, 1.0, df)
                .map_err(|e| AnalysisError::InvalidParameter(format!("t-distribution: {e}")))?;
            let p = (2.0 * t_dist.sf(t_stat.abs())).min(1.0);
            let se = ((1.0 - r_squared) * ss_y / ss_t / df).sqrt();
            (p, se)
        };

        let fit = Self {
            slope,
            intercept,
            r_value,
            r_squared,
            p_value,
            std_err,
            n_observations: n,
        };
        if fit.is_weak() {
            tracing::warn!(
                "Weak linear trend for '{}' (R\u{b2} = {:.3}); treat the forecast with caution",
                series.column(),
                r_squared
            );
        }
        Ok(fit)
    }

    /// Value of the fitted line at position `t`.
    pub fn predict_at(&self, t: f64) -> f64 {
        self.intercept + self.slope * t
    }

    /// Forecast `step` positions past the last observation (`step` >= 1).
    pub fn forecast(&self, step: usize) -> f64 {
        self.predict_at((self.n_observations - 1 + step) as f64)
    }

    /// Forecasts for steps 1..=steps.
    pub fn forecast_horizon(&self, steps: usize) -> Vec<f64> {
        (1..=steps).map(|k| self.forecast(k)).collect()
    }

    pub fn is_weak(&self) -> bool {
        self.r_squared < MIN_GOOD_R_SQUARED
    }
}

/// Compound growth per period in percent, from the first to the last value.
///
/// `None` unless there are at least two values and all of them are
/// strictly positive.
pub fn cagr(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    if min <= 0.0 {
        return None;
    }
    let first = values[0];
    let last = values[values.len() - 1];
    let periods = (values.len() - 1) as f64;
    Some(((last / first).powf(1.0 / periods) - 1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> NumericSeries {
        NumericSeries::new("test", values.iter().copied()).unwrap()
    }

    #[test]
    fn reference_series_fit() {
        let fit = TrendFit::fit(&series(&[10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0])).unwrap();
        // S_ty = 26, S_tt = 28
        assert!((fit.slope - 26.0 / 28.0).abs() < 1e-12);
        assert!((fit.intercept - (13.0 - 3.0 * 26.0 / 28.0)).abs() < 1e-12);
        assert!((fit.r_value - 26.0 / 28.0).abs() < 1e-12);
        assert!(fit.p_value > 0.0 && fit.p_value < 0.01, "p = {}", fit.p_value);
        assert!(fit.std_err > 0.0);
        assert!(!fit.is_weak());

        let next = fit.forecast(1);
        assert!((next - (fit.slope * 7.0 + fit.intercept)).abs() < 1e-12);
        assert!(next > 13.0);
    }

    #[test]
    fn perfect_line() {
        let fit = TrendFit::fit(&series(&[2.0, 4.0, 6.0, 8.0])).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 2.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!(fit.p_value < 1e-6);
        assert!(fit.std_err.abs() < 1e-9);
        assert_eq!(fit.forecast_horizon(2), vec![10.0, 12.0]);
    }

    #[test]
    fn flat_series_has_no_trend() {
        let fit = TrendFit::fit(&series(&[5.0, 5.0, 5.0, 5.0])).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_value, 0.0);
        assert!((fit.p_value - 1.0).abs() < 1e-12);
        assert!(fit.is_weak());
    }

    #[test]
    fn two_points() {
        let fit = TrendFit::fit(&series(&[1.0, 3.0])).unwrap();
        assert_eq!(fit.slope, 2.0);
        assert_eq!(fit.p_value, 0.0);
        assert_eq!(fit.std_err, 0.0);
        assert_eq!(fit.forecast(1), 5.0);
    }

    #[test]
    fn noisy_series_is_weak() {
        let fit = TrendFit::fit(&series(&[5.0, 1.0, 6.0, 0.0, 5.0, 1.0])).unwrap();
        assert!(fit.is_weak());
        assert!(fit.p_value > 0.05);
    }

    #[test]
    fn cagr_of_doubling() {
        let growth = cagr(&[100.0, 200.0, 400.0]).unwrap();
        assert!((growth - 100.0).abs() < 1e-9);
    }

    #[test]
    fn cagr_reference_series() {
        let growth = cagr(&[10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0]).unwrap();
        assert!((growth - (1.6f64.powf(1.0 / 6.0) - 1.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn cagr_absent_for_non_positive_series() {
        assert_eq!(cagr(&[0.0, 1.0, 2.0]), None);
        assert_eq!(cagr(&[3.0, -1.0, 2.0]), None);
        assert_eq!(cagr(&[3.0]), None);
    }
}
