use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::processing::sanitizer::NumericSeries;

/// Golden-ratio multiplier for the aspirational target.
pub const IDEAL_RATIO: f64 = 1.618;
/// Golden-ratio conjugate for the warning threshold.
pub const TENSION_RATIO: f64 = 0.618;
/// Quantile reported as the Pareto 80/20 value.
pub const PARETO_QUANTILE: f64 = 0.8;
/// |skewness| above this counts as highly asymmetric, here and in the
/// simulator's noise selection.
pub const HIGH_SKEWNESS: f64 = 1.0;

/// Descriptive statistics for a cleaned series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev: f64,
    /// std_dev / mean * 100.
    pub coefficient_of_variation: f64,
    /// 80th percentile, linear interpolation.
    pub pareto_80: f64,
    /// Adjusted Fisher-Pearson skewness; `None` below three values.
    pub skewness: Option<f64>,
}

impl SeriesStats {
    /// Fails with `DivisionByZero` when the mean is zero, since the
    /// coefficient of variation is undefined there.
    pub fn compute(series: &NumericSeries) -> Result<Self> {
        let values = series.values();
        let count = values.len();

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let min = sorted[0];
        let max = sorted[count - 1];
        let mean = mean(values);
        let std_dev = sample_std_dev(values, mean);
        let coefficient_of_variation = coefficient_of_variation(std_dev, mean)?;
        let skewness = skewness(values, mean);

        if let Some(skew) = skewness {
            if skew.abs() > HIGH_SKEWNESS {
                tracing::warn!(
                    "Column '{}' is highly skewed ({:.3}); projections use the right-skewed noise model",
                    series.column(),
                    skew
                );
            }
        }

        Ok(SeriesStats {
            count,
            min,
            max,
            mean,
            median: quantile_sorted(&sorted, 0.5),
            std_dev,
            coefficient_of_variation,
            pareto_80: quantile_sorted(&sorted, PARETO_QUANTILE),
            skewness,
        })
    }

    /// Format as a multi-line report string.
    pub fn report(&self, label: &str) -> String {
        let skew = self
            .skewness
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "{}:\n  Count: {}\n  Min: {:.3}\n  Max: {:.3}\n  Mean: {:.3}\n  Median: {:.3}\n  Std Dev: {:.3}\n  CV: {:.2}%\n  Pareto 80/20: {:.3}\n  Skewness: {}\n",
            label,
            self.count,
            self.min,
            self.max,
            self.mean,
            self.median,
            self.std_dev,
            self.coefficient_of_variation,
            self.pareto_80,
            skew
        )
    }
}

/// Golden-ratio thresholds derived from the mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Targets {
    pub ideal: f64,
    pub tension: f64,
}

impl Targets {
    pub fn from_mean(mean: f64) -> Self {
        Self {
            ideal: mean * IDEAL_RATIO,
            tension: mean * TENSION_RATIO,
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

pub fn coefficient_of_variation(std_dev: f64, mean: f64) -> Result<f64> {
    if mean == 0.0 {
        return Err(AnalysisError::DivisionByZero(
            "coefficient of variation is undefined for a zero mean",
        ));
    }
    Ok(std_dev / mean * 100.0)
}

/// Adjusted Fisher-Pearson coefficient G1 = g1 * sqrt(n(n-1)) / (n-2),
/// where g1 = m3 / m2^1.5 uses population central moments.
/// A constant series has skewness 0.
pub fn skewness(values: &[f64], mean: f64) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / nf;
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0))
}

/// Linear-interpolated quantile of an ascending slice, `p` in [0, 1].
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}
