//! Sanitizer -> statistics -> trend -> Monte Carlo -> recommendations.
//!
//! Every stage checks its own inputs and the first failure ends the run; no
//! partial result is ever returned. Nothing here touches shared state, so
//! concurrent runs only need their own input and RNG.

use polars::prelude::DataFrame;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::processing::histogram::BoxSummary;
use crate::processing::monte_carlo::{
    self, NoiseModel, ProjectionMatrix, SimulationParams, DEFAULT_SIMULATIONS, DEFAULT_STEPS,
};
use crate::processing::recommendations::{generate_recommendations, Metrics, Recommendation};
use crate::processing::sanitizer::{sanitize_column, NumericSeries};
use crate::processing::statistics::{SeriesStats, Targets};
use crate::processing::trend::{cagr, TrendFit};

/// User-tunable knobs of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Monte Carlo draws per future step.
    pub simulations: usize,
    /// Future steps to project.
    pub steps: usize,
    /// Fixed seed for reproducible projections; fresh entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            simulations: DEFAULT_SIMULATIONS,
            steps: DEFAULT_STEPS,
            seed: None,
        }
    }
}

impl AnalysisConfig {
    /// Positive counts whose product stays within `MAX_DRAWS`.
    pub fn validate(&self) -> Result<()> {
        monte_carlo::total_draws(self.steps, self.simulations).map(|_| ())
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Everything one analysis run produced. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
    pub ideal: f64,
    pub tension: f64,
    pub pareto_80: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub skewness: Option<f64>,
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub std_err: f64,
    /// Trend value one step past the last observation.
    pub forecast: f64,
    /// Trend values for steps 1..=steps.
    pub forecasts: Vec<f64>,
    pub cagr: Option<f64>,
    pub noise_model: NoiseModel,
    pub projections: ProjectionMatrix,
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisResult {
    /// Scalar metrics in display order, for the bar chart and report table.
    pub fn scalar_metrics(&self) -> Vec<(&'static str, f64)> {
        let mut metrics = vec![
            ("Mean", self.mean),
            ("Max", self.max),
            ("Min", self.min),
            ("Ideal (golden ratio)", self.ideal),
            ("Tension", self.tension),
            ("Pareto 80/20", self.pareto_80),
            ("Std Dev", self.std_dev),
            ("Forecast", self.forecast),
        ];
        if let Some(c) = self.cagr {
            metrics.push(("CAGR %", c));
        }
        metrics
    }

    /// Five-number summary of the next-step draws.
    pub fn projection_summary(&self) -> Option<BoxSummary> {
        BoxSummary::compute(self.projections.first_step())
    }
}

/// Analyse one column of a table with the RNG described by `config`.
pub fn analyze_column(frame: &DataFrame, column: &str, config: &AnalysisConfig) -> Result<AnalysisResult> {
    config.validate()?;
    let series = sanitize_column(frame, column)?;
    analyze_series(&series, config)
}

/// Analyse an already-cleaned series with the RNG described by `config`.
pub fn analyze_series(series: &NumericSeries, config: &AnalysisConfig) -> Result<AnalysisResult> {
    let mut rng = config.rng();
    analyze_series_with_rng(series, config, &mut rng)
}

/// Analyse with a caller-supplied RNG; the seed in `config` is ignored.
pub fn analyze_series_with_rng<R: Rng + ?Sized>(
    series: &NumericSeries,
    config: &AnalysisConfig,
    rng: &mut R,
) -> Result<AnalysisResult> {
    config.validate()?;

    let stats = SeriesStats::compute(series)?;
    tracing::debug!("{}", stats.report(series.column()));
    let targets = Targets::from_mean(stats.mean);

    let trend = TrendFit::fit(series)?;
    let forecasts = trend.forecast_horizon(config.steps);
    let forecast = trend.forecast(1);
    let growth = cagr(series.values());

    let params = SimulationParams::new(trend.slope, trend.intercept, stats.std_dev, series.len())
        .with_skewness(stats.skewness)
        .with_simulations(config.simulations)
        .with_steps(config.steps);
    let projections = monte_carlo::simulate(&params, rng)?;

    let recommendations = generate_recommendations(&Metrics {
        mean: stats.mean,
        ideal: targets.ideal,
        std_dev: stats.std_dev,
        forecast,
        coefficient_of_variation: Some(stats.coefficient_of_variation),
        skewness: stats.skewness,
        tension: Some(targets.tension),
        cagr: growth,
    })?;

    tracing::info!(
        "Analysis of '{}' complete: {} values, forecast {:.3}, {} recommendation(s)",
        series.column(),
        stats.count,
        forecast,
        recommendations.len()
    );

    Ok(AnalysisResult {
        column: series.column().to_string(),
        count: stats.count,
        mean: stats.mean,
        median: stats.median,
        max: stats.max,
        min: stats.min,
        ideal: targets.ideal,
        tension: targets.tension,
        pareto_80: stats.pareto_80,
        std_dev: stats.std_dev,
        coefficient_of_variation: stats.coefficient_of_variation,
        skewness: stats.skewness,
        slope: trend.slope,
        intercept: trend.intercept,
        r_value: trend.r_value,
        r_squared: trend.r_squared,
        p_value: trend.p_value,
        std_err: trend.std_err,
        forecast,
        forecasts,
        cagr: growth,
        noise_model: params.noise_model(),
        projections,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    fn reference() -> NumericSeries {
        NumericSeries::new("views", [10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0]).unwrap()
    }

    fn seeded(seed: u64) -> AnalysisConfig {
        AnalysisConfig {
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn reference_scenario() {
        let result = analyze_series(&reference(), &seeded(1)).unwrap();
        assert!((result.mean - 13.0).abs() < 1e-9);
        assert!(result.slope > 0.0);
        assert!(result.forecast > result.mean);
        assert!((result.ideal - 21.034).abs() < 1e-9);
        assert!((result.tension - 8.034).abs() < 1e-9);
        assert_eq!(result.noise_model, NoiseModel::Symmetric);
        assert_eq!(result.projections.shape(), (1, 1000));
        assert_eq!(
            result.recommendations,
            vec![
                Recommendation::BelowIdeal,
                Recommendation::HighVariability,
                Recommendation::AcceptableVolatility,
                Recommendation::LowGrowth,
            ]
        );
    }

    #[test]
    fn forecasts_follow_the_horizon() {
        let config = AnalysisConfig {
            steps: 3,
            simulations: 10,
            seed: Some(5),
        };
        let result = analyze_series(&reference(), &config).unwrap();
        assert_eq!(result.forecasts.len(), 3);
        assert_eq!(result.forecasts[0], result.forecast);
        assert_eq!(result.projections.shape(), (3, 10));
    }

    #[test]
    fn config_is_validated_first() {
        let config = AnalysisConfig {
            simulations: 0,
            ..Default::default()
        };
        assert!(matches!(
            analyze_series(&reference(), &config),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn oversized_config_is_rejected() {
        let config = AnalysisConfig {
            steps: usize::MAX / 2,
            simulations: 4,
            seed: Some(1),
        };
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidParameter(_))));
        assert!(matches!(
            analyze_series(&reference(), &config),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn constant_series_cannot_be_simulated() {
        let flat = NumericSeries::new("flat", [4.0, 4.0, 4.0]).unwrap();
        assert!(matches!(
            analyze_series(&flat, &seeded(1)),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn zero_mean_fails_before_simulation() {
        let centred = NumericSeries::new("delta", [-2.0, 0.0, 2.0]).unwrap();
        assert!(matches!(
            analyze_series(&centred, &seeded(1)),
            Err(AnalysisError::DivisionByZero(_))
        ));
    }

    #[test]
    fn scalar_metrics_include_cagr_only_when_present() {
        let result = analyze_series(&reference(), &seeded(1)).unwrap();
        let labels: Vec<&str> = result.scalar_metrics().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels.first(), Some(&"Mean"));
        assert_eq!(labels.last(), Some(&"CAGR %"));

        let negative = NumericSeries::new("n", [-5.0, 3.0, 8.0]).unwrap();
        let result = analyze_series(&negative, &seeded(1)).unwrap();
        assert!(result.cagr.is_none());
        assert!(result.scalar_metrics().iter().all(|(l, _)| *l != "CAGR %"));
    }

    #[test]
    fn config_round_trips_with_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"steps": 4}"#).unwrap();
        assert_eq!(config.steps, 4);
        assert_eq!(config.simulations, DEFAULT_SIMULATIONS);
        assert_eq!(config.seed, None);
    }
}
