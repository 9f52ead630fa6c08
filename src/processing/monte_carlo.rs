//! Stochastic projection around the linear trend.
//!
//! Each future step `k` gets `simulations` independent draws of noise added
//! to the deterministic value `slope * (n + k) + intercept`. The noise family
//! is picked once per run from the series skewness.

use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal};
use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::processing::statistics::HIGH_SKEWNESS;

pub const DEFAULT_SIMULATIONS: usize = 1000;
pub const DEFAULT_STEPS: usize = 1;
/// Upper bound on steps x simulations for one run.
pub const MAX_DRAWS: usize = 10_000_000;

/// Total draws for a run, rejecting zero counts and products above
/// `MAX_DRAWS` (including ones that overflow `usize`).
pub fn total_draws(steps: usize, simulations: usize) -> Result<usize> {
    if simulations == 0 {
        return Err(AnalysisError::InvalidParameter(
            "simulation count must be a positive integer".to_string(),
        ));
    }
    if steps == 0 {
        return Err(AnalysisError::InvalidParameter(
            "step count must be a positive integer".to_string(),
        ));
    }
    match steps.checked_mul(simulations) {
        Some(total) if total <= MAX_DRAWS => Ok(total),
        _ => Err(AnalysisError::InvalidParameter(format!(
            "{steps} step(s) x {simulations} simulation(s) exceeds the limit of {MAX_DRAWS} draws"
        ))),
    }
}

/// Noise family used for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoiseModel {
    /// Zero-mean normal with scale `std_dev`.
    Symmetric,
    /// Log-normal with mu = 0 and sigma = ln(1 + std_dev); always positive.
    RightSkewed,
}

impl NoiseModel {
    /// Right-skewed when |skewness| > 1, symmetric otherwise or when the
    /// skewness is unknown.
    pub fn select(skewness: Option<f64>) -> Self {
        match skewness {
            Some(s) if s.abs() > HIGH_SKEWNESS => NoiseModel::RightSkewed,
            _ => NoiseModel::Symmetric,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NoiseModel::Symmetric => "Normal",
            NoiseModel::RightSkewed => "Log-normal",
        }
    }
}

/// A concrete sampler for one run, built after validation.
enum Noise {
    Symmetric(Normal<f64>),
    RightSkewed(LogNormal<f64>),
}

impl Noise {
    fn new(model: NoiseModel, std_dev: f64) -> Result<Self> {
        let invalid = |e: &dyn std::fmt::Display| AnalysisError::InvalidParameter(format!("noise distribution: {e}"));
        Ok(match model {
            NoiseModel::Symmetric => Noise::Symmetric(Normal::new(0.0, std_dev).map_err(|e| invalid(&e))?),
            NoiseModel::RightSkewed => {
                Noise::RightSkewed(LogNormal::new(0.0, std_dev.ln_1p()).map_err(|e| invalid(&e))?)
            }
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Noise::Symmetric(d) => d.sample(rng),
            Noise::RightSkewed(d) => d.sample(rng),
        }
    }
}

/// Inputs to a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub slope: f64,
    pub intercept: f64,
    pub std_dev: f64,
    pub series_len: usize,
    pub skewness: Option<f64>,
    pub simulations: usize,
    pub steps: usize,
}

impl SimulationParams {
    pub fn new(slope: f64, intercept: f64, std_dev: f64, series_len: usize) -> Self {
        Self {
            slope,
            intercept,
            std_dev,
            series_len,
            skewness: None,
            simulations: DEFAULT_SIMULATIONS,
            steps: DEFAULT_STEPS,
        }
    }

    pub fn with_skewness(mut self, skewness: Option<f64>) -> Self {
        self.skewness = skewness;
        self
    }

    pub fn with_simulations(mut self, simulations: usize) -> Self {
        self.simulations = simulations;
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.std_dev.is_finite() && self.std_dev > 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "standard deviation must be positive, got {}",
                self.std_dev
            )));
        }
        if self.series_len == 0 {
            return Err(AnalysisError::InvalidParameter(
                "series length must be a positive integer".to_string(),
            ));
        }
        total_draws(self.steps, self.simulations)?;
        if !(self.slope.is_finite() && self.intercept.is_finite()) {
            return Err(AnalysisError::InvalidParameter(
                "trend coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn noise_model(&self) -> NoiseModel {
        NoiseModel::select(self.skewness)
    }

    /// Deterministic centre of the draws for step `k` (1-based).
    pub fn baseline(&self, step: usize) -> f64 {
        self.slope * (self.series_len + step) as f64 + self.intercept
    }
}

/// Simulated values laid out row-major as [step][simulation]. Only `simulate`
/// builds one, so `values.len() == steps * simulations` with both positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionMatrix {
    steps: usize,
    simulations: usize,
    values: Vec<f64>,
}

impl ProjectionMatrix {
    /// (steps, simulations)
    pub fn shape(&self) -> (usize, usize) {
        (self.steps, self.simulations)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn simulations(&self) -> usize {
        self.simulations
    }

    /// Draws for the zero-based step index `step`.
    pub fn row(&self, step: usize) -> Option<&[f64]> {
        if step >= self.steps {
            return None;
        }
        let start = step * self.simulations;
        Some(&self.values[start..start + self.simulations])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.simulations)
    }

    /// The single row of a one-step projection viewed as a plain vector.
    pub fn as_vector(&self) -> Option<&[f64]> {
        if self.steps == 1 {
            Some(&self.values)
        } else {
            None
        }
    }

    /// Draws for the next step; always present.
    pub fn first_step(&self) -> &[f64] {
        &self.values[..self.simulations]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Run the simulation. Parameters are checked before any draw, so a failure
/// never leaves a partial matrix behind.
pub fn simulate<R: Rng + ?Sized>(params: &SimulationParams, rng: &mut R) -> Result<ProjectionMatrix> {
    params.validate()?;

    let model = params.noise_model();
    let noise = Noise::new(model, params.std_dev)?;
    tracing::debug!(
        "Simulating {} step(s) x {} draw(s) with {} noise",
        params.steps,
        params.simulations,
        model.label()
    );

    let mut values = Vec::with_capacity(total_draws(params.steps, params.simulations)?);
    for step in 1..=params.steps {
        let baseline = params.baseline(step);
        values.extend((0..params.simulations).map(|_| baseline + noise.sample(rng)));
    }

    Ok(ProjectionMatrix {
        steps: params.steps,
        simulations: params.simulations,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> SimulationParams {
        SimulationParams::new(0.93, 10.2, 2.16, 7)
    }

    #[test]
    fn default_shape_is_one_row() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = simulate(&params(), &mut rng).unwrap();
        assert_eq!(m.shape(), (1, DEFAULT_SIMULATIONS));
        assert_eq!(m.as_vector().map(|v| v.len()), Some(DEFAULT_SIMULATIONS));
        assert!(m.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn multi_step_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = simulate(&params().with_steps(3).with_simulations(50), &mut rng).unwrap();
        assert_eq!(m.shape(), (3, 50));
        assert_eq!(m.rows().count(), 3);
        assert!(m.rows().all(|r| r.len() == 50));
        assert!(m.as_vector().is_none());
        assert!(m.row(3).is_none());
    }

    #[test]
    fn zero_std_dev_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = SimulationParams::new(1.0, 0.0, 0.0, 5);
        assert!(matches!(simulate(&p, &mut rng), Err(AnalysisError::InvalidParameter(_))));
    }

    #[test]
    fn zero_counts_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        for p in [
            SimulationParams::new(1.0, 0.0, 1.0, 0),
            params().with_simulations(0),
            params().with_steps(0),
            SimulationParams::new(1.0, 0.0, f64::NAN, 5),
        ] {
            assert!(matches!(simulate(&p, &mut rng), Err(AnalysisError::InvalidParameter(_))));
        }
    }

    #[test]
    fn oversized_runs_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        for p in [
            params().with_steps(usize::MAX / 2).with_simulations(4),
            params().with_steps(usize::MAX).with_simulations(usize::MAX),
            params().with_steps(2).with_simulations(MAX_DRAWS / 2 + 1),
        ] {
            assert!(matches!(simulate(&p, &mut rng), Err(AnalysisError::InvalidParameter(_))));
        }
        assert_eq!(total_draws(4, MAX_DRAWS / 4).unwrap(), MAX_DRAWS);
    }

    #[test]
    fn noise_selection() {
        assert_eq!(NoiseModel::select(None), NoiseModel::Symmetric);
        assert_eq!(NoiseModel::select(Some(0.4)), NoiseModel::Symmetric);
        assert_eq!(NoiseModel::select(Some(1.0)), NoiseModel::Symmetric);
        assert_eq!(NoiseModel::select(Some(1.5)), NoiseModel::RightSkewed);
        assert_eq!(NoiseModel::select(Some(-2.0)), NoiseModel::RightSkewed);
    }

    #[test]
    fn skewed_noise_is_never_negative() {
        let mut rng = StdRng::seed_from_u64(42);
        let p = params().with_skewness(Some(2.3)).with_steps(2);
        let m = simulate(&p, &mut rng).unwrap();
        for (k, row) in m.rows().enumerate() {
            let baseline = p.baseline(k + 1);
            assert!(row.iter().all(|&v| v > baseline));
        }
    }

    #[test]
    fn symmetric_noise_straddles_the_baseline() {
        let mut rng = StdRng::seed_from_u64(42);
        let p = params().with_skewness(Some(0.2)).with_simulations(5000);
        let m = simulate(&p, &mut rng).unwrap();
        let baseline = p.baseline(1);
        let row = m.first_step();
        assert!(row.iter().any(|&v| v < baseline));
        assert!(row.iter().any(|&v| v > baseline));
        let mean = row.iter().sum::<f64>() / row.len() as f64;
        assert!((mean - baseline).abs() < 0.2, "mean {mean} vs baseline {baseline}");
    }

    #[test]
    fn baseline_is_one_past_the_series() {
        let p = SimulationParams::new(2.0, 1.0, 1.0, 4);
        assert_eq!(p.baseline(1), 11.0);
        assert_eq!(p.baseline(2), 13.0);
    }

    #[test]
    fn same_seed_same_draws() {
        let a = simulate(&params(), &mut StdRng::seed_from_u64(99)).unwrap();
        let b = simulate(&params(), &mut StdRng::seed_from_u64(99)).unwrap();
        let c = simulate(&params(), &mut StdRng::seed_from_u64(100)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.shape(), c.shape());
        assert_ne!(a, c);
    }
}
