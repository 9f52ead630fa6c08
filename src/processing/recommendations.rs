//! Rule-based findings over the computed metrics.
//!
//! The engine walks a fixed table of rules in order; each rule looks at the
//! metrics and yields at most one finding. No randomness, no I/O.

use serde::{Serialize, Serializer};

use crate::error::{AnalysisError, Result};
use crate::processing::statistics::HIGH_SKEWNESS;

/// Std-dev above this share of the mean is "high variability".
pub const VARIABILITY_RATIO: f64 = 0.1;
/// Coefficient of variation (percent) above this is "high volatility".
pub const VOLATILITY_CV: f64 = 20.0;
/// CAGR (percent) above this is "high growth".
pub const GROWTH_CAGR: f64 = 10.0;

/// Inputs to the engine. The first four are required; the rest are skipped
/// by their rules when absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metrics {
    pub mean: f64,
    pub ideal: f64,
    pub std_dev: f64,
    pub forecast: f64,
    pub coefficient_of_variation: Option<f64>,
    pub skewness: Option<f64>,
    pub tension: Option<f64>,
    pub cagr: Option<f64>,
}

impl Metrics {
    fn validate(&self) -> Result<()> {
        let required = [
            ("mean", self.mean),
            ("ideal", self.ideal),
            ("std_dev", self.std_dev),
            ("forecast", self.forecast),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalysisError::InvalidMetrics(format!("{name} is missing or not finite")));
        }

        let optional = [
            ("coefficient_of_variation", self.coefficient_of_variation),
            ("skewness", self.skewness),
            ("tension", self.tension),
            ("cagr", self.cagr),
        ];
        if let Some((name, _)) = optional
            .iter()
            .find(|(_, v)| v.is_some_and(|x| !x.is_finite()))
        {
            return Err(AnalysisError::InvalidMetrics(format!("{name} is not finite")));
        }

        if self.mean == 0.0 {
            return Err(AnalysisError::InvalidMetrics("mean must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// One finding. Serializes as its message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recommendation {
    InvestMore,
    BelowIdeal,
    HighVariability,
    AcceptableVariability,
    HighVolatility,
    AcceptableVolatility,
    HighAsymmetry,
    BelowTension,
    HighGrowth,
    LowGrowth,
}

impl Recommendation {
    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::InvestMore => {
                "The projected value exceeds the ideal value. Consider investing more resources."
            }
            Recommendation::BelowIdeal => {
                "The projected value is below the ideal value. Evaluate improvement strategies."
            }
            Recommendation::HighVariability => {
                "High variability in the data. Consider standardizing the underlying processes."
            }
            Recommendation::AcceptableVariability => "Acceptable variability in the data.",
            Recommendation::HighVolatility => {
                "Coefficient of variation above 20%: the series is highly volatile."
            }
            Recommendation::AcceptableVolatility => {
                "Coefficient of variation within 20%: volatility is acceptable."
            }
            Recommendation::HighAsymmetry => {
                "The data are highly asymmetric. Consider transforming the data or adjusting the analysis to account for it."
            }
            Recommendation::BelowTension => {
                "The projected value is below the tension threshold. Consider a conservative strategy."
            }
            Recommendation::HighGrowth => {
                "Compound growth above 10% per period. Maintain or expand the current strategy."
            }
            Recommendation::LowGrowth => {
                "Compound growth at or below 10% per period. Evaluate a new strategy."
            }
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.message())
    }
}

/// A named predicate over the metrics.
pub struct Rule {
    pub name: &'static str,
    pub evaluate: fn(&Metrics) -> Option<Recommendation>,
}

/// Evaluated in this order; each contributes at most one finding.
pub static RULES: [Rule; 6] = [
    Rule {
        name: "forecast_vs_ideal",
        evaluate: |m: &Metrics| {
            Some(if m.forecast > m.ideal {
                Recommendation::InvestMore
            } else {
                Recommendation::BelowIdeal
            })
        },
    },
    Rule {
        name: "variability",
        evaluate: |m: &Metrics| {
            Some(if m.std_dev > VARIABILITY_RATIO * m.mean {
                Recommendation::HighVariability
            } else {
                Recommendation::AcceptableVariability
            })
        },
    },
    Rule {
        name: "volatility",
        evaluate: |m: &Metrics| {
            m.coefficient_of_variation.map(|cv| {
                if cv > VOLATILITY_CV {
                    Recommendation::HighVolatility
                } else {
                    Recommendation::AcceptableVolatility
                }
            })
        },
    },
    Rule {
        name: "asymmetry",
        evaluate: |m: &Metrics| {
            m.skewness
                .filter(|s| s.abs() > HIGH_SKEWNESS)
                .map(|_| Recommendation::HighAsymmetry)
        },
    },
    Rule {
        name: "tension",
        evaluate: |m: &Metrics| {
            m.tension
                .filter(|&t| m.forecast < t)
                .map(|_| Recommendation::BelowTension)
        },
    },
    Rule {
        name: "growth",
        evaluate: |m: &Metrics| {
            m.cagr.map(|c| {
                if c > GROWTH_CAGR {
                    Recommendation::HighGrowth
                } else {
                    Recommendation::LowGrowth
                }
            })
        },
    },
];

pub fn generate_recommendations(metrics: &Metrics) -> Result<Vec<Recommendation>> {
    metrics.validate()?;

    let findings: Vec<Recommendation> = RULES.iter().filter_map(|rule| (rule.evaluate)(metrics)).collect();
    tracing::debug!("{} recommendation(s) from {} rule(s)", findings.len(), RULES.len());
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Metrics {
        Metrics {
            mean: 13.0,
            ideal: 13.0 * 1.618,
            std_dev: 2.16,
            forecast: 16.7,
            ..Default::default()
        }
    }

    #[test]
    fn required_rules_only() {
        let recs = generate_recommendations(&base()).unwrap();
        assert_eq!(recs, vec![Recommendation::BelowIdeal, Recommendation::HighVariability]);
    }

    #[test]
    fn forecast_above_ideal() {
        let m = Metrics { forecast: 30.0, ..base() };
        assert_eq!(generate_recommendations(&m).unwrap()[0], Recommendation::InvestMore);
    }

    #[test]
    fn low_variability() {
        let m = Metrics { std_dev: 1.0, ..base() };
        assert_eq!(generate_recommendations(&m).unwrap()[1], Recommendation::AcceptableVariability);
    }

    #[test]
    fn full_battery_in_order() {
        let m = Metrics {
            forecast: 5.0,
            coefficient_of_variation: Some(35.0),
            skewness: Some(-1.4),
            tension: Some(13.0 * 0.618),
            cagr: Some(12.5),
            ..base()
        };
        assert_eq!(
            generate_recommendations(&m).unwrap(),
            vec![
                Recommendation::BelowIdeal,
                Recommendation::HighVariability,
                Recommendation::HighVolatility,
                Recommendation::HighAsymmetry,
                Recommendation::BelowTension,
                Recommendation::HighGrowth,
            ]
        );
    }

    #[test]
    fn optional_rules_on_the_quiet_side() {
        let m = Metrics {
            coefficient_of_variation: Some(20.0),
            skewness: Some(1.0),
            tension: Some(8.0),
            cagr: Some(10.0),
            ..base()
        };
        assert_eq!(
            generate_recommendations(&m).unwrap(),
            vec![
                Recommendation::BelowIdeal,
                Recommendation::HighVariability,
                Recommendation::AcceptableVolatility,
                Recommendation::LowGrowth,
            ]
        );
    }

    #[test]
    fn zero_mean_is_rejected() {
        let m = Metrics { mean: 0.0, ideal: 0.0, ..base() };
        assert!(matches!(generate_recommendations(&m), Err(AnalysisError::InvalidMetrics(_))));
    }

    #[test]
    fn missing_required_metric_is_rejected() {
        let m = Metrics { forecast: f64::NAN, ..base() };
        let err = generate_recommendations(&m).unwrap_err();
        assert!(err.to_string().contains("forecast"));
    }

    #[test]
    fn non_finite_optional_metric_is_rejected() {
        let m = Metrics { cagr: Some(f64::INFINITY), ..base() };
        assert!(matches!(generate_recommendations(&m), Err(AnalysisError::InvalidMetrics(_))));
    }

    #[test]
    fn deterministic() {
        let m = Metrics { cagr: Some(3.0), skewness: Some(2.0), ..base() };
        assert_eq!(generate_recommendations(&m).unwrap(), generate_recommendations(&m).unwrap());
    }

    #[test]
    fn each_rule_stands_alone() {
        let m = Metrics { tension: Some(20.0), ..base() };
        let tension = RULES.iter().find(|r| r.name == "tension").unwrap();
        assert_eq!((tension.evaluate)(&m), Some(Recommendation::BelowTension));
        let growth = RULES.iter().find(|r| r.name == "growth").unwrap();
        assert_eq!((growth.evaluate)(&m), None);
    }

    #[test]
    fn serializes_as_message() {
        let json = serde_json::to_string(&vec![Recommendation::AcceptableVariability]).unwrap();
        assert_eq!(json, r#"["Acceptable variability in the data."]"#);
    }
}
