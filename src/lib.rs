//! DecisionMaker: import a table, pick a numeric column, and get descriptive
//! statistics, a trend forecast, a Monte Carlo projection and a list of
//! recommendations back.

pub mod data;
pub mod error;
pub mod processing;
pub mod report;
pub mod state;

pub use error::{AnalysisError, Result};
pub use processing::pipeline::{analyze_column, analyze_series, AnalysisConfig, AnalysisResult};
