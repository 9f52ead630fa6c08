use polars::prelude::{DataFrame, DataType, PolarsError};
use serde::Serialize;

use crate::error::{AnalysisError, Result};

/// Fewest numeric values an analysis can run on.
pub const MIN_SAMPLES: usize = 2;

/// A cleaned, finite column of numbers. Position `i` of each value is its
/// regression abscissa.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSeries {
    column: String,
    values: Vec<f64>,
}

impl NumericSeries {
    /// Build a series from already-numeric values, dropping non-finite ones.
    pub fn new(column: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Result<Self> {
        let column = column.into();
        let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if values.len() < MIN_SAMPLES {
            return Err(AnalysisError::InsufficientData {
                column,
                found: values.len(),
            });
        }
        Ok(Self { column, values })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Never true for a constructed series.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> f64 {
        self.values[0]
    }

    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// (position, value) pairs with positions 0..n-1.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().enumerate().map(|(i, &v)| (i as f64, v))
    }
}

/// Coerce one column of a table to numbers.
///
/// Cells that do not parse become missing and are dropped rather than
/// zero-filled. Non-finite values are dropped too.
pub fn sanitize_column(frame: &DataFrame, column: &str) -> Result<NumericSeries> {
    if frame.width() == 0 {
        return Err(AnalysisError::InsufficientData {
            column: column.to_string(),
            found: 0,
        });
    }

    let raw = frame.column(column).map_err(|e| match e {
        PolarsError::ColumnNotFound(_) => AnalysisError::MissingColumn(column.to_string()),
        other => AnalysisError::Polars(other),
    })?;

    // Non-strict cast: anything unparsable turns into null.
    let numeric = raw.cast(&DataType::Float64)?;
    let values: Vec<f64> = numeric
        .as_materialized_series()
        .f64()?
        .into_iter()
        .flatten()
        .collect();

    let series = NumericSeries::new(column, values);
    match &series {
        Ok(s) => tracing::info!(
            "Column '{}': {} value(s) before cleaning, {} after",
            column,
            frame.height(),
            s.len()
        ),
        Err(_) => tracing::warn!(
            "Column '{}': fewer than {} numeric value(s) out of {}",
            column,
            MIN_SAMPLES,
            frame.height()
        ),
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    fn frame(columns: Vec<Column>) -> DataFrame {
        DataFrame::new(columns).unwrap()
    }

    #[test]
    fn drops_unparsable_cells() {
        let df = frame(vec![Column::new(
            "views".into(),
            &["10", "abc", "12", "", "13.5"],
        )]);
        let series = sanitize_column(&df, "views").unwrap();
        assert_eq!(series.values(), &[10.0, 12.0, 13.5]);
        assert_eq!(series.column(), "views");
    }

    #[test]
    fn numeric_columns_pass_through() {
        let df = frame(vec![Column::new("n".into(), &[1i64, 2, 3])]);
        let series = sanitize_column(&df, "n").unwrap();
        assert_eq!(series.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn missing_column() {
        let df = frame(vec![Column::new("a".into(), &[1.0, 2.0])]);
        let err = sanitize_column(&df, "b").unwrap_err();
        assert!(matches!(err, AnalysisError::MissingColumn(name) if name == "b"));
    }

    #[test]
    fn empty_table() {
        let df = DataFrame::empty();
        let err = sanitize_column(&df, "a").unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { found: 0, .. }));
    }

    #[test]
    fn too_few_numbers_after_cleaning() {
        let df = frame(vec![Column::new("a".into(), &["x", "5", "y"])]);
        let err = sanitize_column(&df, "a").unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { found: 1, .. }));
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let series = NumericSeries::new("a", [1.0, f64::NAN, f64::INFINITY, 2.0]).unwrap();
        assert_eq!(series.values(), &[1.0, 2.0]);
        assert_eq!(series.first(), 1.0);
        assert_eq!(series.last(), 2.0);
    }

    #[test]
    fn points_use_zero_based_positions() {
        let series = NumericSeries::new("a", [5.0, 7.0]).unwrap();
        let points: Vec<(f64, f64)> = series.points().collect();
        assert_eq!(points, vec![(0.0, 5.0), (1.0, 7.0)]);
    }
}
