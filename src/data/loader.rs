use std::collections::HashSet;
use std::path::Path;

use polars::prelude::{Column, DataFrame};

use crate::data::parser;
use crate::error::{AnalysisError, Result};

/// Result of loading a data file: column names and column data as strings
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub columns: Vec<String>,
    pub column_data: Vec<Vec<String>>, // column-major: column_data[col_idx][row_idx]
    pub row_count: usize,
}

impl LoadedData {
    /// Build column-major data from row-major cells, taking the header from
    /// `header_row` and treating every later row as data.
    pub fn from_rows(all_rows: &[Vec<String>], header_row: usize) -> Result<Self> {
        if header_row >= all_rows.len() {
            return Err(AnalysisError::Parse("No data found after header detection".to_string()));
        }

        let columns = unique_names(&all_rows[header_row]);
        let data_rows = &all_rows[header_row + 1..];

        let mut column_data: Vec<Vec<String>> = vec![Vec::with_capacity(data_rows.len()); columns.len()];
        for row in data_rows {
            for (col_idx, col_data) in column_data.iter_mut().enumerate() {
                col_data.push(row.get(col_idx).map(|s| s.trim().to_string()).unwrap_or_default());
            }
        }

        Ok(Self {
            columns,
            column_data,
            row_count: data_rows.len(),
        })
    }

    /// Indices of columns that look numeric: at least half of the first 100
    /// non-empty cells parse as numbers.
    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.columns.len())
            .filter(|&i| {
                let sample: Vec<&str> = self.column_data[i]
                    .iter()
                    .map(|s| s.as_str())
                    .filter(|s| !s.is_empty())
                    .take(100)
                    .collect();
                if sample.is_empty() {
                    return false;
                }
                let numeric = sample.iter().filter(|s| s.parse::<f64>().is_ok()).count();
                numeric as f64 / sample.len() as f64 >= 0.5
            })
            .collect()
    }

    /// The loaded table as a polars frame of string columns. Numeric coercion
    /// happens later, per analysed column.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .zip(&self.column_data)
            .map(|(name, values)| Column::new(name.as_str().into(), values))
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

/// Header cells with blanks filled in and duplicates suffixed, since a
/// frame cannot hold two columns with the same name.
fn unique_names(header: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let base = match raw.trim() {
                "" => format!("column_{}", i + 1),
                name => name.to_string(),
            };
            let mut name = base.clone();
            let mut suffix = 2;
            while !seen.insert(name.clone()) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

/// Load a CSV, Excel, JSON or XML file and return the column names and raw string data.
pub fn load_file(path: &Path) -> Result<LoadedData> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let loaded = match ext.as_str() {
        "csv" => load_csv(path),
        "xls" | "xlsx" => load_excel(path),
        "json" => load_json(path),
        "xml" => load_xml(path),
        _ => Err(AnalysisError::UnsupportedFormat(format!(".{ext}"))),
    }?;

    tracing::info!(
        "Loaded {:?}: {} columns, {} rows",
        path,
        loaded.columns.len(),
        loaded.row_count
    );
    Ok(loaded)
}

fn load_csv(path: &Path) -> Result<LoadedData> {
    let content = std::fs::read(path)?;
    parse_csv(&content)
}

/// Parse CSV bytes. Non-UTF-8 input is read as Latin-1.
pub fn parse_csv(content: &[u8]) -> Result<LoadedData> {
    let text = match std::str::from_utf8(content) {
        Ok(s) => s.to_string(),
        Err(_) => content.iter().map(|&b| b as char).collect(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let all_rows: Vec<Vec<String>> = reader
        .records()
        .filter_map(|record| record.ok())
        .map(|record| record.iter().map(|s| s.to_string()).collect())
        .filter(|row: &Vec<String>| !row.is_empty())
        .collect();

    if all_rows.is_empty() {
        return Err(AnalysisError::Parse("No data found in file".to_string()));
    }

    LoadedData::from_rows(&all_rows, parser::detect_header_row(&all_rows))
}

fn load_excel(path: &Path) -> Result<LoadedData> {
    use calamine::{open_workbook_auto, Data, Reader};

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AnalysisError::Parse(format!("Cannot open Excel file: {e}")))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AnalysisError::Parse("No sheets found".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AnalysisError::Parse(format!("Cannot read sheet: {e}")))?;

    let all_rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    Data::String(s) => s.clone(),
                    Data::Float(f) => f.to_string(),
                    Data::Int(i) => i.to_string(),
                    Data::Bool(b) => b.to_string(),
                    Data::DateTime(dt) => dt.to_string(),
                    Data::DateTimeIso(s) => s.clone(),
                    Data::DurationIso(s) => s.clone(),
                    Data::Error(e) => format!("{e:?}"),
                })
                .collect()
        })
        .collect();

    if all_rows.is_empty() {
        return Err(AnalysisError::Parse("No data in sheet".to_string()));
    }

    LoadedData::from_rows(&all_rows, parser::detect_header_row(&all_rows))
}

fn load_json(path: &Path) -> Result<LoadedData> {
    let text = std::fs::read_to_string(path)?;
    parse_json(&text)
}

/// Parse a JSON array of flat records. Keys are collected record by record in
/// each object's key order; a record missing a key leaves an empty cell.
pub fn parse_json(text: &str) -> Result<LoadedData> {
    use serde_json::Value;

    let value: Value =
        serde_json::from_str(text).map_err(|e| AnalysisError::Parse(format!("Invalid JSON: {e}")))?;
    let records = value
        .as_array()
        .ok_or_else(|| AnalysisError::Parse("Expected a JSON array of records".to_string()))?;

    let mut header: Vec<String> = Vec::new();
    for record in records {
        let object = record
            .as_object()
            .ok_or_else(|| AnalysisError::Parse("Expected every record to be an object".to_string()))?;
        for key in object.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }

    let mut all_rows: Vec<Vec<String>> = Vec::with_capacity(records.len() + 1);
    all_rows.push(header.clone());
    for record in records {
        let row = header
            .iter()
            .map(|key| match record.get(key) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        all_rows.push(row);
    }

    LoadedData::from_rows(&all_rows, 0)
}

fn load_xml(path: &Path) -> Result<LoadedData> {
    let text = std::fs::read_to_string(path)?;
    parse_xml(&text)
}

/// Parse an XML document whose root children are records and whose
/// grandchildren are fields named by their tag. Field order follows first
/// appearance; a record missing a field leaves an empty cell.
pub fn parse_xml(text: &str) -> Result<LoadedData> {
    let doc = roxmltree::Document::parse(text).map_err(|e| AnalysisError::Parse(format!("Invalid XML: {e}")))?;

    let records: Vec<Vec<(String, String)>> = doc
        .root_element()
        .children()
        .filter(|n| n.is_element())
        .map(|record| {
            record
                .children()
                .filter(|n| n.is_element())
                .map(|field| {
                    let value = field.text().map(str::trim).unwrap_or_default();
                    (field.tag_name().name().to_string(), value.to_string())
                })
                .collect()
        })
        .collect();

    if records.is_empty() {
        return Err(AnalysisError::Parse("No records found in XML".to_string()));
    }

    let mut header: Vec<String> = Vec::new();
    for (name, _) in records.iter().flatten() {
        if !header.contains(name) {
            header.push(name.clone());
        }
    }

    let mut all_rows: Vec<Vec<String>> = Vec::with_capacity(records.len() + 1);
    all_rows.push(header.clone());
    for record in &records {
        let row = header
            .iter()
            .map(|key| {
                record
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| value.clone())
                    .unwrap_or_default()
            })
            .collect();
        all_rows.push(row);
    }

    LoadedData::from_rows(&all_rows, 0)
}
