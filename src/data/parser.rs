use std::collections::HashMap;

/// Only this many leading rows are inspected when looking for the header.
pub const HEADER_SCAN_ROWS: usize = 50;

/// Find the header row among the first rows of a sheet.
///
/// Spreadsheet exports often carry a few lines of preamble (report title,
/// export date) before the real header. The header is the first row at least
/// as wide as the most common row width whose used cells are all non-empty,
/// non-numeric, non-date labels. Falls back to row 0.
pub fn detect_header_row(rows: &[Vec<String>]) -> usize {
    let scanned = &rows[..rows.len().min(HEADER_SCAN_ROWS)];
    if scanned.is_empty() {
        return 0;
    }

    let mut widths: HashMap<usize, usize> = HashMap::new();
    for row in scanned {
        *widths.entry(used_width(row)).or_insert(0) += 1;
    }
    // Ties go to the wider row so a sparse preamble line never wins.
    let modal_width = widths
        .into_iter()
        .max_by_key(|&(width, count)| (count, width))
        .map(|(width, _)| width)
        .unwrap_or(0);

    for (i, row) in scanned.iter().enumerate() {
        let width = used_width(row);
        if width == 0 || width < modal_width {
            continue;
        }
        let cells = &row[..width];
        let all_labels = cells.iter().all(|cell| {
            let trimmed = cell.trim();
            !trimmed.is_empty() && trimmed.parse::<f64>().is_err() && !is_date_like(trimmed)
        });
        if all_labels {
            return i;
        }
    }

    0
}

/// Width of a row ignoring trailing empty cells.
fn used_width(row: &[String]) -> usize {
    row.iter()
        .rposition(|c| !c.trim().is_empty())
        .map(|p| p + 1)
        .unwrap_or(0)
}

pub fn is_date_like(s: &str) -> bool {
    let lower = s.to_lowercase();
    let has_separators = s.contains('/') || s.contains(':') || s.matches('-').count() == 2;
    let has_date_words = lower.ends_with("am") || lower.ends_with("pm");

    if !has_separators && !has_date_words {
        return false;
    }

    use chrono::{NaiveDate, NaiveDateTime};
    const FORMATS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %I:%M:%S %p",
        "%Y-%m-%d",
        "%m/%d/%Y",
    ];
    FORMATS.iter().any(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt).is_ok() || NaiveDate::parse_from_str(s, fmt).is_ok()
    }) || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn header_on_first_row() {
        let data = rows(&[&["month", "views"], &["1", "10"], &["2", "12"]]);
        assert_eq!(detect_header_row(&data), 0);
    }

    #[test]
    fn header_after_preamble() {
        let data = rows(&[
            &["Campaign report", ""],
            &["exported", "2024-01-05"],
            &["date", "views"],
            &["2024-01-01", "10"],
            &["2024-01-02", "12"],
        ]);
        assert_eq!(detect_header_row(&data), 2);
    }

    #[test]
    fn headerless_numeric_table_falls_back_to_zero() {
        let data = rows(&[&["1", "10"], &["2", "12"]]);
        assert_eq!(detect_header_row(&data), 0);
    }

    #[test]
    fn sparse_trailing_column_does_not_hide_header() {
        let data = rows(&[
            &["Weekly export"],
            &["week", "views", "notes"],
            &["1", "10", "launch"],
            &["2", "12", ""],
            &["3", "11", ""],
            &["4", "13", ""],
        ]);
        assert_eq!(detect_header_row(&data), 1);
    }

    #[test]
    fn empty_input() {
        assert_eq!(detect_header_row(&[]), 0);
    }

    #[test]
    fn date_detection() {
        assert!(is_date_like("2024-03-01"));
        assert!(is_date_like("03/01/2024"));
        assert!(is_date_like("2024-03-01T10:00:00Z"));
        assert!(!is_date_like("views"));
        assert!(!is_date_like("a-b"));
    }
}
