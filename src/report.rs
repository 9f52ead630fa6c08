//! Text, JSON and chart renditions of an `AnalysisResult`, plus the static
//! guide to reading it.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

use crate::error::Result;
use crate::processing::histogram::{histogram, BoxSummary, DEFAULT_BINS};
use crate::processing::pipeline::AnalysisResult;

pub const REPORT_FILE: &str = "analysis_report.md";
pub const RESULT_FILE: &str = "analysis_result.json";
pub const CHART_FILE: &str = "analysis_chart.png";

const CHART_WIDTH: u32 = 960;
const CHART_HEIGHT: u32 = 360;
const CHART_MARGIN: u32 = 24;
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([90, 90, 90, 255]);
const BAR: Rgba<u8> = Rgba([70, 130, 180, 255]);
const NEGATIVE_BAR: Rgba<u8> = Rgba([200, 80, 80, 255]);
const HISTOGRAM: Rgba<u8> = Rgba([100, 180, 120, 255]);
const FORECAST_LINE: Rgba<u8> = Rgba([30, 30, 160, 255]);
const IDEAL_LINE: Rgba<u8> = Rgba([210, 160, 20, 255]);

/// Reference text shown by "How to read the results".
pub const EXPLANATION: &[(&str, &str)] = &[
    (
        "Mean",
        "The average value of the column, e.g. the average number of views or the average open rate.",
    ),
    ("Max", "The peak value recorded, e.g. the highest engagement observed."),
    ("Min", "The lowest value recorded."),
    (
        "Ideal (golden ratio)",
        "The mean multiplied by the golden ratio (1.618). A theoretical target to aim for.",
    ),
    (
        "Tension",
        "The mean multiplied by 0.618. A forecast below this threshold is a warning sign.",
    ),
    (
        "Pareto 80/20",
        "The 80th percentile: 80% of the observations fall below this value. Useful to spot the few entries that drive most of the result.",
    ),
    (
        "Std Dev",
        "How far values spread around the mean. High values mean large variability, low values mean consistent results.",
    ),
    (
        "Coefficient of variation",
        "Standard deviation as a percentage of the mean. Above 20% the series is considered volatile.",
    ),
    (
        "Skewness",
        "Asymmetry of the distribution. Beyond \u{b1}1 the data are strongly lopsided and the projection switches to a log-normal noise model.",
    ),
    (
        "Forecast",
        "The next value predicted by a straight-line trend fitted to the series. R\u{b2} tells how well the line fits; below 0.5 the trend is weak.",
    ),
    (
        "CAGR",
        "Compound growth per period from the first to the last value. Only defined when every value is positive.",
    ),
    (
        "Monte Carlo projection",
        "Random noise added to the trend forecast many times over. The spread of the resulting values shows the range of plausible outcomes and how likely each is, e.g. the chance of reaching an engagement goal given past variability.",
    ),
];

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Render the result as a Markdown document.
pub fn render_report(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    let _ = writeln!(out, "# Data Analysis Results: {}\n", result.column);
    let _ = writeln!(out, "Generated {generated} from {} value(s).\n", result.count);

    let _ = writeln!(out, "## Metrics\n");
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|---|---:|");
    for (label, value) in result.scalar_metrics() {
        let _ = writeln!(out, "| {label} | {value:.3} |");
    }
    let _ = writeln!(out, "| Median | {:.3} |", result.median);
    let _ = writeln!(out, "| Coefficient of variation % | {:.2} |", result.coefficient_of_variation);
    let _ = writeln!(out, "| Skewness | {} |", fmt_opt(result.skewness, 3));

    let _ = writeln!(out, "\n## Trend\n");
    let _ = writeln!(
        out,
        "- value = {:.4} \u{d7} position + {:.4}",
        result.slope, result.intercept
    );
    let _ = writeln!(out, "- r = {:.4}, R\u{b2} = {:.4}", result.r_value, result.r_squared);
    let _ = writeln!(out, "- p-value = {:.4}, slope std. error = {:.4}", result.p_value, result.std_err);
    for (k, f) in result.forecasts.iter().enumerate() {
        let _ = writeln!(out, "- forecast, step {}: {:.3}", k + 1, f);
    }

    let (steps, sims) = result.projections.shape();
    let first = result.projections.first_step();
    let _ = writeln!(out, "\n## Monte Carlo projection\n");
    let _ = writeln!(
        out,
        "{sims} draw(s) per step over {steps} step(s), {} noise.\n",
        result.noise_model.label()
    );
    if let Some(summary) = result.projection_summary() {
        let mean = first.iter().sum::<f64>() / first.len() as f64;
        let _ = writeln!(out, "- next step mean: {mean:.3}");
        let _ = writeln!(
            out,
            "- 5th / 95th percentile: {} / {}",
            fmt_opt(BoxSummary::percentile(first, 0.05), 3),
            fmt_opt(BoxSummary::percentile(first, 0.95), 3)
        );
        let _ = writeln!(out, "- range: {:.3} to {:.3}", summary.min, summary.max);
    }

    let _ = writeln!(out, "\n## Recommendations\n");
    for (i, rec) in result.recommendations.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, rec);
    }

    out
}

/// Paths written by `export_report`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub report: PathBuf,
    pub result: PathBuf,
    pub chart: PathBuf,
}

/// Write the Markdown report, the full JSON record and the chart image into
/// `dir`. The report links the chart by its file name.
pub fn export_report(result: &AnalysisResult, dir: &Path) -> Result<ExportedFiles> {
    std::fs::create_dir_all(dir)?;

    let chart_path = dir.join(CHART_FILE);
    render_chart(result)
        .save(&chart_path)
        .map_err(std::io::Error::other)?;

    let report_path = dir.join(REPORT_FILE);
    let mut text = render_report(result);
    let _ = writeln!(text, "
## Charts

![Metrics and next-step projection]({CHART_FILE})");
    std::fs::write(&report_path, text)?;

    let json_path = dir.join(RESULT_FILE);
    let json = serde_json::to_string_pretty(result).map_err(std::io::Error::from)?;
    std::fs::write(&json_path, json)?;

    tracing::info!("Exported report, result and chart to {:?}", dir);
    Ok(ExportedFiles {
        report: report_path,
        result: json_path,
        chart: chart_path,
    })
}

fn fill_rect(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    for y in y0.min(h)..y1.min(h) {
        for x in x0.min(w)..x1.min(w) {
            img.put_pixel(x, y, color);
        }
    }
}

/// Metric bar chart on the left, next-step projection histogram on the
/// right with the forecast and ideal value marked.
pub fn render_chart(result: &AnalysisResult) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, BACKGROUND);
    let panel = CHART_WIDTH / 2;
    let top = CHART_MARGIN;
    let bottom = CHART_HEIGHT - CHART_MARGIN;
    let plot_height = f64::from(bottom - top);

    // Bars share one axis that always includes zero.
    let metrics = result.scalar_metrics();
    let lo = metrics.iter().map(|(_, v)| *v).fold(0.0, f64::min);
    let hi = metrics.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let span = if hi > lo { hi - lo } else { 1.0 };
    let to_y = |v: f64| top + ((hi - v) / span * plot_height).round() as u32;
    let zero = to_y(0.0);
    let slot = (panel - 2 * CHART_MARGIN) / metrics.len().max(1) as u32;
    for (i, (_, value)) in metrics.iter().enumerate() {
        let x0 = CHART_MARGIN + i as u32 * slot + slot / 6;
        let x1 = CHART_MARGIN + (i as u32 + 1) * slot - slot / 6;
        let y = to_y(*value);
        let color = if *value < 0.0 { NEGATIVE_BAR } else { BAR };
        fill_rect(&mut img, x0, y.min(zero), x1, y.max(zero) + 1, color);
    }
    fill_rect(&mut img, CHART_MARGIN, zero, panel - CHART_MARGIN, zero + 1, AXIS);

    let bins = histogram(result.projections.first_step(), DEFAULT_BINS);
    let peak = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;
    let left = panel + CHART_MARGIN;
    let right = CHART_WIDTH - CHART_MARGIN;
    if let (Some(first), Some(last)) = (bins.first(), bins.last()) {
        let (x_min, x_max) = (first.start, last.end);
        let x_span = x_max - x_min;
        let to_x = |v: f64| left + ((v - x_min) / x_span * f64::from(right - left)).round() as u32;
        for bin in &bins {
            let height = (bin.count as f64 / peak * plot_height).round() as u32;
            let x0 = to_x(bin.start);
            let x1 = to_x(bin.end).max(x0 + 1);
            fill_rect(&mut img, x0, bottom - height, x1, bottom, HISTOGRAM);
        }
        for (value, color) in [(result.forecast, FORECAST_LINE), (result.ideal, IDEAL_LINE)] {
            if value >= x_min && value <= x_max {
                let x = to_x(value);
                fill_rect(&mut img, x.saturating_sub(1), top, x + 2, bottom, color);
            }
        }
    }
    fill_rect(&mut img, left, bottom, right, bottom + 1, AXIS);

    img
}

/// The explainer as one block of text.
pub fn explanation_text() -> String {
    EXPLANATION
        .iter()
        .map(|(title, body)| format!("{title}\n{body}\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::pipeline::{analyze_series, AnalysisConfig};
    use crate::processing::sanitizer::NumericSeries;

    fn result() -> AnalysisResult {
        let series = NumericSeries::new("views", [10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0]).unwrap();
        let config = AnalysisConfig {
            simulations: 200,
            steps: 2,
            seed: Some(3),
        };
        analyze_series(&series, &config).unwrap()
    }

    #[test]
    fn report_has_every_section() {
        let text = render_report(&result());
        assert!(text.starts_with("# Data Analysis Results: views"));
        for heading in ["## Metrics", "## Trend", "## Monte Carlo projection", "## Recommendations"] {
            assert!(text.contains(heading), "missing {heading}");
        }
        assert!(text.contains("| Pareto 80/20 | 14.800 |"));
        assert!(text.contains("forecast, step 2"));
        assert!(text.contains("1. The projected value is below the ideal value."));
    }

    #[test]
    fn export_writes_report_result_and_chart() {
        let dir = tempfile::tempdir().unwrap();
        let files = export_report(&result(), dir.path()).unwrap();
        let text = std::fs::read_to_string(&files.report).unwrap();
        assert!(text.contains("## Recommendations"));
        assert!(text.contains(&format!("]({CHART_FILE})")));

        let parsed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&files.result).unwrap()).unwrap();
        assert_eq!(parsed["column"], "views");
        assert_eq!(parsed["projections"]["values"].as_array().unwrap().len(), 400);
        assert!(parsed["recommendations"][0].as_str().unwrap().starts_with("The projected value"));

        let chart = image::open(&files.chart).unwrap();
        assert_eq!((chart.width(), chart.height()), (CHART_WIDTH, CHART_HEIGHT));
    }

    #[test]
    fn chart_draws_bars_and_histogram() {
        let img = render_chart(&result());
        assert!(img.pixels().any(|p| *p == BAR));
        assert!(img.pixels().any(|p| *p == HISTOGRAM));
        // The forecast sits inside the draws, so its marker is drawn.
        assert!(img.pixels().any(|p| *p == FORECAST_LINE));
    }

    #[test]
    fn explanation_covers_reported_metrics() {
        let text = explanation_text();
        for (label, _) in result().scalar_metrics() {
            let key = label.trim_end_matches(" %");
            assert!(text.contains(key), "no explanation for {label}");
        }
    }
}
