use serde::Serialize;

use crate::processing::statistics::quantile_sorted;

/// Bin count used for projection histograms.
pub const DEFAULT_BINS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

impl Bin {
    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

/// Equal-width histogram over [min, max] of the finite values. The last bin
/// is closed on the right so the maximum is counted.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        return vec![Bin {
            start: min - 0.5,
            end: max + 0.5,
            count: finite.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &finite {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            start: min + width * i as f64,
            end: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count,
        })
        .collect()
}

/// Five-number summary for a box plot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxSummary {
    pub fn compute(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            min: sorted[0],
            q1: quantile_sorted(&sorted, 0.25),
            median: quantile_sorted(&sorted, 0.5),
            q3: quantile_sorted(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }

    /// Value below which `p` (in [0, 1]) of the draws fall.
    pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        Some(quantile_sorted(&sorted, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_value_once() {
        let values: Vec<f64> = (0..100).map(|i| i as f64 * 0.37).collect();
        let bins = histogram(&values, DEFAULT_BINS);
        assert_eq!(bins.len(), DEFAULT_BINS);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 100);
        assert_eq!(bins[0].start, 0.0);
        assert_eq!(bins[DEFAULT_BINS - 1].end, 99.0 * 0.37);
    }

    #[test]
    fn maximum_lands_in_last_bin() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 4);
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 1, 2]);
        assert!((bins[1].center() - 1.5).abs() < 1e-12);
        assert!((bins[1].width() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_input_gets_one_bin() {
        let bins = histogram(&[2.0, 2.0, 2.0], 10);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 3);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(histogram(&[], 10).is_empty());
        assert!(histogram(&[1.0, 2.0], 0).is_empty());
        assert!(histogram(&[f64::NAN], 3).is_empty());
    }

    #[test]
    fn box_summary() {
        let s = BoxSummary::compute(&[5.0, 1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_eq!((s.min, s.q1, s.median, s.q3, s.max), (1.0, 2.0, 3.0, 4.0, 5.0));
        assert_eq!(BoxSummary::compute(&[]), None);
        assert_eq!(BoxSummary::percentile(&[1.0, 2.0, 3.0], 0.5), Some(2.0));
    }
}
