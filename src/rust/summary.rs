use serde::Serialize;

use crate::dataset::Dataset;

/// Number of bins in the distribution histograms.
pub const HISTOGRAM_BINS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Aggregate figures over the whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub count: usize,
    pub mean_air_quality: Option<f64>,
    pub mean_water_pollution: Option<f64>,
    pub air_quality_histogram: Vec<HistogramBin>,
    pub water_pollution_histogram: Vec<HistogramBin>,
}

impl DatasetSummary {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let air: Vec<f64> = dataset.iter().map(|r| r.air_quality).collect();
        let water: Vec<f64> = dataset.iter().map(|r| r.water_pollution).collect();

        Self {
            count: dataset.len(),
            mean_air_quality: rounded_mean(&air),
            mean_water_pollution: rounded_mean(&water),
            air_quality_histogram: histogram(&air, HISTOGRAM_BINS),
            water_pollution_histogram: histogram(&water, HISTOGRAM_BINS),
        }
    }
}

fn rounded_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

/// Equal-width bins over `[min, max]`; the last bin is closed on the right.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bins as f64;

    let mut result: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();

    for &v in values {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        result[idx].count += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;

    #[test]
    fn test_means_are_rounded() {
        let dataset = Dataset::from_records(vec![
            Record::new("a", 10.0, 1.0),
            Record::new("b", 20.0, 2.0),
            Record::new("c", 20.0, 2.0),
        ])
        .unwrap();
        let summary = DatasetSummary::from_dataset(&dataset);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean_air_quality, Some(16.67));
        assert_eq!(summary.mean_water_pollution, Some(1.67));
    }

    #[test]
    fn test_empty_dataset_summary() {
        let summary = DatasetSummary::from_dataset(&Dataset::default());
        assert_eq!(summary.mean_air_quality, None);
        assert!(summary.air_quality_histogram.is_empty());
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values = [0.0, 5.0, 10.0, 99.0, 100.0];
        let bins = histogram(&values, 20);
        assert_eq!(bins.len(), 20);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[1].count, 1);
        assert_eq!(bins[2].count, 1);
        assert_eq!(bins[19].count, 2);
        assert_eq!(bins[19].upper, 100.0);
    }

    #[test]
    fn test_histogram_single_value() {
        let bins = histogram(&[3.0, 3.0], 4);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
        assert_eq!(bins[0].lower, 2.5);
    }
}
