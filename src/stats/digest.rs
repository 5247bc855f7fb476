//! Per-metric summary statistics.

use serde::Serialize;
use tdigests::TDigest;

use crate::probe::round_to;

/// Statistics over one kind of sample. Without samples every value is `None`,
/// never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricStats {
    pub samples: usize,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// 95th percentile estimate
    pub p95: Option<f64>,
}

impl MetricStats {
    pub fn from_samples(values: &[f64]) -> Self {
        let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return Self::default();
        }

        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum = 0.0;
        for &v in &values {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
            sum += v;
        }

        let min = round_to(min, 2);
        let max = round_to(max, 2);
        let avg = round_to(sum / values.len() as f64, 2).clamp(min, max);
        let p95 = round_to(estimate_quantile(&values, 0.95), 2).clamp(min, max);

        Self {
            samples: values.len(),
            avg: Some(avg),
            min: Some(min),
            max: Some(max),
            p95: Some(p95),
        }
    }
}

fn estimate_quantile(values: &[f64], q: f64) -> f64 {
    let mut td = TDigest::from_values(values.to_vec());
    td.compress(100);
    td.estimate_quantile(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_samples_is_no_data() {
        let stats = MetricStats::from_samples(&[]);
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.avg, None);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, None);
        assert_eq!(stats.p95, None);
    }

    #[test]
    fn test_basic_stats() {
        let stats = MetricStats::from_samples(&[20.0, 80.0]);
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.avg, Some(50.0));
        assert_eq!(stats.min, Some(20.0));
        assert_eq!(stats.max, Some(80.0));
    }

    #[test]
    fn test_average_and_percentile_within_bounds() {
        let values = [3.5, 7.25, 1.0, 19.75, 4.0, 4.0, 12.5];
        let stats = MetricStats::from_samples(&values);
        let (min, max) = (stats.min.unwrap(), stats.max.unwrap());
        assert_eq!(min, 1.0);
        assert_eq!(max, 19.75);
        assert!(stats.avg.unwrap() >= min && stats.avg.unwrap() <= max);
        assert!(stats.p95.unwrap() >= min && stats.p95.unwrap() <= max);
    }

    #[test]
    fn test_single_sample() {
        let stats = MetricStats::from_samples(&[12.345]);
        assert_eq!(stats.samples, 1);
        assert_eq!(stats.avg, stats.min);
        assert_eq!(stats.min, stats.max);
        assert_eq!(stats.p95, stats.max);
    }
}
