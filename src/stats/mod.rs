//! Sample statistics for ping series: mean, spread and loss

use serde::{Deserialize, Serialize};

/// Round to two decimal places, the precision used in logs and CSV rows
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arithmetic mean; `None` for an empty sample
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Population standard deviation (divide by N, not N-1)
pub fn population_std_dev(samples: &[f64]) -> Option<f64> {
    let avg = mean(samples)?;
    let variance = samples
        .iter()
        .map(|&x| (x - avg).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    Some(variance.sqrt())
}

/// Loss percentage for a ping series, rounded to two decimals
pub fn loss_percent(sent: u32, received: u32) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    let lost = sent.saturating_sub(received);
    round2(lost as f64 / sent as f64 * 100.0)
}

/// Success percentage of `succeeded` out of `attempts`
pub fn success_percent(attempts: u32, succeeded: u32) -> f64 {
    if attempts == 0 {
        return 0.0;
    }
    round2(succeeded.min(attempts) as f64 / attempts as f64 * 100.0)
}

/// Summary of one latency sample set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub std_dev_ms: f64,
}

impl SampleStats {
    /// Compute statistics over the samples; `None` when nothing answered
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let mean_ms = mean(samples)?;
        let std_dev_ms = population_std_dev(samples)?;
        let min_ms = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_ms = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            count: samples.len(),
            mean_ms: round2(mean_ms),
            min_ms,
            max_ms,
            std_dev_ms: round2(std_dev_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_dev_constant_series() {
        assert_eq!(population_std_dev(&[10.0, 10.0, 10.0, 10.0]), Some(0.0));
    }

    #[test]
    fn test_std_dev_is_population() {
        // sample std dev would be ~11.55 here
        assert_eq!(population_std_dev(&[0.0, 20.0, 0.0, 20.0]), Some(10.0));
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(mean(&[]), None);
        assert_eq!(population_std_dev(&[]), None);
        assert!(SampleStats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_loss_percent() {
        assert_eq!(loss_percent(20, 20), 0.0);
        assert_eq!(loss_percent(20, 19), 5.0);
        assert_eq!(loss_percent(20, 0), 100.0);
        assert_eq!(loss_percent(3, 2), 33.33);
        assert_eq!(loss_percent(0, 0), 0.0);
    }

    #[test]
    fn test_success_percent() {
        assert_eq!(success_percent(10, 10), 100.0);
        assert_eq!(success_percent(10, 9), 90.0);
        assert_eq!(success_percent(0, 0), 0.0);
    }

    #[test]
    fn test_sample_stats() {
        let stats = SampleStats::from_samples(&[12.0, 18.0, 15.0]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean_ms, 15.0);
        assert_eq!(stats.min_ms, 12.0);
        assert_eq!(stats.max_ms, 18.0);
        assert_eq!(stats.std_dev_ms, 2.45);
    }
}
