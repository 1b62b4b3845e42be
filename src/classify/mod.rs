//! Outlier classification
//!
//! The engine consumes a per-row outlier weight in [0, 1] and is agnostic to
//! which policy produced it. The policy families are a closed tagged-variant
//! set selected by configuration:
//! - `Percentile`: threshold computed once over the full metric column
//! - `Predicate`: fixed threshold test per row with direction and inclusivity
//! - `MeanShift`: deviation beyond n standard deviations of a provided
//!   mean/std
//! - `Quantile`: count-weighted quantile cutoff for cube datasets

use crate::error::{OutlensError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Closed set of classifier policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutlierClassifier {
    /// Flag rows beyond a percentile of the metric column
    Percentile {
        /// Percentile in (0, 100)
        percentile: f64,
        higher_is_outlier: bool,
    },
    /// Fixed per-row threshold test
    Predicate {
        threshold: f64,
        greater_is_outlier: bool,
        inclusive: bool,
    },
    /// Flag rows whose metric deviates from a provided mean by more than
    /// `n_sigmas` standard deviations
    MeanShift { mean: f64, std: f64, n_sigmas: f64 },
    /// Count-weighted quantile cutoff, for pre-aggregated cube rows
    Quantile {
        /// Quantile in (0, 1)
        quantile: f64,
        higher_is_outlier: bool,
    },
}

impl OutlierClassifier {
    /// Validate policy parameters, failing fast before any search begins
    pub fn validate(&self) -> Result<()> {
        match self {
            OutlierClassifier::Percentile { percentile, .. } => {
                if !(0.0..=100.0).contains(percentile) || *percentile == 0.0 || *percentile == 100.0
                {
                    return Err(OutlensError::ConfigError(format!(
                        "Percentile must lie strictly between 0 and 100, got {}",
                        percentile
                    )));
                }
            }
            OutlierClassifier::Predicate { threshold, .. } => {
                if !threshold.is_finite() {
                    return Err(OutlensError::ConfigError(
                        "Predicate threshold must be finite".to_string(),
                    ));
                }
            }
            OutlierClassifier::MeanShift { std, n_sigmas, .. } => {
                if *std <= 0.0 {
                    return Err(OutlensError::ConfigError(format!(
                        "Mean-shift std must be positive, got {}",
                        std
                    )));
                }
                if *n_sigmas <= 0.0 {
                    return Err(OutlensError::ConfigError(format!(
                        "Mean-shift n_sigmas must be positive, got {}",
                        n_sigmas
                    )));
                }
            }
            OutlierClassifier::Quantile { quantile, .. } => {
                if !(*quantile > 0.0 && *quantile < 1.0) {
                    return Err(OutlensError::ConfigError(format!(
                        "Quantile must lie strictly between 0 and 1, got {}",
                        quantile
                    )));
                }
            }
        }
        Ok(())
    }

    /// Compute per-row outlier weights for the metric column. `counts` is
    /// consulted only by the quantile policy (cube group multiplicities).
    pub fn weights(&self, metric: &Array1<f64>, counts: Option<&[f64]>) -> Result<Vec<f64>> {
        self.validate()?;
        for (row, &value) in metric.iter().enumerate() {
            if !value.is_finite() {
                return Err(OutlensError::DataError(format!(
                    "Metric value at row {} is not finite",
                    row
                )));
            }
        }

        let weights = match self {
            OutlierClassifier::Percentile {
                percentile,
                higher_is_outlier,
            } => {
                let q = if *higher_is_outlier {
                    percentile / 100.0
                } else {
                    1.0 - percentile / 100.0
                };
                let threshold = unweighted_quantile(&metric.to_vec(), q)?;
                metric
                    .iter()
                    .map(|&v| flag(v, threshold, *higher_is_outlier, false))
                    .collect()
            }
            OutlierClassifier::Predicate {
                threshold,
                greater_is_outlier,
                inclusive,
            } => metric
                .iter()
                .map(|&v| flag(v, *threshold, *greater_is_outlier, *inclusive))
                .collect(),
            OutlierClassifier::MeanShift {
                mean,
                std,
                n_sigmas,
            } => metric
                .iter()
                .map(|&v| {
                    if ((v - mean) / std).abs() > *n_sigmas {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect(),
            OutlierClassifier::Quantile {
                quantile,
                higher_is_outlier,
            } => {
                let q = if *higher_is_outlier {
                    *quantile
                } else {
                    1.0 - *quantile
                };
                let values = metric.to_vec();
                let threshold = match counts {
                    Some(counts) => weighted_quantile(&values, counts, q)?,
                    None => unweighted_quantile(&values, q)?,
                };
                metric
                    .iter()
                    .map(|&v| flag(v, threshold, *higher_is_outlier, false))
                    .collect()
            }
        };
        Ok(weights)
    }
}

fn flag(value: f64, threshold: f64, greater_is_outlier: bool, inclusive: bool) -> f64 {
    let hit = match (greater_is_outlier, inclusive) {
        (true, true) => value >= threshold,
        (true, false) => value > threshold,
        (false, true) => value <= threshold,
        (false, false) => value < threshold,
    };
    if hit {
        1.0
    } else {
        0.0
    }
}

/// Linear-interpolation quantile of an unsorted slice
pub fn unweighted_quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(OutlensError::DataError(
            "Cannot compute a quantile of an empty metric column".to_string(),
        ));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return Ok(sorted[lower]);
    }
    let frac = pos - lower as f64;
    Ok(sorted[lower] * (1.0 - frac) + sorted[upper] * frac)
}

/// Count-weighted quantile: the smallest value whose cumulative weight
/// reaches `q` of the total weight
pub fn weighted_quantile(values: &[f64], weights: &[f64], q: f64) -> Result<f64> {
    if values.len() != weights.len() {
        return Err(OutlensError::DataError(format!(
            "Quantile weights have {} entries, expected {}",
            weights.len(),
            values.len()
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(OutlensError::DataError(
            "Quantile weights must sum to a positive value".to_string(),
        ));
    }
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let cutoff = q.clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    for &idx in &order {
        cumulative += weights[idx];
        if cumulative >= cutoff {
            return Ok(values[idx]);
        }
    }
    // Unreachable when total > 0, but avoid indexing on faith
    order
        .last()
        .map(|&idx| values[idx])
        .ok_or_else(|| OutlensError::DataError("Quantile weights are empty".to_string()))
}
