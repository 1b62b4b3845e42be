//! Quality metric model
//!
//! Pure, stateless functions computing statistical quality metrics for a
//! candidate's aggregate counts against dataset-level totals: support, risk
//! ratio (with a typed sentinel for infinite enrichment), risk difference, a
//! difference-of-proportions significance z-score, and the cube-mode
//! mean-shift z-score and quantile-band deviation. All metrics are
//! deterministic given identical inputs.

use serde::{Deserialize, Serialize};

/// Dataset-level totals shared by all metric computations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetTotals {
    /// Total row mass (sum of per-row counts; plain row count in row mode)
    pub total_count: f64,
    /// Total outlier weight across the dataset
    pub total_outliers: f64,
}

impl DatasetTotals {
    /// Inlier mass of the dataset
    pub fn total_inliers(&self) -> f64 {
        self.total_count - self.total_outliers
    }
}

/// Count-weighted mean and standard deviation of the cube metric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub std: f64,
}

/// Risk ratio with a defined sentinel for infinite enrichment.
///
/// A candidate capturing every outlier has a zero background outlier rate;
/// the ratio diverges and is represented as `Infinite` rather than a raw
/// float, so threshold checks and ordering stay explicit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RiskRatio {
    Finite(f64),
    Infinite,
}

impl RiskRatio {
    /// Whether this ratio satisfies a minimum threshold. Infinite enrichment
    /// passes any threshold.
    pub fn passes(&self, min_ratio: f64) -> bool {
        match self {
            RiskRatio::Infinite => true,
            RiskRatio::Finite(v) => *v >= min_ratio,
        }
    }

    /// Numeric value, mapping the sentinel to +infinity for ordering
    pub fn value(&self) -> f64 {
        match self {
            RiskRatio::Infinite => f64::INFINITY,
            RiskRatio::Finite(v) => *v,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, RiskRatio::Infinite)
    }
}

impl std::fmt::Display for RiskRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskRatio::Infinite => write!(f, "inf"),
            RiskRatio::Finite(v) => write!(f, "{:.4}", v),
        }
    }
}

/// Ranking key used to order explanation entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RankingKey {
    /// Risk ratio descending (default)
    #[default]
    RiskRatio,
    /// Outlier support descending
    Support,
    /// Risk difference descending
    RiskDifference,
}

/// Computed quality metrics for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Fraction of the total outlier weight captured by the candidate
    pub support: f64,
    /// Fraction of the total row mass matching the candidate
    pub global_ratio: f64,
    /// Outlier rate among matching rows relative to the rate among the rest
    pub risk_ratio: RiskRatio,
    /// Outlier rate among matching rows minus the rate among the rest
    pub risk_difference: f64,
    /// Outlier rate among matching rows over the unconditional outlier rate
    pub lift: f64,
    /// Joint outlier-and-match probability minus its independence expectation
    pub leverage: f64,
    /// Two-proportion z-score between the matching and non-matching rates
    pub significance: f64,
    /// Cube mode: mean-shift z-score of the candidate's metric mean
    pub mean_shift_z: Option<f64>,
    /// Cube mode: count-weighted deviation outside the expected quantile band
    pub quantile_deviation: Option<f64>,
}

impl QualityMetrics {
    /// Compute the row-mode metrics from a candidate's outlier weight and
    /// count plus the dataset totals. Cube fields start unset.
    pub fn compute(outlier_weight: f64, count: f64, totals: &DatasetTotals) -> Self {
        let support = safe_ratio(outlier_weight, totals.total_outliers);
        let global_ratio = safe_ratio(count, totals.total_count);
        QualityMetrics {
            support,
            global_ratio,
            risk_ratio: risk_ratio(outlier_weight, count, totals),
            risk_difference: risk_difference(outlier_weight, count, totals),
            lift: lift(outlier_weight, count, totals),
            leverage: leverage(outlier_weight, count, totals),
            significance: significance(outlier_weight, count, totals),
            mean_shift_z: None,
            quantile_deviation: None,
        }
    }

    /// Value used for ordering under the given ranking key
    pub fn ranking_value(&self, key: RankingKey) -> f64 {
        match key {
            RankingKey::RiskRatio => self.risk_ratio.value(),
            RankingKey::Support => self.support,
            RankingKey::RiskDifference => self.risk_difference,
        }
    }
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Risk ratio of a candidate: outlier rate among matching rows over the rate
/// among non-matching rows.
///
/// `outlier_weight` and `count` are the candidate's own aggregates; the
/// background rate is computed from the complement of the candidate's counts.
/// An empty matching or non-matching population yields 0.0; a zero background
/// outlier rate with a nonzero exposed rate yields `RiskRatio::Infinite`.
pub fn risk_ratio(outlier_weight: f64, count: f64, totals: &DatasetTotals) -> RiskRatio {
    let rest_count = totals.total_count - count;
    if count <= 0.0 || rest_count <= 0.0 {
        return RiskRatio::Finite(0.0);
    }
    let rest_outliers = totals.total_outliers - outlier_weight;
    if rest_outliers <= 0.0 {
        return if outlier_weight > 0.0 {
            RiskRatio::Infinite
        } else {
            RiskRatio::Finite(0.0)
        };
    }
    RiskRatio::Finite((outlier_weight / count) / (rest_outliers / rest_count))
}

/// Risk difference: exposed outlier rate minus background outlier rate.
/// 0.0 when either population is empty.
pub fn risk_difference(outlier_weight: f64, count: f64, totals: &DatasetTotals) -> f64 {
    let rest_count = totals.total_count - count;
    if count <= 0.0 || rest_count <= 0.0 {
        return 0.0;
    }
    let rest_outliers = totals.total_outliers - outlier_weight;
    outlier_weight / count - rest_outliers / rest_count
}

/// Lift of the rule "matches candidate -> outlier": the outlier rate among
/// matching rows over the unconditional outlier rate. Greater than 1.0 means
/// positive association; 0.0 when any involved population is empty.
pub fn lift(outlier_weight: f64, count: f64, totals: &DatasetTotals) -> f64 {
    if totals.total_count <= 0.0 || count <= 0.0 || totals.total_outliers <= 0.0 {
        return 0.0;
    }
    (outlier_weight / count) / (totals.total_outliers / totals.total_count)
}

/// Leverage of the rule "matches candidate -> outlier": the joint probability
/// of matching and being an outlier minus its expectation under independence.
/// 0.0 for an empty dataset.
pub fn leverage(outlier_weight: f64, count: f64, totals: &DatasetTotals) -> f64 {
    let t = totals.total_count;
    if t <= 0.0 {
        return 0.0;
    }
    outlier_weight / t - (count / t) * (totals.total_outliers / t)
}

/// Pooled two-proportion z-score between the candidate's outlier rate and the
/// background rate. 0.0 in degenerate cases.
pub fn significance(outlier_weight: f64, count: f64, totals: &DatasetTotals) -> f64 {
    let rest_count = totals.total_count - count;
    if count <= 0.0 || rest_count <= 0.0 || totals.total_count <= 0.0 {
        return 0.0;
    }
    let pooled = totals.total_outliers / totals.total_count;
    let variance = pooled * (1.0 - pooled);
    let denom = 1.0 / count + 1.0 / rest_count;
    if variance <= 0.0 {
        return 0.0;
    }
    risk_difference(outlier_weight, count, totals) / (variance * denom).sqrt()
}

/// Cube mean-shift z-score: how far the candidate's metric mean sits from
/// the global mean, scaled by the standard error for its count.
pub fn mean_shift_z(candidate_mean: f64, candidate_count: f64, global: &MetricStats) -> f64 {
    if candidate_count <= 0.0 || global.std <= 0.0 {
        return 0.0;
    }
    (candidate_mean - global.mean) / (global.std / candidate_count.sqrt())
}

/// Deviation of one recorded quantile value outside the expected band,
/// normalized by the band width. 0.0 inside the band.
pub fn band_deviation(value: f64, lo: f64, hi: f64) -> f64 {
    let width = hi - lo;
    if width <= 0.0 {
        return 0.0;
    }
    if value > hi {
        (value - hi) / width
    } else if value < lo {
        (lo - value) / width
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(total_count: f64, total_outliers: f64) -> DatasetTotals {
        DatasetTotals {
            total_count,
            total_outliers,
        }
    }

    #[test]
    fn test_risk_ratio_basic() {
        // 90 of 100 outliers in a group of 100; 10 outliers among the other 900
        let t = totals(1000.0, 100.0);
        let rr = risk_ratio(90.0, 100.0, &t);
        match rr {
            RiskRatio::Finite(v) => assert!((v - 81.0).abs() < 1e-9),
            RiskRatio::Infinite => panic!("expected finite ratio"),
        }
    }

    #[test]
    fn test_risk_ratio_infinite_sentinel() {
        // Candidate captures every outlier: zero background outlier rate
        let t = totals(1000.0, 100.0);
        let rr = risk_ratio(100.0, 200.0, &t);
        assert!(rr.is_infinite());
        assert!(rr.passes(1e9));
        assert_eq!(rr.to_string(), "inf");
    }

    #[test]
    fn test_risk_ratio_degenerate_populations() {
        let t = totals(1000.0, 100.0);
        assert_eq!(risk_ratio(0.0, 0.0, &t), RiskRatio::Finite(0.0));
        // Candidate matches the whole dataset: no background to compare with
        assert_eq!(risk_ratio(100.0, 1000.0, &t), RiskRatio::Finite(0.0));
    }

    #[test]
    fn test_risk_difference() {
        let t = totals(1000.0, 100.0);
        let rd = risk_difference(90.0, 100.0, &t);
        assert!((rd - (0.9 - 10.0 / 900.0)).abs() < 1e-12);
        assert_eq!(risk_difference(0.0, 0.0, &t), 0.0);
    }

    #[test]
    fn test_lift_against_unconditional_rate() {
        // Outlier rate 0.9 in the group vs 0.1 overall
        let t = totals(1000.0, 100.0);
        assert!((lift(90.0, 100.0, &t) - 9.0).abs() < 1e-12);
        assert_eq!(lift(0.0, 0.0, &t), 0.0);
        assert_eq!(lift(0.0, 100.0, &totals(1000.0, 0.0)), 0.0);
    }

    #[test]
    fn test_leverage_independence_departure() {
        let t = totals(1000.0, 100.0);
        // P(match, outlier) = 0.09, independence expects 0.1 * 0.1 = 0.01
        assert!((leverage(90.0, 100.0, &t) - 0.08).abs() < 1e-12);
        // An unenriched group has zero leverage
        assert!(leverage(10.0, 100.0, &t).abs() < 1e-12);
        assert_eq!(leverage(0.0, 0.0, &totals(0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_significance_degenerate() {
        let t = totals(1000.0, 0.0);
        assert_eq!(significance(0.0, 100.0, &t), 0.0);
        assert_eq!(significance(0.0, 0.0, &t), 0.0);
    }

    #[test]
    fn test_significance_positive_for_enriched_group() {
        let t = totals(1000.0, 100.0);
        assert!(significance(90.0, 100.0, &t) > 0.0);
    }

    #[test]
    fn test_mean_shift_z_formula() {
        // Cube with count=500, mean=10 against global mean=5, std=1
        let global = MetricStats { mean: 5.0, std: 1.0 };
        let z = mean_shift_z(10.0, 500.0, &global);
        assert!((z - 5.0 * 500.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_mean_shift_z_degenerate() {
        let global = MetricStats { mean: 5.0, std: 0.0 };
        assert_eq!(mean_shift_z(10.0, 500.0, &global), 0.0);
        let global = MetricStats { mean: 5.0, std: 1.0 };
        assert_eq!(mean_shift_z(10.0, 0.0, &global), 0.0);
    }

    #[test]
    fn test_band_deviation() {
        assert_eq!(band_deviation(5.0, 0.0, 10.0), 0.0);
        assert!((band_deviation(12.0, 0.0, 10.0) - 0.2).abs() < 1e-12);
        assert!((band_deviation(-5.0, 0.0, 10.0) - 0.5).abs() < 1e-12);
        assert_eq!(band_deviation(5.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn test_ranking_value_keys() {
        let t = totals(1000.0, 100.0);
        let m = QualityMetrics::compute(90.0, 100.0, &t);
        assert_eq!(m.ranking_value(RankingKey::Support), m.support);
        assert_eq!(m.ranking_value(RankingKey::RiskRatio), m.risk_ratio.value());
        assert_eq!(
            m.ranking_value(RankingKey::RiskDifference),
            m.risk_difference
        );
    }
}
