//! Engine configuration
//!
//! An explicit configuration value struct threaded through the engine
//! constructor; there is no global state. Validation fails fast with
//! `ConfigError` before any search work begins.

use crate::classify::OutlierClassifier;
use crate::error::{OutlensError, Result};
use crate::metrics::RankingKey;
use crate::search::SearchStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Cube-mode column bindings and the optional statistics they feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeConfig {
    /// Column holding the group multiplicity
    pub count_column: String,
    /// Column holding the per-group metric mean; the classifier metric
    /// column is used when absent
    pub mean_column: Option<String>,
    /// Column holding the per-group recorded quantile value
    pub quantile_column: Option<String>,
    /// Expected (lo, hi) band for the quantile-deviation metric
    pub quantile_band: Option<(f64, f64)>,
    /// Override for the global metric mean used by the mean-shift z-score;
    /// derived from the data when absent
    pub global_mean: Option<f64>,
    /// Override for the global metric std used by the mean-shift z-score
    pub global_std: Option<f64>,
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            count_column: "count".to_string(),
            mean_column: None,
            quantile_column: None,
            quantile_band: None,
            global_mean: None,
            global_std: None,
        }
    }
}

/// Configuration for one summarization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Attribute columns to search over
    pub attributes: Vec<String>,
    /// Numeric column the classifier consumes
    pub metric: String,
    /// Outlier classification policy
    pub classifier: OutlierClassifier,
    /// Minimum outlier support for a candidate to survive, in [0, 1]
    pub min_support: f64,
    /// Minimum risk ratio for a candidate to survive
    pub min_risk_ratio: f64,
    /// Maximum combination size
    pub max_order: usize,
    /// Candidate enumeration strategy; exhaustive unless the attribute space
    /// is too wide
    pub strategy: SearchStrategy,
    /// Ranking key for the final explanation (and the beam frontier)
    pub ranking: RankingKey,
    /// Keep only the best k entries; None keeps all
    pub top_k: Option<usize>,
    /// Optional search deadline checked between levels
    pub deadline: Option<Duration>,
    /// Cube-mode column bindings; None for row mode
    pub cube: Option<CubeConfig>,
}

impl EngineConfig {
    /// Configuration with the default thresholds
    pub fn new(
        attributes: Vec<String>,
        metric: impl Into<String>,
        classifier: OutlierClassifier,
    ) -> Self {
        Self {
            attributes,
            metric: metric.into(),
            classifier,
            min_support: 0.1,
            min_risk_ratio: 1.0,
            max_order: 3,
            strategy: SearchStrategy::default(),
            ranking: RankingKey::default(),
            top_k: Some(20),
            deadline: None,
            cube: None,
        }
    }

    pub fn with_min_support(mut self, min_support: f64) -> Self {
        self.min_support = min_support;
        self
    }

    pub fn with_min_risk_ratio(mut self, min_risk_ratio: f64) -> Self {
        self.min_risk_ratio = min_risk_ratio;
        self
    }

    pub fn with_max_order(mut self, max_order: usize) -> Self {
        self.max_order = max_order;
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_ranking(mut self, ranking: RankingKey) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cube(mut self, cube: CubeConfig) -> Self {
        self.cube = Some(cube);
        self
    }

    /// Validate thresholds and structure. Column existence is checked
    /// against the concrete table when the engine runs.
    pub fn validate(&self) -> Result<()> {
        if self.attributes.is_empty() {
            return Err(OutlensError::ConfigError(
                "At least one attribute column must be configured".to_string(),
            ));
        }
        let unique: HashSet<&String> = self.attributes.iter().collect();
        if unique.len() != self.attributes.len() {
            return Err(OutlensError::ConfigError(
                "Attribute columns must be unique".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_support) {
            return Err(OutlensError::ConfigError(format!(
                "min_support must lie in [0, 1], got {}",
                self.min_support
            )));
        }
        if self.min_risk_ratio < 0.0 || !self.min_risk_ratio.is_finite() {
            return Err(OutlensError::ConfigError(format!(
                "min_risk_ratio must be a non-negative finite number, got {}",
                self.min_risk_ratio
            )));
        }
        if self.max_order == 0 {
            return Err(OutlensError::ConfigError(
                "max_order must be at least 1".to_string(),
            ));
        }
        if let SearchStrategy::Beam { beam_width } = self.strategy {
            if beam_width == 0 {
                return Err(OutlensError::ConfigError(
                    "Beam width must be at least 1".to_string(),
                ));
            }
        }
        self.classifier.validate()?;
        if let Some(cube) = &self.cube {
            if cube.count_column.is_empty() {
                return Err(OutlensError::ConfigError(
                    "Cube count column name cannot be empty".to_string(),
                ));
            }
            if let Some((lo, hi)) = cube.quantile_band {
                if !(lo < hi) {
                    return Err(OutlensError::ConfigError(format!(
                        "Quantile band ({}, {}) must satisfy lo < hi",
                        lo, hi
                    )));
                }
            }
            if let Some(std) = cube.global_std {
                if std <= 0.0 {
                    return Err(OutlensError::ConfigError(format!(
                        "Global std override must be positive, got {}",
                        std
                    )));
                }
            }
        }
        Ok(())
    }
}
