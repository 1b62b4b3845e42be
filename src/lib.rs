//! Outlens - Outlier population explanation engine
//!
//! Given a table of rows labeled (or weighted) as outliers, outlens searches
//! the lattice of categorical attribute-value combinations for the groups
//! most enriched in outliers, and returns them ranked by statistical quality
//! metrics. Both row-level datasets and pre-aggregated cube datasets are
//! supported.
//!
//! # Modules
//!
//! ## Pipeline
//! - [`table`] - Typed in-memory columnar input
//! - [`classify`] - Outlier classification policies producing per-row weights
//! - [`encode`] - Dictionary encoding of attribute values to compact codes
//! - [`search`] - Level-wise lattice search with Apriori pruning
//! - [`explain`] - Decoding, ranking, and explanation assembly
//! - [`engine`] - End-to-end orchestration
//!
//! ## Support
//! - [`aggregate`] - Itemsets, row scans, and aggregate accumulators
//! - [`metrics`] - Support, risk ratio, significance, cube statistics
//! - [`config`] - Engine configuration and validation
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use outlens::prelude::*;
//! use ndarray::Array1;
//!
//! # fn main() -> outlens::Result<()> {
//! let table = Table::new()
//!     .with_attribute("region", vec!["A".to_string(), "B".to_string()])?
//!     .with_numeric("latency", Array1::from_vec(vec![120.0, 8.0]))?;
//!
//! let config = EngineConfig::new(
//!     vec!["region".to_string()],
//!     "latency",
//!     OutlierClassifier::Predicate {
//!         threshold: 100.0,
//!         greater_is_outlier: true,
//!         inclusive: false,
//!     },
//! );
//! let explanation = SummaryEngine::new(config)?.explain(&table)?;
//! for entry in &explanation.entries {
//!     println!("{:?} rr={}", entry.matches, entry.metrics.risk_ratio);
//! }
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Configuration
pub mod config;

// Pipeline stages
pub mod table;
pub mod classify;
pub mod encode;
pub mod aggregate;
pub mod metrics;
pub mod search;
pub mod explain;
pub mod engine;

pub use error::{OutlensError, Result};

/// Common imports for working with the engine
pub mod prelude {
    pub use crate::classify::OutlierClassifier;
    pub use crate::config::{CubeConfig, EngineConfig};
    pub use crate::engine::SummaryEngine;
    pub use crate::error::{OutlensError, Result};
    pub use crate::explain::{AttributeMatch, Explanation, ExplanationEntry, FlatTable};
    pub use crate::metrics::{QualityMetrics, RankingKey, RiskRatio};
    pub use crate::search::SearchStrategy;
    pub use crate::table::Table;
}
