//! Engine orchestration
//!
//! `SummaryEngine` wires the pipeline together: validate configuration,
//! classify rows into outlier weights, encode attributes, run the lattice
//! search, and assemble the ranked explanation. Row mode treats every row as
//! one event; cube mode consumes pre-aggregated groups with count/mean/
//! quantile columns.

use crate::config::{CubeConfig, EngineConfig};
use crate::encode::{CubeFields, EncodedDataset};
use crate::error::Result;
use crate::explain::{Explanation, ExplanationBuilder};
use crate::metrics::MetricStats;
use crate::search::{LatticeSearch, SearchConfig};
use crate::table::Table;
use tracing::info;

pub struct SummaryEngine {
    config: EngineConfig,
}

impl SummaryEngine {
    /// Create an engine, validating the configuration up front
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Summarize a row-level dataset (one event per row)
    pub fn explain(&self, table: &Table) -> Result<Explanation> {
        self.run(table, false)
    }

    /// Summarize a cube dataset (one pre-aggregated group per row)
    pub fn explain_cube(&self, table: &Table) -> Result<Explanation> {
        self.run(table, true)
    }

    fn run(&self, table: &Table, cube_mode: bool) -> Result<Explanation> {
        // Fail fast on unknown columns before any classification or search
        for attribute in &self.config.attributes {
            table.require_attribute(attribute)?;
        }
        let metric = table.require_numeric(&self.config.metric)?;

        let cube_config: Option<CubeConfig> = if cube_mode {
            Some(self.config.cube.clone().unwrap_or_default())
        } else {
            None
        };

        let counts: Option<Vec<f64>> = match &cube_config {
            Some(cube) => Some(table.require_numeric(&cube.count_column)?.to_vec()),
            None => None,
        };
        let means: Option<Vec<f64>> = match &cube_config {
            Some(cube) => {
                let column = cube.mean_column.as_deref().unwrap_or(&self.config.metric);
                Some(table.require_numeric(column)?.to_vec())
            }
            None => None,
        };
        let quantiles: Option<Vec<f64>> = match &cube_config {
            Some(cube) => match &cube.quantile_column {
                Some(column) => Some(table.require_numeric(column)?.to_vec()),
                None => None,
            },
            None => None,
        };

        let weights = self
            .config
            .classifier
            .weights(metric, counts.as_deref())?;

        let (encoder, data) = EncodedDataset::encode(
            table,
            &self.config.attributes,
            &weights,
            CubeFields {
                counts: counts.as_deref(),
                means: means.as_deref(),
                quantiles: quantiles.as_deref(),
            },
        )?;

        let metric_stats = cube_config.as_ref().and_then(|cube| {
            match (cube.global_mean, cube.global_std) {
                (Some(mean), Some(std)) => Some(MetricStats { mean, std }),
                _ => None,
            }
        });
        let search_config = SearchConfig {
            min_support: self.config.min_support,
            min_risk_ratio: self.config.min_risk_ratio,
            max_order: self.config.max_order,
            strategy: self.config.strategy,
            ranking: self.config.ranking,
            deadline: self.config.deadline,
            metric_stats,
            quantile_band: cube_config.as_ref().and_then(|cube| cube.quantile_band),
        };

        let outcome = LatticeSearch::new(&data, &search_config).run();
        let explanation = ExplanationBuilder::new(&encoder)
            .with_ranking(self.config.ranking)
            .with_top_k(self.config.top_k)
            .build(&outcome, data.totals())?;

        info!(
            rows = table.len(),
            total_count = explanation.total_count,
            total_outliers = explanation.total_outliers,
            entries = explanation.entries.len(),
            partial = explanation.partial,
            "Summarization complete"
        );
        Ok(explanation)
    }
}
