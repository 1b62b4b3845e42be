//! Explanation assembly
//!
//! Decodes surviving candidates back to human-readable attribute/value
//! pairs, ranks them under a configurable key with a documented
//! deterministic tie-break, and assembles the final result structure. The
//! explanation is also exportable as a flat row-oriented table for
//! downstream tabular consumers.

use crate::aggregate::Aggregate;
use crate::encode::AttributeEncoder;
use crate::error::{OutlensError, Result};
use crate::metrics::{DatasetTotals, QualityMetrics, RankingKey};
use crate::search::SearchOutcome;
use serde::{Deserialize, Serialize};

/// One decoded attribute equality test
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeMatch {
    pub column: String,
    pub value: String,
}

/// One ranked combination in the final explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationEntry {
    /// Decoded attribute/value pairs, ordered by column index
    pub matches: Vec<AttributeMatch>,
    /// Combination size k
    pub order: usize,
    pub metrics: QualityMetrics,
    pub aggregate: Aggregate,
}

/// Terminal, immutable output of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Total row mass processed
    pub total_count: f64,
    /// Total outlier weight in the dataset
    pub total_outliers: f64,
    /// True when the search stopped at a deadline before completing
    pub partial: bool,
    pub entries: Vec<ExplanationEntry>,
}

/// Row-oriented export of an explanation: one row per combination, one
/// column per attribute and per metric/aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Explanation {
    /// Flatten into a tabular form. Attribute cells are empty when the
    /// combination does not constrain that column.
    pub fn to_flat_table(&self, attribute_columns: &[String]) -> FlatTable {
        let mut columns: Vec<String> = attribute_columns.to_vec();
        columns.extend(
            [
                "order",
                "outlier_weight",
                "count",
                "support",
                "global_ratio",
                "risk_ratio",
                "risk_difference",
                "lift",
                "leverage",
                "significance",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        let has_cube = self
            .entries
            .iter()
            .any(|e| e.metrics.mean_shift_z.is_some() || e.metrics.quantile_deviation.is_some());
        if has_cube {
            columns.push("mean_shift_z".to_string());
            columns.push("quantile_deviation".to_string());
        }

        let rows = self
            .entries
            .iter()
            .map(|entry| {
                let mut row = Vec::with_capacity(columns.len());
                for name in attribute_columns {
                    let cell = entry
                        .matches
                        .iter()
                        .find(|m| m.column == *name)
                        .map(|m| m.value.clone())
                        .unwrap_or_default();
                    row.push(cell);
                }
                row.push(entry.order.to_string());
                row.push(format!("{:.6}", entry.aggregate.outlier_weight));
                row.push(format!("{:.6}", entry.aggregate.count));
                row.push(format!("{:.6}", entry.metrics.support));
                row.push(format!("{:.6}", entry.metrics.global_ratio));
                row.push(entry.metrics.risk_ratio.to_string());
                row.push(format!("{:.6}", entry.metrics.risk_difference));
                row.push(format!("{:.6}", entry.metrics.lift));
                row.push(format!("{:.6}", entry.metrics.leverage));
                row.push(format!("{:.6}", entry.metrics.significance));
                if has_cube {
                    row.push(
                        entry
                            .metrics
                            .mean_shift_z
                            .map(|z| format!("{:.6}", z))
                            .unwrap_or_default(),
                    );
                    row.push(
                        entry
                            .metrics
                            .quantile_deviation
                            .map(|d| format!("{:.6}", d))
                            .unwrap_or_default(),
                    );
                }
                row
            })
            .collect();

        FlatTable { columns, rows }
    }
}

/// Builds the final explanation from a search outcome
pub struct ExplanationBuilder<'a> {
    encoder: &'a AttributeEncoder,
    ranking: RankingKey,
    top_k: Option<usize>,
}

impl<'a> ExplanationBuilder<'a> {
    pub fn new(encoder: &'a AttributeEncoder) -> Self {
        Self {
            encoder,
            ranking: RankingKey::default(),
            top_k: None,
        }
    }

    pub fn with_ranking(mut self, ranking: RankingKey) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
        self.top_k = top_k;
        self
    }

    /// Decode, rank, truncate, and assemble. Ordering is: ranking key
    /// descending, then support descending, then lexicographic decoded
    /// (column, value) pairs — a deterministic tie-break independent of
    /// generation order.
    pub fn build(&self, outcome: &SearchOutcome, totals: &DatasetTotals) -> Result<Explanation> {
        let mut entries = Vec::with_capacity(outcome.candidates.len());
        for candidate in &outcome.candidates {
            let mut matches = Vec::with_capacity(candidate.itemset.order());
            for &(column, code) in candidate.itemset.items() {
                let column = column as usize;
                let value = self.encoder.decode(column, code).map_err(|err| {
                    OutlensError::EncodingInconsistency(format!(
                        "Surviving candidate references an unallocated code: {}",
                        err
                    ))
                })?;
                matches.push(AttributeMatch {
                    column: self.encoder.column_name(column)?.to_string(),
                    value: value.to_string(),
                });
            }
            entries.push(ExplanationEntry {
                order: candidate.itemset.order(),
                matches,
                metrics: candidate.metrics,
                aggregate: candidate.aggregate,
            });
        }

        let ranking = self.ranking;
        entries.sort_by(|a, b| {
            b.metrics
                .ranking_value(ranking)
                .total_cmp(&a.metrics.ranking_value(ranking))
                .then_with(|| b.metrics.support.total_cmp(&a.metrics.support))
                .then_with(|| a.matches.cmp(&b.matches))
        });
        if let Some(top_k) = self.top_k {
            entries.truncate(top_k);
        }

        Ok(Explanation {
            total_count: totals.total_count,
            total_outliers: totals.total_outliers,
            partial: outcome.partial,
            entries,
        })
    }
}
