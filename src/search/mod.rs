//! Lattice search engine
//!
//! Level-wise enumeration of attribute-value combinations with Apriori-style
//! anti-monotonic pruning. Level 1 seeds from every observed (column, code)
//! pair; each further level joins surviving candidates that share all but
//! one item, intersects their row lists, recomputes metrics, and prunes.
//! Survivors of every level are reported — a small sufficient explanation is
//! never subsumed by a larger extension.

use crate::aggregate::{
    aggregate_rows, intersect_rows, scan_singletons, weighted_band_deviation, Aggregate, ItemSet,
    ItemStats,
};
use crate::encode::EncodedDataset;
use crate::metrics::{mean_shift_z, MetricStats, QualityMetrics, RankingKey};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::debug;

/// Candidate enumeration strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// Exhaustive level-wise lattice enumeration with Apriori pruning
    #[default]
    Exhaustive,
    /// Beam search: only the `beam_width` best-scoring supported candidates
    /// of each level are extended, for spaces too wide to enumerate. Support
    /// still gates extension; the ratio threshold gates reporting only, so a
    /// low-ratio frontier member can lead to a high-ratio extension.
    Beam { beam_width: usize },
}

/// Search thresholds and bounds threaded from the engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum fraction of the total outlier weight a candidate must capture
    pub min_support: f64,
    /// Minimum risk ratio; the infinite sentinel always passes
    pub min_risk_ratio: f64,
    /// Maximum combination size (safety bound against runaway cardinality)
    pub max_order: usize,
    /// Candidate enumeration strategy
    pub strategy: SearchStrategy,
    /// Ranking key ordering the beam frontier
    pub ranking: RankingKey,
    /// Optional deadline checked between levels; firing tags the result partial
    pub deadline: Option<Duration>,
    /// Override for the cube metric mean/std; derived from the dataset when None
    pub metric_stats: Option<MetricStats>,
    /// Expected band for the cube quantile-deviation metric
    pub quantile_band: Option<(f64, f64)>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_support: 0.1,
            min_risk_ratio: 1.0,
            max_order: 3,
            strategy: SearchStrategy::default(),
            ranking: RankingKey::default(),
            deadline: None,
            metric_stats: None,
            quantile_band: None,
        }
    }
}

/// A candidate that survived pruning, with its finalized aggregate and metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub itemset: ItemSet,
    pub aggregate: Aggregate,
    pub metrics: QualityMetrics,
}

/// Raw output of one search pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Survivors of every level, in deterministic generation order
    pub candidates: Vec<ScoredCandidate>,
    /// Number of fully processed levels
    pub levels_completed: usize,
    /// True when the deadline fired before the search could finish
    pub partial: bool,
}

/// One survivor kept as seed material for the next level
struct Survivor {
    itemset: ItemSet,
    stats: ItemStats,
}

pub struct LatticeSearch<'a> {
    data: &'a EncodedDataset,
    config: &'a SearchConfig,
}

impl<'a> LatticeSearch<'a> {
    pub fn new(data: &'a EncodedDataset, config: &'a SearchConfig) -> Self {
        Self { data, config }
    }

    /// Run the search to completion (or deadline)
    pub fn run(&self) -> SearchOutcome {
        let totals = *self.data.totals();
        if totals.total_outliers <= 0.0 {
            debug!("No outlier weight in dataset, short-circuiting to empty result");
            return SearchOutcome::default();
        }

        let start = Instant::now();
        let cube_stats = self
            .config
            .metric_stats
            .or_else(|| self.data.metric_stats());

        match self.config.strategy {
            SearchStrategy::Exhaustive => self.run_exhaustive(start, cube_stats),
            SearchStrategy::Beam { beam_width } => {
                self.run_beam(start, cube_stats, beam_width.max(1))
            }
        }
    }

    /// Level-wise exhaustive enumeration with Apriori pruning
    fn run_exhaustive(&self, start: Instant, cube_stats: Option<MetricStats>) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let singletons = scan_singletons(self.data);
        let generated = singletons.len();
        let mut survivors: Vec<Survivor> = singletons
            .into_iter()
            .filter_map(|(itemset, stats)| {
                self.score(&itemset, &stats, cube_stats)
                    .map(|scored| {
                        outcome.candidates.push(scored);
                        Survivor { itemset, stats }
                    })
            })
            .collect();
        outcome.levels_completed = 1;
        debug!(
            level = 1,
            generated,
            survivors = survivors.len(),
            "Completed search level"
        );

        for level in 2..=self.config.max_order {
            if survivors.is_empty() {
                break;
            }
            if let Some(deadline) = self.config.deadline {
                if start.elapsed() >= deadline {
                    debug!(level, "Deadline reached, returning partial explanation");
                    outcome.partial = true;
                    break;
                }
            }

            let pairs = self.generate_pairs(&survivors);
            let generated = pairs.len();
            let scored: Vec<(ItemSet, ItemStats, Option<ScoredCandidate>)> = pairs
                .into_par_iter()
                .map(|(itemset, left, right)| {
                    let rows = intersect_rows(&survivors[left].stats.rows, &survivors[right].stats.rows);
                    let aggregate = aggregate_rows(self.data, &rows);
                    let stats = ItemStats { aggregate, rows };
                    let scored = self.score(&itemset, &stats, cube_stats);
                    (itemset, stats, scored)
                })
                .collect();

            let mut next: Vec<Survivor> = Vec::new();
            for (itemset, stats, scored) in scored {
                if let Some(candidate) = scored {
                    outcome.candidates.push(candidate);
                    next.push(Survivor { itemset, stats });
                }
            }
            debug!(
                level,
                generated,
                survivors = next.len(),
                "Completed search level"
            );
            survivors = next;
            outcome.levels_completed = level;
            if survivors.is_empty() {
                break;
            }
        }

        outcome
    }

    /// Beam search over the same lattice. Each level extends only the
    /// `beam_width` best-scoring supported itemsets with every observed
    /// singleton; everything that passes both thresholds is reported.
    fn run_beam(
        &self,
        start: Instant,
        cube_stats: Option<MetricStats>,
        beam_width: usize,
    ) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let singletons = scan_singletons(self.data);
        let generated = singletons.len();

        let mut frontier: Vec<(f64, ItemSet, ItemStats)> = Vec::new();
        for (itemset, stats) in &singletons {
            if let Some((score, candidate)) = self.evaluate(itemset, stats, cube_stats) {
                if let Some(candidate) = candidate {
                    outcome.candidates.push(candidate);
                }
                frontier.push((score, itemset.clone(), stats.clone()));
            }
        }
        outcome.levels_completed = 1;
        debug!(
            level = 1,
            generated,
            frontier = frontier.len(),
            "Completed search level"
        );
        Self::trim_frontier(&mut frontier, beam_width);

        let mut visited: HashSet<ItemSet> =
            singletons.iter().map(|(itemset, _)| itemset.clone()).collect();

        for level in 2..=self.config.max_order {
            if frontier.is_empty() {
                break;
            }
            if let Some(deadline) = self.config.deadline {
                if start.elapsed() >= deadline {
                    debug!(level, "Deadline reached, returning partial explanation");
                    outcome.partial = true;
                    break;
                }
            }

            let mut generated = 0usize;
            let mut expansions: Vec<(f64, ItemSet, ItemStats)> = Vec::new();
            for (_, base, base_stats) in &frontier {
                for (single, single_stats) in &singletons {
                    let mut items = base.items().to_vec();
                    items.push(single.items()[0]);
                    let merged = match ItemSet::from_items(items) {
                        Some(merged) if merged.order() == level => merged,
                        _ => continue,
                    };
                    if !visited.insert(merged.clone()) {
                        continue;
                    }
                    generated += 1;
                    let rows = intersect_rows(&base_stats.rows, &single_stats.rows);
                    let aggregate = aggregate_rows(self.data, &rows);
                    let stats = ItemStats { aggregate, rows };
                    if let Some((score, candidate)) = self.evaluate(&merged, &stats, cube_stats) {
                        if let Some(candidate) = candidate {
                            outcome.candidates.push(candidate);
                        }
                        expansions.push((score, merged, stats));
                    }
                }
            }
            debug!(
                level,
                generated,
                frontier = expansions.len(),
                "Completed search level"
            );
            Self::trim_frontier(&mut expansions, beam_width);
            frontier = expansions;
            outcome.levels_completed = level;
        }

        outcome
    }

    /// Order the frontier by score descending with the itemset as the
    /// deterministic tie-break, then cap it at the beam width
    fn trim_frontier(frontier: &mut Vec<(f64, ItemSet, ItemStats)>, beam_width: usize) {
        frontier.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        frontier.truncate(beam_width);
    }

    /// Support-gated evaluation for the beam strategy. None drops the
    /// candidate from the frontier entirely; otherwise its frontier score is
    /// returned together with the reportable candidate when the ratio
    /// threshold also passes.
    fn evaluate(
        &self,
        itemset: &ItemSet,
        stats: &ItemStats,
        cube_stats: Option<MetricStats>,
    ) -> Option<(f64, Option<ScoredCandidate>)> {
        let totals = self.data.totals();
        let mut metrics =
            QualityMetrics::compute(stats.aggregate.outlier_weight, stats.aggregate.count, totals);
        if metrics.support < self.config.min_support {
            return None;
        }
        self.attach_cube(&mut metrics, stats, cube_stats);
        let score = metrics.ranking_value(self.config.ranking);
        let candidate = metrics
            .risk_ratio
            .passes(self.config.min_risk_ratio)
            .then(|| ScoredCandidate {
                itemset: itemset.clone(),
                aggregate: stats.aggregate,
                metrics,
            });
        Some((score, candidate))
    }

    /// Score a candidate and apply the pruning rule. None removes the
    /// candidate and suppresses all of its extensions.
    fn score(
        &self,
        itemset: &ItemSet,
        stats: &ItemStats,
        cube_stats: Option<MetricStats>,
    ) -> Option<ScoredCandidate> {
        let totals = self.data.totals();
        let mut metrics =
            QualityMetrics::compute(stats.aggregate.outlier_weight, stats.aggregate.count, totals);
        if metrics.support < self.config.min_support {
            return None;
        }
        if !metrics.risk_ratio.passes(self.config.min_risk_ratio) {
            return None;
        }
        self.attach_cube(&mut metrics, stats, cube_stats);
        Some(ScoredCandidate {
            itemset: itemset.clone(),
            aggregate: stats.aggregate,
            metrics,
        })
    }

    fn attach_cube(
        &self,
        metrics: &mut QualityMetrics,
        stats: &ItemStats,
        cube_stats: Option<MetricStats>,
    ) {
        if let Some(global) = cube_stats {
            metrics.mean_shift_z = Some(mean_shift_z(
                stats.aggregate.metric_mean(),
                stats.aggregate.count,
                &global,
            ));
        }
        if let Some((lo, hi)) = self.config.quantile_band {
            metrics.quantile_deviation = weighted_band_deviation(self.data, &stats.rows, lo, hi);
        }
    }

    /// Join survivor pairs that share their Apriori prefix, keeping only
    /// joins whose every (k-1)-subset also survived. Survivors arrive sorted
    /// by itemset, so prefix groups are contiguous and the generated order
    /// is deterministic.
    fn generate_pairs(&self, survivors: &[Survivor]) -> Vec<(ItemSet, usize, usize)> {
        let frequent: HashSet<&ItemSet> = survivors.iter().map(|s| &s.itemset).collect();
        let mut pairs = Vec::new();
        for i in 0..survivors.len() {
            for j in (i + 1)..survivors.len() {
                if survivors[i].itemset.prefix() != survivors[j].itemset.prefix() {
                    break;
                }
                let merged = match survivors[i].itemset.join(&survivors[j].itemset) {
                    Some(merged) => merged,
                    None => continue,
                };
                if merged.order() > 2
                    && !merged.subsets().all(|subset| frequent.contains(&subset))
                {
                    continue;
                }
                pairs.push((merged, i, j));
            }
        }
        pairs
    }
}
