//! Candidate itemsets and aggregation
//!
//! An `ItemSet` is a conjunction of (column, code) equality tests in
//! canonical column order. Level-1 aggregates come from a single parallel
//! scan over all rows; higher levels intersect the sorted row-index lists of
//! the two parent itemsets instead of rescanning the dataset.

use crate::encode::EncodedDataset;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Rows per parallel scan chunk
const SCAN_CHUNK: usize = 4096;

/// An unordered set of (column index, code) pairs stored in canonical order.
///
/// Invariant: items are sorted by (column, code) and no two items share a
/// column — a row cannot match two values of the same attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemSet {
    items: Vec<(u16, u32)>,
}

impl ItemSet {
    /// Single-item set
    pub fn single(column: u16, code: u32) -> Self {
        ItemSet {
            items: vec![(column, code)],
        }
    }

    /// Build from arbitrary pairs; None when two pairs share a column
    pub fn from_items(mut items: Vec<(u16, u32)>) -> Option<Self> {
        items.sort_unstable();
        items.dedup();
        for window in items.windows(2) {
            if window[0].0 == window[1].0 {
                return None;
            }
        }
        if items.is_empty() {
            return None;
        }
        Some(ItemSet { items })
    }

    pub fn items(&self) -> &[(u16, u32)] {
        &self.items
    }

    /// Combination size k
    pub fn order(&self) -> usize {
        self.items.len()
    }

    /// All items except the last (the Apriori join prefix)
    pub fn prefix(&self) -> &[(u16, u32)] {
        &self.items[..self.items.len() - 1]
    }

    /// Apriori join: two k-itemsets sharing their first k-1 items and
    /// differing in the last combine into one (k+1)-itemset. None when the
    /// prefixes differ or the last items collide on a column.
    pub fn join(&self, other: &ItemSet) -> Option<ItemSet> {
        if self.order() != other.order() || self.prefix() != other.prefix() {
            return None;
        }
        let a = *self.items.last()?;
        let b = *other.items.last()?;
        if a.0 == b.0 {
            return None;
        }
        let mut items = self.items.clone();
        items.pop();
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        items.push(lo);
        items.push(hi);
        Some(ItemSet { items })
    }

    /// All (k-1)-subsets, used for the Apriori frequency check
    pub fn subsets(&self) -> impl Iterator<Item = ItemSet> + '_ {
        (0..self.items.len()).map(move |skip| {
            let items = self
                .items
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, &item)| item)
                .collect();
            ItemSet { items }
        })
    }

    /// Whether a row's encoded codes satisfy every item in the set
    pub fn matches(&self, row_codes: &[u32]) -> bool {
        self.items
            .iter()
            .all(|&(col, code)| row_codes[col as usize] == code)
    }
}

/// Aggregate counts for one candidate. Wide f64 accumulators throughout;
/// the metric sum backs the cube-mode mean and stays zero in row mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Sum of weight * count over matching rows
    pub outlier_weight: f64,
    /// Sum of count over matching rows
    pub count: f64,
    /// Sum of count * mean over matching rows
    pub metric_sum: f64,
}

impl Aggregate {
    fn add(&mut self, weight: f64, count: f64, mean: f64) {
        self.outlier_weight += weight * count;
        self.count += count;
        self.metric_sum += count * mean;
    }

    /// Count-weighted metric mean of the matching rows
    pub fn metric_mean(&self) -> f64 {
        if self.count > 0.0 {
            self.metric_sum / self.count
        } else {
            0.0
        }
    }
}

/// Aggregate plus the sorted row indices backing it
#[derive(Debug, Clone, Default)]
pub struct ItemStats {
    pub aggregate: Aggregate,
    pub rows: Vec<u32>,
}

/// Level-1 scan: bucket every row into its (column, code) singletons.
///
/// Disjoint row chunks are scanned in parallel and the per-chunk maps are
/// merged in chunk order, so the row lists come out sorted and the result
/// order is deterministic (sorted by itemset).
pub fn scan_singletons(data: &EncodedDataset) -> Vec<(ItemSet, ItemStats)> {
    let n_rows = data.n_rows();
    if n_rows == 0 {
        return Vec::new();
    }
    let n_chunks = (n_rows + SCAN_CHUNK - 1) / SCAN_CHUNK;

    let chunk_maps: Vec<HashMap<(u16, u32), ItemStats>> = (0..n_chunks)
        .into_par_iter()
        .map(|chunk| {
            let start = chunk * SCAN_CHUNK;
            let end = ((chunk + 1) * SCAN_CHUNK).min(n_rows);
            let mut local: HashMap<(u16, u32), ItemStats> = HashMap::new();
            for row in start..end {
                let weight = data.weight(row);
                let count = data.count(row);
                let mean = data.mean(row).unwrap_or(0.0);
                for (col, &code) in data.row_codes(row).iter().enumerate() {
                    let entry = local.entry((col as u16, code)).or_default();
                    entry.aggregate.add(weight, count, mean);
                    entry.rows.push(row as u32);
                }
            }
            local
        })
        .collect();

    let mut merged: BTreeMap<(u16, u32), ItemStats> = BTreeMap::new();
    for local in chunk_maps {
        let mut entries: Vec<_> = local.into_iter().collect();
        entries.sort_unstable_by_key(|(key, _)| *key);
        for (key, stats) in entries {
            let entry = merged.entry(key).or_default();
            entry.aggregate.outlier_weight += stats.aggregate.outlier_weight;
            entry.aggregate.count += stats.aggregate.count;
            entry.aggregate.metric_sum += stats.aggregate.metric_sum;
            entry.rows.extend(stats.rows);
        }
    }

    merged
        .into_iter()
        .map(|((col, code), stats)| (ItemSet::single(col, code), stats))
        .collect()
}

/// Sorted-merge intersection of two sorted row-index lists
pub fn intersect_rows(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Accumulate the aggregate over an explicit row list
pub fn aggregate_rows(data: &EncodedDataset, rows: &[u32]) -> Aggregate {
    let mut aggregate = Aggregate::default();
    for &row in rows {
        let row = row as usize;
        aggregate.add(data.weight(row), data.count(row), data.mean(row).unwrap_or(0.0));
    }
    aggregate
}

/// Count-weighted mean deviation of the rows' recorded quantile values
/// outside the expected band. None when the dataset has no quantile column.
pub fn weighted_band_deviation(
    data: &EncodedDataset,
    rows: &[u32],
    lo: f64,
    hi: f64,
) -> Option<f64> {
    if !data.has_quantiles() {
        return None;
    }
    let mut total = 0.0;
    let mut weighted = 0.0;
    for &row in rows {
        let row = row as usize;
        let count = data.count(row);
        let quantile = data.quantile(row)?;
        total += count;
        weighted += count * crate::metrics::band_deviation(quantile, lo, hi);
    }
    if total > 0.0 {
        Some(weighted / total)
    } else {
        Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{CubeFields, EncodedDataset};
    use crate::table::Table;
    use ndarray::Array1;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn sample_dataset() -> EncodedDataset {
        let table = Table::new()
            .with_attribute("region", strings(&["A", "A", "B", "B", "A"]))
            .unwrap()
            .with_attribute("device", strings(&["X", "Y", "X", "Y", "X"]))
            .unwrap()
            .with_numeric(
                "latency",
                Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            )
            .unwrap();
        let weights = vec![1.0, 0.0, 0.0, 0.0, 1.0];
        let columns = vec!["region".to_string(), "device".to_string()];
        EncodedDataset::encode(&table, &columns, &weights, CubeFields::default())
            .unwrap()
            .1
    }

    #[test]
    fn test_itemset_canonical_order() {
        let set = ItemSet::from_items(vec![(2, 1), (0, 3)]).unwrap();
        assert_eq!(set.items(), &[(0, 3), (2, 1)]);
        assert!(ItemSet::from_items(vec![(0, 1), (0, 2)]).is_none());
    }

    #[test]
    fn test_join_shares_prefix() {
        let a = ItemSet::from_items(vec![(0, 1), (1, 2)]).unwrap();
        let b = ItemSet::from_items(vec![(0, 1), (2, 0)]).unwrap();
        let joined = a.join(&b).unwrap();
        assert_eq!(joined.items(), &[(0, 1), (1, 2), (2, 0)]);

        // Different prefixes never join
        let c = ItemSet::from_items(vec![(0, 2), (2, 0)]).unwrap();
        assert!(a.join(&c).is_none());
    }

    #[test]
    fn test_join_rejects_column_collision() {
        let a = ItemSet::single(0, 1);
        let b = ItemSet::single(0, 2);
        assert!(a.join(&b).is_none());
        let c = ItemSet::single(1, 0);
        assert!(a.join(&c).is_some());
    }

    #[test]
    fn test_subsets() {
        let set = ItemSet::from_items(vec![(0, 1), (1, 2), (2, 3)]).unwrap();
        let subsets: Vec<ItemSet> = set.subsets().collect();
        assert_eq!(subsets.len(), 3);
        assert!(subsets.contains(&ItemSet::from_items(vec![(0, 1), (1, 2)]).unwrap()));
        assert!(subsets.contains(&ItemSet::from_items(vec![(1, 2), (2, 3)]).unwrap()));
    }

    #[test]
    fn test_scan_singletons_counts() {
        let data = sample_dataset();
        let singletons = scan_singletons(&data);
        // region: A, B; device: X, Y
        assert_eq!(singletons.len(), 4);

        // region=A (code 0): rows 0, 1, 4; outliers at rows 0 and 4
        let (set, stats) = &singletons[0];
        assert_eq!(set.items(), &[(0, 0)]);
        assert_eq!(stats.rows, vec![0, 1, 4]);
        assert_eq!(stats.aggregate.count, 3.0);
        assert_eq!(stats.aggregate.outlier_weight, 2.0);
    }

    #[test]
    fn test_intersection_and_aggregate() {
        let data = sample_dataset();
        let singletons = scan_singletons(&data);
        let region_a = &singletons[0].1.rows; // rows 0, 1, 4
        let device_x = &singletons[2].1.rows; // rows 0, 2, 4
        let rows = intersect_rows(region_a, device_x);
        assert_eq!(rows, vec![0, 4]);

        let aggregate = aggregate_rows(&data, &rows);
        assert_eq!(aggregate.count, 2.0);
        assert_eq!(aggregate.outlier_weight, 2.0);
    }

    #[test]
    fn test_metric_mean_is_count_weighted() {
        let table = Table::new()
            .with_attribute("region", strings(&["A", "A"]))
            .unwrap()
            .with_numeric("latency", Array1::from_vec(vec![2.0, 8.0]))
            .unwrap();
        let counts = vec![3.0, 1.0];
        let means = vec![2.0, 8.0];
        let (_, data) = EncodedDataset::encode(
            &table,
            &["region".to_string()],
            &[0.0, 0.0],
            CubeFields {
                counts: Some(&counts),
                means: Some(&means),
                quantiles: None,
            },
        )
        .unwrap();
        let aggregate = aggregate_rows(&data, &[0, 1]);
        // (3*2 + 1*8) / 4
        assert!((aggregate.metric_mean() - 3.5).abs() < 1e-12);
        assert_eq!(Aggregate::default().metric_mean(), 0.0);
    }

    #[test]
    fn test_monotonicity_of_intersection() {
        let data = sample_dataset();
        let singletons = scan_singletons(&data);
        for (_, a) in &singletons {
            for (_, b) in &singletons {
                let rows = intersect_rows(&a.rows, &b.rows);
                let agg = aggregate_rows(&data, &rows);
                assert!(agg.count <= a.aggregate.count);
                assert!(agg.outlier_weight <= a.aggregate.outlier_weight);
            }
        }
    }
}
