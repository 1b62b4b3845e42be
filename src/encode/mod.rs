//! Attribute encoding
//!
//! Maps each distinct (column, value) pair to a compact integer code and
//! keeps the reverse table used when explanations are decoded back to the
//! original values. Codes are allocated on first sight, sequentially per
//! column namespace, and the tables are immutable once the dataset has been
//! encoded.

use crate::error::{OutlensError, Result};
use crate::metrics::{DatasetTotals, MetricStats};
use crate::table::Table;
use std::collections::HashMap;

/// Per-column dictionary encoder for categorical attribute values
#[derive(Debug, Clone)]
pub struct AttributeEncoder {
    columns: Vec<String>,
    forward: Vec<HashMap<String, u32>>,
    reverse: Vec<Vec<String>>,
}

impl AttributeEncoder {
    /// Create an encoder for the given attribute columns
    pub fn new(columns: &[String]) -> Self {
        Self {
            columns: columns.to_vec(),
            forward: vec![HashMap::new(); columns.len()],
            reverse: vec![Vec::new(); columns.len()],
        }
    }

    /// Number of configured attribute columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Name of a configured attribute column
    pub fn column_name(&self, column: usize) -> Result<&str> {
        self.columns.get(column).map(|s| s.as_str()).ok_or_else(|| {
            OutlensError::EncodingInconsistency(format!(
                "Column index {} out of range ({} columns configured)",
                column,
                self.columns.len()
            ))
        })
    }

    /// Number of distinct codes allocated for a column
    pub fn cardinality(&self, column: usize) -> usize {
        self.reverse.get(column).map(|v| v.len()).unwrap_or(0)
    }

    /// Encode a value, allocating a new code on first sight. Codes are
    /// sequential non-negative integers within the column namespace.
    pub fn encode(&mut self, column: usize, value: &str) -> Result<u32> {
        if column >= self.columns.len() {
            return Err(OutlensError::EncodingInconsistency(format!(
                "Encode against unconfigured column index {}",
                column
            )));
        }
        if let Some(&code) = self.forward[column].get(value) {
            return Ok(code);
        }
        let code = self.reverse[column].len() as u32;
        self.forward[column].insert(value.to_string(), code);
        self.reverse[column].push(value.to_string());
        Ok(code)
    }

    /// Decode a code back to the original value. A code that was never
    /// allocated for the column is an `UnknownCode` error.
    pub fn decode(&self, column: usize, code: u32) -> Result<&str> {
        let name = self.column_name(column)?;
        self.reverse[column]
            .get(code as usize)
            .map(|s| s.as_str())
            .ok_or_else(|| OutlensError::UnknownCode {
                column: name.to_string(),
                code,
            })
    }
}

/// Encoded dataset in struct-of-arrays layout.
///
/// `codes` is row-major with one `u32` per configured attribute column.
/// `counts` is 1.0 per row in row mode and the group multiplicity in cube
/// mode; `weights` is the classifier's outlier weight per row/group. Cube
/// datasets optionally carry per-row metric means and quantile values.
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    n_columns: usize,
    n_rows: usize,
    codes: Vec<u32>,
    weights: Vec<f64>,
    counts: Vec<f64>,
    means: Option<Vec<f64>>,
    quantiles: Option<Vec<f64>>,
    totals: DatasetTotals,
}

/// Optional cube columns consumed alongside the attribute columns
#[derive(Debug, Clone, Copy, Default)]
pub struct CubeFields<'a> {
    /// Group multiplicity per row; 1.0 everywhere when absent
    pub counts: Option<&'a [f64]>,
    /// Per-group metric mean
    pub means: Option<&'a [f64]>,
    /// Per-group recorded quantile value
    pub quantiles: Option<&'a [f64]>,
}

impl EncodedDataset {
    /// Encode the configured attribute columns of `table` together with the
    /// classifier's outlier weights. Weights outside [0, 1] fail with
    /// `InvalidWeight`; the engine never clamps silently.
    pub fn encode(
        table: &Table,
        columns: &[String],
        weights: &[f64],
        cube: CubeFields<'_>,
    ) -> Result<(AttributeEncoder, EncodedDataset)> {
        let n_rows = table.len();
        if n_rows as u64 >= u32::MAX as u64 {
            return Err(OutlensError::DataError(format!(
                "Row count {} exceeds the supported maximum",
                n_rows
            )));
        }
        // Column indices travel as u16 inside itemsets
        if columns.len() > u16::MAX as usize {
            return Err(OutlensError::DataError(format!(
                "Attribute column count {} exceeds the supported maximum",
                columns.len()
            )));
        }
        if weights.len() != n_rows {
            return Err(OutlensError::DataError(format!(
                "Weight vector has {} entries, expected {}",
                weights.len(),
                n_rows
            )));
        }
        for (row, &w) in weights.iter().enumerate() {
            if !(0.0..=1.0).contains(&w) {
                return Err(OutlensError::InvalidWeight { row, weight: w });
            }
        }

        let counts = match cube.counts {
            Some(counts) => {
                if counts.len() != n_rows {
                    return Err(OutlensError::DataError(format!(
                        "Count column has {} entries, expected {}",
                        counts.len(),
                        n_rows
                    )));
                }
                for (row, &c) in counts.iter().enumerate() {
                    if !c.is_finite() || c < 0.0 {
                        return Err(OutlensError::DataError(format!(
                            "Count {} at row {} must be a non-negative finite number",
                            c, row
                        )));
                    }
                }
                counts.to_vec()
            }
            None => vec![1.0; n_rows],
        };
        let means = Self::check_cube_column("mean", cube.means, n_rows)?;
        let quantiles = Self::check_cube_column("quantile", cube.quantiles, n_rows)?;

        let mut encoder = AttributeEncoder::new(columns);
        let mut codes = vec![0u32; n_rows * columns.len()];
        for (col_idx, name) in columns.iter().enumerate() {
            let values = table.require_attribute(name)?;
            for (row, value) in values.iter().enumerate() {
                codes[row * columns.len() + col_idx] = encoder.encode(col_idx, value)?;
            }
        }

        let total_count: f64 = counts.iter().sum();
        let total_outliers: f64 = weights.iter().zip(counts.iter()).map(|(w, c)| w * c).sum();

        Ok((
            encoder,
            EncodedDataset {
                n_columns: columns.len(),
                n_rows,
                codes,
                weights: weights.to_vec(),
                counts,
                means,
                quantiles,
                totals: DatasetTotals {
                    total_count,
                    total_outliers,
                },
            },
        ))
    }

    fn check_cube_column(
        label: &str,
        column: Option<&[f64]>,
        n_rows: usize,
    ) -> Result<Option<Vec<f64>>> {
        match column {
            None => Ok(None),
            Some(values) => {
                if values.len() != n_rows {
                    return Err(OutlensError::DataError(format!(
                        "Cube {} column has {} entries, expected {}",
                        label,
                        values.len(),
                        n_rows
                    )));
                }
                Ok(Some(values.to_vec()))
            }
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    pub fn totals(&self) -> &DatasetTotals {
        &self.totals
    }

    /// Codes of one row, one per configured attribute column
    pub fn row_codes(&self, row: usize) -> &[u32] {
        let start = row * self.n_columns;
        &self.codes[start..start + self.n_columns]
    }

    pub fn weight(&self, row: usize) -> f64 {
        self.weights[row]
    }

    pub fn count(&self, row: usize) -> f64 {
        self.counts[row]
    }

    pub fn mean(&self, row: usize) -> Option<f64> {
        self.means.as_ref().map(|m| m[row])
    }

    pub fn quantile(&self, row: usize) -> Option<f64> {
        self.quantiles.as_ref().map(|q| q[row])
    }

    pub fn has_means(&self) -> bool {
        self.means.is_some()
    }

    pub fn has_quantiles(&self) -> bool {
        self.quantiles.is_some()
    }

    /// Count-weighted mean and standard deviation of the cube metric column.
    /// None when the dataset carries no means or has zero mass.
    pub fn metric_stats(&self) -> Option<MetricStats> {
        let means = self.means.as_ref()?;
        if self.totals.total_count <= 0.0 {
            return None;
        }
        let total = self.totals.total_count;
        let mean: f64 = means
            .iter()
            .zip(self.counts.iter())
            .map(|(m, c)| m * c)
            .sum::<f64>()
            / total;
        let variance: f64 = means
            .iter()
            .zip(self.counts.iter())
            .map(|(m, c)| c * (m - mean) * (m - mean))
            .sum::<f64>()
            / total;
        // Floor keeps downstream z-scores finite for constant metrics
        let std = variance.sqrt().max(1e-9);
        Some(MetricStats { mean, std })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn sample_table() -> Table {
        Table::new()
            .with_attribute("region", strings(&["A", "B", "A", "C"]))
            .unwrap()
            .with_attribute("device", strings(&["X", "X", "Y", "Y"]))
            .unwrap()
            .with_numeric("latency", Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap()
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let table = sample_table();
        let weights = vec![1.0, 0.0, 1.0, 0.0];
        let (encoder, data) = EncodedDataset::encode(
            &table,
            &columns(&["region", "device"]),
            &weights,
            CubeFields::default(),
        )
        .unwrap();

        for row in 0..table.len() {
            let codes = data.row_codes(row);
            assert_eq!(encoder.decode(0, codes[0]).unwrap(), table.attribute("region").unwrap()[row]);
            assert_eq!(encoder.decode(1, codes[1]).unwrap(), table.attribute("device").unwrap()[row]);
        }
    }

    #[test]
    fn test_codes_sequential_per_column() {
        let table = sample_table();
        let weights = vec![0.0; 4];
        let (encoder, data) = EncodedDataset::encode(
            &table,
            &columns(&["region", "device"]),
            &weights,
            CubeFields::default(),
        )
        .unwrap();

        // First-sight order: A=0, B=1, C=2 / X=0, Y=1
        assert_eq!(data.row_codes(0), &[0, 0]);
        assert_eq!(data.row_codes(1), &[1, 0]);
        assert_eq!(data.row_codes(3), &[2, 1]);
        assert_eq!(encoder.cardinality(0), 3);
        assert_eq!(encoder.cardinality(1), 2);
    }

    #[test]
    fn test_unknown_code_error() {
        let table = sample_table();
        let weights = vec![0.0; 4];
        let (encoder, _) = EncodedDataset::encode(
            &table,
            &columns(&["region"]),
            &weights,
            CubeFields::default(),
        )
        .unwrap();
        assert!(matches!(
            encoder.decode(0, 99),
            Err(OutlensError::UnknownCode { .. })
        ));
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let table = sample_table();
        let weights = vec![0.0, 1.5, 0.0, 0.0];
        let result = EncodedDataset::encode(
            &table,
            &columns(&["region"]),
            &weights,
            CubeFields::default(),
        );
        assert!(matches!(
            result,
            Err(OutlensError::InvalidWeight { row: 1, .. })
        ));
    }

    #[test]
    fn test_totals_with_cube_counts() {
        let table = sample_table();
        let weights = vec![1.0, 0.0, 0.5, 0.0];
        let counts = vec![10.0, 20.0, 4.0, 6.0];
        let (_, data) = EncodedDataset::encode(
            &table,
            &columns(&["region"]),
            &weights,
            CubeFields {
                counts: Some(&counts),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(data.totals().total_count, 40.0);
        assert_eq!(data.totals().total_outliers, 12.0);
    }

    #[test]
    fn test_metric_stats_weighted() {
        let table = sample_table();
        let weights = vec![0.0; 4];
        let counts = vec![1.0, 1.0, 1.0, 1.0];
        let means = vec![2.0, 4.0, 2.0, 4.0];
        let (_, data) = EncodedDataset::encode(
            &table,
            &columns(&["region"]),
            &weights,
            CubeFields {
                counts: Some(&counts),
                means: Some(&means),
                quantiles: None,
            },
        )
        .unwrap();
        let stats = data.metric_stats().unwrap();
        assert!((stats.mean - 3.0).abs() < 1e-12);
        assert!((stats.std - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_column_count_cap() {
        let table = Table::new();
        let columns: Vec<String> = (0..=u16::MAX as u32)
            .map(|i| format!("c{}", i))
            .collect();
        let result = EncodedDataset::encode(&table, &columns, &[], CubeFields::default());
        assert!(matches!(result, Err(OutlensError::DataError(_))));
    }

    #[test]
    fn test_missing_attribute_column_fails_fast() {
        let table = sample_table();
        let weights = vec![0.0; 4];
        let result = EncodedDataset::encode(
            &table,
            &columns(&["region", "firmware"]),
            &weights,
            CubeFields::default(),
        );
        assert!(matches!(result, Err(OutlensError::ConfigError(_))));
    }
}
