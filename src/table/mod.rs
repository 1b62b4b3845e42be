//! Typed in-memory input table
//!
//! The engine consumes a small columnar table: named categorical attribute
//! columns (low-cardinality string values) plus named numeric columns for
//! classifier metrics and cube statistics. Ingestion (CSV/SQL/HTTP) is an
//! external concern; loaders build a `Table` and hand it to the engine.

use crate::error::{OutlensError, Result};
use ndarray::Array1;

/// Columnar input table. All columns share one length, enforced on insert.
#[derive(Debug, Clone, Default)]
pub struct Table {
    len: Option<usize>,
    attributes: Vec<(String, Vec<String>)>,
    numerics: Vec<(String, Array1<f64>)>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.len.unwrap_or(0)
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a categorical attribute column
    pub fn with_attribute(mut self, name: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let name = name.into();
        self.check_len(&name, values.len())?;
        if self.attributes.iter().any(|(n, _)| *n == name) {
            return Err(OutlensError::DataError(format!(
                "Duplicate attribute column '{}'",
                name
            )));
        }
        self.attributes.push((name, values));
        Ok(self)
    }

    /// Add a numeric column
    pub fn with_numeric(mut self, name: impl Into<String>, values: Array1<f64>) -> Result<Self> {
        let name = name.into();
        self.check_len(&name, values.len())?;
        if self.numerics.iter().any(|(n, _)| *n == name) {
            return Err(OutlensError::DataError(format!(
                "Duplicate numeric column '{}'",
                name
            )));
        }
        self.numerics.push((name, values));
        Ok(self)
    }

    fn check_len(&mut self, name: &str, len: usize) -> Result<()> {
        match self.len {
            None => {
                self.len = Some(len);
                Ok(())
            }
            Some(expected) if expected == len => Ok(()),
            Some(expected) => Err(OutlensError::DataError(format!(
                "Column '{}' has {} rows, expected {}",
                name, len, expected
            ))),
        }
    }

    /// Look up an attribute column by name
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Look up a numeric column by name
    pub fn numeric(&self, name: &str) -> Option<&Array1<f64>> {
        self.numerics.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Attribute column names in insertion order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(n, _)| n.as_str())
    }

    /// Fetch an attribute column, failing fast when it is missing
    pub fn require_attribute(&self, name: &str) -> Result<&[String]> {
        self.attribute(name).ok_or_else(|| {
            OutlensError::ConfigError(format!("Attribute column '{}' not found in table", name))
        })
    }

    /// Fetch a numeric column, failing fast when it is missing
    pub fn require_numeric(&self, name: &str) -> Result<&Array1<f64>> {
        self.numeric(name).ok_or_else(|| {
            OutlensError::ConfigError(format!("Numeric column '{}' not found in table", name))
        })
    }
}
