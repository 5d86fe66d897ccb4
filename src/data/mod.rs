//! Tabular dataset handling
//!
//! Provides the [`Table`] type: a column-major view of a labeled numeric
//! dataset with explicit missing cells. Covers CSV ingestion, deterministic
//! train/test splitting, per-partition mean imputation, and densification
//! into an `ndarray` matrix for the estimator.
//!
//! # Example
//!
//! ```
//! use potable::data::Table;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let table = Table::from_columns(
//!     vec!["ph".to_string(), "hardness".to_string()],
//!     vec![
//!         vec![Some(7.0), None, Some(6.5), Some(8.1)],
//!         vec![Some(120.0), Some(95.0), None, Some(140.0)],
//!     ],
//!     vec![1, 0, 1, 0],
//! )?;
//!
//! let (mut train, mut test) = table.split(0.5, 42)?;
//! train.fill_missing_with_mean()?;
//! test.fill_missing_with_mean()?;
//!
//! let (x, y) = train.to_matrix()?;
//! assert_eq!(x.nrows(), y.len());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Default name of the binary label column
pub const DEFAULT_LABEL: &str = "Potability";

/// Errors from dataset loading and preparation
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("dataset not found: {0}")]
    InputNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("label must be 0 or 1, got '{0}' at row {1}")]
    InvalidLabel(String, usize),

    #[error("dataset has no rows")]
    EmptyTable,

    #[error("column '{0}' has no observed values to impute from")]
    EmptyColumn(String),

    #[error("test fraction must be in (0, 1), got {0}")]
    RatioOutOfRange(f64),

    #[error("column '{0}' still contains missing values")]
    UnfilledCell(String),

    #[error("column lengths are inconsistent")]
    RaggedColumns,
}

/// Result alias for data operations
pub type Result<T> = std::result::Result<T, DataError>;

/// A labeled tabular dataset partition
///
/// Feature columns are stored column-major with `None` marking missing
/// cells. The label column is validated to binary 0/1 at construction.
#[derive(Debug, Clone)]
pub struct Table {
    feature_names: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
    labels: Vec<usize>,
}

impl Table {
    /// Build a table from pre-parsed columns
    ///
    /// Every feature column must have the same length as `labels`, and
    /// labels must be 0 or 1.
    pub fn from_columns(
        feature_names: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
        labels: Vec<usize>,
    ) -> Result<Self> {
        if feature_names.len() != columns.len() {
            return Err(DataError::SchemaMismatch(format!(
                "{} column names for {} columns",
                feature_names.len(),
                columns.len()
            )));
        }
        if labels.is_empty() {
            return Err(DataError::EmptyTable);
        }
        if columns.iter().any(|c| c.len() != labels.len()) {
            return Err(DataError::RaggedColumns);
        }
        for (row, &label) in labels.iter().enumerate() {
            if label > 1 {
                return Err(DataError::InvalidLabel(label.to_string(), row));
            }
        }
        Ok(Self {
            feature_names,
            columns,
            labels,
        })
    }

    /// Load a table from a headered CSV file
    ///
    /// All columns except `label_name` must hold numeric values; empty
    /// cells become missing. The label column must hold 0/1 values on
    /// every row.
    pub fn from_csv(path: impl AsRef<Path>, label_name: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::InputNotFound(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let label_idx = headers
            .iter()
            .position(|h| h == label_name)
            .ok_or_else(|| {
                DataError::SchemaMismatch(format!("label column '{label_name}' not found"))
            })?;

        let feature_names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != label_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); feature_names.len()];
        let mut labels = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(DataError::SchemaMismatch(format!(
                    "row {} has {} fields, header has {}",
                    row,
                    record.len(),
                    headers.len()
                )));
            }

            let mut col = 0;
            for (i, field) in record.iter().enumerate() {
                if i == label_idx {
                    labels.push(parse_label(field, row)?);
                    continue;
                }
                columns[col].push(parse_cell(field, &feature_names[col], row)?);
                col += 1;
            }
        }

        if labels.is_empty() {
            return Err(DataError::EmptyTable);
        }

        Ok(Self {
            feature_names,
            columns,
            labels,
        })
    }

    /// Number of rows
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    /// Number of feature columns
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Ordered feature column names
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Label vector
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Cell accessor (feature column, row)
    #[must_use]
    pub fn cell(&self, column: usize, row: usize) -> Option<f64> {
        self.columns[column][row]
    }

    /// Split into disjoint train/test partitions
    ///
    /// Rows are shuffled with a seeded RNG, then cut: the first
    /// `round(n * test_fraction)` shuffled rows form the test partition.
    /// The same seed and input always produce identical row sets.
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<(Table, Table)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(DataError::RatioOutOfRange(test_fraction));
        }

        let n = self.n_rows();
        if n < 2 {
            return Err(DataError::EmptyTable);
        }
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = ((n as f64) * test_fraction).round() as usize;
        let n_test = n_test.clamp(1, n - 1);

        let test = self.select_rows(&indices[..n_test]);
        let train = self.select_rows(&indices[n_test..]);
        Ok((train, test))
    }

    fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|col| rows.iter().map(|&r| col[r]).collect())
            .collect();
        let labels = rows.iter().map(|&r| self.labels[r]).collect();
        Table {
            feature_names: self.feature_names.clone(),
            columns,
            labels,
        }
    }

    /// Replace missing cells with the column mean of this partition
    ///
    /// Each column is handled independently: the mean is computed over the
    /// column's non-missing cells *in this partition* and substituted for
    /// its missing cells. Non-missing cells are untouched, as are columns
    /// without missing cells. A column with no observed values at all is an
    /// [`DataError::EmptyColumn`] error.
    pub fn fill_missing_with_mean(&mut self) -> Result<()> {
        for (name, column) in self.feature_names.iter().zip(self.columns.iter_mut()) {
            if column.iter().all(|c| c.is_some()) {
                continue;
            }

            let observed: Vec<f64> = column.iter().filter_map(|c| *c).collect();
            if observed.is_empty() {
                return Err(DataError::EmptyColumn(name.clone()));
            }
            let mean = observed.iter().sum::<f64>() / observed.len() as f64;

            for cell in column.iter_mut() {
                if cell.is_none() {
                    *cell = Some(mean);
                }
            }
        }
        Ok(())
    }

    /// Densify into an estimator-ready matrix and label vector
    ///
    /// Fails if any cell is still missing; call
    /// [`fill_missing_with_mean`](Self::fill_missing_with_mean) first.
    pub fn to_matrix(&self) -> Result<(Array2<f64>, Vec<usize>)> {
        for (name, column) in self.feature_names.iter().zip(self.columns.iter()) {
            if column.iter().any(|c| c.is_none()) {
                return Err(DataError::UnfilledCell(name.clone()));
            }
        }

        let (n_rows, n_cols) = (self.n_rows(), self.n_features());
        let x = Array2::from_shape_fn((n_rows, n_cols), |(row, col)| {
            self.columns[col][row].unwrap_or_default()
        });
        Ok((x, self.labels.clone()))
    }
}

fn parse_cell(field: &str, column: &str, row: usize) -> Result<Option<f64>> {
    if field.is_empty() {
        return Ok(None);
    }
    field.parse::<f64>().map(Some).map_err(|_| {
        DataError::SchemaMismatch(format!(
            "non-numeric value '{field}' in column '{column}' at row {row}"
        ))
    })
}

fn parse_label(field: &str, row: usize) -> Result<usize> {
    let value: f64 = field
        .parse()
        .map_err(|_| DataError::InvalidLabel(field.to_string(), row))?;
    if value == 0.0 {
        Ok(0)
    } else if value == 1.0 {
        Ok(1)
    } else {
        Err(DataError::InvalidLabel(field.to_string(), row))
    }
}
