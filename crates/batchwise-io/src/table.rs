use batchwise_core::{BatchError, BatchResult, Float, Tensor};

/// Named-column data normalized into a positional `[rows, columns]` array.
///
/// Column names are kept in input order and are only metadata for labelling
/// outputs; batching works on the positional array.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T: Float> {
    columns: Vec<String>,
    values: Tensor<T>,
}

impl<T: Float> Table<T> {
    /// Build a table from `(name, values)` columns, all of the same length.
    pub fn from_columns(columns: Vec<(String, Vec<T>)>) -> BatchResult<Self> {
        let n_rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        let n_cols = columns.len();
        for (i, (name, values)) in columns.iter().enumerate() {
            if values.len() != n_rows {
                return Err(BatchError::ShapeMismatch {
                    expected: vec![n_rows],
                    got: vec![values.len()],
                });
            }
            if columns[..i].iter().any(|(other, _)| other == name) {
                return Err(BatchError::InvalidOperation(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
        }

        let mut data = Vec::with_capacity(n_rows * n_cols);
        for r in 0..n_rows {
            for (_, values) in &columns {
                data.push(values[r]);
            }
        }
        let names = columns.into_iter().map(|(name, _)| name).collect();
        Table::new(names, Tensor::new(data, vec![n_rows, n_cols])?)
    }

    /// Attach column names to an existing 2-D array.
    pub fn new(columns: Vec<String>, values: Tensor<T>) -> BatchResult<Self> {
        let width = if values.ndim() == 2 { values.shape().dim(1)? } else { 0 };
        if values.ndim() != 2 || width != columns.len() {
            return Err(BatchError::ShapeMismatch {
                expected: vec![values.rows(), columns.len()],
                got: values.shape_vec(),
            });
        }
        Ok(Table { columns, values })
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Tensor<T> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.rows()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Values of one column by name.
    pub fn column(&self, name: &str) -> Option<Vec<T>> {
        let j = self.columns.iter().position(|c| c == name)?;
        let width = self.columns.len();
        Some(self.values.data().iter().skip(j).step_by(width).copied().collect())
    }

    pub fn into_parts(self) -> (Vec<String>, Tensor<T>) {
        (self.columns, self.values)
    }
}
