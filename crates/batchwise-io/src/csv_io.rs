use std::path::Path;

use batchwise_core::{BatchError, BatchResult, Tensor};
use log::debug;

use crate::table::Table;

fn csv_error(e: csv::Error) -> BatchError {
    BatchError::Format(format!("CSV error: {}", e))
}

/// Read a numeric CSV file into a named-column table.
/// The header row supplies the column names; every field must parse as a number.
pub fn read_csv<P: AsRef<Path>>(path: P) -> BatchResult<Table<f64>> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path).map_err(csv_error)?;
    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut data = Vec::new();
    let mut n_rows = 0usize;
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_error)?;
        if record.len() != headers.len() {
            return Err(BatchError::ShapeMismatch {
                expected: vec![headers.len()],
                got: vec![record.len()],
            });
        }
        for (col, field) in record.iter().enumerate() {
            let val: f64 = field.trim().parse().map_err(|_| {
                BatchError::Format(format!(
                    "{}: row {} column '{}' is not numeric: '{}'",
                    path.display(),
                    row + 1,
                    headers[col],
                    field
                ))
            })?;
            data.push(val);
        }
        n_rows += 1;
    }

    debug!("read {} rows x {} columns from {}", n_rows, headers.len(), path.display());
    let values = Tensor::new(data, vec![n_rows, headers.len()])?;
    Table::new(headers, values)
}

/// Write a table to CSV, header first.
pub fn write_csv<P: AsRef<Path>>(path: P, table: &Table<f64>) -> BatchResult<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref()).map_err(csv_error)?;
    wtr.write_record(table.column_names()).map_err(csv_error)?;
    for i in 0..table.n_rows() {
        let row: Vec<String> = table.values().row(i)?.iter().map(|v| v.to_string()).collect();
        wtr.write_record(&row).map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(())
}
