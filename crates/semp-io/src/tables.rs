//! Low-level reader for tab-separated planning tables
//!
//! Every input is a `.tab` file: one header row, tab-delimited columns, one
//! record per row. Set tables list tuples of names; parameter tables carry
//! key columns followed by a single numeric value column; scalar tables are
//! a single one-column row.
//!
//! All arity and number-format problems are reported with the table name so
//! a broken workbook export fails before model assembly starts.

use std::path::Path;

use semp_core::{SempError, SempResult};

/// One parsed table: header plus string cells.
#[derive(Debug)]
pub struct Table {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Require every row to carry exactly `arity` columns.
    pub fn check_arity(&self, arity: usize) -> SempResult<()> {
        for (idx, row) in self.rows.iter().enumerate() {
            if row.len() != arity {
                return Err(SempError::Data(format!(
                    "table '{}' row {}: expected {} columns, found {}",
                    self.name,
                    idx + 1,
                    arity,
                    row.len()
                )));
            }
        }
        Ok(())
    }

    /// The single value of a scalar table.
    pub fn scalar(&self) -> SempResult<f64> {
        if self.rows.len() != 1 || self.rows[0].len() != 1 {
            return Err(SempError::Data(format!(
                "table '{}' must hold exactly one scalar value",
                self.name
            )));
        }
        parse_f64(&self.name, &self.rows[0][0])
    }
}

/// Read `<dir>/<name>.tab`. Returns `Ok(None)` when the file is absent and
/// `required` is false; a missing required table is a data error.
pub fn read_table(dir: &Path, name: &str, required: bool) -> SempResult<Option<Table>> {
    let path = dir.join(format!("{name}.tab"));
    if !path.exists() {
        if required {
            return Err(SempError::Data(format!(
                "missing required input table '{}.tab' in {}",
                name,
                dir.display()
            )));
        }
        return Ok(None);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .map_err(|e| SempError::Parse(format!("table '{name}': {e}")))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SempError::Parse(format!("table '{name}': {e}")))?;
        let row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        // Workbook exports keep fully empty rows around; skip them.
        if row.iter().all(|s| s.is_empty()) {
            continue;
        }
        rows.push(row);
    }

    Ok(Some(Table { name: name.to_string(), rows }))
}

pub fn parse_f64(table: &str, cell: &str) -> SempResult<f64> {
    cell.parse::<f64>()
        .map_err(|_| SempError::Parse(format!("table '{table}': '{cell}' is not a number")))
}

pub fn parse_i64(table: &str, cell: &str) -> SempResult<i64> {
    // Workbook exports often render integers as "1.0".
    if let Ok(v) = cell.parse::<i64>() {
        return Ok(v);
    }
    let as_float = cell
        .parse::<f64>()
        .map_err(|_| SempError::Parse(format!("table '{table}': '{cell}' is not an integer")))?;
    if as_float.fract() != 0.0 {
        return Err(SempError::Parse(format!(
            "table '{table}': '{cell}' is not an integer"
        )));
    }
    Ok(as_float as i64)
}
