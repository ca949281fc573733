//! Tabular I/O with Polars and the row-level cleaning steps used before training

use crate::error::{ChurnError, Result};
use crate::record::{RawRecord, Value};
use crate::scorer::display_percent;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Column appended to batch predictions
pub const PROBABILITY_COLUMN: &str = "Churn_Probability (%)";

/// Column names in file order plus one raw record per row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl Table {
    pub fn new(columns: Vec<String>, records: Vec<RawRecord>) -> Self {
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Remove a column from the header and every record; false if it was absent
    pub fn drop_column(&mut self, name: &str) -> bool {
        if !self.has_column(name) {
            return false;
        }
        self.columns.retain(|c| c != name);
        for record in &mut self.records {
            record.remove(name);
        }
        true
    }

    /// Keep only the listed columns, in their current order
    pub fn retain_columns(&mut self, keep: &[String]) -> Result<()> {
        if let Some(missing) = keep.iter().find(|k| !self.has_column(k)) {
            return Err(ChurnError::Config(format!(
                "feature column '{}' not found in data",
                missing
            )));
        }
        let dropped: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !keep.contains(c))
            .cloned()
            .collect();
        for column in dropped {
            self.drop_column(&column);
        }
        Ok(())
    }

    /// Parse `column` as a number in every row, dropping rows where that fails.
    ///
    /// Returns the number of dropped rows. Blank or missing values count as
    /// failures; nothing is imputed.
    pub fn coerce_numeric(&mut self, column: &str) -> usize {
        if !self.has_column(column) {
            return 0;
        }
        let before = self.records.len();
        self.records.retain_mut(|record| {
            let parsed = match record.get(column) {
                Some(Value::Number(_)) => return true,
                Some(Value::Category(text)) => text.trim().parse::<f64>().ok(),
                None => None,
            };
            match parsed {
                Some(n) if n.is_finite() => {
                    record.insert(column, n);
                    true
                }
                _ => false,
            }
        });
        before - self.records.len()
    }

    /// Parse numeric text in `column` in place, keeping every row.
    ///
    /// Returns how many values stayed text; scoring rejects those rows later.
    pub fn parse_numeric(&mut self, column: &str) -> usize {
        let mut unparsed = 0;
        for record in &mut self.records {
            let parsed = match record.get(column) {
                Some(Value::Category(text)) => text.trim().parse::<f64>().ok(),
                _ => continue,
            };
            match parsed {
                Some(n) if n.is_finite() => record.insert(column, n),
                _ => unparsed += 1,
            }
        }
        unparsed
    }

    /// Drop rows missing a value in any column; returns the number dropped
    pub fn drop_incomplete(&mut self) -> usize {
        let before = self.records.len();
        let columns = &self.columns;
        self.records
            .retain(|record| columns.iter().all(|c| record.contains(c)));
        before - self.records.len()
    }
}

/// Read a CSV file with a header row. The schema is inferred from the whole
/// file so text in an otherwise numeric column keeps it as text.
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Convert a frame into records: string columns become categories, every
/// other column is cast to `f64`. Nulls are left out of the record.
pub fn frame_to_table(df: &DataFrame) -> Result<Table> {
    let mut records = vec![RawRecord::new(); df.height()];
    let mut columns = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let name = column.name().to_string();
        let series = column.as_materialized_series();

        if matches!(series.dtype(), DataType::String) {
            for (row, value) in series.str()?.into_iter().enumerate() {
                if let Some(value) = value {
                    records[row].insert(name.clone(), value);
                }
            }
        } else {
            let numeric = series.cast(&DataType::Float64)?;
            for (row, value) in numeric.f64()?.into_iter().enumerate() {
                if let Some(value) = value.filter(|v| !v.is_nan()) {
                    records[row].insert(name.clone(), value);
                }
            }
        }
        columns.push(name);
    }

    Ok(Table::new(columns, records))
}

/// Read a CSV file straight into a table
pub fn load_table(path: impl AsRef<Path>) -> Result<Table> {
    let df = read_csv(path)?;
    frame_to_table(&df)
}

/// Append the probability column (percent, two decimals). `None` leaves the cell empty.
pub fn append_probabilities(df: &mut DataFrame, probabilities: &[Option<f64>]) -> Result<()> {
    if probabilities.len() != df.height() {
        return Err(ChurnError::Config(format!(
            "{} probabilities for {} rows",
            probabilities.len(),
            df.height()
        )));
    }
    let values: Vec<Option<f64>> = probabilities
        .iter()
        .map(|p| p.map(display_percent))
        .collect();
    df.with_column(Series::new(PROBABILITY_COLUMN.into(), values))?;
    Ok(())
}

/// Write a frame as comma-separated text with a header row
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customerID,tenure,Contract,MonthlyCharges,TotalCharges,Churn").unwrap();
        writeln!(file, "7590-VHVEG,1,Month-to-month,29.85,29.85,No").unwrap();
        writeln!(file, "5575-GNVDE,34,One year,56.95,1889.5,No").unwrap();
        writeln!(file, "4472-LVYGI,0,Two year,52.55, ,No").unwrap();
        writeln!(file, "9237-HQITU,2,Month-to-month,70.70,151.65,Yes").unwrap();
        file
    }

    fn sample_table() -> Table {
        Table::new(
            vec!["a".to_string(), "b".to_string(), "total".to_string()],
            vec![
                RawRecord::new().with("a", 1.0).with("b", "x").with("total", "10.5"),
                RawRecord::new().with("a", 2.0).with("b", "y").with("total", " "),
                RawRecord::new().with("a", 3.0).with("total", 7.0),
                RawRecord::new().with("a", 4.0).with("b", "z"),
            ],
        )
    }

    #[test]
    fn test_load_table() {
        let file = create_test_csv();
        let table = load_table(file.path()).unwrap();

        assert_eq!(
            table.columns,
            vec!["customerID", "tenure", "Contract", "MonthlyCharges", "TotalCharges", "Churn"]
        );
        assert_eq!(table.len(), 4);
        assert_eq!(table.records[1].get("tenure"), Some(&Value::Number(34.0)));
        assert_eq!(
            table.records[1].get("Contract"),
            Some(&Value::Category("One year".to_string()))
        );
        // The blank total keeps the whole column textual
        assert_eq!(
            table.records[0].get("TotalCharges").and_then(Value::as_category),
            Some("29.85")
        );
    }

    #[test]
    fn test_coerce_numeric_drops_unparseable_rows() {
        let mut table = sample_table();
        let dropped = table.coerce_numeric("total");

        assert_eq!(dropped, 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].get("total"), Some(&Value::Number(10.5)));
        assert_eq!(table.records[1].get("total"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn test_coerce_unknown_column_is_noop() {
        let mut table = sample_table();
        assert_eq!(table.coerce_numeric("missing"), 0);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_parse_numeric_keeps_rows() {
        let mut table = sample_table();
        assert_eq!(table.parse_numeric("total"), 1);
        assert_eq!(table.len(), 4);
        assert_eq!(table.records[0].get("total"), Some(&Value::Number(10.5)));
        assert_eq!(
            table.records[1].get("total"),
            Some(&Value::Category(" ".to_string()))
        );
    }

    #[test]
    fn test_drop_incomplete() {
        let mut table = sample_table();
        assert_eq!(table.drop_incomplete(), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_drop_and_retain_columns() {
        let mut table = sample_table();
        assert!(table.drop_column("b"));
        assert!(!table.drop_column("b"));
        assert!(table.records.iter().all(|r| !r.contains("b")));

        table.retain_columns(&["total".to_string()]).unwrap();
        assert_eq!(table.columns, vec!["total"]);
        assert!(table.retain_columns(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_append_probabilities_and_write() {
        let file = create_test_csv();
        let mut df = read_csv(file.path()).unwrap();

        append_probabilities(&mut df, &[Some(0.123456), None, Some(0.5), Some(1.0)]).unwrap();
        let out = NamedTempFile::new().unwrap();
        write_csv(&mut df, out.path()).unwrap();

        let written = std::fs::read_to_string(out.path()).unwrap();
        let mut lines = written.lines();
        assert!(lines.next().unwrap().ends_with(PROBABILITY_COLUMN));
        assert!(lines.next().unwrap().ends_with(",12.35"));
        assert!(lines.next().unwrap().ends_with(','));
    }

    #[test]
    fn test_append_probabilities_length_mismatch() {
        let file = create_test_csv();
        let mut df = read_csv(file.path()).unwrap();
        assert!(append_probabilities(&mut df, &[Some(0.1)]).is_err());
    }
}
