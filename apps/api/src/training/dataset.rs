//! Tabular dataset used for training: named columns of loosely typed cells.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use tempfile::NamedTempFile;

use crate::errors::ModelError;
use crate::features::profile::number_label;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Parses a raw CSV cell. Empty → `Missing`, numeric → `Number`,
    /// `true`/`false` in any case → `Number(1/0)`, else `Text`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            return Value::Missing;
        }
        if let Ok(n) = raw.parse::<f64>() {
            if n.is_finite() {
                return Value::Number(n);
            }
        }
        if raw.eq_ignore_ascii_case("true") {
            return Value::Number(1.0);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Value::Number(0.0);
        }
        Value::Text(raw.to_string())
    }

    pub fn as_label(&self) -> Option<String> {
        match self {
            Value::Number(n) => Some(number_label(*n)),
            Value::Text(s) => Some(s.clone()),
            Value::Missing => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Result<Self, ModelError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ModelError::Schema(format!(
                    "duplicate dataset column '{column}'"
                )));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ModelError> {
        if row.len() != self.columns.len() {
            return Err(ModelError::Schema(format!(
                "row {} has {} cells, expected {}",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, ModelError> {
        if !path.is_file() {
            return Err(ModelError::DatasetNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ModelError> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_matches('\u{feff}').to_string())
            .collect();

        let mut dataset = Self::new(headers)?;
        for record in reader.records() {
            let record = record?;
            dataset.push_row(record.iter().map(Value::parse).collect())?;
        }
        Ok(dataset)
    }

    /// Writes the dataset as CSV, replacing `path` atomically.
    pub fn write_csv(&self, path: &Path) -> Result<(), ModelError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = WriterBuilder::new().from_writer(tmp.as_file());
            writer.write_record(&self.columns)?;
            for row in &self.rows {
                writer.write_record(row.iter().map(|v| v.as_label().unwrap_or_default()))?;
            }
            writer.flush()?;
        }
        tmp.persist(path).map_err(|e| ModelError::Io(e.error))?;
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// A column is numeric when every non-missing cell is a number.
    pub fn column_kind(&self, index: usize) -> ColumnKind {
        if self.column(index).all(|v| !matches!(v, Value::Text(_))) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Categorical
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\u{feff}age,highest_degree,cert_aws,predicted_job_role\n\
                       25,Bachelor,True,Data Analyst\n\
                       ,Master,false,ML Engineer\n\
                       31,,TRUE,Data Analyst\n";

    #[test]
    fn test_parse_cells() {
        assert_eq!(Value::parse(" 4.5 "), Value::Number(4.5));
        assert_eq!(Value::parse(""), Value::Missing);
        assert_eq!(Value::parse("NaN"), Value::Missing);
        assert_eq!(Value::parse("True"), Value::Number(1.0));
        assert_eq!(Value::parse("Tier 1"), Value::Text("Tier 1".to_string()));
    }

    #[test]
    fn test_from_reader_strips_bom_and_types_columns() {
        let ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(ds.columns()[0], "age");
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.column_kind(0), ColumnKind::Numeric);
        assert_eq!(ds.column_kind(1), ColumnKind::Categorical);
        assert_eq!(ds.column_kind(2), ColumnKind::Numeric);
        assert_eq!(ds.rows()[1][0], Value::Missing);
    }

    #[test]
    fn test_ragged_csv_is_an_error() {
        let ragged = "a,b\n1,2\n3\n";
        assert!(Dataset::from_reader(ragged.as_bytes()).is_err());
    }

    #[test]
    fn test_duplicate_headers_rejected() {
        let dup = "a,a\n1,2\n";
        assert!(matches!(
            Dataset::from_reader(dup.as_bytes()),
            Err(ModelError::Schema(_))
        ));
    }

    #[test]
    fn test_missing_file_is_dataset_not_found() {
        let err = Dataset::from_csv_path(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, ModelError::DatasetNotFound(_)));
    }

    #[test]
    fn test_write_then_read_preserves_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        ds.write_csv(&path).unwrap();

        let back = Dataset::from_csv_path(&path).unwrap();
        assert_eq!(back.columns(), ds.columns());
        assert_eq!(back.rows(), ds.rows());
    }
}
