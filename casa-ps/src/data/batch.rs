//! Column-named record batches
//!
//! The reference dataset is held as one `RecordBatch`. Listing endpoints work
//! on derived batches (row subsets, extra label column) and serialize them as
//! a JSON array of objects in column order.

use casa_common::{Error, Result};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use super::Cell;

/// Rows of typed cells under a fixed, ordered column list
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RecordBatch {
    /// Empty batch with the given columns
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(Error::InvalidInput(format!("duplicate column '{}'", column)));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Load a CSV file with a header row
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Load CSV from any reader with a header row
    ///
    /// Rows with a different field count than the header are an error. Each
    /// column gets one type across all rows.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut batch = Self::new(columns)?;

        let raw = csv_reader
            .records()
            .collect::<std::result::Result<Vec<csv::StringRecord>, _>>()?;
        batch.rows = raw
            .iter()
            .map(|record| record.iter().map(Cell::parse).collect())
            .collect();

        for col in 0..batch.columns.len() {
            let kind = batch
                .rows
                .iter()
                .fold(ColumnKind::Empty, |kind, row| kind.merge(&row[col]));
            for (row, record) in batch.rows.iter_mut().zip(&raw) {
                let field = record.get(col).unwrap_or_default();
                kind.conform(&mut row[col], field);
            }
        }

        Ok(batch)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Vec<Cell>] {
        &mut self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Cell at (row, column name)
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// All cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Append a row; its length must match the column count
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::InvalidInput(format!(
                "row has {} cells, batch has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Set a column, replacing it in place if it exists or appending it
    pub fn with_column(mut self, name: &str, values: Vec<Cell>) -> Result<Self> {
        if values.len() != self.rows.len() {
            return Err(Error::InvalidInput(format!(
                "column '{}' has {} values, batch has {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(col) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(self)
    }

    /// New batch with the rows at `indices`, in that order
    pub fn take(&self, indices: &[usize]) -> RecordBatch {
        RecordBatch {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// New batch with only the named columns that exist, in the given order
    pub fn select(&self, names: &[&str]) -> RecordBatch {
        let picked: Vec<(usize, &str)> = names
            .iter()
            .filter_map(|name| self.column_index(name).map(|i| (i, *name)))
            .collect();
        RecordBatch {
            columns: picked.iter().map(|(_, name)| name.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| picked.iter().map(|(i, _)| row[*i].clone()).collect())
                .collect(),
        }
    }

    /// Keep at most `n` leading rows
    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }
}

/// Type shared by every non-null cell of a loaded column
///
/// Ints widen to floats when the column also holds floats. Any other mix
/// makes the whole column text, spelled as in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Empty,
    Bool,
    Int,
    Float,
    Text,
}

impl ColumnKind {
    fn merge(self, cell: &Cell) -> ColumnKind {
        let other = match cell {
            Cell::Null => return self,
            Cell::Bool(_) => ColumnKind::Bool,
            Cell::Int(_) => ColumnKind::Int,
            Cell::Float(_) => ColumnKind::Float,
            Cell::Text(_) => ColumnKind::Text,
        };
        match (self, other) {
            (ColumnKind::Empty, k) => k,
            (a, b) if a == b => a,
            (ColumnKind::Int, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }

    fn conform(self, cell: &mut Cell, field: &str) {
        match (self, &*cell) {
            (_, Cell::Null) => {}
            (ColumnKind::Float, Cell::Int(i)) => *cell = Cell::Float(*i as f64),
            (ColumnKind::Text, Cell::Text(_)) => {}
            (ColumnKind::Text, _) => *cell = Cell::Text(field.to_string()),
            _ => {}
        }
    }
}

/// One row viewed as a JSON object
struct RowView<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

impl Serialize for RecordBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowView {
                columns: &self.columns,
                cells: row,
            })?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "id,district,buy_price,has_lift\n\
                       1,Centro,350000,True\n\
                       2,Retiro,,False\n\
                       3,Centro,inf,True\n";

    #[test]
    fn test_load_csv() {
        let batch = RecordBatch::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(batch.columns(), &["id", "district", "buy_price", "has_lift"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.cell(0, "buy_price"), Some(&Cell::Float(350000.0)));
        assert_eq!(batch.cell(1, "buy_price"), Some(&Cell::Null));
        assert!(batch.cell(2, "buy_price").unwrap().is_non_finite());
        assert_eq!(batch.cell(1, "has_lift"), Some(&Cell::Bool(false)));
    }

    #[test]
    fn test_column_types_are_unified() {
        let csv = "id,floor,buy_price,area,has_lift\n\
                   1,3,NA,80,True\n\
                   2,bajo,null,95.5,\n\
                   3,1.0,None,,False\n";
        let batch = RecordBatch::from_csv_reader(csv.as_bytes()).unwrap();

        let floor: Vec<&Cell> = batch.column("floor").unwrap();
        assert_eq!(
            floor,
            [&Cell::Text("3".into()), &Cell::Text("bajo".into()), &Cell::Text("1.0".into())]
        );
        assert!(batch.column("buy_price").unwrap().iter().all(|c| c.is_null()));
        assert_eq!(batch.cell(0, "area"), Some(&Cell::Float(80.0)));
        assert_eq!(batch.cell(2, "area"), Some(&Cell::Null));
        assert_eq!(batch.cell(1, "has_lift"), Some(&Cell::Null));
        assert_eq!(batch.cell(2, "has_lift"), Some(&Cell::Bool(false)));
        assert_eq!(batch.cell(2, "id"), Some(&Cell::Int(3)));

        let json = serde_json::to_string(&batch).unwrap();
        assert_eq!(
            json,
            r#"[{"id":1,"floor":"3","buy_price":null,"area":80.0,"has_lift":true},{"id":2,"floor":"bajo","buy_price":null,"area":95.5,"has_lift":null},{"id":3,"floor":"1.0","buy_price":null,"area":null,"has_lift":false}]"#
        );
    }

    #[test]
    fn test_bool_mixed_with_numbers_is_text() {
        let batch = RecordBatch::from_csv_reader("flag\nTrue\n1\n".as_bytes()).unwrap();
        assert_eq!(batch.cell(0, "flag"), Some(&Cell::Text("True".into())));
        assert_eq!(batch.cell(1, "flag"), Some(&Cell::Text("1".into())));
    }

    #[test]
    fn test_ragged_csv_is_error() {
        let result = RecordBatch::from_csv_reader("a,b\n1,2\n3\n".as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        assert!(RecordBatch::new(vec!["a".into(), "a".into()]).is_err());
    }

    #[test]
    fn test_with_column_appends_and_replaces() {
        let batch = RecordBatch::from_csv_reader(CSV.as_bytes()).unwrap();
        let batch = batch
            .with_column("cluster", vec![Cell::Int(0), Cell::Int(1), Cell::Null])
            .unwrap();
        assert_eq!(batch.columns().last().map(String::as_str), Some("cluster"));

        let batch = batch
            .with_column("cluster", vec![Cell::Int(4), Cell::Int(4), Cell::Int(4)])
            .unwrap();
        assert_eq!(batch.columns().len(), 5);
        assert_eq!(batch.cell(2, "cluster"), Some(&Cell::Int(4)));

        assert!(batch.with_column("bad", vec![Cell::Null]).is_err());
    }

    #[test]
    fn test_take_and_select() {
        let batch = RecordBatch::from_csv_reader(CSV.as_bytes()).unwrap();
        let picked = batch.take(&[2, 0]);
        assert_eq!(picked.cell(0, "id"), Some(&Cell::Int(3)));
        assert_eq!(picked.cell(1, "id"), Some(&Cell::Int(1)));

        let narrow = batch.select(&["district", "missing", "id"]);
        assert_eq!(narrow.columns(), &["district", "id"]);
        assert_eq!(narrow.row(0), Some(&[Cell::Text("Centro".into()), Cell::Int(1)][..]));
    }

    #[test]
    fn test_serializes_rows_as_objects_in_column_order() {
        let batch = RecordBatch::from_csv_reader("b,a\n1,x\n".as_bytes()).unwrap();
        let json = serde_json::to_string(&batch).unwrap();
        assert_eq!(json, r#"[{"b":1,"a":"x"}]"#);
    }
}
