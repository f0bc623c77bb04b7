use std::fmt;

use serde::Serialize;

/// One cell of a query result, typed by the SQLite value it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str(""),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Real(r) => write!(f, "{r}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Column names plus row-major cells. Every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of column `index`, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// "Query returned N rows with columns: a, b"
    pub fn summary(&self) -> String {
        format!(
            "Query returned {} rows with columns: {}",
            self.row_count(),
            self.columns.join(", ")
        )
    }
}

/// What running a SQL statement produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum QueryOutput {
    Table(DataTable),
    /// A statement that returns no rows, e.g. "3 row(s) affected".
    Message(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataTable {
        DataTable::new(
            vec!["Name".into(), "Total".into()],
            vec![
                vec![CellValue::Text("AC/DC".into()), CellValue::Integer(18)],
                vec![CellValue::Text("Accept".into()), CellValue::Null],
            ],
        )
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(
            sample().summary(),
            "Query returned 2 rows with columns: Name, Total"
        );
    }

    #[test]
    fn test_column_iteration() {
        let table = sample();
        let totals: Vec<_> = table.column(1).cloned().collect();
        assert_eq!(totals, vec![CellValue::Integer(18), CellValue::Null]);
    }

    #[test]
    fn test_cell_display_and_numeric_view() {
        assert_eq!(CellValue::Null.to_string(), "");
        assert_eq!(CellValue::Real(0.99).to_string(), "0.99");
        assert_eq!(CellValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(CellValue::Text("3".into()).as_f64(), None);
    }
}
