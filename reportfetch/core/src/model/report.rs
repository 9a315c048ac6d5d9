use serde::{Deserialize, Serialize};

/// A single result row, column name to value in select order
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Rows returned by one query across all of its accounts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub rows: Vec<Row>,
}

impl Report {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in order of first appearance across all rows
    pub fn column_names(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();

        for row in &self.rows {
            for name in row.keys() {
                if !columns.contains(&name.as_str()) {
                    columns.push(name.as_str());
                }
            }
        }

        columns
    }
}

impl Extend<Row> for Report {
    fn extend<T: IntoIterator<Item = Row>>(&mut self, iter: T) {
        self.rows.extend(iter)
    }
}
