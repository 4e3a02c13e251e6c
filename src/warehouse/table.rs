use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tabular query result. Every row holds one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// A new result holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> QueryResult {
        QueryResult {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Rows as `{column: value}` objects, the shape Vega-Lite expects in `data.values`.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                for (column, cell) in self.columns.iter().zip(row.iter()) {
                    record.insert(column.clone(), cell.clone());
                }
                Value::Object(record)
            })
            .collect()
    }

    /// Pipe-separated text table, cut after `max_rows` rows.
    pub fn render(&self, max_rows: usize) -> String {
        if self.columns.is_empty() {
            return String::from("(no columns)");
        }
        let mut out = String::new();
        out.push_str(&self.columns.join(" | "));
        out.push('\n');
        for row in self.rows.iter().take(max_rows) {
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
        if self.rows.len() > max_rows {
            out.push_str(&format!("... ({} rows in total)\n", self.rows.len()));
        }
        out
    }
}

/// Cell text without JSON quoting.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("NULL"),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl std::fmt::Display for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render(50))
    }
}
