//! Query Executor: runs SQL against the data warehouse

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod sql;
pub mod table;

pub use sql::SqlWarehouse;
pub use table::QueryResult;

/// What came back from running one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryOutcome {
    /// At least one row
    Rows(QueryResult),
    /// The query ran but matched nothing
    Empty(QueryResult),
    /// The warehouse rejected the query
    Failed(String),
}

impl QueryOutcome {
    pub fn from_result(result: QueryResult) -> Self {
        if result.is_empty() {
            QueryOutcome::Empty(result)
        } else {
            QueryOutcome::Rows(result)
        }
    }

    /// Empty and failed outcomes are handed to the SQL debug loop.
    pub fn needs_repair(&self) -> bool {
        !matches!(self, QueryOutcome::Rows(_))
    }

    pub fn rows(&self) -> Option<&QueryResult> {
        match self {
            QueryOutcome::Rows(result) => Some(result),
            _ => None,
        }
    }

    /// Short explanation of why the outcome needs repair, or of what it holds.
    pub fn describe(&self) -> String {
        match self {
            QueryOutcome::Rows(result) => format!("{} rows returned", result.row_count()),
            QueryOutcome::Empty(_) => String::from("Data returned no records"),
            QueryOutcome::Failed(message) => format!("General Error: {}", message),
        }
    }

    /// Transcript text: the table when there is one, otherwise `describe`.
    pub fn render(&self, max_rows: usize) -> String {
        match self {
            QueryOutcome::Rows(result) => result.render(max_rows),
            other => other.describe(),
        }
    }
}

/// A data warehouse that executes SQL text.
///
/// Warehouse errors come back as `QueryOutcome::Failed`; they are input for the
/// repair loop, not faults of the caller.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> QueryOutcome;
}
