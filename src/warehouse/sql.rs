//! sqlx-backed warehouse (postgres or sqlite through the `Any` driver)

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::any::{AnyPoolOptions, AnyRow, install_default_drivers};
use sqlx::{AnyPool, Column, Row};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::WarehouseConfig;
use crate::warehouse::{QueryExecutor, QueryOutcome, QueryResult};

pub struct SqlWarehouse {
    pool: AnyPool,
}

impl SqlWarehouse {
    /// Opens a pool and verifies it with `SELECT 1`.
    pub async fn connect(config: &WarehouseConfig) -> Result<Self> {
        if config.database_url.trim().is_empty() {
            bail!("No warehouse url configured (set warehouse.database_url or INSIGHT_DATABASE_URL)");
        }
        install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.database_url)
            .await
            .context("Failed to connect to the warehouse")?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("Warehouse connection check failed")?;

        info!("connected to warehouse");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

/// Decodes one cell as integer, float, text or bool, in that order.
fn decode_cell(row: &AnyRow, index: usize) -> Value {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    Value::Null
}

fn rows_to_result(rows: &[AnyRow]) -> QueryResult {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let data = rows
        .iter()
        .map(|row| (0..row.columns().len()).map(|i| decode_cell(row, i)).collect())
        .collect();

    QueryResult::new(columns, data)
}

#[async_trait]
impl QueryExecutor for SqlWarehouse {
    async fn execute(&self, sql: &str) -> QueryOutcome {
        let started = Instant::now();
        debug!(sql, "executing query");

        match sqlx::query(sql).fetch_all(&self.pool).await {
            Ok(rows) => {
                let result = rows_to_result(&rows);
                info!(
                    rows = result.row_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query finished"
                );
                QueryOutcome::from_result(result)
            }
            Err(e) => {
                warn!(sql, "query failed: {}", e);
                QueryOutcome::Failed(e.to_string())
            }
        }
    }
}
