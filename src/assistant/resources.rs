use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::assistant::AssistantError;
use crate::config::Config;

pub const SQL_SCHEMA_FILE: &str = "sql_schema.txt";
pub const SAMPLE_QUERIES_FILE: &str = "sample_queries.json";
pub const ERROR_FEWSHOT_FILE: &str = "error_fewshot.json";
pub const VISUALIZATION_GUIDE_FILE: &str = "json_templates/visualization_guide.json";
pub const VISUALIZATION_TEMPLATES_FILE: &str = "json_templates/visualization_templates.json";

/// Static resources loaded from the data directory at startup
#[derive(Debug, Clone, Default)]
pub struct Resources {
    /// Warehouse table structure
    pub sql_schema: String,
    /// Sample queries, passed verbatim to SQL generation
    pub sample_queries: Value,
    /// Few-shot examples for SQL error repair
    pub error_fewshot: String,
    /// Description of each visualization type
    pub visualization_guide: Value,
    /// Vega-Lite template per visualization type
    pub visualization_templates: Map<String, Value>,
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn read_optional_json(path: &Path, fallback: Value) -> Result<Value> {
    if path.is_file() {
        read_json(path)
    } else {
        warn!("optional resource {:?} not found", path);
        Ok(fallback)
    }
}

impl Resources {
    /// Loads every resource; only the schema file is required
    pub fn load(config: &Config) -> Result<Self> {
        let schema_path = config.data_file(SQL_SCHEMA_FILE);
        if !schema_path.is_file() {
            return Err(AssistantError::MissingResource(schema_path.display().to_string()).into());
        }
        let sql_schema = std::fs::read_to_string(&schema_path)
            .with_context(|| format!("Failed to read {:?}", schema_path))?;

        let sample_queries = read_optional_json(
            &config.data_file(SAMPLE_QUERIES_FILE),
            Value::Array(Vec::new()),
        )?;

        let fewshot_path = config.data_file(ERROR_FEWSHOT_FILE);
        let error_fewshot = if fewshot_path.is_file() {
            std::fs::read_to_string(&fewshot_path)
                .with_context(|| format!("Failed to read {:?}", fewshot_path))?
        } else {
            warn!("optional resource {:?} not found", fewshot_path);
            String::new()
        };

        let visualization_guide = read_optional_json(
            &config.data_file(VISUALIZATION_GUIDE_FILE),
            Value::Object(Map::new()),
        )?;
        let visualization_templates = match read_optional_json(
            &config.data_file(VISUALIZATION_TEMPLATES_FILE),
            Value::Object(Map::new()),
        )? {
            Value::Object(map) => map,
            _ => {
                return Err(AssistantError::MissingResource(format!(
                    "{} must hold a JSON object keyed by visualization type",
                    VISUALIZATION_TEMPLATES_FILE
                ))
                .into());
            }
        };

        info!(
            templates = visualization_templates.len(),
            "loaded assistant resources from {:?}", config.data_dir
        );

        Ok(Self {
            sql_schema,
            sample_queries,
            error_fewshot,
            visualization_guide,
            visualization_templates,
        })
    }

    /// Template names, comma separated
    pub fn visualization_names(&self) -> String {
        self.visualization_templates
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}
