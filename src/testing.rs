//! Scripted doubles for the external collaborators, used by unit tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::assistant::agents::clarification::UserChannel;
use crate::assistant::context::AssistantContext;
use crate::assistant::resources::Resources;
use crate::config::Config;
use crate::knowledge::VectorStore;
use crate::knowledge::embedder::Embedder;
use crate::llm::{ChatModel, ChatRequest};
use crate::warehouse::{QueryExecutor, QueryOutcome, QueryResult};

/// Answers prompts from per-tag queues. The last queued answer of a tag repeats forever.
#[derive(Default)]
pub struct ScriptedModel {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(self, tag: &str, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts
            .lock()
            .unwrap()
            .entry(tag.to_string())
            .or_default()
            .extend(answers.into_iter().map(|a| Ok(a.into())));
        self
    }

    pub fn failing(self, tag: &str, message: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(tag.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn calls_for(&self, tag: &str) -> usize {
        self.requests_for(tag).len()
    }

    pub fn requests_for(&self, tag: &str) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.tag == tag)
            .cloned()
            .collect()
    }

    pub fn tags(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.tag.clone())
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .get_mut(&request.tag)
            .ok_or_else(|| anyhow!("no script for tag {}", request.tag))?;
        let answer = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match answer {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("script for tag {} is empty", request.tag)),
        }
    }
}

/// Bag-of-words embedding over a fixed vocabulary.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: Vec<&'static str>) -> Self {
        Self { vocabulary }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                self.vocabulary
                    .iter()
                    .map(|word| lower.matches(word).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Replays canned user answers to clarifying questions.
#[derive(Default)]
pub struct ScriptedChannel {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedChannel {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserChannel for ScriptedChannel {
    async fn ask(&self, question: &str) -> Result<Option<String>> {
        self.asked.lock().unwrap().push(question.to_string());
        Ok(self.answers.lock().unwrap().pop_front())
    }
}

/// Answers queries from a fixed table of SQL text; anything else fails like an unknown table.
#[derive(Default)]
pub struct ScriptedWarehouse {
    outcomes: HashMap<String, QueryOutcome>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sql: &str, outcome: QueryOutcome) -> Self {
        self.outcomes.insert(sql.trim().to_string(), outcome);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedWarehouse {
    async fn execute(&self, sql: &str) -> QueryOutcome {
        self.executed.lock().unwrap().push(sql.to_string());
        self.outcomes
            .get(sql.trim())
            .cloned()
            .unwrap_or_else(|| QueryOutcome::Failed(format!("no such table in: {}", sql)))
    }
}

pub fn rows(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryOutcome {
    QueryOutcome::from_result(QueryResult::new(
        columns.iter().map(|c| c.to_string()).collect(),
        rows,
    ))
}

pub fn sample_resources() -> Resources {
    let mut templates = serde_json::Map::new();
    templates.insert(
        "bar_chart".to_string(),
        json!({"mark": "bar", "data": {"values": []}, "encoding": {}}),
    );
    templates.insert(
        "line_chart".to_string(),
        json!({"mark": "line", "data": {"values": []}, "encoding": {}}),
    );
    Resources {
        sql_schema: "shows(title STRING, genre STRING, views INT64, air_date DATE)".to_string(),
        sample_queries: json!([{"question": "Views by genre", "sql": "SELECT genre, SUM(views) FROM shows GROUP BY genre"}]),
        error_fewshot: r#"[{"error": "Unrecognized name: titel", "fix": "Use the column title"}]"#.to_string(),
        visualization_guide: json!({"bar_chart": "compare categories", "line_chart": "trends over time"}),
        visualization_templates: templates,
    }
}

/// Context over scripted doubles with the prompt cache switched off.
pub fn test_context(model: Arc<ScriptedModel>, warehouse: Arc<dyn QueryExecutor>) -> AssistantContext {
    let mut config = Config::default();
    config.cache.enabled = false;
    context_with(config, model, warehouse)
}

/// Context over scripted doubles with the prompt cache kept under `cache_dir`.
pub fn cached_test_context(
    model: Arc<ScriptedModel>,
    warehouse: Arc<dyn QueryExecutor>,
    cache_dir: &Path,
) -> AssistantContext {
    let mut config = Config::default();
    config.cache.enabled = true;
    config.cache.cache_dir = cache_dir.to_path_buf();
    context_with(config, model, warehouse)
}

fn context_with(
    mut config: Config,
    model: Arc<ScriptedModel>,
    warehouse: Arc<dyn QueryExecutor>,
) -> AssistantContext {
    config.llm.retry_delay_ms = 0;
    AssistantContext::new(
        config,
        model,
        warehouse,
        Arc::new(KeywordEmbedder::new(vec!["churn", "dma", "views"])),
        VectorStore::new("main"),
        sample_resources(),
    )
}
