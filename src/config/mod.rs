use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// LLM provider kind
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Mistral => write!(f, "mistral"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "mistral" => Ok(LLMProvider::Mistral),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// How the embedding endpoint is addressed.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum EmbeddingApiStyle {
    /// `POST {base}/embeddings` with a bearer token and a `model` field
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    /// `POST {base}/openai/deployments/{model}/embeddings?api-version=..` with an `api-key` header
    #[serde(rename = "azure")]
    Azure,
}

impl std::str::FromStr for EmbeddingApiStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(EmbeddingApiStyle::OpenAI),
            "azure" => Ok(EmbeddingApiStyle::Azure),
            _ => Err(format!("Unknown embedding api style: {}", s)),
        }
    }
}

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Directory holding the schema, sample queries, chart templates and seed documents
    pub data_dir: PathBuf,

    /// Where answers and logs are written
    pub output_path: PathBuf,

    /// LLM model configuration
    pub llm: LLMConfig,

    pub embedding: EmbeddingConfig,

    pub warehouse: WarehouseConfig,

    pub knowledge: KnowledgeConfig,

    /// Cache configuration
    pub cache: CacheConfig,

    pub assistant: AssistantConfig,

    /// Verbose logging
    pub verbose: bool,
}

/// LLM model configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM provider kind
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API base URL
    pub api_base_url: String,

    /// Model used for ordinary prompts
    pub model_efficient: String,

    /// Model used for oversized prompts and as the fallback when the efficient one keeps failing
    pub model_powerful: String,

    /// Maximum tokens
    pub max_tokens: u32,

    /// Temperature
    pub temperature: f64,

    /// Sampling seed forwarded to providers that accept one
    pub seed: Option<u64>,

    /// Retry attempts
    pub retry_attempts: u32,

    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,

    /// Call timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_style: EmbeddingApiStyle,
    pub api_key: String,
    pub api_base_url: String,
    /// Model name, or deployment name for the azure style
    pub model: String,
    /// Only used by the azure style
    pub api_version: String,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct WarehouseConfig {
    /// sqlx connection url (`postgres://...` or `sqlite://...`)
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub collection_name: String,
    /// Seed documents, relative to `data_dir` unless absolute
    pub documents_file: PathBuf,
    /// JSON snapshot of the embedded collection
    pub snapshot_path: PathBuf,
    pub top_k: usize,
}

/// Cache configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the prompt cache is on
    pub enabled: bool,

    /// Cache directory
    pub cache_dir: PathBuf,

    /// Entry lifetime in hours
    pub expire_hours: u64,
}

/// Budgets and switches of the agent loop.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AssistantConfig {
    /// Upper bound on SQL repair rounds per generated query
    pub max_debug_attempts: usize,
    pub clarification_enabled: bool,
    pub max_clarification_rounds: usize,
    pub max_chart_attempts: usize,
    /// Rows shown to the model when it drafts a chart
    pub chart_sample_rows: usize,
    /// Re-prompts allowed when a structured answer does not parse
    pub structured_parse_attempts: usize,
}

impl Config {
    /// Loads the configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Resolves a resource path against `data_dir`; absolute paths are kept as they are.
    pub fn data_file(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.data_dir.join(relative)
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.output_path.join("log")
    }

    pub fn answers_dir(&self) -> PathBuf {
        self.output_path.join("answers")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            output_path: PathBuf::from("./output"),
            llm: LLMConfig::default(),
            embedding: EmbeddingConfig::default(),
            warehouse: WarehouseConfig::default(),
            knowledge: KnowledgeConfig::default(),
            cache: CacheConfig::default(),
            assistant: AssistantConfig::default(),
            verbose: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("INSIGHT_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model_efficient: String::from("gpt-4o-mini"),
            model_powerful: String::from("gpt-4o"),
            max_tokens: 16384,
            temperature: 0.0,
            seed: Some(42),
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 120,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_style: EmbeddingApiStyle::default(),
            api_key: std::env::var("INSIGHT_EMBED_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model: String::from("text-embedding-3-small"),
            api_version: String::from("2024-02-01"),
            batch_size: 100,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("INSIGHT_DATABASE_URL").unwrap_or_default(),
            max_connections: 5,
            acquire_timeout_seconds: 30,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            collection_name: String::from("main"),
            documents_file: PathBuf::from("knowledge_documents.json"),
            snapshot_path: PathBuf::from("./output/vector_store/main_collection.json"),
            top_k: 3,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from("./output/cache"),
            expire_hours: 24,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_debug_attempts: 3,
            clarification_enabled: true,
            max_clarification_rounds: 3,
            max_chart_attempts: 4,
            chart_sample_rows: 20,
            structured_parse_attempts: 3,
        }
    }
}

// Include tests
#[cfg(test)]
mod tests;
