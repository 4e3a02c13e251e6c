use crate::config::{Config, LLMProvider};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "insight.toml";

/// insight - multi-agent conversational data analytics assistant
#[derive(Parser, Debug)]
#[command(name = "insight (insight-agents)")]
#[command(
    about = "Multi-agent analytics assistant. It plans which agents answer a business question, writes and self-repairs SQL against your warehouse, looks up domain knowledge and builds charts."
)]
#[command(version)]
pub struct Args {
    /// Ask one question; without it an interactive session starts
    #[arg(short, long)]
    pub question: Option<String>,

    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory with the schema, sample queries, chart templates and knowledge documents
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Output path
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// Warehouse connection url (postgres:// or sqlite://)
    #[arg(long)]
    pub database_url: Option<String>,

    /// LLM Provider (openai, deepseek, mistral, anthropic, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// LLM API base URL
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// Efficient model, used for routine agent calls
    #[arg(long)]
    pub model_efficient: Option<String>,

    /// Powerful model, used for very long prompts and as the fallover
    #[arg(long)]
    pub model_powerful: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Maximum tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Upper bound on SQL repair rounds per query
    #[arg(long)]
    pub max_debug_attempts: Option<usize>,

    /// Never ask clarifying questions
    #[arg(long)]
    pub no_clarify: bool,

    /// Disable the prompt cache
    #[arg(long)]
    pub no_cache: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Loads the config: explicit path, then `insight.toml` in the working directory, then defaults
    fn base_config(&self) -> Result<Config> {
        if let Some(config_path) = &self.config {
            return Config::from_file(config_path);
        }

        let default_config_path = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE);
        if default_config_path.exists() {
            Config::from_file(&default_config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Merges the CLI arguments over the loaded config
    pub fn into_config(self) -> Result<Config> {
        let mut config = self.base_config()?;

        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(output_path) = self.output_path {
            config.output_path = output_path;
        }
        if let Some(database_url) = self.database_url {
            config.warehouse.database_url = database_url;
        }

        // LLM overrides
        if let Some(provider_str) = self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                Err(_) => eprintln!(
                    "⚠️ Warning: unknown provider {}, using the default",
                    provider_str
                ),
            }
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(model_efficient) = self.model_efficient {
            config.llm.model_efficient = model_efficient;
        }
        if let Some(model_powerful) = self.model_powerful {
            config.llm.model_powerful = model_powerful;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }

        if let Some(max_debug_attempts) = self.max_debug_attempts {
            config.assistant.max_debug_attempts = max_debug_attempts;
        }
        if self.no_clarify {
            config.assistant.clarification_enabled = false;
        }

        // cache
        if self.no_cache {
            config.cache.enabled = false;
        }

        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}

// Include tests
#[cfg(test)]
mod tests;
