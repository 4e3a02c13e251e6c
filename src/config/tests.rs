use crate::config::{
    AssistantConfig, CacheConfig, Config, EmbeddingApiStyle, KnowledgeConfig, LLMConfig,
    LLMProvider,
};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.data_dir, PathBuf::from("./data"));
    assert_eq!(config.output_path, PathBuf::from("./output"));
    assert!(!config.verbose);
    assert_eq!(config.log_dir(), PathBuf::from("./output/log"));
    assert_eq!(config.answers_dir(), PathBuf::from("./output/answers"));
}

#[test]
fn test_llm_provider_default() {
    assert_eq!(LLMProvider::default(), LLMProvider::OpenAI);
}

#[test]
fn test_llm_provider_from_str() {
    assert_eq!("openai".parse::<LLMProvider>().unwrap(), LLMProvider::OpenAI);
    assert_eq!(
        "DeepSeek".parse::<LLMProvider>().unwrap(),
        LLMProvider::DeepSeek
    );
    assert_eq!("mistral".parse::<LLMProvider>().unwrap(), LLMProvider::Mistral);
    assert_eq!(
        "anthropic".parse::<LLMProvider>().unwrap(),
        LLMProvider::Anthropic
    );
    assert_eq!("ollama".parse::<LLMProvider>().unwrap(), LLMProvider::Ollama);

    assert!("azure".parse::<LLMProvider>().is_err());
}

#[test]
fn test_llm_provider_display_round_trips() {
    for provider in [
        LLMProvider::OpenAI,
        LLMProvider::DeepSeek,
        LLMProvider::Mistral,
        LLMProvider::Anthropic,
        LLMProvider::Ollama,
    ] {
        assert_eq!(provider.to_string().parse::<LLMProvider>().unwrap(), provider);
    }
}

#[test]
fn test_llm_config_default() {
    let config = LLMConfig::default();

    assert_eq!(config.provider, LLMProvider::OpenAI);
    assert!(!config.api_base_url.is_empty());
    assert!(!config.model_efficient.is_empty());
    assert!(!config.model_powerful.is_empty());
    assert_eq!(config.temperature, 0.0);
    assert_eq!(config.seed, Some(42));
    assert_eq!(config.retry_attempts, 3);
}

#[test]
fn test_assistant_budgets_default() {
    let config = AssistantConfig::default();

    assert_eq!(config.max_debug_attempts, 3);
    assert_eq!(config.max_clarification_rounds, 3);
    assert_eq!(config.max_chart_attempts, 4);
    assert_eq!(config.chart_sample_rows, 20);
    assert!(config.clarification_enabled);
}

#[test]
fn test_knowledge_and_cache_default() {
    let knowledge = KnowledgeConfig::default();
    assert_eq!(knowledge.collection_name, "main");
    assert_eq!(knowledge.top_k, 3);

    let cache = CacheConfig::default();
    assert!(cache.enabled);
    assert_eq!(cache.expire_hours, 24);
}

#[test]
fn test_embedding_style_from_str() {
    assert_eq!(
        "azure".parse::<EmbeddingApiStyle>().unwrap(),
        EmbeddingApiStyle::Azure
    );
    assert_eq!(
        "OpenAI".parse::<EmbeddingApiStyle>().unwrap(),
        EmbeddingApiStyle::OpenAI
    );
    assert!("chroma".parse::<EmbeddingApiStyle>().is_err());
}

#[test]
fn test_data_file_resolution() {
    let config = Config {
        data_dir: PathBuf::from("/srv/insight/data"),
        ..Default::default()
    };

    assert_eq!(
        config.data_file("sql_schema.txt"),
        PathBuf::from("/srv/insight/data/sql_schema.txt")
    );
    assert_eq!(
        config.data_file("/etc/schema.txt"),
        PathBuf::from("/etc/schema.txt")
    );
}

#[test]
fn test_from_file_partial_toml_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("insight.toml");
    std::fs::write(
        &path,
        r#"
data_dir = "/opt/data"

[llm]
provider = "deepseek"
model_efficient = "deepseek-chat"

[assistant]
max_debug_attempts = 5
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.data_dir, PathBuf::from("/opt/data"));
    assert_eq!(config.llm.provider, LLMProvider::DeepSeek);
    assert_eq!(config.llm.model_efficient, "deepseek-chat");
    assert_eq!(config.llm.retry_attempts, 3);
    assert_eq!(config.assistant.max_debug_attempts, 5);
    assert_eq!(config.assistant.max_chart_attempts, 4);
    assert_eq!(config.knowledge.top_k, 3);
}

#[test]
fn test_from_file_missing() {
    let result = Config::from_file(&PathBuf::from("/nonexistent/insight.toml"));
    assert!(result.is_err());
}

#[test]
fn test_from_file_invalid_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[llm\nprovider = ").unwrap();

    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_example_config_parses() {
    let config: Config = toml::from_str(include_str!("../../insight.example.toml")).unwrap();

    assert_eq!(config.embedding.api_style, EmbeddingApiStyle::OpenAI);
    assert_eq!(config.warehouse.database_url, "sqlite://./data/shows.db");
    assert_eq!(config.assistant.max_chart_attempts, 4);
    assert_eq!(config.llm.seed, Some(42));
}
