use super::*;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_args_default_values() {
    let args = Args::try_parse_from(["insight"]).unwrap();

    assert!(args.question.is_none());
    assert!(args.config.is_none());
    assert!(args.data_dir.is_none());
    assert!(!args.no_clarify);
    assert!(!args.no_cache);
    assert!(!args.verbose);
}

#[test]
fn test_args_short_options() {
    let args = Args::try_parse_from([
        "insight",
        "-q",
        "Which genre has the most views?",
        "-c",
        "/etc/insight.toml",
        "-o",
        "/tmp/answers",
        "-v",
    ])
    .unwrap();

    assert_eq!(args.question.as_deref(), Some("Which genre has the most views?"));
    assert_eq!(args.config, Some(PathBuf::from("/etc/insight.toml")));
    assert_eq!(args.output_path, Some(PathBuf::from("/tmp/answers")));
    assert!(args.verbose);
}

#[test]
fn test_overrides_apply_over_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("insight.toml");
    std::fs::write(
        &config_path,
        r#"
data_dir = "/srv/insight/data"

[llm]
provider = "deepseek"
model_efficient = "deepseek-chat"

[assistant]
max_debug_attempts = 5
"#,
    )
    .unwrap();

    let args = Args::try_parse_from([
        "insight",
        "--config",
        config_path.to_str().unwrap(),
        "--database-url",
        "sqlite://shows.db",
        "--llm-provider",
        "mistral",
        "--model-powerful",
        "mistral-large-latest",
        "--temperature",
        "0.2",
        "--max-tokens",
        "2048",
        "--max-debug-attempts",
        "2",
        "--no-clarify",
        "--no-cache",
    ])
    .unwrap();
    let config = args.into_config().unwrap();

    assert_eq!(config.data_dir, PathBuf::from("/srv/insight/data"));
    assert_eq!(config.warehouse.database_url, "sqlite://shows.db");
    assert_eq!(config.llm.provider, LLMProvider::Mistral);
    assert_eq!(config.llm.model_efficient, "deepseek-chat");
    assert_eq!(config.llm.model_powerful, "mistral-large-latest");
    assert_eq!(config.llm.temperature, 0.2);
    assert_eq!(config.llm.max_tokens, 2048);
    assert_eq!(config.assistant.max_debug_attempts, 2);
    assert!(!config.assistant.clarification_enabled);
    assert!(!config.cache.enabled);
}

#[test]
fn test_unknown_provider_keeps_configured_one() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("custom.toml");
    std::fs::write(&config_path, "[llm]\nprovider = \"anthropic\"\n").unwrap();

    let args = Args::try_parse_from([
        "insight",
        "-c",
        config_path.to_str().unwrap(),
        "--llm-provider",
        "nonsense",
    ])
    .unwrap();

    assert_eq!(args.into_config().unwrap().llm.provider, LLMProvider::Anthropic);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let args = Args::try_parse_from(["insight", "-c", "/definitely/not/here.toml"]).unwrap();

    assert!(args.into_config().is_err());
}
