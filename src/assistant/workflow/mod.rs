use anyhow::{Context, Result};
use chrono::Local;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::assistant::agents::clarification::{StdinChannel, UserChannel, read_stdin_line};
use crate::assistant::context::AssistantContext;
use crate::assistant::dispatcher::AnswerReport;
use crate::assistant::resources::Resources;
use crate::assistant::router::Router;
use crate::cache::CachePerformanceReport;
use crate::config::Config;
use crate::knowledge::{HttpEmbedder, KnowledgeBase, VectorStore};
use crate::llm::{ChatModel, LLMClient};
use crate::warehouse::SqlWarehouse;

const EXIT_COMMANDS: [&str; 2] = ["exit", "quit"];

pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    EXIT_COMMANDS.iter().any(|c| c.eq_ignore_ascii_case(input))
}

/// Builds the session context: resources, warehouse pool, embedder and knowledge base around `model`.
///
/// A knowledge base that cannot be opened degrades to an empty store.
pub async fn build_context(config: &Config, model: Arc<dyn ChatModel>) -> Result<AssistantContext> {
    let resources = Resources::load(config)?;
    let warehouse = SqlWarehouse::connect(&config.warehouse).await?;
    let embedder = Arc::new(HttpEmbedder::new(config.embedding.clone())?);

    let knowledge = match KnowledgeBase::open(config, embedder.as_ref()).await {
        Ok(store) => store,
        Err(e) => {
            warn!("failed to open the knowledge base, continuing without it: {}", e);
            VectorStore::new(&config.knowledge.collection_name)
        }
    };

    Ok(AssistantContext::new(
        config.clone(),
        model,
        Arc::new(warehouse),
        embedder,
        knowledge,
        resources,
    ))
}

/// Writes the report as pretty JSON under `<output>/answers/` and returns the file path.
pub fn save_report(config: &Config, report: &AnswerReport) -> Result<PathBuf> {
    let answers_dir = config.answers_dir();
    std::fs::create_dir_all(&answers_dir)
        .with_context(|| format!("Failed to create answers directory {:?}", answers_dir))?;

    let id = uuid::Uuid::new_v4().simple().to_string();
    let file_name = format!(
        "answer_{}_{}.json",
        Local::now().format("%Y%m%d_%H%M%S"),
        &id[..8]
    );
    let path = answers_dir.join(file_name);
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write answer {:?}", path))?;
    Ok(path)
}

/// Routes one question, prints the report and saves it.
pub async fn answer(
    context: &AssistantContext,
    router: &Router,
    channel: Option<&dyn UserChannel>,
    question: &str,
) -> Result<AnswerReport> {
    let report = router.route_question(context, channel, question).await?;

    println!("\n📊 Answer:\n{}", serde_json::to_string_pretty(&report)?);
    let path = save_report(&context.config, &report)?;
    println!("💾 Answer saved to {}", path.display());
    info!(path = %path.display(), "answer saved");

    Ok(report)
}

async fn run_repl(context: &AssistantContext, router: &Router, channel: &dyn UserChannel) -> Result<()> {
    println!("💬 Ask a question about your data. Type 'exit' or 'quit' to leave.");
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = read_stdin_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit_command(question) {
            break;
        }

        if let Err(e) = answer(context, router, Some(channel), question).await {
            error!("failed to answer question: {}", e);
            println!("❌ {}", e);
        }
    }
    println!("👋 Goodbye!");
    Ok(())
}

/// Logs the session's cache totals and per-category hit rates.
async fn log_cache_report(context: &AssistantContext) -> Option<CachePerformanceReport> {
    let cache = context.cache_manager.read().await;
    if !cache.is_enabled() {
        return None;
    }
    let report = cache.generate_performance_report();
    info!(
        hit_rate = report.hit_rate,
        hits = report.cache_hits,
        misses = report.cache_misses,
        writes = report.cache_writes,
        errors = report.cache_errors,
        input_tokens_saved = report.input_tokens_saved,
        output_tokens_saved = report.output_tokens_saved,
        "prompt cache report"
    );
    let mut categories: Vec<_> = report.category_stats.iter().collect();
    categories.sort_by(|a, b| a.0.cmp(b.0));
    for (category, stats) in categories {
        info!(
            category = %category,
            hits = stats.hits,
            misses = stats.misses,
            hit_rate = stats.hit_rate,
            "prompt cache category"
        );
    }
    Some(report)
}

/// Starts a session: one answer for `question`, otherwise an interactive session.
pub async fn launch(config: &Config, question: Option<String>) -> Result<()> {
    let client = LLMClient::new(config.llm.clone())?;
    client.check_connection().await?;

    let context = build_context(config, Arc::new(client)).await?;
    let router = Router::new();
    let channel = StdinChannel;

    let outcome = match question {
        Some(question) => answer(&context, &router, Some(&channel), &question)
            .await
            .map(|_| ()),
        None => run_repl(&context, &router, &channel).await,
    };

    log_cache_report(&context).await;
    outcome
}
