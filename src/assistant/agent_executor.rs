use anyhow::Result;
use schemars::JsonSchema;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::assistant::context::AssistantContext;
use crate::llm::client::utils::estimate_token_usage;
use crate::llm::{ChatRequest, structured};

pub struct AgentExecuteParams {
    pub prompt_sys: String,
    pub prompt_user: String,
    /// Cache category directory
    pub cache_scope: String,
    /// Agent role, used as the request tag
    pub log_tag: String,
}

impl AgentExecuteParams {
    pub fn new(tag: &str, prompt_sys: impl Into<String>, prompt_user: impl Into<String>) -> Self {
        Self {
            prompt_sys: prompt_sys.into(),
            prompt_user: prompt_user.into(),
            cache_scope: tag.replace('.', "/"),
            log_tag: tag.to_string(),
        }
    }

    fn request(&self) -> ChatRequest {
        ChatRequest::new(&self.log_tag, &self.prompt_sys, &self.prompt_user)
    }
}

async fn cached<T>(context: &AssistantContext, scope: &str, prompt_key: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    let cache = context.cache_manager.read().await;
    match cache.get::<T>(scope, prompt_key).await {
        Ok(hit) => hit,
        Err(e) => {
            warn!(scope, "cache lookup failed: {}", e);
            None
        }
    }
}

async fn store<T>(context: &AssistantContext, scope: &str, prompt_key: &str, value: &T, output: &str)
where
    T: Serialize,
{
    let usage = estimate_token_usage(prompt_key, output);
    let cache = context.cache_manager.read().await;
    if let Err(e) = cache.set_with_tokens(scope, prompt_key, value, usage).await {
        warn!(scope, "cache write failed: {}", e);
    }
}

/// Plain text completion, served from the prompt cache when possible.
pub async fn prompt(context: &AssistantContext, params: AgentExecuteParams) -> Result<String> {
    prompt_checked(context, params, |raw| Ok(raw.to_string())).await?
}

/// Text completion turned into `T` by `accept`.
///
/// The outer error is a failed model call. The inner one is `accept` rejecting
/// the answer. Only accepted answers are cached, and a cached answer that
/// `accept` rejects is asked for again.
pub async fn prompt_checked<T, F>(
    context: &AssistantContext,
    params: AgentExecuteParams,
    accept: F,
) -> Result<Result<T>>
where
    T: Send,
    F: Fn(&str) -> Result<T> + Send + Sync,
{
    let request = params.request();
    let prompt_key = request.full_prompt();

    if let Some(hit) = cached::<String>(context, &params.cache_scope, &prompt_key).await {
        match accept(&hit) {
            Ok(value) => {
                debug!(tag = %params.log_tag, "answer served from cache");
                return Ok(Ok(value));
            }
            Err(e) => warn!(tag = %params.log_tag, "cached answer rejected, asking again: {}", e),
        }
    }

    let answer = context.model.complete(&request).await?;
    let accepted = accept(&answer);
    if accepted.is_ok() {
        store(context, &params.cache_scope, &prompt_key, &answer, &answer).await;
    }
    Ok(accepted)
}

/// Structured completion parsed into `T`, served from the prompt cache when possible.
pub async fn extract<T>(context: &AssistantContext, params: AgentExecuteParams) -> Result<T>
where
    T: JsonSchema + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let request = params.request();
    let prompt_key = request.full_prompt();

    if let Some(hit) = cached::<T>(context, &params.cache_scope, &prompt_key).await {
        debug!(tag = %params.log_tag, "structured answer served from cache");
        return Ok(hit);
    }

    let attempts = context.config.assistant.structured_parse_attempts;
    let value: T = structured::extract(context.model.as_ref(), &request, attempts).await?;
    let rendered = serde_json::to_string(&value)?;
    store(context, &params.cache_scope, &prompt_key, &value, &rendered).await;
    Ok(value)
}
