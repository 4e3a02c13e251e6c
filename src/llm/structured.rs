//! Structured answers: typed extraction against a schemars schema

use anyhow::Result;
use async_trait::async_trait;
use schemars::{JsonSchema, Schema};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::warn;

use crate::assistant::AssistantError;
use crate::config::LLMConfig;
use crate::llm::client::providers::ProviderClient;
use crate::llm::{ChatModel, ChatRequest};

/// The type a structured call should produce, usable behind `dyn`.
#[async_trait]
pub trait StructuredTarget: Send + Sync {
    fn schema(&self) -> Schema;

    /// Runs a provider extractor for the target type and returns its answer as JSON.
    async fn extract_with(
        &self,
        client: &ProviderClient,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        config: &LLMConfig,
    ) -> Result<Value>;
}

pub struct Target<T>(PhantomData<fn() -> T>);

impl<T> Target<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Target<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> StructuredTarget for Target<T>
where
    T: JsonSchema + DeserializeOwned + Serialize + Send + Sync + 'static,
{
    fn schema(&self) -> Schema {
        schemars::schema_for!(T)
    }

    async fn extract_with(
        &self,
        client: &ProviderClient,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        config: &LLMConfig,
    ) -> Result<Value> {
        let extractor = client.create_extractor::<T>(model, system_prompt, config);
        let answer = extractor.extract(user_prompt).await?;
        Ok(serde_json::to_value(answer)?)
    }
}

/// Cuts a model answer down to its outermost JSON object.
///
/// Returns the trimmed input unchanged when it holds no `{ ... }` pair.
pub fn clean_json(input: &str) -> &str {
    match (input.find('{'), input.rfind('}')) {
        (Some(start), Some(end)) if start < end => input[start..=end].trim(),
        _ => input.trim(),
    }
}

/// Removes markdown code fences and a leading language tag.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if !trimmed.contains("```") {
        return trimmed.to_string();
    }
    let mut lines = Vec::new();
    for line in trimmed.lines() {
        if line.trim_start().starts_with("```") {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

/// Parses a model answer as `T`, tolerating fences and surrounding prose.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let unfenced = strip_code_fences(raw);
    match serde_json::from_str::<T>(&unfenced) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::from_str::<T>(clean_json(&unfenced)),
    }
}

/// The answer-format rules for a text-only model, carrying the target schema.
pub fn schema_instruction(schema: &Schema) -> String {
    let schema_text = serde_json::to_string_pretty(schema).unwrap_or_default();
    format!(
        "Respond with a single JSON object that validates against this JSON schema, \
         with no commentary, code fences or trailing text:\n{}",
        schema_text
    )
}

/// Structured output for models without a native extractor: prompt with the
/// schema and parse the text answer.
pub async fn extract_from_text<M>(
    model: &M,
    request: &ChatRequest,
    target: &dyn StructuredTarget,
) -> Result<Value>
where
    M: ChatModel + ?Sized,
{
    let system_prompt = format!(
        "{}\n\n{}",
        request.system_prompt,
        schema_instruction(&target.schema())
    );
    let text_request = ChatRequest::new(&request.tag, &system_prompt, &request.user_prompt);
    let raw = model.complete(&text_request).await?;
    parse_structured::<Value>(&raw).map_err(|e| {
        AssistantError::UnparsableOutput {
            tag: request.tag.clone(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Asks the model for a `T`, re-prompting with the parse error up to `attempts` times.
///
/// Answers that are JSON but do not fit `T` are re-prompted like unparsable ones.
/// Any other model error is returned at once.
pub async fn extract<T>(model: &dyn ChatModel, request: &ChatRequest, attempts: usize) -> Result<T>
where
    T: JsonSchema + DeserializeOwned + Serialize + Send + Sync + 'static,
{
    let target = Target::<T>::new();
    let mut user_prompt = request.user_prompt.clone();
    let mut last_error = String::new();

    for attempt in 1..=attempts.max(1) {
        let attempt_request = ChatRequest::new(&request.tag, &request.system_prompt, &user_prompt);
        let reason = match model.extract(&attempt_request, &target).await {
            Ok(value) => match serde_json::from_value::<T>(value) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => e.to_string(),
            },
            Err(e) => match e.downcast_ref::<AssistantError>() {
                Some(AssistantError::UnparsableOutput { reason, .. }) => reason.clone(),
                _ => return Err(e),
            },
        };

        warn!(
            tag = %request.tag,
            "structured answer did not parse (attempt {}): {}", attempt, reason
        );
        user_prompt = format!(
            "{}\n\nYour previous answer could not be parsed as JSON ({}). \
             Return only the JSON object.",
            request.user_prompt, reason
        );
        last_error = reason;
    }

    Err(AssistantError::UnparsableOutput {
        tag: request.tag.clone(),
        reason: last_error,
    }
    .into())
}
