//! Hosted model client built on rig-core providers

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::LLMConfig;
use crate::llm::client::utils::evaluate_befitting_model;
use crate::llm::structured::StructuredTarget;
use crate::llm::{ChatModel, ChatRequest};

pub mod providers;
pub mod types;
pub mod utils;

use providers::ProviderClient;

/// Model client with timeout, retry and fallover to the second model.
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(&config)?;
        Ok(Self { client, config })
    }

    /// Sends a tiny prompt to make sure the provider answers at all.
    pub async fn check_connection(&self) -> Result<()> {
        info!(provider = %self.config.provider, "checking model connection");
        let request = ChatRequest::new("connection_check", "You are a helpful assistant.", "Hello");
        match self.complete(&request).await {
            Ok(_) => {
                info!("model connection is healthy");
                Ok(())
            }
            Err(e) => {
                warn!("model connection failed: {}", e);
                Err(e)
            }
        }
    }

    /// Runs `operation` under the call timeout, retrying with a fixed delay.
    async fn retry_with_backoff<T, F, Fut>(&self, tag: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay = Duration::from_millis(self.config.retry_delay_ms);
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let mut retries = 0;

        loop {
            let attempt = match tokio::time::timeout(timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!("model call timed out after {:?}", timeout)),
            };
            match attempt {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries += 1;
                    warn!(
                        tag,
                        "model call failed, attempt {} / {}: {}", retries, max_retries, err
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    /// Calls the befitting model, then the fallover model once its retries run out.
    ///
    /// The fallover call sees the first error appended to the user prompt.
    async fn with_fallover<T, F, Fut>(&self, request: &ChatRequest, call: F) -> Result<T>
    where
        F: Fn(String, String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (model, fallover_model) = evaluate_befitting_model(
            &self.config,
            &request.system_prompt,
            &request.user_prompt,
        );

        let first = self
            .retry_with_backoff(&request.tag, || {
                call(model.clone(), request.user_prompt.clone())
            })
            .await;
        let error = match first {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        let Some(fallover) = fallover_model else {
            return Err(error);
        };
        warn!(
            tag = %request.tag,
            "model {} failed {} times, falling over to {}: {}",
            model, self.config.retry_attempts, fallover, error
        );
        let user_prompt = format!(
            "{}\n\nNote: the previous call failed with \"{}\". Avoid repeating that error.",
            request.user_prompt, error
        );
        self.retry_with_backoff(&request.tag, || {
            call(fallover.clone(), user_prompt.clone())
        })
        .await
    }
}

#[async_trait]
impl ChatModel for LLMClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.with_fallover(request, |model, user_prompt| async move {
            let agent = self
                .client
                .create_agent(&model, &request.system_prompt, &self.config);
            agent.prompt(&user_prompt).await
        })
        .await
    }

    /// Uses the provider's structured output through a rig extractor.
    async fn extract(
        &self,
        request: &ChatRequest,
        target: &dyn StructuredTarget,
    ) -> Result<Value> {
        self.with_fallover(request, |model, user_prompt| async move {
            target
                .extract_with(
                    &self.client,
                    &model,
                    &request.system_prompt,
                    &user_prompt,
                    &self.config,
                )
                .await
        })
        .await
    }
}
