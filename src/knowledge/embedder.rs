//! Embedding endpoint client

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::{EmbeddingApiStyle, EmbeddingConfig};

/// Turns texts into embedding vectors, one vector per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// OpenAI-style or Azure-deployment embedding API over reqwest.
pub struct HttpEmbedder {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build embedding http client")?;
        Ok(Self { http, config })
    }

    /// Endpoint url for the configured api style.
    pub fn endpoint(&self) -> String {
        let base = self.config.api_base_url.trim_end_matches('/');
        match self.config.api_style {
            EmbeddingApiStyle::OpenAI => format!("{}/embeddings", base),
            EmbeddingApiStyle::Azure => format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                base, self.config.model, self.config.api_version
            ),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = match self.config.api_style {
            EmbeddingApiStyle::OpenAI => self
                .http
                .post(self.endpoint())
                .bearer_auth(&self.config.api_key)
                .json(&json!({ "model": self.config.model, "input": texts })),
            EmbeddingApiStyle::Azure => self
                .http
                .post(self.endpoint())
                .header("api-key", &self.config.api_key)
                .json(&json!({ "input": texts })),
        };

        let response = request
            .send()
            .await
            .context("Embedding request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Embedding endpoint returned {}: {}", status, body);
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Embedding response is not valid JSON")?;
        if parsed.data.len() != texts.len() {
            bail!(
                "Embedding endpoint returned {} vectors for {} texts",
                parsed.data.len(),
                texts.len()
            );
        }
        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_endpoint() {
        let embedder = HttpEmbedder::new(EmbeddingConfig {
            api_base_url: "https://api.example.com/v1/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(embedder.endpoint(), "https://api.example.com/v1/embeddings");
    }

    #[test]
    fn test_azure_endpoint() {
        let embedder = HttpEmbedder::new(EmbeddingConfig {
            api_style: EmbeddingApiStyle::Azure,
            api_base_url: "https://corp.openai.azure.com".to_string(),
            model: "embed-large".to_string(),
            api_version: "2024-02-01".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            embedder.endpoint(),
            "https://corp.openai.azure.com/openai/deployments/embed-large/embeddings?api-version=2024-02-01"
        );
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        let embedder = HttpEmbedder::new(EmbeddingConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }
}
