use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::assistant::agent_executor::{AgentExecuteParams, prompt};
use crate::assistant::context::AssistantContext;
use crate::knowledge::SearchHit;

pub const TAG: &str = "knowledge_agent";

const SYSTEM_PROMPT: &str = "You are an expert knowledge agent working with a few other agents to answer \
a user's question about the business. You are asked a general question and answer it. The question may \
have been looked up in a knowledge base of company terms; use those results when they help.";

/// Knowledge lookup: nearest documents from the vector store as optional context for the model.
#[derive(Default)]
pub struct KnowledgeAgent;

impl KnowledgeAgent {
    pub async fn lookup(
        &self,
        context: &AssistantContext,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let embeddings = context.embedder.embed(&[query.to_string()]).await?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("the embedder returned no vector for the query"))?;
        Ok(context.knowledge.query(&embedding, top_k))
    }

    fn format_hits(hits: &[SearchHit]) -> String {
        if hits.is_empty() {
            return String::from("(no related documents)");
        }
        hits.iter()
            .enumerate()
            .map(|(i, hit)| format!("{}. {} (similarity {:.3})", i + 1, hit.document, hit.score))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Answers `query`; a failed lookup degrades to answering without context.
    pub async fn ask(&self, context: &AssistantContext, query: &str, top_k: usize) -> Result<String> {
        let hits = match self.lookup(context, query, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("knowledge lookup failed, answering without context: {}", e);
                Vec::new()
            }
        };
        info!(hits = hits.len(), "knowledge lookup finished");

        let user_prompt = format!(
            "Here are the {} documents closest to the user's query in the knowledge base:\n{}\n\n\
             They are simply the nearest documents and may or may not be related, so use them only if they help.\n\
             User query: {}\n\n\
             Give a smooth answer and do not mention that a knowledge base lookup took place.",
            top_k,
            Self::format_hits(&hits),
            query
        );

        prompt(context, AgentExecuteParams::new(TAG, SYSTEM_PROMPT, user_prompt)).await
    }
}
