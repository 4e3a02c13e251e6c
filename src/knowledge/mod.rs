//! Knowledge base: seed documents embedded into an in-process vector store, persisted as a JSON snapshot

use anyhow::{Context, Result};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;

pub mod embedder;
pub mod vector_store;

pub use embedder::{Embedder, HttpEmbedder};
pub use vector_store::{SearchHit, StoredDocument, VectorStore};

/// Embedding requests in flight while seeding.
const EMBED_PARALLELS: usize = 4;

/// One entry of the seed documents file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDocument {
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

pub fn load_seed_documents(path: &Path) -> Result<Vec<SeedDocument>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge documents {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse knowledge documents {:?}", path))
}

/// A freshly embedded store and how many of its batches were rejected.
pub struct SeededStore {
    pub store: VectorStore,
    pub failed_batches: usize,
}

impl SeededStore {
    /// True when every batch was embedded.
    pub fn is_complete(&self) -> bool {
        self.failed_batches == 0
    }
}

/// Embeds `documents` in batches of `batch_size` and collects them into a store.
///
/// Up to `EMBED_PARALLELS` batches are embedded at once; ids follow document order.
/// Blank documents are dropped. A batch the endpoint rejects is logged, counted
/// and skipped, the remaining batches still land in the store.
pub async fn build_store(
    name: &str,
    documents: &[SeedDocument],
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<SeededStore> {
    let kept: Vec<&SeedDocument> = documents
        .iter()
        .filter(|doc| !doc.text.trim().is_empty())
        .collect();

    let mut store = VectorStore::new(name);
    let mut next_id = 0usize;
    let mut failed_batches = 0usize;

    let batch_size = batch_size.max(1);
    let mut embedded = stream::iter(kept.chunks(batch_size).enumerate())
        .map(|(batch_index, batch)| async move {
            let texts: Vec<String> = batch.iter().map(|doc| doc.text.clone()).collect();
            (batch_index, batch, embedder.embed(&texts).await)
        })
        .buffered(EMBED_PARALLELS);

    while let Some((batch_index, batch, outcome)) = embedded.next().await {
        match outcome {
            Ok(embeddings) => {
                for (doc, embedding) in batch.iter().zip(embeddings) {
                    store.add(StoredDocument {
                        id: format!("vector_{}", next_id),
                        document: doc.text.clone(),
                        metadata: doc.metadata.clone(),
                        embedding,
                    })?;
                    next_id += 1;
                }
            }
            Err(e) => {
                failed_batches += 1;
                error!(
                    batch = batch_index,
                    start = batch_index * batch_size,
                    "failed to embed knowledge batch: {}",
                    e
                );
            }
        }
    }

    Ok(SeededStore {
        store,
        failed_batches,
    })
}

pub struct KnowledgeBase;

impl KnowledgeBase {
    /// Loads the snapshot when present, otherwise embeds the seed documents and writes the snapshot.
    ///
    /// Missing seed documents yield an empty store. A seeding run with rejected
    /// batches is served but not written, so the next start seeds again.
    pub async fn open(config: &Config, embedder: &dyn Embedder) -> Result<VectorStore> {
        let knowledge = &config.knowledge;
        let snapshot_path = &knowledge.snapshot_path;

        if snapshot_path.is_file() {
            let store = VectorStore::load(&knowledge.collection_name, snapshot_path)?;
            info!(
                collection = %store.name(),
                documents = store.len(),
                "loaded knowledge snapshot"
            );
            return Ok(store);
        }

        let documents_path = config.data_file(&knowledge.documents_file);
        if !documents_path.is_file() {
            warn!(
                "no knowledge snapshot or seed documents found at {:?}, knowledge lookups will have no context",
                documents_path
            );
            return Ok(VectorStore::new(&knowledge.collection_name));
        }

        let started = Instant::now();
        let documents = load_seed_documents(&documents_path)?;
        let seeded = build_store(
            &knowledge.collection_name,
            &documents,
            embedder,
            config.embedding.batch_size,
        )
        .await?;
        let elapsed = started.elapsed().as_secs_f64();

        let complete = seeded.is_complete();
        let store = seeded.store;
        if !complete {
            warn!(
                collection = %store.name(),
                documents = store.len(),
                failed_batches = seeded.failed_batches,
                "knowledge seeding incomplete, snapshot not written"
            );
            return Ok(store);
        }

        store.save(snapshot_path, elapsed)?;
        info!(
            collection = %store.name(),
            documents = store.len(),
            elapsed_seconds = elapsed,
            "knowledge snapshot written to {:?}",
            snapshot_path
        );
        Ok(store)
    }
}
