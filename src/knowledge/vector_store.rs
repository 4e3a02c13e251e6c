//! In-process vector collection with cosine similarity search and JSON snapshots

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// One embedded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbour match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

/// Column-oriented snapshot file layout.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    #[serde(default)]
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    #[serde(default)]
    pub metadatas: Vec<Option<Map<String, Value>>>,
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub execution_time_seconds: f64,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    name: String,
    documents: Vec<StoredDocument>,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

impl VectorStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Adds a document; its embedding must match the dimension of the ones already stored.
    pub fn add(&mut self, document: StoredDocument) -> Result<()> {
        if let Some(first) = self.documents.first()
            && first.embedding.len() != document.embedding.len()
        {
            bail!(
                "Embedding dimension {} does not match collection dimension {}",
                document.embedding.len(),
                first.embedding.len()
            );
        }
        self.documents.push(document);
        Ok(())
    }

    /// The `top_k` documents closest to `embedding`, best first.
    pub fn query(&self, embedding: &[f32], top_k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(f32, &StoredDocument)> = self
            .documents
            .iter()
            .map(|doc| (cosine_similarity(embedding, &doc.embedding), doc))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, doc)| SearchHit {
                id: doc.id.clone(),
                document: doc.document.clone(),
                metadata: doc.metadata.clone(),
                score,
            })
            .collect()
    }

    pub fn to_snapshot(&self, execution_time_seconds: f64) -> CollectionSnapshot {
        CollectionSnapshot {
            ids: self.documents.iter().map(|d| d.id.clone()).collect(),
            documents: self.documents.iter().map(|d| d.document.clone()).collect(),
            metadatas: self
                .documents
                .iter()
                .map(|d| Some(d.metadata.clone()))
                .collect(),
            embeddings: self.documents.iter().map(|d| d.embedding.clone()).collect(),
            execution_time_seconds,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn from_snapshot(name: impl Into<String>, snapshot: CollectionSnapshot) -> Result<Self> {
        if snapshot.documents.len() != snapshot.embeddings.len() {
            bail!(
                "Snapshot holds {} documents but {} embeddings",
                snapshot.documents.len(),
                snapshot.embeddings.len()
            );
        }
        let mut store = Self::new(name);
        for (i, (document, embedding)) in snapshot
            .documents
            .into_iter()
            .zip(snapshot.embeddings)
            .enumerate()
        {
            let id = snapshot
                .ids
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("vector_{}", i));
            let metadata = snapshot
                .metadatas
                .get(i)
                .cloned()
                .flatten()
                .unwrap_or_default();
            store.add(StoredDocument {
                id,
                document,
                metadata,
                embedding,
            })?;
        }
        Ok(store)
    }

    pub fn save(&self, path: &Path, execution_time_seconds: f64) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create snapshot directory {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(&self.to_snapshot(execution_time_seconds))?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write snapshot {:?}", path))?;
        Ok(())
    }

    pub fn load(name: impl Into<String>, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {:?}", path))?;
        let snapshot: CollectionSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {:?}", path))?;
        Self::from_snapshot(name, snapshot)
    }
}
