use std::sync::Arc;

use tokio::sync::RwLock;

use crate::assistant::resources::Resources;
use crate::cache::CacheManager;
use crate::config::Config;
use crate::knowledge::{Embedder, VectorStore};
use crate::llm::ChatModel;
use crate::warehouse::QueryExecutor;

/// Shared state handed to every agent.
#[derive(Clone)]
pub struct AssistantContext {
    /// Language model
    pub model: Arc<dyn ChatModel>,
    /// Warehouse query executor
    pub warehouse: Arc<dyn QueryExecutor>,
    /// Embeds knowledge lookups
    pub embedder: Arc<dyn Embedder>,
    pub knowledge: Arc<VectorStore>,
    pub resources: Arc<Resources>,
    pub config: Config,
    /// Prompt cache
    pub cache_manager: Arc<RwLock<CacheManager>>,
}

impl AssistantContext {
    pub fn new(
        config: Config,
        model: Arc<dyn ChatModel>,
        warehouse: Arc<dyn QueryExecutor>,
        embedder: Arc<dyn Embedder>,
        knowledge: VectorStore,
        resources: Resources,
    ) -> Self {
        let cache_manager = Arc::new(RwLock::new(CacheManager::new(config.cache.clone())));
        Self {
            model,
            warehouse,
            embedder,
            knowledge: Arc::new(knowledge),
            resources: Arc::new(resources),
            config,
            cache_manager,
        }
    }
}
