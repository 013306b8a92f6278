use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::loader::{fetch_document, Document};
use super::splitter::TextSplitter;
use super::store::{StoredChunk, VectorStore};
use crate::core::config::settings::VectorSettings;
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

const META_MODEL: &str = "embedding_model";
const META_FINGERPRINT: &str = "source_fingerprint";
const META_BUILT_AT: &str = "built_at";
const META_DOCUMENTS: &str = "document_count";

#[derive(Debug, Clone, Serialize)]
pub struct VectorInfo {
    pub initialized: bool,
    pub store_type: &'static str,
    pub tool_name: String,
    pub documents: usize,
    pub chunks: usize,
    pub loaded_from_cache: bool,
    pub cache_enabled: bool,
    pub cache_path: Option<String>,
}

struct ReadyIndex {
    store: VectorStore,
    documents: usize,
    chunks: usize,
    loaded_from_cache: bool,
}

/// Retrieval index over the configured documentation pages.
///
/// Starts empty; [`VectorService::initialize`] either reuses a fresh disk
/// cache or fetches, splits and embeds every URL. Until that succeeds the
/// service reports not-ready and the retriever tool is not offered.
pub struct VectorService {
    settings: VectorSettings,
    embedding_model: String,
    provider: Arc<dyn LlmProvider>,
    cache_path: PathBuf,
    urls: Vec<String>,
    index: RwLock<Option<ReadyIndex>>,
}

impl VectorService {
    pub fn new(
        settings: VectorSettings,
        embedding_model: String,
        provider: Arc<dyn LlmProvider>,
        cache_dir: PathBuf,
        urls: Vec<String>,
    ) -> Self {
        Self {
            settings,
            embedding_model,
            provider,
            cache_path: cache_dir.join("index.db"),
            urls,
            index: RwLock::new(None),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.settings.tool_name
    }

    pub fn tool_description(&self) -> &str {
        &self.settings.tool_description
    }

    pub async fn is_ready(&self) -> bool {
        self.index.read().await.is_some()
    }

    pub async fn initialize(&self) -> Result<(), ApiError> {
        if self.is_ready().await {
            tracing::info!("Vector store already initialized");
            return Ok(());
        }
        if self.urls.is_empty() {
            return Err(ApiError::ServiceUnavailable(
                "No URLs configured for the vector store".to_string(),
            ));
        }

        let fingerprint = source_fingerprint(&self.urls);

        let store = if self.settings.cache_enabled {
            let store = VectorStore::open(&self.cache_path).await?;
            if let Some(documents) = self.cached_documents(&store, &fingerprint).await? {
                let chunks = store.count().await?;
                tracing::info!(
                    "Loaded vector index from cache {} ({} chunks)",
                    self.cache_path.display(),
                    chunks
                );
                *self.index.write().await = Some(ReadyIndex {
                    store,
                    documents,
                    chunks,
                    loaded_from_cache: true,
                });
                return Ok(());
            }
            store.clear().await?;
            store
        } else {
            VectorStore::in_memory().await?
        };

        let (documents, chunks) = self.build(&store, &fingerprint).await?;
        *self.index.write().await = Some(ReadyIndex {
            store,
            documents,
            chunks,
            loaded_from_cache: false,
        });
        Ok(())
    }

    /// Document count of a reusable cache, or `None` when it must be
    /// rebuilt (empty, other model, other URL set, or older than the TTL).
    async fn cached_documents(
        &self,
        store: &VectorStore,
        fingerprint: &str,
    ) -> Result<Option<usize>, ApiError> {
        if store.count().await? == 0 {
            return Ok(None);
        }
        if store.get_meta(META_MODEL).await?.as_deref() != Some(self.embedding_model.as_str()) {
            tracing::info!("Vector cache was built with another embedding model; rebuilding");
            return Ok(None);
        }
        if store.get_meta(META_FINGERPRINT).await?.as_deref() != Some(fingerprint) {
            tracing::info!("Configured URLs changed since the vector cache was built; rebuilding");
            return Ok(None);
        }
        let built_at = store
            .get_meta(META_BUILT_AT)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|ts| ts.with_timezone(&Utc));
        match built_at {
            Some(ts) if !cache_expired(ts, Utc::now(), self.settings.cache_ttl_days) => {}
            _ => {
                tracing::info!("Vector cache expired; rebuilding");
                return Ok(None);
            }
        }

        let documents = store
            .get_meta(META_DOCUMENTS)
            .await?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        Ok(Some(documents))
    }

    async fn build(&self, store: &VectorStore, fingerprint: &str) -> Result<(usize, usize), ApiError> {
        tracing::info!("Building vector index from {} URL(s)", self.urls.len());
        let client = Client::builder()
            .timeout(Duration::from_secs(self.settings.fetch_timeout_secs))
            .user_agent(concat!("agentic-rag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::internal)?;

        let mut documents = Vec::new();
        for url in &self.urls {
            match fetch_document(&client, url).await {
                Ok(doc) if doc.content.trim().is_empty() => {
                    tracing::warn!("No text content at {}", url);
                }
                Ok(doc) => {
                    tracing::info!("Loaded {} ({} chars)", url, doc.content.chars().count());
                    documents.push(doc);
                }
                Err(err) => tracing::warn!("Failed to load {}: {}", url, err),
            }
        }
        if documents.is_empty() {
            return Err(ApiError::ServiceUnavailable(
                "No documents could be loaded from the configured URLs".to_string(),
            ));
        }

        let chunks = self.index_documents(store, &documents).await?;

        store.set_meta(META_MODEL, &self.embedding_model).await?;
        store.set_meta(META_FINGERPRINT, fingerprint).await?;
        store.set_meta(META_DOCUMENTS, &documents.len().to_string()).await?;
        store.set_meta(META_BUILT_AT, &Utc::now().to_rfc3339()).await?;

        tracing::info!(
            "Vector index ready: {} documents, {} chunks",
            documents.len(),
            chunks
        );
        Ok((documents.len(), chunks))
    }

    /// Splits, embeds and stores documents. Returns the chunk count.
    pub(crate) async fn index_documents(
        &self,
        store: &VectorStore,
        documents: &[Document],
    ) -> Result<usize, ApiError> {
        let splitter = TextSplitter::new(self.settings.chunk_size, self.settings.chunk_overlap);
        let chunks: Vec<StoredChunk> = documents
            .iter()
            .flat_map(|doc| {
                splitter
                    .split_text(&doc.content)
                    .into_iter()
                    .enumerate()
                    .map(move |(idx, content)| StoredChunk {
                        chunk_id: format!("{}#{}", doc.source, idx),
                        content,
                        source: doc.source.clone(),
                        title: doc.title.clone(),
                    })
            })
            .collect();

        let batch_size = self.settings.embedding_batch_size.max(1);
        for batch in chunks.chunks(batch_size) {
            let inputs: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.provider.embed(&inputs, &self.embedding_model).await?;
            if embeddings.len() != batch.len() {
                return Err(ApiError::Internal(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            let items: Vec<(StoredChunk, Vec<f32>)> =
                batch.iter().cloned().zip(embeddings).collect();
            store.insert_batch(&items).await?;
        }

        Ok(chunks.len())
    }

    /// Top matching chunks joined by blank lines, the way the retriever
    /// tool hands them to the agent.
    pub async fn search(&self, query: &str) -> Result<String, ApiError> {
        let guard = self.index.read().await;
        let Some(index) = guard.as_ref() else {
            return Err(ApiError::ServiceUnavailable(
                "Vector store is not initialized".to_string(),
            ));
        };

        let query_embedding = self
            .provider
            .embed(&[query.to_string()], &self.embedding_model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("Embedding provider returned nothing".to_string()))?;

        let results = index.store.search(&query_embedding, self.settings.top_k).await?;
        Ok(results
            .into_iter()
            .map(|scored| scored.chunk.content)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    pub async fn info(&self) -> VectorInfo {
        let guard = self.index.read().await;
        let (documents, chunks, loaded_from_cache) = guard
            .as_ref()
            .map(|index| (index.documents, index.chunks, index.loaded_from_cache))
            .unwrap_or((0, 0, false));
        let store_type = match guard.as_ref().map(|index| index.store.db_path().is_some()) {
            Some(true) => "sqlite",
            Some(false) => "memory",
            None => "none",
        };

        VectorInfo {
            initialized: guard.is_some(),
            store_type,
            tool_name: self.settings.tool_name.clone(),
            documents,
            chunks,
            loaded_from_cache,
            cache_enabled: self.settings.cache_enabled,
            cache_path: self
                .settings
                .cache_enabled
                .then(|| self.cache_path.display().to_string()),
        }
    }

    #[cfg(test)]
    pub(crate) async fn install_index(&self, store: VectorStore, documents: usize) -> Result<(), ApiError> {
        let chunks = store.count().await?;
        *self.index.write().await = Some(ReadyIndex {
            store,
            documents,
            chunks,
            loaded_from_cache: false,
        });
        Ok(())
    }
}

fn source_fingerprint(urls: &[String]) -> String {
    let mut hasher = Sha256::new();
    for url in urls {
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

fn cache_expired(built_at: DateTime<Utc>, now: DateTime<Utc>, ttl_days: i64) -> bool {
    ttl_days > 0 && now - built_at > chrono::Duration::days(ttl_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedProvider;

    fn service(cache_dir: PathBuf, urls: Vec<String>) -> VectorService {
        let settings = VectorSettings {
            chunk_size: 80,
            chunk_overlap: 10,
            top_k: 2,
            ..VectorSettings::default()
        };
        VectorService::new(
            settings,
            "test-embedding".to_string(),
            Arc::new(ScriptedProvider::new()),
            cache_dir,
            urls,
        )
    }

    fn docs() -> Vec<Document> {
        vec![
            Document {
                source: "https://docs.example.com/tracing".to_string(),
                title: Some("Tracing".to_string()),
                content: "LangSmith tracing records every run of your chain.\n\nTraces show inputs outputs and latency for each step.".to_string(),
            },
            Document {
                source: "https://docs.example.com/datasets".to_string(),
                title: None,
                content: "Datasets hold examples used for evaluation.\n\nEvaluators score runs against reference outputs.".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn not_ready_until_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path().to_path_buf(), vec![]);

        assert!(!service.is_ready().await);
        assert!(matches!(
            service.search("tracing").await,
            Err(ApiError::ServiceUnavailable(_))
        ));
        assert!(matches!(
            service.initialize().await,
            Err(ApiError::ServiceUnavailable(_))
        ));
        let info = service.info().await;
        assert!(!info.initialized);
        assert_eq!(info.store_type, "none");
        assert_eq!(info.tool_name, "langsmith_search");
    }

    #[tokio::test]
    async fn indexed_documents_are_searchable() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path().to_path_buf(), vec![]);
        let store = VectorStore::in_memory().await.unwrap();

        let chunks = service.index_documents(&store, &docs()).await.unwrap();
        assert!(chunks >= 4);
        service.install_index(store, 2).await.unwrap();

        let answer = service.search("evaluation datasets examples").await.unwrap();
        assert!(answer.starts_with("Datasets hold examples used for evaluation."));
        assert_eq!(answer.split("\n\n").count(), 2);

        let info = service.info().await;
        assert!(info.initialized);
        assert_eq!(info.documents, 2);
        assert_eq!(info.chunks, chunks);
        assert_eq!(info.store_type, "memory");
    }

    #[tokio::test]
    async fn fresh_cache_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let urls = vec!["https://docs.example.com/tracing".to_string()];
        let service = service(dir.path().to_path_buf(), urls.clone());

        let store = VectorStore::open(&dir.path().join("index.db")).await.unwrap();
        service.index_documents(&store, &docs()[..1]).await.unwrap();
        store.set_meta(META_MODEL, "test-embedding").await.unwrap();
        store
            .set_meta(META_FINGERPRINT, &source_fingerprint(&urls))
            .await
            .unwrap();
        store.set_meta(META_DOCUMENTS, "1").await.unwrap();
        store
            .set_meta(META_BUILT_AT, &Utc::now().to_rfc3339())
            .await
            .unwrap();
        drop(store);

        // no network involved: a valid cache short-circuits fetching
        service.initialize().await.unwrap();
        let info = service.info().await;
        assert!(info.loaded_from_cache);
        assert_eq!(info.documents, 1);
        assert_eq!(info.store_type, "sqlite");
    }

    #[tokio::test]
    async fn stale_cache_metadata_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let urls = vec!["https://docs.example.com/tracing".to_string()];
        let service = service(dir.path().to_path_buf(), urls.clone());
        let store = VectorStore::in_memory().await.unwrap();
        service.index_documents(&store, &docs()).await.unwrap();
        let fingerprint = source_fingerprint(&urls);

        store.set_meta(META_MODEL, "other-model").await.unwrap();
        assert!(service.cached_documents(&store, &fingerprint).await.unwrap().is_none());

        store.set_meta(META_MODEL, "test-embedding").await.unwrap();
        store.set_meta(META_FINGERPRINT, "different").await.unwrap();
        assert!(service.cached_documents(&store, &fingerprint).await.unwrap().is_none());

        store.set_meta(META_FINGERPRINT, &fingerprint).await.unwrap();
        let old = Utc::now() - chrono::Duration::days(30);
        store.set_meta(META_BUILT_AT, &old.to_rfc3339()).await.unwrap();
        assert!(service.cached_documents(&store, &fingerprint).await.unwrap().is_none());

        store.set_meta(META_BUILT_AT, &Utc::now().to_rfc3339()).await.unwrap();
        assert_eq!(service.cached_documents(&store, &fingerprint).await.unwrap(), Some(0));
    }

    #[test]
    fn ttl_zero_never_expires() {
        let now = Utc::now();
        let built = now - chrono::Duration::days(400);
        assert!(!cache_expired(built, now, 0));
        assert!(cache_expired(built, now, 7));
        assert!(!cache_expired(now - chrono::Duration::days(2), now, 7));
    }

    #[test]
    fn fingerprint_depends_on_order_and_content() {
        let a = source_fingerprint(&["x".to_string(), "y".to_string()]);
        let b = source_fingerprint(&["y".to_string(), "x".to_string()]);
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
