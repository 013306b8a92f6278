use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::agent::AgentService;
use crate::core::config::{AppPaths, Settings};
use crate::core::errors::ApiError;
use crate::crm::CustomerManager;
use crate::db::{setup_chinook_database, setup_crm_database};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider, OpenAiProvider};
use crate::server::middleware::ChatRateLimiter;
use crate::sql::{MusicDatabase, SqlAnswerChain};
use crate::tools::{crm_tools, search_tools, MusicDatabaseTool, RetrieverTool, ToolRegistry};
use crate::vector::loader::collect_urls;
use crate::vector::VectorService;

pub mod error;

const RATE_LIMIT_PRUNE_PERIOD: Duration = Duration::from_secs(60);

use error::InitializationError;

/// Shared application state handed to every route.
///
/// Everything here is fixed after startup except the vector index slot
/// inside [`VectorService`] and the rate limiter buckets.
/// `started_at` feeds the uptime reported by `/health`.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub customers: CustomerManager,
    pub music_db: Option<MusicDatabase>,
    pub vector: Arc<VectorService>,
    /// `None` when no usable API key is configured; chat endpoints then
    /// answer 503.
    pub agent: Option<Arc<AgentService>>,
    pub rate_limiter: Option<Arc<ChatRateLimiter>>,
    pub started_at: Instant,
}

impl AppState {
    /// Startup sequence:
    /// 1. CRM database (created and seeded when empty; fatal on failure)
    /// 2. Chinook database (copied from a known location if missing; optional)
    /// 3. LLM provider (skipped without an API key)
    /// 4. Vector index (optional; the retriever tool is left out on failure)
    /// 5. Tool registry and agent
    pub async fn initialize(paths: Arc<AppPaths>, settings: Arc<Settings>) -> Result<Arc<Self>, InitializationError> {
        let (customers, _) = setup_crm_database(
            &paths.resolve(&settings.database.crm_path),
            settings.database.crm_sample_records,
        )
        .await
        .map_err(|e| InitializationError::Crm(e.into()))?;

        let chinook_path = paths.resolve(&settings.database.chinook_path);
        let music_db = match setup_chinook_database(&paths.project_root, &chinook_path).await {
            Ok(_) => match MusicDatabase::open(&chinook_path, settings.sql.sample_rows).await {
                Ok(db) => Some(db),
                Err(err) => {
                    tracing::warn!("Music database unavailable: {}", err);
                    None
                }
            },
            Err(err) => {
                tracing::warn!("Music database unavailable: {}", err);
                None
            }
        };

        let llm: Option<Arc<dyn LlmProvider>> = match settings.openai.usable_api_key() {
            Some(api_key) => {
                let provider = OpenAiProvider::new(
                    &settings.openai.base_url,
                    api_key,
                    Duration::from_secs(settings.openai.timeout_secs),
                )
                .map_err(|e| InitializationError::Llm(e.into()))?;
                Some(Arc::new(provider))
            }
            None => {
                tracing::error!("No usable OpenAI API key configured; the agent is disabled");
                None
            }
        };

        let urls = collect_urls(
            &paths.resolve(&settings.vector.urls_file),
            &settings.vector.additional_urls,
        );

        Self::assemble(paths, settings, customers, music_db, llm, urls).await
    }

    /// Builds the vector service, tool registry and agent around already
    /// opened databases. The vector index is built here when a provider is
    /// available.
    pub async fn assemble(
        paths: Arc<AppPaths>,
        settings: Arc<Settings>,
        customers: CustomerManager,
        music_db: Option<MusicDatabase>,
        llm: Option<Arc<dyn LlmProvider>>,
        urls: Vec<String>,
    ) -> Result<Arc<Self>, InitializationError> {
        let embedder: Arc<dyn LlmProvider> = match &llm {
            Some(provider) => provider.clone(),
            None => Arc::new(DisabledProvider),
        };
        let vector = Arc::new(VectorService::new(
            settings.vector.clone(),
            settings.openai.embedding_model.clone(),
            embedder,
            paths.vector_cache_dir.clone(),
            urls,
        ));

        let agent = match llm {
            Some(llm) => {
                if let Err(err) = vector.initialize().await {
                    tracing::warn!("Vector store initialization failed (continuing without it): {}", err);
                }
                let tools = build_tools(&settings, &customers, music_db.as_ref(), &vector, llm.clone()).await?;
                Some(Arc::new(AgentService::new(llm, tools, settings.agent.clone())))
            }
            None => None,
        };

        let rate_limiter = if settings.rate_limit.enabled {
            let limiter = ChatRateLimiter::new(settings.rate_limit.per_minute, settings.rate_limit.per_hour)
                .ok_or_else(|| {
                    InitializationError::RateLimit("quotas must be greater than zero".to_string())
                })?;
            tracing::info!(
                "Rate limiting enabled: {}/min, {}/hour",
                settings.rate_limit.per_minute,
                settings.rate_limit.per_hour
            );
            let limiter = Arc::new(limiter);
            limiter.spawn_pruner(RATE_LIMIT_PRUNE_PERIOD);
            Some(limiter)
        } else {
            None
        };

        Ok(Arc::new(AppState {
            settings,
            customers,
            music_db,
            vector,
            agent,
            rate_limiter,
            started_at: Instant::now(),
        }))
    }
}

/// Tools in the order the agent sees them: search, CRM, music database,
/// then the retriever when its index is ready.
async fn build_tools(
    settings: &Settings,
    customers: &CustomerManager,
    music_db: Option<&MusicDatabase>,
    vector: &Arc<VectorService>,
    llm: Arc<dyn LlmProvider>,
) -> Result<ToolRegistry, InitializationError> {
    let mut tools = ToolRegistry::new();
    tools.extend(search_tools(&settings.search).map_err(|e| InitializationError::Tools(e.into()))?);
    tools.extend(crm_tools(customers.clone()));

    match music_db {
        Some(db) => {
            let chain = SqlAnswerChain::new(db.clone(), llm, settings.sql.clone());
            tools.register(Arc::new(MusicDatabaseTool::new(Arc::new(chain))));
        }
        None => tracing::warn!("query_music_database tool disabled: no music database"),
    }

    if vector.is_ready().await {
        tools.register(Arc::new(RetrieverTool::new(vector.clone())));
    } else {
        tracing::warn!("Retriever tool {} disabled: vector store not ready", vector.tool_name());
    }

    Ok(tools)
}

/// Stands in for the embedding provider when no API key is configured, so
/// the vector service still reports its state.
struct DisabledProvider;

#[async_trait]
impl LlmProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatMessage, ApiError> {
        Err(ApiError::ServiceUnavailable(
            "LLM provider is not configured".to_string(),
        ))
    }

    async fn embed(&self, _inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Err(ApiError::ServiceUnavailable(
            "Embedding provider is not configured".to_string(),
        ))
    }
}
