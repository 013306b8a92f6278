use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::settings::CorsSettings;
use crate::server::handlers::{chat, health, root, tools};
use crate::server::middleware::{log_requests, rate_limit};
use crate::state::AppState;

/// Creates the application router.
///
/// The chat endpoints sit behind the per-client rate limiter; every route
/// gets request logging, tracing and (when enabled) CORS.
pub fn router(state: Arc<AppState>) -> Router {
    let chat_routes = Router::new()
        .route("/chat", post(chat::chat))
        .route("/chat-stream", post(chat::chat_stream))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let app = Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health))
        .route("/tools", get(tools::list_tools))
        .merge(chat_routes)
        .with_state(state.clone())
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http());

    match build_cors_layer(&state.settings.cors) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn build_cors_layer(settings: &CorsSettings) -> Option<CorsLayer> {
    if !settings.enabled {
        return None;
    }

    let allow_origin = if settings.allow_origins.iter().any(|origin| origin.trim() == "*") {
        AllowOrigin::any()
    } else {
        let origins = settings
            .allow_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect::<Vec<_>>();
        AllowOrigin::list(origins)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}
