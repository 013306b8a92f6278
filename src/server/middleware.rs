use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio::task::JoinHandle;

use crate::core::errors::ApiError;
use crate::state::AppState;

/// Per-client quotas for the chat endpoints. A request must fit both the
/// per-minute and the per-hour bucket.
pub struct ChatRateLimiter {
    per_minute: DefaultKeyedRateLimiter<IpAddr>,
    per_hour: DefaultKeyedRateLimiter<IpAddr>,
}

impl ChatRateLimiter {
    /// Returns `None` when either quota is zero.
    pub fn new(per_minute: u32, per_hour: u32) -> Option<Self> {
        let per_minute = Quota::per_minute(NonZeroU32::new(per_minute)?);
        let per_hour = Quota::per_hour(NonZeroU32::new(per_hour)?);
        Some(Self {
            per_minute: RateLimiter::keyed(per_minute),
            per_hour: RateLimiter::keyed(per_hour),
        })
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        self.per_minute.check_key(&ip).is_ok() && self.per_hour.check_key(&ip).is_ok()
    }

    /// Forgets clients whose buckets have fully refilled.
    pub fn prune(&self) {
        self.per_minute.retain_recent();
        self.per_minute.shrink_to_fit();
        self.per_hour.retain_recent();
        self.per_hour.shrink_to_fit();
    }

    /// Clients with state in either bucket.
    pub fn tracked_clients(&self) -> usize {
        self.per_minute.len().max(self.per_hour.len())
    }

    /// Prunes every `period` until the limiter is dropped.
    pub fn spawn_pruner(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.prune();
                tracing::debug!("Rate limiter pruned; tracking {} clients", limiter.tracked_clients());
            }
        })
    }
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// the socket peer. Requests without any of these (in-process tests) map to
/// the unspecified address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    peer.map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn request_ip(request: &Request) -> IpAddr {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(request.headers(), peer)
}

pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    tracing::info!("→ {} {} from {}", method, path, request_ip(&request));

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if status.is_server_error() {
        tracing::error!("← {} {} - {} ({:.2}ms)", method, path, status.as_u16(), elapsed_ms);
    } else if status.is_client_error() {
        tracing::warn!("← {} {} - {} ({:.2}ms)", method, path, status.as_u16(), elapsed_ms);
    } else {
        tracing::info!("← {} {} - {} ({:.2}ms)", method, path, status.as_u16(), elapsed_ms);
    }
    response
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(limiter) = &state.rate_limiter {
        let ip = request_ip(&request);
        if !limiter.check(ip) {
            tracing::warn!("Rate limit exceeded for {} on {}", ip, request.uri().path());
            return Err(ApiError::TooManyRequests);
        }
    }
    Ok(next.run(request).await)
}
