use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::{broadcast, Mutex};

use crate::response::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u64,
}

/// 按客户端 IP 的固定窗口限流。
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u64,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_after_secs: u64,
}

impl RateLimiter {
    pub fn new(window_secs: u64, max_requests: u64) -> Self {
        Self {
            window: Duration::from_secs(window_secs.max(1)),
            max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, ip: IpAddr, now: Instant) -> Decision {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        let allowed = window.count < self.max_requests;
        if allowed {
            window.count += 1;
        }
        let elapsed = now.duration_since(window.started);

        Decision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(window.count),
            reset_after_secs: self.window.saturating_sub(elapsed).as_secs(),
        }
    }

    /// 丢弃两个窗口以上未活动的记录
    pub async fn prune(&self, now: Instant) {
        let horizon = self.window * 2;
        self.windows
            .lock()
            .await
            .retain(|_, w| now.duration_since(w.started) <= horizon);
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !req.uri().path().starts_with("/api/") {
        return next.run(req).await;
    }

    let ip = client_ip(req.headers(), state.config().trust_proxy);
    let decision = state.rate_limit().check(ip, Instant::now()).await;

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::warn!(client_ip = %ip, "Rate limit exceeded");
        let mut rejected = AppError::too_many_requests("Too many requests").into_response();
        rejected.headers_mut().insert(
            "retry-after",
            HeaderValue::from(decision.reset_after_secs.max(1)),
        );
        rejected
    };

    let headers = response.headers_mut();
    headers.insert("ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(decision.reset_after_secs));
    response
}

pub fn client_ip(headers: &HeaderMap, trust_proxy: bool) -> IpAddr {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    trust_proxy
        .then(|| header_ip("x-forwarded-for"))
        .flatten()
        .or_else(|| header_ip("x-real-ip"))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

pub async fn rate_limit_cleanup_loop(
    limiter: Arc<RateLimiter>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(300));
    loop {
        tokio::select! {
            _ = interval.tick() => limiter.prune(Instant::now()).await,
            _ = shutdown_rx.recv() => break,
        }
    }
}
