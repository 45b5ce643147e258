use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::middleware::rate_limit::RateLimiter;
use crate::practice::locks::RunLocks;
use crate::services::explainer::Explainer;
use crate::store::Store;

/// 请求处理共享的上下文；身份信息不放这里，由提取器按请求传入。
#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    config: Arc<Config>,
    rate_limit: Arc<RateLimiter>,
    run_locks: RunLocks,
    explainer: Arc<Explainer>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: &Config, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            store,
            rate_limit: Arc::new(RateLimiter::new(
                config.rate_limit.window_secs,
                config.rate_limit.max_requests,
            )),
            run_locks: RunLocks::new(),
            explainer: Arc::new(Explainer::new(&config.llm)),
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_arc(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rate_limit(&self) -> &Arc<RateLimiter> {
        &self.rate_limit
    }

    pub fn run_locks(&self) -> &RunLocks {
        &self.run_locks
    }

    pub fn explainer(&self) -> &Arc<Explainer> {
        &self.explainer
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
