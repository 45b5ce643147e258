pub mod explanation_backfill;
pub mod practice_timeout;
pub mod session_cleanup;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::{ExplainConfig, WorkerConfig};
use crate::explanations::BatchConfig;
use crate::practice::locks::RunLocks;
use crate::services::explainer::Explainer;
use crate::store::Store;

/// 单次 worker 执行的超时（5 分钟）
const WORKER_TIMEOUT: Duration = Duration::from_secs(300);

/// 关闭调度器前留给进行中任务的收尾时间
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    SessionCleanup,
    PracticeTimeout,
    ExplanationBackfill,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionCleanup => "session_cleanup",
            Self::PracticeTimeout => "practice_timeout",
            Self::ExplanationBackfill => "explanation_backfill",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: &'static str,
    pub enabled: bool,
}

pub struct WorkerManager {
    store: Arc<Store>,
    run_locks: RunLocks,
    explainer: Arc<Explainer>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
    batch: BatchConfig,
}

impl WorkerManager {
    pub fn new(
        store: Arc<Store>,
        run_locks: RunLocks,
        explainer: Arc<Explainer>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
        explain: &ExplainConfig,
    ) -> Self {
        Self {
            store,
            run_locks,
            explainer,
            shutdown_rx,
            config: config.clone(),
            batch: BatchConfig::from(explain),
        }
    }

    /// 计划中的全部任务及其 cron 表达式。
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::SessionCleanup,
                cron: "0 0 * * * *",
                enabled: true,
            },
            JobSpec {
                name: WorkerName::PracticeTimeout,
                cron: "0 * * * * *",
                enabled: true,
            },
            JobSpec {
                name: WorkerName::ExplanationBackfill,
                cron: "0 15 * * * *",
                enabled: self.config.enable_explanation_worker && self.explainer.is_enabled(),
            },
        ]
    }

    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;
        self.register_jobs(&scheduler).await;
        scheduler.start().await?;

        tracing::info!("Worker manager started");
        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            "Worker manager shutting down, draining for {}s",
            DRAIN_TIMEOUT.as_secs()
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in self.planned_jobs() {
            let name = spec.name.as_str();
            if !spec.enabled {
                tracing::info!(name, "Skipping disabled worker");
                continue;
            }

            let store = self.store.clone();
            match spec.name {
                WorkerName::SessionCleanup => {
                    add_job(scheduler, spec.cron, name, move || {
                        let store = store.clone();
                        async move {
                            session_cleanup::run(&store).await;
                        }
                    })
                    .await;
                }
                WorkerName::PracticeTimeout => {
                    let locks = self.run_locks.clone();
                    add_job(scheduler, spec.cron, name, move || {
                        let store = store.clone();
                        let locks = locks.clone();
                        async move {
                            practice_timeout::run(&store, &locks).await;
                        }
                    })
                    .await;
                }
                WorkerName::ExplanationBackfill => {
                    let explainer = self.explainer.clone();
                    let batch = self.batch;
                    add_job(scheduler, spec.cron, name, move || {
                        let store = store.clone();
                        let explainer = explainer.clone();
                        async move {
                            explanation_backfill::run(&store, explainer.as_ref(), batch).await;
                        }
                    })
                    .await;
                }
            }
            tracing::info!(name, cron = spec.cron, "Registered worker");
        }
    }
}

/// 注册任务：同一 worker 上一次未结束时跳过本次触发，且每次执行有超时。
async fn add_job<Fut, F>(scheduler: &JobScheduler, cron: &str, name: &'static str, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let guard = running.clone();
        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(worker = name, "Skipping worker invocation: previous run still in progress");
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    });

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error = %err, cron, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => tracing::error!(error = %err, cron, worker = name, "Failed to create worker job"),
    }
}
