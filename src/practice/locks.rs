use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// 按会话 id 串行化读-改-写，同一时刻只有一个流程在操作某次练习。
#[derive(Clone, Default)]
pub struct RunLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, run_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(run_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// 丢弃无人持有的锁，返回清理数量。
    pub async fn prune(&self) -> usize {
        let mut map = self.inner.lock().await;
        let before = map.len();
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - map.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_run_is_serialized() {
        let locks = RunLocks::new();
        let guard = locks.acquire("r1").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _g = contender.acquire("r1").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn different_runs_do_not_block() {
        let locks = RunLocks::new();
        let _a = locks.acquire("r1").await;
        let _b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("r2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn idle_locks_are_pruned() {
        let locks = RunLocks::new();
        let held = locks.acquire("r1").await;
        drop(locks.acquire("r2").await);

        assert_eq!(locks.prune().await, 1);
        assert_eq!(locks.len().await, 1);
        drop(held);
        assert_eq!(locks.prune().await, 1);
    }
}
