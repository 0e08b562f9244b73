use std::sync::Arc;

use scc::HashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per domain, created on demand.
///
/// Runs for the same domain queue up behind each other; different domains never contend.
/// Entries nobody holds or waits on are dropped by [`DomainLocks::prune`].
#[derive(Debug, Default)]
pub struct DomainLocks {
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl DomainLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `domain`.
    pub async fn acquire(&self, domain: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry_async(domain.to_string())
            .await
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .get()
            .clone();
        lock.lock_owned().await
    }

    /// Drop entries that are neither held nor awaited.
    pub async fn prune(&self) {
        // The map itself holds one reference; anyone else means the lock is in use.
        self.locks
            .retain_async(|_, lock| Arc::strong_count(lock) > 1)
            .await;
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn test_same_domain_is_exclusive() {
        let locks = Arc::new(DomainLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("shop.example.com").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_domains_do_not_block() {
        let locks = DomainLocks::new();
        let _a = locks.acquire("a.example.com").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("b.example.com")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = DomainLocks::new();
        let held = locks.acquire("a.example.com").await;
        drop(locks.acquire("b.example.com").await);

        locks.prune().await;
        assert_eq!(locks.len(), 1);

        drop(held);
        locks.prune().await;
        assert!(locks.is_empty());
    }
}
