//! The global render lock (§5, §9 "Global render lock as process-wide
//! state"): a single shared mutual-exclusion primitive handed to the render
//! driver at construction, not hidden as module-level statics, so tests can
//! substitute an independent lock per pipeline under test.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// A process-wide mutex every call into the external renderer must hold.
/// Cloning shares the same underlying lock — the type is a thin handle, not
/// a fresh lock.
#[derive(Clone, Default)]
pub struct GlobalRenderLock {
    inner: Arc<Mutex<()>>,
}

impl GlobalRenderLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for the duration of a single render call; the
    /// caller must hold the returned guard for exactly that call and
    /// release it on every exit path (§5).
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn serializes_concurrent_acquirers() {
        let lock = GlobalRenderLock::new();
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            let concurrent = concurrent.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(tokio::spawn(async move {
                let _guard = lock.acquire().await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }
}
