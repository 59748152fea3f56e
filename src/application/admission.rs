use super::overflow::{OverflowPool, OverloadMonitor};
use crate::config::EngineConfig;
use async_trait::async_trait;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

/// Work the admission controller dispatches.
#[async_trait]
pub trait WorkHandler<T>: Send + Sync + 'static {
    /// Processes one unit of work. Failures are the handler's to log.
    async fn handle(&self, item: T);

    /// Called when neither the primary budget nor the overflow pool could take `item`.
    fn defer(&self, item: T);
}

/// Counts units of work that have been accepted but not finished.
#[derive(Debug, Default)]
struct WorkCounter {
    busy: AtomicUsize,
    idle: Notify,
}

/// Keeps one unit of work counted as busy until dropped.
#[derive(Debug)]
pub struct WorkGuard(Arc<WorkCounter>);

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if self.0.busy.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Bounded-concurrency dispatcher.
///
/// Each accepted item runs on its own task while fewer than `max_active_workers` are busy.
/// Past that budget the item is counted as an overload event and queued in the overflow
/// pool, which waits on the same budget; if the pool cannot take it either, the handler
/// defers it. Nothing is dropped.
pub struct AdmissionController<T> {
    max_active: usize,
    permits: Arc<Semaphore>,
    handler: Arc<dyn WorkHandler<T>>,
    overflow: OverflowPool<T>,
    monitor: OverloadMonitor,
    work: Arc<WorkCounter>,
}

impl<T: Send + 'static> AdmissionController<T> {
    pub fn new(
        config: &EngineConfig,
        handler: Arc<dyn WorkHandler<T>>,
        shutdown: CancellationToken,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_active_workers));
        let overflow = OverflowPool::start(
            config.overflow_workers,
            config.overflow_queue,
            Arc::clone(&permits),
            Arc::clone(&handler),
            shutdown,
        );
        Self {
            max_active: config.max_active_workers,
            permits,
            handler,
            overflow,
            monitor: OverloadMonitor::new(
                config.overload_report_count,
                config.overload_report_rps,
            ),
            work: Arc::new(WorkCounter::default()),
        }
    }

    /// Fire-and-forget dispatch of one item.
    pub fn send(&self, item: T) {
        // try_acquire is the atomic check-and-increment of the active worker count
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => {
                let guard = self.begin();
                let handler = Arc::clone(&self.handler);
                tokio::spawn(async move {
                    let _permit = permit;
                    let _guard = guard;
                    handler.handle(item).await;
                });
            }
            Err(_) => self.on_overflow(item),
        }
    }

    fn on_overflow(&self, item: T) {
        self.monitor.record();
        if let Err(item) = self.overflow.try_submit(item, self.begin()) {
            self.handler.defer(item);
        }
    }

    fn begin(&self) -> WorkGuard {
        self.work.busy.fetch_add(1, Ordering::AcqRel);
        WorkGuard(Arc::clone(&self.work))
    }

    /// Workers currently holding a slot of the budget, primary or overflow.
    pub fn active_workers(&self) -> usize {
        self.max_active - self.permits.available_permits()
    }

    /// Items accepted by either the primary budget or the overflow pool and not finished yet.
    pub fn busy(&self) -> usize {
        self.work.busy.load(Ordering::Acquire)
    }

    pub fn overload(&self) -> &OverloadMonitor {
        &self.monitor
    }

    /// Resolves once no accepted item is left running or queued.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = pin!(self.work.idle.notified());
            notified.as_mut().enable();
            if self.busy() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[derive(Default)]
    struct Recording {
        handled: parking_lot::Mutex<HashSet<u32>>,
        deferred: parking_lot::Mutex<HashSet<u32>>,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl WorkHandler<u32> for Recording {
        async fn handle(&self, item: u32) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(self.handled.lock().insert(item), "duplicated item {}", item);
            self.current.fetch_sub(1, Ordering::SeqCst);
        }

        fn defer(&self, item: u32) {
            assert!(self.deferred.lock().insert(item), "duplicated item {}", item);
        }
    }

    fn config(max_active_workers: usize, overflow_workers: usize) -> EngineConfig {
        EngineConfig {
            max_active_workers,
            overflow_workers,
            overflow_queue: 4,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_every_item_is_handled_or_deferred() {
        let handler = Arc::new(Recording::default());
        let controller =
            AdmissionController::new(&config(10, 2), handler.clone(), CancellationToken::new());

        for i in 0..200 {
            controller.send(i);
        }
        controller.wait_idle().await;

        let handled = handler.handled.lock().len();
        let deferred = handler.deferred.lock().len();
        assert_eq!(handled + deferred, 200);
        assert!(handled >= 10);
        assert_eq!(controller.overload().events(), 190);
    }

    #[tokio::test]
    async fn test_primary_budget_bounds_concurrency() {
        let handler = Arc::new(Recording::default());
        let controller =
            AdmissionController::new(&config(2, 0), handler.clone(), CancellationToken::new());

        for i in 0..10 {
            controller.send(i);
        }
        assert!(controller.active_workers() <= 2);
        controller.wait_idle().await;

        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(handler.handled.lock().len(), 2);
        assert_eq!(handler.deferred.lock().len(), 8);
        assert_eq!(controller.active_workers(), 0);
    }

    #[tokio::test]
    async fn test_overflow_pool_shares_the_budget() {
        let handler = Arc::new(Recording::default());
        let config = EngineConfig {
            max_active_workers: 2,
            ..EngineConfig::default()
        };
        let controller =
            AdmissionController::new(&config, handler.clone(), CancellationToken::new());

        for i in 0..10 {
            controller.send(i);
        }
        controller.wait_idle().await;

        // 2 primary slots, 8 queued behind them in the default pool
        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(handler.handled.lock().len(), 10);
        assert!(handler.deferred.lock().is_empty());
        assert_eq!(controller.active_workers(), 0);
    }

    #[tokio::test]
    async fn test_overflow_pool_takes_spill() {
        let handler = Arc::new(Recording::default());
        let controller =
            AdmissionController::new(&config(1, 1), handler.clone(), CancellationToken::new());

        for i in 0..3 {
            controller.send(i);
        }
        controller.wait_idle().await;

        // one primary slot, the rest fit in the queue of 4
        assert_eq!(handler.handled.lock().len(), 3);
        assert!(handler.deferred.lock().is_empty());
        assert_eq!(handler.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nothing_is_stranded_after_shutdown() {
        let handler = Arc::new(Recording::default());
        let shutdown = CancellationToken::new();
        let controller = AdmissionController::new(&config(1, 2), handler.clone(), shutdown.clone());

        shutdown.cancel();
        // let the pool workers observe the cancellation and close the queue
        tokio::time::sleep(Duration::from_millis(20)).await;

        for i in 0..4 {
            controller.send(i);
        }
        tokio::time::timeout(Duration::from_secs(1), controller.wait_idle())
            .await
            .expect("work left behind after shutdown");

        assert_eq!(handler.handled.lock().len(), 1);
        assert_eq!(handler.deferred.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_unused() {
        let handler = Arc::new(Recording::default());
        let controller =
            AdmissionController::new(&config(1, 0), handler, CancellationToken::new());

        tokio::time::timeout(Duration::from_millis(100), controller.wait_idle())
            .await
            .unwrap();
    }
}
