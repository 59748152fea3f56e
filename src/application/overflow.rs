use super::admission::{WorkGuard, WorkHandler};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Rolling count of overflow events, used to tell an occasional spill from sustained saturation.
///
/// Every `report_count` events the window is closed: if the events arrived faster than
/// `report_rps` a high-severity diagnostic is emitted. Then counter and window start reset.
/// Reporting never changes how work is routed.
#[derive(Debug)]
pub struct OverloadMonitor {
    report_count: usize,
    report_rps: f64,
    window: Mutex<OverloadWindow>,
    events: AtomicU64,
    warnings: AtomicU64,
}

#[derive(Debug)]
struct OverloadWindow {
    count: usize,
    started: Instant,
}

impl OverloadMonitor {
    pub fn new(report_count: usize, report_rps: f64) -> Self {
        Self {
            report_count: report_count.max(1),
            report_rps,
            window: Mutex::new(OverloadWindow {
                count: 0,
                started: Instant::now(),
            }),
            events: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
        }
    }

    /// Records one overflow event now. Returns `true` if it closed a window above the rate limit.
    pub fn record(&self) -> bool {
        self.record_at(Instant::now())
    }

    pub fn record_at(&self, now: Instant) -> bool {
        self.events.fetch_add(1, Ordering::Relaxed);

        let mut window = self.window.lock();
        window.count += 1;
        if window.count < self.report_count {
            return false;
        }

        let elapsed = now.saturating_duration_since(window.started).as_secs_f64();
        let rate = if elapsed > 0.0 {
            window.count as f64 / elapsed
        } else {
            f64::INFINITY
        };
        let exceeded = rate > self.report_rps;
        let count = window.count;
        window.count = 0;
        window.started = now;
        drop(window);

        if exceeded {
            self.warnings.fetch_add(1, Ordering::Relaxed);
            error!(
                events = count,
                rate,
                limit = self.report_rps,
                "Too many overload events"
            );
        }
        exceeded
    }

    /// Total overflow events since creation.
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Sustained-overload diagnostics emitted since creation.
    pub fn warnings(&self) -> u64 {
        self.warnings.load(Ordering::Relaxed)
    }
}

type Job<T> = (T, WorkGuard);

/// Bounded waiting queue for work that found the worker budget exhausted.
///
/// `workers` tasks drain a queue bounded at `capacity`. Each one waits for a slot of
/// the shared budget before handling an item, so the pool adds waiting room, not
/// concurrency. When the queue is full the caller gets the item back.
pub struct OverflowPool<T> {
    sender: Option<mpsc::Sender<Job<T>>>,
    shutdown: CancellationToken,
}

impl<T: Send + 'static> OverflowPool<T> {
    /// Spawns the pool workers. With `workers == 0` the pool rejects everything.
    pub fn start(
        workers: usize,
        capacity: usize,
        permits: Arc<Semaphore>,
        handler: Arc<dyn WorkHandler<T>>,
        shutdown: CancellationToken,
    ) -> Self {
        if workers == 0 || capacity == 0 {
            return Self {
                sender: None,
                shutdown,
            };
        }

        let (sender, receiver) = mpsc::channel::<Job<T>>(capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        for id in 0..workers {
            let receiver = Arc::clone(&receiver);
            let permits = Arc::clone(&permits);
            let handler = Arc::clone(&handler);
            let stop = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let next = {
                        let mut receiver = receiver.lock().await;
                        tokio::select! {
                            _ = stop.cancelled() => None,
                            next = receiver.recv() => next,
                        }
                    };
                    let Some((item, _guard)) = next else { break };

                    let permit = tokio::select! {
                        _ = stop.cancelled() => None,
                        permit = Arc::clone(&permits).acquire_owned() => permit.ok(),
                    };
                    let Some(_permit) = permit else {
                        handler.defer(item);
                        break;
                    };
                    handler.handle(item).await;
                }

                // Close before draining so later try_submit calls hand their item back.
                let mut receiver = receiver.lock().await;
                receiver.close();
                while let Ok((item, _guard)) = receiver.try_recv() {
                    handler.defer(item);
                }
                debug!(worker = id, "Overflow worker stopped");
            });
        }

        Self {
            sender: Some(sender),
            shutdown,
        }
    }

    /// Queues `item` without waiting. Hands it back if the pool is disabled, full or stopped.
    pub fn try_submit(&self, item: T, guard: WorkGuard) -> Result<(), T> {
        let Some(sender) = &self.sender else {
            return Err(item);
        };
        if self.shutdown.is_cancelled() {
            return Err(item);
        }
        sender.try_send((item, guard)).map_err(|e| e.into_inner().0)
    }
}
