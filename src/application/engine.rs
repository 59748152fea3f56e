use super::admission::AdmissionController;
use super::in_flight::InFlightTracker;
use super::overflow::OverloadMonitor;
use super::reconciler::StatusReconciler;
use crate::config::EngineConfig;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::ports::{AccrualClientRef, OrderStore, OrderStoreRef};
use crate::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Result of one reconciliation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another sweep was still running; this one did nothing.
    Skipped,
    /// Pending orders were re-submitted.
    Completed { dispatched: usize },
    /// The order store could not be queried.
    Failed,
}

/// The accrual reconciliation engine.
///
/// Orders handed to [`AccrualEngine::submit`] are looked up in the accrual service under a
/// bounded concurrency budget. A periodic sweep re-submits every order that is still `NEW` or
/// `PROCESSING` and not in flight, so orders lost to overload, errors or restarts are
/// eventually driven to a terminal status.
///
/// All shared state is owned by the instance; clones share it.
#[derive(Clone)]
pub struct AccrualEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    store: OrderStoreRef,
    in_flight: InFlightTracker,
    admission: AdmissionController<Order>,
    sweeping: AtomicBool,
    shutdown: CancellationToken,
}

/// Releases the sweep flag on drop.
struct SweepLock<'a>(&'a AtomicBool);

impl<'a> SweepLock<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SweepLock<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AccrualEngine {
    /// Creates an engine. Must be called within a Tokio runtime (the overflow pool starts here).
    pub fn new(config: EngineConfig, store: OrderStoreRef, client: AccrualClientRef) -> Result<Self> {
        config.validate()?;

        let in_flight = InFlightTracker::new();
        let shutdown = CancellationToken::new();
        let reconciler = Arc::new(StatusReconciler::new(
            Arc::clone(&store),
            client,
            in_flight.clone(),
        ));
        let admission = AdmissionController::new(&config, reconciler, shutdown.clone());

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                store,
                in_flight,
                admission,
                sweeping: AtomicBool::new(false),
                shutdown,
            }),
        })
    }

    /// Hands a freshly persisted order to the engine. Never fails and never blocks on the lookup.
    pub fn submit(&self, order: Order) {
        self.inner.in_flight.mark(&order.number);
        self.inner.admission.send(order);
    }

    /// Runs one reconciliation pass unless another one is in progress.
    pub async fn sweep(&self) -> SweepOutcome {
        let Some(_lock) = SweepLock::try_acquire(&self.inner.sweeping) else {
            debug!("Previous sweep still running, skipping tick");
            return SweepOutcome::Skipped;
        };

        let in_flight = self.inner.in_flight.snapshot();
        let orders = match self
            .inner
            .store
            .orders_by_status(&OrderStatus::PENDING, &in_flight, self.inner.config.polling_count)
            .await
        {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "Failed to load orders in accrual sweep");
                return SweepOutcome::Failed;
            }
        };

        let dispatched = orders.len();
        for order in orders {
            self.submit(order);
        }
        if dispatched > 0 {
            debug!(dispatched, "Sweep re-submitted pending orders");
        }
        SweepOutcome::Completed { dispatched }
    }

    /// Starts the periodic sweeper. Each tick runs on its own task so a slow sweep makes
    /// the following ticks skip rather than pile up.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let shutdown = self.inner.shutdown.clone();
        let period = self.inner.config.polling_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = period.as_millis() as u64, "Accrual sweeper started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            engine.sweep().await;
                        });
                    }
                }
            }
            info!("Accrual sweeper stopped");
        })
    }

    /// Waits until every accepted lookup (primary or overflow) has finished.
    pub async fn wait_idle(&self) {
        self.inner.admission.wait_idle().await;
    }

    /// Stops the sweeper and the overflow pool. Running lookups are not awaited.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.inner.in_flight
    }

    pub fn overload(&self) -> &OverloadMonitor {
        self.inner.admission.overload()
    }

    /// Number of orders not yet in a terminal status.
    pub async fn pending_orders(&self) -> Result<usize> {
        let pending = self
            .inner
            .store
            .orders_by_status(
                &OrderStatus::PENDING,
                &Default::default(),
                usize::MAX,
            )
            .await?;
        Ok(pending.len())
    }
}
