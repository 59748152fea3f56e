use super::admission::WorkHandler;
use super::in_flight::InFlightTracker;
use crate::domain::accrual::{AccrualLookup, StatusUpdate};
use crate::domain::order::Order;
use crate::domain::ports::{AccrualClient, AccrualClientRef, OrderStore, OrderStoreRef};
use crate::error::Result;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// What a reconciliation attempt did to the stored order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    /// The update was written.
    Applied(StatusUpdate),
    /// The store already held a later status; nothing was written.
    Stale(StatusUpdate),
}

/// Looks an order up in the accrual service and writes the outcome to the order store.
///
/// Runs once per dispatched order. Whatever happens, the order's in-flight marker is
/// cleared on exit so the sweeper can pick it up again if it is still pending.
pub struct StatusReconciler {
    store: OrderStoreRef,
    client: AccrualClientRef,
    in_flight: InFlightTracker,
}

impl StatusReconciler {
    pub fn new(store: OrderStoreRef, client: AccrualClientRef, in_flight: InFlightTracker) -> Self {
        Self {
            store,
            client,
            in_flight,
        }
    }

    /// Fetches the accrual result for `order` and applies it.
    pub async fn reconcile(&self, order: &Order) -> Result<Reconciliation> {
        let lookup = self.client.fetch(&order.number).await?;
        self.apply(order, &lookup).await
    }

    /// Writes the status (and, for terminal results, the reward) a lookup maps to.
    ///
    /// Applying the same result twice leaves the same stored row.
    pub async fn apply(&self, order: &Order, lookup: &AccrualLookup) -> Result<Reconciliation> {
        let update = lookup.status_update()?;
        let written = self
            .store
            .update_status_and_reward(&order.number, update.status, update.reward)
            .await?;

        if written {
            Ok(Reconciliation::Applied(update))
        } else {
            Ok(Reconciliation::Stale(update))
        }
    }
}

#[async_trait]
impl WorkHandler<Order> for StatusReconciler {
    async fn handle(&self, order: Order) {
        let _in_flight = self.in_flight.release_on_drop(&order.number);

        match self.reconcile(&order).await {
            Ok(Reconciliation::Applied(update)) => {
                debug!(
                    order = %order.number,
                    status = %update.status,
                    reward = ?update.reward.map(|r| r.value()),
                    "Order reconciled"
                );
            }
            Ok(Reconciliation::Stale(update)) => {
                debug!(
                    order = %order.number,
                    status = %update.status,
                    "Accrual result older than stored status, skipped"
                );
            }
            Err(e) if e.is_transient() => {
                warn!(order = %order.number, error = %e, "Accrual lookup failed, will retry on next sweep");
            }
            Err(e) => {
                error!(order = %order.number, error = %e, "Failed to reconcile order");
            }
        }
    }

    fn defer(&self, order: Order) {
        self.in_flight.unmark(&order.number);
        info!(order = %order.number, "Processing order on overload, deferred to next sweep");
    }
}
