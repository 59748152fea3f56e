use crate::domain::order::{Order, OrderStatus, Reward};
use crate::domain::ports::OrderStore;
use crate::error::{AccrualError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory order store.
///
/// Uses `Arc<RwLock<HashMap<String, Order>>>` so concurrent workers and the sweeper can share it.
/// Suited to tests and one-shot CLI runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Applies a status write to a stored order, refusing to move it backwards.
pub(crate) fn apply_update(order: &mut Order, status: OrderStatus, reward: Option<Reward>) -> bool {
    if !order.status.can_advance_to(status) {
        return false;
    }
    order.status = status;
    if reward.is_some() && status.is_terminal() {
        order.accrual = reward;
    }
    true
}

/// Oldest-first selection. Only the selected orders are cloned.
fn select_pending<'a>(
    orders: impl Iterator<Item = &'a Order>,
    statuses: &[OrderStatus],
    exclude: &HashSet<String>,
    limit: usize,
) -> Vec<Order> {
    let mut matching: Vec<&Order> = orders
        .filter(|o| statuses.contains(&o.status) && !exclude.contains(&o.number))
        .collect();
    matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    matching.into_iter().take(limit).cloned().collect()
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.number) {
            return Err(AccrualError::DuplicateOrder(order.number));
        }
        orders.insert(order.number.clone(), order);
        Ok(())
    }

    async fn get(&self, number: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(number).cloned())
    }

    async fn orders_by_status(
        &self,
        statuses: &[OrderStatus],
        exclude: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(select_pending(
            orders.values(),
            statuses,
            exclude,
            limit,
        ))
    }

    async fn update_status_and_reward(
        &self,
        number: &str,
        status: OrderStatus,
        reward: Option<Reward>,
    ) -> Result<bool> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(number)
            .ok_or_else(|| AccrualError::OrderNotFound(number.to_string()))?;
        Ok(apply_update(order, status, reward))
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}
