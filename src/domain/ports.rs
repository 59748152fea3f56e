use super::accrual::AccrualLookup;
use super::order::{Order, OrderStatus, Reward};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Persistent view of orders. The single source of truth for order state.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. Fails with `DuplicateOrder` if the number is taken.
    async fn insert(&self, order: Order) -> Result<()>;
    async fn get(&self, number: &str) -> Result<Option<Order>>;
    /// Up to `limit` orders in one of `statuses`, skipping numbers in `exclude`, oldest first.
    async fn orders_by_status(
        &self,
        statuses: &[OrderStatus],
        exclude: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Order>>;
    /// Writes `status` (and `reward` when given). Returns `false` when the write would
    /// move the order backwards and was skipped.
    async fn update_status_and_reward(
        &self,
        number: &str,
        status: OrderStatus,
        reward: Option<Reward>,
    ) -> Result<bool>;
    async fn all_orders(&self) -> Result<Vec<Order>>;
}

/// Single-order lookup against the external accrual service.
#[async_trait]
pub trait AccrualClient: Send + Sync {
    async fn fetch(&self, number: &str) -> Result<AccrualLookup>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type AccrualClientRef = Arc<dyn AccrualClient>;
