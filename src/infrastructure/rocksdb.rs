use super::in_memory::apply_update;
use crate::domain::order::{Order, OrderStatus, Reward};
use crate::domain::ports::OrderStore;
use crate::error::{AccrualError, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing orders keyed by order number.
pub const CF_ORDERS: &str = "orders";
/// Column Family indexing non-terminal orders, keyed `{created_at}/{number}` with the status as value.
pub const CF_PENDING: &str = "pending";

/// A persistent order store backed by RocksDB.
///
/// Orders are stored as JSON in a dedicated column family. Orders that still need a
/// lookup are also indexed oldest-first in `CF_PENDING`, so a sweep only touches the
/// orders it may dispatch. Read-modify-write cycles (insert, status updates) are
/// serialized through a write lock and committed as one `WriteBatch`.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBOrderStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn internal(msg: String) -> AccrualError {
    AccrualError::InternalError(Box::new(std::io::Error::other(msg)))
}

/// RFC 3339 with fixed nanosecond width sorts lexicographically in time order.
fn pending_key(order: &Order) -> String {
    format!(
        "{}/{}",
        order.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        order.number
    )
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| internal(format!("Serialization error: {}", e)))
}

impl RocksDBOrderStore {
    /// Opens or creates a RocksDB instance at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let cf_pending = ColumnFamilyDescriptor::new(CF_PENDING, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders, cf_pending])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| internal(format!("Column family {} not found", name)))
    }

    fn read(&self, number: &str) -> Result<Option<Order>> {
        match self.db.get_cf(self.cf(CF_ORDERS)?, number.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| internal(format!("Deserialization error: {}", e))),
            None => Ok(None),
        }
    }

    /// Writes `order` and keeps its pending index entry in step, atomically.
    fn write(&self, order: &Order) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_ORDERS)?, order.number.as_bytes(), encode(order)?);

        let pending = self.cf(CF_PENDING)?;
        let key = pending_key(order);
        if order.status.is_terminal() {
            batch.delete_cf(pending, key.as_bytes());
        } else {
            batch.put_cf(pending, key.as_bytes(), encode(&order.status)?);
        }

        self.db.write(batch)?;
        Ok(())
    }

    fn scan(&self) -> Result<Vec<Order>> {
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_ORDERS)?, IteratorMode::Start) {
            let (_key, value) =
                item.map_err(|e| internal(format!("RocksDB iteration error: {}", e)))?;
            let order: Order = serde_json::from_slice(&value)
                .map_err(|e| internal(format!("Failed to deserialize order: {}", e)))?;
            orders.push(order);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderStore for RocksDBOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let _guard = self.write_lock.lock();
        if self.read(&order.number)?.is_some() {
            return Err(AccrualError::DuplicateOrder(order.number));
        }
        self.write(&order)
    }

    async fn get(&self, number: &str) -> Result<Option<Order>> {
        self.read(number)
    }

    async fn orders_by_status(
        &self,
        statuses: &[OrderStatus],
        exclude: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Order>> {
        let mut selected = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_PENDING)?, IteratorMode::Start) {
            if selected.len() >= limit {
                break;
            }
            let (key, value) =
                item.map_err(|e| internal(format!("RocksDB iteration error: {}", e)))?;
            let status: OrderStatus = serde_json::from_slice(&value)
                .map_err(|e| internal(format!("Corrupt pending entry: {}", e)))?;
            if !statuses.contains(&status) {
                continue;
            }
            let key = String::from_utf8_lossy(&key);
            let Some((_, number)) = key.rsplit_once('/') else {
                return Err(internal(format!("Malformed pending key: {}", key)));
            };
            if exclude.contains(number) {
                continue;
            }
            if let Some(order) = self.read(number)? {
                selected.push(order);
            }
        }
        Ok(selected)
    }

    async fn update_status_and_reward(
        &self,
        number: &str,
        status: OrderStatus,
        reward: Option<Reward>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut order = self
            .read(number)?
            .ok_or_else(|| AccrualError::OrderNotFound(number.to_string()))?;
        if !apply_update(&mut order, status, reward) {
            return Ok(false);
        }
        self.write(&order)?;
        Ok(true)
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        let mut orders = self.scan()?;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }
}
