//! Adapters for the engine's ports: order stores and the HTTP accrual client.

pub mod http;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
