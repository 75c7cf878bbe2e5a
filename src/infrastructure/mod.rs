//! Adapters behind the domain ports: stores, clocks, the simulated gateway
//! and the notification sender.

pub mod gateway;
pub mod in_memory;
pub mod notify;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod system;
