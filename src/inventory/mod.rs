//! Cluster, network group and node records.
//!
//! This module holds the read-side inventory the allocator and the fact
//! serializers consume, and the query port they consume it through.

pub mod store;
pub mod types;

pub use store::{Inventory, MemoryInventory};
pub use types::*;
