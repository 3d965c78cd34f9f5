//! IP address allocation and management module.
//!
//! This module handles address ranges, free-address computation per network
//! group, the registry of committed assignments, and the idempotent
//! node/VIP assignment built on top of them.

pub mod allocator;
pub mod error;
pub mod pool;
pub mod range;
pub mod registry;

// Re-export commonly used types
pub use allocator::NodeNetworkAssigner;
pub use error::AllocationError;
pub use pool::AddressPool;
pub use range::AddressRange;
pub use registry::{AssignmentRecord, AssignmentRegistry, AssignmentStore, Owner};
