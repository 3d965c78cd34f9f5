//! Node network topology module.
//!
//! This module resolves, per node, which network groups it is attached to,
//! on which device and VLAN, and with which committed address. The fact
//! serializers build their interface maps from these entries.

pub mod network_data;
pub mod types;

// Re-export key types and functions for easier access
pub use network_data::node_networks;
pub use types::NetworkEntry;
