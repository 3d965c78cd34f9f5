//! Allocation errors.

use crate::inventory::{ClusterId, NetworkGroupId, NodeId};
use std::net::Ipv4Addr;

/// Errors raised while assigning addresses. None of them leave partial
/// assignments behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("Address space of network '{network}' exhausted: requested {requested}, {available} free")]
    AddressSpaceExhausted {
        network: String,
        requested: usize,
        available: usize,
    },

    #[error("Address {address} in network group {group} is already assigned to {owner}")]
    DuplicateAssignment {
        group: NetworkGroupId,
        address: Ipv4Addr,
        owner: String,
    },

    #[error("Network '{network}' is not defined for {scope}")]
    UnknownNetwork { network: String, scope: String },

    #[error("Node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("Cluster {0} does not exist")]
    UnknownCluster(ClusterId),

    #[error("Node {0} is pending deletion")]
    NodePendingDeletion(NodeId),
}
