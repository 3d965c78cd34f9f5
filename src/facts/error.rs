use crate::inventory::{ClusterId, NodeId};
use crate::ip::AllocationError;

/// Failures that abort fact generation for a whole cluster.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("Node {node} has no address in network '{network}'")]
    MissingNetworkAssignment { node: NodeId, network: String },

    #[error("Cluster {cluster} has no '{network}' network group")]
    MissingNetworkGroup { cluster: ClusterId, network: String },

    #[error("HA cluster {0} has no controller nodes")]
    NoControllerFound(ClusterId),

    #[error("Unknown deployment mode '{mode}' for cluster {cluster}")]
    UnknownDeploymentMode { cluster: ClusterId, mode: String },

    #[error("Cluster {0} does not exist")]
    UnknownCluster(ClusterId),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Failed to build fact document: {0}")]
    Json(#[from] serde_json::Error),
}
