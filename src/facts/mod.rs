//! Deployment fact generation.
//!
//! A cluster's deployment mode selects the serializer: `multinode` uses
//! [`DeploymentSerializer`], any mode starting with `ha` uses
//! [`HaDeploymentSerializer`]. Any other mode is rejected rather than
//! defaulted.

pub mod error;
pub mod ha;
pub mod interfaces;
pub mod network_scheme;
pub mod serializer;
pub mod types;

pub use error::SerializeError;
pub use ha::HaDeploymentSerializer;
pub use serializer::{DeploymentSerializer, FactContext, FactSettings, TopologySerializer};
pub use types::{Attributes, NodeFacts, NodeSummary};

use crate::inventory::{Cluster, ClusterId};

/// Serializer family of a deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Multinode,
    Ha,
}

impl DeploymentMode {
    pub fn of(cluster: &Cluster) -> Result<Self, SerializeError> {
        match cluster.mode.as_str() {
            "multinode" => Ok(DeploymentMode::Multinode),
            mode if mode.starts_with("ha") => Ok(DeploymentMode::Ha),
            mode => Err(SerializeError::UnknownDeploymentMode {
                cluster: cluster.id,
                mode: mode.to_string(),
            }),
        }
    }
}

/// Pick the serializer for `cluster`'s deployment mode.
pub fn serializer_for<'a>(
    cluster: &Cluster,
    ctx: FactContext<'a>,
) -> Result<Box<dyn TopologySerializer + 'a>, SerializeError> {
    Ok(match DeploymentMode::of(cluster)? {
        DeploymentMode::Multinode => Box::new(DeploymentSerializer::new(ctx)),
        DeploymentMode::Ha => Box::new(HaDeploymentSerializer::new(ctx)),
    })
}

/// Build the fact document of one cluster: one attribute map per live node
/// and role. Any error aborts the whole document.
pub fn serialize_cluster(ctx: FactContext<'_>, cluster_id: ClusterId) -> Result<Vec<Attributes>, SerializeError> {
    let result = ctx
        .inventory()
        .cluster(cluster_id)
        .ok_or(SerializeError::UnknownCluster(cluster_id))
        .and_then(|cluster| serializer_for(&cluster, ctx)?.serialize_cluster(&cluster));

    match &result {
        Ok(facts) => log::info!("Serialized {} fact maps for cluster {}", facts.len(), cluster_id),
        Err(e) => log::error!("Cannot serialize cluster {}: {}", cluster_id, e),
    }
    result
}
