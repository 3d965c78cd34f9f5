//! HA deployment facts.
//!
//! Wraps the multinode serializer and augments its results: swift extras on
//! every summary, management and public VIPs (nova-network only),
//! `last_controller`, a single primary controller and HA deployment
//! priorities.

use super::error::SerializeError;
use super::serializer::{base_cluster_facts, DeploymentSerializer, FactContext, Priority, TopologySerializer};
use super::types::{ClusterFacts, MountPoint, NodeFacts, NodeSummary, MOUNTPOINTS};
use crate::inventory::{
    Cluster, NetProvider, Node, CONTROLLER_ROLE, MANAGEMENT_NETWORK, PRIMARY_CONTROLLER_ROLE, PUBLIC_NETWORK,
};
use serde_json::json;

/// Roles deployed before controllers, one shared step per role
const EARLY_ROLES: [&str; 3] = ["primary-swift-proxy", "swift-proxy", "storage"];

pub struct HaDeploymentSerializer<'a> {
    base: DeploymentSerializer<'a>,
}

impl<'a> HaDeploymentSerializer<'a> {
    pub fn new(ctx: FactContext<'a>) -> Self {
        Self {
            base: DeploymentSerializer::new(ctx),
        }
    }
}

fn is_controller_role(role: &str) -> bool {
    role == CONTROLLER_ROLE || role == PRIMARY_CONTROLLER_ROLE
}

/// Relabel the first controller role to primary-controller, unless a
/// primary is already present. Returns false when there is no controller.
fn set_primary_controller<'r>(roles: impl Iterator<Item = &'r mut String>) -> bool {
    let mut roles: Vec<&mut String> = roles.collect();
    if roles.iter().any(|role| role.as_str() == PRIMARY_CONTROLLER_ROLE) {
        return true;
    }
    match roles.iter_mut().find(|role| role.as_str() == CONTROLLER_ROLE) {
        Some(role) => {
            **role = PRIMARY_CONTROLLER_ROLE.to_string();
            true
        }
        None => false,
    }
}

impl TopologySerializer for HaDeploymentSerializer<'_> {
    fn context(&self) -> &FactContext<'_> {
        self.base.context()
    }

    fn node_list(&self, nodes: &[Node]) -> Result<Vec<NodeSummary>, SerializeError> {
        let mut summaries = self.base.node_list(nodes)?;
        for summary in &mut summaries {
            summary.mountpoints = Some(MOUNTPOINTS.to_string());
            summary.swift_zone = Some(summary.uid.clone());
        }
        Ok(summaries)
    }

    fn cluster_facts(&self, cluster: &Cluster, nodes: &[Node]) -> Result<ClusterFacts, SerializeError> {
        let mut facts = base_cluster_facts(self, cluster, nodes)?;

        // Greatest uid as text, no further tie-break
        let last_controller = facts
            .nodes
            .iter()
            .filter(|summary| is_controller_role(&summary.role))
            .max_by(|a, b| a.uid.cmp(&b.uid))
            .map(|c| c.name.clone())
            .ok_or(SerializeError::NoControllerFound(cluster.id))?;

        if cluster.net_provider == NetProvider::NovaNetwork {
            let assigner = self.context().assigner;
            let management_vip = assigner.assign_vip(cluster.id, MANAGEMENT_NETWORK)?;
            let public_vip = assigner.assign_vip(cluster.id, PUBLIC_NETWORK)?;

            facts.attributes.insert("management_vip".to_string(), json!(management_vip.to_string()));
            facts.attributes.insert("public_vip".to_string(), json!(public_vip.to_string()));
        }
        facts.attributes.insert("last_controller".to_string(), json!(last_controller));
        facts
            .attributes
            .insert("mp".to_string(), serde_json::to_value(MountPoint::defaults())?);

        set_primary_controller(facts.nodes.iter_mut().map(|n| &mut n.role));
        Ok(facts)
    }

    fn finalize_nodes(&self, nodes: &mut [NodeFacts]) -> Result<(), SerializeError> {
        set_primary_controller(nodes.iter_mut().map(|n| &mut n.role));
        Ok(())
    }

    fn set_deployment_priorities(&self, nodes: &mut [NodeFacts]) {
        let mut priority = Priority::default();

        for role in EARLY_ROLES {
            let step = priority.next();
            for node in nodes.iter_mut().filter(|n| n.role == role) {
                node.priority = Some(step);
            }
        }
        for role in [PRIMARY_CONTROLLER_ROLE, CONTROLLER_ROLE] {
            for node in nodes.iter_mut().filter(|n| n.role == role) {
                node.priority = Some(priority.next());
            }
        }

        let others = priority.next();
        for node in nodes.iter_mut().filter(|n| n.priority.is_none()) {
            node.priority = Some(others);
        }
    }
}
