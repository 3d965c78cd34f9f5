//! Deployment fact serialization.
//!
//! [`TopologySerializer`] turns a cluster whose addresses are already
//! assigned into one attribute map per node and role. The provided trait
//! methods are the multinode behaviour; [`DeploymentSerializer`] uses them
//! as they are, and the HA serializer overrides a few of them and calls the
//! free functions of this module to reach the base behaviour.

use super::error::SerializeError;
use super::interfaces::{add_hw_interfaces, configure_interfaces, interfaces_list};
use super::network_scheme::build_network_scheme;
use super::types::{to_attributes, Attributes, ClusterFacts, NodeFacts, NodeSummary, NovaNetworkParameters};
use crate::inventory::{
    Cluster, ClusterId, Inventory, NetManager, NetProvider, Node, NodeId, CONTROLLER_ROLE, FIXED_NETWORK,
    FLOATING_NETWORK, MANAGEMENT_NETWORK, PUBLIC_NETWORK, STORAGE_NETWORK,
};
use crate::ip::{AssignmentStore, NodeNetworkAssigner};
use crate::topology::{node_networks, NetworkEntry};
use crate::utils::ip_utils::address_and_netmask;
use serde_json::{json, Value};
use std::net::Ipv4Addr;

/// Settings passed to every serializer
#[derive(Debug, Clone)]
pub struct FactSettings {
    /// Address of the master node, published as `master_ip`
    pub master_ip: Ipv4Addr,
}

/// What a serializer reads from, plus the assigner used for HA VIPs.
#[derive(Clone, Copy)]
pub struct FactContext<'a> {
    pub assigner: &'a NodeNetworkAssigner,
    pub settings: &'a FactSettings,
}

impl<'a> FactContext<'a> {
    pub fn new(assigner: &'a NodeNetworkAssigner, settings: &'a FactSettings) -> Self {
        Self { assigner, settings }
    }

    pub fn inventory(&self) -> &'a dyn Inventory {
        self.assigner.inventory()
    }

    pub fn store(&self) -> &'a dyn AssignmentStore {
        self.assigner.store()
    }

    fn node_networks(&self, node: &Node) -> Vec<NetworkEntry> {
        node_networks(node, self.inventory(), self.store())
    }
}

/// Deployment priority counter, stepping by 100
#[derive(Debug, Default)]
pub struct Priority {
    current: u32,
}

impl Priority {
    const STEP: u32 = 100;

    pub fn next(&mut self) -> u32 {
        self.current += Self::STEP;
        self.current
    }
}

pub trait TopologySerializer {
    fn context(&self) -> &FactContext<'_>;

    /// Summaries of `nodes`, one per distinct role
    fn node_list(&self, nodes: &[Node]) -> Result<Vec<NodeSummary>, SerializeError> {
        base_node_list(self.context(), nodes)
    }

    /// Summaries of the cluster's live controllers, ordered by node id
    fn controller_nodes(&self, cluster: ClusterId) -> Result<Vec<NodeSummary>, SerializeError> {
        let controllers = self
            .context()
            .inventory()
            .cluster_nodes(cluster, Some(CONTROLLER_ROLE));
        let mut summaries = self.node_list(&controllers)?;
        summaries.retain(|s| s.role == CONTROLLER_ROLE);
        Ok(summaries)
    }

    /// Attributes shared by every node of the cluster
    fn cluster_facts(&self, cluster: &Cluster, nodes: &[Node]) -> Result<ClusterFacts, SerializeError> {
        base_cluster_facts(self, cluster, nodes)
    }

    /// Node-specific facts for one of the node's roles
    fn serialize_node(&self, cluster: &Cluster, node: &Node, role: &str) -> Result<NodeFacts, SerializeError> {
        base_serialize_node(self.context(), cluster, node, role)
    }

    /// Last adjustments to the per-node facts before priorities are set
    fn finalize_nodes(&self, _nodes: &mut [NodeFacts]) -> Result<(), SerializeError> {
        Ok(())
    }

    /// Controllers one by one, then everything else together
    fn set_deployment_priorities(&self, nodes: &mut [NodeFacts]) {
        let mut priority = Priority::default();
        for node in nodes.iter_mut().filter(|n| n.role == CONTROLLER_ROLE) {
            node.priority = Some(priority.next());
        }
        let others = priority.next();
        for node in nodes.iter_mut().filter(|n| n.role != CONTROLLER_ROLE) {
            node.priority = Some(others);
        }
    }

    /// One attribute map per live node and role, ordered by node id.
    ///
    /// Cluster-wide keys are merged into every map; node keys win.
    fn serialize_cluster(&self, cluster: &Cluster) -> Result<Vec<Attributes>, SerializeError> {
        let nodes = self.context().inventory().cluster_nodes(cluster.id, None);
        let common = self.cluster_facts(cluster, &nodes)?.into_attributes()?;

        let mut facts = Vec::with_capacity(nodes.len());
        for node in &nodes {
            for role in node.distinct_roles() {
                facts.push(self.serialize_node(cluster, node, role)?);
            }
        }
        self.finalize_nodes(&mut facts)?;
        self.set_deployment_priorities(&mut facts);

        facts
            .iter()
            .map(|node_facts| -> Result<Attributes, SerializeError> {
                let mut merged = common.clone();
                merged.extend(to_attributes(node_facts)?);
                Ok(merged)
            })
            .collect()
    }
}

/// Serializer for single-controller `multinode` clusters.
pub struct DeploymentSerializer<'a> {
    ctx: FactContext<'a>,
}

impl<'a> DeploymentSerializer<'a> {
    pub fn new(ctx: FactContext<'a>) -> Self {
        Self { ctx }
    }
}

impl TopologySerializer for DeploymentSerializer<'_> {
    fn context(&self) -> &FactContext<'_> {
        &self.ctx
    }
}

pub fn base_node_list(ctx: &FactContext<'_>, nodes: &[Node]) -> Result<Vec<NodeSummary>, SerializeError> {
    let mut summaries = Vec::with_capacity(nodes.len());
    for node in nodes {
        let entries = ctx.node_networks(node);
        let (internal_address, internal_netmask) = address_of(&entries, node.id, MANAGEMENT_NETWORK)?;
        let (storage_address, storage_netmask) = address_of(&entries, node.id, STORAGE_NETWORK)?;
        let (public_address, public_netmask) = address_of(&entries, node.id, PUBLIC_NETWORK)?;

        for role in node.distinct_roles() {
            summaries.push(NodeSummary {
                uid: node.id.to_string(),
                fqdn: node.fqdn.clone(),
                name: node.slave_name(),
                role: role.to_string(),
                internal_address: internal_address.clone(),
                internal_netmask: internal_netmask.clone(),
                storage_address: storage_address.clone(),
                storage_netmask: storage_netmask.clone(),
                public_address: public_address.clone(),
                public_netmask: public_netmask.clone(),
                mountpoints: None,
                swift_zone: None,
            });
        }
    }
    Ok(summaries)
}

fn address_of(
    entries: &[NetworkEntry],
    node: NodeId,
    network: &str,
) -> Result<(String, String), SerializeError> {
    entries
        .iter()
        .find(|entry| entry.name == network)
        .and_then(|entry| entry.ip)
        .map(|ip| address_and_netmask(&ip))
        .ok_or_else(|| SerializeError::MissingNetworkAssignment {
            node,
            network: network.to_string(),
        })
}

/// Cluster-wide attributes as the multinode serializer builds them. Node
/// summaries come from `serializer`, so overrides of `node_list` apply.
pub fn base_cluster_facts<S: TopologySerializer + ?Sized>(
    serializer: &S,
    cluster: &Cluster,
    nodes: &[Node],
) -> Result<ClusterFacts, SerializeError> {
    let ctx = serializer.context();
    let mut attributes = cluster.attributes.clone();
    attributes.insert("deployment_mode".to_string(), json!(cluster.mode));
    attributes.insert("deployment_id".to_string(), json!(cluster.id));
    attributes.insert("master_ip".to_string(), json!(ctx.settings.master_ip.to_string()));
    if cluster.net_provider == NetProvider::NovaNetwork {
        attributes.insert(
            "novanetwork_parameters".to_string(),
            serde_json::to_value(novanetwork_parameters(ctx, cluster)?)?,
        );
    }
    attributes.extend(network_ranges(ctx, cluster.id));

    let controller_nodes = serializer.controller_nodes(cluster.id)?;
    let nodes = serializer.node_list(nodes)?;
    if nodes.iter().any(|n| n.role == "cinder") {
        attributes.insert("use_cinder".to_string(), json!(true));
    }

    Ok(ClusterFacts {
        attributes,
        controller_nodes,
        nodes,
    })
}

pub fn novanetwork_parameters(
    ctx: &FactContext<'_>,
    cluster: &Cluster,
) -> Result<NovaNetworkParameters, SerializeError> {
    let fixed = ctx
        .inventory()
        .network_group(Some(cluster.id), FIXED_NETWORK)
        .ok_or_else(|| SerializeError::MissingNetworkGroup {
            cluster: cluster.id,
            network: FIXED_NETWORK.to_string(),
        })?;

    let mut params = NovaNetworkParameters {
        network_manager: cluster.net_manager.as_str(),
        network_size: fixed.network_size,
        num_networks: None,
        vlan_start: None,
    };
    if cluster.net_manager == NetManager::Vlan {
        params.num_networks = fixed.amount;
        params.vlan_start = fixed.vlan_start;
    }
    Ok(params)
}

/// `<network>_network_range` keys. Floating lists its ranges, public is
/// left out, every other network gives its CIDR.
pub fn network_ranges(ctx: &FactContext<'_>, cluster: ClusterId) -> Attributes {
    let mut ranges = Attributes::new();
    for group in ctx.inventory().network_groups(cluster) {
        let value = match group.name.as_str() {
            PUBLIC_NETWORK => continue,
            FLOATING_NETWORK => Value::from(
                group
                    .ranges
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>(),
            ),
            _ => Value::from(group.cidr.to_string()),
        };
        ranges.insert(format!("{}_network_range", group.name), value);
    }
    ranges
}

pub fn base_serialize_node(
    ctx: &FactContext<'_>,
    cluster: &Cluster,
    node: &Node,
    role: &str,
) -> Result<NodeFacts, SerializeError> {
    let entries = ctx.node_networks(node);
    let mut network_data = configure_interfaces(&entries);
    add_hw_interfaces(&mut network_data, &node.interfaces);

    let (vlan_interface, fixed_interface) = if cluster.net_manager == NetManager::Vlan {
        let iface = node.interface_for_network(FIXED_NETWORK).ok_or_else(|| {
            SerializeError::MissingNetworkAssignment {
                node: node.id,
                network: FIXED_NETWORK.to_string(),
            }
        })?;
        (Some(iface.name.clone()), Some(iface.name.clone()))
    } else {
        (None, None)
    };
    let network_scheme =
        (cluster.net_provider == NetProvider::Neutron).then(|| build_network_scheme(&entries));

    Ok(NodeFacts {
        uid: node.id.to_string(),
        fqdn: node.fqdn.clone(),
        status: node.status.clone(),
        role: role.to_string(),
        online: node.online,
        network_data,
        interface_names: interfaces_list(&entries),
        vlan_interface,
        fixed_interface,
        network_scheme,
        priority: None,
    })
}
