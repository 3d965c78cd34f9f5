//! Inventory query port.
//!
//! The allocator and serializers only read clusters, network groups and
//! nodes through [`Inventory`]. [`MemoryInventory`] is the implementation
//! backed by a loaded configuration file.

use super::types::{
    Cluster, ClusterId, NetworkGroup, NetworkGroupId, Node, NodeId, NodeInterface, ADMIN_NETWORK,
};
use crate::config::{Config, NetworkConfig, NodeConfig};
use crate::ip::AddressRange;
use crate::utils::grouping::{group_by, Grouped};
use ipnet::Ipv4Net;
use std::collections::BTreeMap;

/// Read-only queries over clusters, network groups and nodes.
pub trait Inventory: Send + Sync {
    /// Every cluster, ordered by id
    fn clusters(&self) -> Vec<Cluster>;

    fn cluster(&self, id: ClusterId) -> Option<Cluster>;

    /// Network groups of a cluster, ordered by id
    fn network_groups(&self, cluster: ClusterId) -> Vec<NetworkGroup>;

    /// Group named `name` in `cluster`, or a global group when `cluster` is `None`
    fn network_group(&self, cluster: Option<ClusterId>, name: &str) -> Option<NetworkGroup>;

    /// Any node, including ones pending deletion
    fn node(&self, id: NodeId) -> Option<Node>;

    /// Cluster members ordered by id, excluding nodes pending deletion,
    /// optionally restricted to those holding `role`
    fn cluster_nodes(&self, cluster: ClusterId, role: Option<&str>) -> Vec<Node>;
}

/// In-memory inventory.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    clusters: BTreeMap<ClusterId, Cluster>,
    groups: BTreeMap<NetworkGroupId, NetworkGroup>,
    nodes: BTreeMap<NodeId, Node>,
    /// (cluster, group id) pairs keyed by cluster, ordered by group id
    groups_by_cluster: Grouped<Option<ClusterId>, (Option<ClusterId>, NetworkGroupId)>,
    /// (cluster, node id) pairs keyed by cluster, ordered by node id
    nodes_by_cluster: Grouped<Option<ClusterId>, (Option<ClusterId>, NodeId)>,
}

impl MemoryInventory {
    pub fn new(clusters: Vec<Cluster>, mut groups: Vec<NetworkGroup>, mut nodes: Vec<Node>) -> Self {
        for group in &mut groups {
            group.ranges.sort();
        }
        nodes.sort_by_key(|n| n.id);
        groups.sort_by_key(|g| g.id);

        let groups_by_cluster = group_by(groups.iter().map(|g| (g.cluster, g.id)), |(c, _)| *c);
        let nodes_by_cluster = group_by(nodes.iter().map(|n| (n.cluster, n.id)), |(c, _)| *c);

        Self {
            clusters: clusters.into_iter().map(|c| (c.id, c)).collect(),
            groups: groups.into_iter().map(|g| (g.id, g)).collect(),
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            groups_by_cluster,
            nodes_by_cluster,
        }
    }

    /// Build the inventory from a validated configuration.
    ///
    /// Network group ids are handed out in configuration order, the admin
    /// network first. Groups without explicit ranges get their CIDR's host
    /// span. Nodes whose interfaces list no networks carry every network
    /// of their cluster, plus admin, on their first interface.
    pub fn from_config(config: &Config) -> Self {
        let mut groups = Vec::new();
        let mut next_id: NetworkGroupId = 1;

        if let Some(admin) = &config.admin_network {
            groups.push(NetworkGroup {
                id: next_id,
                name: ADMIN_NETWORK.to_string(),
                cluster: None,
                cidr: admin.cidr,
                vlan_start: None,
                amount: None,
                network_size: None,
                gateway: admin.gateway,
                ranges: ranges_or_host_span(&admin.cidr, &admin.ranges),
            });
            next_id += 1;
        }

        let mut clusters = Vec::with_capacity(config.clusters.len());
        let mut nodes = Vec::new();
        for cluster in &config.clusters {
            clusters.push(Cluster {
                id: cluster.id,
                mode: cluster.mode.clone(),
                net_manager: cluster.net_manager,
                net_provider: cluster.net_provider,
                attributes: cluster.attributes.clone(),
            });

            for network in &cluster.networks {
                groups.push(network_group(next_id, cluster.id, network));
                next_id += 1;
            }

            let network_names: Vec<&str> = cluster.networks.iter().map(|n| n.name.as_str()).collect();
            for node in &cluster.nodes {
                nodes.push(node_record(node, Some(cluster.id), &network_names));
            }
        }

        for node in &config.unassigned_nodes {
            nodes.push(node_record(node, None, &[]));
        }

        log::debug!(
            "Inventory holds {} clusters, {} network groups, {} nodes",
            clusters.len(),
            groups.len(),
            nodes.len()
        );
        Self::new(clusters, groups, nodes)
    }
}

fn ranges_or_host_span(cidr: &Ipv4Net, ranges: &[AddressRange]) -> Vec<AddressRange> {
    if !ranges.is_empty() {
        return ranges.to_vec();
    }
    let mut hosts = cidr.hosts();
    let first = hosts.next();
    let last = hosts.next_back().or(first);
    match (first, last) {
        (Some(first), Some(last)) => AddressRange::new(first, last).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn network_group(id: NetworkGroupId, cluster: ClusterId, network: &NetworkConfig) -> NetworkGroup {
    NetworkGroup {
        id,
        name: network.name.clone(),
        cluster: Some(cluster),
        cidr: network.cidr,
        vlan_start: network.vlan_start,
        amount: network.amount,
        network_size: network.network_size,
        gateway: network.gateway,
        ranges: ranges_or_host_span(&network.cidr, &network.ranges),
    }
}

fn node_record(node: &NodeConfig, cluster: Option<ClusterId>, networks: &[&str]) -> Node {
    let mut interfaces: Vec<NodeInterface> = node
        .interfaces
        .iter()
        .map(|iface| NodeInterface {
            name: iface.name.clone(),
            mac: iface.mac.clone(),
            networks: iface.networks.clone(),
        })
        .collect();

    if interfaces.iter().all(|iface| iface.networks.is_empty()) {
        if let Some(first) = interfaces.first_mut() {
            first.networks.push(ADMIN_NETWORK.to_string());
            first.networks.extend(networks.iter().map(|n| n.to_string()));
        }
    }

    Node {
        id: node.id,
        cluster,
        fqdn: node.fqdn.clone(),
        roles: node.roles.clone(),
        status: node.status.clone(),
        online: node.online,
        pending_deletion: node.pending_deletion,
        interfaces,
    }
}

impl Inventory for MemoryInventory {
    fn clusters(&self) -> Vec<Cluster> {
        self.clusters.values().cloned().collect()
    }

    fn cluster(&self, id: ClusterId) -> Option<Cluster> {
        self.clusters.get(&id).cloned()
    }

    fn network_groups(&self, cluster: ClusterId) -> Vec<NetworkGroup> {
        self.groups_by_cluster
            .get(&Some(cluster))
            .iter()
            .filter_map(|(_, id)| self.groups.get(id).cloned())
            .collect()
    }

    fn network_group(&self, cluster: Option<ClusterId>, name: &str) -> Option<NetworkGroup> {
        self.groups_by_cluster
            .get(&cluster)
            .iter()
            .filter_map(|(_, id)| self.groups.get(id))
            .find(|g| g.name == name)
            .cloned()
    }

    fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.get(&id).cloned()
    }

    fn cluster_nodes(&self, cluster: ClusterId, role: Option<&str>) -> Vec<Node> {
        self.nodes_by_cluster
            .get(&Some(cluster))
            .iter()
            .filter_map(|(_, id)| self.nodes.get(id))
            .filter(|n| !n.pending_deletion)
            .filter(|n| role.map_or(true, |r| n.has_role(r)))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY: &str = r#"
general:
  master_ip: 10.20.0.2
admin_network:
  cidr: 10.20.0.0/24
clusters:
  - id: 1
    mode: multinode
    networks:
      - name: management
        cidr: 192.168.0.0/24
        ranges:
          - { first: 192.168.0.100, last: 192.168.0.120 }
          - { first: 192.168.0.10, last: 192.168.0.20 }
      - { name: storage, cidr: 192.168.1.0/24 }
    nodes:
      - id: 3
        fqdn: node-3.example.org
        roles: [compute]
        interfaces:
          - { name: eth0, mac: "52:54:00:00:00:03" }
          - { name: eth1, mac: "52:54:00:00:00:04" }
      - id: 1
        fqdn: node-1.example.org
        roles: [controller]
        interfaces:
          - { name: eth0, mac: "52:54:00:00:00:01", networks: [admin] }
          - { name: eth1, mac: "52:54:00:00:00:02", networks: [management, storage] }
      - id: 2
        fqdn: node-2.example.org
        roles: [controller]
        pending_deletion: true
unassigned_nodes:
  - id: 9
    fqdn: node-9.example.org
"#;

    fn inventory() -> MemoryInventory {
        let config: Config = serde_yaml::from_str(INVENTORY).unwrap();
        config.validate().unwrap();
        MemoryInventory::from_config(&config)
    }

    #[test]
    fn test_groups_and_default_ranges() {
        let inv = inventory();
        let admin = inv.network_group(None, "admin").unwrap();
        assert_eq!(admin.id, 1);
        assert_eq!(admin.ranges[0].to_string(), "10.20.0.1-10.20.0.254");

        let management = inv.network_group(Some(1), "management").unwrap();
        assert_eq!(management.ranges[0].to_string(), "192.168.0.10-192.168.0.20");
        assert!(inv.network_group(Some(1), "admin").is_none());

        let names: Vec<String> = inv.network_groups(1).into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["management", "storage"]);
        assert!(inv.network_groups(7).is_empty());
    }

    #[test]
    fn test_cluster_nodes_skip_pending_deletion() {
        let inv = inventory();
        let ids: Vec<NodeId> = inv.cluster_nodes(1, None).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let controllers: Vec<NodeId> = inv
            .cluster_nodes(1, Some("controller"))
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(controllers, vec![1]);

        // Direct lookups still see the node
        assert!(inv.node(2).unwrap().pending_deletion);
        assert_eq!(inv.node(9).unwrap().cluster, None);
    }

    #[test]
    fn test_default_interface_membership() {
        let inv = inventory();
        let node = inv.node(3).unwrap();
        assert_eq!(node.interfaces[0].networks, vec!["admin", "management", "storage"]);
        assert!(node.interfaces[1].networks.is_empty());

        let explicit = inv.node(1).unwrap();
        assert_eq!(explicit.interface_for_network("storage").unwrap().name, "eth1");
    }
}
