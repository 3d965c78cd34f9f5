//! Inventory record types.
//!
//! These are the read-side records the allocator and serializers work on:
//! clusters, network groups with their address ranges, and nodes with their
//! discovered interfaces.

use crate::ip::AddressRange;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub type NodeId = u64;
pub type ClusterId = u64;
pub type NetworkGroupId = u64;

pub const ADMIN_NETWORK: &str = "admin";
pub const MANAGEMENT_NETWORK: &str = "management";
pub const STORAGE_NETWORK: &str = "storage";
pub const PUBLIC_NETWORK: &str = "public";
pub const FLOATING_NETWORK: &str = "floating";
pub const FIXED_NETWORK: &str = "fixed";

pub const CONTROLLER_ROLE: &str = "controller";
pub const PRIMARY_CONTROLLER_ROLE: &str = "primary-controller";

/// Network manager flavour of a cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetManager {
    /// Flat network, one fixed network shared by every tenant
    #[default]
    #[serde(rename = "FlatDHCPManager")]
    FlatDhcp,
    /// VLAN-segmented fixed networks
    #[serde(rename = "VlanManager")]
    Vlan,
}

impl NetManager {
    /// Name as it appears in fact documents
    pub fn as_str(&self) -> &'static str {
        match self {
            NetManager::FlatDhcp => "FlatDHCPManager",
            NetManager::Vlan => "VlanManager",
        }
    }
}

/// Networking provider of a cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetProvider {
    #[default]
    NovaNetwork,
    Neutron,
}

/// A cluster and its deployment settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    /// Raw deployment mode; interpreted when a serializer is selected
    pub mode: String,
    pub net_manager: NetManager,
    pub net_provider: NetProvider,
    /// Merged free-form cluster attributes, copied into every fact map
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Named, CIDR-scoped network segment.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkGroup {
    pub id: NetworkGroupId,
    pub name: String,
    /// `None` for global groups such as the admin network
    pub cluster: Option<ClusterId>,
    pub cidr: Ipv4Net,
    pub vlan_start: Option<u16>,
    pub amount: Option<u32>,
    pub network_size: Option<u32>,
    pub gateway: Option<Ipv4Addr>,
    /// Sorted by `first`
    pub ranges: Vec<AddressRange>,
}

impl NetworkGroup {
    /// Network, broadcast and gateway addresses are never handed out.
    pub fn is_reserved(&self, addr: Ipv4Addr) -> bool {
        addr == self.cidr.network()
            || addr == self.cidr.broadcast()
            || Some(addr) == self.gateway
    }
}

/// Physical interface as discovered on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInterface {
    pub name: String,
    pub mac: String,
    /// Names of network groups carried by this interface
    pub networks: Vec<String>,
}

impl NodeInterface {
    pub fn carries(&self, network: &str) -> bool {
        self.networks.iter().any(|n| n == network)
    }
}

/// A cluster member (or unallocated node when `cluster` is `None`).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub cluster: Option<ClusterId>,
    pub fqdn: String,
    pub roles: Vec<String>,
    pub status: String,
    pub online: bool,
    pub pending_deletion: bool,
    pub interfaces: Vec<NodeInterface>,
}

impl Node {
    /// Distinct roles in first-seen order
    pub fn distinct_roles(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.roles.len());
        for role in &self.roles {
            if !seen.contains(&role.as_str()) {
                seen.push(role);
            }
        }
        seen
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// First interface carrying the named network
    pub fn interface_for_network(&self, network: &str) -> Option<&NodeInterface> {
        self.interfaces.iter().find(|iface| iface.carries(network))
    }

    /// Short host name handed to deployment agents
    pub fn slave_name(&self) -> String {
        format!("node-{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(cidr: &str, gateway: Option<&str>) -> NetworkGroup {
        NetworkGroup {
            id: 1,
            name: "management".to_string(),
            cluster: Some(1),
            cidr: cidr.parse().unwrap(),
            vlan_start: None,
            amount: None,
            network_size: None,
            gateway: gateway.map(|g| g.parse().unwrap()),
            ranges: Vec::new(),
        }
    }

    #[test]
    fn test_reserved_addresses() {
        let g = group("192.168.0.0/24", Some("192.168.0.1"));
        assert!(g.is_reserved("192.168.0.0".parse().unwrap()));
        assert!(g.is_reserved("192.168.0.255".parse().unwrap()));
        assert!(g.is_reserved("192.168.0.1".parse().unwrap()));
        assert!(!g.is_reserved("192.168.0.2".parse().unwrap()));
    }

    #[test]
    fn test_distinct_roles_keep_order() {
        let node = Node {
            id: 4,
            cluster: Some(1),
            fqdn: "node-4.example.org".to_string(),
            roles: vec!["compute".into(), "cinder".into(), "compute".into()],
            status: "ready".to_string(),
            online: true,
            pending_deletion: false,
            interfaces: Vec::new(),
        };
        assert_eq!(node.distinct_roles(), vec!["compute", "cinder"]);
        assert_eq!(node.slave_name(), "node-4");
    }

    #[test]
    fn test_net_manager_names() {
        let parsed: NetManager = serde_yaml::from_str("VlanManager").unwrap();
        assert_eq!(parsed, NetManager::Vlan);
        assert_eq!(NetManager::FlatDhcp.as_str(), "FlatDHCPManager");
    }

    #[test]
    fn test_net_provider_names() {
        let parsed: NetProvider = serde_yaml::from_str("neutron").unwrap();
        assert_eq!(parsed, NetProvider::Neutron);
        let parsed: NetProvider = serde_yaml::from_str("nova_network").unwrap();
        assert_eq!(parsed, NetProvider::NovaNetwork);
    }
}
