//! Fact document types.
//!
//! Everything here serializes into the per-node attribute maps handed to
//! the configuration-management engine. Field names are part of that
//! contract.

use super::network_scheme::NetworkScheme;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// A free-form attribute map, keys sorted
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Two fixed swift mount points, in the text form agents expect
pub const MOUNTPOINTS: &str = "1 1\\n2 2\\n";

/// Address setting of one interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceAddress {
    /// Address obtained from the admin network's DHCP
    Dhcp,
    /// Interface left unconfigured
    None,
    /// Static addresses in CIDR form
    Static(Vec<String>),
}

impl Serialize for InterfaceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InterfaceAddress::Dhcp => serializer.serialize_str("dhcp"),
            InterfaceAddress::None => serializer.serialize_str("none"),
            InterfaceAddress::Static(addrs) => addrs.serialize(serializer),
        }
    }
}

/// One entry of a node's `network_data` map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceDescriptor {
    pub interface: String,
    pub ipaddr: InterfaceAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
    /// Network that created the entry
    #[serde(rename = "_name", skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// Node entry of the cluster-wide `nodes` and `controller_nodes` lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub uid: String,
    pub fqdn: String,
    pub name: String,
    pub role: String,
    pub internal_address: String,
    pub internal_netmask: String,
    pub storage_address: String,
    pub storage_netmask: String,
    pub public_address: String,
    pub public_netmask: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mountpoints: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swift_zone: Option<String>,
}

/// Node-specific part of a fact map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFacts {
    pub uid: String,
    pub fqdn: String,
    pub status: String,
    pub role: String,
    pub online: bool,
    pub network_data: BTreeMap<String, InterfaceDescriptor>,
    /// `<network>_interface` keys
    #[serde(flatten)]
    pub interface_names: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_interface: Option<String>,
    /// Neutron clusters only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_scheme: Option<NetworkScheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NovaNetworkParameters {
    pub network_manager: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_networks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_start: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountPoint {
    pub point: String,
    pub weight: String,
}

impl MountPoint {
    /// The `mp` table matching [`MOUNTPOINTS`]
    pub fn defaults() -> Vec<MountPoint> {
        ["1", "2"]
            .into_iter()
            .map(|n| MountPoint {
                point: n.to_string(),
                weight: n.to_string(),
            })
            .collect()
    }
}

/// Cluster-wide part of every fact map, before it is flattened.
#[derive(Debug, Clone, Default)]
pub struct ClusterFacts {
    pub attributes: Attributes,
    pub controller_nodes: Vec<NodeSummary>,
    pub nodes: Vec<NodeSummary>,
}

impl ClusterFacts {
    pub fn into_attributes(self) -> Result<Attributes, serde_json::Error> {
        let mut attributes = self.attributes;
        attributes.insert(
            "controller_nodes".to_string(),
            serde_json::to_value(&self.controller_nodes)?,
        );
        attributes.insert("nodes".to_string(), serde_json::to_value(&self.nodes)?);
        Ok(attributes)
    }
}

/// Serialize a struct into an attribute map.
pub fn to_attributes<T: Serialize>(value: &T) -> Result<Attributes, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(value)?)
}
