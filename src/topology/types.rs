//! Topology type definitions.

use crate::utils::ip_utils::make_interface_name;
use ipnet::Ipv4Net;
use serde::Serialize;
use std::net::Ipv4Addr;

/// One network attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkEntry {
    /// Network group name
    pub name: String,
    /// Assigned address with the group's prefix length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ipv4Net>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    /// Physical device carrying the network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brd: Option<Ipv4Addr>,
}

impl NetworkEntry {
    /// `dev` or `dev.vlan`
    pub fn interface_name(&self) -> Option<String> {
        make_interface_name(self.dev.as_deref(), self.vlan)
    }
}
