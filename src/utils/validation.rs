//! Configuration validation utilities.
//!
//! This module provides the consistency checks run on an inventory
//! configuration after parsing: identifier uniqueness, address range
//! sanity and interface definitions.

use crate::config::{ClusterConfig, NodeConfig, ValidationError};
use crate::inventory::ADMIN_NETWORK;
use crate::ip::AddressRange;
use ipnet::Ipv4Net;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Match: "52:54:00:12:34:56"
static MAC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").expect("Invalid MAC regex")
});

/// Check whether a string is a colon-separated 48-bit MAC address
///
/// # Examples
/// ```
/// use deployfacts::utils::validation::is_valid_mac;
///
/// assert!(is_valid_mac("52:54:00:12:34:56"));
/// assert!(!is_valid_mac("52-54-00-12-34-56"));
/// ```
pub fn is_valid_mac(mac: &str) -> bool {
    MAC_PATTERN.is_match(mac)
}

/// Validate that cluster ids are unique
pub fn validate_cluster_ids(clusters: &[ClusterConfig]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for cluster in clusters {
        if !seen.insert(cluster.id) {
            return Err(ValidationError::InvalidCluster(format!(
                "cluster id {} is used more than once",
                cluster.id
            )));
        }
    }
    Ok(())
}

/// Validate that node ids are unique across every cluster and the
/// unassigned pool
pub fn validate_node_ids<'a>(
    nodes: impl IntoIterator<Item = &'a NodeConfig>,
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.id) {
            return Err(ValidationError::InvalidNode(format!(
                "node id {} is used more than once",
                node.id
            )));
        }
    }
    Ok(())
}

/// Validate the address ranges of one network group
///
/// Checks for:
/// - Inverted bounds (`first > last`)
/// - Overlapping ranges inside the group
///
/// Ranges reaching outside the CIDR are tolerated but logged, since the
/// allocator only excludes the CIDR's network, broadcast and gateway
/// addresses.
///
/// # Arguments
/// * `name` - Network name, used in messages
/// * `cidr` - The group's CIDR
/// * `ranges` - Ranges in configuration order
///
/// # Returns
/// * `Ok(())` if validation succeeds
/// * `Err(ValidationError::InvalidNetwork)` describing the first problem found
pub fn validate_network_ranges(
    name: &str,
    cidr: &Ipv4Net,
    ranges: &[AddressRange],
) -> Result<(), ValidationError> {
    for range in ranges {
        if range.first > range.last {
            return Err(ValidationError::InvalidNetwork(format!(
                "range {} of network '{}' has first > last",
                range, name
            )));
        }
        if !cidr.contains(&range.first) || !cidr.contains(&range.last) {
            log::warn!(
                "Range {} of network '{}' reaches outside its CIDR {}",
                range,
                name,
                cidr
            );
        }
    }

    let mut sorted: Vec<&AddressRange> = ranges.iter().collect();
    sorted.sort();
    for pair in sorted.windows(2) {
        if pair[0].overlaps(pair[1]) {
            return Err(ValidationError::InvalidNetwork(format!(
                "ranges {} and {} of network '{}' overlap",
                pair[0], pair[1], name
            )));
        }
    }

    Ok(())
}

/// Validate a node's interfaces
///
/// Every interface needs a well-formed MAC address and a unique name, and
/// may only carry networks known to the node's cluster (plus the global
/// admin network).
pub fn validate_interfaces(node: &NodeConfig, networks: &[&str]) -> Result<(), ValidationError> {
    let mut names = HashSet::new();
    for iface in &node.interfaces {
        if !names.insert(iface.name.as_str()) {
            return Err(ValidationError::InvalidNode(format!(
                "node {} has two interfaces named '{}'",
                node.id, iface.name
            )));
        }
        if !is_valid_mac(&iface.mac) {
            return Err(ValidationError::InvalidNode(format!(
                "interface '{}' of node {} has invalid MAC '{}'",
                iface.name, node.id, iface.mac
            )));
        }
        for network in &iface.networks {
            if network != ADMIN_NETWORK && !networks.contains(&network.as_str()) {
                return Err(ValidationError::InvalidNode(format!(
                    "interface '{}' of node {} carries unknown network '{}'",
                    iface.name, node.id, network
                )));
            }
        }
    }
    Ok(())
}
