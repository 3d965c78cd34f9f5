//! Per-node network entries.

use super::types::NetworkEntry;
use crate::inventory::{Inventory, NetManager, Node, ADMIN_NETWORK, FIXED_NETWORK};
use crate::ip::AssignmentStore;
use crate::utils::ip_utils::with_network_prefix;

/// Networks attached to `node`: the admin network first, then the node's
/// cluster groups in id order.
///
/// A group is attached when one of the node's interfaces carries it. With
/// the VLAN manager the `fixed` network is never listed; it is reached
/// through the node's `vlan_interface` instead. Nodes outside any cluster
/// have no networks.
pub fn node_networks(
    node: &Node,
    inventory: &dyn Inventory,
    store: &dyn AssignmentStore,
) -> Vec<NetworkEntry> {
    let Some(cluster) = node.cluster.and_then(|id| inventory.cluster(id)) else {
        return Vec::new();
    };

    let mut groups = Vec::new();
    if let Some(admin) = inventory.network_group(None, ADMIN_NETWORK) {
        groups.push(admin);
    }
    groups.extend(inventory.network_groups(cluster.id));

    let mut entries = Vec::with_capacity(groups.len());
    for group in groups {
        if cluster.net_manager == NetManager::Vlan && group.name == FIXED_NETWORK {
            continue;
        }
        let Some(iface) = node.interface_for_network(&group.name) else {
            continue;
        };

        let ip = store
            .node_addresses(node.id, group.id)
            .first()
            .map(|addr| with_network_prefix(*addr, &group.cidr));

        entries.push(NetworkEntry {
            name: group.name.clone(),
            ip,
            vlan: group.vlan_start,
            dev: Some(iface.name.clone()),
            gateway: group.gateway,
            netmask: ip.map(|net| net.netmask()),
            brd: ip.map(|net| net.broadcast()),
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::inventory::MemoryInventory;
    use crate::ip::{AssignmentRegistry, NodeNetworkAssigner};
    use std::sync::Arc;

    fn assigner(net_manager: &str) -> NodeNetworkAssigner {
        let yaml = format!(
            r#"
general:
  master_ip: 10.20.0.2
admin_network:
  cidr: 10.20.0.0/24
clusters:
  - id: 1
    mode: multinode
    net_manager: {net_manager}
    networks:
      - {{ name: management, cidr: 192.168.0.0/24, vlan_start: 101 }}
      - {{ name: fixed, cidr: 10.0.0.0/16, vlan_start: 103 }}
      - {{ name: public, cidr: 172.16.0.0/24, gateway: 172.16.0.1 }}
    nodes:
      - id: 1
        fqdn: node-1.example.org
        roles: [compute]
        interfaces:
          - {{ name: eth0, mac: "52:54:00:00:00:01", networks: [admin, management, public] }}
          - {{ name: eth1, mac: "52:54:00:00:00:02", networks: [fixed] }}
unassigned_nodes:
  - id: 2
    fqdn: node-2.example.org
    interfaces:
      - {{ name: eth0, mac: "52:54:00:00:00:03" }}
"#
        );
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        NodeNetworkAssigner::new(
            Arc::new(MemoryInventory::from_config(&config)),
            Arc::new(AssignmentRegistry::new()),
        )
    }

    #[test]
    fn test_entries_carry_addresses_and_devices() {
        let a = assigner("FlatDHCPManager");
        a.assign_address(1, "management").unwrap();
        a.assign_address(1, "public").unwrap();

        let node = a.inventory().node(1).unwrap();
        let entries = node_networks(&node, a.inventory(), a.store());
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "management", "fixed", "public"]);

        let management = &entries[1];
        assert_eq!(management.ip.unwrap().to_string(), "192.168.0.1/24");
        assert_eq!(management.interface_name().unwrap(), "eth0.101");
        assert_eq!(management.netmask.unwrap().to_string(), "255.255.255.0");
        assert_eq!(management.brd.unwrap().to_string(), "192.168.0.255");

        let public = &entries[3];
        // .1 is the gateway
        assert_eq!(public.ip.unwrap().to_string(), "172.16.0.2/24");
        assert_eq!(public.gateway.unwrap().to_string(), "172.16.0.1");

        let fixed = &entries[2];
        assert!(fixed.ip.is_none());
        assert_eq!(fixed.dev.as_deref(), Some("eth1"));
    }

    #[test]
    fn test_vlan_manager_hides_fixed() {
        let a = assigner("VlanManager");
        let node = a.inventory().node(1).unwrap();
        let entries = node_networks(&node, a.inventory(), a.store());
        assert!(entries.iter().all(|e| e.name != "fixed"));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_node_outside_cluster_has_no_networks() {
        let a = assigner("FlatDHCPManager");
        let node = a.inventory().node(2).unwrap();
        assert!(node_networks(&node, a.inventory(), a.store()).is_empty());
    }
}
