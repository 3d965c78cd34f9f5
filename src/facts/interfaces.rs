//! Interface maps of per-node facts.

use super::types::{InterfaceAddress, InterfaceDescriptor};
use crate::inventory::{NodeInterface, ADMIN_NETWORK, FLOATING_NETWORK, PUBLIC_NETWORK};
use crate::topology::NetworkEntry;
use std::collections::BTreeMap;

const LOOPBACK: &str = "lo";
const LOOPBACK_ADDRESS: &str = "127.0.0.1/8";

/// Build the `network_data` map from a node's network entries.
///
/// Floating shares the public interface and is skipped. Admin interfaces
/// use DHCP, and no interface ends up with an empty address list.
pub fn configure_interfaces(entries: &[NetworkEntry]) -> BTreeMap<String, InterfaceDescriptor> {
    let mut interfaces: BTreeMap<String, InterfaceDescriptor> = BTreeMap::new();

    for entry in entries {
        if entry.name == FLOATING_NETWORK {
            continue;
        }
        let Some(name) = entry.interface_name() else {
            continue;
        };

        let iface = interfaces
            .entry(name.clone())
            .or_insert_with(|| InterfaceDescriptor {
                interface: name,
                ipaddr: InterfaceAddress::Static(Vec::new()),
                gateway: None,
                network: Some(entry.name.clone()),
            });

        if entry.name == ADMIN_NETWORK {
            iface.ipaddr = InterfaceAddress::Dhcp;
        } else if let (Some(ip), InterfaceAddress::Static(addrs)) = (entry.ip, &mut iface.ipaddr) {
            addrs.push(ip.to_string());
        }

        if entry.name == PUBLIC_NETWORK {
            if let Some(gateway) = entry.gateway {
                iface.gateway = Some(gateway);
            }
        }
    }

    for iface in interfaces.values_mut() {
        if matches!(&iface.ipaddr, InterfaceAddress::Static(addrs) if addrs.is_empty()) {
            iface.ipaddr = InterfaceAddress::None;
        }
    }

    interfaces.insert(
        LOOPBACK.to_string(),
        InterfaceDescriptor {
            interface: LOOPBACK.to_string(),
            ipaddr: InterfaceAddress::Static(vec![LOOPBACK_ADDRESS.to_string()]),
            gateway: None,
            network: None,
        },
    );

    interfaces
}

/// Add discovered hardware interfaces that no network configured.
pub fn add_hw_interfaces(
    interfaces: &mut BTreeMap<String, InterfaceDescriptor>,
    hardware: &[NodeInterface],
) {
    for hw in hardware {
        interfaces
            .entry(hw.name.clone())
            .or_insert_with(|| InterfaceDescriptor {
                interface: hw.name.clone(),
                ipaddr: InterfaceAddress::None,
                gateway: None,
                network: None,
            });
    }
}

/// `<network>_interface` keys naming the interface of each network
pub fn interfaces_list(entries: &[NetworkEntry]) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter_map(|entry| {
            entry
                .interface_name()
                .map(|iface| (format!("{}_interface", entry.name), iface))
        })
        .collect()
}
