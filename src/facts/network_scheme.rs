//! Open vSwitch network scheme for neutron nodes.
//!
//! Every network gets a bridge. Per physical interface, the first of its
//! management, private and public bridges owns the interface as a port; the
//! other bridged networks are patched to it and the remaining networks hang
//! off it through an internal port.

use crate::inventory::ADMIN_NETWORK;
use crate::topology::NetworkEntry;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const SCHEME_VERSION: &str = "1.0";
const SCHEME_PROVIDER: &str = "ovs";
const DEFAULT_MTU: u32 = 1500;

/// Networks whose bridges are chained by patches
const PATCHED_NETWORKS: [&str; 3] = ["management", "private", "public"];

struct NetworkBridge {
    network: &'static str,
    bridge: &'static str,
    roles: &'static [&'static str],
}

static NETWORK_BRIDGES: [NetworkBridge; 6] = [
    NetworkBridge {
        network: ADMIN_NETWORK,
        bridge: "",
        roles: &["fweb-admin"],
    },
    NetworkBridge {
        network: "management",
        bridge: "br-mgmt",
        roles: &["management"],
    },
    NetworkBridge {
        network: "private",
        bridge: "br-prv",
        roles: &["private"],
    },
    NetworkBridge {
        network: "mesh",
        bridge: "mesh",
        roles: &["mesh"],
    },
    NetworkBridge {
        network: "public",
        bridge: "br-ex",
        roles: &["external"],
    },
    NetworkBridge {
        network: "storage",
        bridge: "storage",
        roles: &["swift", "cinder"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkScheme {
    pub version: &'static str,
    pub provider: &'static str,
    pub interfaces: BTreeMap<String, SchemeInterface>,
    pub endpoints: BTreeMap<String, Endpoint>,
    /// Role name to the bridge (or interface) serving it
    pub roles: BTreeMap<String, String>,
    pub transformations: Vec<Transformation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemeInterface {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    #[serde(rename = "IP")]
    pub ip: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Transformation {
    AddBr {
        name: String,
    },
    AddPort {
        name: String,
        bridge: String,
        /// `internal` when the port is itself a bridge
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        port_type: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tag: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        trunks: Option<Vec<u16>>,
    },
    AddPatch {
        bridges: [String; 2],
        tags: [Option<u16>; 2],
        trunks: Vec<u16>,
    },
}

impl NetworkScheme {
    fn new() -> Self {
        Self {
            version: SCHEME_VERSION,
            provider: SCHEME_PROVIDER,
            interfaces: BTreeMap::new(),
            endpoints: BTreeMap::new(),
            roles: BTreeMap::new(),
            transformations: Vec::new(),
        }
    }
}

/// Collects the transformations of one scheme
struct Transformations<'t> {
    tags: &'t HashMap<&'static str, Option<u16>>,
    actions: Vec<Transformation>,
}

impl Transformations<'_> {
    fn tag(&self, bridge: &str) -> Option<u16> {
        self.tags.get(bridge).copied().flatten()
    }

    fn add_bridge(&mut self, name: &str) {
        self.actions.push(Transformation::AddBr { name: name.to_string() });
    }

    fn add_port(&mut self, bridge: &str, port: &str) {
        let internal = self.tags.contains_key(port);
        self.actions.push(Transformation::AddPort {
            name: port.to_string(),
            bridge: bridge.to_string(),
            port_type: internal.then_some("internal"),
            tag: if internal { self.tag(port) } else { None },
            trunks: internal.then(Vec::new),
        });
    }

    fn add_bridge_port(&mut self, bridge: &str, port: &str) {
        self.add_bridge(bridge);
        self.add_port(bridge, port);
    }

    fn add_bridge_patch(&mut self, bridge: &str, peer: &str) {
        self.add_bridge(bridge);
        self.actions.push(Transformation::AddPatch {
            bridges: [bridge.to_string(), peer.to_string()],
            tags: [self.tag(peer), self.tag(bridge)],
            trunks: Vec::new(),
        });
    }
}

/// Build the scheme from a node's network entries. Networks without a
/// device, and networks with no bridge of their own (fixed, floating), are
/// left out.
pub fn build_network_scheme(entries: &[NetworkEntry]) -> NetworkScheme {
    let mut scheme = NetworkScheme::new();
    let mut bridge_tags: HashMap<&'static str, Option<u16>> = HashMap::new();
    // Physical interface to its non-admin networks, in first-seen order
    let mut nic_networks: Vec<(String, Vec<&'static NetworkBridge>)> = Vec::new();

    for entry in entries {
        let Some(network) = NETWORK_BRIDGES.iter().find(|b| b.network == entry.name) else {
            continue;
        };
        let Some(nic) = entry.dev.as_deref() else {
            continue;
        };

        let (holder, endpoint) = if network.network == ADMIN_NETWORK {
            scheme.interfaces.insert(nic.to_string(), SchemeInterface { mtu: None });
            let endpoint = Endpoint {
                ip: vec!["dhcp".to_string()],
                gateway: None,
            };
            (nic.to_string(), endpoint)
        } else {
            scheme
                .interfaces
                .insert(nic.to_string(), SchemeInterface { mtu: Some(DEFAULT_MTU) });
            match nic_networks.iter().position(|(name, _)| name == nic) {
                Some(i) => nic_networks[i].1.push(network),
                None => nic_networks.push((nic.to_string(), vec![network])),
            }
            bridge_tags.insert(network.bridge, entry.vlan);

            let gateway = entry
                .gateway
                .filter(|_| network.network == "public")
                .map(|gw| gw.to_string());
            let endpoint = Endpoint {
                ip: entry.ip.iter().map(|ip| ip.to_string()).collect(),
                gateway,
            };
            (network.bridge.to_string(), endpoint)
        };

        scheme.endpoints.insert(holder.clone(), endpoint);
        for role in network.roles {
            scheme.roles.insert(role.to_string(), holder.clone());
        }
    }

    let mut transformations = Transformations {
        tags: &bridge_tags,
        actions: Vec::new(),
    };
    for (nic, networks) in &nic_networks {
        let (patched, plain): (Vec<&&NetworkBridge>, Vec<&&NetworkBridge>) = networks
            .iter()
            .partition(|n| PATCHED_NETWORKS.contains(&n.network));

        let first_bridge = match patched.first() {
            Some(network) => network.bridge.to_string(),
            None => format!("br-{}", nic),
        };
        transformations.add_bridge_port(&first_bridge, nic);
        for network in patched.iter().skip(1) {
            transformations.add_bridge_patch(network.bridge, &first_bridge);
        }
        for network in plain {
            transformations.add_port(network.bridge, &first_bridge);
        }
    }
    scheme.transformations = transformations.actions;
    scheme
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, dev: &str, ip: Option<&str>, vlan: Option<u16>) -> NetworkEntry {
        NetworkEntry {
            name: name.to_string(),
            ip: ip.map(|ip| ip.parse().unwrap()),
            vlan,
            dev: Some(dev.to_string()),
            gateway: None,
            netmask: None,
            brd: None,
        }
    }

    fn entries() -> Vec<NetworkEntry> {
        let mut public = entry("public", "eth1", Some("172.16.0.3/24"), None);
        public.gateway = Some("172.16.0.1".parse().unwrap());
        vec![
            entry("admin", "eth0", Some("10.20.0.3/24"), None),
            entry("management", "eth0", Some("192.168.0.2/24"), Some(101)),
            entry("storage", "eth0", Some("192.168.1.2/24"), Some(102)),
            public,
            entry("fixed", "eth2", None, Some(103)),
        ]
    }

    #[test]
    fn test_endpoints_and_roles() {
        let scheme = build_network_scheme(&entries());
        assert_eq!(scheme.version, "1.0");
        assert_eq!(scheme.provider, "ovs");

        assert_eq!(scheme.interfaces.keys().collect::<Vec<_>>(), vec!["eth0", "eth1"]);
        assert_eq!(scheme.interfaces["eth0"].mtu, Some(1500));

        assert_eq!(scheme.endpoints["eth0"].ip, vec!["dhcp"]);
        assert_eq!(scheme.endpoints["br-mgmt"].ip, vec!["192.168.0.2/24"]);
        assert_eq!(scheme.endpoints["br-ex"].gateway.as_deref(), Some("172.16.0.1"));
        assert_eq!(scheme.endpoints["storage"].gateway, None);

        assert_eq!(scheme.roles["fweb-admin"], "eth0");
        assert_eq!(scheme.roles["external"], "br-ex");
        assert_eq!(scheme.roles["swift"], "storage");
        assert_eq!(scheme.roles["cinder"], "storage");
    }

    #[test]
    fn test_transformations() {
        let scheme = build_network_scheme(&entries());
        let actions = serde_json::to_value(&scheme.transformations).unwrap();
        assert_eq!(
            actions,
            json!([
                { "action": "add-br", "name": "br-mgmt" },
                { "action": "add-port", "name": "eth0", "bridge": "br-mgmt" },
                {
                    "action": "add-port",
                    "name": "br-mgmt",
                    "bridge": "storage",
                    "type": "internal",
                    "tag": 101,
                    "trunks": []
                },
                { "action": "add-br", "name": "br-ex" },
                { "action": "add-port", "name": "eth1", "bridge": "br-ex" }
            ])
        );
    }

    #[test]
    fn test_patched_bridges() {
        let entries = vec![
            entry("management", "eth0", Some("192.168.0.2/24"), Some(101)),
            entry("private", "eth0", None, Some(1000)),
        ];
        let scheme = build_network_scheme(&entries);
        assert_eq!(scheme.transformations.len(), 4);
        assert_eq!(
            scheme.transformations[3],
            Transformation::AddPatch {
                bridges: ["br-prv".to_string(), "br-mgmt".to_string()],
                tags: [Some(101), Some(1000)],
                trunks: vec![],
            }
        );
        assert!(scheme.endpoints["br-prv"].ip.is_empty());
    }

    #[test]
    fn test_interface_without_bridged_network() {
        let entries = vec![entry("storage", "eth3", Some("192.168.1.2/24"), None)];
        let scheme = build_network_scheme(&entries);
        assert_eq!(
            scheme.transformations,
            vec![
                Transformation::AddBr { name: "br-eth3".to_string() },
                Transformation::AddPort {
                    name: "eth3".to_string(),
                    bridge: "br-eth3".to_string(),
                    port_type: None,
                    tag: None,
                    trunks: None,
                },
                Transformation::AddPort {
                    name: "br-eth3".to_string(),
                    bridge: "storage".to_string(),
                    port_type: None,
                    tag: None,
                    trunks: None,
                },
            ]
        );
    }
}
