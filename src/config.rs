use crate::inventory::{NetManager, NetProvider};
use crate::ip::AddressRange;
use crate::utils::validation::{
    validate_cluster_ids, validate_interfaces, validate_network_ranges, validate_node_ids,
};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Top-level inventory configuration that mirrors the YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    /// Global admin (provisioning) network shared by every cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_network: Option<AdminNetworkConfig>,
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
    /// Discovered nodes not yet added to any cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unassigned_nodes: Vec<NodeConfig>,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.master_ip.is_unspecified() {
            return Err(ValidationError::InvalidGeneral(
                "master_ip cannot be 0.0.0.0".to_string(),
            ));
        }

        validate_cluster_ids(&self.clusters)?;
        validate_node_ids(self.all_nodes())?;

        if let Some(admin) = &self.admin_network {
            validate_network_ranges("admin", &admin.cidr, &admin.ranges)?;
        }

        for cluster in &self.clusters {
            if cluster.mode.trim().is_empty() {
                return Err(ValidationError::InvalidCluster(format!(
                    "cluster {} has an empty deployment mode",
                    cluster.id
                )));
            }

            let mut names: Vec<&str> = Vec::with_capacity(cluster.networks.len());
            for network in &cluster.networks {
                if network.name.is_empty() {
                    return Err(ValidationError::InvalidNetwork(format!(
                        "cluster {} has a network without a name",
                        cluster.id
                    )));
                }
                if network.name == crate::inventory::ADMIN_NETWORK {
                    return Err(ValidationError::InvalidNetwork(format!(
                        "cluster {} redefines the global admin network",
                        cluster.id
                    )));
                }
                if names.contains(&network.name.as_str()) {
                    return Err(ValidationError::InvalidNetwork(format!(
                        "network '{}' is defined twice in cluster {}",
                        network.name, cluster.id
                    )));
                }
                names.push(&network.name);
                validate_network_ranges(&network.name, &network.cidr, &network.ranges)?;
            }

            for node in &cluster.nodes {
                if node.roles.is_empty() {
                    return Err(ValidationError::InvalidNode(format!(
                        "node {} in cluster {} has no roles",
                        node.id, cluster.id
                    )));
                }
                validate_interfaces(node, &names)?;
            }
        }

        for node in &self.unassigned_nodes {
            validate_interfaces(node, &[])?;
        }

        Ok(())
    }

    /// Every node, cluster members first
    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeConfig> {
        self.clusters
            .iter()
            .flat_map(|c| c.nodes.iter())
            .chain(self.unassigned_nodes.iter())
    }
}

/// Settings shared by every cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Address of the provisioning master, copied into every fact map
    pub master_ip: Ipv4Addr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Global admin network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminNetworkConfig {
    pub cidr: Ipv4Net,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
    /// Defaults to the whole host span of `cidr`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<AddressRange>,
}

/// One cluster with its networks and member nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub id: u64,
    /// `multinode` or an `ha*` mode
    pub mode: String,
    #[serde(default)]
    pub net_manager: NetManager,
    #[serde(default)]
    pub net_provider: NetProvider,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

/// Network group definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub cidr: Ipv4Net,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_start: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
    /// Defaults to the whole host span of `cidr`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<AddressRange>,
}

/// Node definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: u64,
    pub fqdn: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_online")]
    pub online: bool,
    #[serde(default)]
    pub pending_deletion: bool,
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
}

/// Discovered hardware interface and the networks it carries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    pub mac: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
}

fn default_status() -> String {
    "discover".to_string()
}

fn default_online() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid cluster configuration: {0}")]
    InvalidCluster(String),
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
    #[error("Invalid node configuration: {0}")]
    InvalidNode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
general:
  master_ip: 10.20.0.2
admin_network:
  cidr: 10.20.0.0/24
  ranges:
    - { first: 10.20.0.3, last: 10.20.0.254 }
clusters:
  - id: 1
    mode: multinode
    net_manager: VlanManager
    attributes:
      libvirt_type: qemu
    networks:
      - name: management
        cidr: 192.168.0.0/24
        vlan_start: 101
      - name: fixed
        cidr: 10.0.0.0/24
        vlan_start: 103
        amount: 10
        network_size: 256
    nodes:
      - id: 1
        fqdn: node-1.example.org
        roles: [controller]
        interfaces:
          - { name: eth0, mac: "52:54:00:00:00:01", networks: [admin, management] }
          - { name: eth1, mac: "52:54:00:00:00:02", networks: [fixed] }
"#;

    #[test]
    fn test_parse_inventory_config() {
        let config: Config = serde_yaml::from_str(BASIC).unwrap();
        assert!(config.validate().is_ok());

        let cluster = &config.clusters[0];
        assert_eq!(cluster.net_manager, NetManager::Vlan);
        assert_eq!(cluster.attributes["libvirt_type"], "qemu");
        assert_eq!(cluster.networks[1].amount, Some(10));

        let node = &cluster.nodes[0];
        assert_eq!(node.status, "discover");
        assert!(node.online);
        assert!(!node.pending_deletion);
    }

    #[test]
    fn test_net_manager_defaults_to_flat() {
        let yaml = r#"
general:
  master_ip: 10.20.0.2
clusters:
  - id: 3
    mode: ha_compact
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.clusters[0].net_manager, NetManager::FlatDhcp);
        assert_eq!(config.clusters[0].net_provider, NetProvider::NovaNetwork);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_network_rejected() {
        let yaml = r#"
general:
  master_ip: 10.20.0.2
clusters:
  - id: 1
    mode: multinode
    networks:
      - { name: management, cidr: 192.168.0.0/24 }
      - { name: management, cidr: 192.168.1.0/24 }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("defined twice"));
    }

    #[test]
    fn test_empty_mode_rejected() {
        let yaml = r#"
general:
  master_ip: 10.20.0.2
clusters:
  - { id: 1, mode: "" }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidCluster(_))
        ));
    }

    #[test]
    fn test_unspecified_master_ip_rejected() {
        let yaml = r#"
general:
  master_ip: 0.0.0.0
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidGeneral(_))
        ));
    }
}
