//! Deployment orchestrator.
//!
//! This module drives a run from a loaded configuration to written fact
//! documents: address assignment for every live node of each cluster,
//! fact serialization, and one document per cluster in the output
//! directory. Committed assignments can be carried between runs in a state
//! file so that repeated runs hand out the same addresses.

use crate::config::Config;
use crate::facts::{self, Attributes, FactContext, FactSettings, SerializeError};
use crate::inventory::{
    ClusterId, Inventory, MemoryInventory, ADMIN_NETWORK, MANAGEMENT_NETWORK, PUBLIC_NETWORK,
    STORAGE_NETWORK,
};
use crate::ip::{AllocationError, AssignmentRegistry, NodeNetworkAssigner};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Networks every live node gets an address in, when the cluster has them
const NODE_NETWORKS: [&str; 3] = [MANAGEMENT_NETWORK, PUBLIC_NETWORK, STORAGE_NETWORK];

/// Fact document encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    /// Assignment state loaded before and saved after the run
    pub state_path: Option<PathBuf>,
    /// Only handle this cluster
    pub cluster: Option<ClusterId>,
    pub format: OutputFormat,
}

/// Outcome of a run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Written documents by cluster
    pub written: Vec<(ClusterId, PathBuf)>,
    /// Clusters whose document was not produced
    pub failed: Vec<(ClusterId, SerializeError)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Assign every address a cluster's nodes need before serialization:
/// management, public and storage addresses for each live node, and one
/// admin address per hardware interface.
///
/// HA VIPs are not assigned here; the HA serializer draws them.
pub fn prepare_for_deployment(
    assigner: &NodeNetworkAssigner,
    cluster_id: ClusterId,
) -> std::result::Result<(), AllocationError> {
    let inventory = assigner.inventory();
    if inventory.cluster(cluster_id).is_none() {
        return Err(AllocationError::UnknownCluster(cluster_id));
    }

    let nodes = inventory.cluster_nodes(cluster_id, None);
    let node_ids: Vec<_> = nodes.iter().map(|n| n.id).collect();
    log::info!("Preparing {} nodes of cluster {} for deployment", nodes.len(), cluster_id);

    for network in NODE_NETWORKS {
        if inventory.network_group(Some(cluster_id), network).is_some() {
            assigner.assign_ips(&node_ids, network)?;
        } else {
            log::debug!("Cluster {} has no {} network", cluster_id, network);
        }
    }

    if inventory.network_group(None, ADMIN_NETWORK).is_some() {
        for node in &nodes {
            assigner.assign_admin_ips(node.id, node.interfaces.len().max(1))?;
        }
    }
    Ok(())
}

/// Prepare and serialize clusters in parallel. One result per cluster, in
/// the order given.
pub fn generate_deployment_facts(
    assigner: &NodeNetworkAssigner,
    settings: &FactSettings,
    clusters: &[ClusterId],
) -> Vec<(ClusterId, std::result::Result<Vec<Attributes>, SerializeError>)> {
    log::info!("Generating deployment facts for {} clusters", clusters.len());

    clusters
        .par_iter()
        .map(|&cluster_id| {
            let result = prepare_for_deployment(assigner, cluster_id)
                .map_err(SerializeError::from)
                .and_then(|()| facts::serialize_cluster(FactContext::new(assigner, settings), cluster_id));
            (cluster_id, result)
        })
        .collect()
}

fn document_path(output_dir: &Path, cluster_id: ClusterId, format: OutputFormat) -> PathBuf {
    output_dir.join(format!("deployment_{}.{}", cluster_id, format.extension()))
}

/// Write one cluster's document to `<output_dir>/deployment_<id>.<ext>`.
pub fn write_document(
    output_dir: &Path,
    cluster_id: ClusterId,
    facts: &[Attributes],
    format: OutputFormat,
) -> Result<PathBuf> {
    let path = document_path(output_dir, cluster_id, format);
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(facts)?,
        OutputFormat::Yaml => serde_yaml::to_string(facts)?,
    };
    fs::write(&path, content)
        .wrap_err_with(|| format!("Failed to write fact document '{}'", path.display()))?;
    Ok(path)
}

/// Remove the document a previous run wrote for a cluster that failed now,
/// so no outdated facts are left behind. Returns whether a file was removed.
pub fn remove_stale_document(
    output_dir: &Path,
    cluster_id: ClusterId,
    format: OutputFormat,
) -> Result<bool> {
    let path = document_path(output_dir, cluster_id, format);
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path)
        .wrap_err_with(|| format!("Failed to remove stale fact document '{}'", path.display()))?;
    log::warn!("Removed stale fact document {}", path.display());
    Ok(true)
}

/// Run the whole pipeline for a validated configuration.
pub fn run(config: &Config, options: &RunOptions) -> Result<RunReport> {
    let inventory = Arc::new(MemoryInventory::from_config(config));

    let registry = match &options.state_path {
        Some(path) if path.exists() => AssignmentRegistry::load(path)?,
        _ => AssignmentRegistry::new(),
    };
    let registry = Arc::new(registry);
    let assigner = NodeNetworkAssigner::new(inventory.clone(), registry.clone());

    let clusters: Vec<ClusterId> = match options.cluster {
        Some(id) => vec![id],
        None => inventory.clusters().iter().map(|c| c.id).collect(),
    };

    fs::create_dir_all(&options.output_dir).wrap_err_with(|| {
        format!(
            "Failed to create output directory '{}'",
            options.output_dir.display()
        )
    })?;

    let settings = FactSettings {
        master_ip: config.general.master_ip,
    };

    let mut report = RunReport::default();
    for (cluster_id, result) in generate_deployment_facts(&assigner, &settings, &clusters) {
        match result {
            Ok(facts) => {
                let path = write_document(&options.output_dir, cluster_id, &facts, options.format)?;
                log::info!("Wrote {} fact maps to {}", facts.len(), path.display());
                report.written.push((cluster_id, path));
            }
            Err(e) => {
                remove_stale_document(&options.output_dir, cluster_id, options.format)?;
                report.failed.push((cluster_id, e));
            }
        }
    }

    if let Some(path) = &options.state_path {
        registry.save(path)?;
        log::info!("Saved assignment state to {}", path.display());
    }

    log_allocation_stats(inventory.as_ref(), &registry);
    Ok(report)
}

fn log_allocation_stats(inventory: &dyn Inventory, registry: &AssignmentRegistry) {
    let mut stats: Vec<_> = registry.allocation_stats().into_iter().collect();
    stats.sort();

    let mut names = std::collections::HashMap::new();
    if let Some(admin) = inventory.network_group(None, ADMIN_NETWORK) {
        names.insert(admin.id, format!("{} (global)", admin.name));
    }
    for cluster in inventory.clusters() {
        for group in inventory.network_groups(cluster.id) {
            names.insert(group.id, format!("{} (cluster {})", group.name, cluster.id));
        }
    }

    log::info!("IP allocation summary:");
    for (group, count) in &stats {
        let name = names.get(group).cloned().unwrap_or_else(|| format!("group {}", group));
        log::info!("  - {}: {} addresses assigned", name, count);
    }
    log::info!("  - Total addresses assigned: {}", registry.records().len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
general:
  master_ip: 10.20.0.2
admin_network:
  cidr: 10.20.0.0/24
  ranges: [{ first: 10.20.0.3, last: 10.20.0.254 }]
clusters:
  - id: 1
    mode: multinode
    networks:
      - { name: management, cidr: 192.168.0.0/24, vlan_start: 101 }
      - { name: storage, cidr: 192.168.1.0/24, vlan_start: 102 }
      - { name: fixed, cidr: 10.0.0.0/16, vlan_start: 103 }
      - { name: public, cidr: 172.16.0.0/24, gateway: 172.16.0.1 }
    nodes:
      - id: 1
        fqdn: node-1.example.org
        roles: [controller]
        interfaces:
          - { name: eth0, mac: "52:54:00:00:00:01" }
          - { name: eth1, mac: "52:54:00:00:00:02" }
      - id: 2
        fqdn: node-2.example.org
        roles: [compute]
        interfaces:
          - { name: eth0, mac: "52:54:00:00:00:03" }
  - id: 2
    mode: cloud
    networks:
      - { name: management, cidr: 192.168.10.0/24 }
      - { name: fixed, cidr: 10.1.0.0/16 }
    nodes:
      - id: 3
        fqdn: node-3.example.org
        roles: [controller]
        interfaces:
          - { name: eth0, mac: "52:54:00:00:00:04" }
"#;

    fn config() -> Config {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        config.validate().unwrap();
        config
    }

    fn assigner(config: &Config) -> NodeNetworkAssigner {
        NodeNetworkAssigner::new(
            Arc::new(MemoryInventory::from_config(config)),
            Arc::new(AssignmentRegistry::new()),
        )
    }

    #[test]
    fn test_prepare_assigns_every_network() {
        let config = config();
        let assigner = assigner(&config);
        prepare_for_deployment(&assigner, 1).unwrap();

        let inventory = assigner.inventory();
        let store = assigner.store();
        let admin = inventory.network_group(None, "admin").unwrap();
        let management = inventory.network_group(Some(1), "management").unwrap();

        // Two hardware interfaces, two admin addresses
        assert_eq!(store.node_addresses(1, admin.id).len(), 2);
        assert_eq!(store.node_addresses(2, admin.id).len(), 1);
        assert_eq!(store.node_addresses(2, management.id).len(), 1);

        // Idempotent
        prepare_for_deployment(&assigner, 1).unwrap();
        assert_eq!(store.node_addresses(1, admin.id).len(), 2);
    }

    #[test]
    fn test_prepare_unknown_cluster() {
        let config = config();
        let assigner = assigner(&config);
        assert_eq!(
            prepare_for_deployment(&assigner, 42),
            Err(AllocationError::UnknownCluster(42))
        );
    }

    #[test]
    fn test_generate_keeps_cluster_order() {
        let config = config();
        let assigner = assigner(&config);
        let settings = FactSettings {
            master_ip: config.general.master_ip,
        };
        let results = generate_deployment_facts(&assigner, &settings, &[2, 1]);

        assert_eq!(results[0].0, 2);
        assert!(matches!(
            results[0].1,
            Err(SerializeError::UnknownDeploymentMode { cluster: 2, .. })
        ));
        assert_eq!(results[1].0, 1);
        assert_eq!(results[1].1.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_run_writes_documents_and_state() {
        let config = config();
        let dir = TempDir::new().unwrap();
        let options = RunOptions {
            output_dir: dir.path().join("facts"),
            state_path: Some(dir.path().join("state.json")),
            cluster: None,
            format: OutputFormat::Yaml,
        };

        let report = run(&config, &options).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.written[0].1, dir.path().join("facts").join("deployment_1.yaml"));
        assert_eq!(report.failed[0].0, 2);

        let document: Vec<serde_json::Value> =
            serde_yaml::from_str(&fs::read_to_string(&report.written[0].1).unwrap()).unwrap();
        assert_eq!(document.len(), 2);
        assert_eq!(document[0]["deployment_mode"], "multinode");

        // A second run reuses the saved addresses
        let first = fs::read_to_string(dir.path().join("state.json")).unwrap();
        run(&config, &options).unwrap();
        let second = fs::read_to_string(dir.path().join("state.json")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_failed_cluster_removes_previous_document() {
        let config = config();
        let dir = TempDir::new().unwrap();
        let output_dir = dir.path().join("facts");
        fs::create_dir_all(&output_dir).unwrap();
        let stale = output_dir.join("deployment_2.yaml");
        fs::write(&stale, "- uid: '3'\n").unwrap();
        // Other formats are not touched
        let other = output_dir.join("deployment_2.json");
        fs::write(&other, "[]").unwrap();

        let options = RunOptions {
            output_dir,
            state_path: None,
            cluster: Some(2),
            format: OutputFormat::Yaml,
        };
        let report = run(&config, &options).unwrap();

        assert_eq!(report.failed[0].0, 2);
        assert!(!stale.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_remove_stale_document_without_file() {
        let dir = TempDir::new().unwrap();
        assert!(!remove_stale_document(dir.path(), 9, OutputFormat::Json).unwrap());
    }
}
