//! IP address assignment registry.
//!
//! This file holds the committed address assignments: which address of
//! which network group belongs to which node or cluster VIP. The
//! [`AssignmentStore`] trait is the port the allocator writes through; the
//! in-memory [`AssignmentRegistry`] enforces the (group, address)
//! uniqueness constraint on every commit and can be persisted as JSON so
//! repeated runs stay idempotent.

use super::error::AllocationError;
use crate::inventory::{ClusterId, NetworkGroupId, NodeId};
use color_eyre::eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// Holder of an assigned address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Owner {
    /// Per-node address
    Node { node: NodeId },
    /// Cluster-wide virtual address for a named network
    Vip { cluster: ClusterId, network: String },
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Node { node } => write!(f, "node {}", node),
            Owner::Vip { cluster, network } => {
                write!(f, "{} VIP of cluster {}", network, cluster)
            }
        }
    }
}

/// One committed assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub group: NetworkGroupId,
    pub address: Ipv4Addr,
    pub owner: Owner,
}

/// Storage port for address assignments.
///
/// `commit` must be atomic: either every address is recorded or none is.
pub trait AssignmentStore: Send + Sync {
    /// Addresses held by `node` in `group`, in allocation order
    fn node_addresses(&self, node: NodeId, group: NetworkGroupId) -> Vec<Ipv4Addr>;

    /// The VIP of `network` for `cluster`, if one was assigned
    fn vip(&self, cluster: ClusterId, network: &str) -> Option<Ipv4Addr>;

    /// Current holder of `address` in `group`
    fn owner_of(&self, group: NetworkGroupId, address: Ipv4Addr) -> Option<Owner>;

    fn is_taken(&self, group: NetworkGroupId, address: Ipv4Addr) -> bool {
        self.owner_of(group, address).is_some()
    }

    /// Record `addresses` for `owner`, failing with
    /// [`AllocationError::DuplicateAssignment`] if any of them is taken.
    fn commit(
        &self,
        group: NetworkGroupId,
        owner: &Owner,
        addresses: &[Ipv4Addr],
    ) -> Result<(), AllocationError>;
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Append-only log, the persisted form
    records: Vec<AssignmentRecord>,
    /// (group, address) -> index into `records`
    taken: HashMap<(NetworkGroupId, Ipv4Addr), usize>,
    by_node: HashMap<(NodeId, NetworkGroupId), Vec<Ipv4Addr>>,
    vips: HashMap<(ClusterId, String), Ipv4Addr>,
}

impl RegistryState {
    fn conflict(&self, group: NetworkGroupId, owner: &Owner, address: Ipv4Addr) -> Option<AllocationError> {
        if let Some(&index) = self.taken.get(&(group, address)) {
            return Some(AllocationError::DuplicateAssignment {
                group,
                address,
                owner: self.records[index].owner.to_string(),
            });
        }
        if let Owner::Vip { cluster, network } = owner {
            if let Some(existing) = self.vips.get(&(*cluster, network.clone())) {
                return Some(AllocationError::DuplicateAssignment {
                    group,
                    address: *existing,
                    owner: owner.to_string(),
                });
            }
        }
        None
    }

    fn push(&mut self, record: AssignmentRecord) {
        let index = self.records.len();
        self.taken.insert((record.group, record.address), index);
        match &record.owner {
            Owner::Node { node } => {
                self.by_node
                    .entry((*node, record.group))
                    .or_default()
                    .push(record.address);
            }
            Owner::Vip { cluster, network } => {
                self.vips.insert((*cluster, network.clone()), record.address);
            }
        }
        self.records.push(record);
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedRegistry {
    assignments: Vec<AssignmentRecord>,
}

/// In-memory assignment store.
#[derive(Debug, Default)]
pub struct AssignmentRegistry {
    state: RwLock<RegistryState>,
}

impl AssignmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from records, rejecting duplicates
    pub fn from_records(
        records: impl IntoIterator<Item = AssignmentRecord>,
    ) -> Result<Self, AllocationError> {
        let mut state = RegistryState::default();
        for record in records {
            if let Some(err) = state.conflict(record.group, &record.owner, record.address) {
                return Err(err);
            }
            state.push(record);
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Load a registry saved with [`AssignmentRegistry::save`]
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read assignment state '{}'", path.display()))?;
        let persisted: PersistedRegistry = serde_json::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse assignment state '{}'", path.display()))?;
        let registry = Self::from_records(persisted.assignments)
            .wrap_err_with(|| format!("Inconsistent assignment state '{}'", path.display()))?;
        log::info!(
            "Loaded {} assignments from {:?}",
            registry.records().len(),
            path
        );
        Ok(registry)
    }

    /// Write every committed assignment to `path` as JSON
    pub fn save(&self, path: &Path) -> color_eyre::Result<()> {
        let persisted = PersistedRegistry {
            assignments: self.records(),
        };
        let json = serde_json::to_string_pretty(&persisted)?;
        std::fs::write(path, json)
            .wrap_err_with(|| format!("Failed to write assignment state '{}'", path.display()))?;
        Ok(())
    }

    /// Snapshot of every assignment in allocation order
    pub fn records(&self) -> Vec<AssignmentRecord> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }

    /// Number of assigned addresses per network group
    pub fn allocation_stats(&self) -> HashMap<NetworkGroupId, usize> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut stats = HashMap::new();
        for record in &state.records {
            *stats.entry(record.group).or_insert(0) += 1;
        }
        stats
    }
}

impl AssignmentStore for AssignmentRegistry {
    fn node_addresses(&self, node: NodeId, group: NetworkGroupId) -> Vec<Ipv4Addr> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_node
            .get(&(node, group))
            .cloned()
            .unwrap_or_default()
    }

    fn vip(&self, cluster: ClusterId, network: &str) -> Option<Ipv4Addr> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .vips
            .get(&(cluster, network.to_string()))
            .copied()
    }

    fn owner_of(&self, group: NetworkGroupId, address: Ipv4Addr) -> Option<Owner> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .taken
            .get(&(group, address))
            .map(|&index| state.records[index].owner.clone())
    }

    fn commit(
        &self,
        group: NetworkGroupId,
        owner: &Owner,
        addresses: &[Ipv4Addr],
    ) -> Result<(), AllocationError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        // Validate the whole batch before touching state
        let mut batch = std::collections::HashSet::with_capacity(addresses.len());
        for &address in addresses {
            if let Some(err) = state.conflict(group, owner, address) {
                return Err(err);
            }
            if !batch.insert(address) {
                return Err(AllocationError::DuplicateAssignment {
                    group,
                    address,
                    owner: owner.to_string(),
                });
            }
        }
        if matches!(owner, Owner::Vip { .. }) && addresses.len() > 1 {
            return Err(AllocationError::DuplicateAssignment {
                group,
                address: addresses[1],
                owner: owner.to_string(),
            });
        }

        for &address in addresses {
            state.push(AssignmentRecord {
                group,
                address,
                owner: owner.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_commit_and_lookup() {
        let registry = AssignmentRegistry::new();
        let owner = Owner::Node { node: 1 };
        registry
            .commit(10, &owner, &[ip("10.0.0.2"), ip("10.0.0.3")])
            .unwrap();

        assert_eq!(registry.node_addresses(1, 10), vec![ip("10.0.0.2"), ip("10.0.0.3")]);
        assert!(registry.node_addresses(1, 11).is_empty());
        assert!(registry.is_taken(10, ip("10.0.0.2")));
        assert!(!registry.is_taken(11, ip("10.0.0.2")));
        assert_eq!(registry.owner_of(10, ip("10.0.0.3")), Some(owner));
    }

    #[test]
    fn test_commit_is_atomic_on_collision() {
        let registry = AssignmentRegistry::new();
        registry
            .commit(10, &Owner::Node { node: 1 }, &[ip("10.0.0.3")])
            .unwrap();

        let err = registry
            .commit(10, &Owner::Node { node: 2 }, &[ip("10.0.0.2"), ip("10.0.0.3")])
            .unwrap_err();
        assert!(matches!(err, AllocationError::DuplicateAssignment { .. }));
        // Nothing from the failed batch was recorded
        assert!(registry.node_addresses(2, 10).is_empty());
        assert!(!registry.is_taken(10, ip("10.0.0.2")));
    }

    #[test]
    fn test_vip_is_singleton() {
        let registry = AssignmentRegistry::new();
        let owner = Owner::Vip {
            cluster: 1,
            network: "management".to_string(),
        };
        registry.commit(10, &owner, &[ip("192.168.0.2")]).unwrap();
        assert_eq!(registry.vip(1, "management"), Some(ip("192.168.0.2")));
        assert!(registry.commit(10, &owner, &[ip("192.168.0.3")]).is_err());
        assert_eq!(registry.vip(2, "management"), None);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("assignments.json");

        let registry = AssignmentRegistry::new();
        registry
            .commit(10, &Owner::Node { node: 4 }, &[ip("10.0.0.2")])
            .unwrap();
        registry
            .commit(
                10,
                &Owner::Vip {
                    cluster: 1,
                    network: "public".to_string(),
                },
                &[ip("10.0.0.3")],
            )
            .unwrap();
        registry.save(&path).unwrap();

        let loaded = AssignmentRegistry::load(&path).unwrap();
        assert_eq!(loaded.records(), registry.records());
        assert_eq!(loaded.vip(1, "public"), Some(ip("10.0.0.3")));
        assert_eq!(loaded.allocation_stats().get(&10), Some(&2));
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let record = AssignmentRecord {
            group: 1,
            address: ip("10.0.0.2"),
            owner: Owner::Node { node: 1 },
        };
        let mut other = record.clone();
        other.owner = Owner::Node { node: 2 };
        assert!(AssignmentRegistry::from_records(vec![record, other]).is_err());
    }
}
