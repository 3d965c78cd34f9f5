//! Node and VIP address assignment.
//!
//! [`NodeNetworkAssigner`] binds (node, network) and (cluster, network)
//! pairs to addresses drawn from the owning network group's pool. Every
//! operation is idempotent: an existing assignment is returned as-is and no
//! new address is drawn.
//!
//! Allocation into one network group happens under that group's lock, so
//! concurrent callers converge on the same address for the same pair and
//! never race onto the same address for different pairs. The store's
//! uniqueness check on commit backs this up.

use super::error::AllocationError;
use super::pool::AddressPool;
use super::registry::{AssignmentStore, Owner};
use crate::inventory::{ClusterId, Inventory, NetworkGroup, NetworkGroupId, Node, NodeId, ADMIN_NETWORK};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};

pub struct NodeNetworkAssigner {
    inventory: Arc<dyn Inventory>,
    store: Arc<dyn AssignmentStore>,
    group_locks: Mutex<HashMap<NetworkGroupId, Arc<Mutex<()>>>>,
}

impl NodeNetworkAssigner {
    pub fn new(inventory: Arc<dyn Inventory>, store: Arc<dyn AssignmentStore>) -> Self {
        Self {
            inventory,
            store,
            group_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn inventory(&self) -> &dyn Inventory {
        self.inventory.as_ref()
    }

    pub fn store(&self) -> &dyn AssignmentStore {
        self.store.as_ref()
    }

    fn group_lock(&self, group: NetworkGroupId) -> Arc<Mutex<()>> {
        let mut locks = self
            .group_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(group).or_default().clone()
    }

    fn live_node(&self, node_id: NodeId) -> Result<Node, AllocationError> {
        let node = self
            .inventory
            .node(node_id)
            .ok_or(AllocationError::UnknownNode(node_id))?;
        if node.pending_deletion {
            return Err(AllocationError::NodePendingDeletion(node_id));
        }
        Ok(node)
    }

    /// The node's cluster group named `network`, falling back to a global
    /// group of that name (the admin network).
    fn home_group(&self, node: &Node, network: &str) -> Result<NetworkGroup, AllocationError> {
        node.cluster
            .and_then(|cluster| self.inventory.network_group(Some(cluster), network))
            .or_else(|| self.inventory.network_group(None, network))
            .ok_or_else(|| AllocationError::UnknownNetwork {
                network: network.to_string(),
                scope: format!("node {}", node.id),
            })
    }

    /// Assign one address of `network` to a node, or return the one it
    /// already holds.
    pub fn assign_address(&self, node_id: NodeId, network: &str) -> Result<Ipv4Addr, AllocationError> {
        let addresses = self.assign_bulk(node_id, network, 1)?;
        addresses
            .into_iter()
            .next()
            .ok_or_else(|| AllocationError::AddressSpaceExhausted {
                network: network.to_string(),
                requested: 1,
                available: 0,
            })
    }

    /// Make sure a node holds `count` addresses of `network`.
    ///
    /// Existing addresses count towards the total; when there are already
    /// enough, the first `count` are returned. Otherwise the missing ones
    /// are drawn from the group's ranges in ascending order and committed
    /// together, or not at all.
    pub fn assign_bulk(
        &self,
        node_id: NodeId,
        network: &str,
        count: usize,
    ) -> Result<Vec<Ipv4Addr>, AllocationError> {
        let node = self.live_node(node_id)?;
        let group = self.home_group(&node, network)?;

        let lock = self.group_lock(group.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut addresses = self.store.node_addresses(node.id, group.id);
        if addresses.len() >= count {
            log::debug!(
                "Node {} already holds {} {} address(es), nothing to assign",
                node.id,
                addresses.len(),
                network
            );
            addresses.truncate(count);
            return Ok(addresses);
        }

        let pool = AddressPool::new(&group, self.store.as_ref());
        let fresh = pool.take_free(count - addresses.len())?;
        pool.reserve(&Owner::Node { node: node.id }, &fresh)?;

        for address in &fresh {
            log::info!("Assigned {} address {} to node {}", network, address, node.id);
        }
        addresses.extend(fresh);
        Ok(addresses)
    }

    /// Assign one address of `network` to each node, in order.
    pub fn assign_ips(
        &self,
        node_ids: &[NodeId],
        network: &str,
    ) -> Result<Vec<Ipv4Addr>, AllocationError> {
        node_ids
            .iter()
            .map(|&node_id| self.assign_address(node_id, network))
            .collect()
    }

    /// Make sure a node holds `count` admin network addresses.
    pub fn assign_admin_ips(&self, node_id: NodeId, count: usize) -> Result<Vec<Ipv4Addr>, AllocationError> {
        self.assign_bulk(node_id, ADMIN_NETWORK, count)
    }

    /// Assign the cluster-wide virtual address of `network`, or return the
    /// existing one.
    pub fn assign_vip(&self, cluster_id: ClusterId, network: &str) -> Result<Ipv4Addr, AllocationError> {
        if self.inventory.cluster(cluster_id).is_none() {
            return Err(AllocationError::UnknownCluster(cluster_id));
        }
        let group = self
            .inventory
            .network_group(Some(cluster_id), network)
            .ok_or_else(|| AllocationError::UnknownNetwork {
                network: network.to_string(),
                scope: format!("cluster {}", cluster_id),
            })?;

        let lock = self.group_lock(group.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(vip) = self.store.vip(cluster_id, network) {
            log::debug!("Cluster {} already has {} VIP {}", cluster_id, network, vip);
            return Ok(vip);
        }

        let pool = AddressPool::new(&group, self.store.as_ref());
        let picked = pool.take_free(1)?;
        let owner = Owner::Vip {
            cluster: cluster_id,
            network: network.to_string(),
        };
        pool.reserve(&owner, &picked)?;

        let vip = picked[0];
        log::info!("Assigned {} VIP {} to cluster {}", network, vip, cluster_id);
        Ok(vip)
    }
}
