//! Free-address computation for one network group.

use super::error::AllocationError;
use super::range::AddressRange;
use super::registry::{AssignmentStore, Owner};
use crate::inventory::NetworkGroup;
use std::net::Ipv4Addr;

/// View over a network group's ranges and its committed assignments.
///
/// Free addresses are recomputed from the store on every call, never
/// cached, since assignments change between calls.
pub struct AddressPool<'a> {
    group: &'a NetworkGroup,
    store: &'a dyn AssignmentStore,
}

impl<'a> AddressPool<'a> {
    pub fn new(group: &'a NetworkGroup, store: &'a dyn AssignmentStore) -> Self {
        Self { group, store }
    }

    /// Addresses of `range` that are neither assigned nor reserved
    /// (network, broadcast, gateway), ascending and lazily evaluated.
    pub fn free_addresses(&self, range: &AddressRange) -> impl Iterator<Item = Ipv4Addr> + 'a {
        let group = self.group;
        let store = self.store;
        range
            .iter()
            .filter(move |addr| !group.is_reserved(*addr) && !store.is_taken(group.id, *addr))
    }

    /// Free addresses across every range, walking ranges in ascending
    /// order of `first`.
    pub fn free_in_group(&self) -> impl Iterator<Item = Ipv4Addr> + 'a {
        let mut ranges = self.group.ranges.clone();
        ranges.sort();
        let pool = AddressPool {
            group: self.group,
            store: self.store,
        };
        ranges
            .into_iter()
            .flat_map(move |range| pool.free_addresses(&range))
    }

    /// Pick `count` free addresses without committing them.
    pub fn take_free(&self, count: usize) -> Result<Vec<Ipv4Addr>, AllocationError> {
        let picked: Vec<Ipv4Addr> = self.free_in_group().take(count).collect();
        if picked.len() < count {
            return Err(AllocationError::AddressSpaceExhausted {
                network: self.group.name.clone(),
                requested: count,
                available: picked.len(),
            });
        }
        Ok(picked)
    }

    /// Claim specific addresses for `owner`. Fails without claiming
    /// anything if one of them is already held.
    pub fn reserve(&self, owner: &Owner, addresses: &[Ipv4Addr]) -> Result<(), AllocationError> {
        self.store.commit(self.group.id, owner, addresses)
    }
}
