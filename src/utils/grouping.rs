//! Stable grouping of records by key.
//!
//! [`group_by`] collects a sequence into key -> ordered list, keeping the
//! relative input order inside each group. Lookups through [`Grouped::get`]
//! are total: an unknown key yields an empty slice.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Result of [`group_by`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouped<K: Eq + Hash, V> {
    groups: HashMap<K, Vec<V>>,
}

impl<K: Eq + Hash, V> Grouped<K, V> {
    /// Items for `key`, or an empty slice when nothing was grouped under it
    pub fn get<Q>(&self, key: &Q) -> &[V]
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl<K: Eq + Hash, V> Default for Grouped<K, V> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }
}

/// Group `items` by `key_fn`, preserving input order within each group.
pub fn group_by<I, K, F>(items: I, mut key_fn: F) -> Grouped<K, I::Item>
where
    I: IntoIterator,
    K: Eq + Hash,
    F: FnMut(&I::Item) -> K,
{
    let mut groups: HashMap<K, Vec<I::Item>> = HashMap::new();
    for item in items {
        groups.entry(key_fn(&item)).or_default().push(item);
    }
    Grouped { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_by_key() {
        let items = vec![
            json!({"key": "value1"}),
            json!({"key": "value1"}),
            json!({"key": "value3"}),
        ];
        let grouped = group_by(items, |item| item["key"].as_str().unwrap_or_default().to_string());

        assert_eq!(
            grouped.get("value1"),
            &[json!({"key": "value1"}), json!({"key": "value1"})]
        );
        assert_eq!(grouped.get("value3"), &[json!({"key": "value3"})]);
        assert!(grouped.get("value2").is_empty());
    }

    #[test]
    fn test_preserves_relative_order() {
        let grouped = group_by(vec![(1, 'a'), (2, 'b'), (1, 'c'), (2, 'd'), (1, 'e')], |(k, _)| *k);
        let ones: Vec<char> = grouped.get(&1).iter().map(|(_, c)| *c).collect();
        assert_eq!(ones, vec!['a', 'c', 'e']);
    }

    #[test]
    fn test_empty_input() {
        let grouped: Grouped<u32, u32> = group_by(Vec::<u32>::new(), |v| *v);
        assert!(grouped.get(&7).is_empty());
    }
}
