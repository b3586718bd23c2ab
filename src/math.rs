//! Defines some mathematical objects that are used throughout the crate,
//! specifically sets, mappings and partitions of the state set.

use std::collections::BTreeMap;
use std::{collections::BTreeSet, hash::Hash};

pub use indexmap::map;
pub use indexmap::set;

/// Type alias for ordered sets, we use this to hide which concrete set type
/// we are actually using.
pub type OrderedSet<S> = BTreeSet<S>;
/// Type alias for sets that are unordered but preserve insertion order.
pub type Set<S> = indexmap::IndexSet<S>;

/// Type alias for ordered maps.
pub type OrderedMap<K, V> = BTreeMap<K, V>;
/// Type alias for maps that are unordered but preserve insertion order.
pub type Map<K, V> = indexmap::IndexMap<K, V>;

/// A partition groups elements of type `I` into disjoint classes. It is the
/// common currency of the canonicalisers (k-equivalence classes), the preset
/// distinguishing sequence search (output-history classes) and the splitting
/// tree (leaf blocks).
#[derive(Debug, Clone)]
pub struct Partition<I: Hash + Eq>(Vec<BTreeSet<I>>);

impl<I: Hash + Eq> std::ops::Deref for Partition<I> {
    type Target = Vec<BTreeSet<I>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a, I: Hash + Eq> IntoIterator for &'a Partition<I> {
    type Item = &'a BTreeSet<I>;
    type IntoIter = std::slice::Iter<'a, BTreeSet<I>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<I: Hash + Eq> PartialEq for Partition<I> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|o| other.contains(o))
    }
}
impl<I: Hash + Eq> Eq for Partition<I> {}

impl<I: Hash + Eq + Ord> Partition<I> {
    /// Returns the size of the partition, i.e. the number of classes.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Builds a new partition from an iterator that yields iterators which
    /// yield elements of type `I`.
    pub fn new<X: IntoIterator<Item = I>, Y: IntoIterator<Item = X>>(iter: Y) -> Self {
        Self(
            iter.into_iter()
                .map(|it| it.into_iter().collect::<BTreeSet<_>>())
                .collect(),
        )
    }

    /// True iff every class of the partition contains exactly one element.
    pub fn is_discrete(&self) -> bool {
        self.0.iter().all(|class| class.len() == 1)
    }

    /// Returns the class containing `element`, if any.
    pub fn class_of(&self, element: &I) -> Option<&BTreeSet<I>> {
        self.0.iter().find(|class| class.contains(element))
    }
}

impl<I: Hash + Eq + Ord> From<Vec<BTreeSet<I>>> for Partition<I> {
    fn from(value: Vec<BTreeSet<I>>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Partition;

    #[test]
    fn partition_equality_ignores_class_order() {
        let p = Partition::new([vec![0u32, 1], vec![2]]);
        let q = Partition::new([vec![2u32], vec![1, 0]]);
        assert_eq!(p, q);
        assert_eq!(p.size(), 2);
        assert!(!p.is_discrete());
        assert_eq!(p.class_of(&1).unwrap().len(), 2);
    }
}
