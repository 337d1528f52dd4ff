use std::collections::{BTreeSet, HashSet};
use std::hash::{BuildHasher, Hash};

/// Container semantics of a many-to-many collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Ordered, duplicates allowed
    Sequence,
    /// Unique members
    Set,
}

/// A collection type that can hold the embedded side of a many-to-many
/// association
pub trait EntityCollection<E>: Send + Sync + 'static {
    const KIND: ContainerKind;

    fn into_elements(self) -> Vec<E>;

    fn from_elements(elements: Vec<E>) -> Self;
}

impl<E: Send + Sync + 'static> EntityCollection<E> for Vec<E> {
    const KIND: ContainerKind = ContainerKind::Sequence;

    fn into_elements(self) -> Vec<E> {
        self
    }

    fn from_elements(elements: Vec<E>) -> Self {
        elements
    }
}

impl<E: Ord + Send + Sync + 'static> EntityCollection<E> for BTreeSet<E> {
    const KIND: ContainerKind = ContainerKind::Set;

    fn into_elements(self) -> Vec<E> {
        self.into_iter().collect()
    }

    fn from_elements(elements: Vec<E>) -> Self {
        elements.into_iter().collect()
    }
}

impl<E, S> EntityCollection<E> for HashSet<E, S>
where
    E: Hash + Eq + Send + Sync + 'static,
    S: BuildHasher + Default + Send + Sync + 'static,
{
    const KIND: ContainerKind = ContainerKind::Set;

    fn into_elements(self) -> Vec<E> {
        self.into_iter().collect()
    }

    fn from_elements(elements: Vec<E>) -> Self {
        elements.into_iter().collect()
    }
}
