//! Aspects: structural predicates over component membership
//!
//! An aspect holds three sets of component type indices: ALL of them
//! required, at least ONE of them required (when non-empty), and NONE of
//! them allowed. Matching runs against an entity's live bitset in a few
//! word operations; equality over the id triplets is the key the
//! subscription manager dedups on.

use std::hash::{Hash, Hasher};

use fixedbitset::FixedBitSet;

use crate::component::{Component, ComponentRegistry, ComponentTypeId};

/// Immutable structural predicate over component-type indices.
///
/// Two aspects with identical triplets are equal and hash identically;
/// the empty triplet matches every entity.
#[derive(Debug, Clone)]
pub struct Aspect {
    all_ids: Vec<ComponentTypeId>,
    one_ids: Vec<ComponentTypeId>,
    exclude_ids: Vec<ComponentTypeId>,
    all: FixedBitSet,
    one: FixedBitSet,
    exclude: FixedBitSet,
}

impl Aspect {
    fn from_ids(
        mut all_ids: Vec<ComponentTypeId>,
        mut one_ids: Vec<ComponentTypeId>,
        mut exclude_ids: Vec<ComponentTypeId>,
    ) -> Self {
        all_ids.sort_unstable();
        all_ids.dedup();
        one_ids.sort_unstable();
        one_ids.dedup();
        exclude_ids.sort_unstable();
        exclude_ids.dedup();
        let all = bitset_of(&all_ids);
        let one = bitset_of(&one_ids);
        let exclude = bitset_of(&exclude_ids);
        Self {
            all_ids,
            one_ids,
            exclude_ids,
            all,
            one,
            exclude,
        }
    }

    /// `(all ⊆ bits) ∧ (one = ∅ ∨ one ∩ bits ≠ ∅) ∧ (exclude ∩ bits = ∅)`.
    ///
    /// Handles bitsets of differing widths: a bit past the end of either
    /// side reads as unset.
    pub fn matches(&self, bits: &FixedBitSet) -> bool {
        self.all.is_subset(bits)
            && (self.one_ids.is_empty() || !self.one.is_disjoint(bits))
            && self.exclude.is_disjoint(bits)
    }

    /// True for the empty triplet, which matches every entity.
    pub fn is_wildcard(&self) -> bool {
        self.all_ids.is_empty() && self.one_ids.is_empty() && self.exclude_ids.is_empty()
    }

    pub fn all(&self) -> &[ComponentTypeId] {
        &self.all_ids
    }

    pub fn one(&self) -> &[ComponentTypeId] {
        &self.one_ids
    }

    pub fn exclude(&self) -> &[ComponentTypeId] {
        &self.exclude_ids
    }
}

impl PartialEq for Aspect {
    fn eq(&self, other: &Self) -> bool {
        self.all_ids == other.all_ids
            && self.one_ids == other.one_ids
            && self.exclude_ids == other.exclude_ids
    }
}

impl Eq for Aspect {}

impl Hash for Aspect {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.all_ids.hash(state);
        self.one_ids.hash(state);
        self.exclude_ids.hash(state);
    }
}

fn bitset_of(ids: &[ComponentTypeId]) -> FixedBitSet {
    let width = ids.iter().map(|id| id.index() + 1).max().unwrap_or(0);
    let mut bits = FixedBitSet::with_capacity(width);
    for id in ids {
        bits.insert(id.index());
    }
    bits
}

type Resolver = fn(&mut ComponentRegistry) -> ComponentTypeId;

/// Collects component types for an aspect; resolved against a world's
/// registry when a subscription is requested, auto-registering any type
/// referenced for the first time.
///
/// `AspectBuilder::new()` with no constraints builds the wildcard aspect.
#[derive(Debug, Clone, Default)]
pub struct AspectBuilder {
    all: Vec<Resolver>,
    one: Vec<Resolver>,
    exclude: Vec<Resolver>,
}

impl AspectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `T` to be present.
    pub fn all<T: Component>(mut self) -> Self {
        self.all.push(ComponentRegistry::open::<T>);
        self
    }

    /// Requires at least one of the `one` types to be present.
    pub fn one<T: Component>(mut self) -> Self {
        self.one.push(ComponentRegistry::open::<T>);
        self
    }

    /// Forbids `T` from being present.
    pub fn exclude<T: Component>(mut self) -> Self {
        self.exclude.push(ComponentRegistry::open::<T>);
        self
    }

    pub(crate) fn resolve(self, registry: &mut ComponentRegistry) -> Aspect {
        let all = self.all.into_iter().map(|open| open(registry)).collect();
        let one = self.one.into_iter().map(|open| open(registry)).collect();
        let exclude = self
            .exclude
            .into_iter()
            .map(|open| open(registry))
            .collect();
        Aspect::from_ids(all, one, exclude)
    }
}
