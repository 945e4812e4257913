//! Aspect subscriptions and the batched membership reconcile
//!
//! One subscription exists per distinct aspect. Its matching collection
//! is reconciled incrementally against the entities touched since the
//! last synchronization point, so maintenance cost per tick is
//! O(changed entities × live subscriptions), never O(total entities)
//! per write.

use std::collections::{HashMap, HashSet};

use crate::aspect::Aspect;
use crate::entity::{EntityId, EntityManager};

/// Handle to a subscription owned by the manager. Subscriptions live for
/// the world's lifetime and are never destroyed individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

/// Observer of membership deltas.
///
/// Within one synchronization pass a listener receives at most one
/// `inserted` batch followed by at most one `removed` batch.
pub trait SubscriptionListener {
    fn inserted(&mut self, entities: &[EntityId]);
    fn removed(&mut self, entities: &[EntityId]);
}

/// The live, incrementally maintained set of entities matching one aspect.
pub struct Subscription {
    aspect: Aspect,
    entities: Vec<EntityId>,
    members: HashSet<u32>,
    listeners: Vec<Box<dyn SubscriptionListener>>,
}

impl Subscription {
    fn new(aspect: Aspect) -> Self {
        Self {
            aspect,
            entities: Vec::new(),
            members: HashSet::new(),
            listeners: Vec::new(),
        }
    }

    pub fn aspect(&self) -> &Aspect {
        &self.aspect
    }

    /// Matching entities in insertion order. Stable between
    /// synchronization points; removals preserve the relative order of
    /// the remainder.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Registers aspects, dedups them to one subscription each, and
/// reconciles all subscriptions at every synchronization boundary.
pub struct AspectSubscriptionManager {
    subscriptions: Vec<Subscription>,
    by_aspect: HashMap<Aspect, SubscriptionId>,
}

impl AspectSubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            by_aspect: HashMap::new(),
        }
    }

    /// Returns the subscription for an equal aspect, creating it and
    /// backfilling its matching set from the currently active entities
    /// when the aspect is new. Backfill works mid-run, not only at
    /// startup; ids already pending deletion are skipped.
    pub fn get_or_create(
        &mut self,
        aspect: Aspect,
        entities: &EntityManager,
    ) -> SubscriptionId {
        if let Some(&id) = self.by_aspect.get(&aspect) {
            return id;
        }
        let mut subscription = Subscription::new(aspect.clone());
        for (id, bits) in entities.iter_active() {
            if subscription.aspect.matches(bits) {
                subscription.members.insert(id.index());
                subscription.entities.push(id);
            }
        }
        let id = SubscriptionId(self.subscriptions.len());
        tracing::debug!(
            subscription = id.0,
            backfilled = subscription.entities.len(),
            "subscription created"
        );
        self.by_aspect.insert(aspect, id);
        self.subscriptions.push(subscription);
        id
    }

    pub fn get(&self, id: SubscriptionId) -> &Subscription {
        &self.subscriptions[id.0]
    }

    pub fn add_listener(&mut self, id: SubscriptionId, listener: Box<dyn SubscriptionListener>) {
        self.subscriptions[id.0].listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// The synchronization step. `changed` and `deleted` are the drained
    /// per-tick buffers; `entities` still holds every deleted id's slot
    /// intact, since bitset clears and recycling only happen after this
    /// returns.
    ///
    /// Per subscription: re-evaluate every changed id (deleted ones
    /// excepted), remove every deleted id that was a member, then deliver
    /// one inserted batch followed by one removed batch.
    pub fn reconcile(
        &mut self,
        entities: &EntityManager,
        changed: &[EntityId],
        deleted: &[EntityId],
    ) {
        let doomed: HashSet<u32> = deleted.iter().map(|id| id.index()).collect();

        for subscription in &mut self.subscriptions {
            let mut inserted_batch: Vec<EntityId> = Vec::new();
            let mut removed_batch: Vec<EntityId> = Vec::new();
            let mut removed_slots: HashSet<u32> = HashSet::new();

            for &id in changed {
                if doomed.contains(&id.index()) {
                    continue;
                }
                let Some(bits) = entities.bits(id) else {
                    continue;
                };
                let matches = subscription.aspect.matches(bits);
                let member = subscription.members.contains(&id.index());
                if matches && !member {
                    subscription.members.insert(id.index());
                    subscription.entities.push(id);
                    inserted_batch.push(id);
                } else if !matches && member {
                    subscription.members.remove(&id.index());
                    removed_slots.insert(id.index());
                    removed_batch.push(id);
                }
            }

            // a deleted entity cannot match anything, whatever its bits
            for &id in deleted {
                if subscription.members.remove(&id.index()) {
                    removed_slots.insert(id.index());
                    removed_batch.push(id);
                }
            }

            if !removed_slots.is_empty() {
                subscription
                    .entities
                    .retain(|id| !removed_slots.contains(&id.index()));
            }

            if inserted_batch.is_empty() && removed_batch.is_empty() {
                continue;
            }
            for listener in &mut subscription.listeners {
                if !inserted_batch.is_empty() {
                    listener.inserted(&inserted_batch);
                }
                if !removed_batch.is_empty() {
                    listener.removed(&removed_batch);
                }
            }
        }
    }
}

impl Default for AspectSubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
