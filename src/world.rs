//! World: the central container and its synchronization boundary
//!
//! Owns the entity manager, the component registry, and the subscription
//! manager, and funnels every mutation so that component bits and storage
//! never diverge. Composition changes are buffered per tick and become
//! visible to subscriptions only inside [`World::synchronize`].

use fixedbitset::FixedBitSet;

use crate::aspect::AspectBuilder;
use crate::component::{
    Component, ComponentInfo, ComponentRegistry, ComponentTypeId, PooledComponent,
};
use crate::config::WorldSettings;
use crate::entity::{ChangeBuffer, EntityId, EntityManager};
use crate::error::EcsError;
use crate::subscription::{
    AspectSubscriptionManager, Subscription, SubscriptionId, SubscriptionListener,
};

pub struct World {
    entities: EntityManager,
    registry: ComponentRegistry,
    subscriptions: AspectSubscriptionManager,
    changes: ChangeBuffer,
}

impl World {
    pub fn new() -> Self {
        Self::with_settings(&WorldSettings::default())
    }

    pub fn with_settings(settings: &WorldSettings) -> Self {
        Self {
            entities: EntityManager::with_capacity(
                settings.expected_entities,
                settings.expected_component_types,
            ),
            registry: ComponentRegistry::with_capacity(settings.expected_component_types),
            subscriptions: AspectSubscriptionManager::new(),
            changes: ChangeBuffer::default(),
        }
    }

    // === entity lifecycle ===

    /// Allocates an entity id, recycling one when available.
    ///
    /// The entity is active immediately but becomes visible to
    /// subscriptions (including the wildcard) only at the next
    /// synchronization pass.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.entities.create();
        self.changes.mark_changed(id);
        id
    }

    /// Marks an entity for deletion at the next synchronization pass.
    ///
    /// Until that boundary the entity stays structurally intact; every
    /// subscription holding it delivers a removal notification before the
    /// id can be recycled.
    pub fn delete_entity(&mut self, id: EntityId) -> Result<(), EcsError> {
        self.entities.delete(id)?;
        self.changes.mark_deleted(id);
        Ok(())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.is_active(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.count()
    }

    // === component operations ===

    /// Attaches `value` to the entity.
    ///
    /// Attaching a type the entity already has replaces the stored
    /// instance (a displaced pooled instance returns to its pool); the
    /// bitset is unchanged but the entity is still marked dirty.
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> Result<(), EcsError> {
        self.ensure_active(id)?;
        let type_id = self.registry.open::<T>();
        self.registry
            .storage_mut::<T>()
            .expect("storage opened above")
            .insert(id.index(), value);
        self.entities.set_bit(id.index(), type_id.index());
        self.changes.mark_changed(id);
        Ok(())
    }

    /// Attaches a pooled component, reusing a pool instance when one is
    /// available, and returns it for initialization. If the entity
    /// already has the type, the existing instance is returned untouched.
    pub fn create_component<T: PooledComponent>(
        &mut self,
        id: EntityId,
    ) -> Result<&mut T, EcsError> {
        self.ensure_active(id)?;
        let type_id = self.registry.open_pooled::<T>();
        self.entities.set_bit(id.index(), type_id.index());
        self.changes.mark_changed(id);
        let storage = self
            .registry
            .storage_mut::<T>()
            .expect("storage opened above");
        Ok(storage.acquire(id.index()))
    }

    /// Detaches `T` from the entity.
    ///
    /// Removing an absent type is a no-op, but the touch still marks the
    /// entity dirty: anything that referenced the entity gets reindexed.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> Result<(), EcsError> {
        self.ensure_active(id)?;
        if let Some(type_id) = self.registry.lookup::<T>() {
            if let Some(storage) = self.registry.storage_mut::<T>() {
                storage.remove(id.index());
            }
            self.entities.clear_bit(id.index(), type_id.index());
        }
        self.changes.mark_changed(id);
        Ok(())
    }

    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        if !self.entities.is_active(id) {
            return None;
        }
        self.registry.storage::<T>()?.get(id.index())
    }

    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        if !self.entities.is_active(id) {
            return None;
        }
        self.registry.storage_mut::<T>()?.get_mut(id.index())
    }

    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        match (self.entities.bits(id), self.registry.lookup::<T>()) {
            (Some(bits), Some(type_id)) => bits.contains(type_id.index()),
            _ => false,
        }
    }

    /// Live component bits for the entity, including mutations queued this
    /// tick that no subscription has seen yet. Subscription membership is
    /// the committed view; this is the uncommitted one.
    pub fn component_bits(&self, id: EntityId) -> Option<&FixedBitSet> {
        self.entities.bits(id)
    }

    // === component type registry ===

    /// Index for `T`, registering it on first reference.
    pub fn component_id<T: Component>(&mut self) -> ComponentTypeId {
        self.registry.open::<T>()
    }

    /// Classifies `T` as pooled before its storage opens.
    pub fn register_pooled<T: PooledComponent>(&mut self) -> Result<ComponentTypeId, EcsError> {
        self.registry.register_pooled::<T>()
    }

    /// Metadata for an assigned type index; `UnknownComponentType` for an
    /// index the registry never assigned.
    pub fn component_info(&self, id: ComponentTypeId) -> Result<&ComponentInfo, EcsError> {
        self.registry.info(id)
    }

    pub fn component_type_count(&self) -> usize {
        self.registry.len()
    }

    // === subscriptions ===

    /// Subscription for the built aspect, deduplicated on aspect equality.
    /// A new subscription backfills from the currently active entities, so
    /// subscribing mid-run sees everything already alive.
    pub fn subscribe(&mut self, builder: AspectBuilder) -> SubscriptionId {
        let aspect = builder.resolve(&mut self.registry);
        self.subscriptions.get_or_create(aspect, &self.entities)
    }

    pub fn subscription(&self, id: SubscriptionId) -> &Subscription {
        self.subscriptions.get(id)
    }

    /// Matching entities in insertion order; a read-only snapshot that is
    /// stable between synchronization points.
    pub fn entities(&self, id: SubscriptionId) -> &[EntityId] {
        self.subscriptions.get(id).entities()
    }

    pub fn add_subscription_listener(
        &mut self,
        id: SubscriptionId,
        listener: Box<dyn SubscriptionListener>,
    ) {
        self.subscriptions.add_listener(id, listener);
    }

    // === synchronization ===

    /// The per-tick synchronization boundary.
    ///
    /// Drains the pending-change and deletion buffers exactly once,
    /// reconciles every subscription (insert batches before remove
    /// batches, per subscription), and only then clears deleted entities'
    /// bits, sweeps their storages, and recycles their ids.
    pub fn synchronize(&mut self) {
        if self.changes.is_empty() {
            return;
        }
        let (changed, deleted) = self.changes.drain();
        tracing::debug!(
            changed = changed.len(),
            deleted = deleted.len(),
            subscriptions = self.subscriptions.len(),
            "synchronization pass"
        );
        self.subscriptions
            .reconcile(&self.entities, &changed, &deleted);
        for id in deleted {
            self.registry.discard_all(id.index());
            self.entities.recycle(id);
        }
    }

    fn ensure_active(&self, id: EntityId) -> Result<(), EcsError> {
        if self.entities.is_active(id) {
            Ok(())
        } else {
            Err(EcsError::InvalidEntity(id))
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
