//! Component types, the per-world type registry, and per-type storage
//!
//! Each distinct component kind gets a stable dense index on first
//! reference; indices are never reassigned while the registry lives, and
//! every world owns its own registry so index spaces stay independent.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EcsError;

/// A typed unit of data attachable to an entity.
pub trait Component: Send + Sync + 'static {}

/// A component whose instances are recycled through an object pool.
///
/// `reset` returns an instance to a defined default state. The pool calls
/// it when an instance is reclaimed; callers always receive a reset
/// instance and never reset one themselves.
pub trait PooledComponent: Component + Default {
    fn reset(&mut self);
}

/// Stable dense index of a component kind within one world's registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ComponentTypeId(usize);

impl ComponentTypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Storage classification for a component kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Plain,
    Pooled,
}

/// Registry metadata for one component kind.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    name: &'static str,
    kind: StorageKind,
}

impl ComponentInfo {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }
}

/// Type-erased view of a storage, for the sweep that runs when an entity
/// is recycled.
trait AnyStorage: Send + Sync {
    fn discard(&mut self, index: u32);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Per-type storage: a sparse map from entity slot index to instance.
///
/// A slot here is valid if and only if the owning entity's bit for this
/// type is set; all mutation funnels through the world so the two never
/// diverge. Pooled storages keep reclaimed instances for reuse.
pub struct ComponentStorage<T: Component> {
    data: HashMap<u32, T>,
    pool: Vec<T>,
    reset: Option<fn(&mut T)>,
}

impl<T: Component> ComponentStorage<T> {
    fn plain() -> Self {
        Self {
            data: HashMap::new(),
            pool: Vec::new(),
            reset: None,
        }
    }

    /// Stores a value, displacing any existing instance. A displaced
    /// instance of a pooled type is reset and returned to the pool.
    pub(crate) fn insert(&mut self, index: u32, value: T) {
        if let Some(old) = self.data.insert(index, value) {
            self.reclaim(old);
        }
    }

    pub(crate) fn remove(&mut self, index: u32) {
        if let Some(old) = self.data.remove(&index) {
            self.reclaim(old);
        }
    }

    fn reclaim(&mut self, mut old: T) {
        if let Some(reset) = self.reset {
            reset(&mut old);
            self.pool.push(old);
        }
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.data.get(&index)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.data.get_mut(&index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.data.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[cfg(test)]
    fn pool_size(&self) -> usize {
        self.pool.len()
    }
}

impl<T: PooledComponent> ComponentStorage<T> {
    fn pooled() -> Self {
        Self {
            data: HashMap::new(),
            pool: Vec::new(),
            reset: Some(T::reset),
        }
    }

    /// Returns the existing instance for the slot, or binds one taken from
    /// the pool (already reset) or freshly defaulted.
    pub(crate) fn acquire(&mut self, index: u32) -> &mut T {
        if !self.data.contains_key(&index) {
            let value = self.pool.pop().unwrap_or_default();
            self.data.insert(index, value);
        }
        self.data.get_mut(&index).expect("slot bound above")
    }
}

impl<T: Component> AnyStorage for ComponentStorage<T> {
    fn discard(&mut self, index: u32) {
        self.remove(index);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Assigns component type indices and owns every per-type storage.
///
/// Type-parameterized calls register lazily and memoize: the same kind
/// always yields the same index for the life of the registry. Index-based
/// lookups cannot auto-register and raise [`EcsError::UnknownComponentType`]
/// for indices never assigned.
pub struct ComponentRegistry {
    indices: HashMap<TypeId, ComponentTypeId>,
    infos: Vec<ComponentInfo>,
    storages: Vec<Box<dyn AnyStorage>>,
}

impl ComponentRegistry {
    pub fn with_capacity(expected_types: usize) -> Self {
        Self {
            indices: HashMap::with_capacity(expected_types),
            infos: Vec::with_capacity(expected_types),
            storages: Vec::with_capacity(expected_types),
        }
    }

    /// Index for `T`, registering it with plain storage on first reference.
    pub fn open<T: Component>(&mut self) -> ComponentTypeId {
        if let Some(&id) = self.indices.get(&TypeId::of::<T>()) {
            return id;
        }
        self.insert_type::<T>(StorageKind::Plain, Box::new(ComponentStorage::<T>::plain()))
    }

    /// Index for `T`, registering it with pooled storage on first
    /// reference. An already-open type keeps its original classification.
    pub fn open_pooled<T: PooledComponent>(&mut self) -> ComponentTypeId {
        if let Some(&id) = self.indices.get(&TypeId::of::<T>()) {
            return id;
        }
        self.insert_type::<T>(StorageKind::Pooled, Box::new(ComponentStorage::<T>::pooled()))
    }

    /// Explicitly classifies `T` as pooled. Idempotent if `T` is already
    /// pooled; an error if its plain storage has already been opened.
    pub fn register_pooled<T: PooledComponent>(&mut self) -> Result<ComponentTypeId, EcsError> {
        match self.indices.get(&TypeId::of::<T>()) {
            Some(&id) if self.infos[id.index()].kind == StorageKind::Pooled => Ok(id),
            Some(_) => Err(EcsError::InvalidClassification(type_name::<T>())),
            None => Ok(self.open_pooled::<T>()),
        }
    }

    fn insert_type<T: Component>(
        &mut self,
        kind: StorageKind,
        storage: Box<dyn AnyStorage>,
    ) -> ComponentTypeId {
        let id = ComponentTypeId(self.infos.len());
        self.indices.insert(TypeId::of::<T>(), id);
        self.infos.push(ComponentInfo {
            name: type_name::<T>(),
            kind,
        });
        self.storages.push(storage);
        tracing::debug!(
            name = type_name::<T>(),
            index = id.index(),
            ?kind,
            "component type registered"
        );
        id
    }

    /// Index for `T` if it has ever been referenced, without registering.
    pub fn lookup<T: Component>(&self) -> Option<ComponentTypeId> {
        self.indices.get(&TypeId::of::<T>()).copied()
    }

    pub fn info(&self, id: ComponentTypeId) -> Result<&ComponentInfo, EcsError> {
        self.infos
            .get(id.index())
            .ok_or(EcsError::UnknownComponentType(id.index()))
    }

    /// Count of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub(crate) fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        let id = self.lookup::<T>()?;
        self.storages[id.index()].as_any().downcast_ref()
    }

    pub(crate) fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        let id = self.lookup::<T>()?;
        self.storages[id.index()].as_any_mut().downcast_mut()
    }

    /// Detaches every component bound to the slot. Runs when an entity is
    /// recycled, after all removal notifications have gone out.
    pub(crate) fn discard_all(&mut self, index: u32) {
        for storage in &mut self.storages {
            storage.discard(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Debug, Default, PartialEq)]
    struct Projectile {
        damage: i32,
        armed: bool,
    }
    impl Component for Projectile {}
    impl PooledComponent for Projectile {
        fn reset(&mut self) {
            self.damage = 0;
            self.armed = false;
        }
    }

    #[test]
    fn test_registry_memoizes_indices() {
        let mut registry = ComponentRegistry::with_capacity(4);

        let a = registry.open::<Position>();
        let b = registry.open::<Projectile>();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);

        // same kind, same index, forever
        assert_eq!(registry.open::<Position>(), a);
        assert_eq!(registry.lookup::<Projectile>(), Some(b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_index_is_an_error() {
        let registry = ComponentRegistry::with_capacity(4);
        assert!(matches!(
            registry.info(ComponentTypeId(7)),
            Err(EcsError::UnknownComponentType(7))
        ));
    }

    #[test]
    fn test_plain_storage_insert_get_remove() {
        let mut registry = ComponentRegistry::with_capacity(4);
        registry.open::<Position>();

        let storage = registry.storage_mut::<Position>().unwrap();
        storage.insert(1, Position { x: 1.0, y: 2.0 });
        storage.insert(2, Position { x: 3.0, y: 4.0 });
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.get(1), Some(&Position { x: 1.0, y: 2.0 }));

        storage.remove(1);
        assert!(!storage.contains(1));
        assert_eq!(storage.pool_size(), 0, "plain storage never pools");
    }

    #[test]
    fn test_pooled_storage_resets_before_reuse() {
        let mut registry = ComponentRegistry::with_capacity(4);
        registry.open_pooled::<Projectile>();

        let storage = registry.storage_mut::<Projectile>().unwrap();
        let shot = storage.acquire(0);
        shot.damage = 42;
        shot.armed = true;

        storage.remove(0);
        assert_eq!(storage.pool_size(), 1);

        let reused = storage.acquire(5);
        assert_eq!(*reused, Projectile::default());
        assert_eq!(storage.pool_size(), 0);
    }

    #[test]
    fn test_acquire_returns_existing_instance() {
        let mut registry = ComponentRegistry::with_capacity(4);
        registry.open_pooled::<Projectile>();

        let storage = registry.storage_mut::<Projectile>().unwrap();
        storage.acquire(0).damage = 7;
        assert_eq!(storage.acquire(0).damage, 7);
    }

    #[test]
    fn test_register_pooled_conflicts_with_open_plain() {
        let mut registry = ComponentRegistry::with_capacity(4);
        registry.open::<Projectile>();

        assert!(matches!(
            registry.register_pooled::<Projectile>(),
            Err(EcsError::InvalidClassification(_))
        ));

        // idempotent on a type that is already pooled
        let mut registry = ComponentRegistry::with_capacity(4);
        let id = registry.register_pooled::<Projectile>().unwrap();
        assert_eq!(registry.register_pooled::<Projectile>().unwrap(), id);
        assert_eq!(registry.info(id).unwrap().kind(), StorageKind::Pooled);
    }

    #[test]
    fn test_discard_all_sweeps_every_storage() {
        let mut registry = ComponentRegistry::with_capacity(4);
        registry.open::<Position>();
        registry.open_pooled::<Projectile>();

        registry
            .storage_mut::<Position>()
            .unwrap()
            .insert(3, Position { x: 0.0, y: 0.0 });
        registry.storage_mut::<Projectile>().unwrap().acquire(3);

        registry.discard_all(3);
        assert!(!registry.storage::<Position>().unwrap().contains(3));
        assert!(!registry.storage::<Projectile>().unwrap().contains(3));
    }
}
