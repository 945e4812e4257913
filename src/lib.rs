//! cohort - an aspect-indexed entity-component runtime
//!
//! Entities are integer ids with typed components attached; aspects are
//! structural predicates over component membership; subscriptions are the
//! live, incrementally maintained sets of entities matching one aspect.
//! Composition changes buffer during a tick and become visible to
//! subscriptions only at the synchronization boundary, so iterating code
//! never observes a half-updated world.

pub mod aspect;
pub mod component;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod subscription;
pub mod system;
pub mod world;

pub use aspect::{Aspect, AspectBuilder};
pub use component::{Component, ComponentTypeId, PooledComponent, StorageKind};
pub use config::WorldSettings;
pub use engine::{Engine, EngineBuilder, TickSummary};
pub use entity::EntityId;
pub use error::EcsError;
pub use subscription::{SubscriptionId, SubscriptionListener};
pub use system::System;
pub use world::World;
