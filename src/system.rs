//! System trait - consumer logic invoked once per tick

use std::any::Any;

use anyhow::Result;

use crate::world::World;

/// A unit of per-tick logic.
///
/// Systems run in registration order, after the world's synchronization
/// pass, so every subscription snapshot they read is stable for the whole
/// tick. Mutations they queue become visible at the next tick's
/// synchronization - a system never observes its own mutation, or a
/// sibling's same-tick mutation, through a subscription.
///
/// This is deliberately a small capability surface rather than a
/// hierarchy: specialized behaviors (entity-driven processing, interval
/// systems) are written as implementations that compose a subscription
/// handle, not as subclasses.
pub trait System: Send + Sync {
    /// Short stable name, used in timing reports and logs.
    fn name(&self) -> &str;

    /// Runs once before the first tick; the place to resolve component
    /// ids and subscriptions.
    fn initialize(&mut self, world: &mut World) {
        let _ = world;
    }

    /// Runs once per tick, in registration order.
    fn process(&mut self, world: &mut World) -> Result<()>;

    /// A disabled system stays registered but is skipped by the engine.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Runs once at engine shutdown, in registration order.
    fn dispose(&mut self, world: &mut World) {
        let _ = world;
    }

    /// Concrete-type access for [`crate::engine::Engine::get_system`].
    fn as_any(&self) -> &dyn Any;
}
