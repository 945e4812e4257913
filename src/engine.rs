//! Engine - drives the per-tick cycle
//!
//! `advance` runs the world's synchronization pass, then invokes each
//! enabled, non-passive system exactly once in registration order. The
//! synchronization step always precedes system execution, so every system
//! reads a stable subscription snapshot for the whole tick.

use std::any::TypeId;
use std::collections::HashSet;
use std::time::Instant;

use anyhow::Result;

use crate::error::EcsError;
use crate::system::System;
use crate::world::World;

struct SystemSlot {
    system: Box<dyn System>,
    passive: bool,
}

/// Ordered, duplicate-checked system registration.
///
/// Registration order is fixed here and never changes at runtime.
/// Registering the same system type twice is a configuration error,
/// surfaced by [`EngineBuilder::build`] before the first tick.
pub struct EngineBuilder {
    systems: Vec<SystemSlot>,
    max_stats_history: usize,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            max_stats_history: 100,
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(SystemSlot {
            system: Box::new(system),
            passive: false,
        });
        self
    }

    /// Registers a system that `advance` skips; useful for systems that
    /// only observe subscriptions through listeners or are driven
    /// manually.
    pub fn with_passive_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(SystemSlot {
            system: Box::new(system),
            passive: true,
        });
        self
    }

    /// How many tick summaries the engine retains.
    pub fn with_stats_history(mut self, ticks: usize) -> Self {
        self.max_stats_history = ticks;
        self
    }

    /// Validates registration and initializes every system in order.
    pub fn build(mut self, world: &mut World) -> Result<Engine, EcsError> {
        let mut seen = HashSet::new();
        for slot in &self.systems {
            if !seen.insert(slot.system.as_any().type_id()) {
                return Err(EcsError::DuplicateSystem(slot.system.name().to_string()));
            }
        }
        for slot in &mut self.systems {
            slot.system.initialize(world);
        }
        tracing::info!(systems = self.systems.len(), "engine ready");
        Ok(Engine {
            systems: self.systems,
            tick: 0,
            stats_history: Vec::new(),
            max_stats_history: self.max_stats_history,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing for a single system invocation.
#[derive(Clone, Debug)]
pub struct SystemRunReport {
    pub name: String,
    pub duration_ms: f64,
}

/// Summary of one `advance` call.
#[derive(Clone, Debug)]
pub struct TickSummary {
    pub tick: u64,
    pub duration_ms: f64,
    pub system_reports: Vec<SystemRunReport>,
}

/// Owns the registered systems and advances a world one tick at a time.
pub struct Engine {
    systems: Vec<SystemSlot>,
    tick: u64,
    stats_history: Vec<TickSummary>,
    max_stats_history: usize,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Runs one tick: synchronize subscriptions, then each enabled,
    /// non-passive system once in registration order.
    ///
    /// A system error aborts the remaining systems for this tick and
    /// propagates; the synchronization work already done stands.
    pub fn advance(&mut self, world: &mut World) -> Result<TickSummary> {
        let tick_start = Instant::now();
        world.synchronize();

        let mut system_reports = Vec::with_capacity(self.systems.len());
        for slot in &mut self.systems {
            if slot.passive || !slot.system.is_enabled() {
                continue;
            }
            let start = Instant::now();
            slot.system.process(world)?;
            system_reports.push(SystemRunReport {
                name: slot.system.name().to_string(),
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            });
        }

        self.tick += 1;
        let summary = TickSummary {
            tick: self.tick,
            duration_ms: tick_start.elapsed().as_secs_f64() * 1_000.0,
            system_reports,
        };
        tracing::trace!(tick = summary.tick, duration_ms = summary.duration_ms, "tick complete");

        self.stats_history.push(summary.clone());
        if self.stats_history.len() > self.max_stats_history {
            self.stats_history.remove(0);
        }
        Ok(summary)
    }

    /// Advances the world `ticks` times, stopping at the first error.
    pub fn run(&mut self, world: &mut World, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.advance(world)?;
        }
        Ok(())
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn recent_stats(&self) -> &[TickSummary] {
        &self.stats_history
    }

    pub fn average_tick_ms(&self) -> Option<f64> {
        if self.stats_history.is_empty() {
            return None;
        }
        let total: f64 = self.stats_history.iter().map(|s| s.duration_ms).sum();
        Some(total / self.stats_history.len() as f64)
    }

    /// Concrete-type access to a registered system.
    pub fn get_system<T: 'static>(&self) -> Option<&T> {
        self.systems
            .iter()
            .find_map(|slot| slot.system.as_any().downcast_ref::<T>())
    }

    pub fn has_system<T: 'static>(&self) -> bool {
        let wanted = TypeId::of::<T>();
        self.systems
            .iter()
            .any(|slot| slot.system.as_any().type_id() == wanted)
    }

    /// Disposes every system in registration order and consumes the
    /// engine.
    pub fn shutdown(mut self, world: &mut World) {
        for slot in &mut self.systems {
            slot.system.dispose(world);
        }
        tracing::info!(ticks = self.tick, "engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::{Arc, Mutex};

    use super::*;

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    macro_rules! trace_system {
        ($ty:ident, $label:literal, enabled = $enabled:expr) => {
            struct $ty(Trace);

            impl System for $ty {
                fn name(&self) -> &str {
                    $label
                }

                fn process(&mut self, _world: &mut World) -> Result<()> {
                    self.0.lock().unwrap().push($label);
                    Ok(())
                }

                fn is_enabled(&self) -> bool {
                    $enabled
                }

                fn dispose(&mut self, _world: &mut World) {
                    self.0.lock().unwrap().push(concat!($label, ":disposed"));
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }
            }
        };
    }

    trace_system!(Alpha, "alpha", enabled = true);
    trace_system!(Beta, "beta", enabled = true);
    trace_system!(Bystander, "bystander", enabled = true);
    trace_system!(Sleeper, "sleeper", enabled = false);

    struct Lone;

    impl System for Lone {
        fn name(&self) -> &str {
            "lone"
        }

        fn process(&mut self, _world: &mut World) -> Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_systems_run_in_registration_order() {
        let trace: Trace = Arc::default();
        let mut world = World::new();
        let mut engine = Engine::builder()
            .with_system(Alpha(trace.clone()))
            .with_passive_system(Bystander(trace.clone()))
            .with_system(Sleeper(trace.clone()))
            .with_system(Beta(trace.clone()))
            .build(&mut world)
            .unwrap();

        let summary = engine.advance(&mut world).unwrap();
        assert_eq!(summary.tick, 1);
        // passive and disabled systems are skipped
        assert_eq!(*trace.lock().unwrap(), vec!["alpha", "beta"]);
        assert_eq!(summary.system_reports.len(), 2);
        assert_eq!(summary.system_reports[0].name, "alpha");
        assert_eq!(summary.system_reports[1].name, "beta");
    }

    #[test]
    fn test_duplicate_system_rejected_before_first_tick() {
        let trace: Trace = Arc::default();
        let mut world = World::new();
        let result = Engine::builder()
            .with_system(Alpha(trace.clone()))
            .with_system(Alpha(trace.clone()))
            .build(&mut world);

        assert!(matches!(result, Err(EcsError::DuplicateSystem(_))));
    }

    #[test]
    fn test_get_system_downcasts() {
        let trace: Trace = Arc::default();
        let mut world = World::new();
        let engine = Engine::builder()
            .with_system(Alpha(trace.clone()))
            .build(&mut world)
            .unwrap();

        assert!(engine.get_system::<Alpha>().is_some());
        assert!(engine.has_system::<Alpha>());
        assert!(!engine.has_system::<Lone>());
    }

    #[test]
    fn test_shutdown_disposes_systems_in_order() {
        let trace: Trace = Arc::default();
        let mut world = World::new();
        let engine = Engine::builder()
            .with_system(Alpha(trace.clone()))
            .with_system(Beta(trace.clone()))
            .build(&mut world)
            .unwrap();

        engine.shutdown(&mut world);
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["alpha:disposed", "beta:disposed"]
        );
    }

    #[test]
    fn test_stats_history_is_bounded() {
        let mut world = World::new();
        let mut engine = Engine::builder()
            .with_system(Lone)
            .with_stats_history(3)
            .build(&mut world)
            .unwrap();

        engine.run(&mut world, 5).unwrap();
        assert_eq!(engine.recent_stats().len(), 3);
        assert_eq!(engine.recent_stats()[0].tick, 3);
        assert_eq!(engine.current_tick(), 5);
        assert!(engine.average_tick_ms().is_some());
    }
}
