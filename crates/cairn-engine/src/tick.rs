//! Fixed-timestep tick loop.
//!
//! The [`TickLoop`] drives one [`WorldServer`] forward. Each tick:
//!
//! 1. The tick counter advances and the event journal is cleared.
//! 2. All registered systems run in declaration order, each receiving the
//!    server mutably. Systems mutate the world through the server's hooks,
//!    so every effect is routed through the cause tracker.
//! 3. After each system the phase stack must be back at its baseline. A
//!    system that leaves a phase open fails the tick with
//!    [`EngineError::LeakedPhase`], and the open phases are discarded.
//!
//! Randomness must come from a seeded RNG, so the same initial world, the
//! same systems and the same inputs produce the same final state hash.
//!
//! # Example
//!
//! ```
//! use cairn_engine::prelude::*;
//!
//! let mut tick_loop = TickLoop::new(WorldServer::new(World::new()), TickConfig::default());
//! tick_loop.add_system("plant", |server| {
//!     let pos = BlockPos::new(0, 64, 0);
//!     server.set_block_state(pos, BlockState::of("sapling"), BlockChangeFlags::ALL);
//!     Ok(())
//! });
//!
//! tick_loop.run_ticks(3)?;
//! assert_eq!(tick_loop.tick_count(), 3);
//! # Ok::<(), EngineError>(())
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{error, trace, warn};

use crate::server::WorldServer;
use crate::EngineError;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    /// Most ticks a single [`TickLoop::advance`] call may run before the
    /// remaining backlog is dropped.
    pub max_ticks_per_advance: u32,
}

impl Default for TickConfig {
    /// 20 ticks per second, at most 10 catch-up ticks per advance.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 20.0,
            max_ticks_per_advance: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system (in order of execution).
    pub system_times: Vec<(String, Duration)>,
    pub total_time: Duration,
    /// Events recorded into the journal during the tick.
    pub events: usize,
}

// ---------------------------------------------------------------------------
// SystemFn
// ---------------------------------------------------------------------------

/// A system run once per tick.
pub type SystemFn = fn(&mut WorldServer) -> Result<(), EngineError>;

#[derive(Debug)]
struct RegisteredSystem {
    name: String,
    func: SystemFn,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// The fixed-timestep tick loop.
pub struct TickLoop {
    server: WorldServer,
    systems: Vec<RegisteredSystem>,
    tick_counter: u64,
    fixed_dt: f64,
    config: TickConfig,
    /// Unconsumed wall-clock time carried between [`advance`](Self::advance) calls.
    accumulator: f64,
    last_diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// Create a tick loop around `server`.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite, or if
    /// `config.max_ticks_per_advance` is zero.
    pub fn new(server: WorldServer, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        assert!(
            config.max_ticks_per_advance > 0,
            "max_ticks_per_advance must be at least 1"
        );
        Self {
            server,
            systems: Vec::new(),
            tick_counter: 0,
            fixed_dt: config.fixed_dt,
            config,
            accumulator: 0.0,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Register a system to be run each tick, after every system registered
    /// before it.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, name: &str, func: SystemFn) {
        self.add_system_after(name, &[], func);
    }

    /// Register a system that must run after the systems named in `after`.
    ///
    /// # Panics
    ///
    /// - If any system in `after` is not already registered.
    /// - If a system with this name already exists.
    pub fn add_system_after(&mut self, name: &str, after: &[&str], func: SystemFn) {
        for dep in after {
            assert!(
                self.systems.iter().any(|s| s.name == *dep),
                "system '{name}' declares dependency on '{dep}', but '{dep}' is not registered"
            );
        }
        assert!(
            !self.systems.iter().any(|s| s.name == name),
            "duplicate system name: {name:?}"
        );
        self.systems.push(RegisteredSystem {
            name: name.to_owned(),
            func,
        });
    }

    /// Execute one tick and return the number of events it recorded.
    ///
    /// The tick counts as executed even when a system fails; the failing
    /// system's error is returned and later systems do not run. Phases a
    /// system leaves open are discarded before the error is returned, so the
    /// next tick starts at the baseline.
    pub fn tick(&mut self) -> Result<usize, EngineError> {
        let tick_start = Instant::now();
        self.tick_counter += 1;
        self.server.state.set_tick(self.tick_counter);
        self.server.state.journal.clear();

        let mut system_times = Vec::with_capacity(self.systems.len());
        for system in &self.systems {
            let sys_start = Instant::now();
            let result = (system.func)(&mut self.server);
            system_times.push((system.name.clone(), sys_start.elapsed()));

            let depth = self.server.tracker.depth();
            if depth != 1 {
                error!(system = %system.name, depth, "system leaked a phase");
                self.server.tracker.reset_to_baseline();
            }
            result?;
            if depth != 1 {
                return Err(EngineError::LeakedPhase {
                    system: system.name.clone(),
                    depth,
                });
            }
        }

        let events = self.server.state.journal.len();
        self.last_diagnostics = TickDiagnostics {
            system_times,
            total_time: tick_start.elapsed(),
            events,
        };
        trace!(tick = self.tick_counter, events, "tick complete");
        Ok(events)
    }

    /// Run `count` ticks. Returns the total number of events recorded.
    pub fn run_ticks(&mut self, count: u64) -> Result<usize, EngineError> {
        let mut total_events = 0;
        for _ in 0..count {
            total_events += self.tick()?;
        }
        Ok(total_events)
    }

    /// Feed `elapsed` seconds of wall-clock time and run as many whole ticks
    /// as fit, up to `max_ticks_per_advance`. Any backlog beyond that is
    /// dropped. Returns the number of ticks run.
    pub fn advance(&mut self, elapsed: f64) -> Result<u32, EngineError> {
        if elapsed.is_finite() && elapsed > 0.0 {
            self.accumulator += elapsed;
        }
        let mut ran = 0;
        while self.accumulator >= self.fixed_dt && ran < self.config.max_ticks_per_advance {
            self.accumulator -= self.fixed_dt;
            self.tick()?;
            ran += 1;
        }
        if self.accumulator >= self.fixed_dt {
            let dropped = (self.accumulator / self.fixed_dt).floor() as u64;
            warn!(dropped, "tick loop fell behind, dropping backlog");
            self.accumulator %= self.fixed_dt;
        }
        Ok(ran)
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulation time in seconds, computed as `tick_count * fixed_dt`.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn server(&self) -> &WorldServer {
        &self.server
    }

    /// Mutable access to the server, for setup between ticks.
    pub fn server_mut(&mut self) -> &mut WorldServer {
        &mut self.server
    }

    pub fn into_server(self) -> WorldServer {
        self.server
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// The names of all registered systems, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
