//! The `Sim` struct and its tick loop.

use mt_core::{SimClock, SimConfig, Tick, VehicleId};
use mt_drive::{ArrivalRegistry, DriveResult, SteeringHandle, TickView};
use mt_spatial::SpatialEnvironment;

use crate::{SimObserver, SimResult};

/// What one tick produced, handed back to the observer.
struct TickReport {
    moved: usize,
    arrived: Vec<VehicleId>,
}

// ── Sim ───────────────────────────────────────────────────────────────────────

/// The main simulation runner.
///
/// `Sim` owns the environment and the fleet and drives the four-phase tick
/// loop:
///
/// 1. **Prepare** (sequential, ascending `VehicleId`): vehicles that have not
///    started are inserted on the first edge of their route.
/// 2. **Reconcile**: the arrival registry is brought in line with the
///    environment before anyone decides.
/// 3. **Decide** (optionally parallel with the `parallel` feature): every
///    handle computes its driving distance against the frozen environment.
/// 4. **Apply** (sequential, ascending `VehicleId`): moves are committed.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim {
    /// Global configuration (total ticks, seed, tick duration, …).
    pub config: SimConfig,

    /// Simulation clock: tracks the current tick and maps to wall time.
    pub clock: SimClock,

    /// Lane occupancy and signal phases.  External signal controllers write
    /// here between ticks.
    pub env: SpatialEnvironment,

    /// Per-junction arrival order, reconciled every tick.
    pub arrivals: ArrivalRegistry,

    /// Slot `i` holds the handle of `VehicleId(i)`.
    pub fleet: Vec<SteeringHandle>,

    /// Take vehicles off the network in the tick they reach their goal.
    pub detach_at_goal: bool,

    #[cfg(feature = "parallel")]
    pub(crate) pool: Option<rayon::ThreadPool>,
}

impl Sim {
    // ── Public API ────────────────────────────────────────────────────────

    /// Run the simulation from the current tick to `config.end_tick()`.
    ///
    /// Calls observer hooks at every tick boundary.  Use
    /// [`NoopObserver`][crate::NoopObserver] if you don't need callbacks.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        log::debug!("running {} vehicles to {}", self.fleet.len(), self.config.end_tick());
        while self.clock.current_tick < self.config.end_tick() {
            self.tick_with(observer)?;
        }
        observer.on_sim_end(self.clock.current_tick);
        Ok(())
    }

    /// Run exactly `n` ticks from the current position (ignores `end_tick`).
    ///
    /// Useful for tests and incremental stepping.
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        for _ in 0..n {
            self.tick_with(observer)?;
        }
        Ok(())
    }

    /// Run one tick without observer callbacks.  Returns the number of
    /// vehicles that moved.
    pub fn step(&mut self) -> SimResult<usize> {
        let now = self.clock.current_tick;
        let report = self.process_tick(now)?;
        self.clock.advance();
        Ok(report.moved)
    }

    #[inline]
    pub fn handle(&self, id: VehicleId) -> Option<&SteeringHandle> {
        self.fleet.get(id.index())
    }

    /// Mutable access between ticks, e.g. to replace a route or flip
    /// `braking_activated`.
    #[inline]
    pub fn handle_mut(&mut self, id: VehicleId) -> Option<&mut SteeringHandle> {
        self.fleet.get_mut(id.index())
    }

    /// `true` once every vehicle has reached its goal.
    pub fn all_arrived(&self) -> bool {
        self.fleet.iter().all(SteeringHandle::goal_reached)
    }

    // ── Core tick processing ──────────────────────────────────────────────

    fn tick_with<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let now = self.clock.current_tick;
        observer.on_tick_start(now);
        let report = self.process_tick(now)?;
        for &vehicle in &report.arrived {
            observer.on_goal_reached(now, vehicle);
        }
        observer.on_tick_end(now, report.moved);
        if self.config.snapshot_due(now) {
            observer.on_snapshot(now, &self.env, &self.fleet);
        }
        self.clock.advance();
        Ok(())
    }

    fn process_tick(&mut self, now: Tick) -> SimResult<TickReport> {
        // ── Phase 1: prepare ──────────────────────────────────────────────
        for handle in &mut self.fleet {
            handle.prepare(&mut self.env)?;
        }

        // ── Phase 2: reconcile arrival order ──────────────────────────────
        self.arrivals.reconcile(&self.env);

        // ── Phase 3: decide (produce) ─────────────────────────────────────
        let decisions = self.decide_all(now)?;

        // ── Phase 4: apply (consume) ──────────────────────────────────────
        //
        // Fleet order is ascending VehicleId, so committing in slot order
        // keeps results independent of how the decisions were computed.
        let mut report = TickReport { moved: 0, arrived: Vec::new() };
        for (handle, decision) in self.fleet.iter_mut().zip(decisions) {
            let Some(distance) = decision else { continue };
            let was_done = handle.goal_reached();
            handle.apply(&mut self.env, distance)?;
            if distance > 0.0 {
                report.moved += 1;
            }
            if !was_done && handle.goal_reached() {
                report.arrived.push(handle.vehicle().id);
                if self.detach_at_goal {
                    handle.detach(&mut self.env)?;
                }
            }
        }
        log::trace!("{now}: {} moved, {} arrived", report.moved, report.arrived.len());
        Ok(report)
    }

    /// Ask every handle for its driving distance.
    ///
    /// With the `parallel` Cargo feature the handles run on Rayon's thread
    /// pool; each only mutates itself, and the environment and registry are
    /// shared read-only.
    fn decide_all(&mut self, now: Tick) -> DriveResult<Vec<Option<f64>>> {
        // Explicit field borrows so the borrow checker sees disjoint access.
        let view = TickView::new(now, &self.env, &self.arrivals);
        let fleet = &mut self.fleet;

        #[cfg(not(feature = "parallel"))]
        {
            fleet.iter_mut().map(|h| h.decide(&view)).collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            match &self.pool {
                Some(pool) => pool.install(|| fleet.par_iter_mut().map(|h| h.decide(&view)).collect()),
                None => fleet.par_iter_mut().map(|h| h.decide(&view)).collect(),
            }
        }
    }
}
