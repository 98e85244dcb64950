//! Simulation observer trait for progress reporting and data collection.

use mt_core::{Tick, VehicleId};
use mt_drive::SteeringHandle;
use mt_spatial::SpatialEnvironment;

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at key points in the
/// tick loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: progress printer
///
/// ```rust,ignore
/// struct ProgressPrinter { interval: u64 }
///
/// impl SimObserver for ProgressPrinter {
///     fn on_tick_end(&mut self, tick: Tick, moved: usize) {
///         if tick.0 % self.interval == 0 {
///             println!("tick {tick}: {moved} vehicles moved");
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each tick, before any processing.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called at the end of each tick with the number of vehicles that
    /// covered a positive distance.
    fn on_tick_end(&mut self, _tick: Tick, _moved: usize) {}

    /// Called once for each vehicle in the tick it reaches its goal.
    fn on_goal_reached(&mut self, _tick: Tick, _vehicle: VehicleId) {}

    /// Called at snapshot intervals (every `config.snapshot_interval_ticks`
    /// ticks), after the tick's moves are committed.
    fn on_snapshot(&mut self, _tick: Tick, _env: &SpatialEnvironment, _fleet: &[SteeringHandle]) {}

    /// Called once after the final tick completes.
    fn on_sim_end(&mut self, _final_tick: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
