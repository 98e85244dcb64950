//! Fluent builder for constructing a [`Sim`].

use mt_core::{EdgeId, SimConfig, VehicleId};
use mt_drive::{ArrivalRegistry, SteeringHandle};
use mt_spatial::{RoadNetwork, SignalPhase, SpatialEnvironment};

use crate::{Sim, SimError, SimResult};

/// Fluent builder for [`Sim`].
///
/// # Required inputs
///
/// - [`SimConfig`]: total ticks, seed, tick duration, …
/// - [`RoadNetwork`]: the network the environment is built over
///
/// # Optional inputs (have defaults)
///
/// | Method                | Default                               |
/// |-----------------------|---------------------------------------|
/// | `.vehicle(h)`         | empty fleet                           |
/// | `.signal(edge, p)`    | every edge `SignalPhase::None`        |
/// | `.approach_window(m)` | [`mt_drive::junction::APPROACH_WINDOW`] |
/// | `.detach_at_goal(b)`  | `true`                                |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, network)
///     .vehicle(handle)
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config: SimConfig,
    network: RoadNetwork,
    fleet: Vec<SteeringHandle>,
    signals: Vec<(EdgeId, SignalPhase)>,
    approach_window: Option<f64>,
    detach_at_goal: bool,
}

impl SimBuilder {
    pub fn new(config: SimConfig, network: RoadNetwork) -> Self {
        Self {
            config,
            network,
            fleet: Vec::new(),
            signals: Vec::new(),
            approach_window: None,
            detach_at_goal: true,
        }
    }

    /// Add one vehicle.  Vehicles must be added in `VehicleId` order
    /// starting at 0.
    pub fn vehicle(mut self, handle: SteeringHandle) -> Self {
        self.fleet.push(handle);
        self
    }

    pub fn fleet(mut self, handles: impl IntoIterator<Item = SteeringHandle>) -> Self {
        self.fleet.extend(handles);
        self
    }

    /// Initial signal phase of an edge.
    pub fn signal(mut self, edge: EdgeId, phase: SignalPhase) -> Self {
        self.signals.push((edge, phase));
        self
    }

    /// Distance from a junction within which arrival order is recorded.
    pub fn approach_window(mut self, metres: f64) -> Self {
        self.approach_window = Some(metres);
        self
    }

    /// Whether vehicles leave the network when they reach their goal.  A
    /// parked vehicle right at a junction keeps its place in the arrival
    /// order, so keeping them is mostly useful on dead ends.
    pub fn detach_at_goal(mut self, detach: bool) -> Self {
        self.detach_at_goal = detach;
        self
    }

    /// Validate inputs, build the environment, and return a ready-to-run
    /// [`Sim`].
    pub fn build(self) -> SimResult<Sim> {
        self.config.validate()?;

        for (i, handle) in self.fleet.iter().enumerate() {
            let expected = VehicleId::try_from(i)
                .map_err(|_| SimError::Config(format!("fleet of {} vehicles is too large", self.fleet.len())))?;
            let got = handle.vehicle().id;
            if got != expected {
                return Err(SimError::VehicleIdMismatch { expected, got });
            }
        }

        let window = self.approach_window.unwrap_or(mt_drive::junction::APPROACH_WINDOW);
        if !window.is_finite() || window <= 0.0 {
            return Err(SimError::Config(format!("approach window must be positive, got {window}")));
        }

        let mut env = SpatialEnvironment::new(self.network);
        for (edge, phase) in self.signals {
            env.set_signal(edge, phase)?;
        }

        #[cfg(feature = "parallel")]
        let pool = match self.config.num_threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| SimError::Config(format!("thread pool: {e}")))?,
            ),
            None => None,
        };

        Ok(Sim {
            clock: self.config.make_clock(),
            config: self.config,
            env,
            arrivals: ArrivalRegistry::with_window(window),
            fleet: self.fleet,
            detach_at_goal: self.detach_at_goal,
            #[cfg(feature = "parallel")]
            pool,
        })
    }
}
