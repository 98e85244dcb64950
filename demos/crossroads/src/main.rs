//! crossroads — mixed traffic through one four-way junction.
//!
//! Each of the four arms is a chain of 100 m single-lane segments.  Vehicles
//! start on an arm, drive to the centre, and leave along a randomly drawn
//! exit.  Without `--signal-cycle` the junction is unsignalised and the
//! chosen traffic code arbitrates; with it, a fixed-time controller flips
//! the north-south and east-west approaches between green and red.

use anyhow::{Context, Result, bail};
use clap::Parser;

use mt_core::{DriverRng, EdgeId, GeoPoint, NodeId, SimConfig, SimRng, Tick, VehicleId, VehicleKind};
use mt_drive::{DriverProfile, DriverType, SteeringHandle, TrafficCode, Vehicle};
use mt_sim::{SimBuilder, SimObserver};
use mt_spatial::{RoadNetwork, RoadNetworkBuilder, Route, SignalPhase, SpatialEnvironment};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "crossroads")]
#[command(about = "Mixed traffic through a four-way junction")]
struct Cli {
    /// Number of ticks to simulate (1 tick = 1 s).
    #[arg(long, default_value = "600")]
    ticks: u64,

    /// Global seed; the same seed reproduces the same run.
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Vehicles to spawn, spread over the four arms.
    #[arg(long, default_value = "12")]
    vehicles: u32,

    /// Segments per arm.
    #[arg(long, default_value = "3")]
    depth: usize,

    /// Right-of-way convention: `right-before-left` or `fifo`.
    #[arg(long, default_value = "right-before-left")]
    traffic_code: String,

    /// Flip the signals every N ticks instead of running unsignalised.
    #[arg(long)]
    signal_cycle: Option<u64>,

    /// Print a progress line every N ticks.
    #[arg(long, default_value = "30")]
    report_every: u64,
}

// ── Network ───────────────────────────────────────────────────────────────────

const SEGMENT_M: f64 = 100.0;
const DEG_PER_SEGMENT: f32 = 0.0009;

/// Edges of one arm, ordered from the outside in (`inbound`) and from the
/// centre out (`outbound`).
struct Arm {
    inbound: Vec<EdgeId>,
    outbound: Vec<EdgeId>,
}

/// Arms are listed as [south, east, north, west].
fn build_crossroads(depth: usize) -> Result<(RoadNetwork, Vec<Arm>)> {
    if depth == 0 {
        bail!("an arm needs at least one segment");
    }
    let mut b = RoadNetworkBuilder::new();
    let centre = b.add_node(GeoPoint::new(0.0, 0.0));
    let headings: [(f32, f32); 4] = [(-1.0, 0.0), (0.0, 1.0), (1.0, 0.0), (0.0, -1.0)];

    let mut chains: Vec<Vec<NodeId>> = Vec::with_capacity(4);
    for (dlat, dlon) in headings {
        let mut chain = vec![centre];
        for step in 1..=depth {
            let d = step as f32 * DEG_PER_SEGMENT;
            chain.push(b.add_node(GeoPoint::new(dlat * d, dlon * d)));
        }
        for w in chain.windows(2) {
            b.add_road(w[0], w[1], SEGMENT_M, 1, None);
        }
        chains.push(chain);
    }
    let net = b.build();

    let mut arms = Vec::with_capacity(4);
    for chain in &chains {
        let outbound = chain
            .windows(2)
            .map(|w| net.edge_between(w[0], w[1]).context("missing outbound segment"))
            .collect::<Result<Vec<_>>>()?;
        let mut inbound = chain
            .windows(2)
            .map(|w| net.edge_between(w[1], w[0]).context("missing inbound segment"))
            .collect::<Result<Vec<_>>>()?;
        inbound.reverse();
        arms.push(Arm { inbound, outbound });
    }
    Ok((net, arms))
}

// ── Fleet ─────────────────────────────────────────────────────────────────────

fn draw_kind(rng: &mut SimRng) -> VehicleKind {
    match rng.gen_range(0..10) {
        0..=5 => VehicleKind::Car,
        6..=8 => VehicleKind::Bicycle,
        _ => VehicleKind::Bus,
    }
}

fn draw_driver_type(rng: &mut SimRng) -> DriverType {
    match rng.gen_range(0..4) {
        0 => DriverType::Aggressive,
        1 => DriverType::Defensive,
        _ => DriverType::Normal,
    }
}

/// Vehicle `i` starts on arm `i % 4`, staggered one segment further out per
/// round so no two share a start position.
fn build_fleet(
    net: &RoadNetwork,
    arms: &[Arm],
    count: u32,
    code: TrafficCode,
    seed: u64,
) -> Result<Vec<SteeringHandle>> {
    let depth = arms[0].inbound.len();
    let capacity = 4 * depth as u32;
    if count > capacity {
        bail!("{count} vehicles do not fit on {capacity} start segments");
    }

    let mut rng = SimRng::new(seed);
    let mut fleet = Vec::with_capacity(count as usize);
    for i in 0..count {
        let id = VehicleId(i);
        let from = (i % 4) as usize;
        let round = (i / 4) as usize;
        // Any exit but straight back where we came from.
        let to = (from + rng.gen_range(1..4)) % 4;

        let start = depth - 1 - round;
        let mut edges = arms[from].inbound[start..].to_vec();
        edges.extend_from_slice(&arms[to].outbound);

        let kind = draw_kind(&mut rng);
        let mut driver_rng = DriverRng::new(seed, id);
        let mut driver = DriverProfile::new(draw_driver_type(&mut rng)).with_traffic_code(code);
        driver.sample_overtaking(&mut driver_rng);

        let route = Route::from_edges(net, &edges).with_context(|| format!("route for {id}"))?;
        let handle = SteeringHandle::new(Vehicle::new(id, kind), driver, driver_rng)
            .with_context(|| format!("steering handle for {id}"))?
            .with_route(route);
        log::debug!("{id}: {} from arm {from} to arm {to}", kind.as_str());
        fleet.push(handle);
    }
    Ok(fleet)
}

// ── Observer ──────────────────────────────────────────────────────────────────

struct Progress {
    report_every: u64,
    moved: usize,
    arrived: Vec<(Tick, VehicleId)>,
}

impl SimObserver for Progress {
    fn on_tick_end(&mut self, tick: Tick, moved: usize) {
        self.moved = moved;
        if self.report_every > 0 && tick.0 % self.report_every == 0 {
            println!("{tick}: {moved} moving, {} arrived", self.arrived.len());
        }
    }

    fn on_goal_reached(&mut self, tick: Tick, vehicle: VehicleId) {
        log::info!("{vehicle} reached its goal at {tick}");
        self.arrived.push((tick, vehicle));
    }

    fn on_snapshot(&mut self, tick: Tick, env: &SpatialEnvironment, _fleet: &[SteeringHandle]) {
        log::trace!("{tick}: {} vehicles on the network", env.len());
    }

    fn on_sim_end(&mut self, final_tick: Tick) {
        println!("finished at {final_tick}: {} arrived", self.arrived.len());
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let code: TrafficCode = cli.traffic_code.parse()?;
    let (net, arms) = build_crossroads(cli.depth)?;
    let fleet = build_fleet(&net, &arms, cli.vehicles, code, cli.seed)?;

    let config = SimConfig {
        start_unix_secs: 0,
        tick_duration_secs: 1,
        total_ticks: cli.ticks,
        seed: cli.seed,
        num_threads: None,
        snapshot_interval_ticks: cli.report_every.max(1),
    };

    // Centre-facing segments of south/north versus east/west.
    let approaches: Vec<EdgeId> = arms.iter().filter_map(|a| a.inbound.last().copied()).collect();
    let mut builder = SimBuilder::new(config, net).fleet(fleet);
    if cli.signal_cycle.is_some() {
        for (i, &edge) in approaches.iter().enumerate() {
            let phase = if i % 2 == 0 { SignalPhase::Green } else { SignalPhase::Red };
            builder = builder.signal(edge, phase);
        }
    }
    let mut sim = builder.build()?;

    println!(
        "{} vehicles, {:?}, {} ticks, seed {}",
        sim.fleet.len(),
        code,
        cli.ticks,
        cli.seed
    );

    let mut progress = Progress { report_every: cli.report_every, moved: 0, arrived: Vec::new() };
    match cli.signal_cycle {
        None => sim.run(&mut progress)?,
        Some(cycle) => {
            let cycle = cycle.max(2);
            let end = sim.config.end_tick();
            while sim.clock.current_tick < end {
                let tick = sim.clock.current_tick.0;
                // Yellow in the last tick of a phase, then swap.
                let phase_tick = tick % cycle;
                let green_ns = (tick / cycle) % 2 == 0;
                for (i, &edge) in approaches.iter().enumerate() {
                    let ours = (i % 2 == 0) == green_ns;
                    let phase = match (ours, phase_tick == cycle - 1) {
                        (true, false) => SignalPhase::Green,
                        (true, true) => SignalPhase::Yellow,
                        (false, _) => SignalPhase::Red,
                    };
                    sim.env.set_signal(edge, phase)?;
                }
                sim.run_ticks(1, &mut progress)?;
            }
            progress.on_sim_end(sim.clock.current_tick);
        }
    }

    for (tick, vehicle) in &progress.arrived {
        println!("  {vehicle} at {tick}");
    }
    if !sim.all_arrived() {
        let left = sim.fleet.len() - progress.arrived.len();
        println!("{left} still on the road ({} moved last tick)", progress.moved);
    }
    Ok(())
}
