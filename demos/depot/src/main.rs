//! depot — single-depot delivery demo for the dvrp_sim simulator.
//!
//! Three vans serve six customers around a depot with a single loading
//! dock.  Orders are generated from a fixed seed and released over four
//! hours; a greedy dispatcher plans them every 15 minutes.
//!
//! ```text
//! cargo run -p depot                  # built-in config
//! cargo run -p depot -- config.json   # SimConfig overrides
//! RUST_LOG=dvrp=debug cargo run -p depot
//! ```

mod greedy;

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dv_core::{DvrpError, Metric, OrderId, Point, SimConfig, SimRng, Tick, VehicleId};
use dv_elements::{Location, MetricTravel, Order, Registry, Vehicle};
use dv_output::{CsvWriter, OutputWriter, SimOutputObserver, collect_order_stats, collect_vehicle_stats};
use dv_routing::RawDecision;
use dv_sim::{OrderEvent, SimBuilder, SimObserver, TracingObserver, VehicleEvent};

use greedy::Greedy;

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:          u64   = 7;
const ORDER_COUNT:   usize = 24;
const VEHICLE_COUNT: usize = 3;
const CAPACITY:      f64   = 10.0;
/// Grid units per tick (1 tick = 1 minute).
const SPEED:         f64   = 0.5;
const RELEASE_SPAN:  u64   = 240;
const OUTPUT_DIR:    &str  = "output/depot";

const CUSTOMERS: [(&str, f64, f64); 6] = [
    ("harbor",    4.0, 12.0),
    ("mill",     -8.0,  3.0),
    ("market",    6.0, -5.0),
    ("school",   -3.0, -9.0),
    ("clinic",   10.0,  2.0),
    ("station",  -6.0, 10.0),
];

// ── Scenario ──────────────────────────────────────────────────────────────────

fn build_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.add_location(Location::new("depot").with_point(Point::new(0.0, 0.0)).with_resource(1)?)?;
    for (name, x, y) in CUSTOMERS {
        registry.add_location(Location::new(name).with_point(Point::new(x, y)))?;
    }
    let depot = registry.location_id("depot").context("depot location")?;
    for i in 0..VEHICLE_COUNT {
        let van = Vehicle::new(format!("van{}", i + 1), depot)
            .with_capacity(CAPACITY)?
            .with_travel(MetricTravel { metric: Metric::Euclidean, speed: SPEED });
        registry.add_vehicle(van)?;
    }
    Ok(registry)
}

fn generate_orders(registry: &Registry, rng: &mut SimRng) -> Result<Vec<Order>> {
    let depot = registry.location_id("depot").context("depot location")?;
    let customers: Vec<_> = CUSTOMERS.iter().filter_map(|(name, ..)| registry.location_id(name)).collect();
    (0..ORDER_COUNT)
        .map(|i| -> Result<Order> {
            let customer = *rng.choose(&customers).context("no customers")?;
            let release = rng.gen_range(0..RELEASE_SPAN);
            Ok(Order::new(format!("o{:02}", i + 1), depot, customer)
                .with_quantity(rng.gen_range(1.0..3.0))
                .with_release(Tick(release))
                .with_due(Tick(release + rng.gen_range(60..180)))
                .with_pickup_duration(2)
                .with_delivery_duration(5))
        })
        .collect()
}

fn load_config() -> Result<SimConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            Ok(SimConfig::from_json_str(&json)?)
        }
        None => Ok(SimConfig {
            time_unit_secs: 60,
            periodic_routing_step: Some(15),
            ..SimConfig::default()
        }),
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

/// Writes CSV output, logs through `tracing`, and counts deliveries.
struct DemoObserver<W: OutputWriter> {
    output:    SimOutputObserver<W>,
    log:       TracingObserver,
    delivered: usize,
}

impl<W: OutputWriter> SimObserver for DemoObserver<W> {
    fn on_simulation_start(&mut self, now: Tick, registry: &Registry) {
        self.output.on_simulation_start(now, registry);
        self.log.on_simulation_start(now, registry);
    }

    fn on_order_event(&mut self, now: Tick, order: OrderId, event: &OrderEvent, registry: &Registry) {
        if matches!(event, OrderEvent::Delivered { .. }) {
            self.delivered += 1;
        }
        self.output.on_order_event(now, order, event, registry);
        self.log.on_order_event(now, order, event, registry);
    }

    fn on_vehicle_event(&mut self, now: Tick, vehicle: VehicleId, event: &VehicleEvent, registry: &Registry) {
        self.output.on_vehicle_event(now, vehicle, event, registry);
        self.log.on_vehicle_event(now, vehicle, event, registry);
    }

    fn on_routing_start(&mut self, now: Tick, epoch: u64) {
        self.output.on_routing_start(now, epoch);
        self.log.on_routing_start(now, epoch);
    }

    fn on_routing_finish(&mut self, now: Tick, epoch: u64, decision: &RawDecision) {
        self.output.on_routing_finish(now, epoch, decision);
        self.log.on_routing_finish(now, epoch, decision);
    }

    fn on_all_orders_requested(&mut self, now: Tick) {
        self.output.on_all_orders_requested(now);
        self.log.on_all_orders_requested(now);
    }

    fn on_warning(&mut self, now: Tick, message: &str) {
        self.output.on_warning(now, message);
    }

    fn on_simulation_finish(&mut self, now: Tick, registry: &Registry) {
        self.output.on_simulation_finish(now, registry);
        self.log.on_simulation_finish(now, registry);
    }

    fn on_error(&mut self, now: Tick, error: &DvrpError) {
        self.output.on_error(now, error);
        self.log.on_error(now, error);
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let registry = build_registry()?;
    let mut rng = SimRng::new(SEED).child(1);
    let orders = generate_orders(&registry, &mut rng)?;
    info!(target: "depot", orders = orders.len(), vehicles = VEHICLE_COUNT, seed = SEED, "scenario generated");

    let mut sim = SimBuilder::new(config.clone(), registry, Greedy).orders(orders).build()?;

    std::fs::create_dir_all(OUTPUT_DIR)?;
    let writer = CsvWriter::new(Path::new(OUTPUT_DIR))?;
    let mut obs = DemoObserver {
        output:    SimOutputObserver::new(writer, &config),
        log:       TracingObserver,
        delivered: 0,
    };

    let t0 = Instant::now();
    sim.run(&mut obs)?;
    let elapsed = t0.elapsed();

    if let Some(e) = obs.output.take_error() {
        eprintln!("output error: {e}");
    }

    println!("Simulation complete in {:.3} s at {}", elapsed.as_secs_f64(), sim.clock());
    println!("  delivered {} / {ORDER_COUNT} orders, output in {OUTPUT_DIR}/", obs.delivered);
    println!();

    println!("{:<8} {:>10} {:>8} {:>8} {:>8} {:>8}", "Vehicle", "Distance", "Moving", "Waiting", "Service", "Idle");
    println!("{}", "-".repeat(56));
    for row in collect_vehicle_stats(sim.registry()) {
        println!(
            "{:<8} {:>10.2} {:>8} {:>8} {:>8} {:>8}",
            row.vehicle, row.distance, row.moving, row.waiting, row.service, row.idle
        );
    }

    let stats = collect_order_stats(sim.registry());
    let late = stats.iter().filter(|s| s.tardiness > 0).count();
    let total: u64 = stats.iter().map(|s| s.tardiness).sum();
    println!();
    println!("Late orders: {late} / {}  (total tardiness {total} ticks)", stats.len());
    Ok(())
}
