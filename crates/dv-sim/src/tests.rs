//! Scenario tests for dv-sim.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use dv_core::{BoxError, DvrpError, LocationId, OrderId, SimConfig, Tick, VehicleId};
use dv_elements::{ConstantTravel, Location, Order, Registry, Vehicle};
use dv_routing::{RawDecision, RawVisit, State};

use crate::{OrderEvent, SimBuilder, SimObserver, VehicleEvent};

// ── Helpers ───────────────────────────────────────────────────────────────────

const V1: VehicleId = VehicleId(0);
const V2: VehicleId = VehicleId(1);
const O1: OrderId = OrderId(0);
const O2: OrderId = OrderId(1);
const DEPOT: LocationId = LocationId(0);
const A: LocationId = LocationId(1);
const B: LocationId = LocationId(2);

/// depot, a, b and one vehicle "v1" at the depot.
fn world(vehicle: Vehicle) -> Registry {
    let mut r = Registry::new();
    r.add_location(Location::new("depot")).unwrap();
    r.add_location(Location::new("a")).unwrap();
    r.add_location(Location::new("b")).unwrap();
    r.add_vehicle(vehicle).unwrap();
    r
}

fn on_request() -> SimConfig {
    SimConfig { decision_on_request: true, ..SimConfig::default() }
}

fn travel(time: u64) -> ConstantTravel {
    ConstantTravel { time, distance: 1.0 }
}

type Algo = Box<dyn FnMut(&State) -> Result<RawDecision, BoxError>>;

/// Accepts every undecided order and appends a pickup and a delivery visit
/// for it to `vehicle`'s plan.
fn dispatch(vehicle: &'static str) -> Algo {
    Box::new(move |state: &State| {
        let mut visits: Vec<RawVisit> = state.vehicles[vehicle]
            .next_visits
            .iter()
            .map(|v| RawVisit {
                location:            v.location.clone(),
                pickup_list:         v.pickup_list.clone(),
                delivery_list:       v.delivery_list.clone(),
                earliest_start_time: v.earliest_start_time,
            })
            .collect();
        let mut decision = RawDecision::new();
        for (name, order) in &state.open_orders {
            if order.status == "NO_DECISION" {
                decision = decision.accept(name);
                visits.push(RawVisit::at(&order.pickup_location).pickup(name));
                visits.push(RawVisit::at(&order.delivery_location).deliver(name));
            }
        }
        Ok(decision.route(vehicle, visits))
    })
}

/// Answers epoch `n` with `script[n - 1]`, and with an empty decision once
/// the script is exhausted.
fn scripted(script: Vec<RawDecision>) -> Algo {
    let mut script = script.into_iter();
    Box::new(move |_: &State| Ok(script.next().unwrap_or_default()))
}

/// Keeps every snapshot the wrapped algorithm sees.
fn recording(mut inner: Algo, seen: Rc<RefCell<Vec<State>>>) -> Algo {
    Box::new(move |state: &State| {
        seen.borrow_mut().push(state.clone());
        inner(state)
    })
}

#[derive(Default)]
struct Recorder {
    orders:        Vec<(Tick, OrderId, OrderEvent)>,
    vehicles:      Vec<(Tick, VehicleId, VehicleEvent)>,
    epochs:        Vec<Tick>,
    warnings:      Vec<String>,
    all_requested: Option<Tick>,
    finished:      bool,
    errors:        usize,
}

impl Recorder {
    fn order_events(&self, id: OrderId) -> Vec<&'static str> {
        self.orders.iter().filter(|(_, o, _)| *o == id).map(|(_, _, e)| e.name()).collect()
    }

    fn vehicle_events(&self, id: VehicleId) -> Vec<&'static str> {
        self.vehicles.iter().filter(|(_, v, _)| *v == id).map(|(_, _, e)| e.name()).collect()
    }
}

impl SimObserver for Recorder {
    fn on_order_event(&mut self, now: Tick, order: OrderId, event: &OrderEvent, _: &Registry) {
        self.orders.push((now, order, *event));
    }

    fn on_vehicle_event(&mut self, now: Tick, vehicle: VehicleId, event: &VehicleEvent, _: &Registry) {
        self.vehicles.push((now, vehicle, *event));
    }

    fn on_routing_start(&mut self, now: Tick, _epoch: u64) {
        self.epochs.push(now);
    }

    fn on_all_orders_requested(&mut self, now: Tick) {
        self.all_requested = Some(now);
    }

    fn on_warning(&mut self, _now: Tick, message: &str) {
        self.warnings.push(message.to_owned());
    }

    fn on_simulation_finish(&mut self, _now: Tick, _registry: &Registry) {
        self.finished = true;
    }

    fn on_error(&mut self, _now: Tick, _error: &DvrpError) {
        self.errors += 1;
    }
}

// ── Vehicle procedure ─────────────────────────────────────────────────────────

#[cfg(test)]
mod procedure {
    use dv_elements::{Loading, OrderStatus, VehicleStatus};

    use super::*;

    #[test]
    fn delivery_time_adds_up_service_and_travel() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(5)));
        let order = Order::new("o1", DEPOT, A)
            .with_release(Tick(10))
            .with_pickup_duration(2)
            .with_delivery_duration(3);
        let mut sim = SimBuilder::new(on_request(), registry, dispatch("v1")).orders(vec![order]).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        let o1 = sim.registry().order(O1);
        assert_eq!(o1.status, OrderStatus::Accepted);
        assert_eq!(o1.acceptance_time, Some(Tick(10)));
        assert_eq!(o1.pickup_time, Some(Tick(12)));
        assert_eq!(o1.pickup_vehicle, Some(V1));
        assert_eq!(o1.delivery_time, Some(Tick(20)));
        assert!(!o1.can_be_rejected_or_canceled);

        let v1 = sim.registry().vehicle(V1);
        assert!(v1.is_idle());
        assert!(v1.carrying_orders.is_empty());
        assert_eq!(rec.epochs, vec![Tick(10)]);
        assert_eq!(rec.all_requested, Some(Tick(10)));
        assert!(rec.finished);
        assert!(rec.warnings.is_empty());
        assert_eq!(sim.clock().now, sim.now());
        assert_eq!(sim.now(), Tick(20));
    }

    #[test]
    fn clock_follows_the_events() {
        let config = SimConfig { time_unit_secs: 60, ..on_request() };
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(5)));
        let order = Order::new("o1", DEPOT, A).with_release(Tick(4));
        let mut sim = SimBuilder::new(config, registry, dispatch("v1")).orders(vec![order]).build().unwrap();
        assert_eq!(sim.clock().now, Tick::ZERO);
        assert_eq!(sim.clock().time_unit_secs, 60);

        let mut rec = Recorder::default();
        sim.run_until(Tick(6), &mut rec).unwrap();
        assert_eq!(sim.clock().now, sim.now());
        sim.run(&mut rec).unwrap();
        assert_eq!(sim.clock().now, Tick(9));
    }

    #[test]
    fn visits_keep_their_timestamps() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(5)));
        let order = Order::new("o1", DEPOT, A).with_pickup_duration(2).with_delivery_duration(3);
        let mut sim = SimBuilder::new(on_request(), registry, dispatch("v1")).orders(vec![order]).build().unwrap();
        sim.run(&mut Recorder::default()).unwrap();

        // Start visit, depot pickup, delivery at a.
        let history = &sim.registry().vehicle(V1).previous_visits;
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].location, DEPOT);
        assert_eq!(history[1].service_start_time, Some(Tick(0)));
        assert_eq!(history[1].departure_time, Some(Tick(2)));
        assert_eq!(history[2].location, A);
        assert_eq!(history[2].arrival_time, Some(Tick(7)));
        assert_eq!(history[2].service_finish_time, Some(Tick(10)));
        assert!(sim.registry().vehicle(V1).current_visit.is_none());
    }

    #[test]
    fn same_location_move_is_not_physical() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(5)));
        let order = Order::new("o1", DEPOT, A);
        let mut sim = SimBuilder::new(on_request(), registry, dispatch("v1")).orders(vec![order]).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        let departures: Vec<bool> = rec
            .vehicles
            .iter()
            .filter_map(|(_, _, e)| match e {
                VehicleEvent::Departed { physical, .. } => Some(*physical),
                _ => None,
            })
            .collect();
        assert_eq!(departures, vec![false, true]);
        assert_eq!(sim.registry().order(O1).delivery_time, Some(Tick(5)));
    }

    #[test]
    fn fifo_unloading_violation_aborts() {
        let registry = world(Vehicle::new("v1", DEPOT).with_loading(Loading::Fifo));
        let orders = vec![Order::new("o1", DEPOT, A), Order::new("o2", DEPOT, A)];
        let decision = RawDecision::new().accept("o1").accept("o2").route(
            "v1",
            vec![RawVisit::at("depot").pickup("o1").pickup("o2"), RawVisit::at("a").deliver("o2").deliver("o1")],
        );
        let mut sim = SimBuilder::new(on_request(), registry, scripted(vec![decision])).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        let err = sim.run(&mut rec).unwrap_err();
        assert!(matches!(
            err,
            DvrpError::Simulation(dv_core::SimulationError::LoadingViolated { vehicle, order, .. })
                if vehicle == V1 && order == O2
        ));
        assert_eq!(rec.errors, 1);
        assert!(!rec.finished);
    }

    #[test]
    fn resource_serves_one_vehicle_at_a_time() {
        let mut r = Registry::new();
        r.add_location(Location::new("depot")).unwrap();
        r.add_location(Location::new("dock").with_resource(1).unwrap()).unwrap();
        r.add_vehicle(Vehicle::new("v1", DEPOT)).unwrap();
        r.add_vehicle(Vehicle::new("v2", DEPOT)).unwrap();
        let dock = LocationId(1);
        let orders = vec![
            Order::new("o1", DEPOT, dock).with_delivery_duration(5),
            Order::new("o2", DEPOT, dock).with_delivery_duration(5),
        ];
        let decision = RawDecision::new()
            .accept("o1")
            .accept("o2")
            .route("v1", vec![RawVisit::at("depot").pickup("o1"), RawVisit::at("dock").deliver("o1")])
            .route("v2", vec![RawVisit::at("depot").pickup("o2"), RawVisit::at("dock").deliver("o2")]);
        let mut sim = SimBuilder::new(on_request(), r, scripted(vec![decision])).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        assert_eq!(sim.registry().order(O1).delivery_time, Some(Tick(5)));
        assert_eq!(sim.registry().order(O2).delivery_time, Some(Tick(10)));
        assert!(rec.vehicles.contains(&(Tick(0), V2, VehicleEvent::ServiceRequested { at: dock, queued: true })));
        let resource = sim.registry().location(dock).resource.as_ref().unwrap();
        assert!(resource.users().is_empty());
    }

    #[test]
    fn waits_for_the_visit_start_time() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let decision = RawDecision::new()
            .accept("o1")
            .route("v1", vec![RawVisit::at("depot").pickup("o1").not_before(40), RawVisit::at("a").deliver("o1")]);
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim = SimBuilder::new(on_request(), registry, scripted(vec![decision])).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        assert!(rec.vehicles.contains(&(Tick(0), V1, VehicleEvent::DeparturePostponed { until: Tick(40) })));
        assert_eq!(sim.registry().order(O1).pickup_time, Some(Tick(40)));
    }

    #[test]
    fn waits_for_the_order_time_window() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(5)));
        let order = Order::new("o1", DEPOT, A).with_delivery_window(Some(Tick(30)), None);
        let mut sim = SimBuilder::new(on_request(), registry, dispatch("v1")).orders(vec![order]).build().unwrap();
        sim.run(&mut Recorder::default()).unwrap();

        let o1 = sim.registry().order(O1);
        assert_eq!(o1.delivery_time, Some(Tick(30)));
        let visit = &sim.registry().vehicle(V1).previous_visits[2];
        assert_eq!(visit.arrival_time, Some(Tick(5)));
        assert_eq!(visit.waiting_time(), Some(25));
    }

    #[test]
    fn horizon_with_a_travelling_vehicle_fails() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(10)));
        let config = SimConfig { horizon: Some(Tick(5)), ..on_request() };
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim = SimBuilder::new(config, registry, dispatch("v1")).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        let err = sim.run(&mut rec).unwrap_err();
        assert!(matches!(
            err,
            DvrpError::Simulation(dv_core::SimulationError::VehicleNotIdle { vehicle, status: "EN_ROUTE" })
                if vehicle == V1
        ));
        assert_eq!(sim.now(), Tick(5));
        assert_eq!(rec.errors, 1);
    }

    #[test]
    fn horizon_closes_idle_vehicles() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let config = SimConfig { horizon: Some(Tick(100)), ..SimConfig::default() };
        let mut sim = SimBuilder::new(config, registry, dispatch("v1")).build().unwrap();
        sim.run(&mut Recorder::default()).unwrap();

        assert_eq!(sim.now(), Tick(100));
        let v1 = sim.registry().vehicle(V1);
        assert_eq!(v1.status, VehicleStatus::Idle);
        assert_eq!(v1.previous_visits.len(), 1);
        assert_eq!(v1.previous_visits[0].departure_time, Some(Tick(100)));
        assert!(sim.is_finished());
    }
}

// ── Interruptions ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod interruption {
    use dv_core::SimulationError;
    use dv_elements::{PermissiveInterrupts, Phase, VehicleStatus};

    use crate::VehiclePhase;

    use super::*;

    #[test]
    fn new_epoch_interrupts_pre_departure_and_reroutes() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A), Order::new("o2", DEPOT, B).with_release(Tick(20))];
        let first = RawDecision::new()
            .accept("o1")
            .route("v1", vec![RawVisit::at("depot").pickup("o1").not_before(50), RawVisit::at("a").deliver("o1")]);
        let second = RawDecision::new().accept("o2").route(
            "v1",
            vec![
                RawVisit::at("depot").pickup("o1").pickup("o2"),
                RawVisit::at("a").deliver("o1"),
                RawVisit::at("b").deliver("o2"),
            ],
        );
        let mut sim =
            SimBuilder::new(on_request(), registry, scripted(vec![first, second])).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        let events = rec.vehicle_events(V1);
        assert_eq!(&events[..2], &["departure_postponed", "predeparture_interrupted"]);
        assert_eq!(sim.registry().order(O1).delivery_time, Some(Tick(20)));
        assert_eq!(sim.registry().order(O2).delivery_time, Some(Tick(20)));
        assert_eq!(rec.epochs, vec![Tick(0), Tick(20)]);
    }

    #[test]
    fn travel_interruption_is_fatal_by_default() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(10)));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim = SimBuilder::new(on_request(), registry, dispatch("v1")).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(5), &mut rec).unwrap();
        assert!(matches!(sim.vehicle_phase(V1), Some(VehiclePhase::Travel { .. })));

        let err = sim.interrupt_vehicle(V1, Phase::Travel, &mut rec).unwrap_err();
        assert!(matches!(
            err,
            DvrpError::Simulation(SimulationError::InterruptionNotAllowed { phase: "travel", .. })
        ));
        assert_eq!(rec.vehicle_events(V1).last(), Some(&"travel_interrupted"));
    }

    #[test]
    fn permissive_vehicle_stops_where_it_is() {
        let vehicle = Vehicle::new("v1", DEPOT).with_travel(travel(10)).with_interrupts(PermissiveInterrupts);
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim = SimBuilder::new(on_request(), world(vehicle), dispatch("v1")).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(5), &mut rec).unwrap();
        sim.interrupt_vehicle(V1, Phase::Travel, &mut rec).unwrap();

        assert_eq!(sim.vehicle_phase(V1), Some(VehiclePhase::Inactive));
        assert_eq!(sim.vehicle_phase(VehicleId(9)), None);
        assert_eq!(sim.registry().vehicle(V1).status, VehicleStatus::EnRoute);
        // The arrival timer is gone, so the vehicle never becomes idle again.
        let err = sim.run(&mut rec).unwrap_err();
        assert!(matches!(err, DvrpError::Simulation(SimulationError::VehicleNotIdle { .. })));
    }

    #[test]
    fn interrupting_another_phase_is_a_no_op() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(10)));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim = SimBuilder::new(on_request(), registry, dispatch("v1")).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(5), &mut rec).unwrap();

        sim.interrupt_vehicle(V1, Phase::Service, &mut rec).unwrap();
        assert!(matches!(sim.vehicle_phase(V1), Some(VehiclePhase::Travel { .. })));
        sim.run(&mut rec).unwrap();
        assert_eq!(sim.registry().order(O1).delivery_time, Some(Tick(10)));
    }
}

// ── Decision epochs ───────────────────────────────────────────────────────────

#[cfg(test)]
mod epochs {
    use dv_core::RoutingError;
    use dv_elements::OrderStatus;
    use dv_routing::RejectAll;

    use crate::{HookContext, SimHooks};

    use super::*;

    #[test]
    fn requests_before_the_start_share_one_epoch() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let mut sim = SimBuilder::new(SimConfig::default(), registry, RejectAll).build().unwrap();
        let first = sim.request_for_routing();
        let second = sim.request_for_routing();
        assert_eq!(first, second);
        assert!(!sim.is_resolved(first));

        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();
        assert_eq!(rec.epochs, vec![Tick(0)]);
        assert_eq!(sim.epoch(), 1);
        assert!(sim.is_resolved(first));
        assert_ne!(sim.request_for_routing(), first);
    }

    #[test]
    fn orders_released_together_are_decided_together() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A), Order::new("o2", DEPOT, B)];
        let algorithm = recording(Box::new(|_: &State| Ok(RawDecision::new())), Rc::clone(&seen));
        let mut sim = SimBuilder::new(on_request(), registry, algorithm).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].epoch, 1);
        assert_eq!(seen[0].open_orders.len(), 2);
        // Nobody decided on them.
        assert_eq!(rec.warnings.len(), 2);
    }

    #[test]
    fn infeasible_decision_changes_nothing() {
        let registry = world(Vehicle::new("v1", DEPOT).with_capacity(1.0).unwrap());
        let orders = vec![Order::new("o1", DEPOT, A).with_quantity(1.0), Order::new("o2", DEPOT, B).with_quantity(1.0)];
        let decision = RawDecision::new().accept("o1").accept("o2").route(
            "v1",
            vec![
                RawVisit::at("depot").pickup("o1").pickup("o2"),
                RawVisit::at("a").deliver("o1"),
                RawVisit::at("b").deliver("o2"),
            ],
        );
        let mut sim = SimBuilder::new(on_request(), registry, scripted(vec![decision])).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        let err = sim.run(&mut rec).unwrap_err();

        assert!(matches!(err, DvrpError::Routing(RoutingError::CapacityExceeded { vehicle, .. }) if vehicle == V1));
        assert_eq!(rec.errors, 1);
        assert_eq!(sim.registry().order(O1).status, OrderStatus::NoDecision);
        assert!(sim.registry().vehicle(V1).next_visits.is_empty());
    }

    #[test]
    fn en_route_diversion_is_rejected() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(10)));
        let orders = vec![Order::new("o1", DEPOT, A), Order::new("o2", DEPOT, B).with_release(Tick(5))];
        let mut calls = 0;
        let mut first = dispatch("v1");
        let algorithm: Algo = Box::new(move |state: &State| {
            calls += 1;
            if calls == 1 { first(state) } else { Ok(RawDecision::new().route("v1", vec![RawVisit::at("b")])) }
        });
        let mut sim = SimBuilder::new(on_request(), registry, algorithm).orders(orders).build().unwrap();
        let err = sim.run(&mut Recorder::default()).unwrap_err();
        assert!(matches!(
            err,
            DvrpError::Routing(RoutingError::EnRouteDiversion { vehicle, committed, proposed })
                if vehicle == V1 && committed == A && proposed == B
        ));
        assert_eq!(sim.now(), Tick(5));
    }

    #[test]
    fn unknown_order_in_decision_is_rejected() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let decision = RawDecision::new().accept("o9");
        let mut sim = SimBuilder::new(on_request(), registry, scripted(vec![decision])).orders(orders).build().unwrap();
        let err = sim.run(&mut Recorder::default()).unwrap_err();
        assert!(matches!(err, DvrpError::Routing(RoutingError::UnknownOrder(name)) if name == "o9"));
    }

    #[test]
    fn algorithm_failure_aborts() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let algorithm: Algo = Box::new(|_: &State| Err("solver crashed".into()));
        let mut sim = SimBuilder::new(on_request(), registry, algorithm).orders(orders).build().unwrap();
        let err = sim.run(&mut Recorder::default()).unwrap_err();
        assert!(matches!(err, DvrpError::Routing(RoutingError::Algorithm(_))));
    }

    #[test]
    fn periodic_trigger_runs_until_no_order_is_open() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let config = SimConfig { periodic_routing_step: Some(10), ..SimConfig::default() };
        let orders = vec![Order::new("o1", DEPOT, A).with_release(Tick(25))];
        let mut sim = SimBuilder::new(config, registry, RejectAll).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        assert_eq!(rec.epochs, vec![Tick(0), Tick(10), Tick(20), Tick(30)]);
        assert_eq!(sim.registry().order(O1).status, OrderStatus::Rejected);
        assert_eq!(rec.all_requested, Some(Tick(25)));
    }

    #[test]
    fn periodic_trigger_can_stop_after_the_last_request() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let config = SimConfig {
            periodic_routing_step: Some(10),
            stop_periodic_after_last_request: true,
            ..SimConfig::default()
        };
        let orders = vec![Order::new("o1", DEPOT, A).with_release(Tick(25))];
        let mut sim = SimBuilder::new(config, registry, RejectAll).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        assert_eq!(rec.epochs, vec![Tick(0), Tick(10), Tick(20)]);
        assert_eq!(sim.registry().order(O1).status, OrderStatus::NoDecision);
        assert_eq!(rec.warnings.len(), 1);
    }

    struct SlowRouting;

    impl SimHooks for SlowRouting {
        fn routing_delay(&mut self, _elapsed: Duration, _configured: u64) -> u64 {
            7
        }
    }

    #[test]
    fn routing_delay_defers_enforcement() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim =
            SimBuilder::new(on_request(), registry, dispatch("v1")).orders(orders).hooks(SlowRouting).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(3), &mut rec).unwrap();
        assert!(sim.is_routing_in_progress());
        assert_eq!(sim.registry().order(O1).status, OrderStatus::NoDecision);

        sim.run(&mut rec).unwrap();
        assert!(!sim.is_routing_in_progress());
        assert_eq!(sim.registry().order(O1).acceptance_time, Some(Tick(7)));
        assert_eq!(sim.registry().order(O1).delivery_time, Some(Tick(7)));
    }

    #[test]
    fn second_epoch_during_routing_is_fatal() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim =
            SimBuilder::new(on_request(), registry, dispatch("v1")).orders(orders).hooks(SlowRouting).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(3), &mut rec).unwrap();
        assert!(sim.is_routing_in_progress());

        sim.request_for_routing();
        let err = sim.run(&mut rec).unwrap_err();
        assert!(matches!(err, DvrpError::Routing(RoutingError::AlreadyInProgress)));
        assert_eq!(rec.errors, 1);
        assert_eq!(rec.epochs, vec![Tick(0)]);
        assert_eq!(sim.now(), Tick(3));
        assert_eq!(sim.registry().order(O1).status, OrderStatus::NoDecision);
    }

    /// Requests a follow-up order once the first one is delivered.
    struct FollowUp(bool);

    impl SimHooks for FollowUp {
        fn on_order_event(&mut self, _order: OrderId, event: &OrderEvent, ctx: &HookContext<'_>) -> Vec<crate::Action> {
            if self.0 || !matches!(event, OrderEvent::Delivered { .. }) {
                return vec![];
            }
            self.0 = true;
            let a = ctx.registry.location_id("a").unwrap_or(A);
            let order = Order::new("back", a, DEPOT);
            vec![crate::Action::RequestOrder { order: Box::new(order), decision_point: true }]
        }
    }

    #[test]
    fn hooks_can_request_orders() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(4)));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim = SimBuilder::new(SimConfig::default(), registry, dispatch("v1"))
            .orders(orders)
            .hooks(FollowUp(false))
            .build()
            .unwrap();
        let handle = sim.request_for_routing();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        assert!(sim.is_resolved(handle));
        let back = sim.registry().order_id("back").unwrap();
        assert_eq!(sim.registry().order(back).release_date, Tick(4));
        assert_eq!(sim.registry().order(back).delivery_time, Some(Tick(8)));
        assert_eq!(rec.epochs, vec![Tick(0), Tick(4)]);
    }
}

// ── Order lifecycle ───────────────────────────────────────────────────────────

#[cfg(test)]
mod orders {
    use dv_core::{ModelError, RoutingError, SimulationError};
    use dv_elements::OrderStatus;
    use dv_routing::RejectAll;

    use super::*;

    #[test]
    fn postponement_expiry_triggers_an_epoch() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let algorithm = recording(scripted(vec![RawDecision::new().postpone("o1", 30)]), Rc::clone(&seen));
        let mut sim = SimBuilder::new(on_request(), registry, algorithm).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        assert_eq!(rec.epochs, vec![Tick(0), Tick(30)]);
        assert_eq!(rec.order_events(O1), vec!["requested", "postponed", "postponement_expired"]);
        let seen = seen.borrow();
        assert_eq!(seen[1].time, 30);
        assert_eq!(seen[1].open_orders["o1"].status, "POSTPONED");
        assert_eq!(sim.registry().order(O1).status, OrderStatus::Postponed);
        assert!(!sim.is_postponed(O1));
    }

    #[test]
    fn new_epoch_interrupts_postponements() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A), Order::new("o2", DEPOT, B).with_release(Tick(10))];
        let algorithm = scripted(vec![RawDecision::new().postpone("o1", 100)]);
        let mut sim = SimBuilder::new(on_request(), registry, algorithm).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(5), &mut rec).unwrap();
        assert!(sim.is_postponed(O1));

        sim.run(&mut rec).unwrap();
        assert_eq!(rec.order_events(O1), vec!["requested", "postponed", "postponement_interrupted"]);
        assert_eq!(rec.epochs, vec![Tick(0), Tick(10)]);
        assert_eq!(sim.now(), Tick(10));
    }

    #[test]
    fn accepted_order_stays_accepted() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim = SimBuilder::new(SimConfig::default(), registry, RejectAll).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(1), &mut rec).unwrap();
        sim.enforce_decision(&RawDecision::new().accept("o1"), &mut rec).unwrap();

        let err = sim.enforce_decision(&RawDecision::new().postpone("o1", 50), &mut rec).unwrap_err();
        assert!(matches!(
            err,
            DvrpError::Routing(RoutingError::Enforce(SimulationError::PostponeAccepted(_)))
        ));
        assert!(!sim.is_postponed(O1));

        let err = sim.enforce_decision(&RawDecision::new().reject("o1"), &mut rec).unwrap_err();
        assert!(matches!(
            err,
            DvrpError::Routing(RoutingError::Enforce(SimulationError::RejectAccepted(_)))
        ));
        assert_eq!(sim.registry().order(O1).status, OrderStatus::Accepted);
        assert_eq!(rec.order_events(O1), vec!["requested", "accepted"]);
    }

    #[test]
    fn postponing_into_the_past_is_skipped() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A).with_release(Tick(20))];
        let algorithm = scripted(vec![RawDecision::new().postpone("o1", 5)]);
        let mut sim = SimBuilder::new(on_request(), registry, algorithm).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        assert_eq!(sim.registry().order(O1).status, OrderStatus::NoDecision);
        assert!(rec.warnings[0].contains("in the past"));
    }

    #[test]
    fn cancellation_imposes_a_decision_point() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let algorithm = recording(Box::new(|_: &State| Ok(RawDecision::new())), Rc::clone(&seen));
        let mut sim = SimBuilder::new(SimConfig::default(), registry, algorithm).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(5), &mut rec).unwrap();
        assert!(rec.epochs.is_empty());

        sim.cancel_order(O1, &mut rec).unwrap();
        sim.run(&mut rec).unwrap();

        assert_eq!(rec.epochs, vec![Tick(5)]);
        let seen = seen.borrow();
        assert_eq!(seen[0].canceled_orders, vec!["o1".to_owned()]);
        assert!(!seen[0].open_orders.contains_key("o1"));
        assert_eq!(sim.registry().order(O1).cancellation_time, Some(Tick(5)));
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn order_under_service_cannot_be_canceled() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A).with_pickup_duration(10)];
        let mut sim = SimBuilder::new(on_request(), registry, dispatch("v1")).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(5), &mut rec).unwrap();

        let err = sim.cancel_order(O1, &mut rec).unwrap_err();
        assert!(matches!(
            err,
            DvrpError::Simulation(SimulationError::OrderLocked { action: "canceled", .. })
        ));
        assert_eq!(sim.registry().order(O1).status, OrderStatus::Accepted);
    }

    #[test]
    fn update_keeps_the_name_and_requests_routing() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim = SimBuilder::new(SimConfig::default(), registry, RejectAll).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(1), &mut rec).unwrap();

        sim.update_order(
            O1,
            |o| {
                o.name = "renamed".into();
                o.quantity = 4.0;
            },
            &mut rec,
        )
        .unwrap();
        assert_eq!(sim.registry().order(O1).name, "o1");
        assert_eq!(sim.registry().order(O1).quantity, 4.0);

        sim.run(&mut rec).unwrap();
        assert_eq!(rec.epochs, vec![Tick(1)]);
        assert_eq!(sim.registry().order(O1).status, OrderStatus::Rejected);
    }

    #[test]
    fn update_to_an_unknown_location_is_refused() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let orders = vec![Order::new("o1", DEPOT, A)];
        let mut sim = SimBuilder::new(SimConfig::default(), registry, RejectAll).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(1), &mut rec).unwrap();

        let err = sim
            .update_order(
                O1,
                |o| {
                    o.quantity = 3.0;
                    o.pickup.location = LocationId(42);
                },
                &mut rec,
            )
            .unwrap_err();
        assert!(matches!(err, DvrpError::Model(ModelError::UnknownLocation(LocationId(42)))));
        assert_eq!(sim.registry().order(O1).pickup.location, DEPOT);
        assert_eq!(sim.registry().order(O1).quantity, 0.0);
        assert_eq!(rec.order_events(O1), vec!["requested"]);

        sim.run(&mut rec).unwrap();
        assert!(rec.epochs.is_empty());
    }

    #[test]
    fn late_requests_are_released_now() {
        let registry = world(Vehicle::new("v1", DEPOT));
        let mut sim = SimBuilder::new(SimConfig::default(), registry, RejectAll).build().unwrap();
        let mut rec = Recorder::default();
        sim.run_until(Tick(10), &mut rec).unwrap();

        sim.request_order(Order::new("late", DEPOT, A).with_release(Tick(3)), true).unwrap();
        let dup = sim.request_order(Order::new("late", DEPOT, B), false).unwrap_err();
        assert!(matches!(dup, ModelError::DuplicateOrder(name) if name == "late"));

        sim.run(&mut rec).unwrap();
        let late = sim.registry().order_id("late").unwrap();
        assert_eq!(sim.registry().order(late).release_date, Tick(10));
        assert_eq!(rec.epochs, vec![Tick(10)]);
        // Orders added at run time do not count towards the initial set.
        assert_eq!(rec.all_requested, None);
        assert!(sim.all_orders_requested());
    }

    #[test]
    fn builder_validates_inputs() {
        let dup = vec![Order::new("o1", DEPOT, A), Order::new("o1", DEPOT, B)];
        let err = SimBuilder::new(SimConfig::default(), world(Vehicle::new("v1", DEPOT)), RejectAll)
            .orders(dup)
            .build()
            .err();
        assert!(matches!(err, Some(ModelError::DuplicateOrder(_))));

        let nowhere = vec![Order::new("o1", DEPOT, LocationId(9))];
        let err = SimBuilder::new(SimConfig::default(), world(Vehicle::new("v1", DEPOT)), RejectAll)
            .orders(nowhere)
            .build()
            .err();
        assert!(matches!(err, Some(ModelError::UnknownLocation(_))));

        let config = SimConfig { periodic_routing_step: Some(0), ..SimConfig::default() };
        let err = SimBuilder::new(config, world(Vehicle::new("v1", DEPOT)), RejectAll).build().err();
        assert!(matches!(err, Some(ModelError::Config(_))));
    }

    #[test]
    fn events_of_one_order_are_in_lifecycle_order() {
        let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(3)));
        let orders = vec![Order::new("o1", DEPOT, A).with_release(Tick(2))];
        let mut sim = SimBuilder::new(on_request(), registry, dispatch("v1")).orders(orders).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        assert_eq!(rec.order_events(O1), vec!["requested", "accepted", "picked_up", "delivered"]);
        let times: Vec<Tick> = rec.orders.iter().map(|(t, _, _)| *t).collect();
        assert_eq!(times, vec![Tick(2), Tick(2), Tick(2), Tick(5)]);
    }
}

// ── Properties ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use dv_core::RoutingError;
    use proptest::prelude::*;

    use super::*;

    fn order_specs() -> impl Strategy<Value = Vec<(u64, u32, u32, u64, u64)>> {
        prop::collection::vec((0u64..50, 0u32..3, 0u32..3, 0u64..4, 0u64..4), 1..8)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn every_dispatched_order_is_delivered(specs in order_specs(), time in 0u64..10) {
            let registry = world(Vehicle::new("v1", DEPOT).with_travel(travel(time)));
            let orders: Vec<Order> = specs
                .iter()
                .enumerate()
                .map(|(i, &(release, from, to, pickup, delivery))| {
                    Order::new(format!("o{i}"), LocationId(from), LocationId(to))
                        .with_release(Tick(release))
                        .with_pickup_duration(pickup)
                        .with_delivery_duration(delivery)
                })
                .collect();
            let mut sim = SimBuilder::new(on_request(), registry, dispatch("v1")).orders(orders).build().unwrap();
            sim.run(&mut Recorder::default()).unwrap();

            for (_, order) in sim.registry().orders() {
                let delivered = order.delivery_time;
                prop_assert!(delivered.is_some(), "{} not delivered", order.name);
                let earliest = order.release_date + order.pickup.duration + order.delivery.duration;
                prop_assert!(delivered.unwrap_or(Tick::ZERO) >= earliest);
                prop_assert!(order.pickup_time.unwrap_or(Tick::ZERO) >= order.release_date);
            }
            prop_assert!(sim.registry().vehicle(V1).carrying_orders.is_empty());
        }

        #[test]
        fn load_never_exceeds_capacity(quantities in prop::collection::vec(1u32..4, 1..6), capacity in 1u32..10) {
            let capacity = f64::from(capacity);
            let vehicle = Vehicle::new("v1", DEPOT).with_travel(travel(2)).with_capacity(capacity).unwrap();
            let orders: Vec<Order> = quantities
                .iter()
                .enumerate()
                .map(|(i, &q)| Order::new(format!("o{i}"), DEPOT, A).with_quantity(f64::from(q)))
                .collect();
            let names: Vec<String> = orders.iter().map(|o| o.name.clone()).collect();
            let total: f64 = quantities.iter().copied().map(f64::from).sum();

            // Load everything at the depot, then unload everything at a.
            let mut decision = RawDecision::new();
            let mut pickup = RawVisit::at("depot");
            let mut drop = RawVisit::at("a");
            for name in &names {
                decision = decision.accept(name);
                pickup = pickup.pickup(name);
                drop = drop.deliver(name);
            }
            let decision = decision.route("v1", vec![pickup, drop]);

            let mut sim = SimBuilder::new(on_request(), world(vehicle), scripted(vec![decision]))
                .orders(orders)
                .build()
                .unwrap();
            let mut watch = LoadWatch::default();
            let result = sim.run(&mut watch);

            prop_assert!(watch.max_load <= capacity, "carried {} > {}", watch.max_load, capacity);
            if total <= capacity {
                prop_assert!(result.is_ok(), "{:?}", result);
                prop_assert_eq!(watch.pickups, names.len());
                prop_assert_eq!(watch.max_load, total);
            } else {
                prop_assert!(matches!(result, Err(DvrpError::Routing(RoutingError::CapacityExceeded { .. }))), "{:?}", result);
                prop_assert_eq!(watch.pickups, 0);
                prop_assert!(sim.registry().vehicle(V1).next_visits.is_empty());
            }
        }
    }

    /// Highest load of "v1" seen right after a pickup.
    #[derive(Default)]
    struct LoadWatch {
        max_load: f64,
        pickups:  usize,
    }

    impl SimObserver for LoadWatch {
        fn on_order_event(&mut self, _now: Tick, _order: OrderId, event: &OrderEvent, registry: &Registry) {
            if matches!(event, OrderEvent::PickedUp { .. }) {
                self.pickups += 1;
                let load = registry.vehicle(V1).carried_quantity(registry.order_slice());
                self.max_load = self.max_load.max(load);
            }
        }
    }
}
