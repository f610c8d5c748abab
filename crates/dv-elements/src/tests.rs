//! Unit tests for dv-elements.

use dv_core::{LocationId, OrderId, Tick, VehicleId};

use crate::{Location, Order, Registry, Vehicle};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Registry with locations "depot", "a", "b".
fn three_locations() -> (Registry, [LocationId; 3]) {
    let mut r = Registry::new();
    let depot = r.add_location(Location::new("depot")).unwrap();
    let a = r.add_location(Location::new("a")).unwrap();
    let b = r.add_location(Location::new("b")).unwrap();
    (r, [depot, a, b])
}

// ── Resource ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod resource_tests {
    use crate::{Admission, Location, Resource};

    use super::*;

    #[test]
    fn fifo_admission() {
        let mut res = Resource::new(1);
        assert_eq!(res.request(VehicleId(0)), Admission::Granted);
        assert_eq!(res.request(VehicleId(1)), Admission::Queued(0));
        assert_eq!(res.request(VehicleId(2)), Admission::Queued(1));

        assert_eq!(res.release(VehicleId(0)), Some(VehicleId(1)));
        assert!(res.holds(VehicleId(1)));
        assert_eq!(res.release(VehicleId(1)), Some(VehicleId(2)));
        assert_eq!(res.release(VehicleId(2)), None);
        assert!(res.users().is_empty());
    }

    #[test]
    fn cancel_withdraws_queued_request() {
        let mut res = Resource::new(1);
        res.request(VehicleId(0));
        res.request(VehicleId(1));
        res.request(VehicleId(2));
        assert!(res.cancel(VehicleId(1)));
        assert!(!res.cancel(VehicleId(1)));
        assert_eq!(res.release(VehicleId(0)), Some(VehicleId(2)));
    }

    #[test]
    fn release_of_non_holder_is_noop() {
        let mut res = Resource::new(2);
        res.request(VehicleId(0));
        assert_eq!(res.release(VehicleId(5)), None);
        assert!(res.holds(VehicleId(0)));
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(Location::new("x").with_resource(0).is_err());
        assert_eq!(Location::new("x").with_resource(2).unwrap().resource.unwrap().capacity(), 2);
    }
}

// ── Order lifecycle ───────────────────────────────────────────────────────────

#[cfg(test)]
mod order_tests {
    use dv_core::SimulationError;

    use crate::OrderStatus;

    use super::*;

    fn order() -> (Order, OrderId) {
        (Order::new("o1", LocationId(0), LocationId(1)).with_quantity(2.0), OrderId(0))
    }

    #[test]
    fn accept_then_reject_fails() {
        let (mut o, id) = order();
        o.accept(id, Tick(3)).unwrap();
        assert_eq!(o.status, OrderStatus::Accepted);
        assert_eq!(o.acceptance_time, Some(Tick(3)));
        assert!(matches!(o.reject(id, Tick(4)), Err(SimulationError::RejectAccepted(_))));
        assert_eq!(o.status, OrderStatus::Accepted);
    }

    #[test]
    fn accepted_order_cannot_be_postponed() {
        let (mut o, id) = order();
        o.accept(id, Tick(3)).unwrap();
        assert!(matches!(o.postpone(id), Err(SimulationError::PostponeAccepted(_))));
        assert_eq!(o.status, OrderStatus::Accepted);
        assert!(matches!(o.reject(id, Tick(4)), Err(SimulationError::RejectAccepted(_))));
    }

    #[test]
    fn reject_then_accept_fails() {
        let (mut o, id) = order();
        o.reject(id, Tick(1)).unwrap();
        assert!(!o.is_open());
        assert!(matches!(o.accept(id, Tick(2)), Err(SimulationError::AcceptRejected(_))));
    }

    #[test]
    fn reaccept_keeps_first_time() {
        let (mut o, id) = order();
        o.accept(id, Tick(1)).unwrap();
        o.accept(id, Tick(9)).unwrap();
        assert_eq!(o.acceptance_time, Some(Tick(1)));
    }

    #[test]
    fn postponed_stays_open_and_can_be_decided_later() {
        let (mut o, id) = order();
        o.postpone(id).unwrap();
        assert_eq!(o.status, OrderStatus::Postponed);
        assert!(o.is_open());
        o.accept(id, Tick(5)).unwrap();
        assert_eq!(o.status, OrderStatus::Accepted);
    }

    #[test]
    fn lock_blocks_reject_and_cancel() {
        let (mut o, id) = order();
        o.lock();
        assert!(matches!(o.reject(id, Tick(0)), Err(SimulationError::OrderLocked { .. })));
        assert!(matches!(o.cancel(id, Tick(0)), Err(SimulationError::OrderLocked { .. })));
        o.accept(id, Tick(0)).unwrap();
    }

    #[test]
    fn cancel_is_terminal() {
        let (mut o, id) = order();
        o.cancel(id, Tick(2)).unwrap();
        assert_eq!(o.cancellation_time, Some(Tick(2)));
        assert!(!o.is_open());
        assert!(o.accept(id, Tick(3)).is_err());
        assert!(o.pickup(id, VehicleId(0), Tick(3)).is_err());
    }

    #[test]
    fn pickup_and_deliver_sequence() {
        let (mut o, id) = order();
        assert!(matches!(o.deliver(id, Tick(0)), Err(SimulationError::NotPickedUp(_))));
        o.pickup(id, VehicleId(3), Tick(4)).unwrap();
        assert!(o.is_under_delivery());
        assert_eq!(o.pickup_vehicle, Some(VehicleId(3)));
        assert!(matches!(o.pickup(id, VehicleId(3), Tick(5)), Err(SimulationError::AlreadyPickedUp(_))));
        o.deliver(id, Tick(9)).unwrap();
        assert!(!o.is_open());
        assert!(matches!(o.deliver(id, Tick(10)), Err(SimulationError::AlreadyDelivered(_))));
    }

    #[test]
    fn tardiness_is_positive_part() {
        let (o, id) = order();
        let mut o = o.with_due(Tick(10));
        o.pickup(id, VehicleId(0), Tick(1)).unwrap();
        o.deliver(id, Tick(7)).unwrap();
        assert_eq!(o.lateness(), Some(-3));
        assert_eq!(o.tardiness(), Some(0));
    }

    #[test]
    fn status_names_parse_case_insensitively() {
        assert_eq!(OrderStatus::parse("Accepted"), Some(OrderStatus::Accepted));
        assert_eq!(OrderStatus::parse("no_decision"), Some(OrderStatus::NoDecision));
        assert_eq!(OrderStatus::parse("maybe"), None);
    }
}

// ── Vehicle transitions ───────────────────────────────────────────────────────

#[cfg(test)]
mod vehicle_tests {
    use dv_core::SimulationError;

    use crate::{Loading, VehicleStatus, Visit};

    use super::*;

    fn orders(qty: &[f64]) -> Vec<Order> {
        qty.iter()
            .enumerate()
            .map(|(i, &q)| Order::new(format!("o{i}"), LocationId(0), LocationId(1)).with_quantity(q))
            .collect()
    }

    #[test]
    fn full_procedure_moves_visits() {
        let id = VehicleId(0);
        let mut v = Vehicle::new("v", LocationId(0));
        v.current_visit = Some(Visit::completed_at(LocationId(0), Tick(0)));
        v.next_visits.push_back(Visit::new(LocationId(1)));

        v.depart(id, Tick(1)).unwrap();
        assert_eq!(v.status, VehicleStatus::EnRoute);
        assert!(v.current_visit.is_none());
        assert_eq!(v.previous_visit().unwrap().departure_time, Some(Tick(1)));

        v.arrive(id, Tick(4)).unwrap();
        assert_eq!(v.current_location(), Some(LocationId(1)));
        v.begin_service(id, Tick(5)).unwrap();
        v.finish_service(id, Tick(6)).unwrap();

        let visit = v.current_visit.as_ref().unwrap();
        assert_eq!(visit.waiting_time(), Some(1));
        assert_eq!(visit.service_time(), Some(1));
        assert!(v.is_idle());

        v.close(id, Tick(8)).unwrap();
        assert_eq!(v.previous_visits.len(), 2);
        assert_eq!(v.previous_visits[1].idle_time(), Some(2));
    }

    #[test]
    fn wrong_status_transition_fails() {
        let id = VehicleId(0);
        let mut v = Vehicle::new("v", LocationId(0));
        v.current_visit = Some(Visit::completed_at(LocationId(0), Tick(0)));
        assert!(matches!(v.arrive(id, Tick(1)), Err(SimulationError::UnexpectedVehicleStatus { .. })));
        assert!(matches!(v.depart(id, Tick(1)), Err(SimulationError::MissingNextVisit(_))));
    }

    #[test]
    fn capacity_check_uses_tolerance() {
        let id = VehicleId(0);
        let os = orders(&[0.6, 0.4, 0.1]);
        let mut v = Vehicle::new("v", LocationId(0)).with_capacity(1.0).unwrap();
        v.check_load(id, OrderId(0), &os).unwrap();
        v.load(OrderId(0));
        v.check_load(id, OrderId(1), &os).unwrap();
        v.load(OrderId(1));
        assert!(matches!(
            v.check_load(id, OrderId(2), &os),
            Err(SimulationError::CapacityViolated { .. })
        ));
    }

    #[test]
    fn fifo_and_lifo_unloading() {
        let id = VehicleId(0);
        let mut fifo = Vehicle::new("f", LocationId(0)).with_loading(Loading::Fifo);
        fifo.load(OrderId(0));
        fifo.load(OrderId(1));
        assert!(matches!(fifo.unload(id, OrderId(1)), Err(SimulationError::LoadingViolated { .. })));
        fifo.unload(id, OrderId(0)).unwrap();
        fifo.unload(id, OrderId(1)).unwrap();

        let mut lifo = Vehicle::new("l", LocationId(0)).with_loading(Loading::Lifo);
        lifo.load(OrderId(0));
        lifo.load(OrderId(1));
        assert!(lifo.unload(id, OrderId(0)).is_err());
        lifo.unload(id, OrderId(1)).unwrap();
        lifo.unload(id, OrderId(0)).unwrap();

        let mut any = Vehicle::new("n", LocationId(0));
        any.load(OrderId(0));
        any.load(OrderId(1));
        any.unload(id, OrderId(0)).unwrap();
        assert!(matches!(any.unload(id, OrderId(7)), Err(SimulationError::NotCarried { .. })));
    }

    #[test]
    fn earliest_service_start_is_max_of_windows() {
        let mut os = orders(&[1.0, 1.0]);
        os[0].pickup.earliest = Some(Tick(5));
        os[1].delivery.earliest = Some(Tick(8));
        let visit = Visit::new(LocationId(0))
            .with_pickups([OrderId(0)])
            .with_deliveries([OrderId(1)]);
        assert_eq!(visit.earliest_service_start(&os), Tick(8));
        assert_eq!(Visit::new(LocationId(0)).earliest_service_start(&os), Tick::ZERO);
    }

    #[test]
    fn invalid_capacity_rejected() {
        assert!(Vehicle::new("v", LocationId(0)).with_capacity(-1.0).is_err());
        assert!(Vehicle::new("v", LocationId(0)).with_capacity(f64::NAN).is_err());
    }
}

// ── Travel models ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod travel_tests {
    use dv_core::{Metric, Point};

    use crate::{ConstantTravel, MatrixTravel, MetricTravel, TravelModel};

    use super::*;

    #[test]
    fn metric_travel_rounds_time_up() {
        let a = Location::new("a").with_point(Point::new(0.0, 0.0));
        let b = Location::new("b").with_point(Point::new(3.0, 4.0));
        let m = MetricTravel { metric: Metric::Euclidean, speed: 2.0 };
        assert!((m.travel_distance(&a, &b) - 5.0).abs() < 1e-12);
        assert_eq!(m.travel_time(&a, &b), 3);

        let nowhere = Location::new("c");
        assert_eq!(m.travel_time(&a, &nowhere), 0);
    }

    #[test]
    fn matrix_travel_is_directed() {
        let a = Location::new("a");
        let b = Location::new("b");
        let mut m = MatrixTravel::new();
        m.insert("a", "b", 7, 70.0);
        assert_eq!(m.travel_time(&a, &b), 7);
        assert_eq!(m.travel_time(&b, &a), 0);
        m.insert_symmetric("a", "b", 4, 40.0);
        assert_eq!(m.travel_time(&b, &a), 4);
    }

    #[test]
    fn constant_travel_free_in_place() {
        let a = Location::new("a");
        let b = Location::new("b");
        let c = ConstantTravel { time: 10, distance: 2.5 };
        assert_eq!(c.travel_time(&a, &a), 0);
        assert_eq!(c.travel_time(&a, &b), 10);
    }
}

// ── Interrupt policies ────────────────────────────────────────────────────────

#[cfg(test)]
mod interrupt_tests {
    use crate::{InterruptPolicy, PermissiveInterrupts, Phase, StrictInterrupts};

    use super::*;

    #[test]
    fn strict_allows_only_predeparture() {
        let p = StrictInterrupts;
        assert!(p.on_interrupt(VehicleId(0), Phase::PreDeparture).is_ok());
        assert!(p.on_interrupt(VehicleId(0), Phase::Travel).is_err());
        assert!(p.on_interrupt(VehicleId(0), Phase::PreService).is_err());
        assert!(p.on_interrupt(VehicleId(0), Phase::Service).is_err());
        assert!(PermissiveInterrupts.on_interrupt(VehicleId(0), Phase::Service).is_ok());
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod registry_tests {
    use dv_core::ModelError;

    use super::*;

    #[test]
    fn duplicate_names_rejected() {
        let (mut r, [depot, a, _]) = three_locations();
        assert!(matches!(r.add_location(Location::new("a")), Err(ModelError::DuplicateLocation(_))));
        r.add_vehicle(Vehicle::new("v", depot)).unwrap();
        assert!(matches!(r.add_vehicle(Vehicle::new("v", depot)), Err(ModelError::DuplicateVehicle(_))));
        r.add_order(Order::new("o", depot, a)).unwrap();
        assert!(matches!(r.add_order(Order::new("o", depot, a)), Err(ModelError::DuplicateOrder(_))));
    }

    #[test]
    fn unknown_location_rejected() {
        let (mut r, [depot, ..]) = three_locations();
        assert!(matches!(
            r.add_vehicle(Vehicle::new("v", LocationId(9))),
            Err(ModelError::UnknownLocation(_))
        ));
        assert!(r.add_order(Order::new("o", depot, LocationId(9))).is_err());
    }

    #[test]
    fn name_lookup_and_filters() {
        let (mut r, [depot, a, b]) = three_locations();
        assert_eq!(r.location_id("b"), Some(b));
        let o1 = r.add_order(Order::new("o1", depot, a)).unwrap();
        let o2 = r.add_order(Order::new("o2", depot, b)).unwrap();
        assert_eq!(r.order_id("o2"), Some(o2));
        r.order_mut(o1).cancel(o1, Tick(0)).unwrap();
        let open: Vec<_> = r.open_orders().map(|(id, _)| id).collect();
        assert_eq!(open, [o2]);
        let canceled: Vec<_> = r.canceled_orders().map(|(id, _)| id).collect();
        assert_eq!(canceled, [o1]);
        assert_eq!(r.order_ids().count(), 2);
    }
}
