//! Stateless validation of a resolved decision against the live registry.
//!
//! Both checks look at the *effective route* of a vehicle: the decision's
//! current visit (or the vehicle's own) followed by the decision's next
//! visits (or the vehicle's own queue).  Nothing is mutated, so a decision
//! that fails here leaves the model exactly as it was.

use std::collections::HashSet;

use dv_core::{OrderId, RoutingError, VehicleId};
use dv_elements::{Order, Registry, Vehicle, Visit};

use crate::{Decision, VehicleDecision};

/// Slack for floating-point load sums in the capacity check.
pub const CAPACITY_TOLERANCE: f64 = 1e-4;

/// Run [`check_feasibility`] then [`check_capacity`].
pub fn check_decision(decision: &Decision, registry: &Registry) -> Result<(), RoutingError> {
    check_feasibility(decision, registry)?;
    check_capacity(decision, registry)
}

/// Current visit followed by next visits, with the decision's overrides.
fn effective_route<'a>(vehicle: &'a Vehicle, decision: Option<&'a VehicleDecision>) -> Vec<&'a Visit> {
    let current = decision
        .and_then(|d| d.current_visit.as_ref())
        .or(vehicle.current_visit.as_ref());
    let mut route: Vec<&Visit> = current.into_iter().collect();
    match decision.and_then(|d| d.next_visits.as_ref()) {
        Some(next) => route.extend(next.iter()),
        None => route.extend(vehicle.next_visits.iter()),
    }
    route
}

// ── Feasibility ───────────────────────────────────────────────────────────────

/// State constraints a decision may not break:
///
/// - the current visit of an en-route vehicle does not exist and cannot be set;
/// - a current visit whose service has started cannot be altered;
/// - a current visit stays at its location;
/// - an en-route vehicle keeps heading where it is heading;
/// - an order not yet picked up is in at most one pickup list.
pub fn check_feasibility(decision: &Decision, registry: &Registry) -> Result<(), RoutingError> {
    for (&id, vehicle_decision) in &decision.vehicles {
        let vehicle = registry.vehicle(id);

        if let Some(proposed) = &vehicle_decision.current_visit {
            let current = vehicle
                .current_visit
                .as_ref()
                .ok_or(RoutingError::CurrentVisitOfEnRoute(id))?;
            if current.is_service_started() {
                return Err(RoutingError::ServiceStarted(id));
            }
            if current.location != proposed.location {
                return Err(RoutingError::CurrentVisitRelocated {
                    vehicle:  id,
                    current:  current.location,
                    proposed: proposed.location,
                });
            }
        }

        if vehicle.is_en_route() {
            if let Some(next) = &vehicle_decision.next_visits {
                let head = next.first().ok_or(RoutingError::MissingNextVisit(id))?;
                if let Some(committed) = vehicle.next_location() {
                    if head.location != committed {
                        return Err(RoutingError::EnRouteDiversion {
                            vehicle:  id,
                            committed,
                            proposed: head.location,
                        });
                    }
                }
            }
        }
    }

    check_unique_pickups(decision, registry)
}

fn check_unique_pickups(decision: &Decision, registry: &Registry) -> Result<(), RoutingError> {
    let mut scheduled: HashSet<OrderId> = HashSet::new();
    for (id, vehicle) in registry.vehicles() {
        for visit in effective_route(vehicle, decision.vehicles.get(&id)) {
            for &order in &visit.pickup_list {
                if registry.order(order).is_picked_up() {
                    continue;
                }
                if !scheduled.insert(order) {
                    return Err(RoutingError::DuplicatePickup(order));
                }
            }
        }
    }
    Ok(())
}

// ── Capacity ──────────────────────────────────────────────────────────────────

/// Walk the effective route of every capacitated vehicle named in the
/// decision and fail at the first visit where the load exceeds capacity.
///
/// The walk starts from the carried load.  If the service of the first
/// visit has not started, its whole manifest is applied; if it is under
/// service, only the orders still to be delivered or picked up are.
pub fn check_capacity(decision: &Decision, registry: &Registry) -> Result<(), RoutingError> {
    let orders = registry.order_slice();
    for (&id, vehicle_decision) in &decision.vehicles {
        let vehicle = registry.vehicle(id);
        let Some(capacity) = vehicle.capacity else {
            continue;
        };
        let route = effective_route(vehicle, Some(vehicle_decision));
        let mut load = vehicle.carried_quantity(orders);

        let Some((first, rest)) = route.split_first() else {
            continue;
        };
        if !first.is_service_started() {
            load += load_delta(first, orders, |_| true, |_| true);
        } else if !first.is_service_finished() {
            load += load_delta(first, orders, |o| !o.is_delivered(), |o| !o.is_picked_up());
        }
        check_load(id, first, capacity, load)?;

        for visit in rest {
            load += load_delta(visit, orders, |_| true, |_| true);
            check_load(id, visit, capacity, load)?;
        }
    }
    Ok(())
}

/// Picked-up minus delivered quantity of the orders passing the filters.
fn load_delta(
    visit:   &Visit,
    orders:  &[Order],
    deliver: impl Fn(&Order) -> bool,
    pickup:  impl Fn(&Order) -> bool,
) -> f64 {
    let delivered: f64 = visit
        .delivery_list
        .iter()
        .map(|o| &orders[o.index()])
        .filter(|o| deliver(o))
        .map(|o| o.quantity)
        .sum();
    let picked: f64 = visit
        .pickup_list
        .iter()
        .map(|o| &orders[o.index()])
        .filter(|o| pickup(o))
        .map(|o| o.quantity)
        .sum();
    picked - delivered
}

fn check_load(vehicle: VehicleId, visit: &Visit, capacity: f64, load: f64) -> Result<(), RoutingError> {
    if capacity + CAPACITY_TOLERANCE <= load {
        return Err(RoutingError::CapacityExceeded { vehicle, location: visit.location, capacity, load });
    }
    Ok(())
}
