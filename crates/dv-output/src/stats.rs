//! Run statistics and visit history, computed from the final registry.
//!
//! Call these after `Sim::finalize`: only visits in a vehicle's history are
//! counted, and the finalize step moves every current visit there.

use std::collections::BTreeMap;

use dv_core::{OrderId, Tick, VehicleId};
use dv_elements::{Registry, Vehicle};

use crate::{OrderStatsRow, VehicleStatsRow, VisitRow};

// ── Vehicles ──────────────────────────────────────────────────────────────────

/// Distance travelled, moving time, and total waiting, service and idle time
/// of one vehicle.
///
/// Distance and moving time are summed over consecutive history visits;
/// the vehicle's own travel model gives the distance.
pub fn vehicle_stats(registry: &Registry, id: VehicleId) -> VehicleStatsRow {
    let vehicle = registry.vehicle(id);
    let history = &vehicle.previous_visits;

    let mut distance = 0.0;
    let mut moving = 0;
    for pair in history.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        distance += vehicle.travel.travel_distance(registry.location(from.location), registry.location(to.location));
        if let (Some(departed), Some(arrived)) = (from.departure_time, to.arrival_time) {
            moving += arrived.since(departed);
        }
    }

    VehicleStatsRow {
        vehicle: vehicle.name.clone(),
        distance,
        moving,
        waiting: history.iter().filter_map(|v| v.waiting_time()).sum(),
        service: history.iter().filter_map(|v| v.service_time()).sum(),
        idle:    history.iter().filter_map(|v| v.idle_time()).sum(),
    }
}

/// [`vehicle_stats`] for every vehicle, in id order.
pub fn collect_vehicle_stats(registry: &Registry) -> Vec<VehicleStatsRow> {
    registry.vehicle_ids().map(|id| vehicle_stats(registry, id)).collect()
}

// ── Orders ────────────────────────────────────────────────────────────────────

/// Tardiness per original order, sorted by original name.
///
/// An original order is late by the latest delivery of its sub-orders past
/// their latest due date.  If any sub-order lacks a due date or was never
/// delivered the tardiness is 0.
pub fn collect_order_stats(registry: &Registry) -> Vec<OrderStatsRow> {
    let mut groups: BTreeMap<&str, Vec<OrderId>> = BTreeMap::new();
    for (id, order) in registry.orders() {
        groups.entry(order.original_name.as_str()).or_default().push(id);
    }

    groups
        .into_iter()
        .map(|(original, ids)| {
            let orders = ids.iter().map(|&id| registry.order(id));
            let due: Option<Vec<Tick>> = orders.clone().map(|o| o.due_date).collect();
            let delivered: Option<Vec<Tick>> = orders.map(|o| o.delivery_time).collect();
            let due_date = due.and_then(|d| d.into_iter().max());
            let delivery_time = delivered.and_then(|d| d.into_iter().max());
            let tardiness = match (due_date, delivery_time) {
                (Some(due), Some(delivered)) => delivered.since(due),
                _ => 0,
            };
            OrderStatsRow {
                original_name: original.to_owned(),
                suborders: ids.len(),
                due_date: due_date.map(|t| t.0),
                delivery_time: delivery_time.map(|t| t.0),
                tardiness,
            }
        })
        .collect()
}

// ── History ───────────────────────────────────────────────────────────────────

/// Every history visit of every vehicle, vehicle by vehicle.
pub fn visit_history(registry: &Registry) -> Vec<VisitRow> {
    registry
        .vehicles()
        .flat_map(|(_, vehicle)| vehicle_history(registry, vehicle))
        .collect()
}

fn vehicle_history<'a>(registry: &'a Registry, vehicle: &'a Vehicle) -> impl Iterator<Item = VisitRow> + 'a {
    let names = |ids: &[OrderId]| {
        ids.iter().map(|&id| registry.order(id).name.as_str()).collect::<Vec<_>>().join(";")
    };
    vehicle.previous_visits.iter().enumerate().map(move |(index, visit)| VisitRow {
        vehicle: vehicle.name.clone(),
        index,
        location: registry.location(visit.location).name.clone(),
        arrival_time: visit.arrival_time.map(|t| t.0),
        service_start_time: visit.service_start_time.map(|t| t.0),
        service_finish_time: visit.service_finish_time.map(|t| t.0),
        departure_time: visit.departure_time.map(|t| t.0),
        pickups: names(&visit.pickup_list),
        deliveries: names(&visit.delivery_list),
    })
}
