//! The state snapshot handed to a routing algorithm.
//!
//! Everything is keyed by external entity name and stored in `BTreeMap`s, so
//! the JSON form has sorted keys and two snapshots of the same state
//! serialize identically.  Times are raw tick counts.

use std::collections::BTreeMap;

use dv_core::{Tick, VehicleId};
use dv_elements::{Order, Registry, Vehicle, Visit};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub time:            u64,
    /// Number of the decision epoch this snapshot was taken for.
    pub epoch:           u64,
    pub vehicles:        BTreeMap<String, VehicleState>,
    /// Orders that are neither delivered, rejected, nor canceled.
    pub open_orders:     BTreeMap<String, OrderState>,
    pub canceled_orders: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub status:         String,
    pub capacity:       Option<f64>,
    pub loading:        String,
    pub loaded_orders:  Vec<String>,
    /// Only present while the vehicle is en route.
    pub previous_visit: Option<PreviousVisitState>,
    /// Absent while the vehicle is en route.
    pub current_visit:  Option<CurrentVisitState>,
    pub next_visits:    Vec<VisitState>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreviousVisitState {
    pub location:       String,
    pub departure_time: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentVisitState {
    pub location:            String,
    pub arrival_time:        Option<u64>,
    pub service_start_time:  Option<u64>,
    pub service_finish_time: Option<u64>,
    pub pickup_list:         Vec<String>,
    pub delivery_list:       Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisitState {
    pub location:               String,
    pub pickup_list:            Vec<String>,
    pub delivery_list:          Vec<String>,
    pub earliest_start_time:    Option<u64>,
    /// Latest earliest-start among the orders served at this visit.
    pub earliest_service_start: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    pub name:                    String,
    pub original_name:           String,
    pub status:                  String,
    pub quantity:                f64,
    pub release_date:            u64,
    pub due_date:                Option<u64>,
    pub pickup_location:         String,
    pub earliest_pickup_start:   Option<u64>,
    pub latest_pickup_start:     Option<u64>,
    pub pickup_duration:         u64,
    pub delivery_location:       String,
    pub earliest_delivery_start: Option<u64>,
    pub latest_delivery_start:   Option<u64>,
    pub delivery_duration:       u64,
    pub pickup_time:             Option<u64>,
    pub pickup_vehicle:          Option<String>,
    /// The vehicle carrying the order, or the vehicle that has it in the
    /// pickup list of its current or a next visit.
    pub assigned_vehicle:        Option<String>,
    pub aux:                     BTreeMap<String, String>,
}

fn ticks(t: Option<Tick>) -> Option<u64> {
    t.map(|t| t.0)
}

impl State {
    /// Snapshot the registry at `now`.
    pub fn capture(now: Tick, epoch: u64, registry: &Registry) -> State {
        let orders = registry.order_slice();
        let order_names = |ids: &[dv_core::OrderId]| -> Vec<String> {
            ids.iter().map(|&o| registry.order(o).name.clone()).collect()
        };
        let location_name = |v: &Visit| registry.location(v.location).name.clone();

        let vehicles = registry
            .vehicles()
            .map(|(_, v)| {
                let state = VehicleState {
                    status:         v.status.name().to_owned(),
                    capacity:       v.capacity,
                    loading:        v.loading.name().to_owned(),
                    loaded_orders:  order_names(&v.carrying_orders),
                    previous_visit: v
                        .previous_visit()
                        .filter(|_| v.is_en_route())
                        .map(|p| PreviousVisitState {
                            location:       location_name(p),
                            departure_time: ticks(p.departure_time),
                        }),
                    current_visit:  v.current_visit.as_ref().map(|c| CurrentVisitState {
                        location:            location_name(c),
                        arrival_time:        ticks(c.arrival_time),
                        service_start_time:  ticks(c.service_start_time),
                        service_finish_time: ticks(c.service_finish_time),
                        pickup_list:         order_names(&c.pickup_list),
                        delivery_list:       order_names(&c.delivery_list),
                    }),
                    next_visits:    v
                        .next_visits
                        .iter()
                        .map(|n| VisitState {
                            location:               location_name(n),
                            pickup_list:            order_names(&n.pickup_list),
                            delivery_list:          order_names(&n.delivery_list),
                            earliest_start_time:    ticks(n.earliest_start_time),
                            earliest_service_start: n.earliest_service_start(orders).0,
                        })
                        .collect(),
                };
                (v.name.clone(), state)
            })
            .collect();

        let open_orders = registry
            .open_orders()
            .map(|(id, o)| {
                let assigned = o.pickup_vehicle.or_else(|| scheduled_pickup_vehicle(registry, id));
                (o.name.clone(), order_state(registry, o, assigned))
            })
            .collect();

        let canceled_orders = registry.canceled_orders().map(|(_, o)| o.name.clone()).collect();

        State { time: now.0, epoch, vehicles, open_orders, canceled_orders }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// The last vehicle (in registration order) that plans to pick `order` up.
fn scheduled_pickup_vehicle(registry: &Registry, order: dv_core::OrderId) -> Option<VehicleId> {
    let plans_pickup = |v: &Vehicle| {
        v.current_visit
            .iter()
            .chain(v.next_visits.iter())
            .any(|visit| visit.pickup_list.contains(&order))
    };
    registry.vehicles().filter(|(_, v)| plans_pickup(v)).map(|(id, _)| id).last()
}

fn order_state(registry: &Registry, o: &Order, assigned: Option<VehicleId>) -> OrderState {
    let vehicle_name = |id: VehicleId| registry.vehicle(id).name.clone();
    OrderState {
        name:                    o.name.clone(),
        original_name:           o.original_name.clone(),
        status:                  o.status.name().to_owned(),
        quantity:                o.quantity,
        release_date:            o.release_date.0,
        due_date:                ticks(o.due_date),
        pickup_location:         registry.location(o.pickup.location).name.clone(),
        earliest_pickup_start:   ticks(o.pickup.earliest),
        latest_pickup_start:     ticks(o.pickup.latest),
        pickup_duration:         o.pickup.duration,
        delivery_location:       registry.location(o.delivery.location).name.clone(),
        earliest_delivery_start: ticks(o.delivery.earliest),
        latest_delivery_start:   ticks(o.delivery.latest),
        delivery_duration:       o.delivery.duration,
        pickup_time:             ticks(o.pickup_time),
        pickup_vehicle:          o.pickup_vehicle.map(vehicle_name),
        assigned_vehicle:        assigned.map(vehicle_name),
        aux:                     o.aux.clone(),
    }
}
