//! Routing decisions: the raw payload an algorithm returns and its resolved
//! form.
//!
//! A [`RawDecision`] speaks in external names and status strings.
//! [`Decision::resolve`] turns it into typed ids and parsed statuses against
//! a [`Registry`], failing with a [`RoutingError`] on the first name or
//! status it cannot resolve.  Entities the payload does not mention are left
//! untouched by enforcement.

use std::collections::BTreeMap;

use dv_core::{OrderId, RoutingError, Tick, VehicleId};
use dv_elements::{OrderStatus, Registry, Visit};
use serde::{Deserialize, Serialize};

// ── Raw payload ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDecision {
    pub vehicles: BTreeMap<String, RawVehicleDecision>,
    pub orders:   BTreeMap<String, RawOrderDecision>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawVehicleDecision {
    /// Replaces the manifests of the vehicle's current visit.
    pub current_visit: Option<RawVisit>,
    /// Replaces the vehicle's whole queue of next visits.
    pub next_visits:   Option<Vec<RawVisit>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawVisit {
    pub location:            String,
    #[serde(default)]
    pub pickup_list:         Vec<String>,
    #[serde(default)]
    pub delivery_list:       Vec<String>,
    #[serde(default)]
    pub earliest_start_time: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawOrderDecision {
    /// `accepted`, `rejected`, or `postponed` (any case).
    pub status:          String,
    #[serde(default)]
    pub postponed_until: Option<u64>,
}

impl RawDecision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(s: &str) -> Result<Self, RoutingError> {
        serde_json::from_str(s).map_err(|e| RoutingError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.orders.is_empty()
    }

    // ── Construction helpers ──────────────────────────────────────────────

    pub fn accept(mut self, order: impl Into<String>) -> Self {
        self.orders.insert(order.into(), RawOrderDecision::status("accepted"));
        self
    }

    pub fn reject(mut self, order: impl Into<String>) -> Self {
        self.orders.insert(order.into(), RawOrderDecision::status("rejected"));
        self
    }

    pub fn postpone(mut self, order: impl Into<String>, until: u64) -> Self {
        self.orders.insert(
            order.into(),
            RawOrderDecision { status: "postponed".to_owned(), postponed_until: Some(until) },
        );
        self
    }

    /// Replace the next visits of `vehicle`.
    pub fn route(mut self, vehicle: impl Into<String>, visits: Vec<RawVisit>) -> Self {
        self.vehicles.entry(vehicle.into()).or_default().next_visits = Some(visits);
        self
    }

    /// Replace the manifests of the current visit of `vehicle`.
    pub fn current(mut self, vehicle: impl Into<String>, visit: RawVisit) -> Self {
        self.vehicles.entry(vehicle.into()).or_default().current_visit = Some(visit);
        self
    }
}

impl RawOrderDecision {
    pub fn status(status: impl Into<String>) -> Self {
        Self { status: status.into(), postponed_until: None }
    }
}

impl RawVisit {
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location:            location.into(),
            pickup_list:         Vec::new(),
            delivery_list:       Vec::new(),
            earliest_start_time: None,
        }
    }

    pub fn pickup(mut self, order: impl Into<String>) -> Self {
        self.pickup_list.push(order.into());
        self
    }

    pub fn deliver(mut self, order: impl Into<String>) -> Self {
        self.delivery_list.push(order.into());
        self
    }

    pub fn not_before(mut self, t: u64) -> Self {
        self.earliest_start_time = Some(t);
        self
    }
}

// ── Resolved decision ─────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderDecision {
    Accept,
    Reject,
    Postpone { until: Tick },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VehicleDecision {
    pub current_visit: Option<Visit>,
    pub next_visits:   Option<Vec<Visit>>,
}

/// A decision resolved against a registry.  Maps are keyed by id, so
/// enforcement visits entities in registration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decision {
    pub vehicles: BTreeMap<VehicleId, VehicleDecision>,
    pub orders:   BTreeMap<OrderId, OrderDecision>,
}

impl Decision {
    pub fn resolve(raw: &RawDecision, registry: &Registry) -> Result<Decision, RoutingError> {
        let mut decision = Decision::default();

        for (name, raw_vehicle) in &raw.vehicles {
            let id = registry
                .vehicle_id(name)
                .ok_or_else(|| RoutingError::UnknownVehicle(name.clone()))?;
            let current_visit = raw_vehicle
                .current_visit
                .as_ref()
                .map(|v| resolve_visit(v, registry))
                .transpose()?;
            let next_visits = raw_vehicle
                .next_visits
                .as_ref()
                .map(|visits| {
                    visits
                        .iter()
                        .map(|v| resolve_visit(v, registry))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?;
            decision.vehicles.insert(id, VehicleDecision { current_visit, next_visits });
        }

        for (name, raw_order) in &raw.orders {
            let id = registry
                .order_id(name)
                .ok_or_else(|| RoutingError::UnknownOrder(name.clone()))?;
            decision.orders.insert(id, resolve_status(name, raw_order)?);
        }

        Ok(decision)
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.orders.is_empty()
    }
}

fn resolve_status(name: &str, raw: &RawOrderDecision) -> Result<OrderDecision, RoutingError> {
    match OrderStatus::parse(&raw.status) {
        Some(OrderStatus::Accepted) => Ok(OrderDecision::Accept),
        Some(OrderStatus::Rejected) => Ok(OrderDecision::Reject),
        Some(OrderStatus::Postponed) => match raw.postponed_until {
            Some(until) => Ok(OrderDecision::Postpone { until: Tick(until) }),
            None => Err(RoutingError::MissingPostponementTime(name.to_owned())),
        },
        Some(OrderStatus::NoDecision | OrderStatus::Canceled) => Err(RoutingError::UnexpectedStatus {
            order:  name.to_owned(),
            status: raw.status.clone(),
        }),
        None => Err(RoutingError::UnknownStatus { order: name.to_owned(), status: raw.status.clone() }),
    }
}

fn resolve_visit(raw: &RawVisit, registry: &Registry) -> Result<Visit, RoutingError> {
    let location = registry
        .location_id(&raw.location)
        .ok_or_else(|| RoutingError::UnknownLocation(raw.location.clone()))?;

    let resolve_orders = |names: &[String], pickup: bool| -> Result<Vec<OrderId>, RoutingError> {
        names
            .iter()
            .map(|name| {
                let id = registry
                    .order_id(name)
                    .ok_or_else(|| RoutingError::UnknownOrder(name.clone()))?;
                let order = registry.order(id);
                let stop = if pickup { &order.pickup } else { &order.delivery };
                if stop.location != location {
                    return Err(RoutingError::OrderAtWrongLocation {
                        order:    name.clone(),
                        location: raw.location.clone(),
                    });
                }
                Ok(id)
            })
            .collect()
    };

    let mut visit = Visit::new(location)
        .with_pickups(resolve_orders(&raw.pickup_list, true)?)
        .with_deliveries(resolve_orders(&raw.delivery_list, false)?);
    visit.earliest_start_time = raw.earliest_start_time.map(Tick);
    Ok(visit)
}
