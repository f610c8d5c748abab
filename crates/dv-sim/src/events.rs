//! Lifecycle notifications emitted by the coordinator.
//!
//! Every state change of an order or vehicle is reported once to the
//! [`SimObserver`][crate::SimObserver] and then to the
//! [`SimHooks`][crate::SimHooks].  These are observations only: the state
//! change has already happened when they are delivered.

use dv_core::{LocationId, Tick, VehicleId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderEvent {
    /// Released into the registry.
    Requested,
    Accepted,
    Rejected,
    Canceled,
    Updated,
    Postponed { until: Tick },
    /// The postponement wait was cut short, usually by a new decision epoch.
    PostponementInterrupted,
    PostponementExpired,
    PickedUp { vehicle: VehicleId },
    Delivered { vehicle: VehicleId },
}

impl OrderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OrderEvent::Requested               => "requested",
            OrderEvent::Accepted                => "accepted",
            OrderEvent::Rejected                => "rejected",
            OrderEvent::Canceled                => "canceled",
            OrderEvent::Updated                 => "updated",
            OrderEvent::Postponed { .. }        => "postponed",
            OrderEvent::PostponementInterrupted => "postponement_interrupted",
            OrderEvent::PostponementExpired     => "postponement_expired",
            OrderEvent::PickedUp { .. }         => "picked_up",
            OrderEvent::Delivered { .. }        => "delivered",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VehicleEvent {
    /// Waiting for the next visit's earliest start time.
    DeparturePostponed { until: Tick },
    PreDepartureInterrupted,
    /// `physical` is false when the next visit is at the same location.
    Departed { from: LocationId, to: LocationId, physical: bool },
    TravelInterrupted,
    Arrived { at: LocationId },
    /// A slot of the location's resource was requested.
    ServiceRequested { at: LocationId, queued: bool },
    PreServiceInterrupted,
    ServiceStarted,
    ServiceInterrupted,
    ServiceFinished,
}

impl VehicleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            VehicleEvent::DeparturePostponed { .. } => "departure_postponed",
            VehicleEvent::PreDepartureInterrupted   => "predeparture_interrupted",
            VehicleEvent::Departed { .. }           => "departed",
            VehicleEvent::TravelInterrupted         => "travel_interrupted",
            VehicleEvent::Arrived { .. }            => "arrived",
            VehicleEvent::ServiceRequested { .. }   => "service_requested",
            VehicleEvent::PreServiceInterrupted     => "preservice_interrupted",
            VehicleEvent::ServiceStarted            => "service_started",
            VehicleEvent::ServiceInterrupted        => "service_interrupted",
            VehicleEvent::ServiceFinished           => "service_finished",
        }
    }
}
