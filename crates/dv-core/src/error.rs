//! Error taxonomy shared by all `dv-*` crates.
//!
//! | Enum              | Raised when                                            |
//! |-------------------|--------------------------------------------------------|
//! | `ModelError`      | building or extending the model (bad ids, duplicates)  |
//! | `SimulationError` | a state machine is driven into an illegal transition   |
//! | `RoutingError`    | a decision cannot be resolved, checked, or enforced    |
//!
//! All three convert into the umbrella [`DvrpError`], which is what the run
//! loop returns.  No error is retried: the first one aborts the run.

use thiserror::Error;

use crate::{LocationId, OrderId, Tick, VehicleId};

/// Boxed error produced by an external routing algorithm.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── ModelError ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("location with name \"{0}\" already exists")]
    DuplicateLocation(String),

    #[error("vehicle with name \"{0}\" already exists")]
    DuplicateVehicle(String),

    #[error("order with name \"{0}\" already exists")]
    DuplicateOrder(String),

    #[error("location {0} is not part of this model")]
    UnknownLocation(LocationId),

    #[error("vehicle {0} is not part of this model")]
    UnknownVehicle(VehicleId),

    #[error("order {0} is not part of this model")]
    UnknownOrder(OrderId),

    #[error("resource of location \"{0}\" must have a capacity of at least 1")]
    ZeroResourceCapacity(String),

    #[error("vehicle \"{name}\" has an invalid capacity {capacity}")]
    InvalidVehicleCapacity { name: String, capacity: f64 },

    #[error("configuration error: {0}")]
    Config(String),
}

// ── SimulationError ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("clock cannot move back from {now} to {target}")]
    ClockRewind { now: Tick, target: Tick },

    #[error("cannot schedule an event at {until}, the current time is {now}")]
    NegativeDelay { now: Tick, until: Tick },

    #[error("already rejected order {0} cannot be accepted")]
    AcceptRejected(OrderId),

    #[error("already accepted order {0} cannot be rejected")]
    RejectAccepted(OrderId),

    #[error("already accepted order {0} cannot be postponed")]
    PostponeAccepted(OrderId),

    #[error("order {order} cannot be {action} (it may have already been picked up)")]
    OrderLocked { order: OrderId, action: &'static str },

    #[error("order {order} is {status} and cannot be {action}")]
    OrderClosed { order: OrderId, status: &'static str, action: &'static str },

    #[error("could not postpone order {0} due to an ongoing postponement")]
    PostponementInProgress(OrderId),

    #[error("order {0} is already picked up")]
    AlreadyPickedUp(OrderId),

    #[error("order {0} is already delivered")]
    AlreadyDelivered(OrderId),

    #[error("order {0} to deliver is not picked up yet")]
    NotPickedUp(OrderId),

    #[error("order {order} must be served at {expected}, vehicle is at {actual}")]
    WrongLocation { order: OrderId, expected: LocationId, actual: LocationId },

    #[error("capacity {capacity} of vehicle {vehicle} is violated when loading order {order} (load {load})")]
    CapacityViolated { vehicle: VehicleId, order: OrderId, capacity: f64, load: f64 },

    #[error("{discipline} loading rule of vehicle {vehicle} is violated by delivering order {order}")]
    LoadingViolated { vehicle: VehicleId, order: OrderId, discipline: &'static str },

    #[error("vehicle {vehicle} does not carry order {order}")]
    NotCarried { vehicle: VehicleId, order: OrderId },

    #[error("vehicle {vehicle} is {actual}, expected {expected}")]
    UnexpectedVehicleStatus { vehicle: VehicleId, expected: &'static str, actual: &'static str },

    #[error("vehicle {0} has no current visit")]
    MissingCurrentVisit(VehicleId),

    #[error("vehicle {0} has no next visit")]
    MissingNextVisit(VehicleId),

    #[error("interrupting {phase} of vehicle {vehicle} is not allowed")]
    InterruptionNotAllowed { vehicle: VehicleId, phase: &'static str },

    #[error("could not finalize simulation, vehicle {vehicle} is {status} instead of IDLE")]
    VehicleNotIdle { vehicle: VehicleId, status: &'static str },
}

// ── RoutingError ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing algorithm failed: {0}")]
    Algorithm(#[source] BoxError),

    #[error("malformed decision: {0}")]
    Malformed(String),

    #[error("unknown vehicle \"{0}\"")]
    UnknownVehicle(String),

    #[error("unknown order \"{0}\"")]
    UnknownOrder(String),

    #[error("unknown location \"{0}\"")]
    UnknownLocation(String),

    #[error("could not process status of order \"{order}\": {status}")]
    UnknownStatus { order: String, status: String },

    #[error("unexpected decision on order \"{order}\": {status}")]
    UnexpectedStatus { order: String, status: String },

    #[error("no postponement time is given for order \"{0}\"")]
    MissingPostponementTime(String),

    #[error("order \"{order}\" cannot be served at location \"{location}\"")]
    OrderAtWrongLocation { order: String, location: String },

    #[error("current visit of vehicle {0} cannot be modified since it is en route")]
    CurrentVisitOfEnRoute(VehicleId),

    #[error("current visit of vehicle {0} cannot be modified since the service has already started")]
    ServiceStarted(VehicleId),

    #[error("current visit of vehicle {vehicle} is at {current}, decision moves it to {proposed}")]
    CurrentVisitRelocated { vehicle: VehicleId, current: LocationId, proposed: LocationId },

    #[error("next visit of en route vehicle {0} is missing")]
    MissingNextVisit(VehicleId),

    #[error("en route diversion: vehicle {vehicle} is heading to {committed}, decision sends it to {proposed}")]
    EnRouteDiversion { vehicle: VehicleId, committed: LocationId, proposed: LocationId },

    #[error("order {0} is scheduled for pickup more than once")]
    DuplicatePickup(OrderId),

    #[error("capacity of vehicle {vehicle} is violated at location {location}: {capacity} < {load}")]
    CapacityExceeded { vehicle: VehicleId, location: LocationId, capacity: f64, load: f64 },

    #[error("routing is already in progress")]
    AlreadyInProgress,

    #[error("could not enforce decision: {0}")]
    Enforce(#[from] SimulationError),
}

// ── DvrpError ─────────────────────────────────────────────────────────────────

/// The umbrella error surfaced by the run loop.
#[derive(Debug, Error)]
pub enum DvrpError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Shorthand result type for all `dv-*` crates.
pub type DvrpResult<T> = Result<T, DvrpError>;
