//! Transportation orders and their decision lifecycle.
//!
//! ```text
//!             ┌──────────── accept ───────────► ACCEPTED
//! NO_DECISION ┼──────────── reject ───────────► REJECTED
//!             └─ postpone ─► POSTPONED ─┬─ accept / reject
//!                                       └─ postpone (after the wait ends)
//! any open, unlocked order ── cancel ──► CANCELED
//! ```
//!
//! The methods here are pure state transitions: they validate, mutate, and
//! return `Err` on an illegal move.  Timers (postponement waits) and
//! notifications are owned by the coordinator in `dv-sim`.

use std::collections::BTreeMap;

use dv_core::{LocationId, OrderId, SimulationError, Tick, VehicleId};

// ── OrderStatus ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderStatus {
    #[default]
    NoDecision,
    Postponed,
    Accepted,
    Rejected,
    Canceled,
}

impl OrderStatus {
    /// Upper-case name used in snapshots and messages.
    pub fn name(self) -> &'static str {
        match self {
            OrderStatus::NoDecision => "NO_DECISION",
            OrderStatus::Postponed  => "POSTPONED",
            OrderStatus::Accepted   => "ACCEPTED",
            OrderStatus::Rejected   => "REJECTED",
            OrderStatus::Canceled   => "CANCELED",
        }
    }

    /// Case-insensitive inverse of [`name`][Self::name].
    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s.to_ascii_uppercase().as_str() {
            "NO_DECISION" => Some(OrderStatus::NoDecision),
            "POSTPONED"   => Some(OrderStatus::Postponed),
            "ACCEPTED"    => Some(OrderStatus::Accepted),
            "REJECTED"    => Some(OrderStatus::Rejected),
            "CANCELED"    => Some(OrderStatus::Canceled),
            _ => None,
        }
    }
}

// ── Stop ──────────────────────────────────────────────────────────────────────

/// One end of an order: where, within which window, and for how long.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stop {
    pub location: LocationId,
    /// Earliest service start.
    pub earliest: Option<Tick>,
    /// Latest service start.  Informational; the engine does not enforce it.
    pub latest:   Option<Tick>,
    /// Service duration in ticks.
    pub duration: u64,
}

impl Stop {
    pub fn at(location: LocationId) -> Self {
        Self { location, earliest: None, latest: None, duration: 0 }
    }
}

// ── Order ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    pub name:          String,
    /// Name of the originating request.  Sub-orders split from one request
    /// share it.
    pub original_name: String,
    pub quantity:      f64,
    pub release_date:  Tick,
    pub due_date:      Option<Tick>,
    pub pickup:        Stop,
    pub delivery:      Stop,
    pub aux:           BTreeMap<String, String>,

    // ── Set by the simulation ─────────────────────────────────────────────
    pub status:            OrderStatus,
    pub acceptance_time:   Option<Tick>,
    pub rejection_time:    Option<Tick>,
    pub cancellation_time: Option<Tick>,
    pub pickup_time:       Option<Tick>,
    pub pickup_vehicle:    Option<VehicleId>,
    pub delivery_time:     Option<Tick>,
    /// `true` until a vehicle starts servicing the visit that picks the order
    /// up; permanently `false` afterwards.
    pub can_be_rejected_or_canceled: bool,
}

impl Order {
    pub fn new(name: impl Into<String>, pickup: LocationId, delivery: LocationId) -> Self {
        let name = name.into();
        Self {
            original_name: name.clone(),
            name,
            quantity: 0.0,
            release_date: Tick::ZERO,
            due_date: None,
            pickup: Stop::at(pickup),
            delivery: Stop::at(delivery),
            aux: BTreeMap::new(),
            status: OrderStatus::NoDecision,
            acceptance_time: None,
            rejection_time: None,
            cancellation_time: None,
            pickup_time: None,
            pickup_vehicle: None,
            delivery_time: None,
            can_be_rejected_or_canceled: true,
        }
    }

    // ── Construction helpers ──────────────────────────────────────────────

    pub fn with_original(mut self, original_name: impl Into<String>) -> Self {
        self.original_name = original_name.into();
        self
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_release(mut self, release_date: Tick) -> Self {
        self.release_date = release_date;
        self
    }

    pub fn with_due(mut self, due_date: Tick) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_pickup_window(mut self, earliest: Option<Tick>, latest: Option<Tick>) -> Self {
        self.pickup.earliest = earliest;
        self.pickup.latest = latest;
        self
    }

    pub fn with_pickup_duration(mut self, duration: u64) -> Self {
        self.pickup.duration = duration;
        self
    }

    pub fn with_delivery_window(mut self, earliest: Option<Tick>, latest: Option<Tick>) -> Self {
        self.delivery.earliest = earliest;
        self.delivery.latest = latest;
        self
    }

    pub fn with_delivery_duration(mut self, duration: u64) -> Self {
        self.delivery.duration = duration;
        self
    }

    // ── Status queries ────────────────────────────────────────────────────

    #[inline]
    pub fn is_picked_up(&self) -> bool {
        self.pickup_time.is_some()
    }

    #[inline]
    pub fn is_delivered(&self) -> bool {
        self.delivery_time.is_some()
    }

    #[inline]
    pub fn is_under_delivery(&self) -> bool {
        self.is_picked_up() && !self.is_delivered()
    }

    /// Open orders still need something from the decision maker.
    /// Postponed orders are open.
    pub fn is_open(&self) -> bool {
        !self.is_delivered()
            && !matches!(self.status, OrderStatus::Rejected | OrderStatus::Canceled)
    }

    /// Signed delivery delay against the due date.
    pub fn lateness(&self) -> Option<i64> {
        let (due, delivered) = (self.due_date?, self.delivery_time?);
        Some(delivered.0 as i64 - due.0 as i64)
    }

    /// Positive part of [`lateness`][Self::lateness].
    pub fn tardiness(&self) -> Option<u64> {
        self.lateness().map(|l| l.max(0) as u64)
    }

    // ── Transition checks (no mutation) ───────────────────────────────────

    pub fn check_accept(&self, id: OrderId) -> Result<(), SimulationError> {
        match self.status {
            OrderStatus::Rejected => Err(SimulationError::AcceptRejected(id)),
            OrderStatus::Canceled => Err(SimulationError::OrderClosed {
                order: id,
                status: self.status.name(),
                action: "accepted",
            }),
            _ => Ok(()),
        }
    }

    pub fn check_reject(&self, id: OrderId) -> Result<(), SimulationError> {
        match self.status {
            OrderStatus::Accepted => Err(SimulationError::RejectAccepted(id)),
            OrderStatus::Canceled => Err(SimulationError::OrderClosed {
                order: id,
                status: self.status.name(),
                action: "rejected",
            }),
            _ if !self.can_be_rejected_or_canceled => {
                Err(SimulationError::OrderLocked { order: id, action: "rejected" })
            }
            _ => Ok(()),
        }
    }

    pub fn check_cancel(&self, id: OrderId) -> Result<(), SimulationError> {
        if !self.can_be_rejected_or_canceled {
            return Err(SimulationError::OrderLocked { order: id, action: "canceled" });
        }
        if self.status == OrderStatus::Canceled {
            return Err(SimulationError::OrderClosed {
                order: id,
                status: self.status.name(),
                action: "canceled",
            });
        }
        Ok(())
    }

    /// Only undecided (or already postponed) open orders can be postponed.
    pub fn check_postpone(&self, id: OrderId) -> Result<(), SimulationError> {
        if self.status == OrderStatus::Accepted {
            return Err(SimulationError::PostponeAccepted(id));
        }
        if self.is_open() {
            Ok(())
        } else {
            Err(SimulationError::OrderClosed { order: id, status: self.status.name(), action: "postponed" })
        }
    }

    // ── Transitions ───────────────────────────────────────────────────────

    /// Accept the order.  Re-accepting keeps the first acceptance time.
    pub fn accept(&mut self, id: OrderId, now: Tick) -> Result<(), SimulationError> {
        self.check_accept(id)?;
        self.status = OrderStatus::Accepted;
        self.acceptance_time.get_or_insert(now);
        Ok(())
    }

    pub fn reject(&mut self, id: OrderId, now: Tick) -> Result<(), SimulationError> {
        self.check_reject(id)?;
        self.status = OrderStatus::Rejected;
        self.rejection_time = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, id: OrderId, now: Tick) -> Result<(), SimulationError> {
        self.check_cancel(id)?;
        self.status = OrderStatus::Canceled;
        self.cancellation_time = Some(now);
        Ok(())
    }

    /// Mark the order postponed.  The wait itself is scheduled by the caller.
    pub fn postpone(&mut self, id: OrderId) -> Result<(), SimulationError> {
        self.check_postpone(id)?;
        self.status = OrderStatus::Postponed;
        Ok(())
    }

    /// Permanently forbid rejection and cancellation.
    #[inline]
    pub fn lock(&mut self) {
        self.can_be_rejected_or_canceled = false;
    }

    pub fn pickup(&mut self, id: OrderId, vehicle: VehicleId, now: Tick) -> Result<(), SimulationError> {
        if self.is_delivered() {
            return Err(SimulationError::AlreadyDelivered(id));
        }
        if self.is_picked_up() {
            return Err(SimulationError::AlreadyPickedUp(id));
        }
        if matches!(self.status, OrderStatus::Rejected | OrderStatus::Canceled) {
            return Err(SimulationError::OrderClosed {
                order: id,
                status: self.status.name(),
                action: "picked up",
            });
        }
        self.pickup_time = Some(now);
        self.pickup_vehicle = Some(vehicle);
        Ok(())
    }

    pub fn deliver(&mut self, id: OrderId, now: Tick) -> Result<(), SimulationError> {
        if !self.is_picked_up() {
            return Err(SimulationError::NotPickedUp(id));
        }
        if self.is_delivered() {
            return Err(SimulationError::AlreadyDelivered(id));
        }
        self.delivery_time = Some(now);
        Ok(())
    }
}
