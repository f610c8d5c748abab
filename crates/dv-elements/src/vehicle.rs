//! Vehicles: route bookkeeping and the status transitions of the execution
//! procedure.
//!
//! The timing of the procedure (waits, resource admission, interrupts) lives
//! in `dv-sim`.  This module only knows which transitions are legal and what
//! each one does to the visit lists and the load.

use std::collections::VecDeque;
use std::fmt;

use dv_core::{LocationId, ModelError, OrderId, SimulationError, Tick, VehicleId};

use crate::interrupt::{InterruptPolicy, StrictInterrupts};
use crate::travel::{NoTravel, TravelModel};
use crate::{Order, Visit};

/// Slack for floating-point load sums while loading.
pub const LOAD_TOLERANCE: f64 = 1e-6;

// ── Enums ─────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleStatus {
    #[default]
    Idle,
    EnRoute,
    WaitingForService,
    UnderService,
}

impl VehicleStatus {
    pub fn name(self) -> &'static str {
        match self {
            VehicleStatus::Idle              => "IDLE",
            VehicleStatus::EnRoute           => "EN_ROUTE",
            VehicleStatus::WaitingForService => "WAITING_FOR_SERVICE",
            VehicleStatus::UnderService      => "UNDER_SERVICE",
        }
    }
}

/// Which carried order may be unloaded next.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Loading {
    /// Any carried order.
    #[default]
    None,
    /// Only the oldest carried order.
    Fifo,
    /// Only the newest carried order.
    Lifo,
}

impl Loading {
    pub fn name(self) -> &'static str {
        match self {
            Loading::None => "NONE",
            Loading::Fifo => "FIFO",
            Loading::Lifo => "LIFO",
        }
    }
}

// ── Vehicle ───────────────────────────────────────────────────────────────────

pub struct Vehicle {
    pub name:             String,
    pub initial_location: LocationId,
    /// `None` means uncapacitated.
    pub capacity:         Option<f64>,
    pub loading:          Loading,
    pub status:           VehicleStatus,

    pub previous_visits:  Vec<Visit>,
    pub current_visit:    Option<Visit>,
    pub next_visits:      VecDeque<Visit>,
    /// Carried orders in loading order.
    pub carrying_orders:  Vec<OrderId>,

    pub travel:           Box<dyn TravelModel>,
    pub interrupts:       Box<dyn InterruptPolicy>,
}

impl fmt::Debug for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vehicle")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("capacity", &self.capacity)
            .field("loading", &self.loading)
            .field("current_visit", &self.current_visit)
            .field("next_visits", &self.next_visits.len())
            .field("carrying_orders", &self.carrying_orders)
            .finish()
    }
}

impl Vehicle {
    pub fn new(name: impl Into<String>, initial_location: LocationId) -> Self {
        Self {
            name: name.into(),
            initial_location,
            capacity: None,
            loading: Loading::None,
            status: VehicleStatus::Idle,
            previous_visits: Vec::new(),
            current_visit: None,
            next_visits: VecDeque::new(),
            carrying_orders: Vec::new(),
            travel: Box::new(NoTravel),
            interrupts: Box::new(StrictInterrupts),
        }
    }

    /// Capacity must be finite and non-negative.
    pub fn with_capacity(mut self, capacity: f64) -> Result<Self, ModelError> {
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(ModelError::InvalidVehicleCapacity { name: self.name, capacity });
        }
        self.capacity = Some(capacity);
        Ok(self)
    }

    pub fn with_loading(mut self, loading: Loading) -> Self {
        self.loading = loading;
        self
    }

    pub fn with_travel(mut self, travel: impl TravelModel + 'static) -> Self {
        self.travel = Box::new(travel);
        self
    }

    pub fn with_interrupts(mut self, policy: impl InterruptPolicy + 'static) -> Self {
        self.interrupts = Box::new(policy);
        self
    }

    // ── Queries ───────────────────────────────────────────────────────────

    #[inline]
    pub fn is_capacitated(&self) -> bool {
        self.capacity.is_some()
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.status == VehicleStatus::Idle
    }

    #[inline]
    pub fn is_en_route(&self) -> bool {
        self.status == VehicleStatus::EnRoute
    }

    #[inline]
    pub fn has_next_visit(&self) -> bool {
        !self.next_visits.is_empty()
    }

    pub fn previous_visit(&self) -> Option<&Visit> {
        self.previous_visits.last()
    }

    pub fn previous_location(&self) -> Option<LocationId> {
        self.previous_visit().map(|v| v.location)
    }

    pub fn current_location(&self) -> Option<LocationId> {
        self.current_visit.as_ref().map(|v| v.location)
    }

    pub fn next_location(&self) -> Option<LocationId> {
        self.next_visits.front().map(|v| v.location)
    }

    /// Total quantity on board.
    pub fn carried_quantity(&self, orders: &[Order]) -> f64 {
        self.carrying_orders.iter().map(|o| orders[o.index()].quantity).sum()
    }

    fn expect_status(&self, id: VehicleId, expected: VehicleStatus) -> Result<(), SimulationError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(SimulationError::UnexpectedVehicleStatus {
                vehicle: id,
                expected: expected.name(),
                actual: self.status.name(),
            })
        }
    }

    // ── Procedure transitions ─────────────────────────────────────────────

    /// Close the current visit and head for the next one.
    pub fn depart(&mut self, id: VehicleId, now: Tick) -> Result<(), SimulationError> {
        self.expect_status(id, VehicleStatus::Idle)?;
        if self.next_visits.is_empty() {
            return Err(SimulationError::MissingNextVisit(id));
        }
        let mut visit = self.current_visit.take().ok_or(SimulationError::MissingCurrentVisit(id))?;
        visit.departure_time = Some(now);
        self.previous_visits.push(visit);
        self.status = VehicleStatus::EnRoute;
        Ok(())
    }

    /// The next visit becomes the current one.
    pub fn arrive(&mut self, id: VehicleId, now: Tick) -> Result<(), SimulationError> {
        self.expect_status(id, VehicleStatus::EnRoute)?;
        let mut visit = self.next_visits.pop_front().ok_or(SimulationError::MissingNextVisit(id))?;
        visit.arrival_time = Some(now);
        self.current_visit = Some(visit);
        self.status = VehicleStatus::WaitingForService;
        Ok(())
    }

    pub fn begin_service(&mut self, id: VehicleId, now: Tick) -> Result<(), SimulationError> {
        self.expect_status(id, VehicleStatus::WaitingForService)?;
        let visit = self.current_visit.as_mut().ok_or(SimulationError::MissingCurrentVisit(id))?;
        visit.service_start_time = Some(now);
        self.status = VehicleStatus::UnderService;
        Ok(())
    }

    pub fn finish_service(&mut self, id: VehicleId, now: Tick) -> Result<(), SimulationError> {
        self.expect_status(id, VehicleStatus::UnderService)?;
        let visit = self.current_visit.as_mut().ok_or(SimulationError::MissingCurrentVisit(id))?;
        visit.service_finish_time = Some(now);
        self.status = VehicleStatus::Idle;
        Ok(())
    }

    /// Close the current visit at the end of the run.
    pub fn close(&mut self, id: VehicleId, now: Tick) -> Result<(), SimulationError> {
        self.expect_status(id, VehicleStatus::Idle)
            .map_err(|_| SimulationError::VehicleNotIdle { vehicle: id, status: self.status.name() })?;
        if let Some(mut visit) = self.current_visit.take() {
            visit.departure_time = Some(now);
            self.previous_visits.push(visit);
        }
        Ok(())
    }

    // ── Load handling ─────────────────────────────────────────────────────

    /// Would loading `order` exceed the capacity?
    pub fn check_load(&self, id: VehicleId, order_id: OrderId, orders: &[Order]) -> Result<(), SimulationError> {
        let Some(capacity) = self.capacity else {
            return Ok(());
        };
        let load = self.carried_quantity(orders) + orders[order_id.index()].quantity;
        if capacity + LOAD_TOLERANCE < load {
            return Err(SimulationError::CapacityViolated { vehicle: id, order: order_id, capacity, load });
        }
        Ok(())
    }

    pub fn load(&mut self, order: OrderId) {
        self.carrying_orders.push(order);
    }

    /// Remove `order` from the load, honouring the loading discipline.
    pub fn unload(&mut self, id: VehicleId, order: OrderId) -> Result<(), SimulationError> {
        let discipline = self.loading.name();
        let violated = || SimulationError::LoadingViolated { vehicle: id, order, discipline };
        match self.loading {
            Loading::Fifo => {
                if self.carrying_orders.first() != Some(&order) {
                    return Err(violated());
                }
                self.carrying_orders.remove(0);
            }
            Loading::Lifo => {
                if self.carrying_orders.last() != Some(&order) {
                    return Err(violated());
                }
                self.carrying_orders.pop();
            }
            Loading::None => {
                let pos = self
                    .carrying_orders
                    .iter()
                    .position(|&o| o == order)
                    .ok_or(SimulationError::NotCarried { vehicle: id, order })?;
                self.carrying_orders.remove(pos);
            }
        }
        Ok(())
    }
}
