//! The vehicle procedure as an explicit state machine.
//!
//! A vehicle cycles through four suspendable phases:
//!
//! ```text
//!  ┌──────────────┐   ┌────────┐   ┌─────────────┐   ┌─────────┐
//!  │ pre-departure│──▶│ travel │──▶│ pre-service │──▶│ service │──┐
//!  └──────────────┘   └────────┘   └─────────────┘   └─────────┘  │
//!         ▲                                                       │
//!         └───────────────────── next visit ──────────────────────┘
//! ```
//!
//! Each phase that actually waits stores its timer key in [`VehiclePhase`],
//! so an interruption can cancel it.  Steps that take no time run
//! synchronously inside [`Sim::drive`](crate::Sim).

use dv_core::{DvrpResult, LocationId, OrderId, SimulationError, Tick, VehicleId};
use dv_elements::{Admission, Phase};
use dv_queue::{EventKey, Priority};
use dv_routing::RoutingAlgorithm;

use crate::sim::SimEvent;
use crate::{OrderEvent, Sim, SimHooks, SimObserver, VehicleEvent};

// ── Phases ────────────────────────────────────────────────────────────────────

/// State of a vehicle's slot at a capacitated location.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Slot {
    /// The location has no resource.
    NotNeeded,
    /// Waiting in the resource's FIFO queue.
    Queued,
    /// Admitted; the grant is delivered by the pending event.
    Granting(EventKey),
    Held,
}

impl Slot {
    #[inline]
    fn is_ready(self) -> bool {
        matches!(self, Slot::NotNeeded | Slot::Held)
    }
}

/// Where a vehicle's procedure is suspended.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum VehiclePhase {
    /// No procedure is running: the route is exhausted or was interrupted.
    #[default]
    Inactive,
    /// Waiting for the next visit's earliest start time.
    PreDeparture { timer: EventKey },
    Travel { timer: EventKey },
    /// Waiting for a slot and/or the earliest service start of the visit.
    PreService { slot: Slot, timer: Option<EventKey> },
    /// Serving delivery/pickup number `item` of the current visit.
    Service { item: usize, timer: EventKey },
}

/// Entry points of the synchronous driver.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Step {
    PreDeparture,
    Depart,
    Arrive,
    PreService,
    ServiceStart,
    /// Deliveries come first, then pickups.
    Service(usize),
    Finish,
}

#[derive(Copy, Clone, Debug)]
enum Task {
    Deliver(OrderId),
    Pickup(OrderId),
}

// ── Driver ────────────────────────────────────────────────────────────────────

impl<A: RoutingAlgorithm, H: SimHooks> Sim<A, H> {
    /// Advance vehicle `v` from `step` until it has to wait or runs out of
    /// visits.  Every exit path records the new phase.
    pub(crate) fn drive<O: SimObserver>(&mut self, v: VehicleId, mut step: Step, observer: &mut O) -> DvrpResult<()> {
        let now = self.clock.now;
        loop {
            step = match step {
                Step::PreDeparture => {
                    let Some(next) = self.registry.vehicle(v).next_visits.front() else {
                        self.phases[v.index()] = VehiclePhase::Inactive;
                        return Ok(());
                    };
                    let earliest = next.earliest_start_time;
                    match earliest {
                        Some(until) if until > now => {
                            let timer = self.queue.schedule(until, Priority::Medium, SimEvent::DepartureDue(v));
                            self.phases[v.index()] = VehiclePhase::PreDeparture { timer };
                            self.notify_vehicle(v, VehicleEvent::DeparturePostponed { until }, observer);
                            return Ok(());
                        }
                        _ => Step::Depart,
                    }
                }
                Step::Depart => {
                    let vehicle = self.registry.vehicle_mut(v);
                    let from = vehicle.current_location().ok_or(SimulationError::MissingCurrentVisit(v))?;
                    let to = vehicle.next_location().ok_or(SimulationError::MissingNextVisit(v))?;
                    vehicle.depart(v, now)?;
                    let physical = from != to;
                    self.notify_vehicle(v, VehicleEvent::Departed { from, to, physical }, observer);
                    if !physical {
                        Step::Arrive
                    } else {
                        let duration = self.travel_time(v, from, to);
                        let timer = self.queue.schedule_after(now, duration, Priority::Medium, SimEvent::ArrivalDue(v));
                        self.phases[v.index()] = VehiclePhase::Travel { timer };
                        return Ok(());
                    }
                }
                Step::Arrive => {
                    let vehicle = self.registry.vehicle_mut(v);
                    vehicle.arrive(v, now)?;
                    let at = vehicle.current_location().ok_or(SimulationError::MissingCurrentVisit(v))?;
                    self.notify_vehicle(v, VehicleEvent::Arrived { at }, observer);
                    Step::PreService
                }
                Step::PreService => {
                    let (slot, timer) = self.enter_pre_service(v, observer)?;
                    if slot.is_ready() && timer.is_none() {
                        Step::ServiceStart
                    } else {
                        self.phases[v.index()] = VehiclePhase::PreService { slot, timer };
                        return Ok(());
                    }
                }
                Step::ServiceStart => {
                    let vehicle = self.registry.vehicle_mut(v);
                    vehicle.begin_service(v, now)?;
                    let pickups = vehicle.current_visit.as_ref().map(|c| c.pickup_list.clone()).unwrap_or_default();
                    for order in pickups {
                        self.registry.order_mut(order).lock();
                    }
                    self.notify_vehicle(v, VehicleEvent::ServiceStarted, observer);
                    Step::Service(0)
                }
                Step::Service(item) => match self.task(v, item)? {
                    None => Step::Finish,
                    Some(task) => {
                        let duration = self.check_task(v, task)?;
                        if duration > 0 {
                            let timer =
                                self.queue.schedule_after(now, duration, Priority::Medium, SimEvent::ServiceItemDone(v));
                            self.phases[v.index()] = VehiclePhase::Service { item, timer };
                            return Ok(());
                        }
                        self.complete_task(v, task, observer)?;
                        Step::Service(item + 1)
                    }
                },
                Step::Finish => {
                    self.release_slot(v);
                    self.registry.vehicle_mut(v).finish_service(v, now)?;
                    self.notify_vehicle(v, VehicleEvent::ServiceFinished, observer);
                    Step::PreDeparture
                }
            };
        }
    }

    fn travel_time(&self, v: VehicleId, from: LocationId, to: LocationId) -> u64 {
        let travel = &self.registry.vehicle(v).travel;
        travel.travel_time(self.registry.location(from), self.registry.location(to))
    }

    /// Request a slot if the location has a resource and arm the timer for
    /// the visit's earliest service start.
    fn enter_pre_service<O: SimObserver>(
        &mut self,
        v: VehicleId,
        observer: &mut O,
    ) -> DvrpResult<(Slot, Option<EventKey>)> {
        let now = self.clock.now;
        let at = self.registry.vehicle(v).current_location().ok_or(SimulationError::MissingCurrentVisit(v))?;

        let admission = self.registry.location_mut(at).resource.as_mut().map(|r| r.request(v));
        let slot = match admission {
            None => Slot::NotNeeded,
            Some(Admission::Granted) => {
                Slot::Granting(self.queue.schedule_after(now, 0, Priority::Medium, SimEvent::SlotGranted(v)))
            }
            Some(Admission::Queued(_)) => Slot::Queued,
        };
        if slot != Slot::NotNeeded {
            let queued = slot == Slot::Queued;
            self.notify_vehicle(v, VehicleEvent::ServiceRequested { at, queued }, observer);
        }

        let earliest = self.earliest_service_start(v);
        let timer = (earliest > now)
            .then(|| self.queue.schedule(earliest, Priority::Medium, SimEvent::ServiceWindowOpen(v)));
        Ok((slot, timer))
    }

    fn earliest_service_start(&self, v: VehicleId) -> Tick {
        self.registry
            .vehicle(v)
            .current_visit
            .as_ref()
            .map_or(Tick::ZERO, |visit| visit.earliest_service_start(self.registry.order_slice()))
    }

    fn task(&self, v: VehicleId, item: usize) -> Result<Option<Task>, SimulationError> {
        let visit = self.registry.vehicle(v).current_visit.as_ref().ok_or(SimulationError::MissingCurrentVisit(v))?;
        let deliveries = visit.delivery_list.len();
        Ok(if item < deliveries {
            Some(Task::Deliver(visit.delivery_list[item]))
        } else {
            visit.pickup_list.get(item - deliveries).map(|&o| Task::Pickup(o))
        })
    }

    /// Preconditions of `task`.  Returns its service duration.
    fn check_task(&self, v: VehicleId, task: Task) -> Result<u64, SimulationError> {
        let vehicle = self.registry.vehicle(v);
        let at = vehicle.current_location().ok_or(SimulationError::MissingCurrentVisit(v))?;
        match task {
            Task::Deliver(id) => {
                let order = self.registry.order(id);
                if !order.is_picked_up() {
                    return Err(SimulationError::NotPickedUp(id));
                }
                if order.is_delivered() {
                    return Err(SimulationError::AlreadyDelivered(id));
                }
                if order.delivery.location != at {
                    return Err(SimulationError::WrongLocation { order: id, expected: order.delivery.location, actual: at });
                }
                Ok(order.delivery.duration)
            }
            Task::Pickup(id) => {
                let order = self.registry.order(id);
                if order.is_delivered() {
                    return Err(SimulationError::AlreadyDelivered(id));
                }
                if order.is_picked_up() {
                    return Err(SimulationError::AlreadyPickedUp(id));
                }
                if order.pickup.location != at {
                    return Err(SimulationError::WrongLocation { order: id, expected: order.pickup.location, actual: at });
                }
                vehicle.check_load(v, id, self.registry.order_slice())?;
                Ok(order.pickup.duration)
            }
        }
    }

    fn complete_task<O: SimObserver>(&mut self, v: VehicleId, task: Task, observer: &mut O) -> DvrpResult<()> {
        let now = self.clock.now;
        match task {
            Task::Deliver(id) => {
                self.registry.vehicle_mut(v).unload(v, id)?;
                self.registry.order_mut(id).deliver(id, now)?;
                self.notify_order(id, OrderEvent::Delivered { vehicle: v }, observer);
            }
            Task::Pickup(id) => {
                self.registry.order_mut(id).pickup(id, v, now)?;
                self.registry.vehicle_mut(v).load(id);
                self.notify_order(id, OrderEvent::PickedUp { vehicle: v }, observer);
            }
        }
        Ok(())
    }

    /// Give up the slot `v` holds at its current location, handing it to
    /// the next queued vehicle.
    fn release_slot(&mut self, v: VehicleId) {
        let Some(at) = self.registry.vehicle(v).current_location() else {
            return;
        };
        let granted = match self.registry.location_mut(at).resource.as_mut() {
            Some(resource) => resource.release(v),
            None => None,
        };
        if let Some(next) = granted {
            let key = self.queue.schedule_after(self.clock.now, 0, Priority::Medium, SimEvent::SlotGranted(next));
            if let VehiclePhase::PreService { slot, .. } = &mut self.phases[next.index()] {
                *slot = Slot::Granting(key);
            }
        }
    }

    /// Leave the resource queue without ever having been admitted.
    fn withdraw_request(&mut self, v: VehicleId) {
        let Some(at) = self.registry.vehicle(v).current_location() else {
            return;
        };
        if let Some(resource) = self.registry.location_mut(at).resource.as_mut() {
            resource.cancel(v);
        }
    }

    // ── Timer events ──────────────────────────────────────────────────────

    pub(crate) fn on_departure_due<O: SimObserver>(&mut self, v: VehicleId, observer: &mut O) -> DvrpResult<()> {
        if matches!(self.phases[v.index()], VehiclePhase::PreDeparture { .. }) {
            self.drive(v, Step::PreDeparture, observer)?;
        }
        Ok(())
    }

    pub(crate) fn on_arrival_due<O: SimObserver>(&mut self, v: VehicleId, observer: &mut O) -> DvrpResult<()> {
        if matches!(self.phases[v.index()], VehiclePhase::Travel { .. }) {
            self.drive(v, Step::Arrive, observer)?;
        }
        Ok(())
    }

    pub(crate) fn on_slot_granted<O: SimObserver>(&mut self, v: VehicleId, observer: &mut O) -> DvrpResult<()> {
        let VehiclePhase::PreService { slot, timer } = &mut self.phases[v.index()] else {
            return Ok(());
        };
        if !matches!(slot, Slot::Granting(_)) {
            return Ok(());
        }
        *slot = Slot::Held;
        if timer.is_none() {
            self.drive(v, Step::ServiceStart, observer)?;
        }
        Ok(())
    }

    pub(crate) fn on_service_window_open<O: SimObserver>(&mut self, v: VehicleId, observer: &mut O) -> DvrpResult<()> {
        let VehiclePhase::PreService { slot, timer } = &mut self.phases[v.index()] else {
            return Ok(());
        };
        *timer = None;
        if slot.is_ready() {
            self.drive(v, Step::ServiceStart, observer)?;
        }
        Ok(())
    }

    pub(crate) fn on_service_item_done<O: SimObserver>(&mut self, v: VehicleId, observer: &mut O) -> DvrpResult<()> {
        let VehiclePhase::Service { item, .. } = self.phases[v.index()] else {
            return Ok(());
        };
        if let Some(task) = self.task(v, item)? {
            self.complete_task(v, task, observer)?;
        }
        self.drive(v, Step::Service(item + 1), observer)
    }

    // ── Interruptions ─────────────────────────────────────────────────────

    /// Interrupt `phase` of vehicle `v`.  Does nothing unless the vehicle is
    /// suspended in exactly that phase.
    ///
    /// The timer is cancelled and any slot given back before the vehicle's
    /// [`InterruptPolicy`](dv_elements::InterruptPolicy) is consulted; a
    /// refusal aborts the run.  Only vehicles interrupted before departure
    /// are idle and resume on the next decision.
    pub fn interrupt_vehicle<O: SimObserver>(&mut self, v: VehicleId, phase: Phase, observer: &mut O) -> DvrpResult<()> {
        self.interrupt(v, phase, observer)?;
        self.drain_actions(observer)
    }

    pub(crate) fn interrupt<O: SimObserver>(&mut self, v: VehicleId, phase: Phase, observer: &mut O) -> DvrpResult<()> {
        self.check_vehicle_id(v)?;
        let event = match (phase, self.phases[v.index()]) {
            (Phase::PreDeparture, VehiclePhase::PreDeparture { timer }) => {
                self.queue.cancel(timer);
                VehicleEvent::PreDepartureInterrupted
            }
            (Phase::Travel, VehiclePhase::Travel { timer }) => {
                self.queue.cancel(timer);
                VehicleEvent::TravelInterrupted
            }
            (Phase::PreService, VehiclePhase::PreService { slot, timer }) => {
                if let Some(timer) = timer {
                    self.queue.cancel(timer);
                }
                match slot {
                    Slot::NotNeeded => {}
                    Slot::Queued => self.withdraw_request(v),
                    Slot::Granting(key) => {
                        self.queue.cancel(key);
                        self.release_slot(v);
                    }
                    Slot::Held => self.release_slot(v),
                }
                VehicleEvent::PreServiceInterrupted
            }
            (Phase::Service, VehiclePhase::Service { timer, .. }) => {
                self.queue.cancel(timer);
                self.release_slot(v);
                VehicleEvent::ServiceInterrupted
            }
            _ => return Ok(()),
        };
        self.phases[v.index()] = VehiclePhase::Inactive;

        observer.on_vehicle_event(self.clock.now, v, &event, &self.registry);
        self.registry.vehicle(v).interrupts.on_interrupt(v, phase)?;
        self.with_hooks(|hooks, ctx| hooks.on_vehicle_event(v, &event, ctx));
        Ok(())
    }
}
