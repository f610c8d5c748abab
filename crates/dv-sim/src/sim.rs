//! The `Sim` struct and its event loop.

use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use dv_core::{
    DvrpResult, ModelError, OrderId, RoutingError, SimClock, SimConfig, SimulationError, Tick,
    VehicleId,
};
use dv_elements::{Order, OrderStatus, Phase, Registry, Visit};
use dv_queue::{EventKey, EventQueue, Priority};
use dv_routing::{Decision, OrderDecision, RawDecision, RoutingAlgorithm, State, check_decision};
use tracing::warn;

use crate::procedure::{Step, VehiclePhase};
use crate::{Action, DefaultHooks, HookContext, OrderEvent, SimHooks, SimObserver, VehicleEvent};

#[cfg(feature = "fx-hash")]
type TimerMap = rustc_hash::FxHashMap<OrderId, EventKey>;
#[cfg(not(feature = "fx-hash"))]
type TimerMap = std::collections::HashMap<OrderId, EventKey>;

// ── Events ────────────────────────────────────────────────────────────────────

/// Payload of the event queue.  Vehicle events carry no phase data: the
/// handler checks the vehicle's current [`VehiclePhase`] and drops stale
/// events.
pub(crate) enum SimEvent {
    ReleaseOrder { order: Box<Order>, decision_point: bool, from_source: bool },
    PeriodicUpdate { step: u64 },
    PostponementExpired(OrderId),
    RoutingStart,
    RoutingDecide(RoutingHandle),
    RoutingEnforce { handle: RoutingHandle, decision: Box<RawDecision> },
    DepartureDue(VehicleId),
    ArrivalDue(VehicleId),
    ServiceWindowOpen(VehicleId),
    SlotGranted(VehicleId),
    ServiceItemDone(VehicleId),
}

// ── Routing epochs ────────────────────────────────────────────────────────────

/// Ticket for a requested decision epoch.  All requests made before the
/// epoch starts share one handle.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RoutingHandle(u64);

#[derive(Debug, Default)]
struct RoutingState {
    /// Number of the latest started epoch.
    epoch:       u64,
    issued:      u64,
    pending:     Option<RoutingHandle>,
    in_progress: bool,
    /// Highest handle whose decision has been enforced.
    resolved:    u64,
}

// ── Sim ───────────────────────────────────────────────────────────────────────

/// The simulation coordinator.
///
/// `Sim<A, H>` owns the model and drives it event by event:
///
/// 1. **Order releases** put new orders into the registry and may impose a
///    decision point.
/// 2. **Decision epochs** run in three steps: start (hooks, usually
///    interrupting waiting vehicles and postponements), decide (capture a
///    [`State`] and call the algorithm `A`), enforce (after the routing
///    delay, validate and apply the decision).
/// 3. **Vehicle procedures** advance each vehicle through pre-departure,
///    travel, pre-service and service, driven by their own timers.
///
/// Zero-length steps run synchronously; only real waits go through the
/// queue.  Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim<A: RoutingAlgorithm, H: SimHooks = DefaultHooks> {
    pub config:    SimConfig,
    pub(crate) clock: SimClock,
    /// Called once per decision epoch.
    pub algorithm: A,
    pub hooks:     H,

    pub(crate) registry:             Registry,
    pub(crate) queue:                EventQueue<SimEvent>,
    pub(crate) phases:               Vec<VehiclePhase>,
    pub(crate) postponements:        TimerMap,
    routing:                         RoutingState,
    /// Names of scheduled but not yet released orders.
    pub(crate) pending_names:        HashSet<String>,
    pub(crate) source_remaining:     usize,
    pub(crate) all_orders_requested: bool,
    actions:                         VecDeque<Action>,
    started:                         bool,
    finished:                        bool,
}

impl<A: RoutingAlgorithm, H: SimHooks> Sim<A, H> {
    pub(crate) fn from_parts(config: SimConfig, registry: Registry, algorithm: A, hooks: H) -> Self {
        let clock = config.make_clock();
        let phases = vec![VehiclePhase::Inactive; registry.vehicle_count()];
        Self {
            config,
            clock,
            algorithm,
            hooks,
            registry,
            queue: EventQueue::new(),
            phases,
            postponements: TimerMap::default(),
            routing: RoutingState::default(),
            pending_names: HashSet::new(),
            source_remaining: 0,
            all_orders_requested: true,
            actions: VecDeque::new(),
            started: false,
            finished: false,
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────

    #[inline]
    pub fn now(&self) -> Tick {
        self.clock.now
    }

    /// The simulation clock; only event processing moves it.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of the latest started decision epoch (0 before the first).
    pub fn epoch(&self) -> u64 {
        self.routing.epoch
    }

    /// True between the decide and enforce steps of an epoch.
    pub fn is_routing_in_progress(&self) -> bool {
        self.routing.in_progress
    }

    /// True once the decision of the epoch behind `handle` was enforced.
    pub fn is_resolved(&self, handle: RoutingHandle) -> bool {
        handle.0 <= self.routing.resolved
    }

    /// True once every order handed to the builder has been released.
    pub fn all_orders_requested(&self) -> bool {
        self.all_orders_requested
    }

    /// Procedure phase of `vehicle`, or `None` if it is not in the registry.
    pub fn vehicle_phase(&self, vehicle: VehicleId) -> Option<VehiclePhase> {
        self.phases.get(vehicle.index()).copied()
    }

    /// True while `order` waits out a postponement.
    pub fn is_postponed(&self, order: OrderId) -> bool {
        self.postponements.contains_key(&order)
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ── Run control ───────────────────────────────────────────────────────

    /// Run to the configured horizon, or until no event is left, then
    /// finalize.
    ///
    /// On failure the observer's `on_error` is called before the error is
    /// returned.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> DvrpResult<()> {
        let result = self.run_to_end(observer);
        if let Err(err) = &result {
            observer.on_error(self.clock.now, err);
        }
        result
    }

    fn run_to_end<O: SimObserver>(&mut self, observer: &mut O) -> DvrpResult<()> {
        match self.config.horizon {
            Some(horizon) => self.run_until(horizon, observer)?,
            None => {
                self.start(observer)?;
                while self.step(observer)? {}
            }
        }
        self.finalize(observer)
    }

    /// Process every event due at or before `until`, then move the clock to
    /// `until`.
    pub fn run_until<O: SimObserver>(&mut self, until: Tick, observer: &mut O) -> DvrpResult<()> {
        self.start(observer)?;
        while self.queue.next_time().is_some_and(|t| t <= until) {
            self.step(observer)?;
        }
        if self.clock.now < until {
            self.clock.advance_to(until)?;
        }
        Ok(())
    }

    /// Process the next event.  Returns `false` if the queue is empty.
    pub fn step<O: SimObserver>(&mut self, observer: &mut O) -> DvrpResult<bool> {
        self.start(observer)?;
        let Some((key, event)) = self.queue.pop_next() else {
            return Ok(false);
        };
        self.clock.advance_to(key.time)?;
        self.dispatch(event, observer)?;
        self.drain_actions(observer)?;
        Ok(true)
    }

    /// Give every vehicle its starting visit and fire the start callbacks.
    /// Idempotent; the stepping methods call it implicitly.
    pub fn start<O: SimObserver>(&mut self, observer: &mut O) -> DvrpResult<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.with_hooks(|hooks, ctx| hooks.init(ctx));

        let now = self.clock.now;
        for id in self.registry.vehicle_ids() {
            let vehicle = self.registry.vehicle_mut(id);
            vehicle.current_visit = Some(Visit::completed_at(vehicle.initial_location, now));
        }
        observer.on_simulation_start(now, &self.registry);
        self.with_hooks(|hooks, ctx| hooks.on_simulation_start(ctx));
        self.resume_idle_vehicles(observer)?;
        self.drain_actions(observer)
    }

    /// Close the run: every vehicle must be idle.  Their current visits are
    /// moved to the history and unfinished orders are reported as warnings.
    pub fn finalize<O: SimObserver>(&mut self, observer: &mut O) -> DvrpResult<()> {
        if self.finished {
            return Ok(());
        }
        let now = self.clock.now;
        if let Some((id, vehicle)) = self.registry.vehicles().find(|(_, v)| !v.is_idle()) {
            return Err(SimulationError::VehicleNotIdle { vehicle: id, status: vehicle.status.name() }.into());
        }
        for id in self.registry.vehicle_ids() {
            self.registry.vehicle_mut(id).close(id, now)?;
        }

        let mut warnings = Vec::new();
        for (_, order) in self.registry.orders() {
            match order.status {
                OrderStatus::NoDecision => {
                    warnings.push(format!("order {} never received a decision", order.name));
                }
                OrderStatus::Accepted if !order.is_delivered() => {
                    warnings.push(format!("order {} was accepted but not delivered", order.name));
                }
                _ => {}
            }
        }
        for message in &warnings {
            self.warn(message, observer);
        }

        self.finished = true;
        observer.on_simulation_finish(now, &self.registry);
        Ok(())
    }

    fn dispatch<O: SimObserver>(&mut self, event: SimEvent, observer: &mut O) -> DvrpResult<()> {
        match event {
            SimEvent::ReleaseOrder { order, decision_point, from_source } => {
                self.release_order(*order, decision_point, from_source, observer)?;
            }
            SimEvent::PeriodicUpdate { step } => self.periodic_update(step),
            SimEvent::PostponementExpired(id) => {
                if self.postponements.remove(&id).is_some() {
                    self.notify_order(id, OrderEvent::PostponementExpired, observer);
                }
            }
            SimEvent::RoutingStart => self.routing_start(observer)?,
            SimEvent::RoutingDecide(handle) => self.routing_decide(handle)?,
            SimEvent::RoutingEnforce { handle, decision } => {
                self.routing_enforce(handle, &decision, observer)?;
            }
            SimEvent::DepartureDue(v) => self.on_departure_due(v, observer)?,
            SimEvent::ArrivalDue(v) => self.on_arrival_due(v, observer)?,
            SimEvent::ServiceWindowOpen(v) => self.on_service_window_open(v, observer)?,
            SimEvent::SlotGranted(v) => self.on_slot_granted(v, observer)?,
            SimEvent::ServiceItemDone(v) => self.on_service_item_done(v, observer)?,
        }
        Ok(())
    }

    // ── Decision epochs ───────────────────────────────────────────────────

    /// Impose a decision point at the current tick.
    ///
    /// If an epoch is already requested but not yet started, its handle is
    /// returned and no second epoch is scheduled.
    pub fn request_for_routing(&mut self) -> RoutingHandle {
        if let Some(handle) = self.routing.pending {
            return handle;
        }
        self.routing.issued += 1;
        let handle = RoutingHandle(self.routing.issued);
        self.routing.pending = Some(handle);
        self.queue.schedule_after(self.clock.now, 0, Priority::High, SimEvent::RoutingStart);
        handle
    }

    fn routing_start<O: SimObserver>(&mut self, observer: &mut O) -> DvrpResult<()> {
        let Some(handle) = self.routing.pending.take() else {
            return Ok(());
        };
        if self.routing.in_progress {
            return Err(RoutingError::AlreadyInProgress.into());
        }
        self.routing.epoch += 1;
        observer.on_routing_start(self.clock.now, self.routing.epoch);
        self.with_hooks(|hooks, ctx| hooks.on_routing_start(ctx));
        // The hook's interruptions must land before the state is captured.
        self.queue.schedule_after(self.clock.now, 0, Priority::High, SimEvent::RoutingDecide(handle));
        Ok(())
    }

    fn routing_decide(&mut self, handle: RoutingHandle) -> DvrpResult<()> {
        if self.routing.in_progress {
            return Err(RoutingError::AlreadyInProgress.into());
        }
        self.routing.in_progress = true;
        let now = self.clock.now;
        let state = State::capture(now, self.routing.epoch, &self.registry);

        let started = Instant::now();
        let decision = self.algorithm.decide(&state).map_err(RoutingError::Algorithm)?;
        let elapsed = started.elapsed();

        let configured = self.config.routing_time.delay(elapsed);
        let delay = self.hooks.routing_delay(elapsed, configured);
        self.queue.schedule_after(
            now,
            delay,
            Priority::Low,
            SimEvent::RoutingEnforce { handle, decision: Box::new(decision) },
        );
        Ok(())
    }

    fn routing_enforce<O: SimObserver>(
        &mut self,
        handle: RoutingHandle,
        decision: &RawDecision,
        observer: &mut O,
    ) -> DvrpResult<()> {
        self.routing.in_progress = false;
        observer.on_routing_finish(self.clock.now, self.routing.epoch, decision);
        self.with_hooks(|hooks, ctx| hooks.on_routing_finish(decision, ctx));
        self.enforce(decision, observer)?;
        self.routing.resolved = self.routing.resolved.max(handle.0);
        Ok(())
    }

    /// Validate `decision` against the current state and apply it.
    ///
    /// Nothing is changed if the decision is malformed or infeasible.  Idle
    /// vehicles that now have a next visit are set in motion.
    pub fn enforce_decision<O: SimObserver>(&mut self, decision: &RawDecision, observer: &mut O) -> DvrpResult<()> {
        self.start(observer)?;
        self.enforce(decision, observer)?;
        self.drain_actions(observer)
    }

    fn enforce<O: SimObserver>(&mut self, raw: &RawDecision, observer: &mut O) -> DvrpResult<()> {
        let decision = Decision::resolve(raw, &self.registry)?;
        check_decision(&decision, &self.registry)?;
        self.check_order_decisions(&decision).map_err(RoutingError::Enforce)?;

        let now = self.clock.now;
        for (&id, &order_decision) in &decision.orders {
            match order_decision {
                OrderDecision::Accept => {
                    self.registry.order_mut(id).accept(id, now).map_err(RoutingError::Enforce)?;
                    self.notify_order(id, OrderEvent::Accepted, observer);
                }
                OrderDecision::Reject => {
                    self.registry.order_mut(id).reject(id, now).map_err(RoutingError::Enforce)?;
                    self.notify_order(id, OrderEvent::Rejected, observer);
                }
                OrderDecision::Postpone { until } => {
                    self.postpone(id, until, observer).map_err(RoutingError::Enforce)?;
                }
            }
        }

        for (id, vehicle_decision) in decision.vehicles {
            let vehicle = self.registry.vehicle_mut(id);
            if let (Some(proposed), Some(current)) = (vehicle_decision.current_visit, vehicle.current_visit.as_mut()) {
                current.pickup_list = proposed.pickup_list;
                current.delivery_list = proposed.delivery_list;
            }
            if let Some(next) = vehicle_decision.next_visits {
                vehicle.next_visits = next.into();
            }
        }

        self.resume_idle_vehicles(observer)
    }

    /// Every order transition of `decision` must be legal before any is
    /// applied.
    fn check_order_decisions(&self, decision: &Decision) -> Result<(), SimulationError> {
        for (&id, decision) in &decision.orders {
            let order = self.registry.order(id);
            match decision {
                OrderDecision::Accept => order.check_accept(id)?,
                OrderDecision::Reject => order.check_reject(id)?,
                OrderDecision::Postpone { .. } => {
                    if self.postponements.contains_key(&id) {
                        return Err(SimulationError::PostponementInProgress(id));
                    }
                    order.check_postpone(id)?;
                }
            }
        }
        Ok(())
    }

    fn resume_idle_vehicles<O: SimObserver>(&mut self, observer: &mut O) -> DvrpResult<()> {
        for id in self.registry.vehicle_ids() {
            let vehicle = self.registry.vehicle(id);
            let resumable = self.phases[id.index()] == VehiclePhase::Inactive
                && vehicle.is_idle()
                && vehicle.current_visit.is_some()
                && vehicle.has_next_visit();
            if resumable {
                self.drive(id, Step::PreDeparture, observer)?;
            }
        }
        Ok(())
    }

    fn periodic_update(&mut self, step: u64) {
        if self.all_orders_requested
            && (self.config.stop_periodic_after_last_request || self.registry.open_orders().next().is_none())
        {
            return;
        }
        self.request_for_routing();
        self.queue.schedule_after(self.clock.now, step, Priority::Medium, SimEvent::PeriodicUpdate { step });
    }

    // ── Orders ────────────────────────────────────────────────────────────

    /// Schedule `order` for release at its release date (or now, if that
    /// already passed).  With `decision_point` the release imposes a
    /// decision epoch.
    pub fn request_order(&mut self, order: Order, decision_point: bool) -> Result<(), ModelError> {
        self.schedule_release(order, decision_point, false)
    }

    pub(crate) fn schedule_release(
        &mut self,
        mut order: Order,
        decision_point: bool,
        from_source: bool,
    ) -> Result<(), ModelError> {
        self.registry.check_order(&order)?;
        if !self.pending_names.insert(order.name.clone()) {
            return Err(ModelError::DuplicateOrder(order.name));
        }
        order.release_date = order.release_date.max(self.clock.now);
        let at = order.release_date;
        self.queue.schedule(
            at,
            Priority::Medium,
            SimEvent::ReleaseOrder { order: Box::new(order), decision_point, from_source },
        );
        Ok(())
    }

    fn release_order<O: SimObserver>(
        &mut self,
        order: Order,
        decision_point: bool,
        from_source: bool,
        observer: &mut O,
    ) -> DvrpResult<()> {
        self.pending_names.remove(&order.name);
        let id = self.registry.add_order(order)?;
        self.notify_order(id, OrderEvent::Requested, observer);
        if decision_point {
            self.request_for_routing();
        }
        if from_source {
            self.source_remaining = self.source_remaining.saturating_sub(1);
            if self.source_remaining == 0 {
                self.all_orders_requested = true;
                observer.on_all_orders_requested(self.clock.now);
            }
        }
        Ok(())
    }

    /// Cancel an open order.  Orders already being picked up cannot be
    /// canceled.
    pub fn cancel_order<O: SimObserver>(&mut self, id: OrderId, observer: &mut O) -> DvrpResult<()> {
        self.cancel(id, observer)?;
        self.drain_actions(observer)
    }

    fn cancel<O: SimObserver>(&mut self, id: OrderId, observer: &mut O) -> DvrpResult<()> {
        self.check_order_id(id)?;
        self.registry.order_mut(id).cancel(id, self.clock.now)?;
        self.notify_order(id, OrderEvent::Canceled, observer);
        Ok(())
    }

    /// Change attributes of an order through `edit` and report the update.
    /// The order keeps its name.  An edit that points the order at an
    /// unknown location is discarded with [`ModelError::UnknownLocation`].
    pub fn update_order<O: SimObserver>(
        &mut self,
        id: OrderId,
        edit: impl FnOnce(&mut Order),
        observer: &mut O,
    ) -> DvrpResult<()> {
        self.check_order_id(id)?;
        let mut edited = self.registry.order(id).clone();
        edit(&mut edited);
        edited.name.clone_from(&self.registry.order(id).name);
        self.registry.check_order_locations(&edited)?;
        *self.registry.order_mut(id) = edited;
        self.notify_order(id, OrderEvent::Updated, observer);
        self.drain_actions(observer)
    }

    /// Cut a running postponement short.  Does nothing if `id` is not
    /// postponed.
    pub fn interrupt_postponement<O: SimObserver>(&mut self, id: OrderId, observer: &mut O) -> DvrpResult<()> {
        self.check_order_id(id)?;
        self.stop_postponement(id, observer);
        self.drain_actions(observer)
    }

    fn stop_postponement<O: SimObserver>(&mut self, id: OrderId, observer: &mut O) {
        if let Some(key) = self.postponements.remove(&id) {
            self.queue.cancel(key);
            self.notify_order(id, OrderEvent::PostponementInterrupted, observer);
        }
    }

    fn postpone<O: SimObserver>(&mut self, id: OrderId, until: Tick, observer: &mut O) -> Result<(), SimulationError> {
        if self.postponements.contains_key(&id) {
            return Err(SimulationError::PostponementInProgress(id));
        }
        let now = self.clock.now;
        if until < now {
            let message = format!(
                "postponement of order {} until {until} lies in the past; ignored",
                self.registry.order(id).name
            );
            self.warn(&message, observer);
            return Ok(());
        }
        self.registry.order_mut(id).postpone(id)?;
        let key = self.queue.schedule_at(now, until, Priority::Medium, SimEvent::PostponementExpired(id))?;
        self.postponements.insert(id, key);
        self.notify_order(id, OrderEvent::Postponed { until }, observer);
        Ok(())
    }

    // ── Hooks and notifications ───────────────────────────────────────────

    /// Call a hook with a read-only context and queue the actions it
    /// returns.
    pub(crate) fn with_hooks(&mut self, call: impl FnOnce(&mut H, &HookContext<'_>) -> Vec<Action>) {
        // Explicit field borrows so the borrow checker sees disjoint access.
        let ctx = HookContext {
            now:                  self.clock.now,
            epoch:                self.routing.epoch,
            registry:             &self.registry,
            all_orders_requested: self.all_orders_requested,
        };
        let actions = call(&mut self.hooks, &ctx);
        self.actions.extend(actions);
    }

    pub(crate) fn notify_order<O: SimObserver>(&mut self, id: OrderId, event: OrderEvent, observer: &mut O) {
        observer.on_order_event(self.clock.now, id, &event, &self.registry);
        self.with_hooks(|hooks, ctx| hooks.on_order_event(id, &event, ctx));
    }

    pub(crate) fn notify_vehicle<O: SimObserver>(&mut self, id: VehicleId, event: VehicleEvent, observer: &mut O) {
        observer.on_vehicle_event(self.clock.now, id, &event, &self.registry);
        self.with_hooks(|hooks, ctx| hooks.on_vehicle_event(id, &event, ctx));
    }

    pub(crate) fn warn<O: SimObserver>(&self, message: &str, observer: &mut O) {
        warn!(target: "dvrp", time = self.clock.now.0, "{message}");
        observer.on_warning(self.clock.now, message);
    }

    pub(crate) fn drain_actions<O: SimObserver>(&mut self, observer: &mut O) -> DvrpResult<()> {
        while let Some(action) = self.actions.pop_front() {
            self.apply(action, observer)?;
        }
        Ok(())
    }

    fn apply<O: SimObserver>(&mut self, action: Action, observer: &mut O) -> DvrpResult<()> {
        match action {
            Action::RequestRouting => {
                self.request_for_routing();
            }
            Action::InterruptPostponement(id) => {
                self.check_order_id(id)?;
                self.stop_postponement(id, observer);
            }
            Action::InterruptAllPostponements => {
                let mut ids: Vec<OrderId> = self.postponements.keys().copied().collect();
                ids.sort_unstable();
                for id in ids {
                    self.stop_postponement(id, observer);
                }
            }
            Action::InterruptVehicle { vehicle, phase } => self.interrupt(vehicle, phase, observer)?,
            Action::InterruptAllPreDepartures => {
                for id in self.registry.vehicle_ids() {
                    self.interrupt(id, Phase::PreDeparture, observer)?;
                }
            }
            Action::CancelOrder(id) => self.cancel(id, observer)?,
            Action::UpdateOrder(id) => {
                self.check_order_id(id)?;
                self.notify_order(id, OrderEvent::Updated, observer);
            }
            Action::RequestOrder { order, decision_point } => self.request_order(*order, decision_point)?,
        }
        Ok(())
    }

    pub(crate) fn check_order_id(&self, id: OrderId) -> Result<(), ModelError> {
        self.registry.get_order(id).map(|_| ()).ok_or(ModelError::UnknownOrder(id))
    }

    pub(crate) fn check_vehicle_id(&self, id: VehicleId) -> Result<(), ModelError> {
        self.registry.get_vehicle(id).map(|_| ()).ok_or(ModelError::UnknownVehicle(id))
    }
}

