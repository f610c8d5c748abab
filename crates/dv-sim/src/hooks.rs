//! Model-level callbacks and the actions they may request.
//!
//! Hooks see the model read-only through a [`HookContext`] and answer with
//! a list of [`Action`]s.  The coordinator applies the actions at the end of
//! the current event, in the order they were returned.

use std::time::Duration;

use dv_core::{OrderId, Tick, VehicleId};
use dv_elements::{Order, Phase, Registry};
use dv_routing::RawDecision;

use crate::{OrderEvent, VehicleEvent};

/// A follow-up requested by a hook.
#[derive(Clone, Debug)]
pub enum Action {
    /// Impose a decision point (see [`Sim::request_for_routing`][crate::Sim::request_for_routing]).
    RequestRouting,
    InterruptPostponement(OrderId),
    InterruptAllPostponements,
    /// Interrupt `phase` of `vehicle` if the vehicle is in that phase.
    InterruptVehicle { vehicle: VehicleId, phase: Phase },
    InterruptAllPreDepartures,
    CancelOrder(OrderId),
    UpdateOrder(OrderId),
    RequestOrder { order: Box<Order>, decision_point: bool },
}

/// Read-only view of the model handed to every hook.
pub struct HookContext<'a> {
    pub now:                  Tick,
    /// Number of the latest decision epoch (0 before the first).
    pub epoch:                u64,
    pub registry:             &'a Registry,
    pub all_orders_requested: bool,
}

/// Customisation points of the model.
///
/// Every method has a default, so implementors override only what they
/// need.  The defaults reproduce the standard behaviour:
///
/// | Callback                              | Default                                      |
/// |---------------------------------------|----------------------------------------------|
/// | `on_routing_start`                    | interrupt all postponements and pre-departures |
/// | order updated / canceled / postponement expired | request routing                    |
/// | `routing_delay`                       | the configured routing-time model            |
/// | everything else                       | nothing                                      |
pub trait SimHooks {
    /// Called once, before the simulation starts.
    fn init(&mut self, _ctx: &HookContext<'_>) -> Vec<Action> {
        vec![]
    }

    /// Called after every vehicle got its starting visit.
    fn on_simulation_start(&mut self, _ctx: &HookContext<'_>) -> Vec<Action> {
        vec![]
    }

    fn on_order_event(&mut self, _order: OrderId, event: &OrderEvent, _ctx: &HookContext<'_>) -> Vec<Action> {
        match event {
            OrderEvent::Updated | OrderEvent::Canceled | OrderEvent::PostponementExpired => {
                vec![Action::RequestRouting]
            }
            _ => vec![],
        }
    }

    fn on_vehicle_event(&mut self, _vehicle: VehicleId, _event: &VehicleEvent, _ctx: &HookContext<'_>) -> Vec<Action> {
        vec![]
    }

    /// Called when a decision epoch starts, before the state is captured.
    fn on_routing_start(&mut self, _ctx: &HookContext<'_>) -> Vec<Action> {
        vec![Action::InterruptAllPostponements, Action::InterruptAllPreDepartures]
    }

    /// Called with the algorithm's decision, right before it is enforced.
    fn on_routing_finish(&mut self, _decision: &RawDecision, _ctx: &HookContext<'_>) -> Vec<Action> {
        vec![]
    }

    /// Simulated duration of an algorithm call that took `elapsed` of real
    /// time.  `configured` is what the routing-time model says.
    fn routing_delay(&mut self, _elapsed: Duration, configured: u64) -> u64 {
        configured
    }
}

/// The standard behaviour, with nothing overridden.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultHooks;

impl SimHooks for DefaultHooks {}
