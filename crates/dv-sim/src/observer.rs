//! Simulation observer trait for logging and data collection.

use dv_core::{DvrpError, OrderId, Tick, VehicleId};
use dv_elements::Registry;
use dv_routing::RawDecision;
use tracing::{debug, error, info};

use crate::{OrderEvent, VehicleEvent};

/// Callbacks invoked by [`Sim`][crate::Sim] at every notification point.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Observers cannot change the model;
/// use [`SimHooks`][crate::SimHooks] for that.
///
/// # Example — delivery counter
///
/// ```rust,ignore
/// struct Deliveries(usize);
///
/// impl SimObserver for Deliveries {
///     fn on_order_event(&mut self, _: Tick, _: OrderId, event: &OrderEvent, _: &Registry) {
///         if matches!(event, OrderEvent::Delivered { .. }) {
///             self.0 += 1;
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called once, after every vehicle got its starting visit.
    fn on_simulation_start(&mut self, _now: Tick, _registry: &Registry) {}

    fn on_order_event(&mut self, _now: Tick, _order: OrderId, _event: &OrderEvent, _registry: &Registry) {}

    fn on_vehicle_event(&mut self, _now: Tick, _vehicle: VehicleId, _event: &VehicleEvent, _registry: &Registry) {}

    /// A decision epoch started.  `epoch` counts from 1.
    fn on_routing_start(&mut self, _now: Tick, _epoch: u64) {}

    /// The algorithm answered; the decision is about to be enforced.
    fn on_routing_finish(&mut self, _now: Tick, _epoch: u64, _decision: &RawDecision) {}

    /// The last order of the initial order set was released.
    fn on_all_orders_requested(&mut self, _now: Tick) {}

    /// A non-fatal anomaly (skipped postponement, undecided order at the end, …).
    fn on_warning(&mut self, _now: Tick, _message: &str) {}

    /// Called once after a successful finalize.  Every visit is in the
    /// vehicles' history at this point.
    fn on_simulation_finish(&mut self, _now: Tick, _registry: &Registry) {}

    /// The run is aborting with `error`.
    fn on_error(&mut self, _now: Tick, _error: &DvrpError) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

/// Reports every notification as a `tracing` event under the `dvrp` target.
///
/// Lifecycle milestones are `info`, per-entity events `debug`, the abort
/// error `error`.  Warnings are logged by the coordinator itself.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingObserver;

impl SimObserver for TracingObserver {
    fn on_simulation_start(&mut self, now: Tick, registry: &Registry) {
        info!(
            target: "dvrp",
            time = now.0,
            locations = registry.location_count(),
            vehicles = registry.vehicle_count(),
            "simulation started"
        );
    }

    fn on_order_event(&mut self, now: Tick, order: OrderId, event: &OrderEvent, registry: &Registry) {
        let name = &registry.order(order).name;
        match event {
            OrderEvent::Postponed { until } => {
                debug!(target: "dvrp", time = now.0, order = %name, until = until.0, "order postponed");
            }
            OrderEvent::PickedUp { vehicle } | OrderEvent::Delivered { vehicle } => {
                let vehicle = &registry.vehicle(*vehicle).name;
                debug!(target: "dvrp", time = now.0, order = %name, vehicle = %vehicle, "order {}", event.name());
            }
            _ => debug!(target: "dvrp", time = now.0, order = %name, "order {}", event.name()),
        }
    }

    fn on_vehicle_event(&mut self, now: Tick, vehicle: VehicleId, event: &VehicleEvent, registry: &Registry) {
        let name = &registry.vehicle(vehicle).name;
        match event {
            VehicleEvent::Departed { from, to, physical } => debug!(
                target: "dvrp",
                time = now.0,
                vehicle = %name,
                from = %registry.location(*from).name,
                to = %registry.location(*to).name,
                physical,
                "vehicle departed"
            ),
            VehicleEvent::Arrived { at } | VehicleEvent::ServiceRequested { at, .. } => debug!(
                target: "dvrp",
                time = now.0,
                vehicle = %name,
                location = %registry.location(*at).name,
                "vehicle {}",
                event.name()
            ),
            _ => debug!(target: "dvrp", time = now.0, vehicle = %name, "vehicle {}", event.name()),
        }
    }

    fn on_routing_start(&mut self, now: Tick, epoch: u64) {
        info!(target: "dvrp", time = now.0, epoch, "routing started");
    }

    fn on_routing_finish(&mut self, now: Tick, epoch: u64, decision: &RawDecision) {
        info!(
            target: "dvrp",
            time = now.0,
            epoch,
            vehicles = decision.vehicles.len(),
            orders = decision.orders.len(),
            "routing finished"
        );
    }

    fn on_all_orders_requested(&mut self, now: Tick) {
        info!(target: "dvrp", time = now.0, "all orders requested");
    }

    fn on_simulation_finish(&mut self, now: Tick, registry: &Registry) {
        info!(
            target: "dvrp",
            time = now.0,
            orders = registry.order_count(),
            delivered = registry.delivered_orders().count(),
            "simulation finished"
        );
    }

    fn on_error(&mut self, now: Tick, err: &DvrpError) {
        error!(target: "dvrp", time = now.0, error = %err, "simulation aborted");
    }
}
