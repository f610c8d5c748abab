//! Fluent builder for constructing a [`Sim`].

use std::collections::HashSet;

use dv_core::{ModelError, SimConfig};
use dv_elements::{Order, Registry};
use dv_queue::Priority;
use dv_routing::RoutingAlgorithm;

use crate::sim::SimEvent;
use crate::{DefaultHooks, Sim, SimHooks};

/// Fluent builder for [`Sim<A, H>`].
///
/// # Required inputs
///
/// - [`SimConfig`]: decision-point triggers, routing-time model, horizon, …
/// - [`Registry`] with every location and vehicle of the run
/// - `A: RoutingAlgorithm`: called once per decision epoch
///
/// # Optional inputs (have defaults)
///
/// | Method          | Default                                   |
/// |-----------------|-------------------------------------------|
/// | `.orders(v)`    | No orders; add them later with `request_order` |
/// | `.hooks(h)`     | [`DefaultHooks`]                          |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, registry, RejectAll)
///     .orders(orders)
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder<A: RoutingAlgorithm, H: SimHooks = DefaultHooks> {
    config:    SimConfig,
    registry:  Registry,
    orders:    Vec<Order>,
    algorithm: A,
    hooks:     H,
}

impl<A: RoutingAlgorithm> SimBuilder<A, DefaultHooks> {
    pub fn new(config: SimConfig, registry: Registry, algorithm: A) -> Self {
        Self { config, registry, orders: Vec::new(), algorithm, hooks: DefaultHooks }
    }
}

impl<A: RoutingAlgorithm, H: SimHooks> SimBuilder<A, H> {
    /// The orders released during the run, each at its release date.
    ///
    /// Once the last of them is released the run counts as "all orders
    /// requested", which stops the periodic trigger.
    pub fn orders(mut self, orders: Vec<Order>) -> Self {
        self.orders = orders;
        self
    }

    /// Replace the model hooks.
    pub fn hooks<H2: SimHooks>(self, hooks: H2) -> SimBuilder<A, H2> {
        SimBuilder {
            config:    self.config,
            registry:  self.registry,
            orders:    self.orders,
            algorithm: self.algorithm,
            hooks,
        }
    }

    /// Validate inputs and construct the [`Sim`].
    ///
    /// # Errors
    ///
    /// - [`ModelError::Config`] if the periodic routing step is zero.
    /// - [`ModelError::DuplicateOrder`] if two orders share a name, or an
    ///   order name is already in the registry.
    /// - [`ModelError::UnknownLocation`] if an order refers to a location
    ///   that is not in the registry.
    pub fn build(self) -> Result<Sim<A, H>, ModelError> {
        if self.config.periodic_routing_step == Some(0) {
            return Err(ModelError::Config("periodic_routing_step must be positive".into()));
        }
        let mut names = HashSet::with_capacity(self.orders.len());
        for order in &self.orders {
            self.registry.check_order(order)?;
            if !names.insert(order.name.as_str()) {
                return Err(ModelError::DuplicateOrder(order.name.clone()));
            }
        }

        let decision_point = self.config.decision_on_request;
        let periodic = self.config.periodic_routing_step;
        let mut orders = self.orders;
        // Stable: orders released at the same tick keep their input order.
        orders.sort_by_key(|o| o.release_date);

        let mut sim = Sim::from_parts(self.config, self.registry, self.algorithm, self.hooks);
        sim.source_remaining = orders.len();
        sim.all_orders_requested = orders.is_empty();
        for order in orders {
            sim.schedule_release(order, decision_point, true)?;
        }
        if let Some(step) = periodic {
            let now = sim.clock.now;
            sim.queue.schedule(now, Priority::Medium, SimEvent::PeriodicUpdate { step });
        }
        Ok(sim)
    }
}
