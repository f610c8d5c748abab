//! The `RoutingAlgorithm` trait — the decision-making extension point.

use dv_core::BoxError;
use tracing::warn;

use crate::{RawDecision, State};

/// Maps a state snapshot to a raw decision.
///
/// The coordinator calls [`decide`][Self::decide] once per decision epoch.
/// An `Err` aborts the run with `RoutingError::Algorithm`.
///
/// Any `FnMut(&State) -> Result<RawDecision, BoxError>` is an algorithm:
///
/// ```rust,ignore
/// let accept_all = |state: &State| {
///     let mut d = RawDecision::new();
///     for name in state.open_orders.keys() {
///         d = d.accept(name);
///     }
///     Ok(d)
/// };
/// ```
pub trait RoutingAlgorithm {
    fn decide(&mut self, state: &State) -> Result<RawDecision, BoxError>;
}

impl<F> RoutingAlgorithm for F
where
    F: FnMut(&State) -> Result<RawDecision, BoxError>,
{
    fn decide(&mut self, state: &State) -> Result<RawDecision, BoxError> {
        self(state)
    }
}

/// Rejects every open order that is not accepted yet and never plans a
/// route.  The placeholder used when no algorithm is configured.
#[derive(Copy, Clone, Debug, Default)]
pub struct RejectAll;

impl RoutingAlgorithm for RejectAll {
    fn decide(&mut self, state: &State) -> Result<RawDecision, BoxError> {
        warn!(target: "dvrp", epoch = state.epoch, "no routing algorithm configured, rejecting all open orders");
        let decision = state
            .open_orders
            .iter()
            .filter(|(_, o)| o.status != "ACCEPTED" && o.pickup_time.is_none())
            .fold(RawDecision::new(), |d, (name, _)| d.reject(name));
        Ok(decision)
    }
}
