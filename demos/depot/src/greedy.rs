//! A greedy dispatcher: every new order goes to the vehicle with the
//! shortest remaining plan, as a depot pickup followed by its delivery.

use dv_core::BoxError;
use dv_routing::{RawDecision, RawVisit, RoutingAlgorithm, State, VisitState};
use tracing::debug;

pub struct Greedy;

fn keep(visit: &VisitState) -> RawVisit {
    RawVisit {
        location:            visit.location.clone(),
        pickup_list:         visit.pickup_list.clone(),
        delivery_list:       visit.delivery_list.clone(),
        earliest_start_time: visit.earliest_start_time,
    }
}

impl RoutingAlgorithm for Greedy {
    fn decide(&mut self, state: &State) -> Result<RawDecision, BoxError> {
        let mut plans: Vec<(&str, Vec<RawVisit>)> = state
            .vehicles
            .iter()
            .map(|(name, v)| (name.as_str(), v.next_visits.iter().map(keep).collect()))
            .collect();

        let mut decision = RawDecision::new();
        let mut touched = vec![false; plans.len()];
        for (name, order) in state.open_orders.iter().filter(|(_, o)| o.status == "NO_DECISION") {
            // First vehicle with the fewest planned visits.
            let (slot, _) = plans
                .iter()
                .enumerate()
                .min_by_key(|(i, (_, visits))| (visits.len(), *i))
                .ok_or("no vehicle to dispatch to")?;
            let (vehicle, visits) = &mut plans[slot];
            visits.push(RawVisit::at(&order.pickup_location).pickup(name));
            visits.push(RawVisit::at(&order.delivery_location).deliver(name));
            touched[slot] = true;
            debug!(target: "depot", epoch = state.epoch, order = %name, vehicle = %vehicle, "order assigned");
            decision = decision.accept(name);
        }

        for ((vehicle, visits), touched) in plans.into_iter().zip(touched) {
            if touched {
                decision = decision.route(vehicle, visits);
            }
        }
        Ok(decision)
    }
}
