//! One stop on a vehicle's route.

use dv_core::{LocationId, OrderId, Tick};

use crate::Order;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Visit {
    pub location:            LocationId,
    /// Orders to load here, in loading order.
    pub pickup_list:         Vec<OrderId>,
    /// Orders to unload here, in unloading order.
    pub delivery_list:       Vec<OrderId>,
    /// The vehicle does not leave for this visit before this time.
    pub earliest_start_time: Option<Tick>,

    pub arrival_time:        Option<Tick>,
    pub service_start_time:  Option<Tick>,
    pub service_finish_time: Option<Tick>,
    pub departure_time:      Option<Tick>,
}

impl Visit {
    pub fn new(location: LocationId) -> Self {
        Self {
            location,
            pickup_list: Vec::new(),
            delivery_list: Vec::new(),
            earliest_start_time: None,
            arrival_time: None,
            service_start_time: None,
            service_finish_time: None,
            departure_time: None,
        }
    }

    /// A visit that was arrived at and fully served at `now`.  Used as the
    /// starting point of every vehicle.
    pub fn completed_at(location: LocationId, now: Tick) -> Self {
        Self {
            arrival_time: Some(now),
            service_start_time: Some(now),
            service_finish_time: Some(now),
            ..Self::new(location)
        }
    }

    pub fn with_pickups(mut self, orders: impl IntoIterator<Item = OrderId>) -> Self {
        self.pickup_list.extend(orders);
        self
    }

    pub fn with_deliveries(mut self, orders: impl IntoIterator<Item = OrderId>) -> Self {
        self.delivery_list.extend(orders);
        self
    }

    pub fn with_earliest_start(mut self, t: Tick) -> Self {
        self.earliest_start_time = Some(t);
        self
    }

    #[inline]
    pub fn is_service_started(&self) -> bool {
        self.service_start_time.is_some()
    }

    #[inline]
    pub fn is_service_finished(&self) -> bool {
        self.service_finish_time.is_some()
    }

    /// Arrival until service start.
    pub fn waiting_time(&self) -> Option<u64> {
        Some(self.service_start_time?.since(self.arrival_time?))
    }

    /// Service start until service finish.
    pub fn service_time(&self) -> Option<u64> {
        Some(self.service_finish_time?.since(self.service_start_time?))
    }

    /// Service finish until departure.
    pub fn idle_time(&self) -> Option<u64> {
        Some(self.departure_time?.since(self.service_finish_time?))
    }

    /// The latest earliest-start among the orders served here, or tick 0.
    pub fn earliest_service_start(&self, orders: &[Order]) -> Tick {
        let pickups = self
            .pickup_list
            .iter()
            .filter_map(|o| orders[o.index()].pickup.earliest);
        let deliveries = self
            .delivery_list
            .iter()
            .filter_map(|o| orders[o.index()].delivery.earliest);
        pickups.chain(deliveries).max().unwrap_or(Tick::ZERO)
    }
}
