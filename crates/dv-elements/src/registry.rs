//! `Registry` — owned storage for every entity of one model.
//!
//! Entities live in plain `Vec`s indexed by their typed ids; a name → id map
//! per kind resolves the external names used in snapshots and decisions.
//! Entities are never removed, so ids stay valid for the whole run.
//!
//! Indexing accessors (`location`, `vehicle`, `order`, …) panic on an id that
//! did not come from this registry, the same way a `Vec` index would.  Use
//! the `get_*` variants for ids of unknown provenance.

use dv_core::{LocationId, ModelError, OrderId, VehicleId};

use crate::{Location, Order, Vehicle};

#[cfg(feature = "fx-hash")]
type NameMap<K> = rustc_hash::FxHashMap<String, K>;
#[cfg(not(feature = "fx-hash"))]
type NameMap<K> = std::collections::HashMap<String, K>;

#[derive(Debug, Default)]
pub struct Registry {
    locations:      Vec<Location>,
    vehicles:       Vec<Vehicle>,
    orders:         Vec<Order>,
    location_names: NameMap<LocationId>,
    vehicle_names:  NameMap<VehicleId>,
    order_names:    NameMap<OrderId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Insertion ─────────────────────────────────────────────────────────

    pub fn add_location(&mut self, location: Location) -> Result<LocationId, ModelError> {
        if self.location_names.contains_key(&location.name) {
            return Err(ModelError::DuplicateLocation(location.name));
        }
        let id = LocationId(self.locations.len() as u32);
        self.location_names.insert(location.name.clone(), id);
        self.locations.push(location);
        Ok(id)
    }

    pub fn add_vehicle(&mut self, vehicle: Vehicle) -> Result<VehicleId, ModelError> {
        if self.vehicle_names.contains_key(&vehicle.name) {
            return Err(ModelError::DuplicateVehicle(vehicle.name));
        }
        self.check_location(vehicle.initial_location)?;
        let id = VehicleId(self.vehicles.len() as u32);
        self.vehicle_names.insert(vehicle.name.clone(), id);
        self.vehicles.push(vehicle);
        Ok(id)
    }

    pub fn add_order(&mut self, order: Order) -> Result<OrderId, ModelError> {
        self.check_order(&order)?;
        let id = OrderId(self.orders.len() as u32);
        self.order_names.insert(order.name.clone(), id);
        self.orders.push(order);
        Ok(id)
    }

    /// Would [`add_order`][Self::add_order] accept `order`?
    pub fn check_order(&self, order: &Order) -> Result<(), ModelError> {
        if self.order_names.contains_key(&order.name) {
            return Err(ModelError::DuplicateOrder(order.name.clone()));
        }
        self.check_order_locations(order)
    }

    /// Do the pickup and delivery locations of `order` exist?
    pub fn check_order_locations(&self, order: &Order) -> Result<(), ModelError> {
        self.check_location(order.pickup.location)?;
        self.check_location(order.delivery.location)
    }

    fn check_location(&self, id: LocationId) -> Result<(), ModelError> {
        if id.index() < self.locations.len() {
            Ok(())
        } else {
            Err(ModelError::UnknownLocation(id))
        }
    }

    // ── Lookup by id ──────────────────────────────────────────────────────

    #[inline]
    pub fn location(&self, id: LocationId) -> &Location {
        &self.locations[id.index()]
    }

    #[inline]
    pub fn location_mut(&mut self, id: LocationId) -> &mut Location {
        &mut self.locations[id.index()]
    }

    #[inline]
    pub fn vehicle(&self, id: VehicleId) -> &Vehicle {
        &self.vehicles[id.index()]
    }

    #[inline]
    pub fn vehicle_mut(&mut self, id: VehicleId) -> &mut Vehicle {
        &mut self.vehicles[id.index()]
    }

    #[inline]
    pub fn order(&self, id: OrderId) -> &Order {
        &self.orders[id.index()]
    }

    #[inline]
    pub fn order_mut(&mut self, id: OrderId) -> &mut Order {
        &mut self.orders[id.index()]
    }

    pub fn get_vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id.index())
    }

    pub fn get_order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(id.index())
    }

    /// All orders as a slice indexed by `OrderId`.
    #[inline]
    pub fn order_slice(&self) -> &[Order] {
        &self.orders
    }

    // ── Lookup by name ────────────────────────────────────────────────────

    pub fn location_id(&self, name: &str) -> Option<LocationId> {
        self.location_names.get(name).copied()
    }

    pub fn vehicle_id(&self, name: &str) -> Option<VehicleId> {
        self.vehicle_names.get(name).copied()
    }

    pub fn order_id(&self, name: &str) -> Option<OrderId> {
        self.order_names.get(name).copied()
    }

    // ── Iteration ─────────────────────────────────────────────────────────

    pub fn locations(&self) -> impl Iterator<Item = (LocationId, &Location)> {
        self.locations.iter().enumerate().map(|(i, l)| (LocationId(i as u32), l))
    }

    pub fn vehicles(&self) -> impl Iterator<Item = (VehicleId, &Vehicle)> {
        self.vehicles.iter().enumerate().map(|(i, v)| (VehicleId(i as u32), v))
    }

    pub fn orders(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.orders.iter().enumerate().map(|(i, o)| (OrderId(i as u32), o))
    }

    pub fn vehicle_ids(&self) -> impl Iterator<Item = VehicleId> + use<> {
        (0..self.vehicles.len() as u32).map(VehicleId)
    }

    pub fn order_ids(&self) -> impl Iterator<Item = OrderId> + use<> {
        (0..self.orders.len() as u32).map(OrderId)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.orders().filter(|(_, o)| o.is_open())
    }

    pub fn orders_under_delivery(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.orders().filter(|(_, o)| o.is_under_delivery())
    }

    pub fn delivered_orders(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.orders().filter(|(_, o)| o.is_delivered())
    }

    pub fn canceled_orders(&self) -> impl Iterator<Item = (OrderId, &Order)> {
        self.orders().filter(|(_, o)| o.status == crate::OrderStatus::Canceled)
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}
