//! Locations and their capacity-limited service resources.

use std::collections::{BTreeMap, VecDeque};

use dv_core::{ModelError, Point, VehicleId};

// ── Resource ──────────────────────────────────────────────────────────────────

/// Outcome of [`Resource::request`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// A slot was free and is now held by the requester.
    Granted,
    /// All slots are busy; the requester waits at this queue position (0-based).
    Queued(usize),
}

/// A pool of `capacity` identical service slots (docking bays, ramps, …)
/// with FIFO admission.
#[derive(Clone, Debug)]
pub struct Resource {
    capacity: usize,
    users:    Vec<VehicleId>,
    queue:    VecDeque<VehicleId>,
}

impl Resource {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, users: Vec::with_capacity(capacity), queue: VecDeque::new() }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Vehicles currently holding a slot.
    pub fn users(&self) -> &[VehicleId] {
        &self.users
    }

    /// Vehicles waiting for a slot, in admission order.
    pub fn queue(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.queue.iter().copied()
    }

    pub fn holds(&self, vehicle: VehicleId) -> bool {
        self.users.contains(&vehicle)
    }

    pub fn is_waiting(&self, vehicle: VehicleId) -> bool {
        self.queue.contains(&vehicle)
    }

    /// Ask for a slot.  A vehicle is granted immediately only when a slot is
    /// free and nobody is queued ahead of it.
    pub fn request(&mut self, vehicle: VehicleId) -> Admission {
        if self.users.len() < self.capacity && self.queue.is_empty() {
            self.users.push(vehicle);
            Admission::Granted
        } else {
            self.queue.push_back(vehicle);
            Admission::Queued(self.queue.len() - 1)
        }
    }

    /// Give back the slot held by `vehicle`.
    ///
    /// Returns the vehicle at the head of the queue if it was granted the
    /// freed slot.
    pub fn release(&mut self, vehicle: VehicleId) -> Option<VehicleId> {
        let pos = self.users.iter().position(|&v| v == vehicle)?;
        self.users.swap_remove(pos);
        if self.users.len() < self.capacity {
            let next = self.queue.pop_front()?;
            self.users.push(next);
            return Some(next);
        }
        None
    }

    /// Withdraw a queued request.  Returns `false` if `vehicle` was not queued.
    pub fn cancel(&mut self, vehicle: VehicleId) -> bool {
        match self.queue.iter().position(|&v| v == vehicle) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }
}

// ── Location ──────────────────────────────────────────────────────────────────

/// A named point of interest.
#[derive(Clone, Debug)]
pub struct Location {
    pub name:     String,
    pub resource: Option<Resource>,
    pub point:    Option<Point>,
    /// Free-form attributes carried through to the state snapshot.
    pub aux:      BTreeMap<String, String>,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), resource: None, point: None, aux: BTreeMap::new() }
    }

    pub fn with_point(mut self, point: Point) -> Self {
        self.point = Some(point);
        self
    }

    /// Attach a FIFO service resource with `capacity` slots.
    pub fn with_resource(mut self, capacity: usize) -> Result<Self, ModelError> {
        if capacity == 0 {
            return Err(ModelError::ZeroResourceCapacity(self.name));
        }
        self.resource = Some(Resource::new(capacity));
        Ok(self)
    }

    pub fn with_aux(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.aux.insert(key.into(), value.into());
        self
    }
}
