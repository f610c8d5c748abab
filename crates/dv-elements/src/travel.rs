//! Per-vehicle travel models.
//!
//! # Pluggability
//!
//! Each vehicle owns a `Box<dyn TravelModel>`, so a fleet can mix vehicle
//! types (trucks on a road matrix, drones on straight lines) without the
//! engine knowing.  Both callbacks must be pure functions of the two
//! locations.

use std::collections::HashMap;

use dv_core::Metric;

use crate::Location;

/// Travel time and distance between two locations.
pub trait TravelModel {
    /// Travel time in ticks.
    fn travel_time(&self, from: &Location, to: &Location) -> u64;

    /// Travel distance in the model's own unit.
    fn travel_distance(&self, from: &Location, to: &Location) -> f64;
}

// ── NoTravel ──────────────────────────────────────────────────────────────────

/// Every move is instantaneous and free.  The default.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTravel;

impl TravelModel for NoTravel {
    fn travel_time(&self, _from: &Location, _to: &Location) -> u64 {
        0
    }

    fn travel_distance(&self, _from: &Location, _to: &Location) -> f64 {
        0.0
    }
}

// ── ConstantTravel ────────────────────────────────────────────────────────────

/// The same time and distance for every pair of distinct locations.
#[derive(Copy, Clone, Debug)]
pub struct ConstantTravel {
    pub time:     u64,
    pub distance: f64,
}

impl TravelModel for ConstantTravel {
    fn travel_time(&self, from: &Location, to: &Location) -> u64 {
        if from.name == to.name { 0 } else { self.time }
    }

    fn travel_distance(&self, from: &Location, to: &Location) -> f64 {
        if from.name == to.name { 0.0 } else { self.distance }
    }
}

// ── MatrixTravel ──────────────────────────────────────────────────────────────

/// Explicit per-pair table keyed by location name.  Missing pairs cost
/// nothing.
#[derive(Clone, Debug, Default)]
pub struct MatrixTravel {
    entries: HashMap<(String, String), (u64, f64)>,
}

impl MatrixTravel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the directed entry `from → to`.
    pub fn insert(&mut self, from: &str, to: &str, time: u64, distance: f64) {
        self.entries.insert((from.to_owned(), to.to_owned()), (time, distance));
    }

    /// Set both directions at once.
    pub fn insert_symmetric(&mut self, a: &str, b: &str, time: u64, distance: f64) {
        self.insert(a, b, time, distance);
        self.insert(b, a, time, distance);
    }

    fn lookup(&self, from: &Location, to: &Location) -> (u64, f64) {
        self.entries
            .get(&(from.name.clone(), to.name.clone()))
            .copied()
            .unwrap_or((0, 0.0))
    }
}

impl TravelModel for MatrixTravel {
    fn travel_time(&self, from: &Location, to: &Location) -> u64 {
        self.lookup(from, to).0
    }

    fn travel_distance(&self, from: &Location, to: &Location) -> f64 {
        self.lookup(from, to).1
    }
}

// ── MetricTravel ──────────────────────────────────────────────────────────────

/// Distance from location coordinates, time from a constant speed.
///
/// Locations without coordinates are zero distance from everything.
/// Travel time is rounded up so a vehicle never arrives early.
#[derive(Copy, Clone, Debug)]
pub struct MetricTravel {
    pub metric: Metric,
    /// Distance units per tick.
    pub speed:  f64,
}

impl TravelModel for MetricTravel {
    fn travel_time(&self, from: &Location, to: &Location) -> u64 {
        if self.speed <= 0.0 {
            return 0;
        }
        (self.travel_distance(from, to) / self.speed).ceil() as u64
    }

    fn travel_distance(&self, from: &Location, to: &Location) -> f64 {
        match (from.point, to.point) {
            (Some(a), Some(b)) => self.metric.distance(a, b),
            _ => 0.0,
        }
    }
}
