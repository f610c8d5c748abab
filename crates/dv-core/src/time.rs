//! Simulation time model.
//!
//! # Design
//!
//! Time is a logical, monotonically increasing `Tick` counter.  It has no
//! relation to wall-clock time except through `time_unit_secs`, which only
//! affects how ticks are rendered for humans.
//!
//! Integer ticks keep every schedule comparison exact: two events due "now"
//! are due at the same tick, never at two floats a rounding error apart.

use std::fmt;
use std::time::Duration;

use crate::SimulationError;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation time.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`, or 0 if `earlier` is later.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// The logical clock of a run.  Only ever moves forward.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// The current tick.
    pub now: Tick,
    /// How many real seconds one tick stands for (display only).
    pub time_unit_secs: u32,
}

impl SimClock {
    pub fn new(time_unit_secs: u32) -> Self {
        Self { now: Tick::ZERO, time_unit_secs }
    }

    /// Move the clock to `target`.
    ///
    /// Returns [`SimulationError::ClockRewind`] if `target` lies in the past.
    pub fn advance_to(&mut self, target: Tick) -> Result<(), SimulationError> {
        if target < self.now {
            return Err(SimulationError::ClockRewind { now: self.now, target });
        }
        self.now = target;
        Ok(())
    }

    /// Break elapsed time into (day, hour, minute) components from tick 0.
    pub fn elapsed_dhm(&self) -> (u64, u32, u32) {
        let total_secs = self.now.0 * self.time_unit_secs as u64;
        let days = total_secs / 86_400;
        let hours = ((total_secs % 86_400) / 3_600) as u32;
        let minutes = ((total_secs % 3_600) / 60) as u32;
        (days, hours, minutes)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (d, h, m) = self.elapsed_dhm();
        write!(f, "{} (day {} {:02}:{:02})", self.now, d, h, m)
    }
}

// ── RoutingTimeModel ──────────────────────────────────────────────────────────

/// How the real time spent inside the routing algorithm maps to simulated
/// time.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum RoutingTimeModel {
    /// Decisions take no simulated time.
    #[default]
    Instant,
    /// Each real second of algorithm time costs `ticks_per_second` ticks,
    /// rounded up.
    Scaled { ticks_per_second: f64 },
}

impl RoutingTimeModel {
    /// Simulated delay for an algorithm call that took `elapsed` real time.
    pub fn delay(&self, elapsed: Duration) -> u64 {
        match *self {
            RoutingTimeModel::Instant => 0,
            RoutingTimeModel::Scaled { ticks_per_second } => {
                let ticks = elapsed.as_secs_f64() * ticks_per_second.max(0.0);
                ticks.ceil() as u64
            }
        }
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level simulation configuration.
///
/// Every field has a default, so a JSON config only needs the keys it
/// changes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Seconds per tick, used for human-readable time.  Default: 60.
    pub time_unit_secs: u32,

    /// Impose a decision point whenever an order is released.
    pub decision_on_request: bool,

    /// Impose a decision point every `n` ticks, starting at tick 0.
    pub periodic_routing_step: Option<u64>,

    /// Stop the periodic trigger as soon as the last order has been released,
    /// instead of waiting until no open orders remain.
    pub stop_periodic_after_last_request: bool,

    /// Mapping of algorithm wall time to simulated time.
    pub routing_time: RoutingTimeModel,

    /// Hard stop for `Sim::run`: events after this tick are not processed.
    pub horizon: Option<Tick>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            time_unit_secs: 60,
            decision_on_request: false,
            periodic_routing_step: None,
            stop_periodic_after_last_request: false,
            routing_time: RoutingTimeModel::Instant,
            horizon: None,
        }
    }
}

impl SimConfig {
    /// Construct a `SimClock` for this run.
    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.time_unit_secs)
    }

    /// Parse a config from JSON.  Missing keys keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, crate::ModelError> {
        serde_json::from_str(json).map_err(|e| crate::ModelError::Config(e.to_string()))
    }
}
