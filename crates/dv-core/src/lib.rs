//! `dv-core` — foundational types for the `dvrp_sim` vehicle routing simulator.
//!
//! This crate is a dependency of every other `dv-*` crate.  It has no `dv-*`
//! dependencies and few external ones (`rand`, `thiserror`, plus optional
//! `serde`).
//!
//! # What lives here
//!
//! | Module     | Contents                                                 |
//! |------------|----------------------------------------------------------|
//! | [`ids`]    | `LocationId`, `VehicleId`, `OrderId`                     |
//! | [`time`]   | `Tick`, `SimClock`, `SimConfig`, `RoutingTimeModel`      |
//! | [`geo`]    | `Point`, `Metric` (euclidean, manhattan, great-circle)   |
//! | [`rng`]    | `SimRng` for scenario generation                         |
//! | [`error`]  | `ModelError`, `SimulationError`, `RoutingError`, `DvrpError` |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                        |
//! |---------|---------------------------------------------------------------|
//! | `serde` | `Serialize`/`Deserialize` on public types, `SimConfig::from_json_str`. |

pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{BoxError, DvrpError, DvrpResult, ModelError, RoutingError, SimulationError};
pub use geo::{Metric, Point};
pub use ids::{LocationId, OrderId, VehicleId};
pub use rng::SimRng;
pub use time::{RoutingTimeModel, SimClock, SimConfig, Tick};
