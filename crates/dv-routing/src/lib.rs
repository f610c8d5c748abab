//! `dv-routing` — the routing decision protocol of the `dvrp_sim` simulator.
//!
//! # Decision epoch, as seen from this crate
//!
//! ```text
//! Registry ──State::capture──► State ──RoutingAlgorithm::decide──► RawDecision
//!                                                                      │
//!          Decision::resolve (names → ids, status strings → enums) ◄───┘
//!                    │
//!          check_decision (feasibility, then capacity)
//!                    │
//!                    ▼
//!          enforced by dv-sim
//! ```
//!
//! | Module        | Contents                                                 |
//! |---------------|----------------------------------------------------------|
//! | [`state`]     | `State` snapshot (serde, sorted keys)                    |
//! | [`decision`]  | `RawDecision` payload, resolved `Decision`               |
//! | [`checker`]   | `check_feasibility`, `check_capacity`                    |
//! | [`algorithm`] | `RoutingAlgorithm` trait, `RejectAll`                    |
//! | [`command`]   | `CommandRouting` (external program over JSON files)      |

pub mod algorithm;
pub mod checker;
pub mod command;
pub mod decision;
pub mod state;


pub use algorithm::{RejectAll, RoutingAlgorithm};
pub use checker::{CAPACITY_TOLERANCE, check_capacity, check_decision, check_feasibility};
pub use command::{CommandError, CommandRouting};
pub use decision::{
    Decision, OrderDecision, RawDecision, RawOrderDecision, RawVehicleDecision, RawVisit,
    VehicleDecision,
};
pub use state::{CurrentVisitState, OrderState, PreviousVisitState, State, VehicleState, VisitState};
