//! `dv-sim` — discrete-event coordinator of the `dvrp_sim` simulator.
//!
//! # Event loop
//!
//! ```text
//! while an event is due (and before the horizon):
//!   pop (time, priority, seq)-ordered event, advance the clock
//!   ① ReleaseOrder      → add to registry; maybe request routing
//!   ② PeriodicUpdate    → request routing; reschedule
//!   ③ RoutingStart      → epoch += 1; hooks interrupt waiting vehicles
//!   ④ RoutingDecide     → State snapshot → algorithm → RawDecision
//!   ⑤ RoutingEnforce    → resolve, check, apply; resume idle vehicles
//!   ⑥ vehicle timers    → drive the vehicle procedure to its next wait
//!   apply the actions returned by hooks, in order
//! finalize: all vehicles idle, close visits, warn about unfinished orders
//! ```
//!
//! Routing start and decide run at high priority, enforcement at low
//! priority, everything else at medium: a decision that takes no simulated
//! time is enforced before any other event of the same tick.
//!
//! | Module         | Contents                                            |
//! |----------------|-----------------------------------------------------|
//! | [`sim`]        | `Sim`, `RoutingHandle`, run control, epochs, orders  |
//! | [`procedure`]  | `VehiclePhase`, `Slot`, the vehicle state machine    |
//! | [`builder`]    | `SimBuilder`                                        |
//! | [`events`]     | `OrderEvent`, `VehicleEvent`                        |
//! | [`hooks`]      | `SimHooks`, `Action`, `HookContext`, `DefaultHooks`  |
//! | [`observer`]   | `SimObserver`, `NoopObserver`, `TracingObserver`     |
//!
//! # Cargo features
//!
//! | Feature   | Effect                                                  |
//! |-----------|---------------------------------------------------------|
//! | `fx-hash` | FxHash for the name indexes and the postponement table. |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use dv_core::SimConfig;
//! use dv_routing::RejectAll;
//! use dv_sim::{SimBuilder, TracingObserver};
//!
//! let mut sim = SimBuilder::new(SimConfig::default(), registry, RejectAll)
//!     .orders(orders)
//!     .build()?;
//! sim.run(&mut TracingObserver)?;
//! ```

pub mod builder;
pub mod events;
pub mod hooks;
pub mod observer;
pub mod procedure;
pub mod sim;

#[cfg(test)]
mod tests;

pub use builder::SimBuilder;
pub use events::{OrderEvent, VehicleEvent};
pub use hooks::{Action, DefaultHooks, HookContext, SimHooks};
pub use observer::{NoopObserver, SimObserver, TracingObserver};
pub use procedure::{Slot, VehiclePhase};
pub use sim::{RoutingHandle, Sim};
