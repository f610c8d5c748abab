//! `dv-queue` — the discrete-event timeline of the `dvrp_sim` simulator.
//!
//! | Module            | Contents                                     |
//! |-------------------|----------------------------------------------|
//! | [`event_queue`]   | `Priority`, `EventKey`, `EventQueue<E>`      |
//!
//! The queue is generic over the event payload; `dv-sim` instantiates it
//! with its own event enum.

pub mod event_queue;


pub use event_queue::{EventKey, EventQueue, Priority};
