//! `dv-output` — run statistics, visit history and output writers for the
//! `dvrp_sim` simulator.
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`stats`]    | Per-vehicle statistics, per-original-order tardiness, visit history |
//! | [`row`]      | Plain row types shared by all backends                    |
//! | [`writer`]   | The `OutputWriter` trait                                   |
//! | [`csv`]      | `CsvWriter`: `events.csv`, `visits.csv`, `vehicle_stats.csv`, `order_stats.csv` |
//! | [`observer`] | `SimOutputObserver`, which drives a writer from `dv_sim::SimObserver` |
//!
//! # Usage
//!
//! ```rust,ignore
//! use dv_output::{CsvWriter, SimOutputObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let mut obs = SimOutputObserver::new(writer, &config);
//! sim.run(&mut obs)?;
//! if let Some(e) = obs.take_error() {
//!     eprintln!("output error: {e}");
//! }
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod stats;
pub mod writer;


pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::SimOutputObserver;
pub use row::{EventRow, OrderStatsRow, VehicleStatsRow, VisitRow};
pub use stats::{collect_order_stats, collect_vehicle_stats, vehicle_stats, visit_history};
pub use writer::OutputWriter;
