//! The `OutputWriter` trait implemented by all backend writers.

use crate::{EventRow, OrderStatsRow, OutputResult, VehicleStatsRow, VisitRow};

/// Trait implemented by output backends.
///
/// All methods are infallible from the observer's perspective: errors are
/// stored internally and retrieved with
/// [`SimOutputObserver::take_error`][crate::SimOutputObserver::take_error].
pub trait OutputWriter {
    /// Write a batch of event rows.
    fn write_events(&mut self, rows: &[EventRow]) -> OutputResult<()>;

    /// Write the visit history.  Called once, at the end of the run.
    fn write_visits(&mut self, rows: &[VisitRow]) -> OutputResult<()>;

    fn write_vehicle_stats(&mut self, rows: &[VehicleStatsRow]) -> OutputResult<()>;

    fn write_order_stats(&mut self, rows: &[OrderStatsRow]) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent: safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
