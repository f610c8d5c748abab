//! `SimOutputObserver<W>` — bridges `SimObserver` to an `OutputWriter`.

use dv_core::{DvrpError, OrderId, SimConfig, Tick, VehicleId};
use dv_elements::Registry;
use dv_routing::RawDecision;
use dv_sim::{OrderEvent, SimObserver, VehicleEvent};

use crate::row::EventRow;
use crate::stats::{collect_order_stats, collect_vehicle_stats, visit_history};
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// A [`SimObserver`] that records every notification as an event row and,
/// once the run finishes, the visit history and the run statistics.
///
/// Errors from the writer are stored internally because `SimObserver` methods
/// have no return value.  After `sim.run()` returns, check for errors with
/// [`take_error`][Self::take_error].
pub struct SimOutputObserver<W: OutputWriter> {
    writer:         W,
    time_unit_secs: u32,
    last_error:     Option<OutputError>,
}

impl<W: OutputWriter> SimOutputObserver<W> {
    /// Create an observer backed by `writer`, using `config` for the
    /// seconds-per-tick conversion.
    pub fn new(writer: W, config: &SimConfig) -> Self {
        Self {
            writer,
            time_unit_secs: config.time_unit_secs,
            last_error:     None,
        }
    }

    /// Take the stored write error (if any) after `sim.run()` returns.
    ///
    /// Returns `None` if all writes succeeded.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer (e.g. to inspect files after the sim).
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }

    fn record(&mut self, now: Tick, entity: &'static str, name: String, event: &'static str, detail: String) {
        let row = EventRow {
            time: now.0,
            elapsed_secs: now.0 * u64::from(self.time_unit_secs),
            entity,
            name,
            event,
            detail,
        };
        let result = self.writer.write_events(std::slice::from_ref(&row));
        self.store_err(result);
    }

    fn write_summary(&mut self, registry: &Registry) -> OutputResult<()> {
        self.writer.write_visits(&visit_history(registry))?;
        self.writer.write_vehicle_stats(&collect_vehicle_stats(registry))?;
        self.writer.write_order_stats(&collect_order_stats(registry))?;
        self.writer.finish()
    }
}

fn order_detail(event: &OrderEvent, registry: &Registry) -> String {
    match event {
        OrderEvent::Postponed { until } => format!("until={}", until.0),
        OrderEvent::PickedUp { vehicle } | OrderEvent::Delivered { vehicle } => {
            format!("vehicle={}", registry.vehicle(*vehicle).name)
        }
        _ => String::new(),
    }
}

fn vehicle_detail(event: &VehicleEvent, registry: &Registry) -> String {
    let name = |id| registry.location(id).name.as_str();
    match *event {
        VehicleEvent::DeparturePostponed { until } => format!("until={}", until.0),
        VehicleEvent::Departed { from, to, physical } => {
            format!("from={} to={} physical={physical}", name(from), name(to))
        }
        VehicleEvent::Arrived { at } => format!("at={}", name(at)),
        VehicleEvent::ServiceRequested { at, queued } => format!("at={} queued={queued}", name(at)),
        _ => String::new(),
    }
}

impl<W: OutputWriter> SimObserver for SimOutputObserver<W> {
    fn on_order_event(&mut self, now: Tick, order: OrderId, event: &OrderEvent, registry: &Registry) {
        let name = registry.order(order).name.clone();
        self.record(now, "order", name, event.name(), order_detail(event, registry));
    }

    fn on_vehicle_event(&mut self, now: Tick, vehicle: VehicleId, event: &VehicleEvent, registry: &Registry) {
        let name = registry.vehicle(vehicle).name.clone();
        self.record(now, "vehicle", name, event.name(), vehicle_detail(event, registry));
    }

    fn on_routing_start(&mut self, now: Tick, epoch: u64) {
        self.record(now, "routing", epoch.to_string(), "started", String::new());
    }

    fn on_routing_finish(&mut self, now: Tick, epoch: u64, decision: &RawDecision) {
        let detail = format!("orders={} vehicles={}", decision.orders.len(), decision.vehicles.len());
        self.record(now, "routing", epoch.to_string(), "finished", detail);
    }

    fn on_warning(&mut self, now: Tick, message: &str) {
        self.record(now, "warning", String::new(), "warning", message.to_owned());
    }

    fn on_simulation_finish(&mut self, _now: Tick, registry: &Registry) {
        let result = self.write_summary(registry);
        self.store_err(result);
    }

    fn on_error(&mut self, _now: Tick, _error: &DvrpError) {
        let result = self.writer.finish();
        self.store_err(result);
    }
}
