//! CSV output backend.
//!
//! Creates four files in the configured output directory:
//! - `events.csv`
//! - `visits.csv`
//! - `vehicle_stats.csv`
//! - `order_stats.csv`
//!
//! Missing times are written as empty fields.

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{EventRow, OrderStatsRow, OutputResult, VehicleStatsRow, VisitRow};

/// Writes simulation output to four CSV files.
pub struct CsvWriter {
    events:        Writer<File>,
    visits:        Writer<File>,
    vehicle_stats: Writer<File>,
    order_stats:   Writer<File>,
    finished:      bool,
}

impl CsvWriter {
    /// Open (or create) the four CSV files in `dir` and write the header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let mut events = Writer::from_path(dir.join("events.csv"))?;
        events.write_record(["time", "elapsed_secs", "entity", "name", "event", "detail"])?;

        let mut visits = Writer::from_path(dir.join("visits.csv"))?;
        visits.write_record([
            "vehicle",
            "index",
            "location",
            "arrival_time",
            "service_start_time",
            "service_finish_time",
            "departure_time",
            "pickups",
            "deliveries",
        ])?;

        let mut vehicle_stats = Writer::from_path(dir.join("vehicle_stats.csv"))?;
        vehicle_stats.write_record(["vehicle", "distance", "moving", "waiting", "service", "idle"])?;

        let mut order_stats = Writer::from_path(dir.join("order_stats.csv"))?;
        order_stats.write_record(["original_name", "suborders", "due_date", "delivery_time", "tardiness"])?;

        Ok(Self {
            events,
            visits,
            vehicle_stats,
            order_stats,
            finished: false,
        })
    }
}

fn opt(t: Option<u64>) -> String {
    t.map(|t| t.to_string()).unwrap_or_default()
}

impl OutputWriter for CsvWriter {
    fn write_events(&mut self, rows: &[EventRow]) -> OutputResult<()> {
        for row in rows {
            self.events.write_record([
                row.time.to_string().as_str(),
                row.elapsed_secs.to_string().as_str(),
                row.entity,
                row.name.as_str(),
                row.event,
                row.detail.as_str(),
            ])?;
        }
        Ok(())
    }

    fn write_visits(&mut self, rows: &[VisitRow]) -> OutputResult<()> {
        for row in rows {
            self.visits.write_record(&[
                row.vehicle.clone(),
                row.index.to_string(),
                row.location.clone(),
                opt(row.arrival_time),
                opt(row.service_start_time),
                opt(row.service_finish_time),
                opt(row.departure_time),
                row.pickups.clone(),
                row.deliveries.clone(),
            ])?;
        }
        Ok(())
    }

    fn write_vehicle_stats(&mut self, rows: &[VehicleStatsRow]) -> OutputResult<()> {
        for row in rows {
            self.vehicle_stats.write_record(&[
                row.vehicle.clone(),
                row.distance.to_string(),
                row.moving.to_string(),
                row.waiting.to_string(),
                row.service.to_string(),
                row.idle.to_string(),
            ])?;
        }
        Ok(())
    }

    fn write_order_stats(&mut self, rows: &[OrderStatsRow]) -> OutputResult<()> {
        for row in rows {
            self.order_stats.write_record(&[
                row.original_name.clone(),
                row.suborders.to_string(),
                opt(row.due_date),
                opt(row.delivery_time),
                row.tardiness.to_string(),
            ])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.events.flush()?;
        self.visits.flush()?;
        self.vehicle_stats.flush()?;
        self.order_stats.flush()?;
        Ok(())
    }
}
