//! Plain data row types written by output backends.

/// One notification of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub time:         u64,
    /// `time` converted to seconds with the configured time unit.
    pub elapsed_secs: u64,
    /// `order`, `vehicle`, `routing` or `warning`.
    pub entity:       &'static str,
    /// Order or vehicle name, epoch number for routing rows.
    pub name:         String,
    pub event:        &'static str,
    /// Event-specific `key=value` pairs, space separated.
    pub detail:       String,
}

/// One closed visit from a vehicle's history.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRow {
    pub vehicle:             String,
    /// Position in the vehicle's history, starting at 0.
    pub index:               usize,
    pub location:            String,
    pub arrival_time:        Option<u64>,
    pub service_start_time:  Option<u64>,
    pub service_finish_time: Option<u64>,
    pub departure_time:      Option<u64>,
    /// Order names joined with `;`.
    pub pickups:             String,
    pub deliveries:          String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleStatsRow {
    pub vehicle:  String,
    pub distance: f64,
    pub moving:   u64,
    pub waiting:  u64,
    pub service:  u64,
    pub idle:     u64,
}

/// Statistics of one original order, aggregated over its sub-orders.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatsRow {
    pub original_name: String,
    pub suborders:     usize,
    pub due_date:      Option<u64>,
    pub delivery_time: Option<u64>,
    pub tardiness:     u64,
}
