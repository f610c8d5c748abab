//! Reactions of a vehicle to interruptions of its execution phases.

use dv_core::{SimulationError, VehicleId};

/// A suspendable phase of the vehicle procedure.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Phase {
    PreDeparture,
    Travel,
    PreService,
    Service,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::PreDeparture => "pre-departure",
            Phase::Travel       => "travel",
            Phase::PreService   => "pre-service",
            Phase::Service      => "service",
        }
    }
}

/// Decides whether an interruption of `phase` is acceptable.
///
/// The coordinator has already cancelled the phase's timer and released any
/// held resource when this is called; returning `Err` aborts the run.
///
/// The default allows only pre-departure interruptions.
pub trait InterruptPolicy {
    fn on_interrupt(&self, vehicle: VehicleId, phase: Phase) -> Result<(), SimulationError> {
        match phase {
            Phase::PreDeparture => Ok(()),
            _ => Err(SimulationError::InterruptionNotAllowed { vehicle, phase: phase.name() }),
        }
    }
}

/// Pre-departure waits may be cut short; everything else is fatal.
#[derive(Copy, Clone, Debug, Default)]
pub struct StrictInterrupts;

impl InterruptPolicy for StrictInterrupts {}

/// Every phase may be interrupted.  The vehicle stops where it is and
/// waits for a new decision.
#[derive(Copy, Clone, Debug, Default)]
pub struct PermissiveInterrupts;

impl InterruptPolicy for PermissiveInterrupts {
    fn on_interrupt(&self, _vehicle: VehicleId, _phase: Phase) -> Result<(), SimulationError> {
        Ok(())
    }
}
