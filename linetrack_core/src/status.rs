//! Outcome of a single control tick.

use crate::estimator::Estimate;
use crate::steering::WheelCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// Normal tick: steering ran and `command` was sent to the wheels.
    Tracking {
        estimate: Estimate,
        command: WheelCommand,
    },
    /// First crossing: the turn ran and no steering command was issued.
    Turned { estimate: Estimate },
    /// Terminal: wheels at zero, indicator on. Returned from the halting tick
    /// onwards.
    Halted,
}

impl TickStatus {
    pub fn command(&self) -> Option<&WheelCommand> {
        match self {
            TickStatus::Tracking { command, .. } => Some(command),
            _ => None,
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, TickStatus::Halted)
    }
}
