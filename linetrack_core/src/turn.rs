//! Open-loop spin in place.

use std::time::Duration;

use eyre::WrapErr;
use linetrack_traits::{Clock, Direction, Wheel};

use crate::config::TurnCfg;
use crate::error::Result;
use crate::hw_error::map_hw_error;

/// Fixed-duty, fixed-duration rotation with no feedback.
#[derive(Debug, Clone, Copy)]
pub struct TurnManeuver {
    duty: u16,
    duration: Duration,
}

impl TurnManeuver {
    pub fn new(cfg: &TurnCfg) -> Self {
        Self {
            duty: cfg.duty,
            duration: Duration::from_millis(cfg.duration_ms),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Left wheel forward, right wheel reverse, hold, then stop both.
    ///
    /// Blocks the caller for the whole duration; nothing is sensed meanwhile.
    pub fn execute<L: Wheel, R: Wheel>(
        &self,
        left: &mut L,
        right: &mut R,
        clock: &dyn Clock,
    ) -> Result<()> {
        tracing::info!(
            duty = self.duty,
            duration_ms = self.duration.as_millis() as u64,
            "turn start"
        );
        spin(left, Direction::Forward, self.duty).wrap_err("turn: left wheel")?;
        spin(right, Direction::Reverse, self.duty).wrap_err("turn: right wheel")?;
        clock.sleep(self.duration);
        left
            .set_duty(0)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("turn: left wheel stop")?;
        right
            .set_duty(0)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("turn: right wheel stop")?;
        tracing::info!("turn complete");
        Ok(())
    }
}

fn spin<W: Wheel>(wheel: &mut W, dir: Direction, duty: u16) -> Result<()> {
    wheel
        .set_direction(dir)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
    wheel
        .set_duty(duty)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
    Ok(())
}
