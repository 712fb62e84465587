//! PD steering law and the wheel commands it produces.

use linetrack_traits::Direction;

use crate::config::ControlCfg;

/// Direction and duty for one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WheelDrive {
    pub direction: Direction,
    pub duty: u16,
}

impl WheelDrive {
    pub const STOP: WheelDrive = WheelDrive {
        direction: Direction::Forward,
        duty: 0,
    };
}

/// Both wheels for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WheelCommand {
    pub left: WheelDrive,
    pub right: WheelDrive,
}

/// Proportional + derivative controller; there is no integral term.
#[derive(Debug, Clone)]
pub struct SteeringController {
    kp: f32,
    kd: f32,
    base_speed: i32,
    reverse_gain: f32,
    max_duty: u16,
    last_error: i32,
}

impl SteeringController {
    pub fn new(cfg: &ControlCfg) -> Self {
        Self {
            kp: cfg.kp,
            kd: cfg.kd,
            base_speed: i32::from(cfg.base_speed),
            reverse_gain: cfg.reverse_gain,
            max_duty: cfg.max_duty,
            last_error: 0,
        }
    }

    /// Previous tick's error, the derivative baseline.
    pub fn last_error(&self) -> i32 {
        self.last_error
    }

    /// Reset the derivative baseline without producing a command.
    pub fn hold(&mut self, error: i32) {
        self.last_error = error;
    }

    /// Correction for `error` given the stored baseline; does not update it.
    pub fn correction(&self, error: i32) -> f32 {
        let d_error = error.saturating_sub(self.last_error);
        self.kp * error as f32 + self.kd * d_error as f32
    }

    /// Run the law for one tick and advance the baseline.
    pub fn command(&mut self, error: i32) -> WheelCommand {
        let correction = self.correction(error);
        self.last_error = error;

        let base = self.base_speed as f32;
        // `as` truncates toward zero and saturates on overflow.
        let left = (base - correction) as i32;
        let right = (base + correction) as i32;
        let cmd = WheelCommand {
            left: self.drive_for(left),
            right: self.drive_for(right),
        };
        tracing::trace!(error, correction, left, right, ?cmd, "steer");
        cmd
    }

    /// Map a signed speed to a wheel drive.
    ///
    /// Negative speeds run the wheel in reverse at `reverse_gain * |speed|`
    /// (truncated). Magnitudes beyond `max_duty` are clamped.
    pub fn drive_for(&self, speed: i32) -> WheelDrive {
        let (direction, magnitude) = if speed < 0 {
            let m = (self.reverse_gain * speed.unsigned_abs() as f32) as u32;
            (Direction::Reverse, m)
        } else {
            (Direction::Forward, speed as u32)
        };
        let duty = if magnitude > u32::from(self.max_duty) {
            tracing::trace!(requested = magnitude, max = self.max_duty, "duty clamped");
            self.max_duty
        } else {
            magnitude as u16
        };
        WheelDrive { direction, duty }
    }
}
