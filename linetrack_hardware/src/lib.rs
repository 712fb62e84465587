pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod util;

use linetrack_traits::{CHANNELS, Direction, HwResult, Indicator, ReflectanceArray, Wheel};
use std::cell::RefCell;
use std::rc::Rc;

/// Raw reading of a channel over bare floor (below every calibrated minimum).
pub const SIM_WHITE: u16 = 400;
/// Raw reading of a channel over tape (the RC timeout cap).
pub const SIM_BLACK: u16 = 2500;

/// Scripted reflectance bar: replays frames, then repeats the last one.
pub struct SimulatedArray {
    frames: Vec<[u16; CHANNELS]>,
    idx: usize,
}

impl SimulatedArray {
    pub fn from_frames(frames: Vec<[u16; CHANNELS]>) -> Self {
        Self { frames, idx: 0 }
    }

    /// A straight out-and-back course: `leg_ticks` of centred line, a
    /// `stripe_ticks` wide crosspiece, the return leg, then the crosspiece
    /// again, after which the bar keeps seeing it.
    pub fn course(leg_ticks: usize, stripe_ticks: usize) -> Self {
        let line = Self::line_at(3);
        let stripe = [SIM_BLACK; CHANNELS];
        let mut frames = Vec::with_capacity(2 * (leg_ticks + stripe_ticks));
        for _ in 0..2 {
            frames.extend(std::iter::repeat_n(line, leg_ticks));
            frames.extend(std::iter::repeat_n(stripe, stripe_ticks));
        }
        Self::from_frames(frames)
    }

    /// A two-channel-wide line under channels `left` and `left + 1`.
    pub fn line_at(left: usize) -> [u16; CHANNELS] {
        let mut f = [SIM_WHITE; CHANNELS];
        f[left.min(CHANNELS - 1)] = SIM_BLACK;
        f[(left + 1).min(CHANNELS - 1)] = SIM_BLACK;
        f
    }

    /// Frames handed out so far.
    pub fn reads(&self) -> usize {
        self.idx
    }
}

impl ReflectanceArray for SimulatedArray {
    fn read(&mut self) -> HwResult<[u16; CHANNELS]> {
        let f = self
            .frames
            .get(self.idx)
            .or_else(|| self.frames.last())
            .copied()
            .unwrap_or([SIM_WHITE; CHANNELS]);
        self.idx = self.idx.saturating_add(1);
        tracing::trace!(raw = ?f, tick = self.idx, "sim array read");
        Ok(f)
    }
}

/// Current output of a simulated wheel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelState {
    pub direction: Direction,
    pub duty: u16,
}

/// Wheel that records what it is told; clone it to inspect the recorded state.
#[derive(Default, Clone)]
pub struct SimulatedWheel {
    state: Rc<RefCell<WheelState>>,
    duty_log: Rc<RefCell<Vec<WheelState>>>,
}

impl SimulatedWheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WheelState {
        *self.state.borrow()
    }

    /// Every duty write with the direction in force at the time.
    pub fn history(&self) -> Vec<WheelState> {
        self.duty_log.borrow().clone()
    }
}

impl Wheel for SimulatedWheel {
    fn set_direction(&mut self, dir: Direction) -> HwResult<()> {
        self.state.borrow_mut().direction = dir;
        Ok(())
    }

    fn set_duty(&mut self, duty: u16) -> HwResult<()> {
        let mut s = self.state.borrow_mut();
        s.duty = duty;
        self.duty_log.borrow_mut().push(*s);
        Ok(())
    }
}

/// Indicator backed by a shared flag.
#[derive(Default, Clone)]
pub struct SimulatedIndicator {
    on: Rc<RefCell<bool>>,
}

impl SimulatedIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        *self.on.borrow()
    }
}

impl Indicator for SimulatedIndicator {
    fn set(&mut self, on: bool) -> HwResult<()> {
        *self.on.borrow_mut() = on;
        Ok(())
    }
}
