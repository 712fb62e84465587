//! Hardware seams shared by the controller and its backends.
//!
//! The controller only ever talks to the vehicle through these traits, so the
//! same core runs against GPIO, a scripted simulation, or a test spy.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Number of reflectance channels on the sensor bar.
pub const CHANNELS: usize = 8;

/// Boxed error type used at every hardware trait boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Wheel rotation sense as seen by the motor driver's direction pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// Linear array of downward-facing reflectance sensors.
pub trait ReflectanceArray {
    /// One raw intensity per channel, left to right.
    fn read(&mut self) -> HwResult<[u16; CHANNELS]>;
}

/// One independently driven wheel.
pub trait Wheel {
    fn set_direction(&mut self, dir: Direction) -> HwResult<()>;
    fn set_duty(&mut self, duty: u16) -> HwResult<()>;
}

/// Single binary status output (an LED on the vehicle).
pub trait Indicator {
    fn set(&mut self, on: bool) -> HwResult<()>;
}

impl<T: ReflectanceArray + ?Sized> ReflectanceArray for Box<T> {
    fn read(&mut self) -> HwResult<[u16; CHANNELS]> {
        (**self).read()
    }
}

impl<T: Wheel + ?Sized> Wheel for Box<T> {
    fn set_direction(&mut self, dir: Direction) -> HwResult<()> {
        (**self).set_direction(dir)
    }
    fn set_duty(&mut self, duty: u16) -> HwResult<()> {
        (**self).set_duty(duty)
    }
}

impl<T: Indicator + ?Sized> Indicator for Box<T> {
    fn set(&mut self, on: bool) -> HwResult<()> {
        (**self).set(on)
    }
}

/// An absent indicator accepts every write.
impl<T: Indicator> Indicator for Option<T> {
    fn set(&mut self, on: bool) -> HwResult<()> {
        match self {
            Some(inner) => inner.set(on),
            None => Ok(()),
        }
    }
}
