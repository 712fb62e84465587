//! Raspberry Pi backend: RC reflectance bar, PWM wheels and a status LED.

use std::time::Duration;

use linetrack_traits::{CHANNELS, Direction, HwResult, Indicator, ReflectanceArray, Wheel};
use rppal::gpio::{Gpio, IoPin, Mode, OutputPin};
use tracing::{debug, trace};

use crate::error::{HwError, Result};
use crate::util::{discharge_times, duration_to_raw};

/// Software PWM carrier for the wheel drivers.
const PWM_HZ: f64 = 1_000.0;

/// Eight RC-style reflectance sensors read by timing capacitor discharge.
///
/// Bright surfaces discharge fast (small reading); the line stays high until
/// `timeout`, so the darkest possible reading equals the timeout in µs.
pub struct RcReflectanceArray {
    pins: Vec<IoPin>,
    charge: Duration,
    timeout: Duration,
}

impl RcReflectanceArray {
    pub fn new(gpio: &Gpio, pins: [u8; CHANNELS], charge: Duration, timeout: Duration) -> Result<Self> {
        let mut io = Vec::with_capacity(CHANNELS);
        for (i, pin) in pins.iter().enumerate() {
            if pins[..i].contains(pin) {
                return Err(HwError::Pin {
                    pin: *pin,
                    reason: "assigned to more than one sensor channel".into(),
                });
            }
            io.push(gpio.get(*pin)?.into_io(Mode::Input));
        }
        Ok(Self {
            pins: io,
            charge,
            timeout,
        })
    }
}

impl ReflectanceArray for RcReflectanceArray {
    fn read(&mut self) -> HwResult<[u16; CHANNELS]> {
        for p in &mut self.pins {
            p.set_mode(Mode::Output);
            p.set_high();
        }
        std::thread::sleep(self.charge);
        for p in &mut self.pins {
            p.set_mode(Mode::Input);
        }
        let pins = &self.pins;
        let times: [Duration; CHANNELS] =
            discharge_times(|ch| pins[ch].is_high(), self.timeout, Duration::ZERO);
        let raw = times.map(duration_to_raw);
        trace!(?raw, "rc array read");
        Ok(raw)
    }
}

/// One DRV8838-style channel: direction pin, PWM pin and an optional sleep pin.
pub struct PwmWheel {
    dir: OutputPin,
    pwm: OutputPin,
    _sleep: Option<OutputPin>,
    max_duty: u16,
}

impl PwmWheel {
    pub fn new(gpio: &Gpio, pwm_pin: u8, dir_pin: u8, sleep_pin: Option<u8>, max_duty: u16) -> Result<Self> {
        let dir = gpio.get(dir_pin)?.into_output_low();
        let pwm = gpio.get(pwm_pin)?.into_output_low();
        // Driver sleep is active low; holding it high enables the bridge.
        let sleep = match sleep_pin {
            Some(p) => Some(gpio.get(p)?.into_output_high()),
            None => None,
        };
        Ok(Self {
            dir,
            pwm,
            _sleep: sleep,
            max_duty: max_duty.max(1),
        })
    }
}

impl Wheel for PwmWheel {
    fn set_direction(&mut self, dir: Direction) -> HwResult<()> {
        match dir {
            Direction::Forward => self.dir.set_low(),
            Direction::Reverse => self.dir.set_high(),
        }
        Ok(())
    }

    fn set_duty(&mut self, duty: u16) -> HwResult<()> {
        if duty == 0 {
            self.pwm.clear_pwm().map_err(HwError::from)?;
            self.pwm.set_low();
            return Ok(());
        }
        let frac = (f64::from(duty.min(self.max_duty)) / f64::from(self.max_duty)).clamp(0.0, 1.0);
        self.pwm
            .set_pwm_frequency(PWM_HZ, frac)
            .map_err(HwError::from)?;
        Ok(())
    }
}

/// Status LED on a plain output pin.
pub struct GpioIndicator {
    pin: OutputPin,
}

impl GpioIndicator {
    pub fn new(gpio: &Gpio, pin: u8) -> Result<Self> {
        Ok(Self {
            pin: gpio.get(pin)?.into_output_low(),
        })
    }
}

impl Indicator for GpioIndicator {
    fn set(&mut self, on: bool) -> HwResult<()> {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

/// Pin assignment for `bring_up`, already resolved from configuration.
#[derive(Debug, Clone)]
pub struct VehiclePins {
    pub left_pwm: u8,
    pub left_dir: u8,
    pub left_sleep: Option<u8>,
    pub right_pwm: u8,
    pub right_dir: u8,
    pub right_sleep: Option<u8>,
    pub led: Option<u8>,
    pub sensors: [u8; CHANNELS],
    pub charge: Duration,
    pub sensor_timeout: Duration,
    pub max_duty: u16,
}

/// Everything the controller drives, after one-time initialization.
pub struct HardwareVehicle {
    pub sensors: RcReflectanceArray,
    pub left: PwmWheel,
    pub right: PwmWheel,
    /// `None` when no LED pin is configured.
    pub indicator: Option<GpioIndicator>,
}

/// One-time bring-up: claim pins, enable the drivers, wheels stopped and
/// pointing forward, indicator off.
pub fn bring_up(pins: &VehiclePins) -> Result<HardwareVehicle> {
    let gpio = Gpio::new()?;
    let sensors = RcReflectanceArray::new(&gpio, pins.sensors, pins.charge, pins.sensor_timeout)?;
    let left = PwmWheel::new(&gpio, pins.left_pwm, pins.left_dir, pins.left_sleep, pins.max_duty)?;
    let right = PwmWheel::new(&gpio, pins.right_pwm, pins.right_dir, pins.right_sleep, pins.max_duty)?;
    let indicator = pins.led.map(|p| GpioIndicator::new(&gpio, p)).transpose()?;
    debug!(?pins, "vehicle hardware up");
    Ok(HardwareVehicle {
        sensors,
        left,
        right,
        indicator,
    })
}
