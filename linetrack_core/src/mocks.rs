//! Stand-ins for hardware the controller does not always need.

use linetrack_traits::{CHANNELS, HwResult, Indicator, ReflectanceArray};

/// A sensor array that always errors on read; used when driving the
/// controller with recorded frames via `step_from_raw`.
pub struct NoopArray;

impl ReflectanceArray for NoopArray {
    fn read(&mut self) -> HwResult<[u16; CHANNELS]> {
        Err(Box::new(std::io::Error::other("noop sensor array")))
    }
}

/// Indicator for builds without a status output.
#[derive(Debug, Default)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set(&mut self, _on: bool) -> HwResult<()> {
        Ok(())
    }
}
