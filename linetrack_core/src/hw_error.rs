//! Maps `Box<dyn Error>` from trait boundaries to typed `TrackerError`.
//!
//! The traits in `linetrack_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum,
//! with a feature-gated path for `linetrack_hardware::HwError` downcasting.

use crate::error::TrackerError;

/// Map a trait-boundary error to a typed `TrackerError`.
///
/// Known hardware error types are downcast first, then string heuristics apply.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> TrackerError {
    #[cfg(feature = "hardware-errors")]
    {
        use linetrack_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Gpio(_) | HwError::Pin { .. } => {
                    TrackerError::HardwareFault(hw.to_string())
                }
                HwError::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
                    TrackerError::Timeout
                }
                other => TrackerError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        TrackerError::Timeout
    } else {
        TrackerError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_text_maps_to_timeout() {
        let e: Box<dyn std::error::Error + Send + Sync> = "sensor Timeout on ch3".into();
        assert!(matches!(map_hw_error(&*e), TrackerError::Timeout));
    }

    #[test]
    fn other_text_maps_to_hardware() {
        let e: Box<dyn std::error::Error + Send + Sync> = "bus glitch".into();
        match map_hw_error(&*e) {
            TrackerError::Hardware(s) => assert_eq!(s, "bus glitch"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn gpio_errors_are_faults() {
        let e: Box<dyn std::error::Error + Send + Sync> =
            Box::new(linetrack_hardware::error::HwError::Gpio("pin busy".into()));
        assert!(matches!(map_hw_error(&*e), TrackerError::HardwareFault(_)));
    }
}
