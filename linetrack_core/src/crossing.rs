//! Crosspiece detection: debounces saturated ticks into crossing events.

use linetrack_traits::CHANNELS;

/// A debounced crossing, numbered from the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// Turn around and switch to the returning weights.
    First,
    /// Mission complete; halt.
    Second,
}

/// Edge detector over consecutive ticks.
///
/// A crossing fires on the second consecutive marker tick and re-arms only
/// after a tick without the marker, so one physical stripe gives one event no
/// matter how many ticks it spans.
#[derive(Debug, Clone)]
pub struct CrossingDetector {
    marker_min_channels: u8,
    was_marker_present: bool,
    crossing_in_progress: bool,
    crossing_count: u8,
}

impl CrossingDetector {
    pub fn new(marker_min_channels: usize) -> Self {
        Self {
            marker_min_channels: marker_min_channels.clamp(1, CHANNELS) as u8,
            was_marker_present: false,
            crossing_in_progress: false,
            crossing_count: 0,
        }
    }

    pub fn was_marker_present(&self) -> bool {
        self.was_marker_present
    }

    pub fn crossing_in_progress(&self) -> bool {
        self.crossing_in_progress
    }

    pub fn crossing_count(&self) -> u8 {
        self.crossing_count
    }

    /// Whether `high_count` saturated channels make a marker tick.
    #[inline]
    pub fn is_marker(&self, high_count: u8) -> bool {
        high_count >= self.marker_min_channels
    }

    /// Feed one tick's saturation count.
    ///
    /// On an event the "previous tick" flag is left as it was: the event tick
    /// ends early and the in-progress latch already blocks a repeat.
    pub fn observe(&mut self, high_count: u8) -> Option<Crossing> {
        let marker_present = self.is_marker(high_count);
        if marker_present {
            if self.was_marker_present && !self.crossing_in_progress {
                self.crossing_in_progress = true;
                self.crossing_count = self.crossing_count.saturating_add(1);
                tracing::debug!(count = self.crossing_count, "crossing edge");
                return Some(if self.crossing_count == 1 {
                    Crossing::First
                } else {
                    Crossing::Second
                });
            }
        } else {
            self.crossing_in_progress = false;
        }
        self.was_marker_present = marker_present;
        None
    }
}
