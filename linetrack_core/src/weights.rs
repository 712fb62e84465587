//! Direction-dependent weight vectors.

use linetrack_traits::CHANNELS;

/// Which leg of the run the vehicle is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Before the first crossing.
    #[default]
    Outbound,
    /// After the 180° turn; the bar sweeps the line from the other side.
    Returning,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Outbound => "outbound",
            Phase::Returning => "returning",
        }
    }
}

/// Signed contribution of each channel's normalized reading to lateral error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightVector(pub [i32; CHANNELS]);

impl WeightVector {
    #[inline]
    pub fn get(&self, ch: usize) -> i32 {
        self.0[ch]
    }
}

/// Both weight vectors; `Phase` picks the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightSet {
    pub outbound: WeightVector,
    pub returning: WeightVector,
}

impl WeightSet {
    #[inline]
    pub fn active(&self, phase: Phase) -> &WeightVector {
        match phase {
            Phase::Outbound => &self.outbound,
            Phase::Returning => &self.returning,
        }
    }
}

impl Default for WeightSet {
    fn default() -> Self {
        let w = linetrack_config::Weights::default();
        Self {
            outbound: WeightVector(w.outbound),
            returning: WeightVector(w.returning),
        }
    }
}
