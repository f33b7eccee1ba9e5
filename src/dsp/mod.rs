//! # DSP (Digital Signal Processing) Primitives
//!
//! The building blocks of the disperser, leaves first:
//!
//! - **`saturation`**: a bounded soft-knee curve applied to everything fed
//!   back into a delay line.
//! - **`delay_line`**: a ring buffer with fractional (interpolated) reads.
//! - **`voice_bank`**: eight delay voices in a fixed array, each with its
//!   own delay time, pan and fade gain.
//! - **`dispersion`**: seeded per-voice delay offsets and stereo positions.
//! - **`feedback`**: the per-sample loop that reads, pans, saturates and
//!   writes back every audible voice.

pub mod delay_line;
pub mod dispersion;
pub mod feedback;
pub mod saturation;
pub mod voice_bank;

/// Number of voice slots in the bank.
pub const MAX_VOICES: usize = 8;

/// One frame of stereo audio.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoSample {
    pub left: f32,
    pub right: f32,
}

impl StereoSample {
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Sum of both channels. A centered voice splits this back into two
    /// equal halves, so a signal with `left == right` comes out of a
    /// centered voice unchanged.
    #[inline]
    pub fn mono_sum(self) -> f32 {
        self.left + self.right
    }

    #[inline]
    pub fn scale(self, gain: f32) -> Self {
        Self::new(self.left * gain, self.right * gain)
    }

    pub fn is_finite(self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }
}

/// Convert a time in milliseconds to a (fractional) number of samples.
///
/// ```text
/// samples = ms * sample_rate / 1000
/// ```
pub const fn calculate_delay_samples(delay_ms: f32, sample_rate: f32) -> f32 {
    delay_ms * sample_rate / 1000.0
}
