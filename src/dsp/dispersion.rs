//! # Dispersion
//!
//! Derives where each voice sits: how far its delay time strays from the
//! base delay, and where it lands in the stereo field.
//!
//! Each voice gets its own ChaCha stream keyed by `(seed, voice_index)`.
//! Nothing is drawn sequentially across voices, so voice `i`'s placement
//! depends only on `(seed, dispersion, spread, i)`. Turning the voice
//! count up or down never moves the voices that stay active.
//!
//! Both draws are uniform in `[-1, 1]` and then scaled:
//!
//! ```text
//! delay_offset_ms = jitter · max_spread_ms · dispersion
//! pan             = position · spread
//! ```
//!
//! so `dispersion = 0` collapses every offset to 0 and `spread = 0` puts
//! every voice in the center.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::dsp::MAX_VOICES;

/// Where one voice sits in time and space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoicePlacement {
    /// Offset from the base delay time, in milliseconds.
    pub delay_offset_ms: f32,
    /// Stereo position in `[-1, 1]`, 0 being center.
    pub pan: f32,
}

/// Per-voice placement table for the whole bank.
pub type PlacementTable = [VoicePlacement; MAX_VOICES];

/// Deterministic generator for voice placements.
#[derive(Debug, Clone)]
pub struct DispersionEngine {
    seed: u64,
}

impl DispersionEngine {
    pub fn new(seed: u32) -> Self {
        Self {
            seed: u64::from(seed),
        }
    }

    /// Switch to a new seed. Subsequent derivations use it.
    pub fn reseed(&mut self, seed: u32) {
        self.seed = u64::from(seed);
    }

    pub fn seed(&self) -> u32 {
        // Always constructed from a u32.
        self.seed as u32
    }

    /// The two raw draws for `voice`, each uniform in `[-1, 1]`.
    fn draws(&self, voice: usize) -> (f32, f32) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(voice as u64);

        let jitter = rng.random_range(-1.0_f32..=1.0);
        let position = rng.random_range(-1.0_f32..=1.0);
        (jitter, position)
    }

    /// Placement of a single voice.
    pub fn placement(
        &self,
        voice: usize,
        dispersion: f32,
        spread: f32,
        max_spread_ms: f32,
    ) -> VoicePlacement {
        let (jitter, position) = self.draws(voice);

        VoicePlacement {
            delay_offset_ms: jitter * max_spread_ms * dispersion,
            pan: position * spread,
        }
    }

    /// Regenerate the placement of every voice slot, active or not.
    pub fn derive_table(&self, dispersion: f32, spread: f32, max_spread_ms: f32) -> PlacementTable {
        std::array::from_fn(|voice| self.placement(voice, dispersion, spread, max_spread_ms))
    }
}
