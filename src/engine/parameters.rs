//! Engine configuration and the parameter records passed between the
//! control thread and the audio thread.

use std::num::NonZeroUsize;

use crate::dsp::dispersion::{DispersionEngine, PlacementTable};
use crate::dsp::{calculate_delay_samples, MAX_VOICES};
use crate::error::EffectError;

/// Fixed limits the delay buffers are sized for.
///
/// The base delay time is restricted to
/// `[min_delay_ms, max_delay_ms - max_spread_ms]`, so base delay plus the
/// widest dispersion offset always fits inside the buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub min_delay_ms: f32,
    pub max_delay_ms: f32,
    /// Largest offset dispersion can add to or subtract from the base delay.
    pub max_spread_ms: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 50.0,
            max_delay_ms: 3000.0,
            max_spread_ms: 1000.0,
        }
    }
}

impl EngineConfig {
    /// Upper bound of the base delay time.
    pub fn max_time_ms(&self) -> f32 {
        self.max_delay_ms - self.max_spread_ms
    }

    pub fn validate(&self) -> Result<(), EffectError> {
        let finite = self.min_delay_ms.is_finite()
            && self.max_delay_ms.is_finite()
            && self.max_spread_ms.is_finite();

        if !finite
            || self.min_delay_ms <= 0.0
            || self.max_spread_ms < 0.0
            || self.max_spread_ms >= self.max_delay_ms
            || self.min_delay_ms > self.max_time_ms()
        {
            return Err(EffectError::InvalidDelayRange {
                min_delay_ms: self.min_delay_ms,
                max_delay_ms: self.max_delay_ms,
                max_spread_ms: self.max_spread_ms,
            });
        }

        Ok(())
    }

    /// Per-voice buffer length: `ceil(max_delay_ms / 1000 * sample_rate)`.
    pub fn capacity_samples(&self, sample_rate: f32) -> Result<NonZeroUsize, EffectError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EffectError::InvalidSampleRate(sample_rate));
        }
        self.validate()?;

        let capacity = calculate_delay_samples(self.max_delay_ms, sample_rate).ceil() as usize;
        match NonZeroUsize::new(capacity) {
            Some(capacity) if capacity.get() >= 2 => Ok(capacity),
            _ => Err(EffectError::CapacityTooSmall {
                capacity,
                sample_rate,
            }),
        }
    }
}

/// The user-facing parameter values last committed by the control side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParameters {
    /// Dry/wet balance, `[0, 1]`.
    pub mix: f32,
    /// Base delay time in milliseconds.
    pub time_ms: f32,
    /// Feedback amount, `[0, 1]`.
    pub feedback: f32,
    /// Stereo width of the voice field, `[0, 1]`.
    pub spread: f32,
    /// How far voice delay times stray from the base delay, `[0, 1]`.
    pub dispersion: f32,
    /// Number of active voices, `[0, MAX_VOICES]`.
    pub num_voices: usize,
    /// Dispersion seed, at least 1.
    pub seed: u32,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            mix: 0.30,
            time_ms: 600.0,
            feedback: 0.5,
            spread: 0.2,
            dispersion: 0.2,
            num_voices: 4,
            seed: 1234,
        }
    }
}

/// Clamp `value` into `[min, max]`. NaN has no nearest bound and falls
/// back to `fallback`. Unlike `f32::clamp`, an inverted range (from an
/// unvalidated config) resolves to `max` instead of panicking.
pub(crate) fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.max(min).min(max)
    }
}

pub(crate) fn clamp_voices(count: i64) -> usize {
    count.clamp(0, MAX_VOICES as i64) as usize
}

pub(crate) fn clamp_seed(seed: i64) -> u32 {
    seed.clamp(1, i64::from(u32::MAX)) as u32
}

impl EffectParameters {
    /// A copy with every field forced into its valid range.
    pub fn clamped(self, config: &EngineConfig) -> Self {
        let defaults = Self::default();
        let time_fallback = defaults
            .time_ms
            .max(config.min_delay_ms)
            .min(config.max_time_ms());

        Self {
            mix: clamp_or(self.mix, 0.0, 1.0, defaults.mix),
            time_ms: clamp_or(
                self.time_ms,
                config.min_delay_ms,
                config.max_time_ms(),
                time_fallback,
            ),
            feedback: clamp_or(self.feedback, 0.0, 1.0, defaults.feedback),
            spread: clamp_or(self.spread, 0.0, 1.0, defaults.spread),
            dispersion: clamp_or(self.dispersion, 0.0, 1.0, defaults.dispersion),
            num_voices: self.num_voices.min(MAX_VOICES),
            seed: self.seed.max(1),
        }
    }
}

/// Everything the audio thread needs to reconfigure itself, published as
/// one unit: the parameters plus the placement table derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub parameters: EffectParameters,
    pub placements: PlacementTable,
}

impl Snapshot {
    /// Clamp `parameters` and derive their placement table. Bounded work,
    /// no allocation.
    pub fn derive(parameters: EffectParameters, config: &EngineConfig) -> Self {
        let parameters = parameters.clamped(config);
        Self {
            parameters,
            placements: DispersionEngine::new(parameters.seed).derive_table(
                parameters.dispersion,
                parameters.spread,
                config.max_spread_ms,
            ),
        }
    }
}
