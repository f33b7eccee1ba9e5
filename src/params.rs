//! # Plugin Parameters
//!
//! The knobs the host sees. Each has a stable string ID (`#[id = "..."]`)
//! that presets and automation lanes are saved against, so once published
//! the IDs must never change.
//!
//! These are plain host-facing values. The plugin reads them at the start
//! of every block and forwards any change to the engine as one whole
//! [`EffectParameters`] record; the engine does its own clamping and
//! derives the per-voice table from it.

use nih_plug::prelude::*;

use crate::dsp::MAX_VOICES;
use crate::engine::parameters::{EffectParameters, EngineConfig};

/// Largest seed the host exposes.
pub const MAX_SEED: i32 = 100_000;

#[derive(Params)]
pub struct DisperseParams {
    /// **Mix**: dry/wet balance. 0% is the untouched input, 100% is only
    /// the echo field.
    #[id = "mix"]
    pub mix: FloatParam,

    /// **Delay Time**: the base delay every voice is dispersed around.
    ///
    /// The upper end stops short of the buffer length by the maximum
    /// dispersion offset, so a fully dispersed voice still fits.
    #[id = "time"]
    pub time: FloatParam,

    /// **Feedback**: how much of each voice recirculates. At 100% the
    /// echoes sustain indefinitely, held in check by the saturator.
    #[id = "fdbk"]
    pub feedback: FloatParam,

    /// **Stereo Spread**: how far voices are scattered from center.
    #[id = "sprd"]
    pub spread: FloatParam,

    /// **Dispersion**: how far voice delay times stray from the base delay.
    #[id = "disp"]
    pub dispersion: FloatParam,

    /// **Voices**: number of active delay voices. 0 leaves only the dry
    /// signal (scaled by `1 - mix`).
    #[id = "vcs"]
    pub voices: IntParam,

    /// **Random Seed**: picks a different (but repeatable) scatter of
    /// voice times and positions.
    #[id = "seed"]
    pub seed: IntParam,
}

impl Default for DisperseParams {
    fn default() -> Self {
        let config = EngineConfig::default();
        let defaults = EffectParameters::default();

        Self {
            mix: FloatParam::new("Mix", defaults.mix, FloatRange::Linear { min: 0.0, max: 1.0 })
                .with_unit("%")
                .with_value_to_string(formatters::v2s_f32_percentage(1))
                .with_string_to_value(formatters::s2v_f32_percentage()),

            time: FloatParam::new(
                "Delay Time",
                defaults.time_ms,
                FloatRange::Skewed {
                    min: config.min_delay_ms,
                    max: config.max_time_ms(),
                    // More knob travel for short delays.
                    factor: FloatRange::skew_factor(-1.0),
                },
            )
            .with_unit(" ms")
            .with_step_size(0.1),

            feedback: FloatParam::new(
                "Feedback",
                defaults.feedback,
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage()),

            spread: FloatParam::new(
                "Stereo Spread",
                defaults.spread,
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage()),

            dispersion: FloatParam::new(
                "Dispersion",
                defaults.dispersion,
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_unit("%")
            .with_value_to_string(formatters::v2s_f32_percentage(1))
            .with_string_to_value(formatters::s2v_f32_percentage()),

            voices: IntParam::new(
                "Voices",
                defaults.num_voices as i32,
                IntRange::Linear {
                    min: 0,
                    max: MAX_VOICES as i32,
                },
            ),

            seed: IntParam::new(
                "Random Seed",
                defaults.seed as i32,
                IntRange::Linear {
                    min: 1,
                    max: MAX_SEED,
                },
            ),
        }
    }
}

impl DisperseParams {
    /// The current host values as one engine record.
    pub fn effect_parameters(&self) -> EffectParameters {
        EffectParameters {
            mix: self.mix.value(),
            time_ms: self.time.value(),
            feedback: self.feedback.value(),
            spread: self.spread.value(),
            dispersion: self.dispersion.value(),
            num_voices: self.voices.value().clamp(0, MAX_VOICES as i32) as usize,
            seed: self.seed.value().clamp(1, MAX_SEED) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let params = DisperseParams::default();
        assert_eq!(params.effect_parameters(), EffectParameters::default());
    }

    #[test]
    fn test_time_range_leaves_room_for_spread() {
        let params = DisperseParams::default();
        let config = EngineConfig::default();

        let max_time = params.time.preview_plain(1.0);
        let min_time = params.time.preview_plain(0.0);
        assert_eq!(min_time, config.min_delay_ms);
        assert!(max_time + config.max_spread_ms <= config.max_delay_ms);
    }
}
