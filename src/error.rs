//! Errors reported by the engine's setup path.
//!
//! Nothing on the per-sample path can fail. Out-of-range parameters are
//! clamped and non-finite samples are absorbed by the saturation stage,
//! so the only errors left are configuration faults caught in
//! [`Effect::initialize`](crate::engine::Effect::initialize).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    #[error("sample rate must be finite and positive, got {0}")]
    InvalidSampleRate(f32),

    #[error(
        "delay range does not fit: min {min_delay_ms} ms, max {max_delay_ms} ms, \
         max spread {max_spread_ms} ms"
    )]
    InvalidDelayRange {
        min_delay_ms: f32,
        max_delay_ms: f32,
        max_spread_ms: f32,
    },

    #[error("delay buffer of {capacity} samples at {sample_rate} Hz is too small")]
    CapacityTooSmall { capacity: usize, sample_rate: f32 },
}
