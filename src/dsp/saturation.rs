//! # Feedback Saturation
//!
//! A soft limiter that keeps the feedback network finite. Every sample
//! written back into a voice's delay line passes through [`shape`], so
//! no amount of feedback can push the stored level past [`CEILING`].
//!
//! ## The Curve
//!
//! ```text
//!          ⎧ x                                          |x| ≤ KNEE
//! f(x)  =  ⎨
//!          ⎩ sign(x) · (KNEE + H · tanh((|x| − KNEE) / H))   otherwise
//!
//! where H = CEILING − KNEE
//! ```
//!
//! Below the knee the signal passes untouched. Above it, a tanh segment
//! takes over with a slope of exactly 1 at the joint, so the curve is
//! smooth, monotonic, and odd-symmetric. The tanh segment approaches
//! `CEILING` asymptotically and never exceeds it.
//!
//! ## Non-finite Input
//!
//! `tanh(±∞) = ±1`, so infinities land on `±CEILING`. NaN maps to 0.
//! Either way nothing non-finite reaches a delay buffer.

/// Level below which the curve is the identity.
pub const KNEE: f32 = 0.6;

/// Asymptote of the curve. `|shape(x)|` never exceeds this.
pub const CEILING: f32 = 0.98;

/// Strict upper bound on the magnitude of anything the wet path can
/// produce. Sits just above [`CEILING`] so float rounding in the tanh
/// segment can never reach it.
pub const SATURATION_LIMIT: f32 = 0.99;

/// Shape one sample. Pure, allocation-free, safe for any input.
#[inline]
pub fn shape(x: f32) -> f32 {
    if x.is_nan() {
        return 0.0;
    }

    let magnitude = x.abs();
    if magnitude <= KNEE {
        return x;
    }

    let headroom = CEILING - KNEE;
    let compressed = KNEE + headroom * ((magnitude - KNEE) / headroom).tanh();
    compressed.min(CEILING).copysign(x)
}
