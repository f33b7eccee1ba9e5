//! # Feedback Network
//!
//! Runs every audible voice for one sample: read, pan, saturate, write
//! back. Per voice `i`:
//!
//! ```text
//! delayed_i  = line_i.read(delay_samples_i)
//! wet.left  += delayed_i · pan_left_i  · gain_i
//! wet.right += delayed_i · pan_right_i · gain_i
//! line_i.write(shape(input_mono · (1 − feedback) + delayed_i · feedback))
//! ```
//!
//! and the wet pair is divided by `max(1, Σ gain_i)`. Once fades settle
//! that sum is `num_voices`, so the level stays roughly constant as voices
//! come and go. While voices fade in or out the divisor follows their
//! gains, so the wet pair never exceeds the loudest line.
//!
//! Silent voices skip the read and the mix but still take in the input
//! share, `shape(input_mono · (1 − feedback))`. Their lines hold recent
//! material instead of whatever was there when they went quiet.
//!
//! Because everything written back passes through
//! [`shape`](crate::dsp::saturation::shape), the stored level never
//! exceeds the saturation ceiling, even at `feedback = 1.0`. At that
//! setting the loop sustains indefinitely instead of decaying.

use crate::dsp::saturation::shape;
use crate::dsp::voice_bank::VoiceBank;
use crate::dsp::StereoSample;

#[derive(Debug, Clone, Default)]
pub struct FeedbackNetwork {
    /// Share of each voice's delayed output fed back into its line, in
    /// `[0, 1]`.
    feedback: f32,
}

impl FeedbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 1.0);
    }

    /// Run one sample through every voice and return the normalized wet
    /// signal.
    #[inline]
    pub fn process(&self, bank: &mut VoiceBank, input_mono: f32) -> StereoSample {
        let fade_step = bank.fade_step();
        let dry_share = 1.0 - self.feedback;
        let incoming = shape(input_mono * dry_share);

        let mut wet = StereoSample::default();
        let mut total_gain = 0.0_f32;
        for voice in bank.voices_mut().iter_mut() {
            if !voice.is_audible() {
                voice.write(incoming);
                continue;
            }

            let delayed = voice.read();
            let gain = voice.step_gain(fade_step);
            total_gain += gain;

            wet.left += delayed * voice.pan_left() * gain;
            wet.right += delayed * voice.pan_right() * gain;

            voice.write(shape(input_mono * dry_share + delayed * self.feedback));
        }

        wet.scale(1.0 / total_gain.max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::dsp::dispersion::{PlacementTable, VoicePlacement};
    use crate::dsp::saturation::CEILING;
    use crate::dsp::voice_bank::Transition;
    use crate::dsp::MAX_VOICES;

    const SAMPLE_RATE: f32 = 1_000.0;

    /// A bank at 1 kHz so milliseconds equal samples.
    fn bank(num_voices: usize, base_delay_ms: f32, placements: &PlacementTable) -> VoiceBank {
        let mut bank = VoiceBank::new();
        bank.allocate(NonZeroUsize::new(256).unwrap(), 1.0, SAMPLE_RATE);
        bank.configure(
            base_delay_ms,
            num_voices,
            placements,
            SAMPLE_RATE,
            Transition::Immediate,
        );
        bank
    }

    fn centered() -> PlacementTable {
        [VoicePlacement::default(); MAX_VOICES]
    }

    #[test]
    fn test_single_voice_pure_delay() {
        let mut bank = bank(1, 10.0, &centered());
        let network = FeedbackNetwork::new();

        let first = network.process(&mut bank, 0.4);
        assert_eq!(first, StereoSample::default());

        for _ in 1..10 {
            network.process(&mut bank, 0.0);
        }

        let echo = network.process(&mut bank, 0.0);
        assert!((echo.left - 0.2).abs() < 1e-6);
        assert!((echo.right - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_feedback_repeats_decay() {
        let mut bank = bank(1, 10.0, &centered());
        let mut network = FeedbackNetwork::new();
        network.set_feedback(0.5);

        network.process(&mut bank, 0.4);
        let mut echoes = Vec::new();
        for n in 1..=30 {
            let out = network.process(&mut bank, 0.0);
            if n % 10 == 0 {
                echoes.push(out.left);
            }
        }

        // Input enters at (1 - feedback), each pass halves it.
        assert!((echoes[0] - 0.1).abs() < 1e-6);
        assert!((echoes[1] - 0.05).abs() < 1e-6);
        assert!((echoes[2] - 0.025).abs() < 1e-6);
    }

    /// At full feedback the input no longer enters, but whatever is
    /// already circulating keeps going without growing.
    #[test]
    fn test_full_feedback_sustains_within_ceiling() {
        let mut bank = bank(2, 5.0, &centered());
        let mut network = FeedbackNetwork::new();
        network.set_feedback(0.5);

        for _ in 0..20 {
            network.process(&mut bank, 2.0);
        }

        network.set_feedback(1.0);
        let mut last = StereoSample::default();
        for _ in 0..2_000 {
            last = network.process(&mut bank, 0.0);
            assert!(last.left.abs() <= CEILING && last.right.abs() <= CEILING);
        }
        assert!(last.left.abs() > 0.0 || last.right.abs() > 0.0);
    }

    #[test]
    fn test_wet_normalized_by_voice_count() {
        let mut bank = bank(4, 3.0, &centered());
        let network = FeedbackNetwork::new();

        network.process(&mut bank, 0.4);
        network.process(&mut bank, 0.0);
        network.process(&mut bank, 0.0);
        let out = network.process(&mut bank, 0.0);

        // Four identical voices divided by four: same as a single voice.
        assert!((out.left - 0.2).abs() < 1e-6);
    }

    /// Voices leaving the mix are divided by their own fading gain, not
    /// by the new, smaller voice count.
    #[test]
    fn test_dropping_voices_keeps_level_under_ceiling() {
        let mut bank = bank(MAX_VOICES, 5.0, &centered());
        let mut network = FeedbackNetwork::new();
        network.set_feedback(0.5);
        for _ in 0..50 {
            network.process(&mut bank, 2.0);
        }

        network.set_feedback(1.0);
        bank.configure(5.0, 1, &centered(), SAMPLE_RATE, Transition::Fade);
        for n in 0..200 {
            let out = network.process(&mut bank, 0.0);
            assert!(
                out.left.abs() <= CEILING && out.right.abs() <= CEILING,
                "sample {n}: {out:?}"
            );
        }
    }

    #[test]
    fn test_reenabled_voice_holds_no_stale_audio() {
        let mut bank = bank(2, 10.0, &centered());
        let network = FeedbackNetwork::new();
        for _ in 0..20 {
            network.process(&mut bank, 0.25);
        }

        bank.configure(10.0, 1, &centered(), SAMPLE_RATE, Transition::Fade);
        for _ in 0..300 {
            network.process(&mut bank, 0.0);
        }
        assert!(!bank.voices()[1].is_audible());

        bank.configure(10.0, 2, &centered(), SAMPLE_RATE, Transition::Fade);
        for n in 0..50 {
            let out = network.process(&mut bank, 0.0);
            assert_eq!(out, StereoSample::default(), "sample {n}");
        }
    }

    #[test]
    fn test_silent_voice_tracks_input() {
        let mut bank = bank(1, 10.0, &centered());
        let network = FeedbackNetwork::new();

        network.process(&mut bank, 0.4);
        bank.configure(10.0, 2, &centered(), SAMPLE_RATE, Transition::Immediate);
        for _ in 1..10 {
            network.process(&mut bank, 0.0);
        }

        // Voice 1 was out of the mix when the impulse arrived but recorded
        // it anyway, so both voices echo it together.
        let echo = network.process(&mut bank, 0.0);
        assert!((echo.left - 0.2).abs() < 1e-6, "{echo:?}");
        assert!((echo.right - 0.2).abs() < 1e-6, "{echo:?}");
    }

    #[test]
    fn test_non_finite_input_never_reaches_lines() {
        let mut bank = bank(1, 2.0, &centered());
        let mut network = FeedbackNetwork::new();
        network.set_feedback(0.5);

        network.process(&mut bank, f32::NAN);
        network.process(&mut bank, f32::INFINITY);
        for _ in 0..10 {
            let out = network.process(&mut bank, 0.0);
            assert!(out.left.is_finite() && out.right.is_finite());
        }
    }

    #[test]
    fn test_panned_voice() {
        let mut placements = centered();
        placements[0].pan = 1.0;
        let mut bank = bank(1, 1.0, &placements);
        let network = FeedbackNetwork::new();

        network.process(&mut bank, 0.4);
        let out = network.process(&mut bank, 0.0);
        assert_eq!(out.left, 0.0);
        assert!((out.right - 0.4).abs() < 1e-6);
    }
}
