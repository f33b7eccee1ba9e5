//! # Voice Bank
//!
//! Eight identical delay voices stored inline in a fixed array and
//! addressed by index. The bank is allocated once per sample rate and
//! reconfigured in place whenever a new parameter snapshot arrives.
//!
//! ## Per-voice Parameters
//!
//! ```text
//! requested     = (base_delay_ms + delay_offset_ms) · sample_rate / 1000
//! delay_samples = requested                    requested ≥ floor
//!                 2 · floor − requested        otherwise
//!                 then clamped to [1, capacity − 1]
//! pan_left      = (1 − pan) / 2
//! pan_right     = (1 + pan) / 2
//! ```
//!
//! `floor` is the minimum delay time. A negative offset that would reach
//! below it is mirrored back above it, so voices keep distinct delays even
//! at the shortest base time instead of piling up on the floor. The clamp
//! is the only place delay requests are range-checked; the delay line's
//! read path trusts it. The pan law is linear, so a centered voice
//! contributes half of its level to each side and the two sides sum back
//! to the original.
//!
//! ## Fades
//!
//! Only the first `num_voices` slots are active. Each voice carries a
//! gain that ramps toward 1 when active and toward 0 when not, so a
//! voice joining or leaving mid-stream fades over [`FADE_MS`] instead
//! of clicking. A voice that is inactive and fully faded out is left out
//! of the mix, but its line keeps taking in the input so it holds current
//! material when it is switched back on.

use std::num::NonZeroUsize;

use crate::dsp::delay_line::DelayLine;
use crate::dsp::dispersion::PlacementTable;
use crate::dsp::{calculate_delay_samples, MAX_VOICES};

/// Length of a voice's fade in or out.
pub const FADE_MS: f32 = 10.0;

/// How gains move when the bank is reconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Ramp gains over [`FADE_MS`].
    Fade,
    /// Jump straight to the target gains. Used right after allocation,
    /// when every buffer is silent anyway.
    Immediate,
}

/// One delay path: its line plus the parameters derived for it.
#[derive(Debug, Clone)]
pub struct Voice {
    line: DelayLine,
    delay_samples: f32,
    pan_left: f32,
    pan_right: f32,
    gain: f32,
    active: bool,
}

impl Voice {
    fn new() -> Self {
        Self {
            line: DelayLine::new(NonZeroUsize::MIN),
            delay_samples: 0.0,
            pan_left: 0.5,
            pan_right: 0.5,
            gain: 0.0,
            active: false,
        }
    }

    pub fn delay_samples(&self) -> f32 {
        self.delay_samples
    }

    pub fn pan_left(&self) -> f32 {
        self.pan_left
    }

    pub fn pan_right(&self) -> f32 {
        self.pan_right
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether this voice still contributes to the mix.
    #[inline]
    pub fn is_audible(&self) -> bool {
        self.active || self.gain > 0.0
    }

    /// Read this voice's delayed sample.
    #[inline]
    pub fn read(&self) -> f32 {
        self.line.read(self.delay_samples)
    }

    /// Push the next sample into this voice's line.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.line.write(sample);
    }

    /// Move the gain one step toward its target and return the new value.
    #[inline]
    pub fn step_gain(&mut self, step: f32) -> f32 {
        self.gain = if self.active {
            (self.gain + step).min(1.0)
        } else {
            (self.gain - step).max(0.0)
        };
        self.gain
    }
}

/// Fixed-capacity arena of [`MAX_VOICES`] voices.
#[derive(Debug, Clone)]
pub struct VoiceBank {
    voices: [Voice; MAX_VOICES],
    active_count: usize,
    /// Per-voice buffer length in samples; 0 until allocated.
    capacity: usize,
    /// Shortest delay a voice may run at, in samples.
    min_delay_samples: f32,
    /// Gain change per sample during a fade.
    fade_step: f32,
}

impl Default for VoiceBank {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceBank {
    /// An unallocated bank. Every line holds a single silent sample until
    /// [`VoiceBank::allocate`] runs.
    pub fn new() -> Self {
        Self {
            voices: std::array::from_fn(|_| Voice::new()),
            active_count: 0,
            capacity: 0,
            min_delay_samples: 0.0,
            fade_step: 1.0,
        }
    }

    /// Resize every line to `capacity` samples of silence. Setup path only.
    pub fn allocate(&mut self, capacity: NonZeroUsize, min_delay_ms: f32, sample_rate: f32) {
        for voice in &mut self.voices {
            voice.line.resize(capacity);
        }
        self.capacity = capacity.get();
        self.min_delay_samples = calculate_delay_samples(min_delay_ms, sample_rate).max(0.0);
        self.fade_step = 1.0 / calculate_delay_samples(FADE_MS, sample_rate).max(1.0);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn fade_step(&self) -> f32 {
        self.fade_step
    }

    pub fn voices(&self) -> &[Voice; MAX_VOICES] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Voice; MAX_VOICES] {
        &mut self.voices
    }

    /// Apply a new base delay, voice count and placement table.
    ///
    /// Runs in O([`MAX_VOICES`]) without allocating, so it is safe to call
    /// from the audio thread when a snapshot lands.
    pub fn configure(
        &mut self,
        base_delay_ms: f32,
        num_voices: usize,
        placements: &PlacementTable,
        sample_rate: f32,
        transition: Transition,
    ) {
        let num_voices = num_voices.min(MAX_VOICES);
        let max_delay_samples = self.capacity.saturating_sub(1).max(1) as f32;
        let floor = self.min_delay_samples;

        for (index, (voice, placement)) in self.voices.iter_mut().zip(placements).enumerate() {
            let requested =
                calculate_delay_samples(base_delay_ms + placement.delay_offset_ms, sample_rate);
            let mirrored = if requested < floor {
                2.0 * floor - requested
            } else {
                requested
            };
            voice.delay_samples = mirrored.clamp(1.0, max_delay_samples);
            voice.pan_left = 0.5 * (1.0 - placement.pan);
            voice.pan_right = 0.5 * (1.0 + placement.pan);
            voice.active = index < num_voices;

            if transition == Transition::Immediate {
                voice.gain = if voice.active { 1.0 } else { 0.0 };
            }
        }

        self.active_count = num_voices;
    }

    /// Silence every line without reallocating.
    pub fn clear(&mut self) {
        for voice in &mut self.voices {
            voice.line.clear();
        }
    }

    /// The longest delay among voices still in the mix, including any
    /// that are fading out, in samples.
    pub fn longest_audible_delay(&self) -> f32 {
        self.voices
            .iter()
            .filter(|v| v.is_audible())
            .map(|v| v.delay_samples)
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::dispersion::VoicePlacement;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn allocated_bank(capacity: usize) -> VoiceBank {
        let mut bank = VoiceBank::new();
        bank.allocate(NonZeroUsize::new(capacity).unwrap(), 0.0, SAMPLE_RATE);
        bank
    }

    fn table(offset_ms: f32, pan: f32) -> PlacementTable {
        [VoicePlacement {
            delay_offset_ms: offset_ms,
            pan,
        }; MAX_VOICES]
    }

    #[test]
    fn test_first_voices_are_active() {
        let mut bank = allocated_bank(48_000);
        bank.configure(100.0, 3, &table(0.0, 0.0), SAMPLE_RATE, Transition::Immediate);

        assert_eq!(bank.active_count(), 3);
        for (i, voice) in bank.voices().iter().enumerate() {
            assert_eq!(voice.is_active(), i < 3);
            assert_eq!(voice.gain(), if i < 3 { 1.0 } else { 0.0 });
        }
    }

    #[test]
    fn test_delay_converted_to_samples() {
        let mut bank = allocated_bank(48_000);
        bank.configure(100.0, 1, &table(-25.0, 0.0), SAMPLE_RATE, Transition::Immediate);
        assert_eq!(bank.voices()[0].delay_samples(), 3600.0);
    }

    #[test]
    fn test_delay_clamped_to_capacity() {
        let mut bank = allocated_bank(1_000);

        bank.configure(500.0, 1, &table(0.0, 0.0), SAMPLE_RATE, Transition::Immediate);
        assert_eq!(bank.voices()[0].delay_samples(), 999.0);

        // Sub-sample delays never read the slot being written.
        bank.configure(0.01, 1, &table(0.0, 0.0), SAMPLE_RATE, Transition::Immediate);
        assert_eq!(bank.voices()[0].delay_samples(), 1.0);
    }

    #[test]
    fn test_center_pan_splits_evenly() {
        let mut bank = allocated_bank(100);
        bank.configure(1.0, 8, &table(0.0, 0.0), SAMPLE_RATE, Transition::Immediate);
        for voice in bank.voices() {
            assert_eq!(voice.pan_left(), 0.5);
            assert_eq!(voice.pan_right(), 0.5);
        }
    }

    #[test]
    fn test_hard_pans() {
        let mut bank = allocated_bank(100);

        bank.configure(1.0, 1, &table(0.0, -1.0), SAMPLE_RATE, Transition::Immediate);
        assert_eq!(bank.voices()[0].pan_left(), 1.0);
        assert_eq!(bank.voices()[0].pan_right(), 0.0);

        bank.configure(1.0, 1, &table(0.0, 1.0), SAMPLE_RATE, Transition::Immediate);
        assert_eq!(bank.voices()[0].pan_left(), 0.0);
        assert_eq!(bank.voices()[0].pan_right(), 1.0);
    }

    #[test]
    fn test_fade_in_and_out() {
        let mut bank = allocated_bank(48_000);
        bank.configure(100.0, 1, &table(0.0, 0.0), SAMPLE_RATE, Transition::Immediate);
        bank.configure(100.0, 2, &table(0.0, 0.0), SAMPLE_RATE, Transition::Fade);

        let step = bank.fade_step();
        let fade_len = calculate_delay_samples(FADE_MS, SAMPLE_RATE) as usize;
        let voice = &mut bank.voices_mut()[1];
        assert!(voice.is_audible());
        assert_eq!(voice.gain(), 0.0);

        voice.step_gain(step);
        assert!(voice.gain() > 0.0 && voice.gain() < 1.0);
        for _ in 0..fade_len {
            voice.step_gain(step);
        }
        assert_eq!(voice.gain(), 1.0);

        bank.configure(100.0, 1, &table(0.0, 0.0), SAMPLE_RATE, Transition::Fade);
        let voice = &mut bank.voices_mut()[1];
        assert!(voice.is_audible(), "still fading out");
        for _ in 0..=fade_len {
            voice.step_gain(step);
        }
        assert_eq!(voice.gain(), 0.0);
        assert!(!voice.is_audible());
    }

    #[test]
    fn test_longest_audible_delay_ignores_silent_voices() {
        let mut bank = allocated_bank(48_000);
        let mut placements = table(0.0, 0.0);
        placements[5].delay_offset_ms = 200.0;
        placements[1].delay_offset_ms = 50.0;

        bank.configure(100.0, 3, &placements, SAMPLE_RATE, Transition::Immediate);
        assert_eq!(bank.longest_audible_delay(), 7200.0);
    }

    #[test]
    fn test_longest_audible_delay_counts_fading_voices() {
        let mut bank = allocated_bank(48_000);
        let mut placements = table(0.0, 0.0);
        placements[2].delay_offset_ms = 300.0;

        bank.configure(100.0, 3, &placements, SAMPLE_RATE, Transition::Immediate);
        bank.configure(100.0, 1, &placements, SAMPLE_RATE, Transition::Fade);
        assert_eq!(bank.longest_audible_delay(), 19_200.0);

        let step = bank.fade_step();
        let fade_len = calculate_delay_samples(FADE_MS, SAMPLE_RATE) as usize;
        for _ in 0..=fade_len {
            for voice in bank.voices_mut().iter_mut() {
                voice.step_gain(step);
            }
        }
        assert_eq!(bank.longest_audible_delay(), 4800.0);
    }

    #[test]
    fn test_short_delays_mirror_above_floor() {
        let mut bank = VoiceBank::new();
        bank.allocate(NonZeroUsize::new(48_000).unwrap(), 50.0, SAMPLE_RATE);

        let mut placements = table(0.0, 0.0);
        placements[0].delay_offset_ms = -20.0;
        placements[1].delay_offset_ms = -35.0;
        placements[2].delay_offset_ms = 25.0;
        bank.configure(50.0, 3, &placements, SAMPLE_RATE, Transition::Immediate);

        let delays: Vec<f32> = bank.voices()[..3].iter().map(Voice::delay_samples).collect();
        assert_eq!(delays, [3360.0, 4080.0, 3600.0]);

        // Offsets that keep the delay above the floor are left alone.
        bank.configure(100.0, 1, &placements, SAMPLE_RATE, Transition::Immediate);
        assert_eq!(bank.voices()[0].delay_samples(), 3840.0);
    }
}
