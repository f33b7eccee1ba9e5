//! # The Dispersion Engine
//!
//! [`Effect`] ties the DSP primitives together and is the only thing the
//! plugin shell processes audio through.
//!
//! ## Threads
//!
//! ```text
//!  control thread(s)                        audio thread
//!  ─────────────────                        ────────────
//!  EffectControl::set_*()                   Effect::process()
//!    clamp, re-derive table                   refresh() ── new snapshot? ──► reconfigure voices
//!    publish(Snapshot) ──► [exchange] ──►     feedback network, dry/wet mix
//! ```
//!
//! Control threads never touch the voice bank, and the audio thread never
//! takes a lock: it picks up whole [`Snapshot`]s through a lock-free
//! exchange, at most once per sample. Code already running on the audio
//! thread (a plugin's `process()` reading host parameters) skips the
//! exchange and hands its record straight to [`Effect::apply_parameters`].
//! Whichever of the two lands last wins for the whole record.
//!
//! [`Effect::initialize`] is the exception. It reallocates the delay lines,
//! may lock the control side, and must not run while `process()` can be
//! called.
//!
//! ## Per Sample
//!
//! ```text
//! wet    = feedback_network(voices, input.left + input.right)
//! output = dry · (1 − mix) + wet · mix
//! ```
//!
//! ## Headroom
//!
//! Everything written into a delay line is shaped, and the shaper is the
//! identity only up to its knee (0.6). The wet path is a clean delay only
//! while `|input.left + input.right| · (1 − feedback)` stays at or below
//! that; a full-scale centered input (0.5 per channel or more) comes back
//! compressed.

pub mod control;
pub mod exchange;
pub mod parameters;

use nih_plug::{nih_debug_assert_eq, nih_log};

use crate::dsp::feedback::FeedbackNetwork;
use crate::dsp::voice_bank::{Transition, VoiceBank};
use crate::dsp::{StereoSample, MAX_VOICES};
use crate::error::EffectError;
use control::EffectControl;
use exchange::{snapshot_exchange, SnapshotReader};
use parameters::{clamp_seed, EffectParameters, EngineConfig, Snapshot};

#[inline]
fn finite_or_zero(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

/// The dispersive delay effect.
pub struct Effect {
    config: EngineConfig,
    sample_rate: f32,
    bank: VoiceBank,
    network: FeedbackNetwork,
    reader: SnapshotReader<Snapshot>,
    /// The snapshot the voices are currently configured from.
    current: Snapshot,
    control: EffectControl,
    initialized: bool,
}

impl Effect {
    /// A new effect with default parameters. Call
    /// [`Effect::initialize`] before processing.
    pub fn new(config: EngineConfig) -> Self {
        let parameters = EffectParameters::default();
        let initial = Snapshot::derive(parameters, &config);
        let (writer, reader) = snapshot_exchange(initial);

        Self {
            config,
            sample_rate: 0.0,
            bank: VoiceBank::new(),
            network: FeedbackNetwork::new(),
            reader,
            current: initial,
            control: EffectControl::new(config, parameters, writer),
            initialized: false,
        }
    }

    /// Allocate silent delay lines for `sample_rate` and set the
    /// dispersion seed.
    ///
    /// The voices come up on the latest record from either side, with
    /// `seed` swapped in, and the control handle is brought in line with
    /// it. Must not run concurrently with [`Effect::process`]. On error the
    /// effect keeps its previous state.
    pub fn initialize(&mut self, sample_rate: f32, seed: i32) -> Result<(), EffectError> {
        let capacity = self.config.capacity_samples(sample_rate)?;

        self.bank.allocate(capacity, self.config.min_delay_ms, sample_rate);
        self.sample_rate = sample_rate;

        self.take_published();
        let parameters = EffectParameters {
            seed: clamp_seed(i64::from(seed)),
            ..self.current.parameters
        };
        let snapshot = Snapshot::derive(parameters, &self.config);
        self.control.apply(snapshot.parameters);
        self.reader.refresh();

        self.install(&snapshot, Transition::Immediate);
        self.initialized = true;

        nih_log!(
            "Allocated {} voices of {} samples at {} Hz",
            MAX_VOICES,
            capacity,
            sample_rate
        );
        Ok(())
    }

    /// Pick up a pending control-side snapshot, if any.
    #[inline]
    fn take_published(&mut self) {
        if self.reader.refresh() {
            let snapshot = *self.reader.current();
            self.install(&snapshot, Transition::Fade);
        }
    }

    fn install(&mut self, snapshot: &Snapshot, transition: Transition) {
        let parameters = snapshot.parameters;
        self.bank.configure(
            parameters.time_ms,
            parameters.num_voices,
            &snapshot.placements,
            self.sample_rate,
            transition,
        );
        self.network.set_feedback(parameters.feedback);
        self.current = *snapshot;
    }

    /// Process one stereo frame. Never allocates, locks or fails, and
    /// always returns finite samples.
    #[inline]
    pub fn process(&mut self, input: StereoSample) -> StereoSample {
        let dry = StereoSample::new(finite_or_zero(input.left), finite_or_zero(input.right));
        if !self.initialized {
            return dry;
        }

        self.take_published();

        let wet = self.network.process(&mut self.bank, input.mono_sum());
        let mix = self.current.parameters.mix;

        StereoSample::new(
            dry.left * (1.0 - mix) + wet.left * mix,
            dry.right * (1.0 - mix) + wet.right * mix,
        )
    }

    /// Install a whole parameter record from the audio thread.
    ///
    /// Clamps, derives the placement table and reconfigures the voices in
    /// place without touching the control handle's lock. Voices fade to the
    /// new count just as with a published change. Any snapshot published
    /// before this call is superseded. The control handle's own record is
    /// left as it was, so its next setter call replaces this record in
    /// turn.
    ///
    /// Before [`Effect::initialize`] the record is kept and the voices come
    /// up on it.
    pub fn apply_parameters(&mut self, parameters: EffectParameters) {
        self.take_published();

        let parameters = parameters.clamped(&self.config);
        if parameters == self.current.parameters {
            return;
        }

        let snapshot = Snapshot::derive(parameters, &self.config);
        self.install(&snapshot, Transition::Fade);
    }

    /// Process two equal-length channels in place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        nih_debug_assert_eq!(left.len(), right.len());

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let output = self.process(StereoSample::new(*l, *r));
            *l = output.left;
            *r = output.right;
        }
    }

    /// Silence every delay line. Keeps the allocation and parameters.
    pub fn reset(&mut self) {
        self.bank.clear();
    }

    /// How many samples the echoes keep ringing after the input stops,
    /// or `None` if they never stop (`feedback = 1`).
    ///
    /// Each repeat is scaled by `feedback`, so the level after `N` repeats
    /// is `feedback^N`. Solving `feedback^N = 0.001` (-60 dB) gives
    /// `N = -3 / log10(feedback)` repeats of the longest delay still in
    /// the mix, counting voices that are fading out.
    pub fn tail_samples(&self) -> Option<u32> {
        let feedback = self.current.parameters.feedback;
        if feedback >= 1.0 {
            return None;
        }

        let longest = self.bank.longest_audible_delay();
        let samples = if feedback > 0.001 {
            let repeats = -3.0 / feedback.log10();
            repeats * longest
        } else {
            longest
        };

        Some(samples.ceil() as u32)
    }

    /// A handle for changing parameters from other threads.
    pub fn control(&self) -> EffectControl {
        self.control.clone()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The snapshot the audio path is currently running on. Lags the
    /// control side until the next `process()` call picks up changes.
    pub fn snapshot(&self) -> &Snapshot {
        &self.current
    }

    pub fn voice_bank(&self) -> &VoiceBank {
        &self.bank
    }

    pub fn set_mix(&self, mix: f32) {
        self.control.set_mix(mix);
    }

    pub fn set_time_ms(&self, time_ms: f32) {
        self.control.set_time_ms(time_ms);
    }

    pub fn set_feedback(&self, feedback: f32) {
        self.control.set_feedback(feedback);
    }

    pub fn set_spread(&self, spread: f32) {
        self.control.set_spread(spread);
    }

    pub fn set_dispersion(&self, dispersion: f32) {
        self.control.set_dispersion(dispersion);
    }

    pub fn set_voice_arrangement(&self, count: i32) {
        self.control.set_voice_arrangement(count);
    }

    pub fn set_random_seed(&self, seed: i32) {
        self.control.set_random_seed(seed);
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
