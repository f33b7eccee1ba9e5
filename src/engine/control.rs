//! Control-side parameter handling.
//!
//! [`EffectControl`] is what the host, the UI, or an automation thread
//! talks to. Each setter clamps its value, updates the committed
//! [`EffectParameters`], re-derives the placement table when the value
//! feeds into it, and publishes a complete [`Snapshot`] for the audio
//! thread to pick up.
//!
//! Writers are serialized by a mutex that only control threads ever
//! lock. The audio thread reads published snapshots through its own
//! lock-free [`SnapshotReader`](super::exchange::SnapshotReader). Code
//! that itself runs on the audio thread does not come through here; it
//! hands records to [`Effect::apply_parameters`](super::Effect::apply_parameters).
//!
//! Changing the seed or dispersion regenerates the whole table at once.
//! Active voices jump to their new delay times on the next sample, which
//! can be heard as a short discontinuity. That artifact is accepted; the
//! engine does not crossfade between tables.

use std::sync::Arc;

use parking_lot::Mutex;

use super::exchange::SnapshotWriter;
use super::parameters::{
    clamp_or, clamp_seed, clamp_voices, EffectParameters, EngineConfig, Snapshot,
};
use crate::dsp::dispersion::DispersionEngine;

struct ControlState {
    config: EngineConfig,
    committed: EffectParameters,
    dispersion: DispersionEngine,
    writer: SnapshotWriter<Snapshot>,
}

impl ControlState {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            parameters: self.committed,
            placements: self.dispersion.derive_table(
                self.committed.dispersion,
                self.committed.spread,
                self.config.max_spread_ms,
            ),
        }
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.writer.publish(snapshot);
    }

    /// Replace the committed record and publish it, unless nothing changed.
    fn commit(&mut self, parameters: EffectParameters) {
        let parameters = parameters.clamped(&self.config);
        if parameters == self.committed {
            return;
        }

        self.dispersion.reseed(parameters.seed);
        self.committed = parameters;
        self.publish();
    }
}

/// Handle for changing effect parameters from any thread.
///
/// Cheap to clone; all clones drive the same effect.
#[derive(Clone)]
pub struct EffectControl {
    state: Arc<Mutex<ControlState>>,
}

impl EffectControl {
    /// Build the control side around `writer` and publish the initial
    /// snapshot for `parameters`.
    pub(crate) fn new(
        config: EngineConfig,
        parameters: EffectParameters,
        writer: SnapshotWriter<Snapshot>,
    ) -> Self {
        let committed = parameters.clamped(&config);
        let mut state = ControlState {
            config,
            committed,
            dispersion: DispersionEngine::new(committed.seed),
            writer,
        };
        state.publish();

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// The values last committed, after clamping.
    pub fn parameters(&self) -> EffectParameters {
        self.state.lock().committed
    }

    fn update(&self, change: impl FnOnce(&mut EffectParameters)) {
        let mut state = self.state.lock();
        let mut parameters = state.committed;
        change(&mut parameters);
        state.commit(parameters);
    }

    /// Replace every parameter in one publish.
    pub fn apply(&self, parameters: EffectParameters) {
        self.state.lock().commit(parameters);
    }

    pub fn set_mix(&self, mix: f32) {
        self.update(|p| p.mix = clamp_or(mix, 0.0, 1.0, p.mix));
    }

    /// Base delay time, clamped to `[min_delay_ms, max_delay_ms - max_spread_ms]`.
    pub fn set_time_ms(&self, time_ms: f32) {
        self.update(|p| p.time_ms = if time_ms.is_nan() { p.time_ms } else { time_ms });
    }

    pub fn set_feedback(&self, feedback: f32) {
        self.update(|p| p.feedback = clamp_or(feedback, 0.0, 1.0, p.feedback));
    }

    pub fn set_spread(&self, spread: f32) {
        self.update(|p| p.spread = clamp_or(spread, 0.0, 1.0, p.spread));
    }

    pub fn set_dispersion(&self, dispersion: f32) {
        self.update(|p| p.dispersion = clamp_or(dispersion, 0.0, 1.0, p.dispersion));
    }

    /// Number of active voices, clamped to `[0, 8]`.
    pub fn set_voice_arrangement(&self, count: i32) {
        self.update(|p| p.num_voices = clamp_voices(i64::from(count)));
    }

    /// Dispersion seed, clamped to at least 1.
    pub fn set_random_seed(&self, seed: i32) {
        self.update(|p| p.seed = clamp_seed(i64::from(seed)));
    }
}
