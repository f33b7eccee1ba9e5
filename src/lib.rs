//! # Loveless Disperse: An AU/VST3/CLAP Dispersive Delay Plugin
//!
//! Up to eight delay voices, each at its own pseudo-random offset from a
//! shared base delay time and at its own place in the stereo field. Every
//! voice recirculates through a soft saturator, so even full feedback
//! stays bounded and turns a transient into a diffuse, shimmering cloud.
//! Built with [nih-plug](https://github.com/robbert-vdh/nih-plug); outputs
//! Audio Unit (AUv2), VST3, and CLAP from a single codebase.
//!
//! ## Signal Flow
//!
//! ```text
//! Input L/R ──┬──────────────────────────────────────────── × (1 - mix) ──┐
//!             │                                                           │
//!          (L + R)                                                        │
//!             │          ┌──────── per voice, ×N ─────────┐               │
//!             │          │                                │               │
//!             └─ × (1 - fb) ──►(+)──► [Saturator] ──► [Delay Line]        │
//!                          ▲         base time ± offset       │           │
//!                          └────────────── × fb ◄─────────────┤           │
//!                                                             ▼           │
//!                                                        [Pan L/R]        │
//!                                                             │           │
//!                                         Σ voices ÷ N ◄──────┘           │
//!                                              │                          │
//!                                              └──── × mix ─────────────►(+)──► Output L/R
//! ```
//!
//! The dispersion offsets and pan positions come from a seeded generator,
//! so the same seed always gives the same arrangement.

pub mod dsp;
pub mod engine;
pub mod error;
mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use dsp::StereoSample;
use engine::parameters::{EffectParameters, EngineConfig};
use engine::Effect;
use nih_plug::prelude::*;
use params::DisperseParams;

/// The main plugin struct.
///
/// `params` is shared with the host and may be read from any thread. The
/// [`Effect`] is owned by the audio thread; host parameter changes reach it
/// as whole records through [`Effect::apply_parameters`], which takes no
/// locks.
struct LovelessDisperse {
    params: Arc<DisperseParams>,

    effect: Effect,

    /// The host values the effect last accepted. `None` until the first
    /// `initialize()`.
    applied: Option<EffectParameters>,
}

impl Default for LovelessDisperse {
    fn default() -> Self {
        Self {
            params: Arc::new(DisperseParams::default()),
            effect: Effect::new(EngineConfig::default()),
            applied: None,
        }
    }
}

impl LovelessDisperse {
    /// Push the host's parameter values to the effect if they changed.
    fn sync_parameters(&mut self) {
        let requested = self.params.effect_parameters();
        if self.applied == Some(requested) {
            return;
        }

        self.effect.apply_parameters(requested);
        self.applied = Some(requested);
    }
}

impl Plugin for LovelessDisperse {
    const NAME: &'static str = "Loveless Disperse";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Voices are panned across the stereo field, so stereo comes first.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        // Mono fallback: the stereo field is folded back down.
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Blocks are split at automation points, and parameters are synced at
    // the start of each block.
    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Allocates the delay lines for the host's sample rate.
    ///
    /// The host values are committed first so the voices come up directly
    /// in their final arrangement instead of fading in from the defaults.
    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let requested = self.params.effect_parameters();
        self.effect.apply_parameters(requested);

        if let Err(err) = self
            .effect
            .initialize(buffer_config.sample_rate, requested.seed as i32)
        {
            nih_error!("Failed to initialize Loveless Disperse: {err}");
            return false;
        }

        self.applied = Some(requested);
        true
    }

    /// Called when playback stops or the plugin is bypassed. Stale echoes
    /// must not bleed into the next playback.
    fn reset(&mut self) {
        self.effect.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.sync_parameters();

        match buffer.as_slice() {
            [left, right, ..] => self.effect.process_block(left, right),
            [mono] => {
                for sample in mono.iter_mut() {
                    let output = self.effect.process(StereoSample::new(*sample, *sample));
                    *sample = 0.5 * (output.left + output.right);
                }
            }
            [] => {}
        }

        // Keep the host calling us after the input goes silent so the
        // echoes ring out. At full feedback they never do.
        match self.effect.tail_samples() {
            Some(samples) => ProcessStatus::Tail(samples),
            None => ProcessStatus::KeepAlive,
        }
    }
}

impl ClapPlugin for LovelessDisperse {
    const CLAP_ID: &'static str = "com.loveless-audio.loveless-disperse";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A multi-voice dispersive delay with saturated feedback");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for LovelessDisperse {
    // `*b"..."` turns the 16 ASCII characters into a `[u8; 16]`.
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssDisperse001";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

nih_export_clap!(LovelessDisperse);
nih_export_vst3!(LovelessDisperse);

// AUv2 entry point for Logic Pro, generated from the CLAP export.
clap_wrapper::export_auv2!();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_skips_unchanged_parameters() {
        let mut plugin = LovelessDisperse::default();
        assert_eq!(plugin.applied, None);

        plugin.sync_parameters();
        assert_eq!(plugin.applied, Some(EffectParameters::default()));
        assert_eq!(
            plugin.effect.snapshot().parameters,
            EffectParameters::default()
        );

        plugin.sync_parameters();
        assert_eq!(plugin.applied, Some(EffectParameters::default()));
    }

    #[test]
    fn test_plugin_passes_audio_before_initialize() {
        let mut plugin = LovelessDisperse::default();
        let output = plugin.effect.process(StereoSample::new(0.25, -0.5));
        assert_eq!(output, StereoSample::new(0.25, -0.5));
    }
}
