//! # Delay Line (Ring Buffer)
//!
//! Every voice in the disperser owns one of these. A delay line stores
//! past samples and lets you read them back after a (possibly fractional)
//! number of samples.
//!
//! ## Cursor Semantics
//!
//! The write cursor always points at the slot the *next* sample will
//! occupy. `write()` stores into that slot and advances the cursor, so
//! reading `N` samples back from the cursor returns the sample written
//! `N` calls ago:
//!
//! ```text
//! read_index = (cursor + capacity - N) % capacity
//! ```
//!
//! A voice reads first and writes second on every sample, which means a
//! delay of `N` samples returns what was written exactly `N` samples
//! earlier.
//!
//! ## Linear Interpolation
//!
//! Dispersed delay times are rarely whole numbers of samples, so reads
//! blend the two bracketing slots:
//!
//! ```text
//! result = newer * (1 - frac) + older * frac
//! ```
//!
//! ## Range Contract
//!
//! `read()` does not clamp. The voice bank clamps every delay request to
//! `[1, capacity - 1]` when it derives per-voice parameters, so the hot
//! path only pays for the modulo wrap.

use std::num::NonZeroUsize;

use nih_plug::nih_debug_assert;

/// A fixed-capacity ring buffer used as a fractional delay line.
///
/// The buffer is allocated in [`DelayLine::new`] or [`DelayLine::resize`],
/// both of which run on the setup path. Writing and reading never
/// allocate.
#[derive(Debug, Clone)]
pub struct DelayLine {
    /// The circular buffer storing audio samples.
    buffer: Vec<f32>,

    /// Slot that the next `write()` fills.
    write_pos: usize,

    /// Cached `buffer.len()`, never zero.
    buffer_len: usize,
}

impl DelayLine {
    /// Create a silent delay line holding `capacity` samples.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            buffer: vec![0.0; capacity.get()],
            write_pos: 0,
            buffer_len: capacity.get(),
        }
    }

    /// Number of samples this line can hold.
    pub fn capacity(&self) -> usize {
        self.buffer_len
    }

    /// Reallocate to `capacity` samples and fill the new buffer with
    /// silence.
    ///
    /// Called when the sample rate changes. Old contents are discarded
    /// even when the size stays the same, so reused memory never plays
    /// back as garbage.
    pub fn resize(&mut self, capacity: NonZeroUsize) {
        let capacity = capacity.get();
        if capacity == self.buffer_len {
            self.clear();
            return;
        }

        self.buffer = vec![0.0; capacity];
        self.buffer_len = capacity;
        self.write_pos = 0;
    }

    /// Store `sample` at the cursor and advance the cursor by one slot.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer_len;
    }

    /// Read the sample written `delay_samples` writes ago, linearly
    /// interpolating between the two bracketing slots.
    ///
    /// `delay_samples` must lie in `[0, capacity - 1]`. Callers are
    /// responsible for the range; it is only checked in debug builds.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        nih_debug_assert!(
            delay_samples >= 0.0 && delay_samples <= (self.buffer_len - 1) as f32,
            "delay read out of range"
        );

        let delay_int = delay_samples as usize;
        let delay_frac = delay_samples - delay_int as f32;

        // `index_b` is one slot older than `index_a`. Adding a second
        // `buffer_len` keeps the subtraction non-negative when
        // `delay_int` sits at the top of its range.
        let index_a = (self.write_pos + self.buffer_len - delay_int) % self.buffer_len;
        let index_b = (self.write_pos + 2 * self.buffer_len - delay_int - 1) % self.buffer_len;

        let sample_a = self.buffer[index_a];
        let sample_b = self.buffer[index_b];

        sample_a * (1.0 - delay_frac) + sample_b * delay_frac
    }

    /// Fill the buffer with silence and rewind the cursor.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
