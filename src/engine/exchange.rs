//! Lock-free single-slot publish for `Copy` records.
//!
//! A triple buffer: the writer owns one slot, the reader owns another,
//! and the third ("back") slot sits in between. Publishing fills the
//! writer's slot and swaps it with the back slot, tagging it dirty.
//! The reader swaps the back slot in only when it is dirty. Both sides
//! touch a single atomic byte, never block, and never see a slot the
//! other side is writing, so a reader always gets either the previous or
//! the latest complete record.
//!
//! ```text
//!            publish()                 refresh()
//!   [write] ───swap───► [back|dirty] ───swap───► [read]
//! ```

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const INDEX_MASK: u8 = 0b011;
const DIRTY: u8 = 0b100;

struct Shared<T> {
    slots: [UnsafeCell<T>; 3],
    /// Index of the back slot, plus [`DIRTY`] when it holds an unread record.
    back: AtomicU8,
}

// SAFETY: each slot is accessed by at most one side at a time. The writer
// only touches `slots[write_idx]`, the reader only `slots[read_idx]`, and
// ownership of the back slot changes hands through the `back` swap.
unsafe impl<T: Send> Sync for Shared<T> {}

/// Producer half. Not `Clone`: there is exactly one writer.
pub struct SnapshotWriter<T> {
    shared: Arc<Shared<T>>,
    write_idx: u8,
}

/// Consumer half. Not `Clone`: there is exactly one reader.
pub struct SnapshotReader<T> {
    shared: Arc<Shared<T>>,
    read_idx: u8,
}

/// Create a connected writer/reader pair whose reader starts out seeing
/// `initial`.
pub fn snapshot_exchange<T: Copy + Send>(initial: T) -> (SnapshotWriter<T>, SnapshotReader<T>) {
    let shared = Arc::new(Shared {
        slots: [
            UnsafeCell::new(initial),
            UnsafeCell::new(initial),
            UnsafeCell::new(initial),
        ],
        back: AtomicU8::new(1),
    });

    (
        SnapshotWriter {
            shared: Arc::clone(&shared),
            write_idx: 0,
        },
        SnapshotReader {
            shared,
            read_idx: 2,
        },
    )
}

impl<T: Copy + Send> SnapshotWriter<T> {
    /// Make `value` the latest record. Replaces any record the reader has
    /// not picked up yet.
    pub fn publish(&mut self, value: T) {
        // SAFETY: `write_idx` is never the reader's slot nor the back slot.
        unsafe {
            *self.shared.slots[usize::from(self.write_idx)].get() = value;
        }

        let previous = self
            .shared
            .back
            .swap(self.write_idx | DIRTY, Ordering::AcqRel);
        self.write_idx = previous & INDEX_MASK;
    }
}

impl<T: Copy + Send> SnapshotReader<T> {
    /// Take the latest published record if there is one. Returns `true`
    /// when [`SnapshotReader::current`] changed.
    #[inline]
    pub fn refresh(&mut self) -> bool {
        if self.shared.back.load(Ordering::Relaxed) & DIRTY == 0 {
            return false;
        }

        let previous = self.shared.back.swap(self.read_idx, Ordering::AcqRel);
        self.read_idx = previous & INDEX_MASK;
        true
    }

    /// The record picked up by the last successful [`refresh`](Self::refresh).
    #[inline]
    pub fn current(&self) -> &T {
        // SAFETY: `read_idx` is never the writer's slot nor the back slot.
        unsafe { &*self.shared.slots[usize::from(self.read_idx)].get() }
    }
}
