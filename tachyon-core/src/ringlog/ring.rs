//! Multi-producer / single-consumer ring of pre-allocated text slots
//!
//! Cursors are monotonically increasing `usize` values masked into the slot
//! array. The ring holds at most `capacity - 1` unread entries; producers that
//! find it at that level drop their entry and bump the drop counter.
//!
//! Slot lifecycle:
//! 1. producer wins the CAS on `head` and owns the slot exclusively
//! 2. producer formats into the slot's `String`, then sets `ready` (release)
//! 3. consumer observes `ready` (acquire), reads, clears `ready`
//! 4. consumer advances `tail` once per batch (release), returning the slot
//!
//! At shutdown the consumer seals the ring by setting the high bit of `head`.
//! Every claim either lands before the seal, and is drained by the final
//! pass, or sees the bit and is counted as dropped.

use crate::core::RingLogError;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Initial byte capacity of each slot's buffer
const SLOT_BYTES: usize = 256;

/// High bit of `head`, set once the consumer has sealed the ring
const SEALED: usize = 1 << (usize::BITS - 1);

struct Slot {
    ready: AtomicBool,
    text: UnsafeCell<String>,
}

struct Shared {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    has_data: CachePadded<AtomicBool>,
    dropped: CachePadded<AtomicU64>,
    mask: usize,
    slots: Box<[Slot]>,
}

// SAFETY: a slot's `text` is only touched by the producer that claimed it
// (between the head CAS and the release store of `ready`) or by the single
// consumer (between the acquire load of `ready` and the release store of
// `tail`). Those windows never overlap.
unsafe impl Sync for Shared {}

impl Shared {
    #[inline(always)]
    fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Head cursor without the seal bit
    #[inline(always)]
    fn head_cursor(&self) -> usize {
        self.head.load(Ordering::Acquire) & !SEALED
    }
}

/// Create a ring with `capacity` slots (power of two, at least 2)
pub fn bounded(capacity: usize) -> Result<(LogProducer, LogConsumer), RingLogError> {
    if capacity < 2 || !capacity.is_power_of_two() {
        return Err(RingLogError::InvalidCapacity { capacity });
    }

    let slots = (0..capacity)
        .map(|_| Slot {
            ready: AtomicBool::new(false),
            text: UnsafeCell::new(String::with_capacity(SLOT_BYTES)),
        })
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let shared = Arc::new(Shared {
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
        has_data: CachePadded::new(AtomicBool::new(false)),
        dropped: CachePadded::new(AtomicU64::new(0)),
        mask: capacity - 1,
        slots,
    });

    Ok((
        LogProducer {
            shared: Arc::clone(&shared),
        },
        LogConsumer { shared },
    ))
}

/// Producer handle, cheap to clone and share across threads
#[derive(Clone)]
pub struct LogProducer {
    shared: Arc<Shared>,
}

impl LogProducer {
    /// Write `timestamp args\n` into the next free slot
    ///
    /// Never blocks. Returns `false` (and counts a drop) when the ring is full
    /// or has been sealed by its consumer.
    pub fn push(&self, timestamp: &str, args: fmt::Arguments<'_>) -> bool {
        let shared = &*self.shared;
        let limit = shared.capacity() - 1;

        let mut head = shared.head.load(Ordering::Acquire);
        loop {
            if head & SEALED != 0 {
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            let tail = shared.tail.load(Ordering::Acquire);
            if head.wrapping_sub(tail) >= limit {
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            match shared.head.compare_exchange_weak(
                head,
                head.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }

        let slot = &shared.slots[head & shared.mask];
        // Publishes even if a Display impl panics mid-format, so the
        // consumer never stalls behind a claimed slot.
        let guard = Publish {
            slot,
            has_data: &shared.has_data,
        };

        // SAFETY: the CAS above gave this producer exclusive ownership of the
        // slot until `ready` is set; the consumer released it by advancing
        // `tail` past it (observed with acquire above).
        let text = unsafe { &mut *slot.text.get() };
        text.clear();
        text.push_str(timestamp);
        text.push(' ');
        // Writing into a String only fails if a Display impl reports an error
        let _ = text.write_fmt(args);
        text.push('\n');

        drop(guard);
        true
    }

    /// Entries dropped because the ring was full or sealed
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Claimed but not yet drained entries
    pub fn len(&self) -> usize {
        let tail = self.shared.tail.load(Ordering::Acquire);
        self.shared.head_cursor().wrapping_sub(tail)
    }

    /// Whether the consumer has stopped accepting entries
    pub fn is_sealed(&self) -> bool {
        self.shared.head.load(Ordering::Acquire) & SEALED != 0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

struct Publish<'a> {
    slot: &'a Slot,
    has_data: &'a AtomicBool,
}

impl Drop for Publish<'_> {
    fn drop(&mut self) {
        self.slot.ready.store(true, Ordering::Release);
        self.has_data.store(true, Ordering::Release);
    }
}

/// The single consumer handle
///
/// Deliberately not `Clone`: exactly one drainer can exist per ring.
pub struct LogConsumer {
    shared: Arc<Shared>,
}

impl LogConsumer {
    /// Whether anything may be waiting
    ///
    /// Consumes the has-data hint, then falls back to comparing cursors so a
    /// hint raised between two checks is never lost.
    pub fn pending(&self) -> bool {
        let shared = &*self.shared;
        shared.has_data.swap(false, Ordering::AcqRel)
            || shared.head_cursor() != shared.tail.load(Ordering::Relaxed)
    }

    /// Claimed entries not yet drained
    pub fn backlog(&self) -> usize {
        let shared = &*self.shared;
        shared
            .head_cursor()
            .wrapping_sub(shared.tail.load(Ordering::Relaxed))
    }

    /// Refuse all further claims; entries claimed so far stay drainable
    pub fn seal(&self) {
        self.shared.head.fetch_or(SEALED, Ordering::AcqRel);
    }

    /// Drain up to `min(max(min_batch, backlog / 4), backlog)` published
    /// entries in order, handing each to `sink`
    ///
    /// Stops early at a slot that is claimed but not yet published. The tail
    /// is advanced once for the whole batch, also when `sink` panics.
    pub fn drain_batch<F>(&mut self, min_batch: usize, mut sink: F) -> usize
    where
        F: FnMut(&str),
    {
        let backlog = self.backlog();
        if backlog == 0 {
            return 0;
        }
        let batch = backlog.min(min_batch.max(backlog / 4));

        let shared = &*self.shared;
        let mut commit = Commit {
            tail: &shared.tail,
            start: shared.tail.load(Ordering::Relaxed),
            processed: 0,
        };

        while commit.processed < batch {
            let index = commit.start.wrapping_add(commit.processed);
            let slot = &shared.slots[index & shared.mask];
            if !slot.ready.load(Ordering::Acquire) {
                break;
            }
            slot.ready.store(false, Ordering::Relaxed);
            commit.processed += 1;

            // SAFETY: `ready` was observed set, so the producer is done with
            // the slot; it cannot be reclaimed before `tail` moves past it.
            let text = unsafe { &*slot.text.get() };
            sink(text);
        }

        commit.processed
    }

    /// Entries dropped because the ring was full or sealed
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

struct Commit<'a> {
    tail: &'a AtomicUsize,
    start: usize,
    processed: usize,
}

impl Drop for Commit<'_> {
    fn drop(&mut self) {
        if self.processed > 0 {
            self.tail
                .store(self.start.wrapping_add(self.processed), Ordering::Release);
        }
    }
}
