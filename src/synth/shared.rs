//! State shared between the producer (key events) and the consumer (audio callback).
//!
//! Voice bookkeeping crosses the thread boundary only as atomic bit-sets: `running`, `released`,
//! and `stopping` for stop-all requests. Parameter slots are plain memory handed over by the publish/subscribe discipline:
//!
//! - the producer writes a slot only while its `running` bit is clear, then sets the bit with
//!   release ordering;
//! - the consumer reads a slot only after observing the bit with acquire ordering, and is the only
//!   side that ever clears `running`.
//!
//! Acquire/release is the weakest ordering that makes the handoff sound; `SeqCst` throughout would
//! also be correct.
//!
//! [`ProducerHandle`] and [`ConsumerHandle`] are the only ways to reach the slots, and exactly one
//! of each exists per engine.

use super::voice::VoiceParams;
use std::{
    cell::UnsafeCell,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

const WORD_BITS: usize = u64::BITS as usize;

/// A plain, thread-local copy of a voice bit-set.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VoiceMask {
    words: Box<[u64]>,
}

impl VoiceMask {
    pub fn new(voices: usize) -> Self {
        Self {
            words: vec![0; voices.div_ceil(WORD_BITS)].into_boxed_slice(),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.words[index / WORD_BITS] & bit(index) != 0
    }

    pub fn insert(&mut self, index: usize) {
        self.words[index / WORD_BITS] |= bit(index);
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of the set bits, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(i * WORD_BITS + bit)
            })
        })
    }
}

fn bit(index: usize) -> u64 {
    1 << (index % WORD_BITS)
}

/// A fixed-width bit-set mutated only through atomic OR and AND.
struct VoiceBits {
    words: Box<[AtomicU64]>,
    len: usize,
}

impl VoiceBits {
    fn new(len: usize) -> Self {
        Self {
            words: (0..len.div_ceil(WORD_BITS)).map(|_| AtomicU64::new(0)).collect(),
            len,
        }
    }

    fn contains(&self, index: usize, order: Ordering) -> bool {
        self.words[index / WORD_BITS].load(order) & bit(index) != 0
    }

    fn set(&self, index: usize, order: Ordering) {
        self.words[index / WORD_BITS].fetch_or(bit(index), order);
    }

    fn unset(&self, index: usize, order: Ordering) {
        self.words[index / WORD_BITS].fetch_and(!bit(index), order);
    }

    fn unset_all(&self, mask: &VoiceMask, order: Ordering) {
        for (word, &clear) in self.words.iter().zip(mask.words.iter()) {
            if clear != 0 {
                word.fetch_and(!clear, order);
            }
        }
    }

    /// Moves every word into `mask`, leaving the bit-set empty.
    fn take(&self, mask: &mut VoiceMask, order: Ordering) {
        for (local, word) in mask.words.iter_mut().zip(self.words.iter()) {
            *local = word.swap(0, order);
        }
    }

    /// Sets every bit that is set in `other`.
    fn set_from(&self, other: &VoiceBits, order: Ordering) {
        for (word, source) in self.words.iter().zip(other.words.iter()) {
            let bits = source.load(Ordering::Acquire);
            if bits != 0 {
                word.fetch_or(bits, order);
            }
        }
    }

    /// Loads every word exactly once into `mask`.
    fn snapshot(&self, mask: &mut VoiceMask, order: Ordering) {
        for (local, word) in mask.words.iter_mut().zip(self.words.iter()) {
            *local = word.load(order);
        }
    }

    /// Lowest clear bit below `len`.
    fn first_clear(&self, order: Ordering) -> Option<usize> {
        self.words.iter().enumerate().find_map(|(i, word)| {
            let index = i * WORD_BITS + word.load(order).trailing_ones() as usize;
            (index < self.len && index < (i + 1) * WORD_BITS).then_some(index)
        })
    }

    fn count(&self, order: Ordering) -> usize {
        self.words.iter().map(|w| w.load(order).count_ones() as usize).sum()
    }
}

struct SharedVoiceState {
    running: VoiceBits,
    released: VoiceBits,
    /// Voices the producer asked to silence, recorded when the request was made.
    stopping: VoiceBits,
    slots: Box<[UnsafeCell<VoiceParams>]>,
}

// SAFETY: slot contents are only accessed through the producer/consumer handles, which hand each
// slot back and forth via the `running` bit with release/acquire ordering, so a slot is never
// accessed from both threads at once.
unsafe impl Sync for SharedVoiceState {}

/// Creates the shared state for `voices` slots and splits it into its two role handles.
pub fn voice_state(voices: usize) -> (ProducerHandle, ConsumerHandle) {
    let state = Arc::new(SharedVoiceState {
        running: VoiceBits::new(voices),
        released: VoiceBits::new(voices),
        stopping: VoiceBits::new(voices),
        slots: (0..voices).map(|_| UnsafeCell::new(VoiceParams::default())).collect(),
    });
    (
        ProducerHandle {
            state: state.clone(),
        },
        ConsumerHandle { state },
    )
}

/// Producer side of the shared voice state.
pub struct ProducerHandle {
    state: Arc<SharedVoiceState>,
}

impl ProducerHandle {
    pub fn voices(&self) -> usize {
        self.state.slots.len()
    }

    /// Claims the lowest free slot, or `None` when every slot is running.
    pub fn claim(&mut self) -> Option<ClaimedSlot<'_>> {
        let index = self.state.running.first_clear(Ordering::Acquire)?;
        Some(ClaimedSlot {
            state: &self.state,
            index,
        })
    }

    pub fn is_running(&self, index: usize) -> bool {
        self.state.running.contains(index, Ordering::Acquire)
    }

    pub fn is_released(&self, index: usize) -> bool {
        self.state.released.contains(index, Ordering::Acquire)
    }

    /// Marks a running voice as released. Returns `false` if it was not running or already released.
    pub fn release(&self, index: usize) -> bool {
        if !self.is_running(index) || self.is_released(index) {
            return false;
        }
        self.state.released.set(index, Ordering::Release);
        true
    }

    pub fn running_count(&self) -> usize {
        self.state.running.count(Ordering::Acquire)
    }

    /// Asks the consumer to silence and reclaim, on its next callback, every voice running now.
    /// Voices published after this call are not affected.
    pub fn request_stop_all(&self) {
        self.state.stopping.set_from(&self.state.running, Ordering::Release);
    }
}

/// A free slot held by the producer between claiming and publishing.
pub struct ClaimedSlot<'a> {
    state: &'a SharedVoiceState,
    index: usize,
}

impl ClaimedSlot<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Writes the parameters and then publishes the slot to the consumer.
    pub fn publish(self, params: VoiceParams) -> usize {
        // A key-up racing with the previous reclaim may have left a stale released bit.
        self.state.released.unset(self.index, Ordering::Relaxed);
        // Likewise a stop request for the slot's previous voice must not hit the new one.
        self.state.stopping.unset(self.index, Ordering::Relaxed);
        // SAFETY: the running bit is clear, so the consumer does not read this slot, and the
        // `&mut ProducerHandle` borrow rules out a second claim.
        unsafe {
            *self.state.slots[self.index].get() = params;
        }
        self.state.running.set(self.index, Ordering::Release);
        self.index
    }
}

/// Consumer side of the shared voice state.
pub struct ConsumerHandle {
    state: Arc<SharedVoiceState>,
}

impl ConsumerHandle {
    pub fn voices(&self) -> usize {
        self.state.slots.len()
    }

    /// Reads the running and released bit-sets once each.
    pub fn snapshot(&self, running: &mut VoiceMask, released: &mut VoiceMask) {
        self.state.running.snapshot(running, Ordering::Acquire);
        self.state.released.snapshot(released, Ordering::Acquire);
    }

    /// Reads the parameters of a published slot, or `None` if the slot is not running.
    pub fn params(&mut self, index: usize) -> Option<VoiceParams> {
        if !self.state.running.contains(index, Ordering::Acquire) {
            return None;
        }
        // SAFETY: the running bit was observed with acquire ordering, so the producer's write is
        // visible. The producer cannot claim the slot again until the bit is cleared, and only
        // `reclaim` clears it, which the `&mut self` borrow keeps from running concurrently.
        Some(unsafe { *self.state.slots[index].get() })
    }

    /// Returns every slot in `finished` to the free pool.
    pub fn reclaim(&mut self, finished: &VoiceMask) {
        if finished.is_empty() {
            return;
        }
        self.state.released.unset_all(finished, Ordering::Relaxed);
        self.state.running.unset_all(finished, Ordering::AcqRel);
    }

    /// Takes the pending stop requests into `stopping`, returning whether there were any.
    pub fn take_stop_requests(&mut self, stopping: &mut VoiceMask) -> bool {
        self.state.stopping.take(stopping, Ordering::AcqRel);
        !stopping.is_empty()
    }
}
