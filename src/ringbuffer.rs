//! Fixed-capacity single-producer single-consumer byte ring.
//!
//! One ring decouples each UART unit's foreground writer from the interrupt
//! handler that drains it: the foreground enqueues, the handler dequeues,
//! and both sides may run interleaved. Indices are free-running counters so
//! the full capacity is usable; loads and stores pair `Acquire`/`Release`
//! so the consumer never observes an index ahead of the byte it covers.
//!
//! The ring itself never blocks. Backpressure (spinning until the drain
//! frees a slot) is the driver's policy, layered on top in `uart.rs`.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A fixed-capacity circular byte buffer with single-writer /
/// single-reader discipline.
pub struct RingBuffer<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    /// Total bytes ever dequeued. Written only by the consumer.
    read: AtomicUsize,
    /// Total bytes ever enqueued. Written only by the producer.
    write: AtomicUsize,
}

// SAFETY: the producer writes only cells at indices >= `read + len`, the
// consumer reads only cells below `write`; the release/acquire pairing on
// the counters orders the byte accesses between the two sides.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty ring.
    pub const fn new() -> Self {
        Self {
            buf: UnsafeCell::new([0; N]),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    /// Capacity in bytes.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes currently queued.
    pub fn len(&self) -> usize {
        self.write
            .load(Ordering::Acquire)
            .wrapping_sub(self.read.load(Ordering::Acquire))
    }

    /// `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if no slot is free.
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Enqueue one byte. Returns `false` without storing if the ring is
    /// full. Producer side only.
    pub fn push(&self, byte: u8) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        if write.wrapping_sub(read) == N {
            return false;
        }
        // SAFETY: this slot is outside the readable window until the
        // store on `write` below publishes it.
        unsafe {
            (*self.buf.get())[write % N] = byte;
        }
        self.write.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Dequeue the oldest byte, if any. Consumer side only.
    pub fn pop(&self) -> Option<u8> {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        if read == write {
            return None;
        }
        // SAFETY: `read < write`, so this slot was published by a
        // releasing store in `push`.
        let byte = unsafe { (*self.buf.get())[read % N] };
        self.read.store(read.wrapping_add(1), Ordering::Release);
        Some(byte)
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
