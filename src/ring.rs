//! Lock-free single-producer single-consumer event ring.
//!
//! Interrupt-level input (button edges, the hold timer) is communicated
//! to the cooperative core exclusively through this ring: the ISR side
//! holds the [Producer], the dialog loop drains the [Consumer]. Acquire
//! and release pairs on the two monotonic counters make torn reads
//! impossible without masking interrupts.

#[cfg(not(feature = "std"))]
use alloc::sync::Arc;
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::std;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Gesture and timer events consumed by the confirmation loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Button edge: pressed
    Press,
    /// Button edge: released
    Release,
    /// The press-and-hold timer fired
    HoldExpired,
}

/// Capacity of the device event ring.
pub const EVENT_RING_CAPACITY: usize = 16;

pub type EventProducer = Producer<Event, EVENT_RING_CAPACITY>;
pub type EventConsumer = Consumer<Event, EVENT_RING_CAPACITY>;

/// Creates the device event ring.
pub fn event_ring() -> (EventProducer, EventConsumer) {
    channel()
}

struct Ring<T, const N: usize> {
    slots: [UnsafeCell<Option<T>>; N],
    /// next slot the consumer reads; only the consumer stores it
    head: AtomicUsize,
    /// next slot the producer writes; only the producer stores it
    tail: AtomicUsize,
}

// Slots are only touched by the single producer (between the tail
// acquire/release pair) and the single consumer (between the head pair).
unsafe impl<T: Send, const N: usize> Sync for Ring<T, N> {}
unsafe impl<T: Send, const N: usize> Send for Ring<T, N> {}

/// Write half of a SPSC ring.
pub struct Producer<T, const N: usize> {
    ring: Arc<Ring<T, N>>,
}

/// Read half of a SPSC ring.
pub struct Consumer<T, const N: usize> {
    ring: Arc<Ring<T, N>>,
}

/// Creates a SPSC ring of capacity `N`.
pub fn channel<T, const N: usize>() -> (Producer<T, N>, Consumer<T, N>) {
    let ring = Arc::new(Ring {
        slots: std::array::from_fn(|_| UnsafeCell::new(None)),
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });

    (
        Producer { ring: ring.clone() },
        Consumer { ring },
    )
}

impl<T, const N: usize> Producer<T, N> {
    /// Pushes one event.
    ///
    /// Returns `false` when the ring is full; the event is dropped, which
    /// for edge events means the gesture is lost rather than reordered.
    pub fn push(&self, value: T) -> bool {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= N {
            return false;
        }

        unsafe {
            *ring.slots[tail % N].get() = Some(value);
        }
        ring.tail.store(tail.wrapping_add(1), Ordering::Release);

        true
    }
}

impl<T, const N: usize> Consumer<T, N> {
    /// Pops the oldest event, if any.
    pub fn pop(&self) -> Option<T> {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let tail = ring.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let value = unsafe { (*ring.slots[head % N].get()).take() };
        ring.head.store(head.wrapping_add(1), Ordering::Release);

        value
    }

    /// Gets whether any event is waiting.
    pub fn is_empty(&self) -> bool {
        let ring = &*self.ring;
        ring.head.load(Ordering::Relaxed) == ring.tail.load(Ordering::Acquire)
    }
}
