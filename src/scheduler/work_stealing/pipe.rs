use crossbeam_utils::CachePadded;

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering, fence};

/// Smallest accepted capacity exponent (a pipe of two slots).
pub const MIN_PIPE_SIZE_LOG2: u32 = 1;

/// Largest accepted capacity exponent.
pub const MAX_PIPE_SIZE_LOG2: u32 = 16;

/// A single storage cell of a [`Pipe`].
struct Slot<T> {
    /// Set by the owner once the value is written, cleared by whoever
    /// moved the value out.
    ///
    /// A claimed position may still be occupied while its consumer is
    /// reading it; the owner refuses to write into such a slot.
    occupied: AtomicBool,

    /// The stored value, initialized iff `occupied` is set.
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded, lock-free, per-worker work queue.
///
/// A `Pipe` has exactly one owner. The owner pushes and pops at the
/// front (newest end, LIFO), which keeps freshly split work hot in the
/// owner's cache. Any other worker may steal from the back (oldest end,
/// FIFO), taking the largest-granularity chunks first.
///
/// Positions are monotonically increasing indices masked into a
/// power-of-two ring. `top` is the back (next position to steal),
/// `bottom` is the front (next position to push). Positions in
/// `[top, bottom)` hold queued values.
///
/// Ownership of a position is decided by a compare-and-swap on `top`
/// (for thieves, and for the owner when only one value remains). The
/// winner reads the slot only after winning, so no value is ever read
/// speculatively and no value is handed out twice.
///
/// When the ring is full, [`push`](Self::push) hands the value back
/// instead of growing.
pub(crate) struct Pipe<T> {
    /// Back of the queue, advanced by stealers.
    top: CachePadded<AtomicIsize>,

    /// Front of the queue, only written by the owner.
    bottom: CachePadded<AtomicIsize>,

    /// Ring storage.
    slots: Box<[Slot<T>]>,

    /// `capacity - 1`.
    mask: usize,
}

// Safety: values move between threads through the pipe, so `T: Send` is
// required. Shared access is synchronized by the `top`/`bottom` protocol
// and the per-slot `occupied` flag.
unsafe impl<T: Send> Send for Pipe<T> {}
unsafe impl<T: Send> Sync for Pipe<T> {}

impl<T> Pipe<T> {
    /// Creates an empty pipe holding `2^size_log2` values.
    ///
    /// # Panics
    ///
    /// Panics if `size_log2` is outside
    /// `MIN_PIPE_SIZE_LOG2..=MAX_PIPE_SIZE_LOG2`.
    pub(crate) fn with_capacity_log2(size_log2: u32) -> Self {
        assert!(
            (MIN_PIPE_SIZE_LOG2..=MAX_PIPE_SIZE_LOG2).contains(&size_log2),
            "pipe size log2 must be within {MIN_PIPE_SIZE_LOG2}..={MAX_PIPE_SIZE_LOG2}"
        );

        let capacity = 1usize << size_log2;
        let slots = (0..capacity)
            .map(|_| Slot {
                occupied: AtomicBool::new(false),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            top: CachePadded::new(AtomicIsize::new(0)),
            bottom: CachePadded::new(AtomicIsize::new(0)),
            slots,
            mask: capacity - 1,
        }
    }

    /// Number of values the pipe can hold.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Approximate number of queued values.
    ///
    /// Exact when no other thread is operating on the pipe.
    pub(crate) fn len(&self) -> usize {
        let bottom = self.bottom.load(Ordering::Acquire);
        let top = self.top.load(Ordering::Acquire);

        bottom.saturating_sub(top).max(0) as usize
    }

    /// Returns `true` if no value is queued at the time of the call.
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes a value onto the front of the pipe.
    ///
    /// Returns the value back if the ring is full, or if the slot it would
    /// occupy is still being read by a stealer that claimed its previous
    /// occupant.
    ///
    /// # Safety
    ///
    /// Must only be called by the pipe's owner, never concurrently with
    /// another `push` or [`pop`](Self::pop).
    pub(crate) unsafe fn push(&self, value: T) -> Result<(), T> {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Acquire);

        if bottom - top >= self.capacity() as isize {
            return Err(value);
        }

        let slot = self.slot(bottom);
        if slot.occupied.load(Ordering::Acquire) {
            return Err(value);
        }

        // Safety: the slot is unoccupied and position `bottom` is not yet
        // published, so no other thread can access it.
        unsafe {
            (*slot.value.get()).write(value);
        }
        slot.occupied.store(true, Ordering::Release);
        self.bottom.store(bottom + 1, Ordering::Release);

        Ok(())
    }

    /// Pops the most recently pushed value from the front of the pipe.
    ///
    /// # Safety
    ///
    /// Must only be called by the pipe's owner, never concurrently with
    /// another [`push`](Self::push) or `pop`.
    pub(crate) unsafe fn pop(&self) -> Option<T> {
        let bottom = self.bottom.load(Ordering::Relaxed) - 1;
        self.bottom.store(bottom, Ordering::Release);

        // Orders the `bottom` reservation before reading `top`; pairs with
        // the fence in `steal`.
        fence(Ordering::SeqCst);

        let top = self.top.load(Ordering::Relaxed);
        let len = bottom - top;

        if len < 0 {
            self.bottom.store(bottom + 1, Ordering::Release);
            return None;
        }

        if len == 0 {
            // Last value: race stealers for it.
            let won = self
                .top
                .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok();
            self.bottom.store(bottom + 1, Ordering::Release);

            if !won {
                return None;
            }
        }

        // Safety: position `bottom` now belongs to the owner exclusively.
        Some(unsafe { self.take(bottom) })
    }

    /// Steals the oldest value from the back of the pipe.
    ///
    /// Safe to call from any number of threads. Retries while other
    /// consumers win the race for the back position and returns `None`
    /// once the pipe is observed empty.
    pub(crate) fn steal(&self) -> Option<T> {
        loop {
            let top = self.top.load(Ordering::Acquire);
            fence(Ordering::SeqCst);
            let bottom = self.bottom.load(Ordering::Acquire);

            if bottom - top <= 0 {
                return None;
            }

            if self
                .top
                .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                // Safety: winning the CAS grants exclusive ownership of `top`.
                return Some(unsafe { self.take(top) });
            }
        }
    }

    fn slot(&self, position: isize) -> &Slot<T> {
        &self.slots[position as usize & self.mask]
    }

    /// Moves the value at `position` out and frees its slot.
    ///
    /// # Safety
    ///
    /// The caller must own `position` exclusively and the position must
    /// hold a pushed value.
    unsafe fn take(&self, position: isize) -> T {
        let slot = self.slot(position);
        debug_assert!(slot.occupied.load(Ordering::Acquire));

        // Safety: guaranteed by the caller.
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.occupied.store(false, Ordering::Release);

        value
    }
}

impl<T> Drop for Pipe<T> {
    /// Drops every value still queued.
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if *slot.occupied.get_mut() {
                // Safety: `&mut self` excludes concurrent access and the
                // slot is flagged as holding a value.
                unsafe {
                    slot.value.get_mut().assume_init_drop();
                }
            }
        }
    }
}
