//! Lock-free recycling of per-request state across connections.

use crossbeam::utils::CachePadded;
use std::{
    ptr,
    sync::atomic::{AtomicPtr, AtomicUsize, Ordering},
};

/// A fixed-capacity LIFO pool of pre-initialized elements.
///
/// The pool is the only state shared between connections. `available`
/// counts the elements resident at slot indices `[0, available)` and is
/// the sole coordination point: acquire and release race on it with
/// sequentially-consistent compare-and-swap, never a mutex.
///
/// Exhaustion and overflow degrade gracefully instead of blocking:
/// acquiring from an empty pool allocates a fresh element with the stored
/// init closure, and releasing into a full pool destroys the returned
/// element.
///
/// # Examples
///
/// ```
/// use reqcore::{limits::ReqLimits, Pool, RequestState};
///
/// let limits = ReqLimits::default();
/// let pool = Pool::new(16, move || RequestState::new(&limits));
///
/// let state = pool.acquire();
/// // ... parse a request with it ...
/// pool.release(state);
/// ```
pub struct Pool<T, F: Fn() -> T> {
    slots: Box<[AtomicPtr<T>]>,
    available: CachePadded<AtomicUsize>,
    init: F,
}

impl<T, F: Fn() -> T> Pool<T, F> {
    /// Creates a pool holding `capacity` elements built by `init`.
    pub fn new(capacity: usize, init: F) -> Self {
        let slots = (0..capacity)
            .map(|_| AtomicPtr::new(Box::into_raw(Box::new(init()))))
            .collect();

        Pool {
            slots,
            available: CachePadded::new(AtomicUsize::new(capacity)),
            init,
        }
    }

    /// Takes an element out of the pool, allocating a fresh one when the
    /// pool is exhausted.
    pub fn acquire(&self) -> Box<T> {
        let mut available = self.available.load(Ordering::SeqCst);

        loop {
            if available == 0 {
                return self.overflow();
            }

            match self.available.compare_exchange_weak(
                available,
                available - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    let element = self.slots[available - 1].swap(ptr::null_mut(), Ordering::AcqRel);

                    // A racing release has claimed this slot but not stored
                    // into it yet; treat it as exhaustion. Its store is
                    // picked up by a later acquire or by teardown.
                    if element.is_null() {
                        return self.overflow();
                    }

                    return unsafe { Box::from_raw(element) };
                }
                Err(current) => available = current,
            }
        }
    }

    /// Returns an element to the pool, destroying it when the pool is
    /// already full.
    pub fn release(&self, element: Box<T>) {
        let element = Box::into_raw(element);
        let mut available = self.available.load(Ordering::SeqCst);

        loop {
            if available == self.slots.len() {
                drop(unsafe { Box::from_raw(element) });
                return;
            }

            match self.available.compare_exchange_weak(
                available,
                available + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    let displaced = self.slots[available].swap(element, Ordering::AcqRel);

                    // Non-null only when a late store from an earlier
                    // release parked an element here after an acquire had
                    // already emptied the slot.
                    if !displaced.is_null() {
                        drop(unsafe { Box::from_raw(displaced) });
                    }

                    return;
                }
                Err(current) => available = current,
            }
        }
    }

    /// Number of elements currently resident.
    pub fn available(&self) -> usize {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn overflow(&self) -> Box<T> {
        tracing::debug!("pool exhausted, allocating overflow element");
        Box::new((self.init)())
    }
}

unsafe impl<T: Send, F: Fn() -> T + Send> Send for Pool<T, F> {}
unsafe impl<T: Send, F: Fn() -> T + Sync> Sync for Pool<T, F> {}

impl<T, F: Fn() -> T> Drop for Pool<T, F> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            let element = std::mem::replace(slot.get_mut(), ptr::null_mut());
            if !element.is_null() {
                drop(unsafe { Box::from_raw(element) });
            }
        }
    }
}
