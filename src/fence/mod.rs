//! One-shot fence primitive.
//!
//! A [`Fence`] represents the eventual completion of a single asynchronous
//! operation. It starts out unsignaled and makes exactly one transition to
//! the signaled state, which is terminal. Waiters observe completion through
//! the [`Signaled`] future returned by [`Fence::signaled`].
//!
//! # Locking
//!
//! Each fence carries its own private lock guarding both the state
//! transition and the waiter list. No lock is shared between fence
//! instances: unrelated fences never contend. Wakers are
//! collected in the same critical section that flips the state, so a waiter
//! can never observe the lock released without the completion being
//! visible.
//!
//! # Cancel Safety
//!
//! `signaled()` is cancel-safe: dropping a pending [`Signaled`] future
//! removes its waiter registration.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use thiserror::Error;

/// Default driver name reported by fences, diagnostic only.
pub const DEFAULT_DRIVER_NAME: &str = "fenceline";

/// Default timeline name reported by fences, diagnostic only.
pub const DEFAULT_TIMELINE_NAME: &str = "buffer-timeline";

/// The observable state of a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FenceState {
    /// The associated operation has not completed.
    Unsignaled,
    /// The associated operation has completed. Terminal.
    Signaled,
}

/// Error returned by [`Fence::signal`] when the fence was already signaled.
///
/// A correct client signals each fence at most once; the dispatcher treats
/// this as a no-op success because the transition itself is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("fence already signaled")]
pub struct AlreadySignaled;

/// A one-shot completion fence.
///
/// # Example
///
/// ```
/// use fenceline::fence::{Fence, FenceState};
///
/// let fence = Fence::new();
/// assert_eq!(fence.state(), FenceState::Unsignaled);
///
/// fence.signal().expect("first signal succeeds");
/// assert!(fence.is_signaled());
/// assert!(fence.signal().is_err());
/// ```
#[derive(Debug)]
pub struct Fence {
    shared: StdMutex<FenceShared>,
    driver_name: Arc<str>,
    timeline_name: Arc<str>,
}

/// State behind the per-fence lock: the signal bit and the waiter list
/// change together or not at all.
#[derive(Debug)]
struct FenceShared {
    state: FenceState,
    waiters: WaiterSlab,
}

/// Slot storage for waiter wakers. Freed slots are reused so repeated
/// register/cancel cycles do not grow the vector.
#[derive(Debug)]
struct WaiterSlab {
    entries: Vec<Option<Waker>>,
    free_slots: Vec<usize>,
}

impl WaiterSlab {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_slots: Vec::new(),
        }
    }

    /// Insert a waker, reusing a free slot if available.
    fn insert(&mut self, waker: Waker) -> usize {
        if let Some(index) = self.free_slots.pop() {
            self.entries[index] = Some(waker);
            index
        } else {
            let index = self.entries.len();
            self.entries.push(Some(waker));
            index
        }
    }

    /// Replace the waker in an occupied slot.
    fn update(&mut self, index: usize, waker: &Waker) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = Some(waker.clone());
        }
    }

    /// Release a slot back to the free list. The slot owner calls this
    /// exactly once, either on completion or on cancellation.
    fn release(&mut self, index: usize) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = None;
            self.free_slots.push(index);
        }
    }

    /// Take every registered waker, leaving the slots allocated for their
    /// owners to release.
    fn drain_wakers(&mut self) -> Vec<Waker> {
        self.entries.iter_mut().filter_map(Option::take).collect()
    }

    /// Count slots that still hold a waker.
    fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }
}

impl Fence {
    /// Creates a new fence in the unsignaled state with default
    /// diagnostic names. No side effects beyond allocation.
    #[must_use]
    pub fn new() -> Self {
        Self::with_names(Arc::from(DEFAULT_DRIVER_NAME), Arc::from(DEFAULT_TIMELINE_NAME))
    }

    /// Creates a new unsignaled fence carrying the given diagnostic names.
    ///
    /// The names have no behavioral weight; they exist so log lines and
    /// debuggers can attribute a fence to its producer.
    #[must_use]
    pub fn with_names(driver_name: Arc<str>, timeline_name: Arc<str>) -> Self {
        Self {
            shared: StdMutex::new(FenceShared {
                state: FenceState::Unsignaled,
                waiters: WaiterSlab::new(),
            }),
            driver_name,
            timeline_name,
        }
    }

    /// Transitions the fence to the signaled state.
    ///
    /// Exactly one caller performs the transition; every later (or
    /// concurrently losing) caller gets [`AlreadySignaled`]. All waiters
    /// registered at transition time are woken. The wakers are collected
    /// under the fence lock, in the same critical section as the state
    /// flip, and invoked after the lock is released.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadySignaled`] if the fence was already signaled.
    pub fn signal(&self) -> Result<(), AlreadySignaled> {
        let wakers = {
            let mut shared = self.lock_shared();
            if shared.state == FenceState::Signaled {
                return Err(AlreadySignaled);
            }
            shared.state = FenceState::Signaled;
            shared.waiters.drain_wakers()
        };

        for waker in wakers {
            waker.wake();
        }
        Ok(())
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> FenceState {
        self.lock_shared().state
    }

    /// Returns true if the fence has been signaled.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.state() == FenceState::Signaled
    }

    /// Returns a future that completes when the fence is signaled.
    ///
    /// A fence signaled before the call completes the future on first
    /// poll. The future is cancel-safe; dropping it removes the waiter.
    pub fn signaled(&self) -> Signaled<'_> {
        Signaled {
            fence: self,
            waiter_index: None,
            done: false,
        }
    }

    /// Returns the diagnostic driver name.
    #[must_use]
    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    /// Returns the diagnostic timeline name.
    #[must_use]
    pub fn timeline_name(&self) -> &str {
        &self.timeline_name
    }

    /// Returns the number of waiters currently registered.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.lock_shared().waiters.active_count()
    }

    fn lock_shared(&self) -> MutexGuard<'_, FenceShared> {
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`Fence::signaled`].
///
/// Completes once the fence has been signaled.
#[derive(Debug)]
pub struct Signaled<'a> {
    fence: &'a Fence,
    waiter_index: Option<usize>,
    done: bool,
}

impl Future for Signaled<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.done {
            return Poll::Ready(());
        }

        let mut shared = self.fence.lock_shared();
        if shared.state == FenceState::Signaled {
            if let Some(index) = self.waiter_index.take() {
                shared.waiters.release(index);
            }
            drop(shared);
            self.done = true;
            return Poll::Ready(());
        }

        // State check and waiter registration happen under the same lock,
        // so a signal cannot slip between them.
        match self.waiter_index {
            Some(index) => shared.waiters.update(index, cx.waker()),
            None => self.waiter_index = Some(shared.waiters.insert(cx.waker().clone())),
        }
        Poll::Pending
    }
}

impl Drop for Signaled<'_> {
    fn drop(&mut self) {
        if let Some(index) = self.waiter_index.take() {
            let mut shared = self.fence.lock_shared();
            shared.waiters.release(index);
        }
    }
}
