//! Submission synchronization.
//!
//! A [`Fence`] is the join point between a pass that submitted work to another
//! thread or queue and the executor that must not let consumers read the
//! produced slots before that work has retired.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Whether a submission has retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// Outputs may still be written.
    Unsignaled,
    /// Outputs are final and safe to read.
    Signaled,
}

#[derive(Debug, Default)]
struct FenceState {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

/// Shared completion signal.
///
/// Clones refer to the same fence, so a pass can return one clone in
/// [`Submission::Pending`](crate::graph::Submission::Pending) and signal
/// another from its worker thread.
///
/// # Example
///
/// ```
/// use passgraph_graphics::Fence;
///
/// let fence = Fence::new_unsignaled();
/// let worker = fence.clone();
/// std::thread::spawn(move || {
///     // ... write outputs ...
///     worker.signal();
/// });
///
/// fence.wait();
/// assert!(fence.is_signaled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Fence {
    state: Arc<FenceState>,
}

impl Fence {
    /// A fence for work that is still in flight.
    pub fn new_unsignaled() -> Self {
        Self::default()
    }

    /// A fence for work that already retired.
    pub fn new_signaled() -> Self {
        let fence = Self::default();
        fence.signal();
        fence
    }

    pub fn status(&self) -> FenceStatus {
        if *self.state.signaled.lock() {
            FenceStatus::Signaled
        } else {
            FenceStatus::Unsignaled
        }
    }

    /// Non-blocking poll.
    pub fn is_signaled(&self) -> bool {
        self.status() == FenceStatus::Signaled
    }

    /// Block until the submission retires.
    pub fn wait(&self) {
        let mut signaled = self.state.signaled.lock();
        while !*signaled {
            self.state.condvar.wait(&mut signaled);
        }
    }

    /// Block for at most `timeout`. Returns whether the submission retired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut signaled = self.state.signaled.lock();
        if !*signaled {
            self.state
                .condvar
                .wait_while_for(&mut signaled, |signaled| !*signaled, timeout);
        }
        *signaled
    }

    /// Signal the fence and wake every waiter.
    pub fn signal(&self) {
        *self.state.signaled.lock() = true;
        self.state.condvar.notify_all();
    }

    /// Mark the fence in flight again, for reuse across frames.
    ///
    /// Only valid once every waiter from the previous use has returned.
    pub fn reset(&self) {
        *self.state.signaled.lock() = false;
    }
}

static_assertions::assert_impl_all!(Fence: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_unsignaled() {
        let fence = Fence::new_unsignaled();
        assert_eq!(fence.status(), FenceStatus::Unsignaled);
        assert!(!fence.is_signaled());
    }

    #[test]
    fn test_fence_signaled() {
        let fence = Fence::new_signaled();
        assert_eq!(fence.status(), FenceStatus::Signaled);
        assert!(fence.is_signaled());
    }

    #[test]
    fn test_fence_signal_and_wait() {
        let fence = Fence::new_unsignaled();

        let fence_clone = fence.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            fence_clone.signal();
        });

        fence.wait();
        assert!(fence.is_signaled());
    }

    #[test]
    fn test_fence_wait_timeout() {
        let fence = Fence::new_unsignaled();
        assert!(!fence.wait_timeout(Duration::from_millis(10)));

        fence.signal();
        assert!(fence.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_fence_reset() {
        let fence = Fence::new_signaled();
        fence.reset();
        assert!(!fence.is_signaled());
    }
}
