//! Single in-flight request guard.

use tokio::sync::watch;

/// Send lock for one session.
///
/// Held from the moment a request is dispatched until the peer signals
/// completion or the channel goes away. The value lives in one place;
/// observers get a receiver and always read the latest state.
#[derive(Debug)]
pub struct SendLock {
    state: watch::Sender<bool>,
}

impl Default for SendLock {
    fn default() -> Self {
        Self::new()
    }
}

impl SendLock {
    /// Create an unlocked guard.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self { state }
    }

    /// Take the lock. Returns `false` if a request is already in flight.
    pub fn try_acquire(&self) -> bool {
        self.state.send_if_modified(|locked| {
            if *locked {
                false
            } else {
                *locked = true;
                true
            }
        })
    }

    /// Release the lock. Returns `true` if it was held.
    pub fn release(&self) -> bool {
        self.state.send_if_modified(|locked| std::mem::replace(locked, false))
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        *self.state.borrow()
    }

    /// Receiver for disabling the send affordance while locked.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let lock = SendLock::new();
        assert!(lock.try_acquire());
        assert!(!lock.try_acquire());
        assert!(lock.is_locked());

        assert!(lock.release());
        assert!(!lock.is_locked());
        assert!(lock.try_acquire());
    }

    #[test]
    fn test_release_when_idle_is_noop() {
        let lock = SendLock::new();
        assert!(!lock.release());
        assert!(!lock.is_locked());
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let lock = SendLock::new();
        let mut rx = lock.subscribe();

        lock.try_acquire();
        tokio_test::assert_ok!(rx.changed().await);
        assert!(*rx.borrow_and_update());

        lock.release();
        tokio_test::assert_ok!(rx.changed().await);
        assert!(!*rx.borrow_and_update());
    }
}
