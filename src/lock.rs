//! Engine-Wide Mutual Exclusion
//!
//! The engine is guarded by a single lock held for the duration of any
//! parameter write, parameter read, or audio block pull. Under the `std`
//! feature this is a plain [`std::sync::Mutex`]; without it (bare-metal /
//! `no_std` hosts) a spinlock with the same acquire/release discipline
//! stands in, since `std::sync::Mutex` is unavailable there.

#[cfg(feature = "std")]
pub struct Lock<T>(std::sync::Mutex<T>);

#[cfg(feature = "std")]
impl<T> Lock<T> {
    pub fn new(value: T) -> Self {
        Self(std::sync::Mutex::new(value))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        // A poisoned mutex (a prior call panicked mid-block) still holds a
        // valid, if inconsistent, engine state; a real-time audio host has
        // no use for a poisoned-lock panic cascade, so recover it.
        let mut guard = match self.0.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

#[cfg(not(feature = "std"))]
pub struct Lock<T> {
    locked: core::sync::atomic::AtomicBool,
    data: core::cell::UnsafeCell<T>,
}

#[cfg(not(feature = "std"))]
unsafe impl<T: Send> Sync for Lock<T> {}

#[cfg(not(feature = "std"))]
impl<T> Lock<T> {
    pub fn new(value: T) -> Self {
        Self {
            locked: core::sync::atomic::AtomicBool::new(false),
            data: core::cell::UnsafeCell::new(value),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        use core::sync::atomic::Ordering;
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        // SAFETY: the spin above guarantees exclusive access until the
        // store below releases it.
        let result = f(unsafe { &mut *self.data.get() });
        self.locked.store(false, Ordering::Release);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_grants_exclusive_mutable_access() {
        let lock = Lock::new(0i32);
        lock.with(|v| *v += 1);
        lock.with(|v| *v += 1);
        assert_eq!(lock.with(|v| *v), 2);
    }
}
