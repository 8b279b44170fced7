//! Writer-priority reader-writer lock.
//!
//! The repository needs a lock with a stronger fairness contract than the
//! standard library documents: once a writer is waiting, new readers must
//! queue behind it, so a sustained read load cannot starve mutations.
//!
//! Contract:
//! - any number of concurrent readers when no writer holds or waits;
//! - exactly one writer, excluding all readers and writers;
//! - a waiting writer blocks new readers until it has acquired and released;
//! - release happens on every exit path (guards release on drop);
//! - not reentrant — a holder must not re-acquire.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    active_readers: usize,
    writer_active: bool,
    waiting_writers: usize,
}

#[derive(Debug)]
pub struct RwLock<T> {
    state: Mutex<State>,
    readers: Condvar,
    writers: Condvar,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is mediated by the reader/writer protocol above;
// a `&T` escapes only while the read count is held and a `&mut T` only while
// the single writer flag is held.
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(State::default()),
            readers: Condvar::new(),
            writers: Condvar::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Block until shared access is available. Readers admitted only when
    /// no writer holds the lock or is waiting for it.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let mut state = lock_state(&self.state);
        while state.writer_active || state.waiting_writers > 0 {
            state = wait(&self.readers, state);
        }
        state.active_readers += 1;
        RwLockReadGuard { lock: self }
    }

    /// Block until exclusive access is available.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let mut state = lock_state(&self.state);
        state.waiting_writers += 1;
        while state.writer_active || state.active_readers > 0 {
            state = wait(&self.writers, state);
        }
        state.waiting_writers -= 1;
        state.writer_active = true;
        RwLockWriteGuard { lock: self }
    }

    fn release_read(&self) {
        let mut state = lock_state(&self.state);
        state.active_readers -= 1;
        if state.active_readers == 0 && state.waiting_writers > 0 {
            self.writers.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = lock_state(&self.state);
        state.writer_active = false;
        if state.waiting_writers > 0 {
            self.writers.notify_one();
        } else {
            self.readers.notify_all();
        }
    }
}

/// The inner mutex only guards the three counters; a panic while holding it
/// cannot leave `data` half-written, so poisoning is stripped rather than
/// propagated.
fn lock_state(mutex: &Mutex<State>) -> MutexGuard<'_, State> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wait<'a>(cv: &Condvar, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
    cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the read count is held for the guard's lifetime, so no
        // writer can be active.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the writer flag is held for the guard's lifetime.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the writer flag is held, excluding all other access.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}
