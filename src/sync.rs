//! Lock helpers shared by the in-memory stores.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Recover from poisoned `RwLock`s instead of propagating the panic.
///
/// All guarded state in this crate is replaced wholesale per entry, so a
/// panicking writer never leaves a half-written value behind.
pub(crate) trait RecoverableLock<T> {
    fn read_or_recover(&self) -> RwLockReadGuard<'_, T>;
    fn write_or_recover(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T> RecoverableLock<T> for RwLock<T> {
    fn read_or_recover(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap_or_else(|poisoned| {
            warn!("RwLock was poisoned during read, recovering");
            poisoned.into_inner()
        })
    }

    fn write_or_recover(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap_or_else(|poisoned| {
            warn!("RwLock was poisoned during write, recovering");
            poisoned.into_inner()
        })
    }
}

/// Same recovery for plain mutexes (per-user update gates).
pub(crate) trait RecoverableMutex<T> {
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> RecoverableMutex<T> for Mutex<T> {
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            warn!("Mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
