//! Small synchronization helpers shared across the crate.

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a panicking holder poisoned it.
///
/// Critical sections in this crate replace whole values (payload `Arc`s,
/// sink registrations, state enums), so a poisoned guard still views
/// consistent state.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
