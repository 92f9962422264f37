// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `clippy::unwrap_used` is denied crate-wide, so lock acquisition goes
//! through these helpers instead of a bare `.lock().unwrap()`. A poisoned
//! mutex here means some other thread panicked mid-update; since none of
//! our critical sections can leave an invariant half-applied across a
//! `?`-early-return, recovering the guard is safe.

use std::sync::{Condvar, Mutex, MutexGuard};

pub(crate) trait LockExt<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> LockExt<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub(crate) trait WaitExt<'a, T> {
    fn wait_ignore_poison(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T>;
    fn wait_timeout_ignore_poison(
        &self,
        guard: MutexGuard<'a, T>,
        dur: std::time::Duration,
    ) -> (MutexGuard<'a, T>, bool);
}

impl<'a, T> WaitExt<'a, T> for Condvar {
    fn wait_ignore_poison(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        match self.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn wait_timeout_ignore_poison(
        &self,
        guard: MutexGuard<'a, T>,
        dur: std::time::Duration,
    ) -> (MutexGuard<'a, T>, bool) {
        match self.wait_timeout(guard, dur) {
            Ok((guard, result)) => (guard, result.timed_out()),
            Err(poisoned) => {
                let (guard, result) = poisoned.into_inner();
                (guard, result.timed_out())
            },
        }
    }
}
