// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The single shared timeout timer. A `timerfd` descriptor re-armed on
//! every head-changing transition with a dedicated thread blocked on
//! `epoll_wait` is one way to build this; a dedicated thread blocked on a
//! `Condvar` instead is portable and avoids a platform-specific descriptor
//! for what is otherwise a simple park/wake primitive.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::registry::Registry;
use crate::slot::Outcome;
use crate::sync_ext::{LockExt, WaitExt};
use crate::Error;

struct Inner {
    deadline: Option<Instant>,
    closed: bool,
}

/// A park/wake primitive the timer thread waits on. Re-armed or disarmed
/// by the registry whenever the head of its queue changes.
pub(crate) struct Timer {
    inner: Mutex<Inner>,
    cv: Condvar,
}

impl Timer {
    pub fn new() -> Arc<Timer> {
        Arc::new(Timer {
            inner: Mutex::new(Inner {
                deadline: None,
                closed: false,
            }),
            cv: Condvar::new(),
        })
    }

    pub fn arm(&self, deadline: Instant) {
        let mut inner = self.inner.lock_ignore_poison();
        inner.deadline = Some(deadline);
        self.cv.notify_all();
    }

    pub fn disarm(&self) {
        let mut inner = self.inner.lock_ignore_poison();
        inner.deadline = None;
        self.cv.notify_all();
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock_ignore_poison();
        inner.closed = true;
        self.cv.notify_all();
    }
}

/// Spawns the dedicated timer thread. It parks until either a deadline is
/// armed or the timer is closed, re-checking `Instant::now()` against the
/// currently armed deadline on every wakeup (spurious wakeups and
/// re-arms while parked are both handled by the loop, not assumed away).
pub(crate) fn spawn_timer_thread(timer: Arc<Timer>, registry: Arc<Registry>) -> JoinHandle<()> {
    thread::spawn(move || loop {
        let mut guard = timer.inner.lock_ignore_poison();
        loop {
            if guard.closed {
                return;
            }
            let Some(deadline) = guard.deadline else {
                guard = timer.cv.wait_ignore_poison(guard);
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (next_guard, _timed_out) =
                timer.cv.wait_timeout_ignore_poison(guard, deadline - now);
            guard = next_guard;
        }
        drop(guard);

        for slot in registry.drain_expired(Instant::now()) {
            slot.complete(Outcome::Error(Error::Timeout));
        }
    })
}
