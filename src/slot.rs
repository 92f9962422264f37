// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The per-request completion primitive: a `Mutex<Option<Outcome>>` plus a
//! `Condvar`, standing in for a `pthread_mutex_t`/`pthread_cond_t` pair.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crate::error::Error;
use crate::sync_ext::{LockExt, WaitExt};
use crate::wire::MessageKind;

/// Terminal state of a request. `Pending` is represented by `None` inside
/// `Slot::outcome`.
#[derive(Debug)]
pub(crate) enum Outcome {
    Completed,
    Eof,
    Error(Error),
}

/// A single in-flight request: the registry's side of it lives in
/// `Registry::Inner`; the submitter holds its own `Arc<Slot>` and blocks on
/// [`Slot::wait`].
pub(crate) struct Slot {
    pub seq: u32,
    pub kind: MessageKind,
    pub offset: i64,
    pub size: u32,
    pub deadline: Instant,
    /// Owned buffer: the write payload on the way out (unused once sent),
    /// or a zero-initialized receive buffer the dispatcher fills in place.
    pub buffer: Mutex<Vec<u8>>,
    outcome: Mutex<Option<Outcome>>,
    cv: Condvar,
}

impl Slot {
    pub fn new(
        seq: u32,
        kind: MessageKind,
        offset: i64,
        size: u32,
        deadline: Instant,
        buffer: Vec<u8>,
    ) -> Arc<Slot> {
        Arc::new(Slot {
            seq,
            kind,
            offset,
            size,
            deadline,
            buffer: Mutex::new(buffer),
            outcome: Mutex::new(None),
            cv: Condvar::new(),
        })
    }

    /// Transitions Pending → `outcome` and wakes the waiter. No-op if
    /// already completed; structurally this should never be invoked
    /// twice, because the registry hands out a given sequence number to
    /// at most one of {dispatcher, timer, closer} via `take`/`drain_*`.
    pub fn complete(&self, outcome: Outcome) {
        let mut guard = self.outcome.lock_ignore_poison();
        if guard.is_none() {
            *guard = Some(outcome);
            self.cv.notify_all();
        }
    }

    /// Blocks until the request's outcome is no longer pending, then
    /// returns it.
    pub fn wait(&self) -> Outcome {
        let mut guard = self.outcome.lock_ignore_poison();
        while guard.is_none() {
            guard = self.cv.wait_ignore_poison(guard);
        }
        guard
            .take()
            .expect("loop condition guarantees outcome is Some")
    }

    /// Takes ownership of the request's buffer, leaving an empty `Vec` in
    /// its place. Only meaningful to call once, after `wait` returns.
    pub fn take_buffer(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.lock_ignore_poison())
    }
}
