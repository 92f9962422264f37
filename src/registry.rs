// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The request registry: an ordered queue plus a sequence-keyed index of
//! in-flight requests, both kept consistent behind one `Mutex<Inner>`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::slot::Slot;
use crate::sync_ext::LockExt;
use crate::timer::Timer;
use crate::wire::MessageKind;

struct Inner {
    /// Submission order == deadline order, since every entry's deadline
    /// is `insert-time + period` and `period` is constant.
    queue: VecDeque<u32>,
    map: HashMap<u32, Arc<Slot>>,
}

pub(crate) struct Registry {
    inner: Mutex<Inner>,
    timer: Arc<Timer>,
    period: Duration,
}

impl Registry {
    pub fn new(timer: Arc<Timer>, period: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                map: HashMap::new(),
            }),
            timer,
            period,
        }
    }

    /// Stamps a deadline, wraps the request fields in a [`Slot`], and
    /// registers it. Arms the timer iff the queue was empty before this
    /// insert (see the module-level note on why that is equivalent to
    /// arming on every insert).
    pub fn insert(
        &self,
        seq: u32,
        kind: MessageKind,
        offset: i64,
        size: u32,
        buffer: Vec<u8>,
    ) -> Arc<Slot> {
        let deadline = Instant::now() + self.period;
        let slot = Slot::new(seq, kind, offset, size, deadline, buffer);

        let mut inner = self.inner.lock_ignore_poison();
        let was_empty = inner.queue.is_empty();
        inner.queue.push_back(seq);
        inner.map.insert(seq, Arc::clone(&slot));
        if was_empty {
            self.timer.arm(deadline);
        }
        slot
    }

    /// Removes and returns the request with the given sequence number, if
    /// still registered. Re-arms the timer from the new head iff the
    /// removed entry was the old head.
    pub fn take(&self, seq: u32) -> Option<Arc<Slot>> {
        let mut inner = self.inner.lock_ignore_poison();
        let slot = inner.map.remove(&seq)?;

        let was_head = inner.queue.front() == Some(&seq);
        if let Some(pos) = inner.queue.iter().position(|&s| s == seq) {
            inner.queue.remove(pos);
        }
        if was_head {
            self.rearm_from_head(&inner);
        }
        Some(slot)
    }

    /// Pops every entry whose deadline has passed off the front of the
    /// queue and returns them for the timer thread to fail. Re-arms from
    /// the new head (or disarms on an empty queue) afterward.
    pub fn drain_expired(&self, now: Instant) -> Vec<Arc<Slot>> {
        let mut inner = self.inner.lock_ignore_poison();
        let mut expired = Vec::new();

        while let Some(&seq) = inner.queue.front() {
            let deadline = inner
                .map
                .get(&seq)
                .expect("registry invariant: queue entry missing from map")
                .deadline;
            if deadline > now {
                break;
            }
            inner.queue.pop_front();
            expired.push(
                inner
                    .map
                    .remove(&seq)
                    .expect("registry invariant: queue entry missing from map"),
            );
        }

        self.rearm_from_head(&inner);
        expired
    }

    /// Removes every registered request (used during connection close)
    /// and disarms the timer.
    pub fn drain_all(&self) -> Vec<Arc<Slot>> {
        let mut inner = self.inner.lock_ignore_poison();
        inner.queue.clear();
        self.timer.disarm();
        inner.map.drain().map(|(_, slot)| slot).collect()
    }

    fn rearm_from_head(&self, inner: &Inner) {
        match inner.queue.front().and_then(|seq| inner.map.get(seq)) {
            Some(slot) => self.timer.arm(slot.deadline),
            None => self.timer.disarm(),
        }
    }
}
