// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The connection façade: owns the socket, the request registry, and the
//! background reader/timer threads, and exposes the blocking
//! `read_at`/`write_at`/`unmap` primitives on top of them.

use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Error;
use crate::options::Options;
use crate::registry::Registry;
use crate::slot::Outcome;
use crate::sync_ext::LockExt;
use crate::timer::{self, Timer};
use crate::wire::{self, Frame, MessageKind};

/// Maximum length `sun_path` can hold on Linux, including the trailing
/// NUL the kernel adds.
const MAX_SOCKET_PATH_LEN: usize = 107;

const OPEN: u8 = 0;
const CLOSED: u8 = 1;

/// A live, multiplexed connection to a remote block-device replica.
///
/// All public methods are safe to call from any number of threads at
/// once; a single background reader thread and a single timer thread
/// service every in-flight request.
pub struct Connection {
    writer: Mutex<UnixStream>,
    /// A separate handle used only to `shutdown(2)` the socket from
    /// `close()`, so a reader thread blocked in `read` wakes promptly
    /// without racing the writer mutex.
    shutdown_handle: UnixStream,
    registry: Arc<Registry>,
    timer: Arc<Timer>,
    seq: AtomicU32,
    state: AtomicU8,
    reader_thread_id: Mutex<Option<ThreadId>>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    timer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Connects to the UNIX domain socket at `path`, retrying up to
    /// `options.retry_counts` times with `options.retry_interval` between
    /// attempts, then spawns the timer and reader threads.
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Arc<Connection>, Error> {
        let path = path.as_ref();
        let path_bytes = path.as_os_str().as_encoded_bytes();
        if path_bytes.is_empty() || path_bytes.len() > MAX_SOCKET_PATH_LEN {
            return Err(Error::InvalidArgument(format!(
                "socket path must be 1..={MAX_SOCKET_PATH_LEN} bytes, got {}",
                path_bytes.len()
            )));
        }

        let mut attempts = 0;
        let stream = loop {
            attempts += 1;
            match UnixStream::connect(path) {
                Ok(stream) => break stream,
                Err(err) if attempts >= options.retry_counts => {
                    warn!(attempts, %err, "exhausted connect retries");
                    return Err(Error::ConnectFailed { attempts });
                },
                Err(err) => {
                    debug!(attempts, %err, "connect failed, retrying");
                    thread::sleep(options.retry_interval);
                },
            }
        };

        let shutdown_handle = stream.try_clone().map_err(Error::Io)?;
        let reader_stream = stream.try_clone().map_err(Error::Io)?;

        let timer = Timer::new();
        let registry = Arc::new(Registry::new(
            Arc::clone(&timer),
            options.request_timeout_period,
        ));

        let conn = Arc::new(Connection {
            writer: Mutex::new(stream),
            shutdown_handle,
            registry: Arc::clone(&registry),
            timer: Arc::clone(&timer),
            seq: AtomicU32::new(0),
            state: AtomicU8::new(OPEN),
            reader_thread_id: Mutex::new(None),
            reader_handle: Mutex::new(None),
            timer_handle: Mutex::new(None),
        });

        let timer_handle = timer::spawn_timer_thread(Arc::clone(&timer), Arc::clone(&registry));
        let reader_conn = Arc::clone(&conn);
        let reader_handle =
            thread::spawn(move || run_reader_loop(reader_stream, registry, reader_conn));

        *conn.reader_thread_id.lock_ignore_poison() = Some(reader_handle.thread().id());
        *conn.reader_handle.lock_ignore_poison() = Some(reader_handle);
        *conn.timer_handle.lock_ignore_poison() = Some(timer_handle);

        Ok(conn)
    }

    /// Reads `buf.len()` bytes starting at `offset` from the replica.
    pub fn read_at(&self, buf: &mut [u8], offset: i64) -> Result<(), Error> {
        if buf.len() > u32::MAX as usize {
            return Err(Error::InvalidArgument("read too large".to_string()));
        }
        let data = self.submit(MessageKind::Read, offset, Vec::new(), buf.len() as u32)?;
        buf.copy_from_slice(&data);
        Ok(())
    }

    /// Writes `buf` to the replica starting at `offset`.
    pub fn write_at(&self, buf: &[u8], offset: i64) -> Result<(), Error> {
        if buf.len() > u32::MAX as usize {
            return Err(Error::InvalidArgument("write too large".to_string()));
        }
        self.submit(MessageKind::Write, offset, buf.to_vec(), buf.len() as u32)?;
        Ok(())
    }

    /// Requests that `count` bytes starting at `offset` be deallocated.
    pub fn unmap(&self, count: u32, offset: i64) -> Result<(), Error> {
        self.submit(MessageKind::Unmap, offset, Vec::new(), count)?;
        Ok(())
    }

    /// Idempotently tears the connection down: shuts the socket down,
    /// closes the timer, fails every still-registered request with
    /// `Error::Closed`, and joins both background threads (except the
    /// reader thread when `close` is itself being called from within it,
    /// to avoid a self-join deadlock).
    pub fn close(&self) {
        if self
            .state
            .compare_exchange(OPEN, CLOSED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let _ = self.shutdown_handle.shutdown(std::net::Shutdown::Both);
        self.timer.close();

        for slot in self.registry.drain_all() {
            slot.complete(Outcome::Error(Error::Closed));
        }

        if let Some(handle) = self.timer_handle.lock_ignore_poison().take() {
            let _ = handle.join();
        }

        let called_from_reader = self.reader_thread_id.lock_ignore_poison().as_ref()
            == Some(&thread::current().id());
        if let Some(handle) = self.reader_handle.lock_ignore_poison().take() {
            if called_from_reader {
                drop(handle);
            } else {
                let _ = handle.join();
            }
        }
    }

    fn submit(
        &self,
        kind: MessageKind,
        offset: i64,
        payload: Vec<u8>,
        size: u32,
    ) -> Result<Vec<u8>, Error> {
        if self.state.load(Ordering::SeqCst) == CLOSED {
            return Err(Error::Closed);
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let response_len = match kind {
            MessageKind::Read => size as usize,
            _ => 0,
        };
        let slot = self
            .registry
            .insert(seq, kind, offset, size, vec![0u8; response_len]);

        debug!(seq, kind = ?slot.kind, offset = slot.offset, size = slot.size, "submitting request");

        let frame = Frame {
            seq,
            kind,
            offset,
            size,
            payload,
        };
        {
            let mut writer = self.writer.lock_ignore_poison();
            if let Err(err) = wire::send_frame(&mut *writer, &frame) {
                drop(writer);
                // A write failure only fails this request; the peer may
                // still be reachable, so the connection itself stays open
                // (the dispatcher will close it if the socket is truly
                // dead).
                let _ = self.registry.take(seq);
                return Err(err);
            }
        }

        match slot.wait() {
            Outcome::Completed | Outcome::Eof => Ok(slot.take_buffer()),
            Outcome::Error(err) => Err(err),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// The background dispatcher loop: reads frames off the wire and routes
/// each to the slot matching its sequence number.
fn run_reader_loop(mut stream: UnixStream, registry: Arc<Registry>, conn: Arc<Connection>) {
    loop {
        let frame = match wire::recv_frame(&mut stream) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%err, "reader loop exiting");
                conn.close();
                return;
            },
        };

        match frame.kind {
            MessageKind::Response | MessageKind::Eof => {
                if let Some(slot) = registry.take(frame.seq) {
                    let mut buffer = slot.buffer.lock_ignore_poison();
                    let n = buffer.len().min(frame.payload.len());
                    buffer[..n].copy_from_slice(&frame.payload[..n]);
                    drop(buffer);
                    let outcome = if frame.kind == MessageKind::Eof {
                        Outcome::Eof
                    } else {
                        Outcome::Completed
                    };
                    slot.complete(outcome);
                }
            },
            MessageKind::Error => {
                if let Some(slot) = registry.take(frame.seq) {
                    slot.complete(Outcome::Error(Error::Remote));
                }
            },
            MessageKind::Close => {
                debug!("peer requested close");
                conn.close();
                return;
            },
            MessageKind::Read | MessageKind::Write | MessageKind::Unmap => {
                warn!(seq = frame.seq, kind = ?frame.kind, "ignoring unexpected request-shaped frame from peer");
            },
        }
    }
}
