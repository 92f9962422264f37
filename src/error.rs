// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error as ThisError;

/// Error taxonomy surfaced at the public boundary of this crate.
///
/// `read_at`/`write_at`/`unmap` all return one of these variants on
/// failure. [`Error::Timeout`] and [`Error::Remote`] are richer than a
/// bare `Io`/`Closed` split would require, so a caller that wants to tell
/// a local deadline from a peer-reported failure can do so.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The socket path or a request argument was invalid before any I/O
    /// was attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// All connection attempts were exhausted.
    #[error("failed to connect after {attempts} attempt(s)")]
    ConnectFailed {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The connection is closed; no further requests can be submitted.
    #[error("connection is closed")]
    Closed,

    /// A frame violated the wire protocol (bad magic, unknown message
    /// kind, or a short/garbled header).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An underlying I/O failure not covered by a more specific variant.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The request exceeded `request_timeout_period` without a response.
    #[error("request timed out")]
    Timeout,

    /// The peer answered with an explicit `Error` frame.
    #[error("remote replica reported an error")]
    Remote,
}
