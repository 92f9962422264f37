// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection-scoped configuration.
///
/// This crate does not parse configuration files itself — `Options` is a
/// plain struct an embedding application populates however it likes
/// (including, if it wants to, via `serde` from its own config format) and
/// passes to [`crate::Connection::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Sleep between failed connect attempts.
    #[serde(with = "duration_secs", default = "default_retry_interval")]
    pub retry_interval: Duration,
    /// Number of connect attempts before giving up with `ConnectFailed`.
    #[serde(default = "default_retry_counts")]
    pub retry_counts: u32,
    /// Global deadline after which a still-pending request is failed with
    /// `Error::Timeout`.
    #[serde(with = "duration_secs", default = "default_request_timeout_period")]
    pub request_timeout_period: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retry_interval: default_retry_interval(),
            retry_counts: default_retry_counts(),
            request_timeout_period: default_request_timeout_period(),
        }
    }
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_retry_counts() -> u32 {
    5
}

fn default_request_timeout_period() -> Duration {
    Duration::from_secs(15)
}

/// Serde helper representing a `Duration` as a whole number of seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
