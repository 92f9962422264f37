// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::io::Write;

use anyhow::Result;
use blockrpc_client::{Connection, Error, Options};

use crate::integration_tests::common;

/// A peer that answers with a header carrying the wrong magic must have
/// the connection torn down: the in-flight request fails, and the
/// connection rejects anything submitted afterward.
#[test]
fn a_bad_magic_header_closes_the_connection() -> Result<()> {
    let path = common::tmp_socket_path("magic-mismatch");
    let peer = common::spawn_peer(&path, |mut stream| {
        let _request = common::read_frame(&mut stream);
        let garbage = [0u8; 26];
        stream
            .write_all(&garbage)
            .expect("write of a garbled header must succeed");
    });

    let conn = Connection::open(&path, Options::default())?;

    let mut buf = [0u8; 4];
    let err = conn
        .read_at(&mut buf, 0)
        .expect_err("a bad-magic frame must fail the in-flight request");
    assert!(matches!(err, Error::Closed));

    let err = conn
        .read_at(&mut buf, 0)
        .expect_err("the connection must stay closed afterward");
    assert!(matches!(err, Error::Closed));

    peer.join().expect("peer thread must not panic");
    Ok(())
}
