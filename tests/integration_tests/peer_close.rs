// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use blockrpc_client::{Connection, Error, Options};

use crate::integration_tests::common::{self, RawFrame};

/// A peer that answers one in-flight request with a `Close` frame
/// instead of a `Response`: the pending request must fail with
/// `Error::Closed`, and the connection must reject any further request
/// with the same error.
#[test]
fn peer_initiated_close_fails_pending_and_future_requests() -> Result<()> {
    let path = common::tmp_socket_path("peer-close");
    let peer = common::spawn_peer(&path, |mut stream| {
        let request = common::read_frame(&mut stream);
        common::write_frame(
            &mut stream,
            &RawFrame {
                seq: request.seq,
                kind: common::KIND_CLOSE,
                offset: 0,
                size: 0,
                payload: Vec::new(),
            },
        );
    });

    let conn = Connection::open(&path, Options::default())?;

    let mut buf = [0u8; 4];
    let err = conn
        .read_at(&mut buf, 0)
        .expect_err("a peer Close must fail the in-flight request");
    assert!(matches!(err, Error::Closed));

    let err = conn
        .read_at(&mut buf, 0)
        .expect_err("the connection must stay closed afterward");
    assert!(matches!(err, Error::Closed));

    peer.join().expect("peer thread must not panic");
    Ok(())
}
