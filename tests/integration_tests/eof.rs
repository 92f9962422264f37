// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use blockrpc_client::{Connection, Options};

use crate::integration_tests::common::{self, RawFrame};

/// An `EOF` frame is a successful terminal outcome, not an error: the
/// submitter gets `Ok` with the peer's payload copied in, and the
/// connection keeps serving further requests afterward.
#[test]
fn an_eof_frame_succeeds_and_copies_the_payload() -> Result<()> {
    let path = common::tmp_socket_path("eof");
    let peer = common::spawn_peer(&path, |mut stream| {
        let request = common::read_frame(&mut stream);
        common::write_frame(
            &mut stream,
            &RawFrame {
                seq: request.seq,
                kind: common::KIND_EOF,
                offset: request.offset,
                size: request.size,
                payload: vec![0x55; request.size as usize],
            },
        );

        let second = common::read_frame(&mut stream);
        common::respond_ok(&mut stream, &second, vec![0x66; second.size as usize]);
    });

    let conn = Connection::open(&path, Options::default())?;

    let mut buf = [0u8; 4];
    conn.read_at(&mut buf, 0)
        .expect("an EOF frame must be a successful outcome");
    assert_eq!(buf, [0x55; 4]);

    conn.read_at(&mut buf, 4)?;
    assert_eq!(buf, [0x66; 4]);

    peer.join().expect("peer thread must not panic");
    Ok(())
}
