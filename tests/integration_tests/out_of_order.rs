// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::thread;

use anyhow::Result;
use blockrpc_client::{Connection, Options};

use crate::integration_tests::common;

/// Three threads submit reads concurrently on one connection; the peer
/// reads all three requests before answering them in reverse order.
/// Each thread must still get back the bytes for its own offset, proving
/// responses are matched by sequence number rather than send order.
#[test]
fn responses_are_matched_by_sequence_number_not_arrival_order() -> Result<()> {
    let path = common::tmp_socket_path("out-of-order");
    let peer = common::spawn_peer(&path, |mut stream| {
        let requests = [
            common::read_frame(&mut stream),
            common::read_frame(&mut stream),
            common::read_frame(&mut stream),
        ];
        for request in requests.iter().rev() {
            let payload = vec![request.offset as u8; request.size as usize];
            common::respond_ok(&mut stream, request, payload);
        }
    });

    let conn = Connection::open(&path, Options::default())?;

    let handles: Vec<_> = [10i64, 20, 30]
        .into_iter()
        .map(|offset| {
            let conn = conn.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                conn.read_at(&mut buf, offset)
                    .expect("read_at must succeed");
                (offset, buf)
            })
        })
        .collect();

    for handle in handles {
        let (offset, buf) = handle.join().expect("reader thread must not panic");
        assert_eq!(buf, [offset as u8; 4]);
    }

    peer.join().expect("peer thread must not panic");
    Ok(())
}
