// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use blockrpc_client::{Connection, Error, Options};

use crate::integration_tests::common;

/// The peer never answers the first request, so it must fail with
/// `Error::Timeout`. The connection itself survives the timeout: a
/// second request sent right after still completes normally.
#[test]
fn an_unanswered_request_times_out_without_poisoning_the_connection() -> Result<()> {
    let path = common::tmp_socket_path("timeout");
    let peer = common::spawn_peer(&path, |mut stream| {
        let _never_answered = common::read_frame(&mut stream);
        let second = common::read_frame(&mut stream);
        common::respond_ok(&mut stream, &second, vec![0x7Eu8; second.size as usize]);
    });

    let options = Options {
        request_timeout_period: Duration::from_millis(50),
        ..Options::default()
    };
    let conn = Connection::open(&path, options)?;

    let mut buf = [0u8; 4];
    let err = conn
        .read_at(&mut buf, 0)
        .expect_err("unanswered request must time out");
    assert!(matches!(err, Error::Timeout));

    conn.read_at(&mut buf, 100)?;
    assert_eq!(buf, [0x7E; 4]);

    peer.join().expect("peer thread must not panic");
    Ok(())
}
