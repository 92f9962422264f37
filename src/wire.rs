// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The wire framing layer: a fixed 26-byte little-endian header followed
//! by an optional payload. Generic over `Read`/`Write` so it is testable
//! without a real socket.

use std::io::{Read, Write};

use zerocopy::byteorder::little_endian::{I64, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::Error;

/// Magic version stamped on every frame in either direction.
pub(crate) const MAGIC: u16 = 0x1B01;
/// Size in bytes of the on-wire header.
pub(crate) const HEADER_LEN: usize = 26;

/// Message kinds carried in the wire header's `type` field.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageKind {
    Read = 0,
    Write = 1,
    Response = 2,
    Error = 3,
    Eof = 4,
    Close = 5,
    Unmap = 6,
}

impl MessageKind {
    fn from_wire(v: u32) -> Result<Self, Error> {
        Ok(match v {
            0 => Self::Read,
            1 => Self::Write,
            2 => Self::Response,
            3 => Self::Error,
            4 => Self::Eof,
            5 => Self::Close,
            6 => Self::Unmap,
            other => {
                return Err(Error::Protocol(format!("unknown message kind {other}")));
            },
        })
    }
}

/// A fully decoded frame: header fields plus its payload.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub seq: u32,
    pub kind: MessageKind,
    pub offset: i64,
    pub size: u32,
    pub payload: Vec<u8>,
}

/// Packed on-wire representation of the 26-byte header. Byte-order is
/// carried by the field types themselves, so this struct is correct
/// regardless of host endianness.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct WireHeader {
    magic: U16,
    seq: U32,
    kind: U32,
    offset: I64,
    size: U32,
    data_length: U32,
}

const _: () = assert!(std::mem::size_of::<WireHeader>() == HEADER_LEN);

/// Writes the header, then — if the frame carries a payload — the payload
/// bytes. The whole header is always written before any payload byte.
pub(crate) fn send_frame<W: Write>(stream: &mut W, frame: &Frame) -> Result<(), Error> {
    let header = WireHeader {
        magic: MAGIC.into(),
        seq: frame.seq.into(),
        kind: (frame.kind as u32).into(),
        offset: frame.offset.into(),
        size: frame.size.into(),
        data_length: (frame.payload.len() as u32).into(),
    };
    write_full(stream, header.as_bytes())?;
    if !frame.payload.is_empty() {
        write_full(stream, &frame.payload)?;
    }
    Ok(())
}

/// Reads exactly one header, validates it, then reads exactly
/// `data_length` payload bytes if any are declared.
pub(crate) fn recv_frame<R: Read>(stream: &mut R) -> Result<Frame, Error> {
    let mut header_buf = [0u8; HEADER_LEN];
    read_full(stream, &mut header_buf)?;

    let header = WireHeader::read_from_bytes(&header_buf)
        .map_err(|_| Error::Protocol("malformed header".to_string()))?;

    let magic = header.magic.get();
    if magic != MAGIC {
        return Err(Error::Protocol(format!(
            "bad magic 0x{magic:04x}, expected 0x{MAGIC:04x}"
        )));
    }

    let kind = MessageKind::from_wire(header.kind.get())?;
    let data_length = header.data_length.get();

    let mut payload = vec![0u8; data_length as usize];
    if data_length > 0 {
        read_full(stream, &mut payload)?;
    }

    Ok(Frame {
        seq: header.seq.get(),
        kind,
        offset: header.offset.get(),
        size: header.size.get(),
        payload,
    })
}

/// Reads until `buf` is full, retrying on `Interrupted` and treating a
/// zero-byte read (peer closed mid-message) as an error.
fn read_full<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<(), Error> {
    let mut read = 0;
    while read < buf.len() {
        match stream.read(&mut buf[read..]) {
            Ok(0) => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "peer closed connection mid-frame",
                )));
            },
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(())
}

/// Writes all of `buf`, retrying on `Interrupted`.
fn write_full<W: Write>(stream: &mut W, buf: &[u8]) -> Result<(), Error> {
    let mut written = 0;
    while written < buf.len() {
        match stream.write(&buf[written..]) {
            Ok(0) => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                )));
            },
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(())
}
