// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Length-prefixed binary telegram framing: `BE32(len(payload)+2) || tag || payload`

use byteorder::{BigEndian, ByteOrder};

use crate::constant::Tag;

/// a single telegram, command or response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    pub tag: Tag,
    pub payload: Vec<u8>,
}

impl Telegram {
    pub fn new(tag: Tag, payload: Vec<u8>) -> Telegram {
        Telegram { tag, payload }
    }

    /// encode a command telegram ready to be written to the wire
    pub fn encode(tag_bytes: [u8; 2], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 2 + payload.len());
        let mut len_buf = [0u8; 4];
        BigEndian::write_u32(&mut len_buf, (payload.len() + 2) as u32);
        out.extend_from_slice(&len_buf);
        out.extend_from_slice(&tag_bytes);
        out.extend_from_slice(payload);
        out
    }

    /// split a received `BE32(length) || tag || body` frame into its tag and body.
    /// `frame` must be exactly `4 + length` bytes long.
    pub fn decode(length: u32, tag_bytes: [u8; 2], body: Vec<u8>) -> Telegram {
        debug_assert_eq!(body.len() as u32, length.saturating_sub(2));
        Telegram {
            tag: Tag::from_response_bytes(tag_bytes),
            payload: body,
        }
    }
}
