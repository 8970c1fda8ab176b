// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Transport definition for the LSV2 client

use std::fmt;

use crate::constant::Tag;
use crate::error::Error;

/// an abstract byte-duplex connection to a control.
///
/// ## How can I implement `Transport`?
///
/// A single telegram exchange is one call to [`Transport::telegram`]: write a
/// length-prefixed frame, then -- if `wait_for_response` is true -- read
/// exactly one length-prefixed frame back. The wire forbids concurrent
/// exchanges; types implementing `Transport` do not need to handle
/// pipelining themselves, the protocol engine above never issues a second
/// `telegram` call before the first has returned.
pub trait Transport: fmt::Debug {
    /// send a telegram and, if `wait_for_response` is true, wait for exactly
    /// one telegram in return. `buffer_size` bounds the payload length the
    /// caller is willing to accept for the response.
    fn telegram(
        &mut self,
        tag_bytes: [u8; 2],
        payload: &[u8],
        buffer_size: usize,
        wait_for_response: bool,
    ) -> Result<Option<(Tag, Vec<u8>)>, Error>;

    /// tear down the connection. A connection that failed mid-exchange is
    /// poisoned; callers must `connect` again rather than keep using it.
    fn disconnect(&mut self) -> Result<(), Error>;
}
