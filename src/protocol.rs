// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! The three telegram-exchange primitives every higher-level operation is
//! built from, and nothing else: this module knows how to drive one
//! `Transport`, it does not know what a directory listing or a PLC memory
//! read looks like.

use log::{debug, trace};

use crate::constant::{Tag, DEFAULT_BUFFER_SIZE};
use crate::error::{ControlErrorCode, Error};
use crate::transport::Transport;

fn decode_error_code(body: &[u8]) -> ControlErrorCode {
    if body.len() >= 2 {
        (body[0], body[1])
    } else {
        (0, 0)
    }
}

/// drives a single [`Transport`] through request/response exchanges,
/// decoding `T_ER`/`T_BD` envelopes uniformly so callers never special-case
/// them.
#[derive(Debug)]
pub struct Protocol<T: Transport> {
    transport: T,
    buffer_size: usize,
    last_error: Option<ControlErrorCode>,
}

impl<T: Transport> Protocol<T> {
    pub fn new(transport: T) -> Protocol<T> {
        Protocol {
            transport,
            buffer_size: DEFAULT_BUFFER_SIZE,
            last_error: None,
        }
    }

    /// the payload size the transport is currently willing to exchange in a
    /// single telegram, set once the connection configurator has agreed on
    /// one with the control.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.buffer_size = buffer_size;
    }

    /// the group/code pair from the most recent `T_ER`/`T_BD` response, if any
    pub fn last_error(&self) -> Option<ControlErrorCode> {
        self.last_error
    }

    pub fn disconnect(&mut self) -> Result<(), Error> {
        self.transport.disconnect()
    }

    fn dispatch(&mut self, tag: Tag, payload: &[u8]) -> Result<(Tag, Vec<u8>), Error> {
        trace!("-> {} ({} bytes)", tag, payload.len());
        let response = self
            .transport
            .telegram(tag.wire_bytes(), payload, self.buffer_size, true)?;
        let (resp_tag, body) = response.expect("wait_for_response=true always yields a response");
        trace!("<- {} ({} bytes)", resp_tag, body.len());
        Ok((resp_tag, body))
    }

    /// send `tag`/`payload` without waiting for a response. Some exchanges
    /// (e.g. the non-secure end of a file upload) are fire-and-forget on the
    /// wire; this is the only primitive that passes `wait_for_response=false`
    /// down to the transport.
    pub fn send(&mut self, tag: Tag, payload: &[u8]) -> Result<(), Error> {
        trace!("-> {} ({} bytes, no response expected)", tag, payload.len());
        self.transport.telegram(tag.wire_bytes(), payload, self.buffer_size, false)?;
        Ok(())
    }

    /// send `tag`/`payload` and expect a response whose tag is one of
    /// `expected`. A `T_ER`/`T_BD` response is decoded into
    /// [`Error::ControlError`] and recorded via [`Protocol::last_error`]
    /// regardless of what the caller expected.
    pub fn send_receive(&mut self, tag: Tag, payload: &[u8], expected: &[Tag]) -> Result<Vec<u8>, Error> {
        let (resp_tag, body) = self.dispatch(tag, payload)?;
        if resp_tag == Tag::TEr || resp_tag == Tag::TBd {
            let (group, code) = decode_error_code(&body);
            self.last_error = Some((group, code));
            return Err(Error::ControlError { group, code });
        }
        if expected.contains(&resp_tag) {
            Ok(body)
        } else {
            self.last_error = None;
            Err(Error::UnexpectedResponse {
                expected: expected.to_vec(),
                got: resp_tag,
            })
        }
    }

    /// send `tag`/`payload` and expect a bare `T_OK` acknowledgement carrying
    /// no content.
    pub fn send_receive_ack(&mut self, tag: Tag, payload: &[u8]) -> Result<(), Error> {
        self.send_receive(tag, payload, &[Tag::TOk]).map(|_| ())
    }

    /// drive a multi-packet block transfer: send `tag`/`payload` once, then
    /// keep pulling further packets by sending a bare `T_OK` for every
    /// `content_tag` response received, until the control answers `T_FD`.
    pub fn send_receive_block(
        &mut self,
        tag: Tag,
        payload: &[u8],
        content_tag: Tag,
    ) -> Result<Vec<Vec<u8>>, Error> {
        let mut chunks = Vec::new();
        let (mut resp_tag, mut resp_body) = self.dispatch(tag, payload)?;
        loop {
            if resp_tag == content_tag {
                chunks.push(resp_body);
                let (t, b) = self.dispatch(Tag::TOk, &[])?;
                resp_tag = t;
                resp_body = b;
            } else if resp_tag == Tag::TFd {
                debug!("block transfer complete, {} packet(s)", chunks.len());
                break;
            } else if resp_tag == Tag::TEr || resp_tag == Tag::TBd {
                let (group, code) = decode_error_code(&resp_body);
                self.last_error = Some((group, code));
                return Err(Error::ControlError { group, code });
            } else {
                self.last_error = None;
                return Err(Error::UnexpectedResponse {
                    expected: vec![content_tag, Tag::TFd],
                    got: resp_tag,
                });
            }
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct MockTransport {
        responses: VecDeque<(Tag, Vec<u8>)>,
        sent: Vec<(Tag, Vec<u8>)>,
    }

    impl Transport for MockTransport {
        fn telegram(
            &mut self,
            tag_bytes: [u8; 2],
            payload: &[u8],
            _buffer_size: usize,
            wait_for_response: bool,
        ) -> Result<Option<(Tag, Vec<u8>)>, Error> {
            self.sent.push((Tag::from_response_bytes(tag_bytes), payload.to_vec()));
            if !wait_for_response {
                return Ok(None);
            }
            Ok(self.responses.pop_front())
        }

        fn disconnect(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn send_receive_returns_body_for_expected_tag() {
        let mut transport = MockTransport::default();
        transport.responses.push_back((Tag::SVr, b"1.0".to_vec()));
        let mut proto = Protocol::new(transport);

        let body = proto.send_receive(Tag::RVr, &[1], &[Tag::SVr]).unwrap();
        assert_eq!(body, b"1.0");
    }

    #[test]
    fn send_receive_decodes_control_error() {
        let mut transport = MockTransport::default();
        transport.responses.push_back((Tag::TEr, vec![2, 9]));
        let mut proto = Protocol::new(transport);

        let err = proto.send_receive(Tag::RVr, &[1], &[Tag::SVr]).unwrap_err();
        match err {
            Error::ControlError { group, code } => assert_eq!((group, code), (2, 9)),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(proto.last_error(), Some((2, 9)));
    }

    #[test]
    fn send_receive_rejects_unexpected_tag() {
        let mut transport = MockTransport::default();
        transport.responses.push_back((Tag::SDi, vec![]));
        let mut proto = Protocol::new(transport);

        let err = proto.send_receive(Tag::RVr, &[1], &[Tag::SVr]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { .. }));
    }

    #[test]
    fn send_receive_clears_stale_last_error_on_unexpected_tag() {
        let mut transport = MockTransport::default();
        transport.responses.push_back((Tag::TEr, vec![2, 9]));
        transport.responses.push_back((Tag::SDi, vec![]));
        let mut proto = Protocol::new(transport);

        proto.send_receive(Tag::RVr, &[1], &[Tag::SVr]).unwrap_err();
        assert_eq!(proto.last_error(), Some((2, 9)));

        proto.send_receive(Tag::RVr, &[1], &[Tag::SVr]).unwrap_err();
        assert_eq!(proto.last_error(), None);
    }

    #[test]
    fn send_does_not_wait_for_a_response() {
        let transport = MockTransport::default();
        // no responses queued: if `send` waited, popping an empty queue
        // would panic on the `expect` inside `dispatch`.
        let mut proto = Protocol::new(transport);

        proto.send(Tag::CFd, &[]).unwrap();
        assert_eq!(proto.last_error(), None);
    }

    #[test]
    fn send_receive_ack_succeeds_on_bare_ok() {
        let mut transport = MockTransport::default();
        transport.responses.push_back((Tag::TOk, vec![]));
        let mut proto = Protocol::new(transport);

        proto.send_receive_ack(Tag::CDc, b"TNC:\\").unwrap();
    }

    #[test]
    fn block_transfer_pulls_packets_until_fd() {
        let mut transport = MockTransport::default();
        transport.responses.push_back((Tag::SFl, b"chunk1".to_vec()));
        transport.responses.push_back((Tag::SFl, b"chunk2".to_vec()));
        transport.responses.push_back((Tag::TFd, vec![]));
        let mut proto = Protocol::new(transport);

        let chunks = proto.send_receive_block(Tag::RFl, b"TNC:\\x.h", Tag::SFl).unwrap();
        assert_eq!(chunks, vec![b"chunk1".to_vec(), b"chunk2".to_vec()]);
    }

    #[test]
    fn block_transfer_surfaces_control_error_mid_stream() {
        let mut transport = MockTransport::default();
        transport.responses.push_back((Tag::SFl, b"chunk1".to_vec()));
        transport.responses.push_back((Tag::TEr, vec![1, 4]));
        let mut proto = Protocol::new(transport);

        let err = proto
            .send_receive_block(Tag::RFl, b"TNC:\\x.h", Tag::SFl)
            .unwrap_err();
        assert!(matches!(err, Error::ControlError { group: 1, code: 4 }));
    }
}
