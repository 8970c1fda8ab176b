// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! TCP transport implementation

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};

use crate::constant::{Tag, DEFAULT_PORT};
use crate::error::Error;
use crate::transport::Transport as TransportTrait;

/// a set of options for the TCP connection
#[derive(Debug, Clone)]
pub struct Options {
    pub hostname: String,
    pub port: u16,
    pub connection_timeout: Option<Duration>,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Options {
    pub fn new(hostname: String, port: u16, timeout: Duration) -> Options {
        Options {
            hostname,
            port: if port == 0 { DEFAULT_PORT } else { port },
            connection_timeout: Some(timeout),
            read_timeout: timeout,
            write_timeout: timeout,
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// a single TCP connection implementing [`crate::transport::Transport`]
#[derive(Debug)]
pub struct Transport {
    stream: TcpStream,
}

impl Transport {
    pub fn connect(options: Options) -> Result<Transport, Error> {
        let stream = match options.connection_timeout {
            Some(timeout) => {
                let mut last_err = None;
                let mut stream = None;
                for addr in options
                    .address()
                    .to_socket_addrs()
                    .map_err(|e| Error::Connect(e.to_string()))?
                {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(s) => {
                            stream = Some(s);
                            break;
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                stream.ok_or_else(|| {
                    Error::Connect(
                        last_err
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "no address resolved".to_string()),
                    )
                })?
            }
            None => {
                TcpStream::connect(&options.address()).map_err(|e| Error::Connect(e.to_string()))?
            }
        };

        stream.set_read_timeout(Some(options.read_timeout))?;
        stream.set_write_timeout(Some(options.write_timeout))?;
        stream.set_nodelay(true)?;

        debug!("connected to {}", options.address());
        Ok(Transport { stream })
    }

    fn write_frame(&mut self, tag_bytes: [u8; 2], payload: &[u8]) -> Result<(), Error> {
        let frame = crate::telegram::Telegram::encode(tag_bytes, payload);
        self.stream.write_all(&frame)?;
        Ok(())
    }

    /// read exactly `buf.len()` bytes, looping over short reads -- the socket
    /// may fragment a frame across multiple TCP segments.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.stream.read_exact(buf)?;
        Ok(())
    }

    fn read_frame(&mut self, buffer_size: usize) -> Result<(Tag, Vec<u8>), Error> {
        let mut header = [0u8; 6];
        self.read_exact(&mut header)?;

        let length = BigEndian::read_u32(&header[0..4]);
        if length < 2 {
            return Err(Error::Decode {
                reason: "frame length shorter than tag".into(),
                bytes: header.to_vec(),
            });
        }
        let body_len = (length - 2) as usize;
        // buffer_size bounds the payload the caller is willing to accept;
        // block-transfer payloads can legitimately equal it.
        if body_len > buffer_size + 4096 {
            return Err(Error::Decode {
                reason: format!("response body of {} bytes exceeds sane bound", body_len),
                bytes: header.to_vec(),
            });
        }

        let tag = Tag::from_response_bytes([header[4], header[5]]);
        let mut body = vec![0u8; body_len];
        if body_len > 0 {
            self.read_exact(&mut body)?;
        }
        Ok((tag, body))
    }
}

impl TransportTrait for Transport {
    fn telegram(
        &mut self,
        tag_bytes: [u8; 2],
        payload: &[u8],
        buffer_size: usize,
        wait_for_response: bool,
    ) -> Result<Option<(Tag, Vec<u8>)>, Error> {
        self.write_frame(tag_bytes, payload)?;

        if !wait_for_response {
            return Ok(None);
        }

        match self.read_frame(buffer_size) {
            Ok((tag, body)) => Ok(Some((tag, body))),
            Err(e) => {
                warn!(
                    "telegram exchange failed, connection should be treated as poisoned: {}",
                    e
                );
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        self.stream.shutdown(std::net::Shutdown::Both)?;
        Ok(())
    }
}
