// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! The top-level client: owns a connection, runs the handshake once, and
//! exposes the filesystem and status operations as plain methods. Those
//! methods live in [`crate::fs`] and [`crate::status`] as `impl` blocks on
//! [`Client`] -- this file only owns construction, teardown, and the bits of
//! state every operation needs (the negotiated buffer size, whether secure
//! file send is available, and the text-decoding policy).

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::info;

use crate::codec::SystemParameters;
use crate::configure::{self, ConnectionConfig};
use crate::constant::AccessLevel;
use crate::error::Error;
use crate::protocol::Protocol;
use crate::session::{Session, VersionInfo};
use crate::tcp;
use crate::transport::Transport;

/// construction-time options, analogous to the teacher's `tcp::Options` but
/// extended with the policy knobs this protocol actually needs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub hostname: String,
    pub port: u16,
    pub timeout: Duration,
    /// refuse any login outside `{INSPECT, FILETRANSFER, MONITOR}`
    pub safe_mode: bool,
    /// decode NUL-terminated strings with `from_utf8_lossy` instead of
    /// failing the whole call on invalid UTF-8. Heidenhain controls are
    /// frequently configured with a non-UTF-8 locale, so this defaults on.
    pub lossy_text: bool,
}

impl ClientConfig {
    pub fn new(hostname: impl Into<String>) -> ClientConfig {
        ClientConfig {
            hostname: hostname.into(),
            port: 0,
            timeout: Duration::from_secs(15),
            safe_mode: true,
            lossy_text: true,
        }
    }
}

/// a connected, logged-in LSV2 client.
///
/// ```no_run
/// use lsv2::client::{Client, ClientConfig};
///
/// let config = ClientConfig::new("192.168.1.1");
/// let mut client = Client::connect(config)?;
/// let info = client.get_directory_info()?;
/// println!("cwd: {}", info.path);
/// # Ok::<(), lsv2::error::Error>(())
/// ```
#[derive(Debug)]
pub struct Client<T: Transport> {
    pub(crate) session: Session<T>,
    pub(crate) config: ConnectionConfig,
    pub(crate) lossy_text: bool,
}

impl Client<tcp::Transport> {
    /// connect over TCP and run the full handshake, ending logged in at
    /// both `INSPECT` and `FILETRANSFER`.
    pub fn connect(client_config: ClientConfig) -> Result<Client<tcp::Transport>, Error> {
        let options = tcp::Options::new(client_config.hostname.clone(), client_config.port, client_config.timeout);
        let transport = tcp::Transport::connect(options)?;
        Client::from_transport(transport, client_config.safe_mode, client_config.lossy_text)
    }
}

impl<T: Transport> Client<T> {
    /// wrap an already-constructed transport and run the handshake. Useful
    /// for tests and for transports other than TCP.
    pub fn from_transport(transport: T, safe_mode: bool, lossy_text: bool) -> Result<Client<T>, Error> {
        let protocol = Protocol::new(transport);
        let mut session = Session::new(protocol, safe_mode);
        let config = configure::configure(&mut session)?;
        info!(
            "connection configured: buffer_size={} secure_file_send={}",
            config.buffer_size, config.secure_file_send
        );
        Ok(Client {
            session,
            config,
            lossy_text,
        })
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        self.config
    }

    pub(crate) fn protocol(&mut self) -> &mut Protocol<T> {
        self.session.protocol()
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.config.buffer_size
    }

    pub(crate) fn lossy(&self) -> bool {
        self.lossy_text
    }

    /// log in at an additional access level beyond the two the handshake
    /// already establishes (e.g. `DNC` or `PLCDEBUG`)
    pub fn login(&mut self, level: AccessLevel, password: Option<&str>) -> Result<(), Error> {
        self.session.login(level, password)
    }

    pub fn logout(&mut self, level: Option<AccessLevel>) -> Result<(), Error> {
        self.session.logout(level)
    }

    pub fn is_logged_in(&self, level: AccessLevel) -> bool {
        self.session.is_logged_in(level)
    }

    /// the control's version strings, read once during the handshake and
    /// cached from then on unless `force` is set
    pub fn versions(&mut self, force: bool) -> Result<VersionInfo, Error> {
        self.session.get_versions(force).map(|v| v.clone())
    }

    /// the control's system parameter table, read once during the handshake
    /// and cached from then on unless `force` is set
    pub fn system_parameters(&mut self, force: bool) -> Result<SystemParameters, Error> {
        self.session.get_system_parameters(force).map(|p| *p)
    }

    /// log out of every active level and tear down the transport
    pub fn disconnect(mut self) -> Result<(), Error> {
        self.session.logout(None)?;
        self.session.protocol().disconnect()
    }
}

/// a [`Client`] shared across threads.
///
/// Mirrors the teacher's `tcp::Transport`, which wraps its `TcpStream` in a
/// `Mutex` so one connection can be driven from several callers; here the
/// whole client -- session state included -- sits behind the mutex, so every
/// operation (and thus every telegram) is serialised, not just the raw byte
/// exchange. Cloning a `SharedClient` clones the `Arc`, not the connection.
#[derive(Debug, Clone)]
pub struct SharedClient<T: Transport> {
    inner: Arc<Mutex<Client<T>>>,
}

impl<T: Transport> SharedClient<T> {
    pub fn new(client: Client<T>) -> SharedClient<T> {
        SharedClient {
            inner: Arc::new(Mutex::new(client)),
        }
    }

    /// lock the client for the duration of the returned guard. The guard
    /// derefs to `&mut Client<T>`, so any `Client` method is reachable
    /// through it; the lock is released when the guard is dropped.
    ///
    /// A poisoned mutex (a prior holder panicked mid-call, possibly leaving
    /// the connection in an inconsistent state) surfaces as `Error::Lock`
    /// rather than panicking the caller.
    pub fn lock(&self) -> Result<MutexGuard<'_, Client<T>>, Error> {
        self.inner.lock().map_err(|_| Error::Lock)
    }
}

impl<T: Transport> From<Client<T>> for SharedClient<T> {
    fn from(client: Client<T>) -> SharedClient<T> {
        SharedClient::new(client)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::SystemParameters;
    use crate::constant::Tag;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        pub responses: VecDeque<(Tag, Vec<u8>)>,
        pub sent: Vec<(Tag, Vec<u8>)>,
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

    fn nul(s: &str) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.push(0);
        v
    }

    pub(crate) fn handshake_responses() -> VecDeque<(Tag, Vec<u8>)> {
        let sys_par = SystemParameters {
            marker_start: 0,
            markers: 0,
            input_start: 0,
            inputs: 0,
            output_start: 0,
            outputs: 0,
            counter_start: 0,
            counters: 0,
            timer_start: 0,
            timers: 0,
            word_start: 0,
            words: 0,
            string_start: 0,
            strings: 0,
            string_length: 0,
            input_word_start: 0,
            input_words: 0,
            output_word_start: 0,
            output_words: 0,
            max_block_length: 256,
            lsv2_version: 37,
        };
        let mut responses = VecDeque::new();
        responses.push_back((Tag::TOk, vec![])); // A_LG INSPECT
        responses.push_back((Tag::SVr, nul("TNC640")));
        responses.push_back((Tag::SVr, nul("340590 01")));
        responses.push_back((Tag::SVr, nul("0")));
        responses.push_back((Tag::SVr, nul("")));
        responses.push_back((Tag::SVr, nul("")));
        responses.push_back((Tag::SVr, nul("")));
        responses.push_back((Tag::SVr, nul("")));
        responses.push_back((Tag::SPr, sys_par.encode()));
        // buffer_size stays at the default (256) so no C_CC buffer negotiation fires
        responses.push_back((Tag::TOk, vec![])); // C_CC secure file send
        responses.push_back((Tag::TOk, vec![])); // A_LG FILE
        responses
    }

    #[test]
    fn connect_runs_the_handshake_and_logs_in_twice() {
        let transport = MockTransport {
            responses: handshake_responses(),
            sent: vec![],
        };
        let client = Client::from_transport(transport, false, true).unwrap();
        assert!(client.is_logged_in(AccessLevel::Inspect));
        assert!(client.is_logged_in(AccessLevel::FileTransfer));
        assert_eq!(client.connection_config().buffer_size, 256);
    }

    #[test]
    fn disconnect_logs_out_and_tears_down_transport() {
        let transport = MockTransport {
            responses: handshake_responses(),
            sent: vec![],
        };
        let client = Client::from_transport(transport, false, true).unwrap();
        client.disconnect().unwrap();
    }

    #[test]
    fn shared_client_delegates_through_the_lock() {
        let transport = MockTransport {
            responses: handshake_responses(),
            sent: vec![],
        };
        let client = Client::from_transport(transport, false, true).unwrap();
        let shared = SharedClient::new(client);

        let guard = shared.lock().unwrap();
        assert!(guard.is_logged_in(AccessLevel::FileTransfer));
    }

    #[test]
    fn shared_client_clone_shares_the_same_connection() {
        let transport = MockTransport {
            responses: handshake_responses(),
            sent: vec![],
        };
        let client = Client::from_transport(transport, false, true).unwrap();
        let shared = SharedClient::new(client);
        let cloned = shared.clone();

        assert!(cloned.lock().unwrap().is_logged_in(AccessLevel::Inspect));
    }

    #[test]
    fn shared_client_surfaces_poisoned_lock_as_error_lock() {
        let transport = MockTransport {
            responses: handshake_responses(),
            sent: vec![],
        };
        let client = Client::from_transport(transport, false, true).unwrap();
        let shared = SharedClient::new(client);

        let poisoner = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("simulated panic while holding the lock");
        })
        .join();

        let err = shared.lock().unwrap_err();
        assert!(matches!(err, Error::Lock));
    }
}
