// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! The connection-configurator handshake run once, right after the TCP
//! connection is established: log in read-only, learn what the control is
//! and how big a telegram it can stomach, then negotiate the largest buffer
//! size both sides support before logging in for file transfer.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, info, warn};

use crate::constant::{AccessLevel, ControlVariant, ParCcc, Tag, DEFAULT_BUFFER_SIZE, SUPPORTED_BUFFER_SIZES};
use crate::error::Error;
use crate::session::Session;
use crate::transport::Transport;

/// the outcome of the handshake: everything later operations need to know
/// about the control they are now talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub control_variant: ControlVariant,
    pub buffer_size: usize,
    pub secure_file_send: bool,
}

fn ccc_selector_for(buffer_size: usize) -> Option<ParCcc> {
    match buffer_size {
        4096 => Some(ParCcc::SetBuf4096),
        3072 => Some(ParCcc::SetBuf3072),
        2048 => Some(ParCcc::SetBuf2048),
        1024 => Some(ParCcc::SetBuf1024),
        512 => Some(ParCcc::SetBuf512),
        _ => None,
    }
}

/// run the handshake over an already-connected session: login INSPECT, read
/// versions and system parameters, negotiate a buffer size, try to enable
/// secure file send, then login FILETRANSFER.
pub fn configure<T: Transport>(session: &mut Session<T>) -> Result<ConnectionConfig, Error> {
    session.login(AccessLevel::Inspect, None)?;

    let versions = session.get_versions(false)?.clone();
    let control_variant = versions.control_variant();
    info!("connected to control {:?} ({})", control_variant, versions.control);

    let system_parameters = session.get_system_parameters(false)?;
    let max_block_length = system_parameters.max_block_length as usize;

    let mut buffer_size = DEFAULT_BUFFER_SIZE;
    for &candidate in SUPPORTED_BUFFER_SIZES.iter() {
        if candidate <= max_block_length {
            buffer_size = candidate;
            break;
        }
    }

    if buffer_size > DEFAULT_BUFFER_SIZE {
        if let Some(selector) = ccc_selector_for(buffer_size) {
            let mut payload = [0u8; 2];
            BigEndian::write_u16(&mut payload, selector as u16);
            session.protocol().send_receive_ack(Tag::CCc, &payload)?;
            session.protocol().set_buffer_size(buffer_size);
            debug!("negotiated buffer size of {} bytes", buffer_size);
        }
    }

    let mut secure_payload = [0u8; 2];
    BigEndian::write_u16(&mut secure_payload, ParCcc::SecureFileSend as u16);
    let secure_file_send = match session.protocol().send_receive_ack(Tag::CCc, &secure_payload) {
        Ok(()) => true,
        Err(e) => {
            warn!("control does not support secure file send: {}", e);
            false
        }
    };

    session.login(AccessLevel::FileTransfer, None)?;

    Ok(ConnectionConfig {
        control_variant,
        buffer_size,
        secure_file_send,
    })
}
