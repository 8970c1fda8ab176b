// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Error type returned by every fallible operation in this crate

use std::error;
use std::fmt;
use std::io::{Error as IOError, ErrorKind};

use crate::constant::Tag;

/// the error group/code pair carried by a `T_ER` or `T_BD` response
pub type ControlErrorCode = (u8, u8);

/// group/code pair signalling the normal end of the error-enumeration loop in
/// `Client::get_error_messages`. It must not be treated as a failure there.
pub const T_ER_NO_NEXT_ERROR: ControlErrorCode = (0, 33);

#[derive(Debug)]
pub enum Error {
    /// establishing the TCP connection failed
    Connect(String),
    /// the connection mutex was poisoned by a panicking holder
    Lock,
    /// a read or write on the underlying transport failed
    Io(ErrorKind),
    /// a read or write did not complete before the configured timeout
    Timeout,
    /// the response tag did not match any tag the caller was prepared for
    UnexpectedResponse { expected: Vec<Tag>, got: Tag },
    /// the control answered with `T_ER` or `T_BD`
    ControlError { group: u8, code: u8 },
    /// a local precondition was violated (missing file, bad memory type, ...)
    Semantic(String),
    /// a byte buffer could not be decoded into the expected record
    Decode { reason: String, bytes: Vec<u8> },
    /// the connection failed mid-exchange and must be reconnected
    Poisoned,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Connect(s) => write!(f, "connection error: {}", s),
            Error::Lock => write!(f, "lock error: panicked"),
            Error::Io(kind) => write!(f, "io error: {:?}", kind),
            Error::Timeout => write!(f, "operation timed out"),
            Error::UnexpectedResponse { expected, got } => write!(
                f,
                "unexpected response: expected one of {:?}, got {:?}",
                expected, got
            ),
            Error::ControlError { group, code } => {
                write!(f, "control reported error: group {} code {}", group, code)
            }
            Error::Semantic(reason) => write!(f, "invalid operation: {}", reason),
            Error::Decode { reason, bytes } => {
                write!(f, "could not decode bytes {:?}: {}", bytes, reason)
            }
            Error::Poisoned => write!(f, "connection is poisoned, reconnect required"),
        }
    }
}

impl From<IOError> for Error {
    fn from(e: IOError) -> Self {
        match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::Timeout,
            kind => Error::Io(kind),
        }
    }
}

// This is important for other errors to wrap this one.
impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}
