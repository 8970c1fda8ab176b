// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! This crate provides communication tools for the LSV2 protocol spoken by
//! Heidenhain-family CNC controls (iTNC, TNC, CNC PILOT, MANUALplus).
//!
//! # Examples
//! ```no_run
//! use lsv2::client::{Client, ClientConfig};
//!
//! # fn main() -> Result<(), lsv2::error::Error> {
//! let config = ClientConfig::new("192.168.1.1");
//! let mut client = Client::connect(config)?;
//!
//! let info = client.get_directory_info()?;
//! println!("cwd: {}", info.path);
//!
//! for entry in client.get_directory_content()? {
//!     println!("{}", entry.name);
//! }
//! # Ok(())
//! # }
//! ```
pub mod client;
pub mod codec;
pub mod configure;
pub mod constant;
pub mod error;
pub mod fs;
pub mod protocol;
pub mod session;
pub mod status;
pub mod tcp;
pub mod telegram;
pub mod transport;
