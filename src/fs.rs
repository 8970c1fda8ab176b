// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Directory and file CRUD, plus the upload/download state machines.
//!
//! Every path sent to the control is normalised to use `\` as a separator
//! (the control does not understand `/`), and every path read back is left
//! exactly as the control sent it.

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::client::Client;
use crate::codec::{self, DirectoryInfo, FileSystemEntry};
use crate::constant::{ParRdr, Tag, MODE_BINARY, PATH_SEP};
use crate::error::Error;
use crate::transport::Transport;

fn normalize_path(path: &str) -> String {
    path.replace('/', "\\")
}

fn nul_terminated(s: &str) -> Vec<u8> {
    let mut v = normalize_path(s).into_bytes();
    v.push(0);
    v
}

/// split a normalized remote path into `(directory, file_name)`; a path
/// with no separator has an empty directory.
fn split_remote_path(path: &str) -> (String, String) {
    let path = normalize_path(path);
    match path.rfind(PATH_SEP) {
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => (String::new(), path),
    }
}

/// resolve a copy/move target: a bare file name renames in place (kept next
/// to `source_path`), anything containing a path separator is an absolute
/// destination. The control's own behaviour here was one of the open
/// questions in the distilled spec; splitting on the last separator avoids
/// the mis-strip that an indiscriminate `rstrip`-style trim would cause on a
/// source name that happens to end in the same characters as its directory.
fn resolve_target_path(source_path: &str, target_path: &str) -> String {
    let target_path = normalize_path(target_path);
    if target_path.contains(PATH_SEP) {
        return target_path;
    }
    let source_path = normalize_path(source_path);
    match source_path.rfind(PATH_SEP) {
        Some(idx) => format!("{}{}", &source_path[..=idx], target_path),
        None => target_path,
    }
}

impl<T: Transport> Client<T> {
    /// change the working directory used by every other filesystem call
    pub fn change_directory(&mut self, path: &str) -> Result<(), Error> {
        self.protocol().send_receive_ack(Tag::CDc, &nul_terminated(path))
    }

    /// info about the current working directory
    pub fn get_directory_info(&mut self) -> Result<DirectoryInfo, Error> {
        let lossy = self.lossy();
        let body = self.protocol().send_receive(Tag::RDi, &[], &[Tag::SDi])?;
        DirectoryInfo::decode(&body, lossy)
    }

    /// list the entries of the current working directory
    pub fn get_directory_content(&mut self) -> Result<Vec<FileSystemEntry>, Error> {
        let lossy = self.lossy();
        let chunks = self
            .protocol()
            .send_receive_block(Tag::RDr, &[ParRdr::Single as u8], Tag::SDr)?;
        chunks
            .iter()
            .map(|body| FileSystemEntry::decode(body, lossy))
            .collect()
    }

    /// list the available drives (`TNC:`, `PLC:`, ...) as filesystem entries
    pub fn get_drive_info(&mut self) -> Result<Vec<FileSystemEntry>, Error> {
        let lossy = self.lossy();
        let chunks = self
            .protocol()
            .send_receive_block(Tag::RDr, &[ParRdr::Drives as u8], Tag::SDr)?;
        chunks
            .iter()
            .map(|body| FileSystemEntry::decode(body, lossy))
            .collect()
    }

    /// info about a single file or directory, by path
    pub fn get_file_info(&mut self, remote_path: &str) -> Result<FileSystemEntry, Error> {
        let lossy = self.lossy();
        let body = self
            .protocol()
            .send_receive(Tag::RFi, &nul_terminated(remote_path), &[Tag::SFi])?;
        FileSystemEntry::decode(&body, lossy)
    }

    /// create `path`, creating every missing parent along the way. Each
    /// prefix is checked with `get_file_info` first and only created if the
    /// control does not already report it, so creating an already-existing
    /// directory is a no-op rather than a control error.
    pub fn make_directory(&mut self, path: &str) -> Result<(), Error> {
        let normalized = normalize_path(path);
        let mut prefix = String::new();
        for segment in normalized.split(PATH_SEP) {
            if segment.is_empty() {
                continue;
            }
            if prefix.is_empty() {
                prefix.push_str(segment);
            } else {
                prefix.push(PATH_SEP);
                prefix.push_str(segment);
            }
            if self.get_file_info(&prefix).is_err() {
                self.protocol().send_receive_ack(Tag::CDm, &nul_terminated(&prefix))?;
            }
        }
        Ok(())
    }

    pub fn delete_empty_directory(&mut self, path: &str) -> Result<(), Error> {
        self.protocol().send_receive_ack(Tag::CDd, &nul_terminated(path))
    }

    pub fn delete_file(&mut self, path: &str) -> Result<(), Error> {
        self.protocol().send_receive_ack(Tag::CFd, &nul_terminated(path))
    }

    pub fn copy_local_file(&mut self, source_path: &str, target_path: &str) -> Result<(), Error> {
        let (source_dir, source_name) = split_remote_path(source_path);
        if !source_dir.is_empty() {
            self.change_directory(&source_dir)?;
        }
        let target = resolve_target_path(source_path, target_path);
        let mut payload = nul_terminated(&source_name);
        payload.extend(nul_terminated(&target));
        self.protocol().send_receive_ack(Tag::CFc, &payload)
    }

    pub fn move_local_file(&mut self, source_path: &str, target_path: &str) -> Result<(), Error> {
        let (source_dir, source_name) = split_remote_path(source_path);
        if !source_dir.is_empty() {
            self.change_directory(&source_dir)?;
        }
        let target = resolve_target_path(source_path, target_path);
        let mut payload = nul_terminated(&source_name);
        payload.extend(nul_terminated(&target));
        self.protocol().send_receive_ack(Tag::CFr, &payload)
    }

    /// upload a local file to `remote_path`. A `remote_path` ending in a
    /// path separator names a directory; the local file's own name is used
    /// within it. The remote directory is created if it does not already
    /// exist. An existing file at the resolved path is left untouched and
    /// an error returned unless `override_existing` is set, in which case it
    /// is deleted first. Binary vs. text mode is chosen from the resolved
    /// path's extension; text files are sent byte for byte, binary files are
    /// never rewritten.
    pub fn send_file(&mut self, local_path: &Path, remote_path: &str, override_existing: bool) -> Result<(), Error> {
        let data = fs::read(local_path)?;

        let normalized_remote = normalize_path(remote_path);
        let (remote_dir, remote_name) = if normalized_remote.ends_with(PATH_SEP) {
            let file_name = local_path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
                Error::Semantic(format!("{} has no file name to upload under", local_path.display()))
            })?;
            (
                normalized_remote.trim_end_matches(PATH_SEP).to_string(),
                file_name.to_string(),
            )
        } else {
            split_remote_path(&normalized_remote)
        };

        if !remote_dir.is_empty() {
            self.make_directory(&remote_dir)?;
            self.change_directory(&remote_dir)?;
        }

        let full_remote_path = if remote_dir.is_empty() {
            remote_name.clone()
        } else {
            format!("{}{}{}", remote_dir, PATH_SEP, remote_name)
        };

        if self.get_file_info(&full_remote_path).is_ok() {
            if override_existing {
                self.delete_file(&full_remote_path)?;
            } else {
                return Err(Error::Semantic(format!(
                    "{} already exists on the control; pass override_existing to replace it",
                    full_remote_path
                )));
            }
        }

        let binary = codec::is_file_binary(&full_remote_path);
        let mode = if binary { MODE_BINARY } else { 0 };

        let mut header = nul_terminated(&full_remote_path);
        header.push(mode);
        self.protocol().send_receive_ack(Tag::CFl, &header)?;

        let chunk_size = self.buffer_size().saturating_sub(10).max(1);
        for chunk in data.chunks(chunk_size) {
            self.protocol().send_receive_ack(Tag::CFl, chunk)?;
        }

        let secure = self.connection_config().secure_file_send;
        if secure {
            // secure-file-send acknowledges end of stream: one C_FD, one T_OK back
            self.protocol().send_receive_ack(Tag::CFd, &[])?;
        } else {
            // otherwise end of stream is fire-and-forget: the control never
            // answers a bare C_FD here
            self.protocol().send(Tag::CFd, &[])?;
        }
        debug!("sent {} bytes to {}", data.len(), full_remote_path);
        Ok(())
    }

    /// download `remote_path` to a local file. The remote file must already
    /// exist. An existing local file is left untouched and an error
    /// returned unless `override_existing` is set, in which case it is
    /// deleted first. Text files have the control's internal `0x00` line
    /// terminator rewritten to `\r\n`; binary files are written verbatim.
    pub fn receive_file(&mut self, remote_path: &str, local_path: &Path, override_existing: bool) -> Result<(), Error> {
        self.get_file_info(remote_path)?;

        if local_path.is_file() {
            if override_existing {
                fs::remove_file(local_path)?;
            } else {
                return Err(Error::Semantic(format!(
                    "{} already exists; pass override_existing to replace it",
                    local_path.display()
                )));
            }
        }

        let binary = codec::is_file_binary(remote_path);
        let mode = if binary { MODE_BINARY } else { 0 };
        let mut payload = nul_terminated(remote_path);
        payload.push(mode);

        let chunks = self.protocol().send_receive_block(Tag::RFl, &payload, Tag::SFl)?;
        let mut data: Vec<u8> = chunks.into_iter().flatten().collect();

        if !binary {
            data = rewrite_text_line_endings(&data);
        }

        fs::write(local_path, &data)?;
        debug!("received {} bytes from {}", data.len(), remote_path);
        Ok(())
    }

    /// capture the control's screen to a local bitmap file. The screen is
    /// first dumped to a temporary file on `TNC:`, downloaded, then removed.
    pub fn grab_screen_dump(&mut self, local_path: &Path) -> Result<(), Error> {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let remote_path = format!("TNC:\\screendump_{}.bmp", stamp);
        let mut payload = (crate::constant::ParCcc::ScreenDump as u16).to_be_bytes().to_vec();
        payload.extend(nul_terminated(&remote_path));
        self.protocol().send_receive_ack(Tag::CCc, &payload)?;
        self.receive_file(&remote_path, local_path, true)?;
        if let Err(e) = self.delete_file(&remote_path) {
            warn!("could not remove temporary screen dump {}: {}", remote_path, e);
        }
        Ok(())
    }
}

fn rewrite_text_line_endings(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == 0 {
            out.extend_from_slice(b"\r\n");
        } else {
            out.push(b);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{handshake_responses, MockTransport};
    use crate::client::Client;
    use crate::codec::SystemParameters;
    use std::collections::VecDeque;

    /// a handshake where the control refuses secure file send, leaving
    /// `secure_file_send = false` so the non-secure upload path is exercised.
    fn insecure_handshake_responses() -> VecDeque<(Tag, Vec<u8>)> {
        fn nul(s: &str) -> Vec<u8> {
            let mut v = s.as_bytes().to_vec();
            v.push(0);
            v
        }
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
        responses.push_back((Tag::TEr, vec![0, 1])); // C_CC secure file send refused
        responses.push_back((Tag::TOk, vec![])); // A_LG FILE
        responses
    }

    #[test]
    fn resolve_target_path_keeps_absolute_targets() {
        assert_eq!(
            resolve_target_path("TNC:\\NC_PROG\\a.h", "TNC:\\NC_PROG\\sub\\b.h"),
            "TNC:\\NC_PROG\\sub\\b.h"
        );
    }

    #[test]
    fn resolve_target_path_renames_in_place_for_bare_names() {
        assert_eq!(
            resolve_target_path("TNC:\\NC_PROG\\a.h", "b.h"),
            "TNC:\\NC_PROG\\b.h"
        );
    }

    #[test]
    fn resolve_target_path_handles_source_with_no_directory() {
        assert_eq!(resolve_target_path("a.h", "b.h"), "b.h");
    }

    #[test]
    fn change_directory_sends_ack_request() {
        let mut responses = handshake_responses();
        responses.push_back((Tag::TOk, vec![]));
        let mut client = Client::from_transport(
            MockTransport {
                responses,
                sent: vec![],
            },
            false,
            true,
        )
        .unwrap();
        client.change_directory("TNC:/NC_PROG").unwrap();
    }

    #[test]
    fn get_directory_info_decodes_path() {
        let mut responses = handshake_responses();
        let mut body = b"TNC:\\NC_PROG\0".to_vec();
        body.extend_from_slice(&0u16.to_be_bytes());
        responses.push_back((Tag::SDi, body));
        let mut client = Client::from_transport(
            MockTransport {
                responses,
                sent: vec![],
            },
            false,
            true,
        )
        .unwrap();

        let info = client.get_directory_info().unwrap();
        assert_eq!(info.path, "TNC:\\NC_PROG");
    }

    #[test]
    fn rewrite_text_line_endings_replaces_nul_with_crlf() {
        let input = b"N10 L X0\0N20 L X1\0";
        let out = rewrite_text_line_endings(input);
        assert_eq!(out, b"N10 L X0\r\nN20 L X1\r\n".to_vec());
    }

    fn directory_entry(name: &str) -> Vec<u8> {
        let mut body = vec![0u8; 8];
        body.push(codec::FileAttributes::DIRECTORY);
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        body
    }

    #[test]
    fn send_file_chunks_payload_by_negotiated_buffer_size() {
        let mut responses = handshake_responses();
        // make_directory walks "TNC:" then "TNC:\NC_PROG", both already present
        responses.push_back((Tag::SFi, directory_entry("TNC:")));
        responses.push_back((Tag::SFi, directory_entry("NC_PROG")));
        responses.push_back((Tag::TOk, vec![])); // change_directory into TNC:\NC_PROG
        responses.push_back((Tag::TEr, vec![1, 4])); // get_file_info on TEST.H: not found
        // the handshake leaves secure_file_send enabled: header ack, one data
        // chunk ack (file is tiny), then a single C_FD/T_OK end-of-stream exchange
        responses.push_back((Tag::TOk, vec![]));
        responses.push_back((Tag::TOk, vec![]));
        responses.push_back((Tag::TOk, vec![]));
        let mut client = Client::from_transport(
            MockTransport {
                responses,
                sent: vec![],
            },
            false,
            true,
        )
        .unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join("lsv2_fs_test_upload.h");
        std::fs::write(&path, b"0 BEGIN PGM TEST MM\n").unwrap();

        client
            .send_file(&path, "TNC:\\NC_PROG\\TEST.H", false)
            .unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn send_file_end_of_stream_is_fire_and_forget_without_secure_send() {
        let mut responses = insecure_handshake_responses();
        responses.push_back((Tag::SFi, directory_entry("TNC:")));
        responses.push_back((Tag::SFi, directory_entry("NC_PROG")));
        responses.push_back((Tag::TOk, vec![])); // change_directory into TNC:\NC_PROG
        responses.push_back((Tag::TEr, vec![1, 4])); // get_file_info on TEST.H: not found
        responses.push_back((Tag::TOk, vec![])); // header ack
        responses.push_back((Tag::TOk, vec![])); // one data chunk ack (file is tiny)
        // no response queued for the final C_FD: it must be sent
        // fire-and-forget, or the empty queue would panic the exchange.
        let mut client = Client::from_transport(
            MockTransport {
                responses,
                sent: vec![],
            },
            false,
            true,
        )
        .unwrap();
        assert!(!client.connection_config().secure_file_send);

        let dir = std::env::temp_dir();
        let path = dir.join("lsv2_fs_test_upload_insecure.h");
        std::fs::write(&path, b"0 BEGIN PGM TEST MM\n").unwrap();

        client
            .send_file(&path, "TNC:\\NC_PROG\\TEST.H", false)
            .unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn make_directory_skips_existing_prefixes() {
        let mut responses = handshake_responses();
        responses.push_back((Tag::SFi, directory_entry("TNC:")));
        responses.push_back((Tag::TEr, vec![1, 4])); // NC_PROG missing
        responses.push_back((Tag::TOk, vec![])); // C_DM NC_PROG
        let mut client = Client::from_transport(
            MockTransport {
                responses,
                sent: vec![],
            },
            false,
            true,
        )
        .unwrap();

        client.make_directory("TNC:\\NC_PROG").unwrap();
    }

    #[test]
    fn send_file_refuses_existing_remote_without_override() {
        let mut responses = handshake_responses();
        responses.push_back((Tag::SFi, directory_entry("TNC:")));
        responses.push_back((Tag::SFi, directory_entry("NC_PROG")));
        responses.push_back((Tag::TOk, vec![])); // change_directory
        responses.push_back((Tag::SFi, directory_entry("TEST.H"))); // already exists
        let mut client = Client::from_transport(
            MockTransport {
                responses,
                sent: vec![],
            },
            false,
            true,
        )
        .unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join("lsv2_fs_test_upload_refuse.h");
        std::fs::write(&path, b"0 BEGIN PGM TEST MM\n").unwrap();

        let err = client
            .send_file(&path, "TNC:\\NC_PROG\\TEST.H", false)
            .unwrap_err();
        assert!(matches!(err, Error::Semantic(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn receive_file_refuses_existing_local_without_override() {
        let mut responses = handshake_responses();
        responses.push_back((Tag::SFi, directory_entry("TEST.H"))); // remote exists
        let mut client = Client::from_transport(
            MockTransport {
                responses,
                sent: vec![],
            },
            false,
            true,
        )
        .unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join("lsv2_fs_test_download_refuse.h");
        std::fs::write(&path, b"already here").unwrap();

        let err = client
            .receive_file("TNC:\\NC_PROG\\TEST.H", &path, false)
            .unwrap_err();
        assert!(matches!(err, Error::Semantic(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn grab_screen_dump_downloads_and_removes_the_temporary_file() {
        let mut responses = handshake_responses();
        responses.push_back((Tag::TOk, vec![])); // C_CC SCREENDUMP with the remote path
        responses.push_back((Tag::SFi, directory_entry("SCREENDUMP.BMP"))); // get_file_info existence check
        responses.push_back((Tag::SFl, b"\x42\x4d\x00\x00".to_vec()));
        responses.push_back((Tag::TFd, vec![]));
        responses.push_back((Tag::TOk, vec![])); // delete_file of the temporary dump
        let mut client = Client::from_transport(
            MockTransport {
                responses,
                sent: vec![],
            },
            false,
            true,
        )
        .unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join("lsv2_fs_test_screendump.bmp");
        std::fs::remove_file(&path).ok();

        client.grab_screen_dump(&path).unwrap();
        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents, b"\x42\x4d\x00\x00".to_vec());
        std::fs::remove_file(&path).ok();
    }
}
