// Pure, side-effect free decoders for the fixed binary record layouts carried
// in telegram payloads. No decoder here touches the network; they all take
// already-received byte slices and return structured records.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::Error;

/// decode a NUL-terminated string using the caller-configured text policy,
/// stopping at the first NUL (or the end of the slice if there is none).
pub fn decode_nul_terminated(bytes: &[u8], lossy: bool) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    if lossy {
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    } else {
        String::from_utf8(bytes[..end].to_vec()).unwrap_or_else(|e| {
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        })
    }
}

/// split a buffer containing one or more NUL-terminated strings into its parts
fn split_nul_segments(bytes: &[u8], lossy: bool) -> Vec<String> {
    bytes
        .split(|&b| b == 0)
        .map(|seg| decode_nul_terminated(seg, lossy))
        .collect()
}

fn require_len(bytes: &[u8], min: usize, what: &str) -> Result<(), Error> {
    if bytes.len() < min {
        return Err(Error::Decode {
            reason: format!("{} requires at least {} bytes, got {}", what, min, bytes.len()),
            bytes: bytes.to_vec(),
        });
    }
    Ok(())
}

/// decoded `S_PR` response: system parameters.
///
/// Field order and widths are reconstructed from the system-parameter keys
/// actually read in `original_source/pyLSV2/client.py` (`Marker_Start`,
/// `Markers`, `Input_Start`, ... `Max_Block_Length`). The original's
/// struct-format strings were not part of the retrieval pack; every counter
/// here is decoded as big-endian u32, which is consistent with every value
/// observed being used as a byte offset or element count (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemParameters {
    pub marker_start: u32,
    pub markers: u32,
    pub input_start: u32,
    pub inputs: u32,
    pub output_start: u32,
    pub outputs: u32,
    pub counter_start: u32,
    pub counters: u32,
    pub timer_start: u32,
    pub timers: u32,
    pub word_start: u32,
    pub words: u32,
    pub string_start: u32,
    pub strings: u32,
    pub string_length: u32,
    pub input_word_start: u32,
    pub input_words: u32,
    pub output_word_start: u32,
    pub output_words: u32,
    pub max_block_length: u32,
    pub lsv2_version: u32,
}

impl SystemParameters {
    pub const ENCODED_LEN: usize = 21 * 4;

    pub fn decode(bytes: &[u8]) -> Result<SystemParameters, Error> {
        require_len(bytes, Self::ENCODED_LEN, "system parameters")?;
        let mut f = [0u32; 21];
        for (i, slot) in f.iter_mut().enumerate() {
            *slot = BigEndian::read_u32(&bytes[i * 4..i * 4 + 4]);
        }
        Ok(SystemParameters {
            marker_start: f[0],
            markers: f[1],
            input_start: f[2],
            inputs: f[3],
            output_start: f[4],
            outputs: f[5],
            counter_start: f[6],
            counters: f[7],
            timer_start: f[8],
            timers: f[9],
            word_start: f[10],
            words: f[11],
            string_start: f[12],
            strings: f[13],
            string_length: f[14],
            input_word_start: f[15],
            input_words: f[16],
            output_word_start: f[17],
            output_words: f[18],
            max_block_length: f[19],
            lsv2_version: f[20],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let values = [
            self.marker_start,
            self.markers,
            self.input_start,
            self.inputs,
            self.output_start,
            self.outputs,
            self.counter_start,
            self.counters,
            self.timer_start,
            self.timers,
            self.word_start,
            self.words,
            self.string_start,
            self.strings,
            self.string_length,
            self.input_word_start,
            self.input_words,
            self.output_word_start,
            self.output_words,
            self.max_block_length,
            self.lsv2_version,
        ];
        let mut out = vec![0u8; Self::ENCODED_LEN];
        for (i, v) in values.iter().enumerate() {
            BigEndian::write_u32(&mut out[i * 4..i * 4 + 4], *v);
        }
        out
    }
}

/// decoded `S_DI` response: info about the current working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryInfo {
    pub path: String,
    /// bit-set attribute flags for the directory itself
    pub attributes: u16,
}

impl DirectoryInfo {
    pub fn decode(bytes: &[u8], lossy: bool) -> Result<DirectoryInfo, Error> {
        let nul_at = bytes.iter().position(|&b| b == 0).ok_or_else(|| Error::Decode {
            reason: "directory info path is not NUL-terminated".into(),
            bytes: bytes.to_vec(),
        })?;
        let path = decode_nul_terminated(&bytes[..nul_at], lossy);
        let rest = &bytes[nul_at + 1..];
        let attributes = if rest.len() >= 2 {
            BigEndian::read_u16(&rest[0..2])
        } else {
            0
        };
        Ok(DirectoryInfo { path, attributes })
    }
}

// a tiny local stand-in for a bitflags-style constant block; kept dependency
// free since the four flags here are the entire surface this crate needs.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(pub const $flag:ident: $ty:ty = $val:expr;)*
        }
    ) => {
        $(#[$meta])*
        pub struct $name;
        impl $name {
            $(pub const $flag: $ty = $val;)*
        }
    };
}

bitflags_like! {
    /// attribute bits carried in a [`FileSystemEntry`]
    pub struct FileAttributes {
        pub const DIRECTORY: u8 = 0x01;
        pub const DRIVE: u8 = 0x02;
        pub const HIDDEN: u8 = 0x04;
        pub const READ_ONLY: u8 = 0x08;
    }
}

/// decoded `S_DR`/`S_FI` directory entry or file-info record.
///
/// Header layout: `size: u32 BE`, `timestamp: u32 BE` (UNIX epoch seconds on
/// new-style mills; control-specific on older variants, preserved verbatim
/// either way), `attributes: u8`, then a NUL-terminated name. Older lathe and
/// mill variants have been observed to pad the header; this decoder only
/// requires the fixed 9-byte prefix and treats anything beyond it up to the
/// first NUL as the name, which is robust to the control-variant header-width
/// differences called out in the spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemEntry {
    pub size: u32,
    pub timestamp: u32,
    pub attributes: u8,
    pub name: String,
}

impl FileSystemEntry {
    pub const HEADER_LEN: usize = 9;

    pub fn decode(bytes: &[u8], lossy: bool) -> Result<FileSystemEntry, Error> {
        require_len(bytes, Self::HEADER_LEN, "filesystem entry")?;
        let size = BigEndian::read_u32(&bytes[0..4]);
        let timestamp = BigEndian::read_u32(&bytes[4..8]);
        let attributes = bytes[8];
        let name = decode_nul_terminated(&bytes[Self::HEADER_LEN..], lossy);
        Ok(FileSystemEntry {
            size,
            timestamp,
            attributes,
            name,
        })
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & FileAttributes::DIRECTORY != 0
    }

    pub fn is_drive(&self) -> bool {
        self.attributes & FileAttributes::DRIVE != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes & FileAttributes::HIDDEN != 0
    }
}

/// decoded `S_RI` `CURRENT_TOOL` response: a little-endian numeric triple
/// (tool number, tool index/pocket, spare/axis field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolInfo {
    pub tool_number: i32,
    pub tool_index: i16,
    pub spare: i16,
}

impl ToolInfo {
    pub const ENCODED_LEN: usize = 8;

    pub fn decode(bytes: &[u8]) -> Result<ToolInfo, Error> {
        require_len(bytes, Self::ENCODED_LEN, "tool info")?;
        Ok(ToolInfo {
            tool_number: LittleEndian::read_i32(&bytes[0..4]),
            tool_index: LittleEndian::read_i16(&bytes[4..6]),
            spare: LittleEndian::read_i16(&bytes[6..8]),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::ENCODED_LEN];
        LittleEndian::write_i32(&mut out[0..4], self.tool_number);
        LittleEndian::write_i16(&mut out[4..6], self.tool_index);
        LittleEndian::write_i16(&mut out[6..8], self.spare);
        out
    }
}

/// decoded `S_RI` `OVERRIDE` response: a little-endian numeric triple of
/// feed-rate, spindle-speed and rapid-traverse override percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideInfo {
    pub feed_percent: u16,
    pub spindle_percent: u16,
    pub rapid_percent: u16,
}

impl OverrideInfo {
    pub const ENCODED_LEN: usize = 6;

    pub fn decode(bytes: &[u8]) -> Result<OverrideInfo, Error> {
        require_len(bytes, Self::ENCODED_LEN, "override info")?;
        Ok(OverrideInfo {
            feed_percent: LittleEndian::read_u16(&bytes[0..2]),
            spindle_percent: LittleEndian::read_u16(&bytes[2..4]),
            rapid_percent: LittleEndian::read_u16(&bytes[4..6]),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::ENCODED_LEN];
        LittleEndian::write_u16(&mut out[0..2], self.feed_percent);
        LittleEndian::write_u16(&mut out[2..4], self.spindle_percent);
        LittleEndian::write_u16(&mut out[4..6], self.rapid_percent);
        out
    }
}

/// decoded `S_RI` `FIRST_ERROR`/`NEXT_ERROR` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub group: u8,
    pub code: u8,
    pub channel: String,
    pub error_group: String,
    pub error_type: String,
    pub text: String,
}

impl ErrorMessage {
    pub fn decode(bytes: &[u8], lossy: bool) -> Result<ErrorMessage, Error> {
        require_len(bytes, 2, "error message")?;
        let group = bytes[0];
        let code = bytes[1];
        let segments = split_nul_segments(&bytes[2..], lossy);
        let mut it = segments.into_iter();
        Ok(ErrorMessage {
            group,
            code,
            channel: it.next().unwrap_or_default(),
            error_group: it.next().unwrap_or_default(),
            error_type: it.next().unwrap_or_default(),
            text: it.next().unwrap_or_default(),
        })
    }
}

/// extensions the control treats as binary payloads; everything else is sent
/// and received as text (with `0x00` <-> CRLF remapping on download). This is
/// the closed allow-list named in the spec; unrecognised extensions are text.
const BINARY_EXTENSIONS: &[&str] = &[
    "bin", "bak", "cmz", "clt", "bmp", "jpg", "jpeg", "png", "gif", "ico", "zip", "rar", "7z",
    "gz", "tar", "pdf", "a", "o", "so", "dll", "exe", "elf",
];

/// classify a file name as binary (true) or text (false) by its extension
pub fn is_file_binary(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}
