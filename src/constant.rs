// Tag and subselector constants for the LSV2 wire protocol.
//
// A telegram tag is printed everywhere in the spec and in logs as a 4-character
// mnemonic such as `A_LG` or `T_OK`: the letter before the underscore names the
// tag's category (`A_` admin, `C_` command, `R_` read, `S_` success, `T_`
// terminal/status) and is not carried on the wire. Only the two characters
// after the underscore are the actual wire bytes.

use std::fmt;

/// a telegram tag: 2 ASCII bytes on the wire, printed with its category prefix
///
/// `Unknown` preserves any tag this crate does not recognize rather than
/// guessing at its meaning, per the "unknown bytes are preserved or logged
/// verbatim" rule in the spec's non-goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    // commands, client -> control
    ALg,
    ALo,
    CCc,
    CDc,
    CDm,
    CDd,
    CFc,
    CFr,
    CFd,
    CFl,
    CLk,
    CEk,
    CMc,
    RVr,
    RPr,
    RDi,
    RDr,
    RFi,
    RFl,
    RMb,
    RMc,
    RRi,
    RDp,
    // responses, control -> client
    SVr,
    SPr,
    SDi,
    SDr,
    SFi,
    SFl,
    SMb,
    SMc,
    SRi,
    SDp,
    TOk,
    TFd,
    TEr,
    TBd,
    /// a tag this crate does not recognize; the raw wire bytes are preserved
    Unknown([u8; 2]),
}

impl Tag {
    /// the 2 bytes actually written on the wire
    pub fn wire_bytes(&self) -> [u8; 2] {
        match self {
            Tag::ALg => *b"LG",
            Tag::ALo => *b"LO",
            Tag::CCc => *b"CC",
            Tag::CDc => *b"DC",
            Tag::CDm => *b"DM",
            Tag::CDd => *b"DD",
            Tag::CFc => *b"FC",
            Tag::CFr => *b"FR",
            Tag::CFd => *b"FD",
            Tag::CFl => *b"FL",
            Tag::CLk => *b"LK",
            Tag::CEk => *b"EK",
            Tag::CMc => *b"MC",
            Tag::RVr => *b"VR",
            Tag::RPr => *b"PR",
            Tag::RDi => *b"DI",
            Tag::RDr => *b"DR",
            Tag::RFi => *b"FI",
            Tag::RFl => *b"FL",
            Tag::RMb => *b"MB",
            Tag::RMc => *b"MC",
            Tag::RRi => *b"RI",
            Tag::RDp => *b"DP",
            Tag::SVr => *b"VR",
            Tag::SPr => *b"PR",
            Tag::SDi => *b"DI",
            Tag::SDr => *b"DR",
            Tag::SFi => *b"FI",
            Tag::SFl => *b"FL",
            Tag::SMb => *b"MB",
            Tag::SMc => *b"MC",
            Tag::SRi => *b"RI",
            Tag::SDp => *b"DP",
            Tag::TOk => *b"OK",
            Tag::TFd => *b"FD",
            Tag::TEr => *b"ER",
            Tag::TBd => *b"BD",
            Tag::Unknown(raw) => *raw,
        }
    }

    /// the human-readable mnemonic, including its category prefix, used only
    /// for logging and error messages -- never placed on the wire
    pub fn mnemonic(&self) -> String {
        match self {
            Tag::ALg => "A_LG".into(),
            Tag::ALo => "A_LO".into(),
            Tag::CCc => "C_CC".into(),
            Tag::CDc => "C_DC".into(),
            Tag::CDm => "C_DM".into(),
            Tag::CDd => "C_DD".into(),
            Tag::CFc => "C_FC".into(),
            Tag::CFr => "C_FR".into(),
            Tag::CFd => "C_FD".into(),
            Tag::CFl => "C_FL".into(),
            Tag::CLk => "C_LK".into(),
            Tag::CEk => "C_EK".into(),
            Tag::CMc => "C_MC".into(),
            Tag::RVr => "R_VR".into(),
            Tag::RPr => "R_PR".into(),
            Tag::RDi => "R_DI".into(),
            Tag::RDr => "R_DR".into(),
            Tag::RFi => "R_FI".into(),
            Tag::RFl => "R_FL".into(),
            Tag::RMb => "R_MB".into(),
            Tag::RMc => "R_MC".into(),
            Tag::RRi => "R_RI".into(),
            Tag::RDp => "R_DP".into(),
            Tag::SVr => "S_VR".into(),
            Tag::SPr => "S_PR".into(),
            Tag::SDi => "S_DI".into(),
            Tag::SDr => "S_DR".into(),
            Tag::SFi => "S_FI".into(),
            Tag::SFl => "S_FL".into(),
            Tag::SMb => "S_MB".into(),
            Tag::SMc => "S_MC".into(),
            Tag::SRi => "S_RI".into(),
            Tag::SDp => "S_DP".into(),
            Tag::TOk => "T_OK".into(),
            Tag::TFd => "T_FD".into(),
            Tag::TEr => "T_ER".into(),
            Tag::TBd => "T_BD".into(),
            Tag::Unknown(raw) => format!("?_{}{}", raw[0] as char, raw[1] as char),
        }
    }

    /// decode a response tag from its wire bytes (control -> client direction)
    pub fn from_response_bytes(raw: [u8; 2]) -> Tag {
        match &raw {
            b"VR" => Tag::SVr,
            b"PR" => Tag::SPr,
            b"DI" => Tag::SDi,
            b"DR" => Tag::SDr,
            b"FI" => Tag::SFi,
            b"FL" => Tag::SFl,
            b"MB" => Tag::SMb,
            b"MC" => Tag::SMc,
            b"RI" => Tag::SRi,
            b"DP" => Tag::SDp,
            b"OK" => Tag::TOk,
            b"FD" => Tag::TFd,
            b"ER" => Tag::TEr,
            b"BD" => Tag::TBd,
            _ => Tag::Unknown(raw),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// an enumerated access level (login name) obtained via `A_LG`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    Inspect,
    FileTransfer,
    Monitor,
    Dnc,
    PlcDebug,
    Data,
}

impl AccessLevel {
    /// the literal ASCII login name placed, NUL-terminated, in the `A_LG` payload
    pub fn login_name(&self) -> &'static str {
        match self {
            AccessLevel::Inspect => "INSPECT",
            AccessLevel::FileTransfer => "FILE",
            AccessLevel::Monitor => "MONITOR",
            AccessLevel::Dnc => "DNC",
            AccessLevel::PlcDebug => "PLCDEBUG",
            AccessLevel::Data => "DATA",
        }
    }

    pub const ALL: [AccessLevel; 6] = [
        AccessLevel::Inspect,
        AccessLevel::FileTransfer,
        AccessLevel::Monitor,
        AccessLevel::Dnc,
        AccessLevel::PlcDebug,
        AccessLevel::Data,
    ];
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.login_name())
    }
}

/// the control variant inferred from the `CONTROL` version string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVariant {
    MillNew,
    MillOld,
    LatheNew,
    Unknown,
}

/// `R_VR` sub-selector, sent as a single byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParRvr {
    Control = 1,
    NcVersion = 2,
    PlcVersion = 3,
    Options = 4,
    Id = 5,
    ReleaseType = 6,
    SplcVersion = 7,
}

/// `C_CC` sub-command, sent as a big-endian u16
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParCcc {
    SetBuf512 = 1,
    SetBuf1024 = 2,
    SetBuf2048 = 3,
    SetBuf3072 = 4,
    SetBuf4096 = 5,
    SecureFileSend = 6,
    ScreenDump = 7,
}

/// `R_DR` sub-selector, sent as a single byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParRdr {
    Single = 0,
    Drives = 1,
}

/// `R_RI` sub-selector, sent as a big-endian u16
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParRri {
    PgmState = 1,
    SelectedPgm = 2,
    ExecState = 3,
    Override = 4,
    CurrentTool = 5,
    FirstError = 6,
    NextError = 7,
    AxisLocation = 8,
}

/// PLC memory area addressed by `R_MB`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Marker,
    Input,
    Output,
    Counter,
    Timer,
    Byte,
    Word,
    DWord,
    String,
    InputWord,
    OutputWord,
}

/// path separator used on the wire; every outbound path has `/` normalised to this
pub const PATH_SEP: char = '\\';

/// mode byte forcing binary transfer in `send_file`/`receive_file`
pub const MODE_BINARY: u8 = 1;

/// default transport-level port for LSV2 (well-known control port)
pub const DEFAULT_PORT: u16 = 19000;

/// initial, pre-handshake buffer size
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// the closed set of supported buffer sizes, largest first
pub const SUPPORTED_BUFFER_SIZES: [usize; 6] = [4096, 3072, 2048, 1024, 512, 256];
