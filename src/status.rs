// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Status and data readers: program state, PLC memory, machine parameters,
//! the iTNC data path, and the keyboard lock.

use byteorder::{BigEndian, ByteOrder};

use crate::client::Client;
use crate::codec::{self, ErrorMessage, OverrideInfo, ToolInfo};
use crate::constant::{AccessLevel, MemoryType, ParRri, Tag};
use crate::error::{Error, T_ER_NO_NEXT_ERROR};
use crate::transport::Transport;

/// raw program run state reported by `R_RI PGM_STATE`. The control's
/// numeric codes were not part of the retrieval pack; rather than invent
/// named variants this preserves the raw code and leaves interpretation to
/// the caller (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramState(pub u16);

/// raw execution state reported by `R_RI EXEC_STATE`, same rationale as
/// [`ProgramState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionState(pub u16);

/// the selected program and current line, from `R_RI SELECTED_PGM`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramStack {
    pub line: u32,
    pub main_program: String,
    pub current_program: String,
}

/// one axis reading from `R_RI AXIS_LOCATION`
#[derive(Debug, Clone, PartialEq)]
pub struct AxisPosition {
    pub label: String,
    pub value: f64,
}

/// a decoded `R_DP` value: the iTNC data-path type codes named in the spec
/// (2, 3, 5, 8, 11, 16, 17). Any other type code is a fatal decode error
/// rather than a guess, per the spec's Open Questions.
#[derive(Debug, Clone, PartialEq)]
pub enum DataPathValue {
    Int16(i16),
    Int32(i32),
    Float(f64),
    String(String),
    Bool(bool),
    Int8(i8),
    UInt8(u8),
}

fn memory_layout(mem_type: MemoryType, sys: &codec::SystemParameters) -> (u32, u32, usize) {
    match mem_type {
        MemoryType::Marker => (sys.marker_start, sys.markers, 1),
        MemoryType::Input => (sys.input_start, sys.inputs, 1),
        MemoryType::Output => (sys.output_start, sys.outputs, 1),
        MemoryType::Counter => (sys.counter_start, sys.counters, 1),
        MemoryType::Timer => (sys.timer_start, sys.timers, 1),
        MemoryType::Word => (sys.word_start, sys.words, 2),
        MemoryType::String => (sys.string_start, sys.strings, sys.string_length.max(1) as usize),
        MemoryType::InputWord => (sys.input_word_start, sys.input_words, 2),
        MemoryType::OutputWord => (sys.output_word_start, sys.output_words, 2),
        // raw address spaces: the control does not report a range for these,
        // any address is accepted and bounds-checked only by the control itself
        MemoryType::Byte => (0, u32::MAX, 1),
        MemoryType::DWord => (0, u32::MAX, 4),
    }
}

/// decode the value that follows a 4-byte BE type code in an `R_DP`
/// response. `value` is everything after those 4 bytes. Type codes are
/// enumerated from observation (see spec Open Questions); anything else
/// fails rather than being guessed at.
fn decode_data_path_value(type_code: u32, value: &[u8], lossy: bool) -> Result<DataPathValue, Error> {
    let need = |min: usize| -> Result<(), Error> {
        if value.len() < min {
            Err(Error::Decode {
                reason: format!("R_DP value for type {} requires {} bytes, got {}", type_code, min, value.len()),
                bytes: value.to_vec(),
            })
        } else {
            Ok(())
        }
    };
    match type_code {
        2 => {
            need(2)?;
            Ok(DataPathValue::Int16(BigEndian::read_i16(&value[0..2])))
        }
        3 => {
            need(4)?;
            Ok(DataPathValue::Int32(BigEndian::read_i32(&value[0..4])))
        }
        5 => {
            need(8)?;
            Ok(DataPathValue::Float(byteorder::LittleEndian::read_f64(&value[0..8])))
        }
        8 => Ok(DataPathValue::String(codec::decode_nul_terminated(value, lossy))),
        11 => {
            need(1)?;
            Ok(DataPathValue::Bool(value[0] != 0))
        }
        16 => {
            need(1)?;
            Ok(DataPathValue::Int8(value[0] as i8))
        }
        17 => {
            need(1)?;
            Ok(DataPathValue::UInt8(value[0]))
        }
        other => Err(Error::Decode {
            reason: format!("unknown R_DP value type {}", other),
            bytes: value.to_vec(),
        }),
    }
}

fn ri_payload(selector: ParRri) -> [u8; 2] {
    let mut buf = [0u8; 2];
    BigEndian::write_u16(&mut buf, selector as u16);
    buf
}

impl<T: Transport> Client<T> {
    /// `R_RI` status queries observably require `DNC` on the controls this
    /// was ported from; each of them logs in at that level first (a no-op
    /// once already held), exactly as the original client does.
    fn ensure_dnc(&mut self) -> Result<(), Error> {
        self.login(AccessLevel::Dnc, None)
    }

    pub fn get_program_state(&mut self) -> Result<ProgramState, Error> {
        self.ensure_dnc()?;
        let body = self
            .protocol()
            .send_receive(Tag::RRi, &ri_payload(ParRri::PgmState), &[Tag::SRi])?;
        if body.len() < 2 {
            return Err(Error::Decode {
                reason: "PGM_STATE response shorter than its u16 code".into(),
                bytes: body,
            });
        }
        Ok(ProgramState(BigEndian::read_u16(&body[0..2])))
    }

    pub fn get_execution_state(&mut self) -> Result<ExecutionState, Error> {
        self.ensure_dnc()?;
        let body = self
            .protocol()
            .send_receive(Tag::RRi, &ri_payload(ParRri::ExecState), &[Tag::SRi])?;
        if body.len() < 2 {
            return Err(Error::Decode {
                reason: "EXEC_STATE response shorter than its u16 code".into(),
                bytes: body,
            });
        }
        Ok(ExecutionState(BigEndian::read_u16(&body[0..2])))
    }

    pub fn get_program_stack(&mut self) -> Result<ProgramStack, Error> {
        self.ensure_dnc()?;
        let lossy = self.lossy();
        let body = self
            .protocol()
            .send_receive(Tag::RRi, &ri_payload(ParRri::SelectedPgm), &[Tag::SRi])?;
        if body.len() < 4 {
            return Err(Error::Decode {
                reason: "SELECTED_PGM response shorter than its line-number field".into(),
                bytes: body,
            });
        }
        let line = BigEndian::read_u32(&body[0..4]);
        let rest = &body[4..];
        let mut segments = rest.splitn(2, |&b| b == 0);
        let main_program = codec::decode_nul_terminated(segments.next().unwrap_or(&[]), lossy);
        let current_program = segments
            .next()
            .map(|s| codec::decode_nul_terminated(s, lossy))
            .unwrap_or_else(|| main_program.clone());
        Ok(ProgramStack {
            line,
            main_program,
            current_program,
        })
    }

    pub fn get_override_info(&mut self) -> Result<OverrideInfo, Error> {
        self.ensure_dnc()?;
        let body = self
            .protocol()
            .send_receive(Tag::RRi, &ri_payload(ParRri::Override), &[Tag::SRi])?;
        OverrideInfo::decode(&body)
    }

    pub fn get_current_tool(&mut self) -> Result<ToolInfo, Error> {
        self.ensure_dnc()?;
        let body = self
            .protocol()
            .send_receive(Tag::RRi, &ri_payload(ParRri::CurrentTool), &[Tag::SRi])?;
        ToolInfo::decode(&body)
    }

    /// the response is one unknown leading byte (not interpreted, see
    /// DESIGN.md), one axis count `N`, then `2N` NUL-delimited ASCII
    /// strings: the first `N` tokens are decimal values, the next `N` are
    /// the corresponding axis labels (`label[i] -> value[i].parse::<f64>()`,
    /// not interleaved per axis).
    pub fn get_axes_location(&mut self) -> Result<Vec<AxisPosition>, Error> {
        self.ensure_dnc()?;
        let lossy = self.lossy();
        let body = self
            .protocol()
            .send_receive(Tag::RRi, &ri_payload(ParRri::AxisLocation), &[Tag::SRi])?;
        if body.len() < 2 {
            return Err(Error::Decode {
                reason: "AXIS_LOCATION response shorter than its header".into(),
                bytes: body,
            });
        }
        let axis_count = body[1] as usize;

        let mut tokens = Vec::with_capacity(2 * axis_count);
        let mut rest = &body[2..];
        while !rest.is_empty() && tokens.len() < 2 * axis_count {
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            tokens.push(codec::decode_nul_terminated(&rest[..end], lossy));
            rest = rest.get(end + 1..).unwrap_or(&[]);
        }
        if tokens.len() != 2 * axis_count {
            return Err(Error::Decode {
                reason: format!(
                    "AXIS_LOCATION expected {} value/label tokens, got {}",
                    2 * axis_count,
                    tokens.len()
                ),
                bytes: body,
            });
        }

        let mut positions = Vec::with_capacity(axis_count);
        for i in 0..axis_count {
            let label = tokens[axis_count + i].clone();
            let value = tokens[i].parse::<f64>().map_err(|_| Error::Decode {
                reason: format!("AXIS_LOCATION value {:?} is not a valid float", tokens[i]),
                bytes: body.clone(),
            })?;
            positions.push(AxisPosition { label, value });
        }
        Ok(positions)
    }

    /// drain the control's error queue starting from the first pending
    /// error, via `FIRST_ERROR`/`NEXT_ERROR`. The control signals the end of
    /// the queue with a `T_ER` carrying [`T_ER_NO_NEXT_ERROR`] rather than a
    /// normal response; that particular error is the success case here and
    /// is not propagated.
    pub fn get_error_messages(&mut self) -> Result<Vec<ErrorMessage>, Error> {
        self.ensure_dnc()?;
        let lossy = self.lossy();
        let mut messages = Vec::new();

        let first = self
            .protocol()
            .send_receive(Tag::RRi, &ri_payload(ParRri::FirstError), &[Tag::SRi]);
        let mut body = match first {
            Ok(body) => body,
            Err(Error::ControlError { group, code }) if (group, code) == T_ER_NO_NEXT_ERROR => {
                return Ok(messages);
            }
            Err(e) => return Err(e),
        };

        loop {
            messages.push(ErrorMessage::decode(&body, lossy)?);
            match self
                .protocol()
                .send_receive(Tag::RRi, &ri_payload(ParRri::NextError), &[Tag::SRi])
            {
                Ok(next_body) => body = next_body,
                Err(Error::ControlError { group, code }) if (group, code) == T_ER_NO_NEXT_ERROR => break,
                Err(e) => return Err(e),
            }
        }
        Ok(messages)
    }

    pub fn get_machine_parameter(&mut self, name: &str) -> Result<String, Error> {
        let lossy = self.lossy();
        let mut payload = name.as_bytes().to_vec();
        payload.push(0);
        let body = self.protocol().send_receive(Tag::RMc, &payload, &[Tag::SMc])?;
        Ok(codec::decode_nul_terminated(&body, lossy))
    }

    /// write a machine parameter. `persist_to_disk` selects whether the
    /// change survives a reboot (`0`) or is volatile (`1`), per the 4-byte
    /// BE flag the control expects ahead of the NUL-terminated name/value
    /// pair. Requires `PLCDEBUG`.
    pub fn set_machine_parameter(&mut self, name: &str, value: &str, persist_to_disk: bool) -> Result<(), Error> {
        let mut payload = vec![0u8; 4];
        BigEndian::write_u32(&mut payload[0..4], if persist_to_disk { 0 } else { 1 });
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        payload.extend_from_slice(value.as_bytes());
        payload.push(0);
        self.protocol().send_receive_ack(Tag::CMc, &payload)
    }

    pub fn set_keyboard_access(&mut self, locked: bool) -> Result<(), Error> {
        self.login(AccessLevel::Monitor, None)?;
        let payload = [u8::from(locked)];
        self.protocol().send_receive_ack(Tag::CLk, &payload)
    }

    pub fn send_key_code(&mut self, key_code: u16) -> Result<(), Error> {
        self.login(AccessLevel::Monitor, None)?;
        let mut payload = [0u8; 2];
        BigEndian::write_u16(&mut payload, key_code);
        self.protocol().send_receive_ack(Tag::CEk, &payload)
    }

    /// read `count` consecutive elements of `mem_type`, starting at
    /// `index` elements past the start of that memory area. `STRING` reads
    /// are issued one element per request since each string occupies a
    /// fixed-but-generous slot the control does not pack contiguously.
    pub fn read_plc_memory(
        &mut self,
        mem_type: MemoryType,
        index: u32,
        count: u32,
    ) -> Result<Vec<Vec<u8>>, Error> {
        if count == 0 || count > 255 {
            return Err(Error::Semantic(format!(
                "PLC memory read count must be between 1 and 255, got {}",
                count
            )));
        }
        self.login(AccessLevel::PlcDebug, None)?;
        let sys = self.system_parameters(false)?;
        let (start, max_count, element_size) = memory_layout(mem_type, &sys);
        if max_count != u32::MAX && index.saturating_add(count) > max_count {
            return Err(Error::Semantic(format!(
                "requested {} element(s) at index {} exceeds the control's {:?} range of {}",
                count, index, mem_type, max_count
            )));
        }

        if mem_type == MemoryType::String {
            let mut out = Vec::with_capacity(count as usize);
            for i in 0..count {
                let address = start + (index + i) * element_size as u32;
                out.push(self.request_memory(address, 1, element_size)?);
            }
            Ok(out)
        } else {
            let address = start + index * element_size as u32;
            let body = self.request_memory(address, count, element_size)?;
            Ok(body.chunks(element_size).map(|c| c.to_vec()).collect())
        }
    }

    /// the control takes the byte length of the read, not separate count and
    /// element-size fields: `address(4 BE) || (count*element_size as u8)`.
    fn request_memory(&mut self, address: u32, count: u32, element_size: usize) -> Result<Vec<u8>, Error> {
        let byte_count = (count as usize)
            .checked_mul(element_size)
            .filter(|n| *n <= u8::MAX as usize)
            .ok_or_else(|| {
                Error::Semantic(format!(
                    "PLC memory read of {} element(s) of size {} exceeds the 255-byte single-request limit",
                    count, element_size
                ))
            })?;
        let mut payload = Vec::with_capacity(5);
        payload.extend_from_slice(&address.to_be_bytes());
        payload.push(byte_count as u8);
        self.protocol().send_receive(Tag::RMb, &payload, &[Tag::SMb])
    }

    /// read a single value from the iTNC data path (e.g.
    /// `/TABLE/TOOL/T/L`). `/` and `"` are rewritten the way the control's
    /// own path syntax requires.
    pub fn read_data_path(&mut self, path: &str) -> Result<DataPathValue, Error> {
        self.login(AccessLevel::Data, None)?;
        let lossy = self.lossy();
        let normalized = path.replace('/', "\\").replace('"', "'");
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(normalized.as_bytes());
        payload.push(0);

        let body = self.protocol().send_receive(Tag::RDp, &payload, &[Tag::SDp])?;
        if body.len() < 4 {
            return Err(Error::Decode {
                reason: "R_DP response shorter than its u32 type code".into(),
                bytes: body,
            });
        }
        let type_code = BigEndian::read_u32(&body[0..4]);
        decode_data_path_value(type_code, &body[4..], lossy)
    }
}
