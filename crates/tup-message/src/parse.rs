//! Typed readers for every message shape.
//!
//! Parsers never mutate the message. Each one checks the type first
//! (`TypeMismatch`), then walks the arguments with bounds checks
//! (`BufferTooShort` when the schema needs more, `Malformed` when the
//! content violates it).

use crate::args::ArgReader;
use crate::entries::{EffectValues, Entry};
use crate::error::{CodecError, Result};
use crate::message::Message;
use crate::types::MessageType;

/// Failure report sent by the device in an `Error` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReport {
    /// The command that failed.
    pub command: MessageType,
    /// Device-specific error code.
    pub code: u32,
}

/// A decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetVersion,
    GetBuildInfo,
    Load { slot_id: u8, effect_id: u16 },
    Play { slot_id: u8 },
    Stop { slot_id: u8 },
    BindEffect { slot_id: u8, flags: u8 },
    GetParameters { effect_id: u8, ids: Vec<u8> },
    SetParameters { effect_id: u8, entries: Vec<Entry> },
    GetInputs { effect_id: u8, ids: Vec<u8> },
    SetInputs { effect_id: u8, entries: Vec<Entry> },
    BeginEffectUpload { effect_id: u16, n_parts: u32 },
    UploadEffectPart { part_no: u32, data: Vec<u8> },
    EndEffectUpload,
}

impl Request {
    pub fn kind(&self) -> MessageType {
        match self {
            Request::GetVersion => MessageType::GetVersion,
            Request::GetBuildInfo => MessageType::GetBuildInfo,
            Request::Load { .. } => MessageType::Load,
            Request::Play { .. } => MessageType::Play,
            Request::Stop { .. } => MessageType::Stop,
            Request::BindEffect { .. } => MessageType::BindEffect,
            Request::GetParameters { .. } => MessageType::GetParameters,
            Request::SetParameters { .. } => MessageType::SetParameters,
            Request::GetInputs { .. } => MessageType::GetInputs,
            Request::SetInputs { .. } => MessageType::SetInputs,
            Request::BeginEffectUpload { .. } => MessageType::BeginEffectUpload,
            Request::UploadEffectPart { .. } => MessageType::UploadEffectPart,
            Request::EndEffectUpload => MessageType::EndEffectUpload,
        }
    }
}

/// A decoded device response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ack(MessageType),
    Error(ErrorReport),
    Version(String),
    BuildInfo(String),
    Parameters(EffectValues),
    Inputs(EffectValues),
}

impl Response {
    pub fn kind(&self) -> MessageType {
        match self {
            Response::Ack(_) => MessageType::Ack,
            Response::Error(_) => MessageType::Error,
            Response::Version(_) => MessageType::RespVersion,
            Response::BuildInfo(_) => MessageType::RespBuildInfo,
            Response::Parameters(_) => MessageType::RespParameters,
            Response::Inputs(_) => MessageType::RespInputs,
        }
    }
}

fn command_type(raw: u16) -> Result<MessageType> {
    MessageType::try_from(raw)
        .map_err(|_| CodecError::Malformed(format!("reply refers to unknown command {raw}")))
}

fn read_text(mut args: ArgReader<'_>) -> Result<String> {
    let bytes = args.string_bytes()?;
    args.finish()?;
    let end = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CodecError::Malformed("string has no NUL terminator".to_string()))?;
    String::from_utf8(bytes[..end].to_vec())
        .map_err(|e| CodecError::Malformed(format!("string is not UTF-8: {e}")))
}

fn read_ids(mut args: ArgReader<'_>) -> Result<(u8, Vec<u8>)> {
    let effect_id = args.u8()?;
    let mut ids = Vec::with_capacity(args.remaining());
    while args.remaining() > 0 {
        ids.push(args.u8()?);
    }
    args.finish()?;
    Ok((effect_id, ids))
}

fn check_entry_count(n_args: u8) -> Result<()> {
    if n_args == 0 {
        return Err(CodecError::BufferTooShort("missing effect id".to_string()));
    }
    if n_args % 2 == 0 {
        return Err(CodecError::Malformed(format!(
            "{n_args} arguments cannot hold an effect id plus id/value pairs"
        )));
    }
    Ok(())
}

fn read_entry(args: &mut ArgReader<'_>) -> Result<Entry> {
    Ok(Entry {
        id: args.u8()?,
        value: args.i32()?,
    })
}

fn read_entry_list(mut args: ArgReader<'_>, n_args: u8) -> Result<(u8, Vec<Entry>)> {
    check_entry_count(n_args)?;
    if n_args == 1 {
        return Err(CodecError::Malformed("set request carries no entries".to_string()));
    }
    let effect_id = args.u8()?;
    let mut entries = Vec::with_capacity(args.remaining() / 2);
    while args.remaining() > 0 {
        entries.push(read_entry(&mut args)?);
    }
    args.finish()?;
    Ok((effect_id, entries))
}

fn read_values(mut args: ArgReader<'_>, n_args: u8) -> Result<EffectValues> {
    check_entry_count(n_args)?;
    let mut values = EffectValues::new(args.u8()?);
    while args.remaining() > 0 {
        let entry = read_entry(&mut args)?;
        if values.entries.insert(entry.id, entry.value).is_some() {
            return Err(CodecError::Malformed(format!(
                "id {} reported twice",
                entry.id
            )));
        }
    }
    args.finish()?;
    Ok(values)
}

fn read_nothing(args: ArgReader<'_>) -> Result<()> {
    args.finish()
}

impl Message {
    /// The command type being acknowledged.
    pub fn parse_ack(&self) -> Result<MessageType> {
        let mut args = self.reader_for(MessageType::Ack)?;
        let command = args.u16()?;
        args.finish()?;
        command_type(command)
    }

    pub fn parse_error(&self) -> Result<ErrorReport> {
        let mut args = self.reader_for(MessageType::Error)?;
        let command = args.u16()?;
        let code = args.u32()?;
        args.finish()?;
        Ok(ErrorReport {
            command: command_type(command)?,
            code,
        })
    }

    pub fn parse_resp_version(&self) -> Result<String> {
        read_text(self.reader_for(MessageType::RespVersion)?)
    }

    pub fn parse_resp_build_info(&self) -> Result<String> {
        read_text(self.reader_for(MessageType::RespBuildInfo)?)
    }

    /// Parameter values keyed by id. Duplicate ids are `Malformed`.
    pub fn parse_resp_parameters(&self) -> Result<EffectValues> {
        read_values(self.reader_for(MessageType::RespParameters)?, self.n_args())
    }

    /// Input values keyed by id. Duplicate ids are `Malformed`.
    pub fn parse_resp_inputs(&self) -> Result<EffectValues> {
        read_values(self.reader_for(MessageType::RespInputs)?, self.n_args())
    }

    /// `(slot_id, effect_id)`
    pub fn parse_load(&self) -> Result<(u8, u16)> {
        let mut args = self.reader_for(MessageType::Load)?;
        let slot_id = args.u8()?;
        let effect_id = args.u16()?;
        args.finish()?;
        Ok((slot_id, effect_id))
    }

    pub fn parse_play(&self) -> Result<u8> {
        let mut args = self.reader_for(MessageType::Play)?;
        let slot_id = args.u8()?;
        args.finish()?;
        Ok(slot_id)
    }

    pub fn parse_stop(&self) -> Result<u8> {
        let mut args = self.reader_for(MessageType::Stop)?;
        let slot_id = args.u8()?;
        args.finish()?;
        Ok(slot_id)
    }

    /// `(slot_id, flags)`
    pub fn parse_bind_effect(&self) -> Result<(u8, u8)> {
        let mut args = self.reader_for(MessageType::BindEffect)?;
        let slot_id = args.u8()?;
        let flags = args.u8()?;
        args.finish()?;
        Ok((slot_id, flags))
    }

    /// `(effect_id, ids)`
    pub fn parse_get_parameters(&self) -> Result<(u8, Vec<u8>)> {
        read_ids(self.reader_for(MessageType::GetParameters)?)
    }

    /// `(effect_id, ids)`
    pub fn parse_get_inputs(&self) -> Result<(u8, Vec<u8>)> {
        read_ids(self.reader_for(MessageType::GetInputs)?)
    }

    /// `(effect_id, entries)` in wire order.
    pub fn parse_set_parameters(&self) -> Result<(u8, Vec<Entry>)> {
        read_entry_list(self.reader_for(MessageType::SetParameters)?, self.n_args())
    }

    /// `(effect_id, entries)` in wire order.
    pub fn parse_set_inputs(&self) -> Result<(u8, Vec<Entry>)> {
        read_entry_list(self.reader_for(MessageType::SetInputs)?, self.n_args())
    }

    /// `(effect_id, n_parts)`
    pub fn parse_begin_effect_upload(&self) -> Result<(u16, u32)> {
        let mut args = self.reader_for(MessageType::BeginEffectUpload)?;
        let effect_id = args.u16()?;
        let n_parts = args.u32()?;
        args.finish()?;
        Ok((effect_id, n_parts))
    }

    /// `(part_no, data)`
    pub fn parse_upload_effect_part(&self) -> Result<(u32, &[u8])> {
        let mut args = self.reader_for(MessageType::UploadEffectPart)?;
        let part_no = args.u32()?;
        let data = args.raw()?;
        args.finish()?;
        Ok((part_no, data))
    }

    /// Decode any command.
    pub fn request(&self) -> Result<Request> {
        let kind = self.require_command()?;
        let request = match kind {
            MessageType::GetVersion => {
                read_nothing(self.reader_for(kind)?)?;
                Request::GetVersion
            }
            MessageType::GetBuildInfo => {
                read_nothing(self.reader_for(kind)?)?;
                Request::GetBuildInfo
            }
            MessageType::EndEffectUpload => {
                read_nothing(self.reader_for(kind)?)?;
                Request::EndEffectUpload
            }
            MessageType::Load => {
                let (slot_id, effect_id) = self.parse_load()?;
                Request::Load { slot_id, effect_id }
            }
            MessageType::Play => Request::Play {
                slot_id: self.parse_play()?,
            },
            MessageType::Stop => Request::Stop {
                slot_id: self.parse_stop()?,
            },
            MessageType::BindEffect => {
                let (slot_id, flags) = self.parse_bind_effect()?;
                Request::BindEffect { slot_id, flags }
            }
            MessageType::GetParameters => {
                let (effect_id, ids) = self.parse_get_parameters()?;
                Request::GetParameters { effect_id, ids }
            }
            MessageType::GetInputs => {
                let (effect_id, ids) = self.parse_get_inputs()?;
                Request::GetInputs { effect_id, ids }
            }
            MessageType::SetParameters => {
                let (effect_id, entries) = self.parse_set_parameters()?;
                Request::SetParameters { effect_id, entries }
            }
            MessageType::SetInputs => {
                let (effect_id, entries) = self.parse_set_inputs()?;
                Request::SetInputs { effect_id, entries }
            }
            MessageType::BeginEffectUpload => {
                let (effect_id, n_parts) = self.parse_begin_effect_upload()?;
                Request::BeginEffectUpload { effect_id, n_parts }
            }
            MessageType::UploadEffectPart => {
                let (part_no, data) = self.parse_upload_effect_part()?;
                Request::UploadEffectPart {
                    part_no,
                    data: data.to_vec(),
                }
            }
            other => {
                return Err(CodecError::InvalidArgument(format!(
                    "{other} is not a command"
                )))
            }
        };
        Ok(request)
    }

    /// Decode any response.
    pub fn response(&self) -> Result<Response> {
        let kind = self
            .kind()
            .ok_or_else(|| CodecError::InvalidArgument("message is empty".to_string()))?;
        let response = match kind {
            MessageType::Ack => Response::Ack(self.parse_ack()?),
            MessageType::Error => Response::Error(self.parse_error()?),
            MessageType::RespVersion => Response::Version(self.parse_resp_version()?),
            MessageType::RespBuildInfo => Response::BuildInfo(self.parse_resp_build_info()?),
            MessageType::RespParameters => Response::Parameters(self.parse_resp_parameters()?),
            MessageType::RespInputs => Response::Inputs(self.parse_resp_inputs()?),
            other => {
                return Err(CodecError::InvalidArgument(format!(
                    "{other} is not a response"
                )))
            }
        };
        Ok(response)
    }

    /// Build the command described by `request`.
    pub fn init_request(&mut self, request: &Request) -> Result<()> {
        match request {
            Request::GetVersion => self.init_get_version(),
            Request::GetBuildInfo => self.init_get_build_info(),
            Request::Load { slot_id, effect_id } => self.init_load(*slot_id, *effect_id),
            Request::Play { slot_id } => self.init_play(*slot_id),
            Request::Stop { slot_id } => self.init_stop(*slot_id),
            Request::BindEffect { slot_id, flags } => self.init_bind_effect(*slot_id, *flags),
            Request::GetParameters { effect_id, ids } => {
                self.init_get_parameters(*effect_id, ids)?
            }
            Request::SetParameters { effect_id, entries } => {
                self.init_set_parameters(*effect_id, entries)?
            }
            Request::GetInputs { effect_id, ids } => self.init_get_inputs(*effect_id, ids)?,
            Request::SetInputs { effect_id, entries } => {
                self.init_set_inputs(*effect_id, entries)?
            }
            Request::BeginEffectUpload { effect_id, n_parts } => {
                self.init_begin_effect_upload(*effect_id, *n_parts)
            }
            Request::UploadEffectPart { part_no, data } => {
                self.init_upload_effect_part(*part_no, data)?
            }
            Request::EndEffectUpload => self.init_end_effect_upload(),
        }
        Ok(())
    }

    /// Build the response described by `response`.
    pub fn init_response(&mut self, response: &Response) -> Result<()> {
        match response {
            Response::Ack(command) => self.init_ack(*command),
            Response::Error(report) => self.init_error(report.command, report.code),
            Response::Version(text) => self.init_resp_version(text)?,
            Response::BuildInfo(text) => self.init_resp_build_info(text)?,
            Response::Parameters(values) => self.init_resp_parameters(values)?,
            Response::Inputs(values) => self.init_resp_inputs(values)?,
        }
        Ok(())
    }

    fn require_command(&self) -> Result<MessageType> {
        self.kind()
            .ok_or_else(|| CodecError::InvalidArgument("message is empty".to_string()))
    }
}
