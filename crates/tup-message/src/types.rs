//! Message type discriminators.

use std::fmt;

use crate::error::CodecError;

/// Binding flag: route the effect to actuator 1.
pub const BINDING_ACTUATOR_1: u8 = 0x1;

/// Binding flag: route the effect to actuator 2.
pub const BINDING_ACTUATOR_2: u8 = 0x2;

/// Command and response types carried in the first field of every body.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    Ack = 1,
    Error = 2,
    Load = 10,
    Play = 11,
    Stop = 12,
    GetVersion = 13,
    GetParameters = 14,
    SetParameters = 15,
    BindEffect = 16,
    GetBuildInfo = 19,
    GetInputs = 21,
    SetInputs = 22,
    BeginEffectUpload = 50,
    UploadEffectPart = 51,
    EndEffectUpload = 52,
    RespVersion = 100,
    RespParameters = 101,
    RespBuildInfo = 103,
    RespInputs = 104,
}

impl MessageType {
    pub const ALL: [MessageType; 19] = [
        MessageType::Ack,
        MessageType::Error,
        MessageType::Load,
        MessageType::Play,
        MessageType::Stop,
        MessageType::GetVersion,
        MessageType::GetParameters,
        MessageType::SetParameters,
        MessageType::BindEffect,
        MessageType::GetBuildInfo,
        MessageType::GetInputs,
        MessageType::SetInputs,
        MessageType::BeginEffectUpload,
        MessageType::UploadEffectPart,
        MessageType::EndEffectUpload,
        MessageType::RespVersion,
        MessageType::RespParameters,
        MessageType::RespBuildInfo,
        MessageType::RespInputs,
    ];

    /// Wire discriminator.
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::Ack => "ack",
            MessageType::Error => "error",
            MessageType::Load => "load",
            MessageType::Play => "play",
            MessageType::Stop => "stop",
            MessageType::GetVersion => "get-version",
            MessageType::GetParameters => "get-parameters",
            MessageType::SetParameters => "set-parameters",
            MessageType::BindEffect => "bind-effect",
            MessageType::GetBuildInfo => "get-buildinfo",
            MessageType::GetInputs => "get-inputs",
            MessageType::SetInputs => "set-inputs",
            MessageType::BeginEffectUpload => "begin-effect-upload",
            MessageType::UploadEffectPart => "upload-effect-part",
            MessageType::EndEffectUpload => "end-effect-upload",
            MessageType::RespVersion => "resp-version",
            MessageType::RespParameters => "resp-parameters",
            MessageType::RespBuildInfo => "resp-buildinfo",
            MessageType::RespInputs => "resp-inputs",
        }
    }

    /// True for types sent by the host.
    pub fn is_command(self) -> bool {
        !self.is_response()
    }

    /// True for types sent by the device in reply to a command.
    pub fn is_response(self) -> bool {
        matches!(
            self,
            MessageType::Ack
                | MessageType::Error
                | MessageType::RespVersion
                | MessageType::RespParameters
                | MessageType::RespBuildInfo
                | MessageType::RespInputs
        )
    }

    /// The command a data response answers, for the `Resp*` types.
    pub fn answers(self) -> Option<MessageType> {
        match self {
            MessageType::RespVersion => Some(MessageType::GetVersion),
            MessageType::RespParameters => Some(MessageType::GetParameters),
            MessageType::RespBuildInfo => Some(MessageType::GetBuildInfo),
            MessageType::RespInputs => Some(MessageType::GetInputs),
            _ => None,
        }
    }
}

impl TryFrom<u16> for MessageType {
    type Error = CodecError;

    fn try_from(code: u16) -> Result<Self, CodecError> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|t| t.code() == code)
            .ok_or(CodecError::UnsupportedType(code))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for t in MessageType::ALL {
            assert_eq!(MessageType::try_from(t.code()).unwrap(), t);
        }
    }

    #[test]
    fn discriminators_match_protocol_numbers() {
        assert_eq!(MessageType::Ack.code(), 1);
        assert_eq!(MessageType::Load.code(), 10);
        assert_eq!(MessageType::GetBuildInfo.code(), 19);
        assert_eq!(MessageType::EndEffectUpload.code(), 52);
        assert_eq!(MessageType::RespInputs.code(), 104);
    }

    #[test]
    fn unknown_code_is_unsupported() {
        assert!(matches!(
            MessageType::try_from(0),
            Err(CodecError::UnsupportedType(0))
        ));
        assert!(matches!(
            MessageType::try_from(102),
            Err(CodecError::UnsupportedType(102))
        ));
    }

    #[test]
    fn command_response_partition() {
        let responses: Vec<_> = MessageType::ALL
            .iter()
            .filter(|t| t.is_response())
            .collect();
        assert_eq!(responses.len(), 6);
        assert!(MessageType::Play.is_command());
        assert!(!MessageType::RespVersion.is_command());
    }

    #[test]
    fn data_responses_answer_getters() {
        assert_eq!(
            MessageType::RespParameters.answers(),
            Some(MessageType::GetParameters)
        );
        assert_eq!(MessageType::Ack.answers(), None);
    }
}
