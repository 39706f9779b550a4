use std::fmt;
use std::io;

use tup_context::{ContextError, ErrorKind};
use tup_message::CodecError;
use tup_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DEVICE_REJECTED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => context_error(context, ContextError::from(other)),
    }
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    context_error(context, ContextError::from(err))
}

pub fn context_error(context: &str, err: ContextError) -> CliError {
    let code = match err.kind() {
        ErrorKind::InvalidArgument | ErrorKind::TooBig => USAGE,
        ErrorKind::PermissionDenied => PERMISSION_DENIED,
        ErrorKind::Timeout | ErrorKind::WouldBlock => TIMEOUT,
        ErrorKind::BufferTooShort | ErrorKind::Malformed | ErrorKind::TypeMismatch => DATA_INVALID,
        ErrorKind::NotFound => FAILURE,
        ErrorKind::Busy | ErrorKind::BadDescriptor | ErrorKind::Io | ErrorKind::Unsupported => {
            TRANSPORT_ERROR
        }
        ErrorKind::Other if matches!(err, ContextError::Device(_)) => DEVICE_REJECTED,
        ErrorKind::Other => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tup_message::{ErrorReport, MessageType};

    use super::*;

    #[test]
    fn timeouts_exit_124() {
        let err = context_error("request failed", ContextError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("request failed: "));
    }

    #[test]
    fn device_rejection_has_its_own_code() {
        let err = context_error(
            "load failed",
            ContextError::Device(ErrorReport {
                command: MessageType::Load,
                code: 2,
            }),
        );
        assert_eq!(err.code, DEVICE_REJECTED);
        assert_eq!(err.message, "load failed: device rejected load with code 2");
    }

    #[test]
    fn bad_line_settings_are_usage_errors() {
        let err = transport_error(
            "invalid line settings",
            TransportError::InvalidConfig("unsupported baudrate 1234".into()),
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn malformed_frames_are_data_errors() {
        let err = codec_error("decode failed", CodecError::Malformed("x".into()));
        assert_eq!(err.code, DATA_INVALID);
    }
}
