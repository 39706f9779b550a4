use crate::types::MessageType;

/// Errors that can occur while building, encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x5455 \"TU\")")]
    InvalidMagic,

    /// The frame checksum does not match its contents.
    #[error("frame checksum mismatch (computed {computed:#06x}, received {received:#06x})")]
    Checksum { computed: u16, received: u16 },

    /// The declared body length exceeds the configured maximum.
    #[error("frame body too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The buffer ends before the schema is satisfied.
    #[error("buffer too short: {0}")]
    BufferTooShort(String),

    /// The content violates the message schema.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A parser was called on a message of another type.
    #[error("message type mismatch (expected {expected}, found {})", .found.map_or("empty", MessageType::name))]
    TypeMismatch {
        expected: MessageType,
        found: Option<MessageType>,
    },

    /// The type discriminator is not a known TUP message.
    #[error("unsupported message type {0}")]
    UnsupportedType(u16),

    /// Caller input rejected by a builder.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Caller input does not fit the wire representation.
    #[error("too big: {0}")]
    TooBig(String),

    /// An I/O error occurred while moving frames.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
