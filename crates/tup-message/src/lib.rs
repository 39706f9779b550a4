//! TUP message codec.
//!
//! Every frame on the wire is an envelope around one message body:
//! - A 2-byte magic number ("TU") for stream synchronization
//! - A 2-byte little-endian body length
//! - The body: message type, argument count, typed arguments
//! - A CRC-16/CCITT-FALSE over length and body
//!
//! [`Message`] is the reusable frame container: one `init_*` builder per
//! command, one `parse_*` reader per message shape.

mod args;
pub mod assembler;
#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod entries;
pub mod error;
pub mod message;
pub mod parse;
pub mod types;

pub use assembler::{Fill, FrameAssembler};
#[cfg(feature = "async")]
pub use async_codec::TupCodec;
pub use codec::{
    crc16_ccitt_false, decode_frame, encode_frame, encode_message_frame, FrameConfig,
    DEFAULT_MAX_BODY, FRAME_OVERHEAD, HEADER_SIZE, MAGIC,
};
pub use entries::{entries_from_flat, ids_from_ints, EffectValues, Entry, MAX_ENTRIES, MAX_IDS};
pub use error::{CodecError, Result};
pub use message::Message;
pub use parse::{ErrorReport, Request, Response};
pub use types::{MessageType, BINDING_ACTUATOR_1, BINDING_ACTUATOR_2};
