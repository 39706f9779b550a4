//! `tokio_util` codec for use with `Framed` streams.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{decode_frame, encode_message_frame, FrameConfig};
use crate::error::CodecError;
use crate::message::Message;

/// Frames [`Message`]s over any `AsyncRead`/`AsyncWrite` pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct TupCodec {
    config: FrameConfig,
}

impl TupCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for TupCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        let body = match decode_frame(src, self.config.max_body_size) {
            Ok(Some(body)) => body,
            Ok(None) => {
                src.reserve(self.config.max_frame_size().saturating_sub(src.len()));
                return Ok(None);
            }
            Err(err) => {
                warn!(discarded = src.len(), error = %err, "corrupt frame, resynchronizing");
                src.clear();
                return Err(err);
            }
        };
        Message::decode(&body).map(Some)
    }
}

impl Encoder<&Message> for TupCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        encode_message_frame(item, dst, self.config.max_body_size)
    }
}

impl Encoder<Message> for TupCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        encode_message_frame(&item, dst, self.config.max_body_size)
    }
}
