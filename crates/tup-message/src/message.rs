use bytes::{BufMut, Bytes, BytesMut};

use crate::args::{self, ArgReader, MAX_BLOB_LEN};
use crate::entries::{EffectValues, Entry, MAX_ENTRIES, MAX_IDS};
use crate::error::{CodecError, Result};
use crate::types::MessageType;

/// Bytes in front of the arguments: type (2) + argument count (1).
pub(crate) const BODY_PREFIX: usize = 3;

/// A reusable protocol message.
///
/// A message is either empty (freshly created or cleared) or initialized
/// with exactly one type and arguments matching that type's schema.
/// Builders validate their input before touching the message, so a failed
/// `init_*` call leaves the previous content intact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    kind: Option<MessageType>,
    n_args: u8,
    payload: BytesMut,
}

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty message with room for `capacity` argument bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            kind: None,
            n_args: 0,
            payload: BytesMut::with_capacity(capacity),
        }
    }

    /// Reset to empty, keeping the allocation.
    pub fn clear(&mut self) {
        self.kind = None;
        self.n_args = 0;
        self.payload.clear();
    }

    /// The message type, or `None` while empty.
    pub fn kind(&self) -> Option<MessageType> {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
    }

    /// Number of typed arguments in the payload.
    pub fn n_args(&self) -> u8 {
        self.n_args
    }

    /// Encoded arguments.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn start(&mut self, kind: MessageType, n_args: usize) {
        self.clear();
        self.kind = Some(kind);
        // Callers bound n_args by MAX_IDS + 1.
        self.n_args = n_args as u8;
    }

    pub fn init_get_version(&mut self) {
        self.start(MessageType::GetVersion, 0);
    }

    pub fn init_get_build_info(&mut self) {
        self.start(MessageType::GetBuildInfo, 0);
    }

    /// Load `effect_id` into playback slot `slot_id`.
    pub fn init_load(&mut self, slot_id: u8, effect_id: u16) {
        self.start(MessageType::Load, 2);
        args::put_u8(&mut self.payload, slot_id);
        args::put_u16(&mut self.payload, effect_id);
    }

    pub fn init_play(&mut self, slot_id: u8) {
        self.start(MessageType::Play, 1);
        args::put_u8(&mut self.payload, slot_id);
    }

    pub fn init_stop(&mut self, slot_id: u8) {
        self.start(MessageType::Stop, 1);
        args::put_u8(&mut self.payload, slot_id);
    }

    /// Route a slot to actuators; `flags` is a mask of `BINDING_ACTUATOR_*`.
    pub fn init_bind_effect(&mut self, slot_id: u8, flags: u8) {
        self.start(MessageType::BindEffect, 2);
        args::put_u8(&mut self.payload, slot_id);
        args::put_u8(&mut self.payload, flags);
    }

    /// Request parameter values. An empty id list is valid.
    pub fn init_get_parameters(&mut self, effect_id: u8, ids: &[u8]) -> Result<()> {
        self.init_id_request(MessageType::GetParameters, effect_id, ids)
    }

    /// Request input values. An empty id list is valid.
    pub fn init_get_inputs(&mut self, effect_id: u8, ids: &[u8]) -> Result<()> {
        self.init_id_request(MessageType::GetInputs, effect_id, ids)
    }

    /// Set parameter values; wire order follows `entries`.
    pub fn init_set_parameters(&mut self, effect_id: u8, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Err(CodecError::InvalidArgument(
                "set-parameters needs at least one entry".to_string(),
            ));
        }
        self.init_entries(MessageType::SetParameters, effect_id, entries.iter().copied())
    }

    /// Set input values; wire order follows `entries`.
    pub fn init_set_inputs(&mut self, effect_id: u8, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Err(CodecError::InvalidArgument(
                "set-inputs needs at least one entry".to_string(),
            ));
        }
        self.init_entries(MessageType::SetInputs, effect_id, entries.iter().copied())
    }

    pub fn init_begin_effect_upload(&mut self, effect_id: u16, n_parts: u32) {
        self.start(MessageType::BeginEffectUpload, 2);
        args::put_u16(&mut self.payload, effect_id);
        args::put_u32(&mut self.payload, n_parts);
    }

    pub fn init_upload_effect_part(&mut self, part_no: u32, data: &[u8]) -> Result<()> {
        if data.len() > MAX_BLOB_LEN {
            return Err(CodecError::TooBig(format!(
                "effect part of {} bytes exceeds {MAX_BLOB_LEN}",
                data.len()
            )));
        }
        self.start(MessageType::UploadEffectPart, 2);
        args::put_u32(&mut self.payload, part_no);
        args::put_raw(&mut self.payload, data);
        Ok(())
    }

    pub fn init_end_effect_upload(&mut self) {
        self.start(MessageType::EndEffectUpload, 0);
    }

    /// Device side: acknowledge `command`.
    pub fn init_ack(&mut self, command: MessageType) {
        self.start(MessageType::Ack, 1);
        args::put_u16(&mut self.payload, command.code());
    }

    /// Device side: report that `command` failed with `code`.
    pub fn init_error(&mut self, command: MessageType, code: u32) {
        self.start(MessageType::Error, 2);
        args::put_u16(&mut self.payload, command.code());
        args::put_u32(&mut self.payload, code);
    }

    pub fn init_resp_version(&mut self, version: &str) -> Result<()> {
        self.init_text(MessageType::RespVersion, version)
    }

    pub fn init_resp_build_info(&mut self, build_info: &str) -> Result<()> {
        self.init_text(MessageType::RespBuildInfo, build_info)
    }

    pub fn init_resp_parameters(&mut self, values: &EffectValues) -> Result<()> {
        self.init_entries(MessageType::RespParameters, values.effect_id, values.iter())
    }

    pub fn init_resp_inputs(&mut self, values: &EffectValues) -> Result<()> {
        self.init_entries(MessageType::RespInputs, values.effect_id, values.iter())
    }

    fn init_id_request(&mut self, kind: MessageType, effect_id: u8, ids: &[u8]) -> Result<()> {
        if ids.len() > MAX_IDS {
            return Err(CodecError::TooBig(format!(
                "{} ids exceed the limit of {MAX_IDS}",
                ids.len()
            )));
        }
        self.start(kind, 1 + ids.len());
        args::put_u8(&mut self.payload, effect_id);
        for &id in ids {
            args::put_u8(&mut self.payload, id);
        }
        Ok(())
    }

    fn init_entries<I>(&mut self, kind: MessageType, effect_id: u8, entries: I) -> Result<()>
    where
        I: ExactSizeIterator<Item = Entry>,
    {
        let count = entries.len();
        if count > MAX_ENTRIES {
            return Err(CodecError::TooBig(format!(
                "{count} entries exceed the limit of {MAX_ENTRIES}"
            )));
        }
        self.start(kind, 1 + 2 * count);
        args::put_u8(&mut self.payload, effect_id);
        for entry in entries {
            args::put_u8(&mut self.payload, entry.id);
            args::put_i32(&mut self.payload, entry.value);
        }
        Ok(())
    }

    fn init_text(&mut self, kind: MessageType, text: &str) -> Result<()> {
        if text.as_bytes().contains(&0) {
            return Err(CodecError::InvalidArgument(
                "text must not contain NUL bytes".to_string(),
            ));
        }
        if text.len() + 1 > MAX_BLOB_LEN {
            return Err(CodecError::TooBig(format!(
                "text of {} bytes exceeds {}",
                text.len(),
                MAX_BLOB_LEN - 1
            )));
        }
        self.start(kind, 1);
        args::put_str(&mut self.payload, text);
        Ok(())
    }

    /// Size of the serialized body. Fails on an empty message.
    pub fn body_len(&self) -> Result<usize> {
        self.require_kind()?;
        Ok(BODY_PREFIX + self.payload.len())
    }

    /// Append the serialized body to `dst`.
    pub fn write_body(&self, dst: &mut BytesMut) -> Result<()> {
        let kind = self.require_kind()?;
        dst.reserve(BODY_PREFIX + self.payload.len());
        dst.put_u16_le(kind.code());
        dst.put_u8(self.n_args);
        dst.put_slice(&self.payload);
        Ok(())
    }

    /// The serialized body as a standalone buffer.
    pub fn to_body(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.body_len()?);
        self.write_body(&mut dst)?;
        Ok(dst.freeze())
    }

    /// Decode and validate a body received from the wire.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < BODY_PREFIX {
            return Err(CodecError::BufferTooShort(format!(
                "message body of {} bytes, need at least {BODY_PREFIX}",
                body.len()
            )));
        }
        let kind = MessageType::try_from(u16::from_le_bytes([body[0], body[1]]))?;
        let n_args = body[2];
        let payload = &body[BODY_PREFIX..];
        ArgReader::new(payload, n_args).validate()?;
        Ok(Self {
            kind: Some(kind),
            n_args,
            payload: BytesMut::from(payload),
        })
    }

    fn require_kind(&self) -> Result<MessageType> {
        self.kind
            .ok_or_else(|| CodecError::InvalidArgument("message is empty".to_string()))
    }

    pub(crate) fn reader_for(&self, expected: MessageType) -> Result<ArgReader<'_>> {
        if self.kind != Some(expected) {
            return Err(CodecError::TypeMismatch {
                expected,
                found: self.kind,
            });
        }
        Ok(ArgReader::new(&self.payload, self.n_args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_is_empty() {
        let msg = Message::new();
        assert!(msg.is_empty());
        assert_eq!(msg.kind(), None);
        assert_eq!(msg.n_args(), 0);
        assert!(msg.payload().is_empty());
    }

    #[test]
    fn load_body_layout() {
        let mut msg = Message::new();
        msg.init_load(3, 0x0107);
        let body = msg.to_body().unwrap();
        assert_eq!(
            body.as_ref(),
            &[0x0A, 0x00, 0x02, 0x01, 0x03, 0x03, 0x07, 0x01]
        );
    }

    #[test]
    fn reinit_overwrites_previous_content() {
        let mut msg = Message::new();
        msg.init_set_parameters(1, &[Entry::new(1, 1), Entry::new(2, 2)])
            .unwrap();
        msg.init_play(4);

        let mut fresh = Message::new();
        fresh.init_play(4);
        assert_eq!(msg, fresh);
    }

    #[test]
    fn clear_returns_to_empty() {
        let mut msg = Message::new();
        msg.init_get_version();
        msg.clear();
        assert_eq!(msg, Message::new());
        assert!(matches!(msg.to_body(), Err(CodecError::InvalidArgument(_))));
    }

    #[test]
    fn failed_builder_keeps_previous_content() {
        let mut msg = Message::new();
        msg.init_stop(2);
        let before = msg.clone();

        let err = msg.init_set_inputs(1, &[]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument(_)));
        assert_eq!(msg, before);

        let ids = vec![0u8; MAX_IDS + 1];
        let err = msg.init_get_parameters(1, &ids).unwrap_err();
        assert!(matches!(err, CodecError::TooBig(_)));
        assert_eq!(msg, before);
    }

    #[test]
    fn set_entries_limit() {
        let mut msg = Message::new();
        let entries: Vec<Entry> = (0..=MAX_ENTRIES as u8).map(|id| Entry::new(id, 0)).collect();
        assert!(matches!(
            msg.init_set_parameters(0, &entries),
            Err(CodecError::TooBig(_))
        ));
        msg.init_set_parameters(0, &entries[..MAX_ENTRIES]).unwrap();
        assert_eq!(msg.n_args(), 255);
    }

    #[test]
    fn text_rejects_interior_nul() {
        let mut msg = Message::new();
        assert!(matches!(
            msg.init_resp_version("1.0\0x"),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn upload_part_limit() {
        let mut msg = Message::new();
        let data = vec![0u8; MAX_BLOB_LEN + 1];
        assert!(matches!(
            msg.init_upload_effect_part(0, &data),
            Err(CodecError::TooBig(_))
        ));
    }

    #[test]
    fn decode_roundtrips_body() {
        let mut msg = Message::new();
        msg.init_bind_effect(0, 3);
        let decoded = Message::decode(&msg.to_body().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_short_body() {
        assert!(matches!(
            Message::decode(&[0x0D, 0x00]),
            Err(CodecError::BufferTooShort(_))
        ));
    }

    #[test]
    fn decode_unknown_type() {
        assert!(matches!(
            Message::decode(&[0xFF, 0x00, 0x00]),
            Err(CodecError::UnsupportedType(0xFF))
        ));
    }

    #[test]
    fn decode_arg_count_mismatch() {
        // Play declares two args but carries one.
        let body = [0x0B, 0x00, 0x02, 0x01, 0x00];
        assert!(matches!(
            Message::decode(&body),
            Err(CodecError::BufferTooShort(_))
        ));

        // Play declares zero args but carries bytes.
        let body = [0x0B, 0x00, 0x00, 0x01, 0x00];
        assert!(matches!(
            Message::decode(&body),
            Err(CodecError::Malformed(_))
        ));
    }
}
