use bytes::BytesMut;
use tup_message::{
    encode_message_frame, CodecError, EffectValues, Entry, FrameAssembler, Message, MessageType,
    Request, DEFAULT_MAX_BODY,
};

fn frame_of(msg: &Message) -> Vec<u8> {
    let mut wire = BytesMut::new();
    encode_message_frame(msg, &mut wire, DEFAULT_MAX_BODY).unwrap();
    wire.to_vec()
}

fn reassemble(bytes: &[u8]) -> Message {
    let mut asm = FrameAssembler::default();
    asm.push(bytes);
    let body = asm.next_frame().unwrap().expect("complete frame");
    Message::decode(&body).unwrap()
}

#[test]
fn load_survives_the_wire() {
    let mut msg = Message::new();
    msg.init_load(3, 7);

    let decoded = reassemble(&frame_of(&msg));
    assert_eq!(decoded.kind(), Some(MessageType::Load));
    assert_eq!(decoded.parse_load().unwrap(), (3, 7));
    assert_eq!(
        decoded.request().unwrap(),
        Request::Load {
            slot_id: 3,
            effect_id: 7
        }
    );
}

#[test]
fn split_delivery_matches_single_delivery() {
    let mut msg = Message::new();
    msg.init_set_inputs(2, &[Entry::new(1, -5), Entry::new(4, 1 << 20)])
        .unwrap();
    let bytes = frame_of(&msg);

    let whole = reassemble(&bytes);

    let mut asm = FrameAssembler::default();
    let (head, tail) = bytes.split_at(bytes.len() / 2);
    asm.push(head);
    assert!(asm.next_frame().unwrap().is_none());
    asm.push(tail);
    let body = asm.next_frame().unwrap().unwrap();
    let split = Message::decode(&body).unwrap();

    assert_eq!(split, whole);
    assert_eq!(split, msg);
}

#[test]
fn heartbeat_sequence_back_to_back() {
    let mut wire = Vec::new();
    let mut msg = Message::new();
    msg.init_load(0, 4);
    wire.extend(frame_of(&msg));
    msg.init_bind_effect(0, tup_message::BINDING_ACTUATOR_1 | tup_message::BINDING_ACTUATOR_2);
    wire.extend(frame_of(&msg));
    msg.init_play(0);
    wire.extend(frame_of(&msg));

    let mut asm = FrameAssembler::default();
    asm.push(&wire);
    let mut kinds = Vec::new();
    while let Some(body) = asm.next_frame().unwrap() {
        kinds.push(Message::decode(&body).unwrap().kind().unwrap());
    }
    assert_eq!(
        kinds,
        vec![MessageType::Load, MessageType::BindEffect, MessageType::Play]
    );
}

#[test]
fn largest_values_response_fits_default_frame() {
    let mut values = EffectValues::new(9);
    values
        .entries
        .extend((0..tup_message::MAX_ENTRIES as u8).map(|id| (id, -(id as i32))));
    let mut msg = Message::new();
    msg.init_resp_parameters(&values).unwrap();

    let decoded = reassemble(&frame_of(&msg));
    assert_eq!(decoded.parse_resp_parameters().unwrap(), values);
}

#[test]
fn body_over_limit_is_rejected() {
    let mut msg = Message::new();
    msg.init_upload_effect_part(0, &vec![0u8; DEFAULT_MAX_BODY]).unwrap();
    let mut wire = BytesMut::new();
    assert!(matches!(
        encode_message_frame(&msg, &mut wire, DEFAULT_MAX_BODY),
        Err(CodecError::FrameTooLarge { .. })
    ));
}
