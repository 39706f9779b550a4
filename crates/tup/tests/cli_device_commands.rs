#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};

use bytes::BytesMut;
use tup::message::{
    decode_frame, encode_message_frame, EffectValues, Message, MessageType, Request,
    DEFAULT_MAX_BODY, HEADER_SIZE,
};

/// Effect id the test device refuses to load.
const MISSING_EFFECT: u16 = 999;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/tupcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn read_frame(stream: &mut UnixStream) -> Option<Message> {
    let mut wire = BytesMut::zeroed(HEADER_SIZE);
    stream.read_exact(&mut wire).ok()?;
    let body_len = u16::from_le_bytes([wire[2], wire[3]]) as usize;
    let mut rest = vec![0u8; body_len + 2];
    stream.read_exact(&mut rest).ok()?;
    wire.extend_from_slice(&rest);

    let body = decode_frame(&mut wire, DEFAULT_MAX_BODY).ok()??;
    Message::decode(&body).ok()
}

fn write_message(stream: &mut UnixStream, msg: &Message) {
    let mut wire = BytesMut::new();
    encode_message_frame(msg, &mut wire, DEFAULT_MAX_BODY).expect("reply should encode");
    stream.write_all(&wire).expect("reply should be written");
}

fn reply_to(request: &Request) -> Message {
    let mut reply = Message::new();
    match request {
        Request::GetVersion => reply.init_resp_version("3.1.4").unwrap(),
        Request::GetBuildInfo => reply.init_resp_build_info("test-device rev B").unwrap(),
        Request::GetParameters { effect_id, ids } | Request::GetInputs { effect_id, ids } => {
            let mut values = EffectValues::new(*effect_id);
            for &id in ids {
                values.entries.insert(id, i32::from(id) * 100);
            }
            if matches!(request, Request::GetInputs { .. }) {
                reply.init_resp_inputs(&values).unwrap();
            } else {
                reply.init_resp_parameters(&values).unwrap();
            }
        }
        Request::Load { effect_id, .. } if *effect_id == MISSING_EFFECT => {
            reply.init_error(MessageType::Load, 4);
        }
        other => reply.init_ack(other.kind()),
    }
    reply
}

/// Serve one connection, answering every command. Returns what it received.
fn spawn_device(path: &PathBuf) -> JoinHandle<Vec<Request>> {
    let listener = UnixListener::bind(path).expect("device socket should bind");
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("client should connect");
        let mut received = Vec::new();
        while let Some(msg) = read_frame(&mut stream) {
            let request = msg.request().expect("device only receives commands");
            write_message(&mut stream, &reply_to(&request));
            received.push(request);
        }
        received
    })
}

fn tup(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tup"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .output()
        .expect("tup should run")
}

#[test]
fn info_reports_version_and_build() {
    let dir = unique_temp_dir("info");
    let sock = dir.join("device.sock");
    let device = spawn_device(&sock);
    let target = format!("unix:{}", sock.display());

    let output = tup(&["info", &target]);
    assert!(output.status.success(), "{output:?}");

    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("info should emit json");
    assert_eq!(payload["version"], "3.1.4");
    assert_eq!(payload["build_info"], "test-device rev B");
    assert_eq!(payload["line"], "115200 8N1 (flow control off)");

    let received = device.join().unwrap();
    assert_eq!(received, vec![Request::GetVersion, Request::GetBuildInfo]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn load_sends_command_and_prints_ack() {
    let dir = unique_temp_dir("load");
    let sock = dir.join("device.sock");
    let device = spawn_device(&sock);
    let target = format!("unix:{}", sock.display());

    let output = tup(&["load", &target, "--slot", "2", "--effect", "17"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"command\":\"load\""));
    assert!(stdout.contains("\"status\":\"ok\""));

    assert_eq!(
        device.join().unwrap(),
        vec![Request::Load {
            slot_id: 2,
            effect_id: 17
        }]
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn device_rejection_exits_30() {
    let dir = unique_temp_dir("reject");
    let sock = dir.join("device.sock");
    let device = spawn_device(&sock);
    let target = format!("unix:{}", sock.display());

    let output = tup(&["load", &target, "--effect", &MISSING_EFFECT.to_string()]);
    assert_eq!(output.status.code(), Some(30));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("device rejected load with code 4"));

    device.join().unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn get_params_prints_values() {
    let dir = unique_temp_dir("get-params");
    let sock = dir.join("device.sock");
    let device = spawn_device(&sock);
    let target = format!("unix:{}", sock.display());

    let output = tup(&["get-params", &target, "--effect", "5", "--ids", "2,1"]);
    assert!(output.status.success(), "{output:?}");

    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("get-params should emit json");
    assert_eq!(payload["kind"], "parameters");
    assert_eq!(payload["effect_id"], 5);
    assert_eq!(payload["values"][0]["id"], 1);
    assert_eq!(payload["values"][0]["value"], 100);
    assert_eq!(payload["values"][1]["value"], 200);

    device.join().unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn set_inputs_sends_entries() {
    let dir = unique_temp_dir("set-inputs");
    let sock = dir.join("device.sock");
    let device = spawn_device(&sock);
    let target = format!("unix:{}", sock.display());

    let output = tup(&["set-inputs", &target, "--effect", "3", "7=-12", "1=4"]);
    assert!(output.status.success(), "{output:?}");

    match device.join().unwrap().as_slice() {
        [Request::SetInputs { effect_id, entries }] => {
            assert_eq!(*effect_id, 3);
            let pairs: Vec<(u8, i32)> = entries.iter().map(|e| (e.id, e.value)).collect();
            assert_eq!(pairs, vec![(7, -12), (1, 4)]);
        }
        other => panic!("unexpected requests: {other:?}"),
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn upload_sends_all_parts() {
    let dir = unique_temp_dir("upload");
    let sock = dir.join("device.sock");
    let blob_path = dir.join("effect.bin");
    let blob: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&blob_path, &blob).unwrap();
    let device = spawn_device(&sock);
    let target = format!("unix:{}", sock.display());

    let output = tup(&[
        "upload",
        &target,
        "--effect",
        "42",
        "--file",
        blob_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");

    let received = device.join().unwrap();
    assert!(matches!(
        received.first(),
        Some(Request::BeginEffectUpload { effect_id: 42, .. })
    ));
    assert_eq!(received.last(), Some(&Request::EndEffectUpload));
    let uploaded: Vec<u8> = received
        .iter()
        .filter_map(|request| match request {
            Request::UploadEffectPart { data, .. } => Some(data.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(uploaded, blob);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_prints_notifications_until_count() {
    let dir = unique_temp_dir("listen");
    let sock = dir.join("device.sock");
    let listener = UnixListener::bind(&sock).unwrap();
    let target = format!("unix:{}", sock.display());

    let device = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        for command in [MessageType::Play, MessageType::Stop] {
            let mut msg = Message::new();
            msg.init_ack(command);
            write_message(&mut stream, &msg);
        }
        // Hold the link open until the CLI hangs up.
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink);
    });

    let output = tup(&["listen", &target, "--count", "2"]);
    assert!(output.status.success(), "{output:?}");

    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("one json object per line"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["type"], "ack");
    assert_eq!(lines[0]["fields"]["command"], "play");
    assert_eq!(lines[1]["fields"]["command"], "stop");

    device.join().unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_device_fails() {
    let output = tup(&["play", "/dev/tup-does-not-exist"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("open /dev/tup-does-not-exist failed"));
}

#[test]
fn bad_baudrate_is_usage_error() {
    let output = tup(&["play", "/dev/tup-does-not-exist", "--baudrate", "1234"]);
    assert_eq!(output.status.code(), Some(64));
}
