use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::{json, Value};
use tup_message::{EffectValues, Message, MessageType, Response};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput {
    #[serde(rename = "type")]
    kind: &'static str,
    code: u16,
    fields: Value,
    timestamp: String,
}

#[derive(Serialize)]
struct ValuesOutput<'a> {
    kind: &'a str,
    effect_id: u8,
    values: Vec<EntryOutput>,
}

#[derive(Serialize)]
struct EntryOutput {
    id: u8,
    value: i32,
}

#[derive(Serialize)]
struct AckOutput<'a> {
    command: &'a str,
    status: &'static str,
}

/// Device identity reported by the `info` command.
#[derive(Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub line: String,
    pub version: String,
    pub build_info: String,
}

pub fn print_message(msg: &Message, format: OutputFormat) {
    let kind = msg.kind().map_or("empty", MessageType::name);
    let code = msg.kind().map_or(0, MessageType::code);
    let (fields, summary) = describe(msg);

    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind,
                code,
                fields,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "CODE", "CONTENT"])
                .add_row(vec![kind.to_string(), code.to_string(), summary]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("type={kind} ({code}) {summary}");
        }
    }
}

pub fn print_values(kind: &str, values: &EffectValues, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ValuesOutput {
                kind,
                effect_id: values.effect_id,
                values: values
                    .iter()
                    .map(|entry| EntryOutput {
                        id: entry.id,
                        value: entry.value,
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EFFECT", "ID", "VALUE"]);
            for entry in values.iter() {
                table.add_row(vec![
                    values.effect_id.to_string(),
                    entry.id.to_string(),
                    entry.value.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Effect {} {kind}:", values.effect_id);
            for entry in values.iter() {
                println!("  {entry}");
            }
        }
    }
}

pub fn print_ack(command: MessageType, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = AckOutput {
                command: command.name(),
                status: "ok",
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("{command}: ok"),
    }
}

pub fn print_device_info(info: &DeviceInfo, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(info).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["Device", info.path.as_str()])
                .add_row(vec!["Line", info.line.as_str()])
                .add_row(vec!["Firmware", info.version.as_str()])
                .add_row(vec!["Build", info.build_info.as_str()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Device Info:");
            println!("  Device:   {}", info.path);
            println!("  Line:     {}", info.line);
            println!("  Firmware: {}", info.version);
            println!("  Build:    {}", info.build_info);
        }
    }
}

/// Structured fields and a one-line summary of a received message.
fn describe(msg: &Message) -> (Value, String) {
    let response = match msg.response() {
        Ok(response) => response,
        Err(err) => {
            return (
                json!({ "n_args": msg.n_args(), "error": err.to_string() }),
                format!("n_args={} ({err})", msg.n_args()),
            )
        }
    };

    match response {
        Response::Ack(command) => (
            json!({ "command": command.name() }),
            format!("command={command}"),
        ),
        Response::Error(report) => (
            json!({ "command": report.command.name(), "error_code": report.code }),
            format!("command={} error_code={}", report.command, report.code),
        ),
        Response::Version(version) => {
            let summary = format!("version={version}");
            (json!({ "version": version }), summary)
        }
        Response::BuildInfo(info) => {
            let summary = format!("build_info={info}");
            (json!({ "build_info": info }), summary)
        }
        Response::Parameters(values) | Response::Inputs(values) => {
            let entries: Vec<String> = values.iter().map(|entry| entry.to_string()).collect();
            let map: serde_json::Map<String, Value> = values
                .iter()
                .map(|entry| (entry.id.to_string(), Value::from(entry.value)))
                .collect();
            (
                json!({ "effect_id": values.effect_id, "values": map }),
                format!("effect={} {}", values.effect_id, entries.join(" ")),
            )
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
