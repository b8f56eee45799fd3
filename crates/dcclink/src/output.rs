use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dcclink_frame::{stream_name, Frame};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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
struct FrameOutput<'a> {
    index: usize,
    stream: u8,
    stream_name: &'a str,
    payload_size: usize,
    payload: String,
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    relay: &'a str,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event: &'a str,
    detail: &'a str,
    timestamp: String,
}

/// Print decoded target frames.
pub fn print_frames(frames: &[Frame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for (index, frame) in frames.iter().enumerate() {
                let out = FrameOutput {
                    index,
                    stream: frame.stream,
                    stream_name: stream_name(frame.stream),
                    payload_size: frame.payload.len(),
                    payload: payload_preview(frame.payload.as_ref()),
                };
                println!("{}", to_json_line(&out));
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "STREAM", "SIZE", "PAYLOAD"]);
            for (index, frame) in frames.iter().enumerate() {
                table.add_row(vec![
                    index.to_string(),
                    stream_name(frame.stream).to_string(),
                    frame.payload.len().to_string(),
                    payload_preview(frame.payload.as_ref()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (index, frame) in frames.iter().enumerate() {
                println!(
                    "#{index} stream={} ({}) size={} payload={}",
                    frame.stream,
                    stream_name(frame.stream),
                    frame.payload.len(),
                    payload_preview(frame.payload.as_ref())
                );
            }
        }
        OutputFormat::Raw => {
            for frame in frames {
                print_raw(frame.payload.as_ref());
            }
        }
    }
}

/// Print bytes a relay sent back.
pub fn print_reply(data: &[u8], relay: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                relay,
                payload_size: data.len(),
                payload: payload_preview(data),
                timestamp: now_unix_seconds(),
            };
            println!("{}", to_json_line(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["RELAY", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    relay.to_string(),
                    data.len().to_string(),
                    payload_preview(data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "relay={relay} size={} payload={}",
                data.len(),
                payload_preview(data)
            );
        }
        OutputFormat::Raw => print_raw(data),
    }
}

/// Print a lifecycle or console event from `serve`.
pub fn print_event(event: &str, detail: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                event,
                detail,
                timestamp: now_unix_seconds(),
            };
            println!("{}", to_json_line(&out));
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("{event}: {detail}"),
        OutputFormat::Raw => println!("{detail}"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn to_json_line<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => hex_preview(payload),
    }
}

fn hex_preview(payload: &[u8]) -> String {
    const MAX_SHOWN: usize = 32;
    let mut out = String::with_capacity(MAX_SHOWN * 3 + 16);
    for (i, byte) in payload.iter().take(MAX_SHOWN).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    if payload.len() > MAX_SHOWN {
        out.push_str(&format!(" ... ({} bytes)", payload.len()));
    }
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
