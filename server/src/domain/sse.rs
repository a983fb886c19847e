//! SSE framing
//!
//! The wire format is fixed: `event: <name>\ndata: <one-line-json>\n\n`,
//! one frame per event, flushed immediately so clients see tokens promptly.
//! The decoder exists for tests that replay captured bodies; it joins
//! multi-line `data:` payloads and emits one frame per blank-line-separated
//! block.

use serde_json::Value;

/// Frame event names. Exactly one terminal (`done` or `error`) per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseEvent {
    Start,
    Token,
    Done,
    Error,
}

impl SseEvent {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SseEvent::Start => "start",
            SseEvent::Token => "token",
            SseEvent::Done => "done",
            SseEvent::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(SseEvent::Start),
            "token" => Some(SseEvent::Token),
            "done" => Some(SseEvent::Done),
            "error" => Some(SseEvent::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for SseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `event:`/`data:` pair
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: SseEvent,
    pub data: Value,
}

impl SseFrame {
    pub fn new(event: SseEvent, data: Value) -> Self {
        Self { event, data }
    }

    /// Encode to the wire format with compact one-line JSON
    pub fn encode(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event.as_str(), self.data)
    }

    /// Decode a captured body into frames. Unknown event names and
    /// unparsable payloads are skipped.
    pub fn decode_all(body: &str) -> Vec<SseFrame> {
        let mut frames = Vec::new();

        for block in body.split("\n\n") {
            let mut event = None;
            let mut data_lines: Vec<&str> = Vec::new();

            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = SseEvent::parse(name.trim());
                } else if let Some(payload) = line.strip_prefix("data:") {
                    data_lines.push(payload.trim_start_matches(' '));
                }
            }

            let (Some(event), false) = (event, data_lines.is_empty()) else {
                continue;
            };
            if let Ok(data) = serde_json::from_str(&data_lines.join("\n")) {
                frames.push(SseFrame { event, data });
            }
        }

        frames
    }
}
