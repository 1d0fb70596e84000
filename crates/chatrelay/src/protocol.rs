//! Wire format of the relay's outbound stream, and a consumer for it
//!
//! Every record is either a comment (`: ...`) that readers skip, or a single
//! `data:` line:
//! - `data: {"content":"..."}` for a delta
//! - `data: [DONE]` when the stream finished
//! - `data: {"error":"..."}` when it failed after streaming began
use serde_json::{json, Value};

use crate::models::event::NormalizedEvent;
use crate::providers::base::ProviderEvent;
use crate::providers::utils::{event_from_payload, DONE_MARKER};
use crate::stream::{FrameBuffer, SseRecord};

pub const CONTENT_TYPE: &str = "text/event-stream";

pub struct ProtocolFormatter;

impl ProtocolFormatter {
    pub fn format_event(event: &NormalizedEvent) -> String {
        match event {
            NormalizedEvent::Delta(text) => format!("data: {}\n\n", json!({ "content": text })),
            NormalizedEvent::Done => format!("data: {}\n\n", DONE_MARKER),
            NormalizedEvent::Error(message) => {
                format!("data: {}\n\n", json!({ "error": message }))
            }
        }
    }

    pub fn format_comment(text: &str) -> String {
        format!(": {}\n\n", text.replace(['\r', '\n'], " "))
    }
}

/// How a consumed stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Failed(String),
    /// The transport closed before any terminal record arrived.
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub outcome: Outcome,
}

/// Reassembles the text of a relay stream as bytes arrive.
///
/// Accepts the relay's own `{content}` records and also raw OpenAI-style
/// `choices[0].delta.content` records, so it can sit directly on an upstream
/// as well. Records after the terminal one are ignored.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: FrameBuffer,
    text: String,
    outcome: Option<Outcome>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<NormalizedEvent> {
        let mut events = Vec::new();
        if self.outcome.is_some() {
            return events;
        }

        for record in self.buffer.feed(chunk) {
            let Some(event) = Self::decode(&record) else {
                continue;
            };

            match &event {
                NormalizedEvent::Delta(text) => self.text.push_str(text),
                NormalizedEvent::Done => self.outcome = Some(Outcome::Finished),
                NormalizedEvent::Error(message) => {
                    self.outcome = Some(Outcome::Failed(message.clone()))
                }
            }

            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                return events;
            }
        }

        if let Some(overflow) = self.buffer.overflow() {
            let message = overflow.to_string();
            self.outcome = Some(Outcome::Failed(message.clone()));
            events.push(NormalizedEvent::Error(message));
        }
        events
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn finish(self) -> Completion {
        Completion {
            text: self.text,
            outcome: self.outcome.unwrap_or(Outcome::Truncated),
        }
    }

    fn decode(record: &SseRecord) -> Option<NormalizedEvent> {
        let data = record.data.trim();
        if data == DONE_MARKER {
            return Some(NormalizedEvent::Done);
        }
        if data.is_empty() {
            return None;
        }

        let payload: Value = match serde_json::from_str(data) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, data, "skipping unparseable stream record");
                return None;
            }
        };

        match event_from_payload(&payload) {
            ProviderEvent::Delta(text) => Some(NormalizedEvent::Delta(text)),
            ProviderEvent::Error(message) => Some(NormalizedEvent::Error(message)),
            ProviderEvent::Done => Some(NormalizedEvent::Done),
            ProviderEvent::Ignored => None,
        }
    }
}
