use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::errors::RelayResult;
use crate::models::message::ChatMessage;
use crate::stream::{ByteStream, FrameBuffer, SseRecord};

/// Static description of an upstream: what it is called and which models
/// callers may request from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub id: String,
    pub display_name: String,
    pub models: BTreeSet<String>,
}

impl ProviderDescriptor {
    pub fn new<I, D, M>(id: I, display_name: D, models: M) -> Self
    where
        I: Into<String>,
        D: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            models: models.into_iter().map(Into::into).collect(),
        }
    }

    pub fn supports(&self, model: &str) -> bool {
        self.models.contains(model)
    }
}

/// A fully built upstream HTTP call. Lives for a single relay.
#[derive(Clone)]
pub struct UpstreamRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl UpstreamRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(key, value)| {
                if key.eq_ignore_ascii_case("authorization") {
                    (key.as_str(), "<redacted>")
                } else {
                    (key.as_str(), value.as_str())
                }
            })
            .collect();

        f.debug_struct("UpstreamRequest")
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// What a single upstream record means, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Delta(String),
    Done,
    Error(String),
    /// Well-formed but carries nothing the relay forwards (usage, role-only deltas, ...).
    Ignored,
}

#[derive(Error, Debug)]
#[error("malformed upstream record: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Translation layer for one upstream chat-completion API
#[async_trait]
pub trait Provider: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Build the upstream call. Fails with `MissingCredentials` before any
    /// network activity when the API key is not configured.
    fn build_request(
        &self,
        messages: &[ChatMessage],
        model: &str,
        max_tokens: Option<u32>,
    ) -> RelayResult<UpstreamRequest>;

    /// Send the request and hand back the raw response body.
    async fn open_stream(
        &self,
        request: UpstreamRequest,
        cancel: &CancellationToken,
    ) -> RelayResult<ByteStream>;

    /// Interpret one complete record.
    fn decode_record(&self, record: &SseRecord) -> Result<ProviderEvent, DecodeError>;

    /// Feed a transport chunk and decode every record it completed.
    /// Records that fail to decode are logged and dropped; a line that
    /// outgrows the buffer limit ends the stream with an error.
    fn parse_frame(&self, buffer: &mut FrameBuffer, chunk: &[u8]) -> Vec<ProviderEvent> {
        let mut events: Vec<ProviderEvent> = buffer
            .feed(chunk)
            .iter()
            .filter_map(|record| match self.decode_record(record) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!(
                        provider = self.id(),
                        error = %err,
                        data = %record.data,
                        "dropping upstream record"
                    );
                    None
                }
            })
            .collect();

        if let Some(overflow) = buffer.overflow() {
            events.push(ProviderEvent::Error(overflow.to_string()));
        }
        events
    }
}
