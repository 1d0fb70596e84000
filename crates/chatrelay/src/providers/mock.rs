use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::base::{DecodeError, Provider, ProviderDescriptor, ProviderEvent, UpstreamRequest};
use super::utils::{decode_openai_record, messages_to_openai_spec, AttachmentFormat};
use crate::errors::{RelayError, RelayResult};
use crate::models::message::ChatMessage;
use crate::stream::{ByteStream, SseRecord};

/// A mock provider that replays pre-configured body chunks for testing
pub struct MockProvider {
    descriptor: ProviderDescriptor,
    chunks: Mutex<Vec<&'static str>>,
    failure: Option<RelayError>,
    opened: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            descriptor: ProviderDescriptor::new("mock", "Mock", ["mock-small", "mock-large"]),
            chunks: Mutex::new(Vec::new()),
            failure: None,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_chunks(self, chunks: Vec<&'static str>) -> Self {
        *self.chunks.lock().unwrap() = chunks;
        self
    }

    /// Make `open_stream` fail with `error`.
    pub fn failing(mut self, error: RelayError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Shared counter of `open_stream` calls.
    pub fn open_count(&self) -> Arc<AtomicUsize> {
        self.opened.clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        model: &str,
        max_tokens: Option<u32>,
    ) -> RelayResult<UpstreamRequest> {
        Ok(UpstreamRequest {
            url: "http://mock.invalid/v1/chat/completions".to_string(),
            headers: Vec::new(),
            body: json!({
                "model": model,
                "messages": messages_to_openai_spec(messages, AttachmentFormat::TextReference),
                "max_tokens": max_tokens,
                "stream": true,
            }),
        })
    }

    async fn open_stream(
        &self,
        _request: UpstreamRequest,
        _cancel: &CancellationToken,
    ) -> RelayResult<ByteStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let chunks = std::mem::take(&mut *self.chunks.lock().unwrap());
        Ok(stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c)))).boxed())
    }

    fn decode_record(&self, record: &SseRecord) -> Result<ProviderEvent, DecodeError> {
        decode_openai_record(record)
    }
}
