use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::framing::FrameBuffer;
use crate::errors::RelayResult;
use crate::models::event::NormalizedEvent;
use crate::providers::base::{Provider, ProviderEvent};

/// Raw upstream body, in whatever chunks the transport delivers.
pub type ByteStream = BoxStream<'static, RelayResult<Bytes>>;

/// Normalized output of one relay.
pub type EventStream = BoxStream<'static, NormalizedEvent>;

/// Drive `provider`'s decoder over `bytes` until a terminal event.
///
/// - a `[DONE]`-style record ends the stream with `Done`
/// - an in-band provider error or a transport failure ends it with `Error`
/// - transport close without a terminal record is a graceful `Done`
/// - cancellation ends the stream immediately with no terminal event, and
///   dropping the stream releases the upstream connection
pub fn normalize(
    provider: Arc<dyn Provider>,
    mut bytes: ByteStream,
    cancel: CancellationToken,
) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut buffer = FrameBuffer::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(provider = provider.id(), "relay cancelled, abandoning upstream read");
                    return;
                }
                next = bytes.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for event in provider.parse_frame(&mut buffer, &chunk) {
                        match event {
                            ProviderEvent::Delta(text) => yield NormalizedEvent::Delta(text),
                            ProviderEvent::Done => {
                                yield NormalizedEvent::Done;
                                return;
                            }
                            ProviderEvent::Error(message) => {
                                tracing::error!(provider = provider.id(), error = %message, "provider reported an error mid-stream");
                                yield NormalizedEvent::Error(message);
                                return;
                            }
                            ProviderEvent::Ignored => {}
                        }
                    }
                }
                Some(Err(err)) => {
                    tracing::error!(provider = provider.id(), error = %err, "upstream read failed");
                    yield NormalizedEvent::Error(err.to_string());
                    return;
                }
                None => {
                    if buffer.has_pending() {
                        tracing::debug!(provider = provider.id(), "discarding incomplete trailing record");
                    }
                    yield NormalizedEvent::Done;
                    return;
                }
            }
        }
    })
}
