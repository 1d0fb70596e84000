use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use chatrelay::{
    errors::RelayError,
    protocol::{ProtocolFormatter, CONTENT_TYPE},
    relay::{authenticate, Caller, RelayRequest},
    stream::EventStream,
};
use futures::{stream::StreamExt, Stream};
use serde_json::Value;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Set by the session layer in front of the relay for signed-in users.
///
/// The value is trusted as-is, so the relay must only be reachable through
/// that layer, which strips or overwrites this header on every request.
pub const USER_HEADER: &str = "x-relay-user";

// Normalized event stream written back to the caller
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = Body::from_stream(self);

        (
            [
                (header::CONTENT_TYPE, CONTENT_TYPE),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

fn caller_from_headers(headers: &HeaderMap) -> Caller {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(|user| Caller::User(user.to_string()))
        .unwrap_or(Caller::Anonymous)
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<SseResponse, ApiError> {
    // The guest flag is read before the body is validated so an anonymous
    // caller is always answered with 401, whatever else is wrong.
    let raw: Option<Value> = serde_json::from_slice(&body).ok();
    let guest_requested = raw
        .as_ref()
        .and_then(|value| value.get("isGuestRequest"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let authenticated = authenticate(caller_from_headers(&headers), guest_requested)?;

    let request: RelayRequest = serde_json::from_slice(&body)
        .map_err(|e| RelayError::InvalidInput(format!("Invalid request body: {}", e)))?;

    let validated = authenticated.validate(&state.registry, request, &state.policy)?;
    tracing::info!(
        provider = validated.provider_id(),
        model = validated.model(),
        guest = validated.identity().is_guest(),
        "relay started"
    );

    let cancel = CancellationToken::new();
    let streaming = validated.open(cancel.clone()).await?;
    let provider = streaming.provider_id().to_string();
    let keep_alive = state.keep_alive;

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(async move {
        pump(streaming.into_events(), tx, cancel, keep_alive).await;
        tracing::info!(provider = %provider, "relay finished");
    });

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

/// Forward normalized events to the response channel until a terminal event,
/// the end of the stream, or the client going away.
///
/// Dropping out of this function for any reason cancels the upstream read.
async fn pump(
    mut events: EventStream,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    keep_alive: Duration,
) {
    let _guard = cancel.drop_guard();

    loop {
        tokio::select! {
            biased;
            _ = tx.closed() => {
                tracing::info!("client disconnected, cancelling upstream");
                break;
            }
            next = timeout(keep_alive, events.next()) => {
                match next {
                    Ok(Some(event)) => {
                        let terminal = event.is_terminal();
                        if tx.send(ProtocolFormatter::format_event(&event)).await.is_err() {
                            tracing::info!("client disconnected mid-write, cancelling upstream");
                            break;
                        }
                        if terminal {
                            break;
                        }
                    }
                    // Only a cancelled normalizer ends without a terminal event
                    Ok(None) => break,
                    Err(_) => {
                        // Heartbeat, keeps idle proxies from closing the stream
                        if tx.send(ProtocolFormatter::format_comment("keep-alive")).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .with_state(state)
}
