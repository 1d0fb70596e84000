//! Incremental handling of upstream event streams
//!
//! [`framing`] turns arbitrarily chunked bytes into event records, one per `data:` line,
//! [`normalizer`] drives a provider's decoder over those records and produces
//! the relay's [`NormalizedEvent`](crate::models::event::NormalizedEvent) stream.
pub mod framing;
pub mod normalizer;

pub use framing::{FrameBuffer, LineTooLong, SseRecord, DEFAULT_MAX_LINE_BYTES};
pub use normalizer::{normalize, ByteStream, EventStream};
