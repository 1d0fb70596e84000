//! These models represent the objects passed through the relay
//!
//! There are several different related formats we need to interact with:
//! - chat messages sent from the interface to the relay
//! - openai-compatible messages sent from the relay to each upstream provider
//! - normalized stream events sent from the relay back to the interface
//!
//! Inbound shapes are converted into these structs as soon as they are
//! deserialized; each provider adapter renders them into its own wire shape.
pub mod event;
pub mod message;
pub mod role;
