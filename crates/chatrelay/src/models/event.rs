/// The provider-agnostic vocabulary of the relay's output stream.
///
/// Deltas arrive in upstream order and exactly one terminal event
/// (`Done` or `Error`) closes a stream that ran to completion. A stream that
/// is cancelled by its consumer simply ends without a terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedEvent {
    Delta(String),
    Done,
    Error(String),
}

impl NormalizedEvent {
    pub fn delta<S: Into<String>>(text: S) -> Self {
        NormalizedEvent::Delta(text.into())
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        NormalizedEvent::Error(message.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NormalizedEvent::Done | NormalizedEvent::Error(_))
    }

    pub fn as_delta(&self) -> Option<&str> {
        match self {
            NormalizedEvent::Delta(text) => Some(text),
            _ => None,
        }
    }
}
