use thiserror::Error;

/// Longest line accepted before the stream is abandoned.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// One `data:` line, with the most recent `event:`/`id:` fields seen before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseRecord {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("upstream line exceeds {limit} bytes without a newline")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Parser state for a newline-delimited event stream.
///
/// Every completed `data:` line is a record of its own; blank lines only
/// clear the `event:`/`id:` fields. Splitting happens on raw bytes, so a
/// UTF-8 sequence cut across two chunks is decoded intact once its line
/// completes.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no newline.
    scanned: usize,
    max_line_bytes: usize,
    overflow: Option<LineTooLong>,
    event: Option<String>,
    id: Option<String>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            max_line_bytes,
            overflow: None,
            event: None,
            id: None,
        }
    }

    /// Append a chunk and return every record it completed, in order.
    ///
    /// Once a line outgrows the limit the buffer is dropped, [`overflow`]
    /// reports it and later chunks are ignored.
    ///
    /// [`overflow`]: FrameBuffer::overflow
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseRecord> {
        let mut records = Vec::new();
        if self.overflow.is_some() {
            return records;
        }

        self.pending.extend_from_slice(chunk);
        let mut start = 0;

        while let Some(offset) = self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let line = &self.pending[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(record) = self.process_line(&line) {
                records.push(record);
            }
            start = end + 1;
            self.scanned = start;
        }

        self.pending.drain(..start);
        self.scanned = self.pending.len();

        if self.pending.len() > self.max_line_bytes {
            self.pending = Vec::new();
            self.scanned = 0;
            self.overflow = Some(LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        records
    }

    /// True if bytes after the last newline are waiting for the rest of their line.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn overflow(&self) -> Option<&LineTooLong> {
        self.overflow.as_ref()
    }

    fn process_line(&mut self, line: &str) -> Option<SseRecord> {
        if line.is_empty() {
            self.event = None;
            self.id = None;
            return None;
        }

        // Comment
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                return Some(SseRecord {
                    event: self.event.clone(),
                    id: self.id.clone(),
                    data: value.to_string(),
                })
            }
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }
}
