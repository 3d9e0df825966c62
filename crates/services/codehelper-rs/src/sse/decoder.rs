//! Incremental `text/event-stream` decoder.
//!
//! Handles:
//! - `\n`, `\r\n` and `\r` line endings, including a `\r\n` split across chunks
//! - chunk boundaries inside lines and inside multi-byte UTF-8 characters
//! - multi-line data (several `data:` lines)
//! - comments and `id:`/`retry:`/unknown fields (ignored)
//! - lines longer than the line limit (the block is reported as malformed)

/// Longest line kept in memory while waiting for its terminator.
pub(crate) const MAX_LINE_LEN: usize = 1024 * 1024;

/// One dispatched event block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A block carrying a data payload.
    Message {
        /// Value of the `event:` field, if any.
        event: Option<String>,
        /// Data lines joined with `\n`.
        data: String,
    },
    /// A block whose payload could not be extracted.
    Malformed(String),
}

#[derive(Debug, Default)]
struct PendingBlock {
    event: Option<String>,
    data: Option<String>,
    invalid: Option<String>,
}

impl PendingBlock {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_none() && self.invalid.is_none()
    }
}

/// Turns raw body bytes into [`Frame`]s.
#[derive(Debug)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    block: PendingBlock,
    skip_lf: bool,
    started: bool,
    // Dropping the rest of an over-long line.
    overflow: bool,
    max_line: usize,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::with_max_line(MAX_LINE_LEN)
    }

    pub(crate) fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            block: PendingBlock::default(),
            skip_lf: false,
            started: false,
            overflow: false,
            max_line,
        }
    }

    /// Push a chunk of bytes and return every block it completes.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut bytes = chunk;

        if self.skip_lf {
            self.skip_lf = false;
            if let Some(rest) = bytes.strip_prefix(b"\n") {
                bytes = rest;
            }
        }

        while let Some(pos) = bytes.iter().position(|b| *b == b'\n' || *b == b'\r') {
            if self.overflow || self.buffer.len() + pos > self.max_line {
                self.discard_line();
            } else {
                self.buffer.extend_from_slice(&bytes[..pos]);
                let line = std::mem::take(&mut self.buffer);
                if let Some(frame) = self.process_line(&line) {
                    frames.push(frame);
                }
            }

            let is_cr = bytes[pos] == b'\r';
            bytes = &bytes[pos + 1..];
            if is_cr {
                match bytes.first() {
                    Some(b'\n') => bytes = &bytes[1..],
                    None => self.skip_lf = true,
                    Some(_) => {}
                }
            }
        }

        if !self.overflow {
            if self.buffer.len() + bytes.len() > self.max_line {
                self.buffer = Vec::new();
                self.overflow = true;
            } else {
                self.buffer.extend_from_slice(bytes);
            }
        }
        frames
    }

    /// Finish a line that went over the limit; its block becomes malformed.
    fn discard_line(&mut self) {
        self.overflow = false;
        self.started = true;
        self.buffer = Vec::new();
        let limit = self.max_line;
        self.block
            .invalid
            .get_or_insert_with(|| format!("line longer than {limit} bytes"));
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<Frame> {
        let mut raw = raw;
        if !self.started {
            self.started = true;
            raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
        }

        if raw.is_empty() {
            return self.dispatch();
        }
        if raw.first() == Some(&b':') {
            return None;
        }

        let Ok(line) = std::str::from_utf8(raw) else {
            self.block
                .invalid
                .get_or_insert_with(|| "event payload is not valid UTF-8".to_string());
            return None;
        };

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => match &mut self.block.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.block.data = Some(value.to_string()),
            },
            "event" => self.block.event = Some(value.to_string()),
            // `id` and `retry` only matter for reconnection, which this client never does.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<Frame> {
        if self.block.is_empty() {
            return None;
        }
        let block = std::mem::take(&mut self.block);

        if let Some(reason) = block.invalid {
            return Some(Frame::Malformed(reason));
        }
        match block.data {
            Some(data) => Some(Frame::Message {
                event: block.event,
                data,
            }),
            None => Some(Frame::Malformed(format!(
                "event '{}' carried no data",
                block.event.unwrap_or_default()
            ))),
        }
    }
}
