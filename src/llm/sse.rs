/// Marker that prefixes every payload-carrying line.
pub const DATA_PREFIX: &str = "data:";
/// Payload that ends the stream normally.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Accumulates raw body bytes and hands out complete lines.
///
/// Bytes are buffered until a newline arrives, so a multi-byte character or
/// a JSON payload split across network reads is only decoded once whole.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator (`\n` or `\r\n`).
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whatever is left once the body ends without a final newline.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}

/// What a single line of the event stream amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Blank lines, comments, `event:`/`id:` fields.
    Ignored,
    Data(&'a str),
    Done,
}

pub fn classify_line(line: &str) -> Line<'_> {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Line::Ignored;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        Line::Done
    } else if payload.is_empty() {
        Line::Ignored
    } else {
        Line::Data(payload)
    }
}
