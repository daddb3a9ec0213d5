//! Line-oriented event-stream framing
//!
//! Each event is a run of `event:`/`data:` lines terminated by a blank
//! line. The decoder is incremental: callers feed it raw body chunks as
//! they arrive and collect whole frames, so a frame split across chunk
//! boundaries is reassembled transparently.

/// One decoded event-stream frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event name, if an `event:` line was present
    pub event: Option<String>,

    /// Payload: all `data:` lines joined with newlines
    pub data: String,
}

impl Frame {
    /// Whether this is the session-announcement frame
    pub fn is_endpoint(&self) -> bool {
        self.event.as_deref() == Some("endpoint")
    }
}

/// Incremental frame decoder
///
/// Comment lines (`:` prefix) and unknown fields (`id:`, `retry:`) are
/// skipped. An event with no data lines is discarded at its boundary.
#[derive(Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl FrameBuffer {
    /// Feed a chunk of bytes, returning every frame completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;

        while let Some(pos) = self.buf[consumed..].iter().position(|b| *b == b'\n') {
            let newline = consumed + pos;
            let mut end = newline;
            if end > consumed && self.buf[end - 1] == b'\r' {
                end -= 1;
            }

            if let Ok(line) = std::str::from_utf8(&self.buf[consumed..end]) {
                let line = line.to_string();
                if let Some(frame) = self.feed_line(&line) {
                    frames.push(frame);
                }
            }
            consumed = newline + 1;
        }

        if consumed > 0 {
            self.buf.drain(..consumed);
        }
        frames
    }

    /// Flush the trailing partial line and any pending frame once the
    /// stream has ended
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();

        let rest: Vec<u8> = self.buf.drain(..).collect();
        if let Ok(line) = std::str::from_utf8(&rest) {
            let line = line.trim_end_matches('\r');
            if let Some(frame) = self.feed_line(line) {
                frames.push(frame);
            }
        }

        if let Some(frame) = self.take_frame() {
            frames.push(frame);
        }
        frames
    }

    fn feed_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.take_frame();
        }

        if line.starts_with(':') {
            return None;
        }

        if let Some(value) = line.strip_prefix("event:") {
            self.event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data_lines.push(value.trim_start().to_string());
        }
        // id:, retry:, and unknown fields are ignored

        None
    }

    fn take_frame(&mut self) -> Option<Frame> {
        let event = self.event.take();
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(Frame { event, data })
    }
}
