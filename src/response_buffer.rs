//! # Response Buffering
//!
//! Handlers never write to the transport directly. They write into a
//! [`ResponseBuffer`], which records the status, headers and body and only
//! touches the real [`ResponseSink`] when it is flushed. Flushing consumes the
//! buffer, so a job can deliver its output at most once, and whichever
//! coroutine ran the job is the only one that ever touches its sink.
//!
//! Flush order is always headers, status, body.

use crate::dispatcher::HeaderVec;
use may::sync::Mutex;
use std::sync::{Arc, PoisonError};

/// Status used when a handler never sets one.
pub const DEFAULT_STATUS: u16 = 200;

/// Destination for a handler's output.
///
/// Implemented by the transport's real sink, by [`ResponseBuffer`] (what
/// handlers actually see), and by [`CapturedResponse`] / [`SharedResponse`].
pub trait ResponseSink: Send {
    /// Record a response header.
    fn set_header(&mut self, name: &str, value: &str);
    /// Record the status code.
    fn write_status(&mut self, status: u16);
    /// Append body bytes.
    fn write_body(&mut self, chunk: &[u8]);

    /// Convenience for the common JSON reply.
    fn write_json(&mut self, status: u16, body: &serde_json::Value) {
        self.set_header("content-type", "application/json");
        self.write_status(status);
        self.write_body(body.to_string().as_bytes());
    }
}

/// Per-job staging area between a handler and the real sink.
pub struct ResponseBuffer {
    sink: Box<dyn ResponseSink>,
    status: Option<u16>,
    headers: HeaderVec,
    body: Vec<u8>,
}

impl ResponseBuffer {
    #[must_use]
    pub fn new(sink: Box<dyn ResponseSink>) -> Self {
        Self {
            sink,
            status: None,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// Status that flush would write right now.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status.unwrap_or(DEFAULT_STATUS)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Deliver the recorded output to the real sink.
    pub fn flush(self) {
        let Self {
            mut sink,
            status,
            headers,
            body,
        } = self;
        for (name, value) in &headers {
            sink.set_header(name, value);
        }
        sink.write_status(status.unwrap_or(DEFAULT_STATUS));
        sink.write_body(&body);
    }

    /// Discard anything the handler produced and flush an error instead.
    pub fn fail(self, status: u16) {
        let mut sink = self.sink;
        let reason = match status {
            503 => "Service is shutting down",
            _ => "Internal Server Error",
        };
        sink.write_json(status, &serde_json::json!({ "error": reason }));
    }
}

impl ResponseSink for ResponseBuffer {
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.to_string()));
    }

    fn write_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }
}

impl std::io::Write for ResponseBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// In-memory sink that records what was written and how often.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedResponse {
    pub status: Option<u16>,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
    pub status_writes: usize,
    pub body_writes: usize,
}

impl CapturedResponse {
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as JSON, `Value::Null` if it does not parse.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or_default()
    }

    /// Copy the captured output into another sink with a single status write
    /// and a single body write.
    pub fn replay(&self, sink: &mut dyn ResponseSink) {
        for (name, value) in &self.headers {
            sink.set_header(name, value);
        }
        match self.status {
            Some(status) => {
                sink.write_status(status);
                sink.write_body(&self.body);
            }
            None => sink.write_json(
                500,
                &serde_json::json!({ "error": "Handler produced no response" }),
            ),
        }
    }
}

impl ResponseSink for CapturedResponse {
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.to_string()));
    }

    fn write_status(&mut self, status: u16) {
        self.status = Some(status);
        self.status_writes += 1;
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
        self.body_writes += 1;
    }
}

/// A [`CapturedResponse`] shared between the submitting caller and whichever
/// coroutine runs the job. The lock is per job and uncontended.
#[derive(Clone)]
pub struct SharedResponse {
    inner: Arc<Mutex<CapturedResponse>>,
}

impl SharedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CapturedResponse::default())),
        }
    }

    /// Clone of what has been written so far.
    #[must_use]
    pub fn snapshot(&self) -> CapturedResponse {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replay(&self, sink: &mut dyn ResponseSink) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replay(sink);
    }
}

impl Default for SharedResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedResponse").field(&self.snapshot()).finish()
    }
}

impl ResponseSink for SharedResponse {
    fn set_header(&mut self, name: &str, value: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_header(name, value);
    }

    fn write_status(&mut self, status: u16) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_status(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_body(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_reaches_sink_before_flush() {
        let shared = SharedResponse::new();
        let mut buffer = ResponseBuffer::new(Box::new(shared.clone()));
        buffer.write_status(201);
        buffer.set_header("content-type", "text/plain");
        buffer.write_body(b"hello ");
        buffer.write_body(b"world");

        assert_eq!(shared.snapshot(), CapturedResponse::default());
        assert_eq!(buffer.status(), 201);

        buffer.flush();
        let out = shared.snapshot();
        assert_eq!(out.status, Some(201));
        assert_eq!(out.body, b"hello world");
        assert_eq!(out.get_header("Content-Type"), Some("text/plain"));
        assert_eq!(out.status_writes, 1);
        assert_eq!(out.body_writes, 1);
    }

    #[test]
    fn test_default_status_is_ok() {
        let shared = SharedResponse::new();
        let mut buffer = ResponseBuffer::new(Box::new(shared.clone()));
        buffer.write_body(b"{}");
        buffer.flush();
        assert_eq!(shared.snapshot().status, Some(DEFAULT_STATUS));
    }

    #[test]
    fn test_fail_discards_partial_output() {
        let shared = SharedResponse::new();
        let mut buffer = ResponseBuffer::new(Box::new(shared.clone()));
        buffer.write_status(200);
        buffer.write_body(b"half a resp");
        buffer.fail(500);

        let out = shared.snapshot();
        assert_eq!(out.status, Some(500));
        assert_eq!(out.json()["error"], "Internal Server Error");
        assert_eq!(out.status_writes, 1);
        assert_eq!(out.body_writes, 1);
    }

    #[test]
    fn test_io_write_appends_to_body() {
        use std::io::Write as _;

        let shared = SharedResponse::new();
        let mut buffer = ResponseBuffer::new(Box::new(shared.clone()));
        write!(buffer, "n={}", 42).unwrap();
        assert_eq!(buffer.body(), b"n=42");
        ResponseBuffer::flush(buffer);
        assert_eq!(shared.snapshot().body, b"n=42");
    }

    #[test]
    fn test_replay_without_status_reports_500() {
        let mut target = CapturedResponse::default();
        CapturedResponse::default().replay(&mut target);
        assert_eq!(target.status, Some(500));
    }
}
