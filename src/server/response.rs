use crate::response_buffer::CapturedResponse;
use may_minihttp::Response;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::warn;

/// Distinct dynamic header lines kept for the life of the process.
const MAX_INTERNED_HEADERS: usize = 512;

/// Header lines common enough to never need interning.
const STATIC_HEADERS: &[(&str, &str, &str)] = &[
    ("content-type", "application/json", "Content-Type: application/json"),
    ("content-type", "text/plain", "Content-Type: text/plain"),
    ("content-type", "text/plain; charset=utf-8", "Content-Type: text/plain; charset=utf-8"),
    ("content-type", "text/html", "Content-Type: text/html"),
    ("content-type", "text/event-stream", "Content-Type: text/event-stream"),
    ("content-type", "application/octet-stream", "Content-Type: application/octet-stream"),
    ("cache-control", "no-store", "Cache-Control: no-store"),
    ("cache-control", "no-cache", "Cache-Control: no-cache"),
    ("retry-after", "1", "Retry-After: 1"),
];

pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "OK",
    }
}

/// `may_minihttp` only takes `'static` header lines. Common lines come from a
/// fixed table; anything else is leaked once and reused, up to a cap.
fn header_line(name: &str, value: &str) -> Option<&'static str> {
    if let Some((_, _, line)) = STATIC_HEADERS
        .iter()
        .find(|(n, v, _)| n.eq_ignore_ascii_case(name) && *v == value)
    {
        return Some(*line);
    }
    // Reject anything that could split the header block
    if name.is_empty() || name.contains([':', '\r', '\n']) || value.contains(['\r', '\n']) {
        warn!(header = %name, "Dropping malformed response header");
        return None;
    }

    static INTERNED: OnceLock<Mutex<HashMap<String, &'static str>>> = OnceLock::new();
    let line = format!("{name}: {value}");
    let mut interned = INTERNED
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = interned.get(&line) {
        return Some(*existing);
    }
    if interned.len() >= MAX_INTERNED_HEADERS {
        warn!(header = %name, "Too many distinct response headers, dropping");
        return None;
    }
    let leaked: &'static str = Box::leak(line.clone().into_boxed_str());
    interned.insert(line, leaked);
    Some(leaked)
}

/// Write a captured handler response to the wire.
pub fn write_captured(res: &mut Response, captured: &CapturedResponse) {
    let status = captured.status.unwrap_or(500);
    res.status_code(usize::from(status), status_reason(status));
    for (name, value) in &captured.headers {
        if let Some(line) = header_line(name, value) {
            res.header(line);
        }
    }
    res.body_vec(captured.body.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(503), "Service Unavailable");
    }

    #[test]
    fn test_static_header_lines_are_reused() {
        let line = header_line("Content-Type", "application/json");
        assert_eq!(line, Some("Content-Type: application/json"));
    }

    #[test]
    fn test_dynamic_header_lines_are_interned() {
        let a = header_line("x-pool", "api").unwrap();
        let b = header_line("x-pool", "api").unwrap();
        assert_eq!(a, "x-pool: api");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_header_injection_is_dropped() {
        assert_eq!(header_line("x-evil", "a\r\nSet-Cookie: b"), None);
        assert_eq!(header_line("bad:name", "v"), None);
    }
}
