use crate::context::RequestContext;
use crate::dispatcher::{HandlerRequest, HeaderVec, ParamVec};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use http::Method;
use may_minihttp::Request;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest body read off the wire; anything beyond is dropped.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Split a request target into its path and parsed query parameters.
///
/// Names and values are URL-decoded. Repeated names are kept in order.
pub fn split_target(target: &str) -> (String, ParamVec) {
    match target.split_once('?') {
        Some((path, query)) => {
            let params = url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (Arc::<str>::from(k.as_ref()), v.into_owned()))
                .collect();
            (path.to_string(), params)
        }
        None => (target.to_string(), ParamVec::new()),
    }
}

/// Convert a raw `may_minihttp::Request` into an owned [`HandlerRequest`].
///
/// The request carries a fresh context with `timeout` as its deadline. An
/// unrecognised method falls back to `GET` with a warning; a body that cannot
/// be read is treated as empty.
pub fn parse_request(req: Request, timeout: Option<Duration>) -> HandlerRequest {
    let method = Method::from_bytes(req.method().as_bytes()).unwrap_or_else(|_| {
        warn!(method = %req.method(), "Unrecognised HTTP method, treating as GET");
        Method::GET
    });
    let (path, query_params) = split_target(req.path());

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::<str>::from(h.name.to_ascii_lowercase()),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();

    let request_id = RequestId::from_header_or_new(
        headers
            .iter()
            .find(|(k, _)| k.as_ref() == REQUEST_ID_HEADER)
            .map(|(_, v)| v.as_str()),
    );

    let mut body = Vec::new();
    if let Err(e) = req.body().take(MAX_BODY_BYTES).read_to_end(&mut body) {
        warn!(request_id = %request_id, error = %e, "Failed to read request body");
        body.clear();
    }

    debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        headers_count = headers.len(),
        query_count = query_params.len(),
        body_size_bytes = body.len(),
        "HTTP request parsed"
    );

    let context = match timeout {
        Some(timeout) => RequestContext::with_timeout(timeout),
        None => RequestContext::background(),
    };

    let mut request = HandlerRequest::new(method, path)
        .with_body(body)
        .with_context(context);
    request.request_id = request_id;
    request.headers = headers;
    request.query_params = query_params;
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_target_without_query() {
        let (path, params) = split_target("/health");
        assert_eq!(path, "/health");
        assert!(params.is_empty());
    }

    #[test]
    fn test_split_target_decodes_query() {
        let (path, params) = split_target("/echo?name=a%20b&x=1&x=2");
        assert_eq!(path, "/echo");
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].0.as_ref(), "name");
        assert_eq!(params[0].1, "a b");
        assert_eq!(params[2].1, "2");
    }
}
