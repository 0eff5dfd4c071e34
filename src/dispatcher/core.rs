//! Handler contract and the request type that flows through the pool.

use crate::context::RequestContext;
use crate::ids::RequestId;
use crate::response_buffer::ResponseSink;
use http::Method;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum inline headers before heap allocation
/// Most requests have ≤16 headers
pub const MAX_INLINE_HEADERS: usize = 16;

/// Maximum inline query parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated header storage for the hot path.
///
/// Header names use `Arc<str>` since they repeat across requests
/// (Content-Type, Authorization, ...).
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Stack-allocated query parameter storage.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// An owned inbound request.
///
/// Owned so a job can carry it to whichever coroutine ends up running it.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
    context: RequestContext,
}

impl HandlerRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            query_params: ParamVec::new(),
            headers: HeaderVec::new(),
            body: Vec::new(),
            context: RequestContext::background(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_query_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query_params.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Replace the execution context, keeping everything else.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name
    ///
    /// Uses "last write wins" semantics: if duplicate parameter names exist
    /// (e.g., `?limit=10&limit=20`), returns the last occurrence.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Body parsed as JSON, if it is JSON.
    #[must_use]
    pub fn json_body(&self) -> Option<serde_json::Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

/// Anything that can answer a request by writing into a sink.
///
/// Handlers run on pool workers or inline on the caller, so they must be
/// `Send + Sync`. Errors are the handler's business: encode them as a status
/// and body. A panic is caught by the pool and turned into a `500`.
pub trait Handler: Send + Sync {
    fn serve(&self, res: &mut dyn ResponseSink, req: &HandlerRequest);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseSink, &HandlerRequest) + Send + Sync,
{
    fn serve(&self, res: &mut dyn ResponseSink, req: &HandlerRequest) {
        self(res, req)
    }
}

/// Shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;
