//! Built-in handlers and a small method/path routing table.
//!
//! These are what the `gatepool` binary serves: a health probe, pool
//! statistics, and two demo endpoints (`echo`, `sleep`) useful for load
//! testing the pool.

use crate::dispatcher::{BoxedHandler, Handler, HandlerRequest};
use crate::response_buffer::ResponseSink;
use crate::worker_pool::WorkerPool;
use http::Method;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest delay `sleep` will honour.
pub const MAX_SLEEP_MS: u64 = 10_000;
const DEFAULT_SLEEP_MS: u64 = 100;
/// `sleep` re-checks cancellation at this interval.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Exact-match `(method, path)` dispatch with a JSON 404 fallback.
///
/// A path registered under a different method answers `405`.
#[derive(Clone, Default)]
pub struct Routes {
    routes: Vec<(Method, String, BoxedHandler)>,
    fallback: Option<BoxedHandler>,
}

impl Routes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn route<H: Handler + 'static>(self, method: Method, path: &str, handler: H) -> Self {
        self.route_arc(method, path, Arc::new(handler))
    }

    #[must_use]
    pub fn route_arc(mut self, method: Method, path: &str, handler: BoxedHandler) -> Self {
        self.routes.push((method, path.to_string(), handler));
        self
    }

    /// Handler for requests no route matches, instead of the JSON 404.
    #[must_use]
    pub fn fallback<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.fallback = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Handler for Routes {
    fn serve(&self, res: &mut dyn ResponseSink, req: &HandlerRequest) {
        let mut path_known = false;
        for (method, path, handler) in &self.routes {
            if *path == req.path {
                if *method == req.method {
                    handler.serve(res, req);
                    return;
                }
                path_known = true;
            }
        }
        if path_known {
            res.write_json(
                405,
                &json!({ "error": "Method Not Allowed", "method": req.method.as_str(), "path": req.path }),
            );
            return;
        }
        match &self.fallback {
            Some(fallback) => fallback.serve(res, req),
            None => not_found(res, req),
        }
    }
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<String> = self
            .routes
            .iter()
            .map(|(m, p, _)| format!("{m} {p}"))
            .collect();
        f.debug_struct("Routes")
            .field("routes", &routes)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

pub fn not_found(res: &mut dyn ResponseSink, req: &HandlerRequest) {
    res.write_json(
        404,
        &json!({ "error": "Not Found", "method": req.method.as_str(), "path": req.path }),
    );
}

/// Liveness probe.
pub fn health(res: &mut dyn ResponseSink, _req: &HandlerRequest) {
    res.write_json(200, &json!({ "status": "ok" }));
}

/// Reflect the request back as JSON.
pub fn echo(res: &mut dyn ResponseSink, req: &HandlerRequest) {
    let mut query = Map::new();
    for (k, v) in &req.query_params {
        query.insert(k.to_string(), Value::String(v.clone()));
    }
    let body = match req.json_body() {
        Some(json) => json,
        None if req.body.is_empty() => Value::Null,
        None => Value::String(String::from_utf8_lossy(&req.body).into_owned()),
    };
    res.write_json(
        200,
        &json!({
            "request_id": req.request_id.to_string(),
            "method": req.method.as_str(),
            "path": req.path,
            "query": query,
            "body": body,
        }),
    );
}

/// Hold the request for `?ms=` milliseconds (default 100, capped).
///
/// Stops early with `504` when the request context is cancelled or its
/// deadline passes.
pub fn sleep(res: &mut dyn ResponseSink, req: &HandlerRequest) {
    let ms = match req.get_query_param("ms").map(str::parse::<u64>) {
        None => DEFAULT_SLEEP_MS,
        Some(Ok(ms)) => ms.min(MAX_SLEEP_MS),
        Some(Err(_)) => {
            res.write_json(400, &json!({ "error": "ms must be a non-negative integer" }));
            return;
        }
    };

    let start = Instant::now();
    let until = start + Duration::from_millis(ms);
    let context = req.context();
    while Instant::now() < until {
        if context.is_cancelled() {
            res.write_json(
                504,
                &json!({
                    "error": "Request cancelled",
                    "slept_ms": start.elapsed().as_millis() as u64,
                }),
            );
            return;
        }
        may::coroutine::sleep(SLEEP_SLICE.min(until.saturating_duration_since(Instant::now())));
    }
    res.write_json(200, &json!({ "slept_ms": ms }));
}

/// Report the pool's configuration and current metrics.
pub fn pool_stats(pool: Arc<WorkerPool>) -> impl Handler {
    move |res: &mut dyn ResponseSink, _req: &HandlerRequest| {
        let config = pool.config();
        res.set_header("cache-control", "no-store");
        res.write_json(
            200,
            &json!({
                "pool": pool.name(),
                "num_workers": config.num_workers,
                "queue_capacity": config.queue_capacity,
                "live_workers": pool.live_workers(),
                "idle_workers": pool.idle_workers(),
                "shut_down": pool.is_shut_down(),
                "stats": pool.stats(),
            }),
        );
    }
}
