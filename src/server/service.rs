use super::request::parse_request;
use super::response::write_captured;
use crate::dispatcher::BoxedHandler;
use crate::response_buffer::CapturedResponse;
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Requests slower than this are logged at `warn`.
const SLOW_REQUEST: Duration = Duration::from_secs(1);

/// `may_minihttp` service that feeds every request to one handler.
///
/// The handler is usually a [`Routes`](crate::handlers::Routes) table, with
/// the pooled parts wrapped in a
/// [`PooledHandler`](crate::dispatcher::PooledHandler).
#[derive(Clone)]
pub struct GatewayService {
    handler: BoxedHandler,
    request_timeout: Option<Duration>,
}

impl GatewayService {
    #[must_use]
    pub fn new(handler: BoxedHandler) -> Self {
        Self {
            handler,
            request_timeout: None,
        }
    }

    /// Give every request context this deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

impl HttpService for GatewayService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let start = Instant::now();
        let request = parse_request(req, self.request_timeout);

        let mut captured = CapturedResponse::default();
        self.handler.serve(&mut captured, &request);
        write_captured(res, &captured);

        if request.path == "/health" {
            return Ok(());
        }

        let status = captured.status.unwrap_or(500);
        let latency = start.elapsed();
        let latency_ms = latency.as_millis() as u64;
        match status {
            500.. => error!(
                request_id = %request.request_id,
                method = %request.method,
                path = %request.path,
                status = status,
                latency_ms = latency_ms,
                "Request failed"
            ),
            400..=499 => warn!(
                request_id = %request.request_id,
                method = %request.method,
                path = %request.path,
                status = status,
                latency_ms = latency_ms,
                "Request error"
            ),
            _ => info!(
                request_id = %request.request_id,
                method = %request.method,
                path = %request.path,
                status = status,
                latency_ms = latency_ms,
                response_size = captured.body.len(),
                "Request completed"
            ),
        }

        if request.context().deadline().is_some_and(|d| Instant::now() > d) {
            warn!(
                request_id = %request.request_id,
                path = %request.path,
                latency_ms = latency_ms,
                "Request ran past its deadline"
            );
        } else if latency > SLOW_REQUEST {
            warn!(
                request_id = %request.request_id,
                path = %request.path,
                latency_ms = latency_ms,
                "Slow request detected"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for GatewayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayService")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
