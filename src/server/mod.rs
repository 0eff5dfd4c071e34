//! HTTP transport on top of `may_minihttp`.
//!
//! [`GatewayService`] turns each raw request into a
//! [`HandlerRequest`](crate::dispatcher::HandlerRequest), runs one handler
//! against a [`CapturedResponse`](crate::response_buffer::CapturedResponse)
//! and writes the result to the connection. [`HttpServer`] binds it.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, split_target, MAX_BODY_BYTES};
pub use service::GatewayService;
