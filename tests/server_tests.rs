#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::test_server::{free_addr, parse_response, send_request, setup_may_runtime};
use gatepool::cli::build_routes;
use gatepool::server::{GatewayService, HttpServer, ServerHandle};
use gatepool::worker_pool::{WorkerPool, WorkerPoolConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

struct Gateway {
    handle: ServerHandle,
    pool: Arc<WorkerPool>,
}

impl Gateway {
    fn start(request_timeout: Option<Duration>) -> Self {
        setup_may_runtime();
        let pool = Arc::new(WorkerPool::new("server-test", WorkerPoolConfig::new(2, 8)));
        pool.start().unwrap();

        let mut service = GatewayService::new(Arc::new(build_routes(&pool)));
        if let Some(timeout) = request_timeout {
            service = service.with_request_timeout(timeout);
        }
        let handle = HttpServer(service).start(free_addr()).unwrap();
        handle.wait_ready().unwrap();
        Self { handle, pool }
    }

    fn addr(&self) -> SocketAddr {
        self.handle.addr()
    }

    fn get(&self, target: &str) -> (u16, serde_json::Value) {
        let req = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        parse_response(&send_request(&self.addr(), &req))
    }

    fn stop(self) {
        let report = self.handle.shutdown(&self.pool, Duration::from_secs(5));
        assert!(report.drained);
        assert!(self.pool.is_shut_down());
    }
}

#[test]
fn test_health_endpoint() {
    let gateway = Gateway::start(None);
    let (status, body) = gateway.get("/health");
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    // Probes never touch the pool
    assert_eq!(gateway.pool.stats().queued + gateway.pool.stats().inline, 0);
    gateway.stop();
}

#[test]
fn test_echo_round_trips_through_pool() {
    let gateway = Gateway::start(None);
    let payload = r#"{"hello":"world"}"#;
    let req = format!(
        "POST /echo?tag=a%20b HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nX-Request-Id: 01ARZ3NDEKTSV4RRFFQ69G5FAV\r\nContent-Length: {}\r\n\r\n{}",
        payload.len(),
        payload
    );
    let resp = send_request(&gateway.addr(), &req);
    let (status, body) = parse_response(&resp);

    assert_eq!(status, 200);
    assert_eq!(body["method"], "POST");
    assert_eq!(body["path"], "/echo");
    assert_eq!(body["query"]["tag"], "a b");
    assert_eq!(body["body"]["hello"], "world");
    assert_eq!(body["request_id"], "01ARZ3NDEKTSV4RRFFQ69G5FAV");
    assert!(resp.to_ascii_lowercase().contains("content-type: application/json"));
    assert_eq!(gateway.pool.stats().completed, 1);
    gateway.stop();
}

#[test]
fn test_unknown_route_is_404() {
    let gateway = Gateway::start(None);
    let (status, body) = gateway.get("/missing");
    assert_eq!(status, 404);
    assert_eq!(body["path"], "/missing");
    gateway.stop();
}

#[test]
fn test_wrong_method_is_405() {
    let gateway = Gateway::start(None);
    let resp = send_request(
        &gateway.addr(),
        "DELETE /echo HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    let (status, _) = parse_response(&resp);
    assert_eq!(status, 405);
    gateway.stop();
}

#[test]
fn test_pool_stats_endpoint() {
    let gateway = Gateway::start(None);
    let (status, _) = gateway.get("/echo");
    assert_eq!(status, 200);

    let (status, body) = gateway.get("/pool/stats");
    assert_eq!(status, 200);
    assert_eq!(body["pool"], "server-test");
    assert_eq!(body["num_workers"], 2);
    assert_eq!(body["queue_capacity"], 8);
    assert_eq!(body["shut_down"], false);
    assert_eq!(body["stats"]["completed"], 1);
    gateway.stop();
}

#[test]
fn test_sleep_rejects_bad_duration() {
    let gateway = Gateway::start(None);
    let (status, body) = gateway.get("/sleep?ms=bad");
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("ms"));
    gateway.stop();
}

#[test]
fn test_sleep_completes_within_deadline() {
    let gateway = Gateway::start(Some(Duration::from_secs(5)));
    let (status, body) = gateway.get("/sleep?ms=20");
    assert_eq!(status, 200);
    assert_eq!(body["slept_ms"], 20);
    gateway.stop();
}

#[test]
fn test_request_deadline_stops_sleep() {
    let gateway = Gateway::start(Some(Duration::from_millis(50)));
    let (status, body) = gateway.get("/sleep?ms=300");
    assert_eq!(status, 504);
    assert!(body["slept_ms"].as_u64().unwrap() < 300);
    gateway.stop();
}

#[test]
fn test_join_blocks_while_accepting() {
    let gateway = Gateway::start(None);
    let addr = gateway.addr();
    let Gateway { handle, pool } = gateway;

    let joiner = std::thread::spawn(move || handle.join());
    std::thread::sleep(Duration::from_millis(100));
    assert!(!joiner.is_finished());

    // Still serving while someone waits on the accept loop
    let (status, _) = parse_response(&send_request(
        &addr,
        "GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n",
    ));
    assert_eq!(status, 200);
    assert!(!joiner.is_finished());
    assert!(pool.shutdown(Duration::from_secs(5)).drained);
}
