use criterion::{criterion_group, criterion_main, Criterion};
use gatepool::dispatcher::{BoxedHandler, Handler, HandlerRequest, PooledHandler};
use gatepool::response_buffer::{CapturedResponse, ResponseSink};
use gatepool::worker_pool::{WorkerPool, WorkerPoolConfig};
use http::Method;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

fn tiny_handler() -> BoxedHandler {
    Arc::new(|res: &mut dyn ResponseSink, req: &HandlerRequest| {
        res.write_json(200, &serde_json::json!({ "path": req.path }));
    })
}

fn bench_submit(c: &mut Criterion) {
    may::config().set_stack_size(0x8000);
    let request = HandlerRequest::new(Method::GET, "/bench").with_query_param("id", "42");

    let pooled = Arc::new(WorkerPool::new("bench-queued", WorkerPoolConfig::new(4, 256)));
    if let Err(e) = pooled.start() {
        eprintln!("failed to start bench pool: {e:#}");
        return;
    }
    let adapter = PooledHandler::from_arc(tiny_handler(), Arc::clone(&pooled));
    c.bench_function("submit_queued", |b| {
        b.iter(|| {
            let mut out = CapturedResponse::default();
            adapter.serve(&mut out, &request);
            black_box(out.status);
        })
    });

    // Never started and no queue: every call takes the inline path
    let inline = Arc::new(WorkerPool::new("bench-inline", WorkerPoolConfig::new(1, 0)));
    let adapter = PooledHandler::from_arc(tiny_handler(), Arc::clone(&inline));
    c.bench_function("submit_inline", |b| {
        b.iter(|| {
            let mut out = CapturedResponse::default();
            adapter.serve(&mut out, &request);
            black_box(out.status);
        })
    });

    c.bench_function("handler_direct", |b| {
        let handler = tiny_handler();
        b.iter(|| {
            let mut out = CapturedResponse::default();
            handler.serve(&mut out, &request);
            black_box(out.status);
        })
    });

    pooled.shutdown(Duration::from_secs(5));
}

criterion_group!(benches, bench_submit);
criterion_main!(benches);
