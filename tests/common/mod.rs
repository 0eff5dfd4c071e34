#![allow(dead_code)]

pub mod test_server {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::Once;
    use std::time::Duration;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// A loopback address nothing is listening on right now.
    pub fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    /// Send a raw request and read until the declared body has arrived or the
    /// socket goes quiet.
    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&tmp[..n]);
                    if response_complete(&buf) {
                        break;
                    }
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn response_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        body.len() >= length
    }

    pub fn parse_response(resp: &str) -> (u16, serde_json::Value) {
        let mut parts = resp.splitn(2, "\r\n\r\n");
        let headers = parts.next().unwrap_or("");
        let body = parts.next().unwrap_or("");
        let mut status = 0;
        for line in headers.lines() {
            if line.starts_with("HTTP/1.1") {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("0")
                    .parse()
                    .unwrap();
            }
        }
        let json: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
        (status, json)
    }
}

pub mod pool_helpers {
    use gatepool::dispatcher::{BoxedHandler, HandlerRequest};
    use gatepool::response_buffer::ResponseSink;
    use may::sync::{Condvar, Mutex};
    use parking_lot::Mutex as RecorderLock;
    use std::sync::Arc;

    /// A latch handlers can park on until the test opens it.
    pub struct Gate {
        open: Mutex<bool>,
        cond: Condvar,
    }

    impl Gate {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                open: Mutex::new(false),
                cond: Condvar::new(),
            })
        }

        pub fn wait(&self) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cond.wait(open).unwrap();
            }
        }

        pub fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cond.notify_all();
        }
    }

    /// Records labels in the order handlers ran.
    #[derive(Default)]
    pub struct Recorder(RecorderLock<Vec<String>>);

    impl Recorder {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn push(&self, label: impl Into<String>) {
            self.0.lock().push(label.into());
        }

        pub fn labels(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    /// Blocks on `gate`, then answers 200.
    pub fn gated(gate: &Arc<Gate>) -> BoxedHandler {
        let gate = Arc::clone(gate);
        Arc::new(move |res: &mut dyn ResponseSink, _req: &HandlerRequest| {
            gate.wait();
            res.write_status(200);
        })
    }

    /// Records `label`, then answers 200 with the label as body.
    pub fn recording(recorder: &Arc<Recorder>, label: &str) -> BoxedHandler {
        let recorder = Arc::clone(recorder);
        let label = label.to_string();
        Arc::new(move |res: &mut dyn ResponseSink, _req: &HandlerRequest| {
            recorder.push(label.clone());
            res.write_status(200);
            res.write_body(label.as_bytes());
        })
    }

    pub fn ok() -> BoxedHandler {
        Arc::new(|res: &mut dyn ResponseSink, _req: &HandlerRequest| {
            res.write_status(200);
            res.write_body(b"ok");
        })
    }
}
