use crate::worker_pool::{ShutdownReport, WorkerPool};
use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer as MiniHttpServer, HttpService};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How long [`ServerHandle::wait_ready`] keeps probing the listener.
const READY_WAIT: Duration = Duration::from_secs(1);
const READY_POLL: Duration = Duration::from_millis(5);

/// Starts a `may_minihttp` accept loop for any service.
pub struct HttpServer<T>(pub T);

/// Handle to a running accept loop.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until the listener accepts a TCP connection.
    ///
    /// # Errors
    ///
    /// `TimedOut` if nothing accepts within one second.
    pub fn wait_ready(&self) -> io::Result<()> {
        let deadline = Instant::now() + READY_WAIT;
        while Instant::now() < deadline {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(READY_POLL);
        }
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("server on {} not ready", self.addr),
        ))
    }

    /// Stop accepting connections.
    ///
    /// Connections already accepted keep their own coroutines and finish the
    /// request in hand.
    pub fn stop(self) {
        // SAFETY: may::CoroutineHandle::coroutine().cancel() is marked unsafe by the may runtime.
        // The handle is owned here, so the accept coroutine is still valid, and
        // cancelling it is the only way to end the accept loop.
        #[allow(unsafe_code)]
        unsafe {
            self.handle.coroutine().cancel();
        }
        if self.handle.join().is_err() {
            debug!(addr = %self.addr, "Accept loop ended by cancellation");
        }
        info!(addr = %self.addr, "HTTP server stopped accepting");
    }

    /// Block until the accept loop ends on its own.
    ///
    /// # Errors
    ///
    /// The accept coroutine panicked or was cancelled.
    pub fn join(self) -> std::thread::Result<()> {
        let addr = self.addr;
        let result = self.handle.join();
        if result.is_err() {
            debug!(addr = %addr, "Accept loop ended abnormally");
        }
        result
    }

    /// Stop accepting, then drain `pool` for at most `timeout`.
    ///
    /// The listener goes first so no new request can reach the pool once it
    /// starts closing.
    pub fn shutdown(self, pool: &WorkerPool, timeout: Duration) -> ShutdownReport {
        self.stop();
        pool.shutdown(timeout)
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind `addr` and spawn the accept loop.
    ///
    /// # Errors
    ///
    /// The address does not resolve or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = MiniHttpServer(self.0).start(addr)?;
        info!(addr = %addr, "HTTP server listening");
        Ok(ServerHandle { addr, handle })
    }
}
