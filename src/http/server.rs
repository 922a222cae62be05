//! Stub server setup and lifecycle.
//!
//! # Responsibilities
//! - Pick the port at construction so URLs are known before start
//! - Own a small worker runtime, bind, and run the accept loop
//! - Serve exactly one exchange per connection, then close it
//! - Stop accepting on shutdown, drain in-flight exchanges, release workers
//!
//! # Design Decisions
//! - HTTP/1 only, keep-alive disabled: every response ends its connection
//! - `start`/`stop` block the caller; `start_async`/`stop_async` suspend
//!   instead. Both pairs drive the same code
//! - Bind failures are returned to the caller of `start`, never retried

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use rand::Rng;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use url::Url;

use crate::config::{validate_config, Defaults, ServerConfig, ValidationError, PORT_RANGE};
use crate::http::aggregator::{aggregate, AggregateError};
use crate::http::request::{resolve_url, Request};
use crate::lifecycle::{InvalidTransition, Lifecycle, ServerState, Shutdown};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::{Diagnostics, Logger};
use crate::routing::{log_unhandled, Dispatcher, Stub, UnhandledCallback};

/// Errors surfaced by server construction and lifecycle calls.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0:?}")]
    InvalidConfig(Vec<ValidationError>),

    /// Host and port do not form a usable address.
    #[error("invalid address {host}:{port}")]
    InvalidAddress { host: String, port: u16 },

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The worker runtime could not be created.
    #[error("runtime error: {0}")]
    Runtime(#[source] std::io::Error),

    /// The call is not valid in the current lifecycle state.
    #[error(transparent)]
    State(#[from] InvalidTransition),
}

/// How long a blocking `stop` waits for worker threads once draining is
/// over. Handlers still running after the drain are abandoned.
const RELEASE_TIMEOUT: Duration = Duration::from_millis(100);

/// Draw a port from [`PORT_RANGE`].
pub fn random_port() -> u16 {
    rand::thread_rng().gen_range(PORT_RANGE)
}

fn base_url_for(host: &str, port: u16) -> Result<Url, ServerError> {
    let authority = match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("[{v6}]:{port}"),
        _ => format!("{host}:{port}"),
    };
    Url::parse(&format!("http://{authority}")).map_err(|_| ServerError::InvalidAddress {
        host: host.to_string(),
        port,
    })
}

/// Builder for [`StubServer`].
pub struct StubServerBuilder {
    config: ServerConfig,
    stubs: Vec<Arc<Stub>>,
    defaults: Option<Arc<Defaults>>,
    logger: Option<Option<Arc<dyn Logger>>>,
    unhandled: Option<UnhandledCallback>,
}

impl StubServerBuilder {
    fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            stubs: Vec::new(),
            defaults: None,
            logger: None,
            unhandled: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn stub(mut self, stub: Arc<Stub>) -> Self {
        self.stubs.push(stub);
        self
    }

    pub fn stubs(mut self, stubs: impl IntoIterator<Item = Arc<Stub>>) -> Self {
        self.stubs.extend(stubs);
        self
    }

    /// Use `defaults` instead of the process-wide [`Defaults::current`].
    pub fn defaults(mut self, defaults: Arc<Defaults>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Override the logger taken from the defaults.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(Some(logger));
        self
    }

    pub fn without_logger(mut self) -> Self {
        self.logger = Some(None);
        self
    }

    /// Called once, before the 404 is written, for every request no stub resolved.
    pub fn on_unhandled<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Request) + Send + Sync + 'static,
    {
        self.unhandled = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<StubServer, ServerError> {
        validate_config(&self.config).map_err(ServerError::InvalidConfig)?;

        let port = self.config.port.unwrap_or_else(random_port);
        let host = self.config.host.clone();
        let base_url = base_url_for(&host, port)?;

        let defaults = self.defaults.unwrap_or_else(Defaults::current);
        let logger = match self.logger {
            Some(explicit) => explicit,
            None => defaults.logger().cloned(),
        };
        let diagnostics = Diagnostics::new(logger);
        let dispatcher = Dispatcher::new(
            self.stubs,
            defaults.stubs(),
            self.unhandled.unwrap_or_else(log_unhandled),
            diagnostics.clone(),
        );

        Ok(StubServer {
            host,
            port,
            base_url,
            config: self.config,
            dispatcher: Arc::new(dispatcher),
            diagnostics,
            lifecycle: Arc::new(Lifecycle::new()),
            shutdown: Arc::new(Shutdown::new()),
            tracker: ConnectionTracker::new(),
            runtime: Mutex::new(None),
            finished: Mutex::new(None),
            local_addr: Mutex::new(None),
        })
    }
}

/// An ephemeral HTTP server answering from an ordered stub list.
pub struct StubServer {
    host: String,
    port: u16,
    base_url: Url,
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    diagnostics: Diagnostics,
    lifecycle: Arc<Lifecycle>,
    shutdown: Arc<Shutdown>,
    tracker: ConnectionTracker,
    runtime: Mutex<Option<Runtime>>,
    finished: Mutex<Option<oneshot::Receiver<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl StubServer {
    /// Server on the default host and a random port, using the
    /// process-wide defaults.
    pub fn new(stubs: impl IntoIterator<Item = Arc<Stub>>) -> Result<Self, ServerError> {
        Self::builder().stubs(stubs).build()
    }

    pub fn builder() -> StubServerBuilder {
        StubServerBuilder::new()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://host:port`, available before `start`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for `path_and_query` on this server.
    pub fn url(&self, path_and_query: &str) -> Url {
        resolve_url(&self.base_url, path_and_query)
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.current()
    }

    /// Address actually bound, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Effective stub list: instance stubs followed by defaults.
    pub fn stubs(&self) -> &[Arc<Stub>] {
        self.dispatcher.stubs()
    }

    /// Bind and start accepting, blocking the calling thread until the
    /// bind completes.
    ///
    /// Must not be called from inside an async context; use
    /// [`start_async`](Self::start_async) there.
    pub fn start(&self) -> Result<(), ServerError> {
        let bound = self.launch()?;
        self.complete_start(bound.blocking_recv().ok())
    }

    /// Bind and start accepting, suspending the calling task until the
    /// bind completes.
    pub async fn start_async(&self) -> Result<(), ServerError> {
        let bound = self.launch()?;
        self.complete_start(bound.await.ok())
    }

    /// Stop accepting, drain in-flight exchanges and release the workers.
    /// Blocks the calling thread. Stopping a stopped server is a no-op.
    pub fn stop(&self) -> Result<(), ServerError> {
        if let Some(finished) = self.begin_stop()? {
            let _ = finished.blocking_recv();
        }
        self.finish_stop(|runtime| runtime.shutdown_timeout(RELEASE_TIMEOUT));
        Ok(())
    }

    /// Suspending variant of [`stop`](Self::stop).
    pub async fn stop_async(&self) -> Result<(), ServerError> {
        if let Some(finished) = self.begin_stop()? {
            let _ = finished.await;
        }
        self.finish_stop(Runtime::shutdown_background);
        Ok(())
    }

    fn launch(&self) -> Result<oneshot::Receiver<Result<SocketAddr, ServerError>>, ServerError> {
        self.lifecycle
            .transition(ServerState::Idle, ServerState::Starting)?;
        self.diagnostics
            .info(|| format!("Starting server at {}:{}", self.host, self.port));

        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.workers)
            .thread_name("stub-server-worker")
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let _ = self
                    .lifecycle
                    .transition(ServerState::Starting, ServerState::Stopped);
                return Err(ServerError::Runtime(e));
            }
        };

        let (bound_tx, bound_rx) = oneshot::channel();
        let (finished_tx, finished_rx) = oneshot::channel();
        let acceptor = Acceptor {
            host: self.host.clone(),
            port: self.port,
            max_connections: self.config.max_connections,
            drain_timeout: Duration::from_millis(self.config.drain_timeout_ms),
            shutdown: Arc::clone(&self.shutdown),
            tracker: self.tracker.clone(),
            exchange: Exchange {
                dispatcher: Arc::clone(&self.dispatcher),
                base_url: self.base_url.clone(),
                diagnostics: self.diagnostics.clone(),
            },
        };
        runtime.spawn(acceptor.run(bound_tx, finished_tx));

        *self.runtime.lock().unwrap_or_else(PoisonError::into_inner) = Some(runtime);
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner) = Some(finished_rx);
        Ok(bound_rx)
    }

    fn complete_start(
        &self,
        bound: Option<Result<SocketAddr, ServerError>>,
    ) -> Result<(), ServerError> {
        let error = match bound {
            Some(Ok(addr)) => {
                *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(addr);
                self.lifecycle
                    .transition(ServerState::Starting, ServerState::Listening)?;
                self.diagnostics.info(|| format!("Listening on {addr}"));
                return Ok(());
            }
            Some(Err(e)) => e,
            None => ServerError::Runtime(std::io::Error::other(
                "accept loop ended before binding",
            )),
        };

        self.diagnostics
            .error(|| format!("Failed to start server at {}:{}: {error}", self.host, self.port));
        if let Some(runtime) = self.take_runtime() {
            runtime.shutdown_background();
        }
        let _ = self
            .lifecycle
            .transition(ServerState::Starting, ServerState::Stopped);
        Err(error)
    }

    fn begin_stop(&self) -> Result<Option<oneshot::Receiver<()>>, ServerError> {
        match self.lifecycle.current() {
            ServerState::Stopped => Ok(None),
            ServerState::Idle => {
                self.lifecycle
                    .transition(ServerState::Idle, ServerState::Stopped)?;
                Ok(None)
            }
            ServerState::Listening => {
                self.lifecycle
                    .transition(ServerState::Listening, ServerState::Stopping)?;
                self.shutdown.trigger();
                Ok(self
                    .finished
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take())
            }
            from @ (ServerState::Starting | ServerState::Stopping) => Err(InvalidTransition {
                from,
                to: ServerState::Stopping,
            }
            .into()),
        }
    }

    fn finish_stop(&self, release: impl FnOnce(Runtime)) {
        let Some(runtime) = self.take_runtime() else {
            return;
        };
        release(runtime);
        if self
            .lifecycle
            .transition(ServerState::Stopping, ServerState::Stopped)
            .is_ok()
        {
            self.diagnostics
                .info(|| format!("Stopped server at {}:{}", self.host, self.port));
        }
    }

    fn take_runtime(&self) -> Option<Runtime> {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
        if let Some(runtime) = self.take_runtime() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for StubServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubServer")
            .field("base_url", &self.base_url.as_str())
            .field("state", &self.state())
            .field("stubs", &self.stubs().len())
            .finish()
    }
}

/// Accept loop state, moved onto the worker runtime.
struct Acceptor {
    host: String,
    port: u16,
    max_connections: usize,
    drain_timeout: Duration,
    shutdown: Arc<Shutdown>,
    tracker: ConnectionTracker,
    exchange: Exchange,
}

impl Acceptor {
    async fn run(
        self,
        bound: oneshot::Sender<Result<SocketAddr, ServerError>>,
        finished: oneshot::Sender<()>,
    ) {
        let mut shutdown_rx = self.shutdown.subscribe();
        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = bound.send(Err(e));
                return;
            }
        };
        let local_addr = listener
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.port)));
        self.exchange.diagnostics.debug(|| {
            format!(
                "Accepting on {local_addr}, at most {} concurrent connections",
                listener.max_connections()
            )
        });
        let _ = bound.send(Ok(local_addr));

        while !self.shutdown.is_triggered() {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let exchange = self.exchange.clone();
                        tokio::spawn(async move {
                            exchange.serve_connection(stream, peer, guard, permit).await;
                        });
                    }
                    Err(e) => {
                        self.exchange
                            .diagnostics
                            .error(|| format!("Error caught while accepting: {e}"));
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }

        drop(listener);
        if !self.tracker.drain(self.drain_timeout).await {
            self.exchange.diagnostics.warning(|| {
                format!(
                    "{} exchange(s) still in flight after {:?}",
                    self.tracker.active_count(),
                    self.drain_timeout
                )
            });
        }
        let _ = finished.send(());
    }

    async fn bind(&self) -> Result<Listener, ServerError> {
        let invalid = || ServerError::InvalidAddress {
            host: self.host.clone(),
            port: self.port,
        };
        let addr = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|_| invalid())?
            .next()
            .ok_or_else(invalid)?;

        Listener::bind(addr, self.max_connections)
            .await
            .map_err(|e| match e {
                ListenerError::Bind(source) | ListenerError::Accept(source) => ServerError::Bind {
                    addr: addr.to_string(),
                    source,
                },
                ListenerError::Closed => invalid(),
            })
    }
}

/// Per-connection request handling.
#[derive(Clone)]
struct Exchange {
    dispatcher: Arc<Dispatcher>,
    base_url: Url,
    diagnostics: Diagnostics,
}

impl Exchange {
    async fn serve_connection(
        self,
        stream: TcpStream,
        peer: SocketAddr,
        guard: ConnectionGuard,
        _permit: ConnectionPermit,
    ) {
        let id = guard.id();
        self.diagnostics
            .debug(|| format!("Channel active {id} from {peer}"));

        let diagnostics = self.diagnostics.clone();
        let service = service_fn(move |req: hyper::Request<Incoming>| {
            let exchange = self.clone();
            async move { exchange.handle(req).await }
        });

        let served = http1::Builder::new()
            .keep_alive(false)
            .serve_connection(TokioIo::new(stream), service)
            .await;

        match served {
            Ok(()) => diagnostics.debug(|| format!("Channel inactive {id}")),
            Err(e) => diagnostics.debug(|| format!("Channel {id} closed without response: {e}")),
        }
    }

    async fn handle(
        &self,
        req: hyper::Request<Incoming>,
    ) -> Result<hyper::Response<Full<Bytes>>, AggregateError> {
        let request = aggregate(req, Some(&self.base_url)).await?;
        Ok(self.dispatcher.respond(&request).into_hyper())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_port_in_documented_range() {
        for _ in 0..100 {
            assert!(PORT_RANGE.contains(&random_port()));
        }
    }

    #[test]
    fn port_and_url_fixed_at_construction() {
        let server = StubServer::new(Vec::new()).unwrap();
        assert!(PORT_RANGE.contains(&server.port()));
        assert_eq!(
            server.base_url().as_str(),
            format!("http://127.0.0.1:{}/", server.port())
        );
        assert_eq!(server.state(), ServerState::Idle);
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let url = base_url_for("::1", 7001).unwrap();
        assert_eq!(url.as_str(), "http://[::1]:7001/");
    }

    #[test]
    fn url_joins_path_and_query() {
        let server = StubServer::builder().port(7002).build().unwrap();
        assert_eq!(
            server.url("/loc?id=1").as_str(),
            "http://127.0.0.1:7002/loc?id=1"
        );
        let other = server.url("//other.example/x");
        assert_eq!(other.host_str(), Some("127.0.0.1"));
        assert_eq!(other.path(), "//other.example/x");
    }

    #[test]
    fn invalid_config_rejected() {
        let err = StubServer::builder().workers(0).build().unwrap_err();
        assert!(matches!(err, ServerError::InvalidConfig(_)));
    }

    #[test]
    fn stop_before_start_is_terminal() {
        let server = StubServer::builder().without_logger().build().unwrap();
        server.stop().unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(matches!(server.start(), Err(ServerError::State(_))));
        server.stop().unwrap();
    }
}
