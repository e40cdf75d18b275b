//! The two-reactor server: one OS thread dedicated to accepting connections,
//! one dedicated to driving them, bridged by a handoff of the raw socket.
//!
//! `monoio`'s I/O types are `!Send` — a `TcpStream` accepted on one
//! runtime can't simply be moved to another. Instead the accept reactor
//! converts each accepted socket to a `std::net::TcpStream` (a plain,
//! `Send` file descriptor wrapper with no runtime affinity), sends that
//! across a channel, and the socket reactor re-wraps it into a
//! `monoio::net::TcpStream` local to its own runtime.

use std::net::SocketAddr;
use std::os::fd::{FromRawFd, IntoRawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use emberhttp_core::listener::Listener;
use emberhttp_core::{AnyResult, Setting};
use monoio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::connection::{self};
use crate::router::handler::{ArgTuple, Handler};
use crate::router::{Router, RouterError};

#[cfg(feature = "tls")]
use crate::connection::tls as tls_support;

struct RunningState {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    accept_handle: JoinHandle<()>,
    accept_thread_id: ThreadId,
    socket_handle: JoinHandle<()>,
    socket_thread_id: ThreadId,
}

/// Owns the route table and settings until `listen_and_serve` freezes them
/// behind an `Arc` and hands them to the reactor threads.
pub struct Server {
    router: Router,
    setting: Setting,
    #[cfg(feature = "tls")]
    tls_config: Option<Arc<rustls::ServerConfig>>,
    state: Option<RunningState>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server is already listening")]
    AlreadyListening,
    #[error("server is not listening")]
    NotListening,
    #[error("close() was called from inside one of the server's own reactor threads; it would deadlock joining itself")]
    CloseFromReactorThread,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Server {
    pub fn new(setting: Setting) -> Self {
        Server {
            router: Router::new(),
            setting,
            #[cfg(feature = "tls")]
            tls_config: None,
            state: None,
        }
    }

    #[cfg(feature = "tls")]
    pub fn with_tls(mut self, config: Arc<rustls::ServerConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Registers `handler` for `methods` at `template`. See
    /// [`crate::router::Router::add_route`] for the template grammar and
    /// arity rules.
    pub fn handle_func<Args, H>(&mut self, template: &str, methods: &[http::Method], handler: H) -> Result<(), RouterError>
    where
        Args: ArgTuple + 'static,
        H: Handler<Args> + Send + Sync + 'static,
    {
        self.router.add_route::<Args, H>(template, methods, handler)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.as_ref().map(|s| s.local_addr)
    }

    /// Starts the accept and socket reactor threads and binds `addr`.
    /// Returns once the listener is actually bound, so `local_addr()` is
    /// immediately meaningful afterward (useful when `addr`'s port is 0).
    pub fn listen_and_serve(&mut self, addr: SocketAddr) -> AnyResult<()> {
        if self.state.is_some() {
            anyhow::bail!(ServerError::AlreadyListening);
        }

        let router = Arc::new(std::mem::take(&mut self.router));
        let setting = Arc::new(self.setting.clone());
        #[cfg(feature = "tls")]
        let tls_config = self.tls_config.clone();

        let closed = Arc::new(AtomicBool::new(false));
        let (sock_tx, sock_rx) = std_mpsc::channel::<(std::net::TcpStream, SocketAddr)>();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<std::io::Result<SocketAddr>>(1);

        let accept_handle = spawn_accept_thread(addr, sock_tx, Arc::clone(&closed), ready_tx);
        let local_addr = ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("accept reactor thread exited before binding"))??;
        let accept_thread_id = accept_handle.thread().id();

        let socket_handle = spawn_socket_thread(
            sock_rx,
            router,
            setting,
            #[cfg(feature = "tls")]
            tls_config,
        );
        let socket_thread_id = socket_handle.thread().id();

        self.state = Some(RunningState {
            local_addr,
            closed,
            accept_handle,
            accept_thread_id,
            socket_handle,
            socket_thread_id,
        });

        info!(%local_addr, "listening");
        Ok(())
    }

    /// Stops accepting new connections and joins both reactor threads.
    ///
    /// Must not be called from inside the accept or socket reactor thread
    /// itself (for instance, from within a handler) — doing so would make
    /// this thread try to join itself. That case is detected and reported
    /// as [`ServerError::CloseFromReactorThread`] rather than deadlocking.
    pub fn close(&mut self) -> AnyResult<()> {
        let state = match self.state.take() {
            Some(state) => state,
            // Already closed (or never opened): idempotent no-op.
            None => return Ok(()),
        };

        let current = thread::current().id();
        if current == state.accept_thread_id || current == state.socket_thread_id {
            warn!("close() called from inside a reactor thread; refusing to self-join");
            self.state = Some(state);
            anyhow::bail!(ServerError::CloseFromReactorThread);
        }

        state.closed.store(true, Ordering::Release);
        // Connecting to our own listener unblocks a pending `accept()` so the
        // accept thread observes `closed` promptly instead of waiting for the
        // next inbound connection.
        let _ = std::net::TcpStream::connect(state.local_addr);

        if let Err(e) = state.accept_handle.join() {
            error!(?e, "accept reactor thread panicked");
        }
        if let Err(e) = state.socket_handle.join() {
            error!(?e, "socket reactor thread panicked");
        }

        Ok(())
    }
}

fn spawn_accept_thread(
    addr: SocketAddr,
    tx: std_mpsc::Sender<(std::net::TcpStream, SocketAddr)>,
    closed: Arc<AtomicBool>,
    ready_tx: std_mpsc::SyncSender<std::io::Result<SocketAddr>>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("emberhttp-accept".into())
        .spawn(move || {
            let mut rt = match monoio::RuntimeBuilder::<monoio::LegacyDriver>::new().build() {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            rt.block_on(async move {
                let listener = match Listener::bind(addr) {
                    Ok(l) => l,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let local_addr = listener.local_addr().unwrap_or(addr);
                let _ = ready_tx.send(Ok(local_addr));

                while !closed.load(Ordering::Acquire) {
                    match listener.accept().await {
                        Ok((stream, peer)) => {
                            // SAFETY: `into_raw_fd` hands us unique ownership
                            // of the descriptor; wrapping it immediately in a
                            // `std::net::TcpStream` keeps that ownership
                            // intact with no intervening use.
                            let raw_fd = stream.into_raw_fd();
                            let std_stream = unsafe { std::net::TcpStream::from_raw_fd(raw_fd) };
                            if tx.send((std_stream, peer)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
                debug!("accept reactor shutting down");
            });
        })
        .expect("failed to spawn accept reactor thread")
}

fn spawn_socket_thread(
    rx: std_mpsc::Receiver<(std::net::TcpStream, SocketAddr)>,
    router: Arc<Router>,
    setting: Arc<Setting>,
    #[cfg(feature = "tls")] tls_config: Option<Arc<rustls::ServerConfig>>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("emberhttp-socket".into())
        .spawn(move || {
            let mut rt = monoio::RuntimeBuilder::<monoio::LegacyDriver>::new()
                .enable_timer()
                .build()
                .expect("failed to build socket reactor runtime");

            #[cfg(feature = "tls")]
            let tls_acceptor = tls_config.map(|c| Arc::new(tls_support::acceptor(c)));

            rt.block_on(async move {
                while let Ok((std_stream, peer)) = rx.recv() {
                    if std_stream.set_nonblocking(true).is_err() {
                        continue;
                    }
                    let stream = match TcpStream::from_std(std_stream) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!(error = %e, "failed to adopt accepted socket");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let setting = Arc::clone(&setting);
                    #[cfg(feature = "tls")]
                    let tls_acceptor = tls_acceptor.clone();

                    monoio::spawn(async move {
                        let connection = connection::build(
                            stream,
                            peer,
                            router,
                            setting,
                            #[cfg(feature = "tls")]
                            tls_acceptor,
                        )
                        .await;

                        match connection {
                            Ok(conn) => conn.run().await,
                            Err(e) => debug!(%peer, error = %e, "failed to establish connection"),
                        }
                    });
                }
                debug!("socket reactor shutting down");
            });
        })
        .expect("failed to spawn socket reactor thread")
}
