//! The polymorphic connection: plain or TLS, chosen once per accepted socket
//! by [`detect::sniff`] and then fixed for the connection's lifetime.

pub mod detect;
pub mod session;
#[cfg(feature = "tls")]
pub mod tls;

use std::net::SocketAddr;
use std::sync::Arc;

use emberhttp_core::Setting;
use monoio::net::TcpStream;
use tracing::{debug, warn};

use self::detect::Sniffed;
use self::session::ConnSession;
use crate::router::Router;

#[cfg(feature = "tls")]
type TlsStream = monoio_rustls::ServerTlsStream<Sniffed<TcpStream>>;

/// Either variant drives the identical read-dispatch-respond state machine
/// in [`session::ConnSession`]; only the underlying stream type differs.
pub enum Connection {
    Plain(ConnSession<Sniffed<TcpStream>>),
    #[cfg(feature = "tls")]
    Tls(ConnSession<TlsStream>),
}

impl Connection {
    pub async fn run(self) {
        match self {
            Connection::Plain(session) => session.run().await,
            #[cfg(feature = "tls")]
            Connection::Tls(session) => session.run().await,
        }
    }
}

/// Accepts one raw socket and decides, via the non-destructive byte sniff,
/// whether it should be driven as plain HTTP or handed off to the TLS
/// handshake. When no TLS acceptor is configured, the sniff still runs (for
/// code-path uniformity) but its result is ignored and the connection is
/// always treated as plain.
pub async fn build(
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    setting: Arc<Setting>,
    #[cfg(feature = "tls")] tls_acceptor: Option<Arc<monoio_rustls::TlsAcceptor>>,
) -> std::io::Result<Connection> {
    let (is_tls, sniffed) = detect::sniff(stream).await?;

    #[cfg(feature = "tls")]
    if is_tls {
        if let Some(acceptor) = tls_acceptor {
            return match acceptor.accept(sniffed).await {
                Ok(tls_stream) => Ok(Connection::Tls(ConnSession::new(tls_stream, peer, router, setting))),
                Err(e) => {
                    warn!(peer = %peer, error = %e, "TLS handshake failed");
                    Err(std::io::Error::new(std::io::ErrorKind::Other, e))
                }
            };
        }
    }

    if is_tls {
        debug!(peer = %peer, "TLS ClientHello seen but no certificate configured; serving as plain HTTP");
    }

    Ok(Connection::Plain(ConnSession::new(sniffed, peer, router, setting)))
}
