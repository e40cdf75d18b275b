//! TCP listener setup.
//!
//! Binds with `SO_REUSEADDR` enabled so a restart doesn't have to wait out
//! `TIME_WAIT`, and reports the bound address back out (useful when the
//! caller asked for port 0).

use std::net::SocketAddr;

use monoio::net::{ListenerOpts, TcpListener, TcpStream};

/// A bound, not-yet-accepting TCP listener.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let opts = ListenerOpts::default().reuse_addr(true);
        let inner = TcpListener::bind_with_config(addr, &opts)?;
        Ok(Listener { inner })
    }

    pub async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        self.inner.accept().await
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
