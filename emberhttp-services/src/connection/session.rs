//! The read-dispatch-respond loop shared by plain and TLS connections.
//!
//! Generic over the stream type so the exact same state machine drives a
//! bare `TcpStream` and a TLS-wrapped one; see [`super::Connection`] for the
//! two concrete instantiations.

use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::Arc;

use emberhttp_core::wire::{try_parse_head, ParseOutcome, Request, Response, WireError};
use emberhttp_core::{Filter, FilterScratch, Setting};
use http::StatusCode;
use monoio::io::{AsyncReadRent, AsyncReadRentExt, AsyncWriteRentExt};
use tracing::{debug, warn};

use crate::router::{handle_for, Router, RouterError};

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("read timed out")]
    Timeout,
}

const READ_CHUNK: usize = 8 * 1024;

/// One accepted connection's read buffer and the shared, read-only state
/// (router, settings) every connection on this reactor dispatches against.
pub struct ConnSession<S> {
    stream: S,
    buf: Vec<u8>,
    router: Arc<Router>,
    setting: Arc<Setting>,
    peer: SocketAddr,
}

impl<S> ConnSession<S>
where
    S: AsyncReadRent + monoio::io::AsyncWriteRent,
{
    pub fn new(stream: S, peer: SocketAddr, router: Arc<Router>, setting: Arc<Setting>) -> Self {
        ConnSession {
            stream,
            buf: Vec::with_capacity(READ_CHUNK),
            router,
            setting,
            peer,
        }
    }

    /// Drives the connection until the peer disconnects, a protocol error
    /// occurs, or keep-alive ends.
    pub async fn run(mut self) {
        loop {
            match self.serve_one().await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "closing connection");
                    break;
                }
            }
        }
        // Half-close for plain sockets, TLS `close_notify` for TLS streams —
        // either way this is best-effort: the peer may already be gone.
        let _ = self.stream.shutdown().await;
    }

    /// Serves a single request. Returns `Ok(true)` if the connection should
    /// stay open for another request, `Ok(false)` if it ended cleanly (EOF
    /// between requests), or `Err` on a protocol or I/O failure.
    async fn serve_one(&mut self) -> Result<bool, ConnectionError> {
        let (request, body_len) = match self.read_request().await? {
            Some(r) => r,
            None => return Ok(false),
        };

        let mut scratch = FilterScratch::default();
        let pre_response = apply_filters_pre(&self.setting.filters, &request, &mut scratch);

        let request = Rc::new(request);
        let keep_alive_requested = request.keep_alive_requested();

        let mut response = match pre_response {
            Some(r) => r,
            None => {
                let handle = handle_for(request.clone(), self.peer);
                let dispatch_handle = handle.clone();
                let outcome = self.router.dispatch(dispatch_handle).await;
                match outcome {
                    Ok(()) => match Rc::try_unwrap(handle).ok().and_then(|h| h.into_response()) {
                        Some(r) => r,
                        None => {
                            warn!(peer = %self.peer, "handler returned without calling respond()");
                            error_response(StatusCode::BAD_REQUEST, "handler did not produce a response")
                        }
                    },
                    Err(e) => router_error_response(&e),
                }
            }
        };

        apply_filters_post(&self.setting.filters, response.headers_mut(), &scratch);

        let keep_alive = keep_alive_requested && response.keep_alive();
        response = response.set_keep_alive(keep_alive);

        let encoded = response.encode();
        self.stream.write_all(encoded.to_vec()).await.0?;

        // Drop whatever's left of the parsed head + body from the buffer so
        // the next iteration (or a pipelined request already in `buf`)
        // starts clean.
        self.buf.drain(..body_len);

        Ok(keep_alive)
    }

    /// Reads and parses one request head plus body, enforcing the
    /// configured header/body limits and idle-read timeout.
    async fn read_request(&mut self) -> Result<Option<(Request, usize)>, ConnectionError> {
        let (mut request, head_len, content_length) = loop {
            match try_parse_head(&self.buf, self.setting.header_limit)? {
                ParseOutcome::Head {
                    request,
                    consumed,
                    content_length,
                } => break (request, consumed, content_length),
                ParseOutcome::Incomplete => {
                    if !self.fill_buf().await? {
                        if self.buf.is_empty() {
                            return Ok(None);
                        }
                        return Err(ConnectionError::Wire(WireError::Malformed(
                            "connection closed mid-request".into(),
                        )));
                    }
                }
            }
        };

        let body_len = content_length.unwrap_or(0);
        if let Some(limit) = self.setting.body_limit {
            if body_len > limit {
                return Err(ConnectionError::Wire(WireError::BodyTooLarge));
            }
        }

        let total_len = head_len + body_len;
        while self.buf.len() < total_len {
            if !self.fill_buf().await? {
                return Err(ConnectionError::Wire(WireError::Malformed(
                    "connection closed mid-body".into(),
                )));
            }
        }

        if body_len > 0 {
            let body = bytes::Bytes::copy_from_slice(&self.buf[head_len..total_len]);
            request = attach_body(request, body);
        }

        Ok(Some((request, total_len)))
    }

    /// Reads more bytes into `self.buf`, bounded by the configured
    /// read-idle timeout. Returns `Ok(false)` on clean EOF.
    async fn fill_buf(&mut self) -> Result<bool, ConnectionError> {
        let chunk = vec![0u8; READ_CHUNK];
        let read = monoio::time::timeout(self.setting.read_timeout, self.stream.read(chunk))
            .await
            .map_err(|_| ConnectionError::Timeout)?;
        let (res, chunk) = read;
        let n = res?;
        if n == 0 {
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(true)
    }
}

/// `Request`'s body field is private to its module; this reconstructs a
/// request with a body attached via the crate-internal constructor it
/// exposes for exactly this purpose.
fn attach_body(mut request: Request, body: bytes::Bytes) -> Request {
    request.attach_body(body);
    request
}

fn apply_filters_pre(filters: &[std::sync::Arc<dyn Filter>], request: &Request, scratch: &mut FilterScratch) -> Option<Response> {
    for filter in filters {
        if let emberhttp_core::FilterOutcome::Responded(response) = filter.pre_request(request, scratch) {
            return Some(response);
        }
    }
    None
}

fn apply_filters_post(filters: &[std::sync::Arc<dyn Filter>], headers: &mut http::HeaderMap, scratch: &FilterScratch) {
    for filter in filters {
        filter.post_response(headers, scratch);
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    Response::new(status).with_body("text/plain; charset=utf-8", message.to_string())
}

/// Every dispatch error — bad target, not found, method not allowed,
/// parameter mismatch, coercion failure — becomes a `400 Bad Request` with
/// `keep_alive` forced off, never left open on a connection whose request
/// the router couldn't resolve.
fn router_error_response(err: &RouterError) -> Response {
    error_response(StatusCode::BAD_REQUEST, &err.to_string()).set_keep_alive(false)
}
