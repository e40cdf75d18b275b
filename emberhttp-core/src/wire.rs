//! HTTP/1.x request parsing and response serialization.
//!
//! The request side is a thin wrapper over `httparse`: we feed it a growing
//! byte buffer until it reports a complete head, then slice the body out
//! according to `Content-Length`. The response side is a hand-rolled writer,
//! since `httparse` only parses.

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use thiserror::Error;

/// The HTTP version of a parsed request or an outgoing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("request head exceeds the configured header limit")]
    HeadTooLarge,
    #[error("request body exceeds the configured body limit")]
    BodyTooLarge,
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A fully decoded inbound request: method, raw target, version, headers and
/// a (possibly already-consumed) body.
#[derive(Debug)]
pub struct Request {
    method: http::Method,
    target: String,
    version: Version,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// The raw request-line target (path + optional `?query`), exactly as
    /// received on the wire and not percent-decoded.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The body as received so far. Empty once [`Request::release_body`] has
    /// been called.
    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or(&[])
    }

    /// Takes the body out of the request, leaving it empty behind. Handlers
    /// that need to consume the body (rather than just peek at it) use this
    /// to avoid an extra clone.
    pub fn release_body(&mut self) -> Bytes {
        self.body.take().unwrap_or_default()
    }

    /// Attaches a body read after the head was parsed. The connection engine
    /// calls this once it has read the declared `Content-Length` worth of
    /// bytes off the wire.
    pub fn attach_body(&mut self, body: Bytes) {
        self.body = Some(body);
    }

    pub fn keep_alive_requested(&self) -> bool {
        match self.version {
            Version::Http11 => !self.header_is(http::header::CONNECTION, "close"),
            Version::Http10 => self.header_is(http::header::CONNECTION, "keep-alive"),
        }
    }

    fn header_is(&self, name: impl http::header::AsHeaderName, value: &str) -> bool {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| crate::util::eq_ignore_case(crate::util::trim_ows(v), value))
            .unwrap_or(false)
    }
}

/// Result of one parse attempt over an accumulated read buffer.
pub enum ParseOutcome {
    /// Not enough bytes yet to parse the head; keep reading.
    Incomplete,
    /// A complete head was parsed. `consumed` is the number of bytes (out of
    /// the buffer passed in) that made up the head; `content_length` is the
    /// declared body length, if any.
    Head {
        request: Request,
        consumed: usize,
        content_length: Option<usize>,
    },
}

/// Attempts to parse a request head out of `buf`. Returns
/// [`ParseOutcome::Incomplete`] if more bytes are needed.
///
/// `header_limit` bounds the size of the head (request line + headers) that
/// will be accepted; this protects against unbounded buffering from a
/// misbehaving or hostile peer.
pub fn try_parse_head(buf: &[u8], header_limit: usize) -> Result<ParseOutcome, WireError> {
    if buf.len() > header_limit {
        // Even if httparse would still call this "partial" (no blank line
        // seen yet), we refuse to keep growing the buffer forever.
        return Err(WireError::HeadTooLarge);
    }

    let mut header_storage = [httparse::EMPTY_HEADER; 64];
    let mut parsed = httparse::Request::new(&mut header_storage);

    let consumed = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => return Ok(ParseOutcome::Incomplete),
        Err(e) => return Err(WireError::Malformed(e.to_string())),
    };

    let method_str = parsed.method.ok_or_else(|| WireError::Malformed("missing method".into()))?;
    let method = method_str
        .parse::<http::Method>()
        .map_err(|_| WireError::Malformed(format!("unsupported method {method_str}")))?;

    let target = parsed
        .path
        .ok_or_else(|| WireError::Malformed("missing request target".into()))?
        .to_string();

    let version = match parsed.version {
        Some(0) => Version::Http10,
        Some(1) => Version::Http11,
        other => return Err(WireError::Malformed(format!("unsupported HTTP version {other:?}"))),
    };

    let mut headers = HeaderMap::with_capacity(parsed.headers.len());
    let mut content_length = None;
    for h in parsed.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|_| WireError::Malformed(format!("invalid header name {}", h.name)))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|_| WireError::Malformed(format!("invalid header value for {}", h.name)))?;
        if name == http::header::CONTENT_LENGTH {
            let parsed_len: usize = value
                .to_str()
                .ok()
                .and_then(|s| crate::util::trim_ows(s).parse().ok())
                .ok_or_else(|| WireError::Malformed("invalid Content-Length".into()))?;
            content_length = Some(parsed_len);
        }
        headers.append(name, value);
    }

    let request = Request {
        method,
        target,
        version,
        headers,
        body: None,
    };

    Ok(ParseOutcome::Head {
        request,
        consumed,
        content_length,
    })
}

/// An outgoing response. Built with the small set of constructors a handler
/// actually needs; everything else is plain field access for the connection
/// engine and filters.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    chunked: bool,
    keep_alive: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Response {
            status,
            version: Version::Http11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            chunked: false,
            keep_alive: true,
        }
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(http::header::CONTENT_TYPE, value);
        }
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn set_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn set_chunked(mut self, chunked: bool) -> Self {
        self.chunked = chunked;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Serializes the status line, headers and body into a single buffer
    /// ready to be written to the socket.
    ///
    /// `Content-Length` is computed and inserted automatically unless the
    /// response was marked chunked, in which case the body is framed as a
    /// single chunk followed by the terminating zero-length chunk.
    pub fn encode(mut self) -> BytesMut {
        if self.chunked {
            self.headers.insert(http::header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            self.headers.remove(http::header::CONTENT_LENGTH);
        } else {
            self.headers.insert(
                http::header::CONTENT_LENGTH,
                HeaderValue::from_str(&self.body.len().to_string()).expect("decimal length is valid ascii"),
            );
        }
        self.headers.insert(
            http::header::CONNECTION,
            HeaderValue::from_static(if self.keep_alive { "keep-alive" } else { "close" }),
        );

        let mut out = BytesMut::with_capacity(256 + self.body.len());
        out.extend_from_slice(self.version.as_str().as_bytes());
        out.extend_from_slice(b" ");
        out.extend_from_slice(self.status.as_str().as_bytes());
        out.extend_from_slice(b" ");
        out.extend_from_slice(self.status.canonical_reason().unwrap_or("").as_bytes());
        out.extend_from_slice(b"\r\n");
        for (name, value) in self.headers.iter() {
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");

        if self.chunked {
            if !self.body.is_empty() {
                out.extend_from_slice(format!("{:x}\r\n", self.body.len()).as_bytes());
                out.extend_from_slice(&self.body);
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(b"0\r\n\r\n");
        } else {
            out.extend_from_slice(&self.body);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_get() {
        let buf = b"GET /hello?name=Ember HTTP/1.1\r\nHost: localhost\r\n\r\n";
        match try_parse_head(buf, 8192).unwrap() {
            ParseOutcome::Head { request, consumed, content_length } => {
                assert_eq!(request.method(), http::Method::GET);
                assert_eq!(request.target(), "/hello?name=Ember");
                assert_eq!(request.version(), Version::Http11);
                assert_eq!(consumed, buf.len());
                assert_eq!(content_length, None);
            }
            ParseOutcome::Incomplete => panic!("expected a complete head"),
        }
    }

    #[test]
    fn reports_incomplete_head() {
        let buf = b"GET /hello HTTP/1.1\r\nHost: localhost\r\n";
        assert!(matches!(try_parse_head(buf, 8192).unwrap(), ParseOutcome::Incomplete));
    }

    #[test]
    fn rejects_oversized_head() {
        let buf = vec![b'a'; 100];
        assert!(matches!(try_parse_head(&buf, 10), Err(WireError::HeadTooLarge)));
    }

    #[test]
    fn encodes_response_with_content_length() {
        let response = Response::new(StatusCode::OK).with_body("text/plain", "hi");
        let encoded = response.encode();
        let text = String::from_utf8_lossy(&encoded);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-length: 2\r\n"));
        assert!(text.ends_with("hi"));
    }

    #[test]
    fn encodes_chunked_response() {
        let response = Response::new(StatusCode::OK).with_body("text/plain", "hi").set_chunked(true);
        let encoded = response.encode();
        let text = String::from_utf8_lossy(&encoded);
        assert!(text.contains("transfer-encoding: chunked\r\n"));
        assert!(text.ends_with("2\r\nhi\r\n0\r\n\r\n"));
    }
}
