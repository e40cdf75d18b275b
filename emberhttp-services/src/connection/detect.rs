//! Non-destructive TLS sniffing.
//!
//! Reads the first three bytes off the stream, decides whether they look
//! like a TLS ClientHello record header, then hands back a stream that
//! replays those bytes before resuming the underlying socket — so whichever
//! path (plain or TLS) ends up handling the connection sees the full byte
//! stream, sniffed prefix included.

use std::io::Cursor;

use monoio::io::{AsyncReadRent, AsyncReadRentExt, PrefixedReadIo};

pub type Sniffed<IO> = PrefixedReadIo<IO, Cursor<Vec<u8>>>;

/// A TLS ClientHello record begins with content type `0x16` (handshake) and
/// a legacy protocol version whose major byte is `0x03`.
fn looks_like_tls(prefix: &[u8]) -> bool {
    prefix.len() >= 3 && prefix[0] == 0x16 && prefix[1] == 0x03 && prefix[2] <= 0x04
}

/// Peeks at the first three bytes of `io` without losing them, returning
/// whether they look like TLS plus a stream that will replay them first.
pub async fn sniff<IO>(mut io: IO) -> std::io::Result<(bool, Sniffed<IO>)>
where
    IO: AsyncReadRent,
{
    let buf = vec![0u8; 3];
    let (res, buf) = io.read_exact(buf).await;
    res?;
    let is_tls = looks_like_tls(&buf);
    Ok((is_tls, PrefixedReadIo::new(io, Cursor::new(buf))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_tls_client_hello_prefix() {
        assert!(looks_like_tls(&[0x16, 0x03, 0x01]));
        assert!(looks_like_tls(&[0x16, 0x03, 0x04]));
    }

    #[test]
    fn rejects_plain_http_prefix() {
        assert!(!looks_like_tls(b"GET"));
    }
}
