//! HTTP/1.1 client (spec §4.11, C11): composes the pooled request encoder,
//! the per-host connection pool, and the response parser into one
//! synchronous `send`.

use std::io;
use std::time::Instant;

use crate::config::ClientConfig;
use crate::h2::stream::CancelToken;
use crate::hpack::HeaderField;
use crate::pool::object_pool::PooledHeaderList;
use crate::pool::{ObjectPool, PoolGuard};

use super::body::{select_body_kind, Body, BodyKind};
use super::line_reader::LineReader;
use super::method::Method;
use super::pool::{Dialer, Pool, PooledConn};
use super::request::PooledRequest;
use super::response::{parse_head, ConnectionDirective, ResponseHead, DEFAULT_MAX_HEADERS};
use super::url::{ParsedUrl, UrlCache, UrlError, DEFAULT_URL_CACHE_CAPACITY};
use crate::transport::Transport;

#[derive(Debug)]
pub enum ClientError {
    Url(UrlError),
    Pool(crate::pool::PoolError),
    Io(io::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Url(e) => write!(f, "invalid url: {e}"),
            ClientError::Pool(e) => write!(f, "{e}"),
            ClientError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<UrlError> for ClientError {
    fn from(e: UrlError) -> Self {
        ClientError::Url(e)
    }
}

impl From<crate::pool::PoolError> for ClientError {
    fn from(e: crate::pool::PoolError) -> Self {
        ClientError::Pool(e)
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Io(e)
    }
}

/// A fully-drained response: status, headers, and body bytes.
///
/// The blocking model (spec §5) makes "drain into an owned buffer" the
/// natural default for a single `send` call; a caller that wants to stream
/// a large body composes [`LineReader`]/[`Body`] directly instead, the same
/// pieces this method uses internally.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: u16,
    pub headers: Vec<HeaderField>,
    pub body: bytes::Bytes,
}

/// The pooled HTTP/1.1 client (spec §4.11). Generic over the transport and
/// the [`Dialer`] that produces one.
pub struct Client<T: Transport, D: Dialer<T>> {
    pool: Pool<T, D>,
    url_cache: UrlCache,
    request_pool: ObjectPool<PooledRequest>,
    header_pool: ObjectPool<PooledHeaderList>,
    config: ClientConfig,
}

impl<T: Transport, D: Dialer<T>> Client<T, D> {
    pub fn new(dialer: D, config: ClientConfig) -> Self {
        Client {
            pool: Pool::new(dialer, config.pool.clone()),
            url_cache: UrlCache::new(DEFAULT_URL_CACHE_CAPACITY),
            request_pool: ObjectPool::new(64),
            header_pool: ObjectPool::new(64),
            config,
        }
    }

    pub fn pool(&self) -> &Pool<T, D> {
        &self.pool
    }

    /// Issues one request and returns the fully-read response, honoring
    /// `cancel` and the client's configured `request_timeout`.
    pub fn send(
        &self,
        method: Method,
        raw_url: &str,
        extra_headers: &[(&str, &str)],
        body: Option<&[u8]>,
        cancel: &CancelToken,
    ) -> Result<ClientResponse, ClientError> {
        let parsed = self.url_cache.get_or_parse(raw_url)?;
        let host_port = parsed.host_port();
        let deadline = Instant::now() + self.config.request_timeout;

        let mut checkout = self.pool.acquire(&host_port, cancel, Some(deadline))?;

        if let Err(e) = self.write_request(&mut checkout.transport, method, &parsed, extra_headers, body, deadline) {
            checkout.mark_unreusable();
            return Err(e.into());
        }

        match self.read_response(&mut checkout, method, deadline) {
            Ok((response, keep_alive)) => {
                if keep_alive {
                    checkout.record_request();
                } else {
                    checkout.mark_unreusable();
                }
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(host_port = %host_port, error = %e, "response read failed, dropping connection");
                checkout.mark_unreusable();
                Err(e.into())
            }
        }
    }

    fn write_request(
        &self,
        transport: &mut T,
        method: Method,
        url: &ParsedUrl,
        extra_headers: &[(&str, &str)],
        body: Option<&[u8]>,
        deadline: Instant,
    ) -> io::Result<()> {
        let mut request: PoolGuard<'_, PooledRequest> = self.request_pool.acquire();
        request.set(method, url.path.clone(), url.query.clone());
        for (name, value) in extra_headers {
            request.push_header(*name, *value);
        }
        if let Some(b) = body {
            request.content_length = Some(b.len() as u64);
        }

        let host_header = host_header_value(url);
        let wire = request.encode(&host_header, &self.config.user_agent);
        transport.write_with_deadline(wire, Some(deadline))?;
        if let Some(b) = body {
            transport.write_with_deadline(b, Some(deadline))?;
        }
        Ok(())
    }

    fn read_response(&self, conn: &mut PooledConn<T>, method: Method, deadline: Instant) -> io::Result<(ClientResponse, bool)> {
        let mut headers: PoolGuard<'_, PooledHeaderList> = self.header_pool.acquire();
        let leftover = std::mem::take(&mut conn.read_leftover);
        let mut reader = LineReader::with_leftover(&mut conn.transport, leftover);
        let head = parse_head(&mut reader, &mut headers.headers, DEFAULT_MAX_HEADERS, Some(deadline))?;

        let kind = select_body_kind(method.always_empty_response_body(), head.status, head.chunked, head.content_length);
        let mut out = Vec::new();
        let body_reusable = match kind {
            BodyKind::Empty => true,
            BodyKind::Chunked => {
                let mut b = Body::chunked(&mut reader);
                b.read_to_end(&mut out, Some(deadline))?;
                b.connection_reusable()
            }
            BodyKind::LengthLimited(len) => {
                let mut b = Body::length_limited(&mut reader, len);
                b.read_to_end(&mut out, Some(deadline))?;
                b.connection_reusable()
            }
            BodyKind::ReadUntilEof => {
                let mut b = Body::read_until_eof(&mut reader);
                b.read_to_end(&mut out, Some(deadline))?;
                b.connection_reusable()
            }
        };

        conn.read_leftover = reader.into_leftover();

        let keep_alive = response_keep_alive(&head, body_reusable);
        Ok((
            ClientResponse { status: head.status, headers: headers.headers.clone(), body: bytes::Bytes::from(out) },
            keep_alive,
        ))
    }
}

/// HTTP/1.1 keep-alive defaults differ by version: 1.0 defaults to close
/// unless the peer opts in, 1.1 defaults to keep-alive unless the peer
/// opts out (spec §4.11 "Connection lifecycle per request").
fn response_keep_alive(head: &ResponseHead, body_reusable: bool) -> bool {
    if !body_reusable {
        return false;
    }
    match head.connection {
        ConnectionDirective::Close => false,
        ConnectionDirective::KeepAlive => true,
        ConnectionDirective::Unspecified => !head.http_10,
    }
}

/// Omits the port from the `Host` header when it matches the scheme's
/// default, matching what a browser/curl would send.
fn host_header_value(url: &ParsedUrl) -> String {
    if url.port == url.scheme.default_port() {
        url.host.to_string()
    } else {
        format!("{}:{}", url.host, url.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct ScriptedTransport {
        reads: VecDeque<Vec<u8>>,
        pub writes: Vec<u8>,
    }

    impl Transport for ScriptedTransport {
        fn read_with_deadline(&mut self, buf: &mut [u8], _deadline: Option<Instant>) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.reads.push_front(chunk[n..].to_vec());
                    }
                    Ok(n)
                }
                None => Ok(0),
            }
        }
        fn write_with_deadline(&mut self, buf: &[u8], _deadline: Option<Instant>) -> io::Result<()> {
            self.writes.extend_from_slice(buf);
            Ok(())
        }
        fn set_deadline(&mut self, _deadline: Option<Instant>) {}
        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ScriptedDialer {
        script: StdMutex<VecDeque<Vec<u8>>>,
    }

    impl Dialer<ScriptedTransport> for ScriptedDialer {
        fn dial(&self, _host_port: &str, _deadline: Option<Instant>) -> io::Result<ScriptedTransport> {
            let data = self.script.lock().unwrap().pop_front().unwrap_or_default();
            Ok(ScriptedTransport { reads: [data].into(), writes: Vec::new() })
        }
    }

    fn client_with_response(response: &[u8]) -> Client<ScriptedTransport, ScriptedDialer> {
        let dialer = ScriptedDialer { script: StdMutex::new([response.to_vec()].into()) };
        Client::new(dialer, ClientConfig::default().with_request_timeout(std::time::Duration::from_secs(5)))
    }

    #[test]
    fn gets_chunked_body_and_keeps_connection_alive() {
        let client = client_with_response(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n");
        let cancel = CancelToken::new();
        let resp = client.send(Method::Get, "http://h/", &[], None, &cancel).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body.as_ref(), b"hello");
        assert_eq!(client.pool().stats().idle, 1, "chunked body fully drained, connection reusable");
    }

    #[test]
    fn connection_close_header_prevents_reuse() {
        let client = client_with_response(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nhi");
        let cancel = CancelToken::new();
        let resp = client.send(Method::Get, "http://h/", &[], None, &cancel).unwrap();
        assert_eq!(resp.body.as_ref(), b"hi");
        assert_eq!(client.pool().stats().total, 0, "Connection: close must not return to the idle pool");
    }

    #[test]
    fn head_request_never_reads_a_body() {
        let client = client_with_response(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n");
        let cancel = CancelToken::new();
        let resp = client.send(Method::Head, "http://h/", &[], None, &cancel).unwrap();
        assert!(resp.body.is_empty());
    }

    #[test]
    fn two_requests_to_the_same_host_dial_once() {
        let dialer = ScriptedDialer {
            script: StdMutex::new(
                [b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec()].into(),
            ),
        };
        let client = Client::new(dialer, ClientConfig::default());
        let cancel = CancelToken::new();
        client.send(Method::Get, "http://h/", &[], None, &cancel).unwrap();
        client.send(Method::Get, "http://h/", &[], None, &cancel).unwrap();
        let stats = client.pool().stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.idle, 1);
    }
}
