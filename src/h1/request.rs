//! Request build (spec §4.11 "Request build (zero allocation on hot
//! path)"): a pooled, reusable request struct whose `encode` appends the
//! request line and headers into one scratch buffer rather than building
//! intermediate `String`s.

use crate::hpack::HeaderField;
use crate::pool::Poolable;

use super::method::Method;

/// A reusable request. `method`/`path`/`query`/`headers` are set by the
/// caller; `encode` serializes them (plus `Host`/`User-Agent`/
/// `Content-Length`) into the pooled scratch buffer and returns a borrow of
/// it.
#[derive(Default)]
pub struct PooledRequest {
    pub method: Option<Method>,
    pub path: Box<str>,
    pub query: Option<Box<str>>,
    pub headers: Vec<HeaderField>,
    pub content_length: Option<u64>,
    buf: Vec<u8>,
}

impl PooledRequest {
    pub fn set(&mut self, method: Method, path: impl Into<Box<str>>, query: Option<Box<str>>) -> &mut Self {
        self.method = Some(method);
        self.path = path.into();
        self.query = query;
        self
    }

    pub fn push_header(&mut self, name: impl Into<Box<str>>, value: impl Into<Box<str>>) -> &mut Self {
        self.headers.push(HeaderField::new(name, value));
        self
    }

    /// Serializes `METHOD SP PATH[?QUERY] SP HTTP/1.1 CRLF` followed by
    /// `Host`, `User-Agent`, any caller headers, an optional
    /// `Content-Length`, and the blank-line terminator, into the reused
    /// scratch buffer.
    pub fn encode(&mut self, host_header: &str, user_agent: &str) -> &[u8] {
        let method = self.method.expect("PooledRequest::set must be called before encode");
        self.buf.clear();
        self.buf.extend_from_slice(method.as_bytes());
        self.buf.push(b' ');
        self.buf.extend_from_slice(self.path.as_bytes());
        if let Some(query) = &self.query {
            self.buf.push(b'?');
            self.buf.extend_from_slice(query.as_bytes());
        }
        self.buf.extend_from_slice(b" HTTP/1.1\r\n");

        write_header_line(&mut self.buf, "Host", host_header.as_bytes());
        write_header_line(&mut self.buf, "User-Agent", user_agent.as_bytes());
        for h in &self.headers {
            write_header_line(&mut self.buf, &h.name, h.value.as_bytes());
        }
        if let Some(len) = self.content_length {
            let mut itoa_buf = itoa::Buffer::new();
            write_header_line(&mut self.buf, "Content-Length", itoa_buf.format(len).as_bytes());
        }
        self.buf.extend_from_slice(b"\r\n");
        &self.buf
    }
}

fn write_header_line(buf: &mut Vec<u8>, name: &str, value: &[u8]) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\r\n");
}

impl Poolable for PooledRequest {
    fn reset(&mut self) {
        self.method = None;
        self.path = "".into();
        self.query = None;
        self.headers.clear();
        self.content_length = None;
        self.buf.clear();
    }

    fn is_oversized(&self) -> bool {
        self.buf.capacity() > 64 * 1024 || self.headers.capacity() > 256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_request_line_and_headers() {
        let mut req = PooledRequest::default();
        req.set(Method::Get, "/a/b", Some("c=d".into()));
        req.push_header("accept", "*/*");
        let wire = req.encode("example.com", "corehttp/0.1");
        let text = std::str::from_utf8(wire).unwrap();
        assert!(text.starts_with("GET /a/b?c=d HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com\r\n"));
        assert!(text.contains("User-Agent: corehttp/0.1\r\n"));
        assert!(text.contains("accept: */*\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn encodes_content_length_when_set() {
        let mut req = PooledRequest::default();
        req.set(Method::Post, "/submit", None);
        req.content_length = Some(42);
        let wire = req.encode("h", "ua");
        assert!(std::str::from_utf8(wire).unwrap().contains("Content-Length: 42\r\n"));
    }

    #[test]
    fn reset_clears_every_field_but_keeps_capacity() {
        let mut req = PooledRequest::default();
        req.set(Method::Get, "/x", None);
        req.push_header("a", "b");
        req.encode("h", "ua");
        let cap_before = req.buf.capacity();
        req.reset();
        assert!(req.method.is_none());
        assert!(req.headers.is_empty());
        assert_eq!(req.buf.capacity(), cap_before);
    }
}
