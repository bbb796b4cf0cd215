//! Request method table (spec §4.11 "Request build"): a small table of
//! precompiled byte slices plus a compact numeric id, so encoding a
//! request's method line is an array index rather than a `match` over
//! string data.

/// An HTTP/1.1 request method. The discriminant doubles as the index into
/// [`Method::BYTES`], so `as_bytes` and `id` are both O(1) with no branch
/// beyond the enum's own tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Method {
    Get = 0,
    Head = 1,
    Post = 2,
    Put = 3,
    Delete = 4,
    Connect = 5,
    Options = 6,
    Trace = 7,
    Patch = 8,
}

impl Method {
    const BYTES: [&'static [u8]; 9] = [
        b"GET", b"HEAD", b"POST", b"PUT", b"DELETE", b"CONNECT", b"OPTIONS", b"TRACE", b"PATCH",
    ];

    #[inline]
    pub const fn as_bytes(self) -> &'static [u8] {
        Self::BYTES[self as usize]
    }

    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }

    /// Parses a method token (e.g. from a status line or a caller string),
    /// rejecting anything outside the nine methods this client speaks.
    pub fn from_bytes(b: &[u8]) -> Option<Method> {
        Some(match b {
            b"GET" => Method::Get,
            b"HEAD" => Method::Head,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"CONNECT" => Method::Connect,
            b"OPTIONS" => Method::Options,
            b"TRACE" => Method::Trace,
            b"PATCH" => Method::Patch,
            _ => return None,
        })
    }

    /// Whether a response to this method must have an empty body
    /// regardless of `Content-Length` (spec §4.11 "Body reader selection").
    #[inline]
    pub fn always_empty_response_body(self) -> bool {
        matches!(self, Method::Head)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_method() {
        for &m in &[
            Method::Get,
            Method::Head,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Connect,
            Method::Options,
            Method::Trace,
            Method::Patch,
        ] {
            assert_eq!(Method::from_bytes(m.as_bytes()), Some(m));
        }
    }

    #[test]
    fn rejects_unknown_method() {
        assert_eq!(Method::from_bytes(b"FETCH"), None);
    }

    #[test]
    fn head_forces_empty_body() {
        assert!(Method::Head.always_empty_response_body());
        assert!(!Method::Get.always_empty_response_body());
    }
}
