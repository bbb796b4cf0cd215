//! URL parse cache (spec §4.11 "URL cache"): a thread-safe LRU keyed by the
//! raw URL string, so a client hammering the same origin doesn't re-run a
//! string scan and re-allocate scheme/host/path on every request.

use std::sync::Arc;

use fnv::FnvBuildHasher;
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Default capacity of [`UrlCache`] (spec §4.11).
pub const DEFAULT_URL_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    #[inline]
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlError {
    MissingScheme,
    UnsupportedScheme,
    EmptyHost,
    InvalidPort,
}

impl std::fmt::Display for UrlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlError::MissingScheme => write!(f, "url is missing a scheme"),
            UrlError::UnsupportedScheme => write!(f, "only http and https urls are supported"),
            UrlError::EmptyHost => write!(f, "url has an empty host"),
            UrlError::InvalidPort => write!(f, "url has a non-numeric port"),
        }
    }
}

impl std::error::Error for UrlError {}

/// A parsed absolute URL, split into the fields the HTTP/1.1 client needs:
/// dial target (host/port), request-target (path/query) and the scheme
/// used to pick the default port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: Scheme,
    pub host: Box<str>,
    pub port: u16,
    pub path: Box<str>,
    pub query: Option<Box<str>>,
}

impl ParsedUrl {
    /// The `host:port` key the HTTP/1.1 pool admits connections under.
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parses `raw` into scheme/host/port/path/query, filling in the scheme's
/// default port when none is given (spec §4.11 "default ports 80/443 are
/// filled based on scheme").
pub fn parse_url(raw: &str) -> Result<ParsedUrl, UrlError> {
    let (scheme_str, rest) = raw.split_once("://").ok_or(UrlError::MissingScheme)?;
    let scheme = match scheme_str {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        _ => return Err(UrlError::UnsupportedScheme),
    };

    let path_start = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..path_start];
    let path_and_query = &rest[path_start..];

    if authority.is_empty() {
        return Err(UrlError::EmptyHost);
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port_str)) => {
            let port: u16 = port_str.parse().map_err(|_| UrlError::InvalidPort)?;
            (host, Some(port))
        }
        None => (authority, None),
    };

    if host.is_empty() {
        return Err(UrlError::EmptyHost);
    }

    let (path, query) = match path_and_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_and_query, None),
    };
    let path = if path.is_empty() { "/" } else { path };

    Ok(ParsedUrl {
        scheme,
        host: host.into(),
        port: port.unwrap_or_else(|| scheme.default_port()),
        path: path.into(),
        query: query.map(Into::into),
    })
}

/// A thread-safe LRU over [`ParsedUrl`]s, keyed by the raw URL string (spec
/// §4.11). Entries are reference-counted so a cache hit clones a pointer
/// rather than re-allocating scheme/host/path/query.
pub struct UrlCache {
    inner: Mutex<IndexMap<Box<str>, Arc<ParsedUrl>, FnvBuildHasher>>,
    capacity: usize,
}

impl UrlCache {
    pub fn new(capacity: usize) -> Self {
        UrlCache {
            inner: Mutex::new(IndexMap::with_capacity_and_hasher(capacity, FnvBuildHasher::default())),
            capacity: capacity.max(1),
        }
    }

    /// Looks up `raw`, parsing and inserting on a miss. A hit moves the
    /// entry to the back of the eviction order (most-recently-used);
    /// eviction on a miss drops the entry at the front (least-recently-used).
    pub fn get_or_parse(&self, raw: &str) -> Result<Arc<ParsedUrl>, UrlError> {
        {
            let mut inner = self.inner.lock();
            if let Some(idx) = inner.get_index_of(raw) {
                let (key, parsed) = inner.shift_remove_index(idx).expect("index just observed");
                inner.insert(key, parsed.clone());
                return Ok(parsed);
            }
        }

        let parsed = Arc::new(parse_url(raw)?);

        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity && !inner.contains_key(raw) {
            inner.shift_remove_index(0);
        }
        inner.insert(raw.into(), parsed.clone());
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UrlCache {
    fn default() -> Self {
        UrlCache::new(DEFAULT_URL_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_host_port_path_query() {
        let u = parse_url("http://example.com:8080/a/b?c=d").unwrap();
        assert_eq!(u.scheme, Scheme::Http);
        assert_eq!(&*u.host, "example.com");
        assert_eq!(u.port, 8080);
        assert_eq!(&*u.path, "/a/b");
        assert_eq!(u.query.as_deref(), Some("c=d"));
    }

    #[test]
    fn fills_default_port() {
        let u = parse_url("https://example.com/").unwrap();
        assert_eq!(u.port, 443);
        let u = parse_url("http://example.com").unwrap();
        assert_eq!(u.port, 80);
        assert_eq!(&*u.path, "/");
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert_eq!(parse_url("ftp://example.com/"), Err(UrlError::UnsupportedScheme));
    }

    #[test]
    fn cache_hit_returns_equal_parse_and_evicts_lru() {
        let cache = UrlCache::new(2);
        let a = cache.get_or_parse("http://a/").unwrap();
        let _b = cache.get_or_parse("http://b/").unwrap();
        // Touch `a` so `b` becomes the least-recently-used entry.
        let _ = cache.get_or_parse("http://a/").unwrap();
        let _c = cache.get_or_parse("http://c/").unwrap();
        assert_eq!(cache.len(), 2);

        let a_again = cache.get_or_parse("http://a/").unwrap();
        assert_eq!(a.host, a_again.host);
    }
}
