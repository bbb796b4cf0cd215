//! HTTP/1.1 client and its protocol-aware connection pool (spec §4.9-§4.11,
//! C9-C11): pooled-object discipline, per-host admission/reclamation/health
//! checking, and the client request/response round-trip. Grounded on the
//! teacher's `proto::h1` parse idiom, generalized onto this crate's blocking
//! [`crate::transport::Transport`] instead of `hyper`'s async I/O.

mod body;
mod client;
mod health;
mod line_reader;
mod method;
mod pool;
mod request;
mod response;
mod url;

pub use body::{Body, BodyError, BodyKind, select_body_kind};
pub use client::{Client, ClientError, ClientResponse};
pub use health::HealthChecker;
pub use line_reader::{LineReader, LineReaderError};
pub use method::Method;
pub use pool::{Checkout, Dialer, Pool, PooledConn};
pub use request::PooledRequest;
pub use response::{ConnectionDirective, ResponseHead, ResponseParseError, DEFAULT_MAX_HEADERS};
pub use url::{ParsedUrl, Scheme, UrlCache, UrlError, DEFAULT_URL_CACHE_CAPACITY, parse_url};
