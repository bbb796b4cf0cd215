//! The `HealthChecker` strategy (SPEC_FULL §9 "Dynamic dispatch" -- the
//! only runtime polymorphism the core requires): a tagged variant rather
//! than an open trait object registry, since exactly four shapes are
//! needed and a hostile/misbehaving peer should never be able to inject a
//! fifth.

use std::io;
use std::time::{Duration, Instant};

use crate::h1::line_reader::LineReader;
use crate::h1::response::parse_head;
use crate::hpack::HeaderField;
use crate::transport::Transport;

/// Probes a pooled connection for liveness before it's handed back out of
/// the idle pool (spec §4.10 "If `health_checker` is set...").
pub enum HealthChecker {
    /// A zero-byte read with a short deadline: if the peer has closed the
    /// socket, the read returns `Ok(0)` or an error rather than blocking.
    Tcp { timeout: Duration },
    /// An HTTP `HEAD` (by default) against `path`, accepting any status
    /// equal to `expected_status`.
    Http { path: Box<str>, expected_status: u16, timeout: Duration },
    /// Every checker in the chain must pass.
    Composite(Vec<HealthChecker>),
    /// Always healthy -- the default when no checker is configured.
    NoOp,
}

impl HealthChecker {
    pub fn check<T: Transport>(&self, transport: &mut T) -> bool {
        match self {
            HealthChecker::NoOp => true,
            HealthChecker::Tcp { timeout } => tcp_check(transport, *timeout),
            HealthChecker::Http { path, expected_status, timeout } => http_check(transport, path, *expected_status, *timeout),
            HealthChecker::Composite(checkers) => checkers.iter().all(|c| c.check(transport)),
        }
    }
}

fn tcp_check<T: Transport>(transport: &mut T, timeout: Duration) -> bool {
    let mut probe = [0u8; 1];
    let deadline = Instant::now() + timeout;
    match transport.read_with_deadline(&mut probe, Some(deadline)) {
        // A zero-byte read returning `Ok(0)` means the peer closed cleanly.
        Ok(0) => false,
        // Any other successful read means there was unexpected data
        // sitting on an otherwise-idle connection; treat conservatively.
        Ok(_) => false,
        Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => true,
        Err(_) => false,
    }
}

fn http_check<T: Transport>(transport: &mut T, path: &str, expected_status: u16, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let request = format!("HEAD {path} HTTP/1.1\r\nConnection: keep-alive\r\n\r\n");
    if transport.write_with_deadline(request.as_bytes(), Some(deadline)).is_err() {
        return false;
    }

    let mut reader = LineReader::new(transport);
    let mut headers: Vec<HeaderField> = Vec::new();
    match parse_head(&mut reader, &mut headers, super::response::DEFAULT_MAX_HEADERS, Some(deadline)) {
        // A HEAD response never has a body to drain, so the connection is
        // immediately ready for its next real request.
        Ok(head) => head.status == expected_status,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedTransport {
        reads: VecDeque<io::Result<Vec<u8>>>,
        writes: Vec<Vec<u8>>,
    }

    impl Transport for ScriptedTransport {
        fn read_with_deadline(&mut self, buf: &mut [u8], _deadline: Option<Instant>) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
        fn write_with_deadline(&mut self, buf: &[u8], _deadline: Option<Instant>) -> io::Result<()> {
            self.writes.push(buf.to_vec());
            Ok(())
        }
        fn set_deadline(&mut self, _deadline: Option<Instant>) {}
        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn noop_is_always_healthy() {
        let mut t = ScriptedTransport { reads: VecDeque::new(), writes: Vec::new() };
        assert!(HealthChecker::NoOp.check(&mut t));
    }

    #[test]
    fn tcp_check_healthy_on_timeout() {
        let mut t = ScriptedTransport {
            reads: [Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))].into(),
            writes: Vec::new(),
        };
        assert!(HealthChecker::Tcp { timeout: Duration::from_millis(10) }.check(&mut t));
    }

    #[test]
    fn tcp_check_unhealthy_on_clean_close() {
        let mut t = ScriptedTransport { reads: [Ok(Vec::new())].into(), writes: Vec::new() };
        assert!(!HealthChecker::Tcp { timeout: Duration::from_millis(10) }.check(&mut t));
    }

    #[test]
    fn composite_requires_every_checker_to_pass() {
        let mut t = ScriptedTransport {
            reads: [Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))].into(),
            writes: Vec::new(),
        };
        let composite = HealthChecker::Composite(vec![HealthChecker::NoOp, HealthChecker::Tcp { timeout: Duration::from_millis(5) }]);
        assert!(composite.check(&mut t));
    }
}
