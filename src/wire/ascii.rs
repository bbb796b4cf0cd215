/// Case-insensitive ASCII comparison, used for HTTP/1.1 header names.
///
/// Deliberately byte-wise: HTTP header names are ASCII by definition, and
/// running this through a unicode-aware comparison would be both wrong
/// (non-ASCII casing rules don't apply) and slow.
#[inline]
pub fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_case_insensitively() {
        assert!(eq_ignore_ascii_case(b"Content-Length", b"content-length"));
        assert!(eq_ignore_ascii_case(b"HOST", b"host"));
        assert!(!eq_ignore_ascii_case(b"Host", b"Hosts"));
        assert!(!eq_ignore_ascii_case(b"Host", b"Host "));
    }
}
