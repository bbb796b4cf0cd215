//! HPACK integer representation (RFC 7541 §5.1), parameterized by prefix
//! width `N`.

/// Reject integers whose continuation exceeds this many 7-bit groups. RFC
/// 7541 doesn't name an exact bound; this mirrors the de-facto limit used by
/// other HPACK implementations to keep a hostile peer from forcing an
/// unbounded loop over continuation octets.
const MAX_CONTINUATION_BITS: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    /// More continuation octets were seen than `MAX_CONTINUATION_BITS` allows.
    Overflow,
    /// The input ended before a terminating (non-continuation) octet.
    Truncated,
}

impl std::fmt::Display for VarintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarintError::Overflow => write!(f, "integer representation overflowed"),
            VarintError::Truncated => write!(f, "integer representation truncated"),
        }
    }
}

impl std::error::Error for VarintError {}

/// Encodes `value` using an `prefix_bits`-bit prefix, OR-ing the high bits
/// of the first octet with `prefix_pattern` (e.g. `0x80` for an indexed
/// header field). `prefix_bits` must be in `1..=8`.
pub fn encode_int(prefix_bits: u8, prefix_pattern: u8, value: u64, out: &mut Vec<u8>) {
    debug_assert!((1..=8).contains(&prefix_bits));
    let max_prefix = (1u64 << prefix_bits) - 1;
    if value < max_prefix {
        out.push(prefix_pattern | value as u8);
        return;
    }

    out.push(prefix_pattern | max_prefix as u8);
    let mut remaining = value - max_prefix;
    while remaining >= 128 {
        out.push(((remaining % 128) | 128) as u8);
        remaining /= 128;
    }
    out.push(remaining as u8);
}

/// Decodes an integer with an `prefix_bits`-bit prefix from the start of
/// `input`. Returns the decoded value and the number of octets consumed.
pub fn decode_int(prefix_bits: u8, input: &[u8]) -> Result<(u64, usize), VarintError> {
    debug_assert!((1..=8).contains(&prefix_bits));
    if input.is_empty() {
        return Err(VarintError::Truncated);
    }
    let max_prefix = (1u64 << prefix_bits) - 1;
    let prefix = (input[0] as u64) & max_prefix;
    if prefix < max_prefix {
        return Ok((prefix, 1));
    }

    let mut value = max_prefix;
    let mut shift: u32 = 0;
    let mut consumed = 1;
    loop {
        if consumed >= input.len() {
            return Err(VarintError::Truncated);
        }
        if shift >= MAX_CONTINUATION_BITS {
            return Err(VarintError::Overflow);
        }
        let byte = input[consumed];
        consumed += 1;
        value += ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, consumed));
        }
        shift += 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_spec_example_e3() {
        // RFC 7541 §C.1.2 / spec E3: 1337 with N=5, no flag bits set.
        let mut out = Vec::new();
        encode_int(5, 0, 1337, &mut out);
        assert_eq!(out, vec![31, 154, 10]);
    }

    #[test]
    fn round_trips_across_prefix_widths() {
        for prefix_bits in 4..=7u8 {
            for value in [0u64, 1, 30, 127, 128, 1337, 16383, 1_000_000] {
                let mut out = Vec::new();
                encode_int(prefix_bits, 0, value, &mut out);
                let (decoded, consumed) = decode_int(prefix_bits, &out).unwrap();
                assert_eq!(decoded, value);
                assert_eq!(consumed, out.len());
            }
        }
    }

    #[test]
    fn small_value_fits_in_prefix() {
        let mut out = Vec::new();
        encode_int(7, 0, 2, &mut out);
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn rejects_truncated_input() {
        assert_eq!(decode_int(5, &[31, 154]), Err(VarintError::Truncated));
        assert_eq!(decode_int(5, &[]), Err(VarintError::Truncated));
    }

    #[test]
    fn rejects_overflowing_continuation() {
        let mut malicious = vec![0xFFu8];
        malicious.extend(std::iter::repeat(0xFFu8).take(10));
        malicious.push(0x01);
        assert_eq!(decode_int(8, &malicious), Err(VarintError::Overflow));
    }
}
