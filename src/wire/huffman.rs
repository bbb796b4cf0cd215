//! HPACK Huffman codec (RFC 7541 Appendix B): 257 symbols (0..=255 plus the
//! EOS symbol, 256), each mapped to a canonical variable-length code.

use std::sync::OnceLock;

use smallvec::SmallVec;

/// Most HPACK header names/values fit within this many bytes (RFC 7541's
/// own examples top out around 20), so the common case never touches the
/// heap before being handed back as a `Vec`.
const INLINE_CAPACITY: usize = 32;

/// Canonical Huffman codes for symbols `0..=256`, right-aligned in a `u32`.
#[rustfmt::skip]
const CODES: [u32; 257] = [
    0x1ff8,0x7fffd8,0xfffffe2,0xfffffe3,0xfffffe4,0xfffffe5,0xfffffe6,0xfffffe7,0xfffffe8,0xffffea,0x3ffffffc,0xfffffe9,0xfffffea,0x3ffffffd,0xfffffeb,0xfffffec,0xfffffed,0xfffffee,0xfffffef,0xffffff0,0xffffff1,0xffffff2,0x3ffffffe,0xffffff3,0xffffff4,0xffffff5,0xffffff6,0xffffff7,0xffffff8,0xffffff9,0xffffffa,0xffffffb,0x14,0x3f8,0x3f9,0xffa,0x1ff9,0x15,0xf8,0x7fa,0x3fa,0x3fb,0xf9,0x7fb,0xfa,0x16,0x17,0x18,0x0,0x1,0x2,0x19,0x1a,0x1b,0x1c,0x1d,0x1e,0x1f,0x5c,0xfb,0x7ffc,0x20,0xffb,0x3fc,0x1ffa,0x21,0x5d,0x5e,0x5f,0x60,0x61,0x62,0x63,0x64,0x65,0x66,0x67,0x68,0x69,0x6a,0x6b,0x6c,0x6d,0x6e,0x6f,0x70,0x71,0x72,0xfc,0x73,0xfd,0x1ffb,0x7fff0,0x1ffc,0x3ffc,0x22,0x7ffd,0x3,0x23,0x4,0x24,0x5,0x25,0x26,0x27,0x6,0x74,0x75,0x28,0x29,0x2a,0x7,0x2b,0x76,0x2c,0x8,0x9,0x2d,0x77,0x78,0x79,0x7a,0x7b,0x7ffe,0x7fc,0x3ffd,0x1ffd,0xffffffc,0xfffe6,0x3fffd2,0xfffe7,0xfffe8,0x3fffd3,0x3fffd4,0x3fffd5,0x7fffd9,0x3fffd6,0x7fffda,0x7fffdb,0x7fffdc,0x7fffdd,0x7fffde,0xffffeb,0x7fffdf,0xffffec,0xffffed,0x3fffd7,0x7fffe0,0xffffee,0x7fffe1,0x7fffe2,0x7fffe3,0x7fffe4,0x1fffdc,0x3fffd8,0x7fffe5,0x3fffd9,0x7fffe6,0x7fffe7,0xffffef,0x3fffda,0x1fffdd,0xfffe9,0x3fffdb,0x3fffdc,0x7fffe8,0x7fffe9,0x1fffde,0x7fffea,0x3fffdd,0x3fffde,0xfffff0,0x1fffdf,0x3fffdf,0x7fffeb,0x7fffec,0x1fffe0,0x1fffe1,0x3fffe0,0x1fffe2,0x7fffed,0x3fffe1,0x7fffee,0x7fffef,0xfffea,0x3fffe2,0x3fffe3,0x3fffe4,0x7ffff0,0x3fffe5,0x3fffe6,0x7ffff1,0x3ffffe0,0x3ffffe1,0xfffeb,0x7fff1,0x3fffe7,0x7ffff2,0x3fffe8,0x1ffffec,0x3ffffe2,0x3ffffe3,0x3ffffe4,0x7ffffde,0x7ffffdf,0x3ffffe5,0xfffff1,0x1ffffed,0x7fff2,0x1fffe3,0x3ffffe6,0x7ffffe0,0x7ffffe1,0x3ffffe7,0x7ffffe2,0xfffff2,0x1fffe4,0x1fffe5,0x3ffffe8,0x3ffffe9,0xffffffd,0x7ffffe3,0x7ffffe4,0x7ffffe5,0xfffec,0xfffff3,0xfffed,0x1fffe6,0x3fffe9,0x1fffe7,0x1fffe8,0x7ffff3,0x3fffea,0x3fffeb,0x1ffffee,0x1ffffef,0xfffff4,0xfffff5,0x3ffffea,0x7ffff4,0x3ffffeb,0x7ffffe6,0x3ffffec,0x3ffffed,0x7ffffe7,0x7ffffe8,0x7ffffe9,0x7ffffea,0x7ffffeb,0xffffffe,0x7ffffec,0x7ffffed,0x7ffffee,0x7ffffef,0x7fffff0,0x3ffffee,0x3fffffff,
];

/// Bit-length of the corresponding entry in [`CODES`]. The 257th entry
/// (index 256, the EOS symbol) is 30 bits.
#[rustfmt::skip]
const LENGTHS: [u8; 257] = [
    13,23,28,28,28,28,28,28,28,24,30,28,28,30,28,28,28,28,28,28,28,28,30,28,28,28,28,28,28,28,28,28,6,10,10,12,13,6,8,11,10,10,8,11,8,6,6,6,5,5,5,6,6,6,6,6,6,6,7,8,15,6,11,10,13,6,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,7,8,7,8,13,19,13,14,6,15,5,6,5,6,5,6,6,6,5,7,7,6,6,6,5,6,7,6,5,5,6,7,7,7,7,7,15,11,14,13,28,20,22,20,20,22,22,22,23,22,23,23,23,23,23,20,23,20,20,22,23,20,23,23,23,23,21,22,23,22,23,23,20,22,21,20,22,22,23,23,21,23,22,22,20,21,22,23,23,21,21,22,21,23,22,23,23,20,22,22,22,23,22,22,23,26,26,20,19,22,23,22,25,26,26,26,27,27,26,20,25,19,21,26,27,27,26,27,20,21,21,26,26,28,27,27,27,20,20,20,21,22,21,21,23,22,22,25,25,20,20,26,23,26,27,26,26,27,27,27,27,27,28,27,27,27,27,27,26,30,
];

const EOS_SYMBOL: u16 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanError {
    /// The decoded bit stream contained the EOS symbol (forbidden mid-string).
    EosInBody,
    /// Trailing padding was longer than 7 bits, or wasn't all-ones.
    InvalidPadding,
}

impl std::fmt::Display for HuffmanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HuffmanError::EosInBody => write!(f, "huffman stream contained EOS symbol"),
            HuffmanError::InvalidPadding => write!(f, "huffman stream has invalid padding"),
        }
    }
}

impl std::error::Error for HuffmanError {}

/// Encodes `data`, padding the final partial octet with the high-order bits
/// of the EOS code (all ones), as RFC 7541 §5.2 requires.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut bit_buf: u64 = 0;
    let mut bits: u32 = 0;
    // Worst case expansion is bounded (longest code is 30 bits), but most
    // text shrinks; reserve optimistically for the common case, inline for
    // header-sized strings.
    let mut out: SmallVec<[u8; INLINE_CAPACITY]> = SmallVec::with_capacity(data.len());
    for &byte in data {
        let code = CODES[byte as usize] as u64;
        let len = LENGTHS[byte as usize] as u32;
        bit_buf = (bit_buf << len) | code;
        bits += len;
        while bits >= 8 {
            bits -= 8;
            out.push((bit_buf >> bits) as u8);
        }
    }
    if bits > 0 {
        let pad = (1u64 << (8 - bits)) - 1;
        out.push(((bit_buf << (8 - bits)) | pad) as u8);
    }
    out.into_vec()
}

/// Returns the encoded length of `data` in bytes without allocating the
/// output, used by the encoder to decide whether Huffman saves octets.
pub fn encoded_len(data: &[u8]) -> usize {
    let total_bits: u64 = data
        .iter()
        .map(|&b| LENGTHS[b as usize] as u64)
        .sum();
    total_bits.div_ceil(8) as usize
}

struct Node {
    children: Option<Box<[Node; 2]>>,
    symbol: Option<u16>,
}

impl Node {
    const fn leaf() -> Self {
        Node {
            children: None,
            symbol: None,
        }
    }
}

fn build_tree() -> Node {
    let mut root = Node::leaf();
    for (symbol, (&code, &len)) in CODES.iter().zip(LENGTHS.iter()).enumerate() {
        let mut node = &mut root;
        for bit_pos in (0..len as u32).rev() {
            let bit = ((code >> bit_pos) & 1) as usize;
            let children = node
                .children
                .get_or_insert_with(|| Box::new([Node::leaf(), Node::leaf()]));
            node = &mut children[bit];
        }
        node.symbol = Some(symbol as u16);
    }
    root
}

fn tree() -> &'static Node {
    static TREE: OnceLock<Node> = OnceLock::new();
    TREE.get_or_init(build_tree)
}

/// Decodes a Huffman-coded string, rejecting an embedded EOS symbol and
/// padding longer than 7 bits (RFC 7541 §5.2).
pub fn decode(input: &[u8]) -> Result<Vec<u8>, HuffmanError> {
    let root = tree();
    let mut out: SmallVec<[u8; INLINE_CAPACITY]> = SmallVec::with_capacity(input.len() * 2);
    let mut node = root;
    let mut bits_since_symbol: u32 = 0;
    let mut trailing_all_ones = true;

    for &byte in input {
        for bit_pos in (0..8).rev() {
            let bit = (byte >> bit_pos) & 1;
            if bit == 0 {
                trailing_all_ones = false;
            }
            let children = node.children.as_ref().ok_or(HuffmanError::InvalidPadding)?;
            node = &children[bit as usize];
            bits_since_symbol += 1;

            if let Some(symbol) = node.symbol {
                if symbol == EOS_SYMBOL {
                    return Err(HuffmanError::EosInBody);
                }
                out.push(symbol as u8);
                node = root;
                bits_since_symbol = 0;
                trailing_all_ones = true;
            }
        }
    }

    // Anything left over must be a prefix of the EOS code (all ones), and
    // no longer than 7 bits, or the string was truncated or corrupt.
    if bits_since_symbol > 7 || !trailing_all_ones {
        return Err(HuffmanError::InvalidPadding);
    }
    Ok(out.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_spec_example_e4() {
        let encoded = encode(b"www.example.com");
        assert_eq!(
            encoded,
            vec![
                0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0, 0xab, 0x90, 0xf4, 0xff
            ]
        );
    }

    #[test]
    fn round_trips_ascii() {
        for s in [
            "",
            "a",
            "www.example.com",
            "custom-key",
            "custom-value",
            "The quick brown fox jumps over the lazy dog 1234567890",
        ] {
            let encoded = encode(s.as_bytes());
            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded, s.as_bytes());
        }
    }

    #[test]
    fn rejects_embedded_eos() {
        // Five 0xFF bytes is a run of 40 one-bits: a prefix of the 30-bit
        // EOS code appears complete at bit 30, with garbage padding after.
        let all_ones = vec![0xFFu8; 5];
        assert_eq!(decode(&all_ones), Err(HuffmanError::EosInBody));
    }

    #[test]
    fn encoded_len_matches_encode() {
        for s in ["www.example.com", "no-cache", ""] {
            assert_eq!(encoded_len(s.as_bytes()), encode(s.as_bytes()).len());
        }
    }
}
