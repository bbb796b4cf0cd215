use std::sync::OnceLock;

use indexmap::IndexSet;

use crate::wire::huffman::{self, HuffmanError};
use crate::wire::varint::{decode_int, VarintError};

use super::header::HeaderField;
use super::table::{resolve, DynamicTable, STATIC_TABLE_LEN};
use super::DEFAULT_MAX_STRING_LEN;

/// Errors that abort a header block decode. Per spec §4.3, every one of
/// these is a connection-level `COMPRESSION_ERROR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HpackDecodeError {
    InvalidIndex(u32),
    MalformedInteger,
    MalformedHuffman,
    MalformedUtf8,
    StringTooLong { len: usize, max: usize },
    /// A dynamic-table-size-update instruction occurred after the first
    /// header representation in the block (RFC 7540 mandates block-start
    /// only; see SPEC_FULL.md Open Question 1).
    TableSizeUpdateNotAtBlockStart,
    UnexpectedEndOfBlock,
}

impl std::fmt::Display for HpackDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HpackDecodeError::InvalidIndex(i) => write!(f, "invalid HPACK index {i}"),
            HpackDecodeError::MalformedInteger => write!(f, "malformed HPACK integer"),
            HpackDecodeError::MalformedHuffman => write!(f, "malformed huffman string"),
            HpackDecodeError::MalformedUtf8 => write!(f, "decoded header was not valid utf-8"),
            HpackDecodeError::StringTooLong { len, max } => {
                write!(f, "string length {len} exceeds cap of {max}")
            }
            HpackDecodeError::TableSizeUpdateNotAtBlockStart => {
                write!(f, "dynamic table size update outside block start")
            }
            HpackDecodeError::UnexpectedEndOfBlock => write!(f, "header block ended mid-field"),
        }
    }
}

impl std::error::Error for HpackDecodeError {}

impl From<VarintError> for HpackDecodeError {
    fn from(_: VarintError) -> Self {
        HpackDecodeError::MalformedInteger
    }
}

impl From<HuffmanError> for HpackDecodeError {
    fn from(_: HuffmanError) -> Self {
        HpackDecodeError::MalformedHuffman
    }
}

/// ~50 common header names interned once, shared by every decoder, so a
/// fresh connection doesn't pay an allocation for `:method`/`content-type`/etc.
fn common_names() -> &'static [&'static str] {
    static NAMES: OnceLock<Vec<&'static str>> = OnceLock::new();
    NAMES
        .get_or_init(|| {
            vec![
                ":authority", ":method", ":path", ":scheme", ":status", ":protocol",
                "accept", "accept-charset", "accept-encoding", "accept-language",
                "accept-ranges", "access-control-allow-credentials",
                "access-control-allow-headers", "access-control-allow-methods",
                "access-control-allow-origin", "age", "allow", "authorization",
                "cache-control", "content-disposition", "content-encoding",
                "content-language", "content-length", "content-location",
                "content-range", "content-type", "cookie", "date", "etag",
                "expect", "expires", "from", "host", "if-match",
                "if-modified-since", "if-none-match", "if-range",
                "if-unmodified-since", "last-modified", "link", "location",
                "max-forwards", "origin", "proxy-authenticate",
                "proxy-authorization", "range", "referer", "refresh",
                "retry-after", "server", "set-cookie",
                "strict-transport-security", "te", "trailer",
                "transfer-encoding", "upgrade", "user-agent", "vary", "via",
                "www-authenticate", "x-content-type-options", "x-forwarded-for",
                "x-frame-options",
            ]
        })
        .as_slice()
}

/// Session-scoped string interning, bounded so a hostile peer can't grow it
/// without bound by sending many distinct header names.
struct Interner {
    seen: IndexSet<Box<str>>,
    cap: usize,
}

impl Interner {
    fn new(cap: usize) -> Self {
        Interner {
            seen: IndexSet::new(),
            cap,
        }
    }

    /// Returns an interned `Box<str>` equal to `s`: a static common name, a
    /// previously-seen session string, or (if the intern table is full) a
    /// fresh allocation.
    fn intern(&mut self, s: &str) -> Box<str> {
        if let Some(&common) = common_names().iter().find(|&&n| n == s) {
            return common.into();
        }
        if let Some(existing) = self.seen.get(s) {
            return existing.clone();
        }
        let boxed: Box<str> = s.into();
        if self.seen.len() < self.cap {
            self.seen.insert(boxed.clone());
        }
        boxed
    }
}

/// HPACK decoder (spec §4.3). Reuses one growable scratch buffer across
/// calls and interns common header names to keep the hot path allocation-
/// light.
pub struct Decoder {
    dynamic: DynamicTable,
    interner: Interner,
    max_string_len: usize,
}

impl Decoder {
    pub fn new(max_table_size: usize) -> Self {
        Decoder {
            dynamic: DynamicTable::new(max_table_size),
            interner: Interner::new(256),
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }

    pub fn with_max_string_len(mut self, max: usize) -> Self {
        self.max_string_len = max;
        self
    }

    /// Applies a local `SETTINGS_HEADER_TABLE_SIZE` change to the receive
    /// side table (spec §4.8 `updateLocal`).
    pub fn set_max_dynamic_table_size(&mut self, new_size: usize) {
        self.dynamic.set_max_size(new_size);
    }

    pub fn dynamic_table_len(&self) -> usize {
        self.dynamic.len()
    }

    #[cfg(test)]
    pub(crate) fn dynamic_table(&self) -> &DynamicTable {
        &self.dynamic
    }

    /// Decodes one full header block fragment into a header list.
    pub fn decode(&mut self, mut input: &[u8]) -> Result<Vec<HeaderField>, HpackDecodeError> {
        let mut out = Vec::new();
        let mut at_block_start = true;

        while !input.is_empty() {
            let first = input[0];

            if first & 0b1000_0000 != 0 {
                // Indexed header field: 1xxxxxxx.
                let (index, consumed) = decode_int(7, input)?;
                input = &input[consumed..];
                let (name, value) = resolve(&self.dynamic, index as u32)
                    .ok_or(HpackDecodeError::InvalidIndex(index as u32))?;
                out.push(HeaderField::new(
                    self.interner.intern(&name),
                    value,
                ));
                at_block_start = false;
            } else if first & 0b1100_0000 == 0b0100_0000 {
                // Literal with incremental indexing: 01xxxxxx.
                let (name, value, consumed) = self.decode_literal(input, 6)?;
                input = &input[consumed..];
                self.dynamic.add(name.clone(), value.clone());
                out.push(HeaderField::new(self.interner.intern(&name), value));
                at_block_start = false;
            } else if first & 0b1110_0000 == 0b0010_0000 {
                // Dynamic table size update: 001xxxxx. Only legal at the
                // very start of a block.
                if !at_block_start {
                    return Err(HpackDecodeError::TableSizeUpdateNotAtBlockStart);
                }
                let (size, consumed) = decode_int(5, input)?;
                input = &input[consumed..];
                self.dynamic.set_max_size(size as usize);
                // A size update does not end "block start": RFC 7541 §4.2
                // only disallows it appearing *after* the first header
                // representation, and multiple consecutive updates are
                // permitted, so `at_block_start` stays true here.
            } else if first & 0b1111_0000 == 0b0001_0000 {
                // Literal never indexed: 0001xxxx.
                let (name, value, consumed) = self.decode_literal(input, 4)?;
                input = &input[consumed..];
                out.push(HeaderField::new(self.interner.intern(&name), value));
                at_block_start = false;
            } else {
                // Literal without indexing: 0000xxxx.
                debug_assert_eq!(first & 0b1111_0000, 0b0000_0000);
                let (name, value, consumed) = self.decode_literal(input, 4)?;
                input = &input[consumed..];
                out.push(HeaderField::new(self.interner.intern(&name), value));
                at_block_start = false;
            }
        }

        Ok(out)
    }

    /// Decodes a literal representation's name (by index or string) and
    /// value (always a string), given the representation's prefix width.
    fn decode_literal(
        &mut self,
        input: &[u8],
        prefix_bits: u8,
    ) -> Result<(Box<str>, Box<str>, usize), HpackDecodeError> {
        let (name_index, mut consumed) = decode_int(prefix_bits, input)?;
        let name: Box<str> = if name_index == 0 {
            let (s, used) = self.decode_string(&input[consumed..])?;
            consumed += used;
            s
        } else {
            let (name, _value) = resolve(&self.dynamic, name_index as u32)
                .ok_or(HpackDecodeError::InvalidIndex(name_index as u32))?;
            name
        };

        let (value, used) = self.decode_string(&input[consumed..])?;
        consumed += used;
        Ok((name, value, consumed))
    }

    /// Decodes one string literal: H-bit + 7-bit length prefix + data.
    fn decode_string(&self, input: &[u8]) -> Result<(Box<str>, usize), HpackDecodeError> {
        if input.is_empty() {
            return Err(HpackDecodeError::UnexpectedEndOfBlock);
        }
        let huffman_flag = input[0] & 0b1000_0000 != 0;
        let (len, prefix_len) = decode_int(7, input)?;
        let len = len as usize;
        if len > self.max_string_len {
            return Err(HpackDecodeError::StringTooLong {
                len,
                max: self.max_string_len,
            });
        }
        let total = prefix_len + len;
        if input.len() < total {
            return Err(HpackDecodeError::UnexpectedEndOfBlock);
        }
        let raw = &input[prefix_len..total];
        let bytes = if huffman_flag {
            huffman::decode(raw)?
        } else {
            raw.to_vec()
        };
        let s = String::from_utf8(bytes).map_err(|_| HpackDecodeError::MalformedUtf8)?;
        Ok((s.into_boxed_str(), total))
    }
}

#[allow(dead_code)]
const _: () = assert!(STATIC_TABLE_LEN == 61);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::{Encoder, DEFAULT_TABLE_SIZE};

    #[test]
    fn round_trips_header_list_e1() {
        let headers = vec![
            HeaderField::new(":method", "GET"),
            HeaderField::new(":scheme", "http"),
            HeaderField::new(":path", "/"),
            HeaderField::new(":authority", "www.example.com"),
            HeaderField::new("cache-control", "no-cache"),
            HeaderField::new("custom-key", "custom-value"),
        ];

        let mut enc = Encoder::new(DEFAULT_TABLE_SIZE);
        let wire = enc.encode(&headers);

        let mut dec = Decoder::new(DEFAULT_TABLE_SIZE);
        let decoded = dec.decode(&wire).unwrap();
        assert_eq!(decoded, headers);

        // Spec E1: dynamic table holds custom-key, cache-control, :authority
        // newest-first.
        assert_eq!(dec.dynamic_table().len(), 3);
        assert_eq!(&*dec.dynamic_table().get(1).unwrap().name, "custom-key");
        assert_eq!(&*dec.dynamic_table().get(2).unwrap().name, "cache-control");
        assert_eq!(&*dec.dynamic_table().get(3).unwrap().name, ":authority");
    }

    #[test]
    fn rejects_invalid_index() {
        let mut dec = Decoder::new(DEFAULT_TABLE_SIZE);
        // Indexed header field pointing at index 200 (out of range for an
        // empty table).
        assert_eq!(
            dec.decode(&[0xC8]),
            Err(HpackDecodeError::InvalidIndex(72))
        );
    }

    #[test]
    fn table_size_update_must_lead_the_block() {
        let mut dec = Decoder::new(DEFAULT_TABLE_SIZE);
        // :method GET (0x82) followed by a size update (invalid position).
        let bytes = [0x82, 0x20];
        assert_eq!(
            dec.decode(&bytes),
            Err(HpackDecodeError::TableSizeUpdateNotAtBlockStart)
        );
    }

    #[test]
    fn rejects_oversized_string() {
        let mut dec = Decoder::new(DEFAULT_TABLE_SIZE).with_max_string_len(4);
        let mut enc = Encoder::new(DEFAULT_TABLE_SIZE);
        let wire = enc.encode(&[HeaderField::new("x-custom", "this-value-is-too-long")]);
        assert!(matches!(
            dec.decode(&wire),
            Err(HpackDecodeError::StringTooLong { .. })
        ));
    }
}
