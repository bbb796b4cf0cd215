use crate::wire::huffman;
use crate::wire::varint::encode_int;

use super::header::HeaderField;
use super::table::{find_combined, DynamicTable};

/// HPACK encoder (spec §4.3): chooses the most compact representation for
/// each header field and maintains the sender-side dynamic table.
pub struct Encoder {
    dynamic: DynamicTable,
    /// Set when the peer's `SETTINGS_HEADER_TABLE_SIZE` has shrunk; the next
    /// header block must start with a table-size-update instruction.
    pending_size_update: Option<usize>,
}

impl Encoder {
    pub fn new(max_table_size: usize) -> Self {
        Encoder {
            dynamic: DynamicTable::new(max_table_size),
            pending_size_update: None,
        }
    }

    /// Called when the peer's `SETTINGS_HEADER_TABLE_SIZE` changes. A
    /// decrease must be reflected in the next emitted header block (spec
    /// §4.3); an increase just raises our local ceiling.
    pub fn set_max_dynamic_table_size(&mut self, new_size: usize) {
        if new_size < self.dynamic.max_size() {
            self.pending_size_update = Some(new_size);
        }
        self.dynamic.set_max_size(new_size);
    }

    /// Encodes a full header list into one header block fragment.
    pub fn encode(&mut self, headers: &[HeaderField]) -> Vec<u8> {
        let mut out = Vec::with_capacity(headers.len() * 16);

        if let Some(size) = self.pending_size_update.take() {
            // 001xxxxx, 5-bit prefix.
            encode_int(5, 0b0010_0000, size as u64, &mut out);
        }

        for header in headers {
            self.encode_one(header, &mut out);
        }
        out
    }

    fn encode_one(&mut self, header: &HeaderField, out: &mut Vec<u8>) {
        match find_combined(&self.dynamic, &header.name, &header.value) {
            Some((index, true)) => {
                // (a) exact match: indexed header field, 1xxxxxxx.
                encode_int(7, 0b1000_0000, index as u64, out);
            }
            Some((index, false)) => {
                // (b) name match with a new value: literal with incremental
                // indexing, naming the existing entry by index.
                encode_int(6, 0b0100_0000, index as u64, out);
                encode_string(&header.value, out);
                self.dynamic.add(header.name.clone(), header.value.clone());
            }
            None => {
                // (c) brand new name: literal with incremental indexing,
                // index 0, followed by both strings.
                out.push(0b0100_0000);
                encode_string(&header.name, out);
                encode_string(&header.value, out);
                self.dynamic.add(header.name.clone(), header.value.clone());
            }
        }
    }

    pub fn dynamic_table_len(&self) -> usize {
        self.dynamic.len()
    }

    #[cfg(test)]
    pub(crate) fn dynamic_table(&self) -> &DynamicTable {
        &self.dynamic
    }
}

/// Encodes a string literal: H-bit + 7-bit length prefix + data, choosing
/// Huffman iff it's strictly smaller than the literal encoding.
fn encode_string(s: &str, out: &mut Vec<u8>) {
    let huff_len = huffman::encoded_len(s.as_bytes());
    if huff_len < s.len() {
        encode_int(7, 0b1000_0000, huff_len as u64, out);
        out.extend_from_slice(&huffman::encode(s.as_bytes()));
    } else {
        encode_int(7, 0, s.len() as u64, out);
        out.extend_from_slice(s.as_bytes());
    }
}
