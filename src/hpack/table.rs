use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;

use super::header::{entry_size, HeaderField};

/// The static table has exactly 61 entries (RFC 7541 Appendix A), indexed
/// `1..=61`.
pub const STATIC_TABLE_LEN: usize = 61;

#[rustfmt::skip]
const ENTRIES: [(&str, &str); STATIC_TABLE_LEN] = [
    (":authority", ""),
    (":method", "GET"), (":method", "POST"),
    (":path", "/"), (":path", "/index.html"),
    (":scheme", "http"), (":scheme", "https"),
    (":status", "200"), (":status", "204"), (":status", "206"), (":status", "304"),
    (":status", "400"), (":status", "404"), (":status", "500"),
    ("accept-charset", ""), ("accept-encoding", "gzip, deflate"), ("accept-language", ""),
    ("accept-ranges", ""), ("accept", ""), ("access-control-allow-origin", ""),
    ("age", ""), ("allow", ""), ("authorization", ""), ("cache-control", ""),
    ("content-disposition", ""), ("content-encoding", ""), ("content-language", ""),
    ("content-length", ""), ("content-location", ""), ("content-range", ""),
    ("content-type", ""), ("cookie", ""), ("date", ""), ("etag", ""), ("expect", ""),
    ("expires", ""), ("from", ""), ("host", ""), ("if-match", ""),
    ("if-modified-since", ""), ("if-none-match", ""), ("if-range", ""),
    ("if-unmodified-since", ""), ("last-modified", ""), ("link", ""), ("location", ""),
    ("max-forwards", ""), ("proxy-authenticate", ""), ("proxy-authorization", ""),
    ("range", ""), ("referer", ""), ("refresh", ""), ("retry-after", ""), ("server", ""),
    ("set-cookie", ""), ("strict-transport-security", ""), ("transfer-encoding", ""),
    ("user-agent", ""), ("vary", ""), ("via", ""), ("www-authenticate", ""),
];

/// The 61 fixed entries defined by RFC 7541 Appendix A, plus a precomputed
/// `name` / `name+value` -> index lookup so encoding never does a linear
/// scan.
pub struct StaticTable;

struct Index {
    exact: HashMap<(&'static str, &'static str), u32>,
    by_name: HashMap<&'static str, u32>,
}

fn index() -> &'static Index {
    static INDEX: OnceLock<Index> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut exact = HashMap::with_capacity(STATIC_TABLE_LEN);
        let mut by_name = HashMap::with_capacity(STATIC_TABLE_LEN);
        for (i, &(name, value)) in ENTRIES.iter().enumerate() {
            let idx = (i + 1) as u32;
            exact.entry((name, value)).or_insert(idx);
            // First (lowest-index) match wins, matching RFC 7541's implicit
            // preference for the canonical entry (e.g. `:method` -> index 2
            // for GET rather than some later alias).
            by_name.entry(name).or_insert(idx);
        }
        Index { exact, by_name }
    })
}

impl StaticTable {
    /// 1-based lookup; `index` must be in `1..=61`.
    pub fn get(index: u32) -> Option<(&'static str, &'static str)> {
        ENTRIES.get((index as usize).checked_sub(1)?).copied()
    }

    /// Returns `(index, exact)` for the best match: an exact name+value
    /// match is always preferred over a name-only match.
    pub fn find(name: &str, value: &str) -> Option<(u32, bool)> {
        let idx = index();
        if let Some(&i) = idx.exact.get(&(name, value)) {
            return Some((i, true));
        }
        idx.by_name.get(name).map(|&i| (i, false))
    }
}

/// FIFO dynamic header table with size-based eviction (RFC 7541 §2.3.2).
///
/// Backed by a `VecDeque` rather than a hand-rolled circular buffer: pushes
/// at the front (newest) and pops at the back (oldest) are both O(1)
/// amortized, which is all the spec's "O(1) amortized" requirement asks
/// for -- see DESIGN.md for why this doesn't need a bespoke ring buffer.
#[derive(Default)]
pub struct DynamicTable {
    entries: VecDeque<HeaderField>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    pub fn new(max_size: usize) -> Self {
        DynamicTable {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current table size in octets, per RFC 7541 §4.1.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Inserts a new entry as the newest (index 1). Entries are evicted
    /// oldest-first until the new entry fits; an entry larger than
    /// `max_size` is not inserted at all (and evicts everything else, per
    /// RFC 7541 §4.4).
    pub fn add(&mut self, name: impl Into<Box<str>>, value: impl Into<Box<str>>) {
        let name = name.into();
        let value = value.into();
        let entry_len = entry_size(name.len(), value.len());

        if entry_len > self.max_size {
            self.entries.clear();
            self.size = 0;
            return;
        }

        while self.size + entry_len > self.max_size {
            match self.entries.pop_back() {
                Some(evicted) => self.size -= evicted.size(),
                None => break,
            }
        }

        self.size += entry_len;
        self.entries.push_front(HeaderField::new(name, value));
    }

    /// 1-based lookup; index 1 is the newest entry.
    pub fn get(&self, index: u32) -> Option<&HeaderField> {
        self.entries.get((index as usize).checked_sub(1)?)
    }

    /// Returns `(index, exact)` -- an exact match is preferred over a
    /// name-only match, scanning newest-first (lowest index first).
    pub fn find(&self, name: &str, value: &str) -> Option<(u32, bool)> {
        let mut name_match = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if &*entry.name == name {
                if &*entry.value == value {
                    return Some(((i + 1) as u32, true));
                }
                name_match.get_or_insert((i + 1) as u32);
            }
        }
        name_match.map(|i| (i, false))
    }

    /// Shrinks (or grows) the maximum size, evicting eagerly if the new
    /// size is smaller (RFC 7541 §4.3).
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        while self.size > self.max_size {
            match self.entries.pop_back() {
                Some(evicted) => self.size -= evicted.size(),
                None => break,
            }
        }
    }
}

/// Resolves a combined HPACK index (static `1..=61`, dynamic `62..`) to the
/// header it refers to.
pub fn resolve(dynamic: &DynamicTable, index: u32) -> Option<(Box<str>, Box<str>)> {
    if index == 0 {
        return None;
    }
    if (1..=STATIC_TABLE_LEN as u32).contains(&index) {
        let (name, value) = StaticTable::get(index)?;
        return Some((name.into(), value.into()));
    }
    let dyn_index = index - STATIC_TABLE_LEN as u32;
    dynamic
        .get(dyn_index)
        .map(|e| (e.name.clone(), e.value.clone()))
}

/// Finds the best combined index for `name`/`value`: static table wins
/// immediately on an exact match; otherwise merge static and dynamic
/// name-only matches, again preferring an exact match should the dynamic
/// table have one the static table lacks.
pub fn find_combined(dynamic: &DynamicTable, name: &str, value: &str) -> Option<(u32, bool)> {
    if let Some((idx, true)) = StaticTable::find(name, value) {
        return Some((idx, true));
    }
    if let Some((idx, true)) = dynamic.find(name, value) {
        return Some((idx + STATIC_TABLE_LEN as u32, true));
    }
    if let Some((idx, false)) = StaticTable::find(name, value) {
        return Some((idx, false));
    }
    dynamic
        .find(name, value)
        .map(|(idx, exact)| (idx + STATIC_TABLE_LEN as u32, exact))
}
