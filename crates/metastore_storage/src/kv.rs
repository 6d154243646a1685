//! Key/value pairs and list helpers.

/// A single key and its stored bytes.
///
/// Keys order lexicographically by their bytes. Values are always owned
/// copies, so a `KeyValue` stays valid after the transaction that produced
/// it has finished.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyValue {
    /// The key.
    pub key: String,
    /// The stored value.
    pub value: Vec<u8>,
}

impl KeyValue {
    /// Creates a new pair.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Selects a page of entries from `list`.
///
/// Entries are filtered by `matches` first; `offset` then skips that many
/// *matching* entries and at most `limit` of the remaining matches are
/// returned. A `limit` of `None` returns every match after the offset.
///
/// The result length is `min(limit, matched - offset)`, saturating at zero.
pub fn do_list_func<'a, F>(
    list: &'a [KeyValue],
    mut matches: F,
    offset: usize,
    limit: Option<usize>,
) -> Vec<&'a KeyValue>
where
    F: FnMut(&KeyValue) -> bool,
{
    if limit == Some(0) {
        return Vec::new();
    }
    let filtered = list.iter().filter(|kv| matches(kv)).skip(offset);
    match limit {
        Some(limit) => filtered.take(limit).collect(),
        None => filtered.collect(),
    }
}
