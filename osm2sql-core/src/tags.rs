//! Ordered, key-unique tag storage.
//!
//! OpenStreetMap tags arrive as loosely ordered key/value pairs. Output column
//! generation depends on first-seen order, so [`TagList`] keeps insertion
//! order while offering constant-time key lookup through a side index.

use std::collections::HashMap;

/// A single `key=value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag key, for example `highway`.
    pub key: String,
    /// Tag value, for example `residential`.
    pub value: String,
}

impl Tag {
    /// Construct a tag from anything convertible into owned strings.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered sequence of tags with unique keys.
///
/// # Examples
/// ```
/// use osm2sql_core::TagList;
///
/// let mut tags = TagList::new();
/// assert!(tags.push("highway", "primary"));
/// assert!(!tags.push("highway", "secondary"));
/// assert_eq!(tags.get("highway"), Some("primary"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TagList {
    tags: Vec<Tag>,
    index: HashMap<String, usize>,
}

impl PartialEq for TagList {
    fn eq(&self, other: &Self) -> bool {
        self.tags == other.tags
    }
}

impl Eq for TagList {}

impl TagList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tags held.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the list holds no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Append a tag unless the key is already present.
    ///
    /// Returns `false` and leaves the list untouched when the key exists; the
    /// first-seen value wins.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.tags.len());
        self.tags.push(Tag {
            key,
            value: value.into(),
        });
        true
    }

    /// Insert or overwrite the value for `key`.
    ///
    /// An existing key keeps its position; a new key is appended.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key).and_then(|idx| self.tags.get_mut(*idx)) {
            Some(existing) => existing.value = value,
            None => {
                self.push(key, value);
            }
        }
    }

    /// Value stored for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .and_then(|idx| self.tags.get(*idx))
            .map(|tag| tag.value.as_str())
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Position of `key` in insertion order.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Whether `key` carries one of the truthy spellings `yes`, `true` or `1`.
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }

    /// Whether `key` carries one of the falsy spellings `no`, `false` or `0`.
    pub fn is_false(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_falsy)
    }

    /// Iterate over tags whose key starts with `prefix`, in insertion order.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.tags.iter().filter(move |tag| tag.key.starts_with(prefix))
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.index.remove(key)?;
        if idx >= self.tags.len() {
            return None;
        }
        let removed = self.tags.remove(idx);
        self.reindex_from(idx);
        Some(removed.value)
    }

    /// Keep only the tags for which `keep` returns `true`.
    ///
    /// The predicate may inspect and rewrite each value while it iterates,
    /// which gives the remove-while-iterating behaviour tag filters rely on.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&mut Tag) -> bool,
    {
        self.tags.retain_mut(|tag| keep(tag));
        self.reindex_from(0);
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    /// Iterate over `(key, value)` string pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags
            .iter()
            .map(|tag| (tag.key.as_str(), tag.value.as_str()))
    }

    /// Whether every tag of `other` is present here with the same value.
    pub fn contains_all(&self, other: &Self) -> bool {
        other
            .iter()
            .all(|tag| self.get(&tag.key) == Some(tag.value.as_str()))
    }

    /// Keep only tags that `other` carries with an identical value.
    pub fn intersect(&mut self, other: &Self) {
        self.retain(|tag| other.get(&tag.key) == Some(tag.value.as_str()));
    }

    fn reindex_from(&mut self, start: usize) {
        if start == 0 {
            self.index.clear();
        }
        for (idx, tag) in self.tags.iter().enumerate().skip(start) {
            self.index.insert(tag.key.clone(), idx);
        }
    }
}

impl<'a> IntoIterator for &'a TagList {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for TagList
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Self::new();
        for (key, value) in iter {
            tags.push(key, value);
        }
        tags
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for TagList
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// `yes`, `true` and `1` count as true.
pub fn is_truthy(value: &str) -> bool {
    matches!(value, "yes" | "true" | "1")
}

/// `no`, `false` and `0` count as false.
pub fn is_falsy(value: &str) -> bool {
    matches!(value, "no" | "false" | "0")
}
