//! Ordered, case-insensitive multimap of HTTP header fields.
//!
//! # Design
//! Headers are kept as a flat list of `(name, value)` pairs in insertion
//! order, which is the natural wire representation. Name lookups compare
//! ASCII case-insensitively while the caller's spelling is preserved for
//! output. Repeated headers stay as separate entries; `canonical_values`
//! is the view that splits comma-joined list headers.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Header whose values must never be split on commas.
const SET_COOKIE: &str = "set-cookie";

/// A block of HTTP header fields.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chained form of [`HeaderMap::add`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, value);
        self
    }

    /// Append a header. Strictly additive: existing entries with the same
    /// name are kept.
    ///
    /// # Panics
    /// Panics if `name` contains non-ASCII characters.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        assert!(name.is_ascii(), "header name must be ASCII: {name:?}");
        self.entries.push((name, value.into()));
    }

    /// Append every entry of `other`, keeping its order.
    pub fn add_all(&mut self, other: &HeaderMap) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Remove all entries named `name`, then add `name: value`.
    pub fn replace_or_add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.add(name, value);
    }

    /// Remove all entries whose name matches case-insensitively.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// All values for `name` in insertion order, exactly as added.
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Values for `name` split on commas with surrounding whitespace trimmed.
    ///
    /// `Set-Cookie` values are returned unsplit because cookie attributes
    /// (e.g. `Expires`) legitimately contain commas.
    pub fn canonical_values(&self, name: &str) -> Vec<&str> {
        let values = self.values(name);
        if name.eq_ignore_ascii_case(SET_COOKIE) {
            return values;
        }
        values
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(|v| v.trim_matches(|c: char| c.is_ascii_whitespace()))
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn lowercase_names(&self) -> BTreeSet<String> {
        self.entries.iter().map(|(n, _)| n.to_ascii_lowercase()).collect()
    }

    fn sorted_values(&self, name: &str) -> Vec<&str> {
        let mut values = self.values(name);
        values.sort_unstable();
        values
    }
}

/// Equal iff both maps have the same case-insensitive name set and, for each
/// name, the same multiset of values. Ordering across names is ignored.
impl PartialEq for HeaderMap {
    fn eq(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        let names = self.lowercase_names();
        if names != other.lowercase_names() {
            return false;
        }
        names
            .iter()
            .all(|name| self.sorted_values(name) == other.sorted_values(name))
    }
}

impl Eq for HeaderMap {}

impl Hash for HeaderMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for name in self.lowercase_names() {
            let values = self.sorted_values(&name);
            name.hash(state);
            values.hash(state);
        }
    }
}

impl<N, V> FromIterator<(N, V)> for HeaderMap
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        headers.extend(iter);
        headers
    }
}

impl<N, V> Extend<(N, V)> for HeaderMap
where
    N: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (N, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.add(name, value);
        }
    }
}

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
