//! Ordered request header list and default request headers.
//!
//! Header names are matched case-insensitively but stored with the caller's
//! spelling. Upserted headers are placed so that the list stays sorted by
//! lower-cased name, which keeps the wire order deterministic.

use std::fmt;

/// User-Agent sent when the caller supplies no headers.
pub const USER_AGENT: &str = concat!("Mozilla/5.0 Hopper/", env!("CARGO_PKG_VERSION"));

/// Ordered collection of `(name, value)` request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers installed when the caller supplies none.
    pub fn defaults() -> Self {
        let mut headers = Self::new();
        headers.push("Accept-Encoding", "gzip, deflate, br");
        headers.push("Accept-Language", "en-AU,en;q=0.9");
        headers.push("Connection", "keep-alive");
        headers.push("User-Agent", USER_AGENT);
        headers
    }

    /// Append without looking for an existing entry.
    ///
    /// Used for caller-ordered lists, which may carry duplicates.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace the first case-insensitive match in place, or insert the
    /// header before the first entry whose name sorts after it.
    pub fn upsert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(i) = self.position(&name) {
            self.entries[i] = (name, value);
            return;
        }

        let key = name.to_ascii_lowercase();
        match self
            .entries
            .iter()
            .position(|(existing, _)| key < existing.to_ascii_lowercase())
        {
            Some(i) => self.entries.insert(i, (name, value)),
            None => self.entries.push((name, value)),
        }
    }

    /// First value whose name matches case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove every entry with this name, returning how many were dropped.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderList {
    /// Collects in order, keeping duplicates.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.push(k, v);
        }
        headers
    }
}

impl fmt::Display for HeaderList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}
