use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered mapping from parameter name to the ordered list of its values.
///
/// Repeated fields (`a=1&a=2`) share a single key. Keys keep the order in
/// which they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<(String, Vec<String>)>,
    /// Key to its position in `entries`.
    index: HashMap<String, usize>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    fn push_key(&mut self, key: String, values: Vec<String>) {
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, values));
    }

    /// Adds `value` to `key`, creating the key at the end if needed.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.position(&key) {
            Some(pos) => self.entries[pos].1.push(value.into()),
            None => self.push_key(key, vec![value.into()]),
        }
    }

    /// Replaces the values of `key`, keeping its position if it exists.
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<String>) {
        let key = key.into();
        match self.position(&key) {
            Some(pos) => self.entries[pos].1 = values,
            None => self.push_key(key, values),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key)?.first().map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.position(key).map(|pos| self.entries[pos].1.as_slice())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Every `(key, value)` pair, repeating the key for each of its values.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.append(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, Vec<V>)>> for Parameters {
    fn from(entries: Vec<(K, Vec<V>)>) -> Self {
        let mut params = Self::new();
        for (k, values) in entries {
            params.insert(k, values.into_iter().map(Into::into).collect());
        }
        params
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, values) in &self.entries {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}
