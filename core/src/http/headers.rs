use log::warn;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

/// Ordered, case-insensitive header multimap.
///
/// Names keep the casing they were supplied with and duplicate names are
/// kept in insertion order. Lookups ignore ASCII case.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value stored under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns the `(name, value)` pair of the first header called `name`,
    /// with the name as it was supplied.
    pub fn get_entry(&self, name: &str) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single one. The new entry takes
    /// the position of the first replaced entry, or goes last.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(pos) => {
                self.entries[pos] = (name.clone(), value);
                let mut index = 0;
                self.entries.retain(|(k, _)| {
                    let keep = index <= pos || !k.eq_ignore_ascii_case(&name);
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
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

    /// Copies a reqwest `HeaderMap`. Values that are not visible ASCII are
    /// decoded lossily.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        map.iter()
            .map(|(name, value)| {
                let value = match value.to_str() {
                    Ok(v) => v.to_string(),
                    Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
                };
                (name.as_str().to_string(), value)
            })
            .collect()
    }

    /// Builds a reqwest `HeaderMap`, skipping entries reqwest refuses.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in self.iter() {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => warn!("Dropping header that is not valid on the wire: {}", name),
            }
        }
        map
    }

    /// Entries grouped by lower-cased name, each group keeping value order.
    fn grouped(&self) -> Vec<(String, Vec<&str>)> {
        let mut groups: Vec<(String, Vec<&str>)> = Vec::new();
        for (name, value) in self.iter() {
            let name = name.to_ascii_lowercase();
            match groups.iter_mut().find(|(k, _)| *k == name) {
                Some((_, values)) => values.push(value),
                None => groups.push((name, vec![value])),
            }
        }
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        groups
    }
}

impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.grouped() == other.grouped()
    }
}

impl Eq for Headers {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for Headers {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let headers = Headers::from(vec![("Content-Type", "application/json")]);
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert!(headers.contains("CONTENT-TYPE"));
        assert_eq!(headers.get_entry("content-TYPE"), Some(("Content-Type", "application/json")));
    }

    #[test]
    fn test_duplicates_are_preserved() {
        let mut headers = Headers::new();
        headers.append("Cookie", "a=1");
        headers.append("cookie", "b=2");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("cookie"), Some("a=1"));
        assert_eq!(headers.get_all("COOKIE"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_set_replaces_all_values() {
        let mut headers = Headers::from(vec![("a", "1"), ("B", "2"), ("b", "3"), ("c", "4")]);
        headers.set("b", "9");
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("a", "1"), ("b", "9"), ("c", "4")]);
    }

    #[test]
    fn test_remove() {
        let mut headers = Headers::from(vec![("a", "1"), ("A", "2"), ("b", "3")]);
        headers.remove("a");
        assert_eq!(headers.len(), 1);
        assert!(!headers.contains("a"));
    }

    #[test]
    fn test_equality_ignores_name_order_and_case() {
        let left = Headers::from(vec![("Foo", "bar"), ("content-length", "7")]);
        let right = Headers::from(vec![("Content-Length", "7"), ("foo", "bar")]);
        assert_eq!(left, right);
    }

    #[test]
    fn test_equality_is_value_exact() {
        let left = Headers::from(vec![("foo", "bar")]);
        let right = Headers::from(vec![("foo", "Bar")]);
        assert_ne!(left, right);

        let dup_a = Headers::from(vec![("x", "1"), ("x", "2")]);
        let dup_b = Headers::from(vec![("x", "2"), ("x", "1")]);
        assert_ne!(dup_a, dup_b);
        assert_ne!(dup_a, Headers::from(vec![("x", "1")]));
    }

    #[test]
    fn test_header_map_conversion() {
        let headers = Headers::from(vec![("X-Token", "abc"), ("x-token", "def"), ("bad name", "v")]);
        let map = headers.to_header_map();
        assert_eq!(map.get_all("x-token").iter().count(), 2);

        let back = Headers::from_header_map(&map);
        assert_eq!(back, Headers::from(vec![("x-token", "abc"), ("x-token", "def")]));
    }
}
