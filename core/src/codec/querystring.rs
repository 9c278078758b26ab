use url::form_urlencoded;

use super::{BodyCodec, DecodeError};
use crate::core::params::Parameters;
use crate::core::RequestKind;

/// Decodes the query component of a URL. Query strings are decoded
/// leniently, the way browsers and servers do, so decoding never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStringCodec;

impl QueryStringCodec {
    pub fn new() -> Self {
        Self
    }
}

impl BodyCodec for QueryStringCodec {
    fn kind(&self) -> RequestKind {
        RequestKind::QueryString
    }

    fn decode(&mut self, query: &[u8]) -> Result<Parameters, DecodeError> {
        Ok(form_urlencoded::parse(query)
            .filter(|(k, v)| !(k.is_empty() && v.is_empty()))
            .collect())
    }

    fn encode(&self, params: &Parameters) -> Result<Vec<u8>, DecodeError> {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in params.pairs() {
            serializer.append_pair(key, value);
        }
        Ok(serializer.finish().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_query() {
        let params = QueryStringCodec::new().decode(b"id=1&name=John%20Doe&id=2&flag").unwrap();
        assert_eq!(
            params,
            Parameters::from(vec![
                ("id", vec!["1", "2"]),
                ("name", vec!["John Doe"]),
                ("flag", vec![""]),
            ])
        );
    }

    #[test]
    fn test_decode_empty_query() {
        assert!(QueryStringCodec::new().decode(b"").unwrap().is_empty());
        assert!(QueryStringCodec::new().decode(b"&&").unwrap().is_empty());
    }

    #[test]
    fn test_encode_query() {
        let params = Parameters::from(vec![("q", vec!["a b", "c&d"])]);
        assert_eq!(QueryStringCodec::new().encode(&params).unwrap(), b"q=a+b&q=c%26d");
    }
}
