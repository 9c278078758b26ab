//! `Content-Type` and `Content-Disposition` value parsing.

use mime::Mime;

/// A parsed media type.
///
/// Type, subtype and parameter names compare case-insensitively; `mime`
/// lower-cases them while parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    mime: Mime,
}

impl MediaType {
    /// Parses a header value such as `multipart/form-data; boundary="x"`.
    ///
    /// When only the parameters are malformed the `type/subtype` part is
    /// still recognized, without parameters. Returns `None` when the value
    /// has no valid `type/subtype` part.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let mime = value.parse::<Mime>().ok().or_else(|| {
            let essence = value.split(';').next()?.trim();
            essence.parse::<Mime>().ok()
        })?;
        Some(Self { mime })
    }

    /// `type/subtype`, lower-cased.
    pub fn essence(&self) -> &str {
        self.mime.essence_str()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.mime
            .params()
            .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, value)| strip_quotes(value.as_str()))
    }

    pub fn is_multipart_form(&self) -> bool {
        self.mime.type_() == mime::MULTIPART && self.mime.subtype() == mime::FORM_DATA
    }

    pub fn is_urlencoded_form(&self) -> bool {
        self.mime.type_() == mime::APPLICATION && self.mime.subtype() == mime::WWW_FORM_URLENCODED
    }

    /// `application/json`, `text/json` and `+json` structured suffixes.
    pub fn is_json(&self) -> bool {
        let (kind, subtype) = (self.mime.type_(), self.mime.subtype());
        if subtype == mime::JSON {
            return kind == mime::APPLICATION || kind == mime::TEXT;
        }
        kind == mime::APPLICATION && self.mime.suffix() == Some(mime::JSON)
    }

    /// The `boundary` parameter, when it is usable as a multipart delimiter
    /// (1 to 70 characters of the RFC 2046 alphabet, not ending in a space).
    pub fn boundary(&self) -> Option<&str> {
        let boundary = self
            .mime
            .get_param(mime::BOUNDARY)
            .map(|value| strip_quotes(value.as_str()))?;
        let valid_len = (1..=70).contains(&boundary.len());
        let valid_chars = boundary.chars().all(is_boundary_char);
        if valid_len && valid_chars && !boundary.ends_with(' ') {
            Some(boundary)
        } else {
            None
        }
    }
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Splits a `Content-Disposition` value into its lower-cased leading token
/// and its `name=value` parameters, names lower-cased and values unquoted
/// (backslash escapes included, as browsers send file names).
pub fn parse_header_params(value: &str) -> (String, Vec<(String, String)>) {
    let mut segments = split_unquoted(value, ';').into_iter();
    let token = segments
        .next()
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let params = segments
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, unquote(value.trim())))
        })
        .collect();

    (token, params)
}

fn is_boundary_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c)
}

/// Splits on `sep` outside of double quotes.
fn split_unquoted(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let mt = MediaType::parse("Application/JSON").unwrap();
        assert_eq!(mt.essence(), "application/json");
        assert!(mt.is_json());
        assert!(!mt.is_multipart_form());
    }

    #[test]
    fn test_parse_params() {
        let mt = MediaType::parse("Multipart/Form-Data; charset=utf-8; BOUNDARY=\"a:b=c\"").unwrap();
        assert!(mt.is_multipart_form());
        assert_eq!(mt.essence(), "multipart/form-data");
        assert_eq!(mt.param("charset"), Some("utf-8"));
        assert_eq!(mt.param("Boundary"), Some("a:b=c"));
        assert_eq!(mt.boundary(), Some("a:b=c"));
    }

    #[test]
    fn test_boundary_validation() {
        let ok = MediaType::parse("multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW").unwrap();
        assert_eq!(ok.boundary(), Some("----WebKitFormBoundary7MA4YWxkTrZu0gW"));

        let missing = MediaType::parse("multipart/form-data").unwrap();
        assert_eq!(missing.boundary(), None);

        let empty = MediaType::parse("multipart/form-data; boundary=").unwrap();
        assert_eq!(empty.boundary(), None);

        let too_long = format!("multipart/form-data; boundary={}", "a".repeat(71));
        assert_eq!(MediaType::parse(&too_long).unwrap().boundary(), None);

        let bad_char = MediaType::parse("multipart/form-data; boundary=abc{}").unwrap();
        assert!(bad_char.is_multipart_form());
        assert_eq!(bad_char.boundary(), None);
    }

    #[test]
    fn test_json_variants() {
        assert!(MediaType::parse("text/json").unwrap().is_json());
        assert!(MediaType::parse("application/vnd.api+json").unwrap().is_json());
        assert!(!MediaType::parse("application/jsonp").unwrap().is_json());
        assert!(!MediaType::parse("text/plain").unwrap().is_json());
        assert!(!MediaType::parse("text/vnd.x+json").unwrap().is_json());
        assert!(MediaType::parse(" application/json ; charset=UTF-8").unwrap().is_json());
        assert!(MediaType::parse("application/x-www-form-urlencoded; charset=utf-8")
            .unwrap()
            .is_urlencoded_form());
    }

    #[test]
    fn test_parse_disposition() {
        let (token, params) = parse_header_params(r#"form-data; name="field"; filename="a \"b\".txt""#);
        assert_eq!(token, "form-data");
        assert_eq!(
            params,
            vec![
                ("name".to_string(), "field".to_string()),
                ("filename".to_string(), "a \"b\".txt".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(MediaType::parse(""), None);
        assert_eq!(MediaType::parse("json"), None);
        assert_eq!(MediaType::parse("/json"), None);
    }
}
