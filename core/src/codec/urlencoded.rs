use percent_encoding::percent_decode_str;
use url::form_urlencoded;

use super::{BodyCodec, DecodeError};
use crate::core::params::Parameters;
use crate::core::RequestKind;

const FORMAT: &str = "url-encoded form";

/// `application/x-www-form-urlencoded` request bodies.
///
/// Unlike query strings, form bodies are decoded strictly: the raw body must
/// be printable ASCII and every percent escape must decode to UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlEncodedCodec;

impl UrlEncodedCodec {
    pub fn new() -> Self {
        Self
    }
}

fn decode_component(raw: &str) -> Result<String, DecodeError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| DecodeError::InvalidUtf8)
}

impl BodyCodec for UrlEncodedCodec {
    fn kind(&self) -> RequestKind {
        RequestKind::UrlEncoded
    }

    fn decode(&mut self, body: &[u8]) -> Result<Parameters, DecodeError> {
        let text = std::str::from_utf8(body).map_err(|_| DecodeError::InvalidUtf8)?;
        let text = text.trim_end_matches(['\r', '\n']);

        if let Some(bad) = text.bytes().find(|b| !(0x20..0x7f).contains(b)) {
            return Err(DecodeError::malformed(
                FORMAT,
                format!("unexpected raw byte 0x{:02x}", bad),
            ));
        }

        let mut params = Parameters::new();
        for pair in text.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.append(decode_component(key)?, decode_component(value)?);
        }
        Ok(params)
    }

    fn encode(&self, params: &Parameters) -> Result<Vec<u8>, DecodeError> {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in params.pairs() {
            serializer.append_pair(key, value);
        }
        Ok(serializer.finish().into_bytes())
    }
}
