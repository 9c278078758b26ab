use anyhow::{Context, Result};
use reqwest::Method;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use url::Url;

use crate::codec::{AnyCodec, BodyCodec, DecodeError};
use crate::core::params::Parameters;
use crate::core::RequestKind;
use crate::http::{Headers, HttpRequest};

/// An HTTP transaction reduced to the parts a fuzzer mutates: target,
/// method, headers and the decoded parameters, together with the codec that
/// produced them.
///
/// Built by [`crate::core::factory`]; immutable afterwards. Consumers that
/// only use the accessors do not need to care which [`RequestKind`] they
/// hold.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzableRequest {
    url: Url,
    method: String,
    headers: Headers,
    parameters: Parameters,
    codec: AnyCodec,
}

impl FuzzableRequest {
    pub(crate) fn new(
        url: Url,
        method: impl Into<String>,
        headers: Headers,
        parameters: Parameters,
        codec: AnyCodec,
    ) -> Self {
        Self {
            url,
            method: method.into(),
            headers,
            parameters,
            codec,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Alias of [`FuzzableRequest::parameters`], "dc" for data container.
    pub fn dc(&self) -> &Parameters {
        &self.parameters
    }

    pub fn kind(&self) -> RequestKind {
        self.codec.kind()
    }

    pub fn codec(&self) -> &AnyCodec {
        &self.codec
    }

    /// The body re-encoded from the current parameters. Query-string
    /// requests have no body.
    pub fn post_data(&self) -> Result<Vec<u8>, DecodeError> {
        match self.codec {
            AnyCodec::QueryString(_) => Ok(Vec::new()),
            _ => self.codec.encode(&self.parameters),
        }
    }

    /// Returns a copy carrying `parameters` instead of the decoded ones.
    /// Fails when the codec cannot place them (unknown JSON or XML-RPC
    /// paths).
    pub fn with_parameters(&self, parameters: Parameters) -> Result<Self, DecodeError> {
        self.codec.encode(&parameters)?;
        Ok(Self {
            parameters,
            ..self.clone()
        })
    }

    /// Rebuilds a transport request. Query-string parameters go back into
    /// the URL, everything else into the body. A `Content-Length` header, if
    /// present, is recomputed for the new body.
    pub fn to_http_request(&self) -> Result<HttpRequest> {
        let method = Method::from_bytes(self.method.as_bytes())
            .with_context(|| format!("invalid method {:?}", self.method))?;

        let mut url = self.url.clone();
        if let AnyCodec::QueryString(codec) = &self.codec {
            if self.parameters.is_empty() {
                url.set_query(None);
            } else {
                let query = String::from_utf8(codec.encode(&self.parameters)?)?;
                url.set_query(Some(&query));
            }
        }

        let body = self.post_data()?;
        let mut headers = self.headers.clone();
        if headers.contains("content-length") {
            headers.set("Content-Length", body.len().to_string());
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Builds a curl command that reproduces this request.
    pub fn to_curl(&self) -> String {
        let mut parts = vec![format!(
            "curl -X {} {}",
            self.method,
            shell_quote(self.url.as_str())
        )];
        for (k, v) in self.headers.iter() {
            parts.push(format!("-H {}", shell_quote(&format!("{}: {}", k, v))));
        }
        if let Ok(body) = self.post_data() {
            if !body.is_empty() {
                parts.push(format!(
                    "--data-binary {}",
                    shell_quote(&String::from_utf8_lossy(&body))
                ));
            }
        }
        parts.join(" ")
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

impl Serialize for FuzzableRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FuzzableRequest", 5)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("url", self.url.as_str())?;
        state.serialize_field("method", &self.method)?;
        state.serialize_field("headers", &self.headers)?;
        state.serialize_field("parameters", &self.parameters)?;
        state.end()
    }
}
