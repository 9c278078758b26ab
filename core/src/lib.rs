pub mod codec;
pub mod core;
pub mod http;
pub mod utils;

use anyhow::{anyhow, Context, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

pub use crate::codec::{multipart_encode, BodyCodec, DecodeError};
pub use crate::core::factory::{create_fuzzable_request_from_parts, create_fuzzable_request_from_request};
pub use crate::core::params::Parameters;
pub use crate::core::request::FuzzableRequest;
pub use crate::core::RequestKind;
pub use crate::http::raw::parse_raw_request;
pub use crate::http::{Headers, HttpRequest, TransportRequest};
pub use crate::utils::read_lines;

/// Classification settings shared by the CLI and library callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifyConfig {
    pub url: String,
    pub method: String,
    pub headers: Vec<String>,
    pub data: String,
    pub raw_file: String,
    pub list_file: String,
    pub default_scheme: String,
    pub json_output: bool,
    pub verbose: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            headers: Vec::new(),
            data: String::new(),
            raw_file: String::new(),
            list_file: String::new(),
            default_scheme: "https".to_string(),
            json_output: false,
            verbose: false,
        }
    }
}

impl ClassifyConfig {
    pub fn parsed_headers(&self) -> Headers {
        parse_custom_headers(&self.headers).into_iter().collect()
    }

    /// Builds the transport request described by `url`, `method`,
    /// `headers` and `data`.
    pub fn to_http_request(&self) -> Result<HttpRequest> {
        if self.url.is_empty() {
            return Err(anyhow!("no target URL configured"));
        }
        let url = Url::parse(&self.url).with_context(|| format!("invalid URL {:?}", self.url))?;
        let method = if self.method.is_empty() { "GET" } else { self.method.as_str() };
        let method = Method::from_bytes(method.as_bytes())
            .with_context(|| format!("invalid method {:?}", self.method))?;

        Ok(HttpRequest::new(url)
            .with_method(method)
            .with_headers(self.parsed_headers())
            .with_body(self.data.as_bytes()))
    }
}

/// Parses `Name: value` strings, dropping entries without a name.
pub fn parse_custom_headers(raw: &[String]) -> Vec<(String, String)> {
    raw.iter().filter_map(|h| {
        let mut parts = h.splitn(2, ':');
        let key = parts.next()?.trim().to_string();
        let val = parts.next().unwrap_or("").trim().to_string();
        if key.is_empty() { return None; }
        Some((key, val))
    }).collect()
}
