//! Parsing of raw HTTP/1.x request dumps, as exported by intercepting
//! proxies, into an [`HttpRequest`].

use anyhow::{anyhow, Context, Result};
use log::debug;
use reqwest::Method;
use url::Url;

use super::{Headers, HttpRequest};

const MAX_HEADERS: usize = 64;

/// Request line and headers of a dump, plus the length of the head.
struct Head {
    method: Method,
    target: String,
    headers: Headers,
    len: usize,
}

/// Parses the head with `httparse`. `None` means the head never ends.
fn parse_head(raw: &[u8]) -> Result<Option<Head>> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut slots);
    let len = match req.parse(raw).context("malformed request head")? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let method = req.method.ok_or_else(|| anyhow!("missing request method"))?;
    let method = Method::from_bytes(method.as_bytes())
        .with_context(|| format!("invalid method {:?}", method))?;
    let target = req
        .path
        .ok_or_else(|| anyhow!("missing request target"))?
        .to_string();

    let mut headers = Headers::new();
    for header in req.headers.iter() {
        headers.append(header.name, String::from_utf8_lossy(header.value).trim());
    }

    Ok(Some(Head {
        method,
        target,
        headers,
        len,
    }))
}

/// Parses a raw HTTP/1.x request.
///
/// Origin-form targets (`/path?q=1`) are resolved against the `Host` header
/// using `default_scheme`; absolute-form targets are used as they are. A dump
/// whose head is not closed by an empty line has no body.
pub fn parse_raw_request(raw: &[u8], default_scheme: &str) -> Result<HttpRequest> {
    let (head, body) = match parse_head(raw)? {
        Some(head) => {
            let body = &raw[head.len..];
            (head, body)
        }
        None => {
            let mut closed = raw.to_vec();
            closed.extend_from_slice(b"\r\n\r\n");
            let head = parse_head(&closed)?.ok_or_else(|| anyhow!("missing request line"))?;
            (head, &[][..])
        }
    };
    let Head {
        method,
        target,
        headers,
        ..
    } = head;

    let url = if target.contains("://") {
        Url::parse(&target).with_context(|| format!("invalid request target {:?}", target))?
    } else {
        let host = headers
            .get("host")
            .ok_or_else(|| anyhow!("origin-form target {:?} requires a Host header", target))?;
        let absolute = format!("{}://{}{}", default_scheme, host, target);
        Url::parse(&absolute).with_context(|| format!("invalid request target {:?}", absolute))?
    };

    debug!("Parsed raw {} request for {} ({} body bytes)", method, url, body.len());

    Ok(HttpRequest {
        method,
        url,
        headers,
        body: body.to_vec(),
    })
}
