//! Classification of raw HTTP transactions into fuzzable requests.
//!
//! The decision is ordered and the first match wins:
//!
//! 1. an empty body gives a query-string request built from the URL;
//! 2. a `multipart/form-data` content type must carry a usable boundary,
//!    otherwise nothing is produced;
//! 3. a URL-encoded form content type is decoded as such;
//! 4. a JSON content type is decoded as JSON;
//! 5. anything else is only accepted if the body is an XML-RPC `methodCall`.
//!
//! A declared content type is never second-guessed: when its codec rejects
//! the body the classification fails instead of trying another format.

use log::debug;
use url::Url;

use crate::codec::{
    AnyCodec, BodyCodec, JsonCodec, MultipartCodec, QueryStringCodec, UrlEncodedCodec,
    XmlRpcCodec,
};
use crate::core::params::Parameters;
use crate::core::request::FuzzableRequest;
use crate::http::{Headers, TransportRequest};
use crate::utils::content_type::MediaType;

const DEFAULT_METHOD: &str = "GET";

/// Runs `codec` over `body`, logging why it refused the body if it does.
fn decode_body(mut codec: AnyCodec, body: &[u8]) -> Option<(AnyCodec, Parameters)> {
    match codec.decode(body) {
        Ok(params) => Some((codec, params)),
        Err(e) => {
            debug!("Body rejected as {}: {}", codec.kind(), e);
            None
        }
    }
}

/// Builds the fuzzable request that models `(url, method, headers, body)`,
/// or `None` when the transaction cannot be modeled as one.
///
/// `method` defaults to `GET` and `headers` to an empty collection. The
/// supplied URL, method and headers are kept as they are, except for
/// multipart requests, which only echo their `Content-Type` header.
pub fn create_fuzzable_request_from_parts(
    url: &Url,
    method: Option<&str>,
    headers: Option<&Headers>,
    post_data: &[u8],
) -> Option<FuzzableRequest> {
    let method = method.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_METHOD);
    let headers = headers.cloned().unwrap_or_default();

    if post_data.is_empty() {
        let query = url.query().unwrap_or("").as_bytes();
        let (codec, params) = decode_body(AnyCodec::QueryString(QueryStringCodec::new()), query)?;
        debug!("{} {} has no body, {} query parameter(s)", method, url, params.len());
        return Some(FuzzableRequest::new(url.clone(), method, headers, params, codec));
    }

    let content_type = headers
        .get_entry("content-type")
        .map(|(name, value)| (name.to_string(), value.to_string()));
    let media_type = content_type
        .as_ref()
        .and_then(|(_, value)| MediaType::parse(value));

    let (codec, params, headers) = match (&content_type, media_type) {
        (Some((name, value)), Some(mt)) if mt.is_multipart_form() => {
            let codec = match MultipartCodec::from_content_type(value) {
                Ok(codec) => codec,
                Err(e) => {
                    debug!("Refusing multipart body for {}: {}", url, e);
                    return None;
                }
            };
            let (codec, params) = decode_body(AnyCodec::Multipart(codec), post_data)?;
            let echoed = Headers::from(vec![(name.clone(), value.clone())]);
            (codec, params, echoed)
        }
        (_, Some(mt)) if mt.is_urlencoded_form() => {
            let (codec, params) = decode_body(AnyCodec::UrlEncoded(UrlEncodedCodec::new()), post_data)?;
            (codec, params, headers)
        }
        (_, Some(mt)) if mt.is_json() => {
            let (codec, params) = decode_body(AnyCodec::Json(JsonCodec::new()), post_data)?;
            (codec, params, headers)
        }
        _ => {
            let (codec, params) = decode_body(AnyCodec::XmlRpc(XmlRpcCodec::new()), post_data)?;
            (codec, params, headers)
        }
    };

    debug!(
        "{} {} classified as {} with {} parameter(s)",
        method,
        url,
        codec.kind(),
        params.len()
    );
    Some(FuzzableRequest::new(url.clone(), method, headers, params, codec))
}

/// Builds the fuzzable request for an already constructed transport request.
pub fn create_fuzzable_request_from_request<R: TransportRequest + ?Sized>(
    request: &R,
) -> Option<FuzzableRequest> {
    let headers = request.headers();
    create_fuzzable_request_from_parts(
        request.url(),
        Some(request.method().as_str()),
        Some(&headers),
        request.body(),
    )
}
