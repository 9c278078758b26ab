//! Body codecs: one per supported request encoding.
//!
//! A codec turns raw bytes into [`Parameters`] and back. Decoding primes
//! the codec with whatever structure it needs to re-encode later (the JSON
//! document, the XML-RPC call), so a codec instance belongs to exactly one
//! request.

pub mod json;
pub mod multipart;
pub mod querystring;
pub mod urlencoded;
pub mod xmlrpc;

pub use json::JsonCodec;
pub use multipart::{multipart_encode, MultipartCodec};
pub use querystring::QueryStringCodec;
pub use urlencoded::UrlEncodedCodec;
pub use xmlrpc::XmlRpcCodec;

use thiserror::Error;

use crate::core::params::Parameters;
use crate::core::RequestKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("body is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed {format} body: {reason}")]
    Malformed { format: &'static str, reason: String },

    #[error("body is not {0}")]
    NotThisFormat(&'static str),

    #[error("multipart content-type has no usable boundary parameter")]
    MissingBoundary,

    #[error("parameter {name:?} has no place in the decoded {format} body")]
    UnknownParameter { format: &'static str, name: String },

    #[error("{0} codec has not decoded a body yet")]
    NotDecoded(&'static str),
}

impl DecodeError {
    pub(crate) fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            format,
            reason: reason.into(),
        }
    }
}

/// Capability shared by every body encoding.
pub trait BodyCodec {
    /// The request variant this codec produces.
    fn kind(&self) -> RequestKind;

    /// Decodes `body` into parameters.
    fn decode(&mut self, body: &[u8]) -> Result<Parameters, DecodeError>;

    /// Serializes `params` back into a body of this encoding.
    fn encode(&self, params: &Parameters) -> Result<Vec<u8>, DecodeError>;
}

/// The codec attached to a built request.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyCodec {
    QueryString(QueryStringCodec),
    UrlEncoded(UrlEncodedCodec),
    Multipart(MultipartCodec),
    Json(JsonCodec),
    XmlRpc(XmlRpcCodec),
}

impl AnyCodec {
    fn inner(&self) -> &dyn BodyCodec {
        match self {
            AnyCodec::QueryString(c) => c,
            AnyCodec::UrlEncoded(c) => c,
            AnyCodec::Multipart(c) => c,
            AnyCodec::Json(c) => c,
            AnyCodec::XmlRpc(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn BodyCodec {
        match self {
            AnyCodec::QueryString(c) => c,
            AnyCodec::UrlEncoded(c) => c,
            AnyCodec::Multipart(c) => c,
            AnyCodec::Json(c) => c,
            AnyCodec::XmlRpc(c) => c,
        }
    }
}

impl BodyCodec for AnyCodec {
    fn kind(&self) -> RequestKind {
        self.inner().kind()
    }

    fn decode(&mut self, body: &[u8]) -> Result<Parameters, DecodeError> {
        self.inner_mut().decode(body)
    }

    fn encode(&self, params: &Parameters) -> Result<Vec<u8>, DecodeError> {
        self.inner().encode(params)
    }
}
