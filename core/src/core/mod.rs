pub mod factory;
pub mod params;
pub mod request;

use serde::Serialize;

/// Which encoding a fuzzable request's parameters were decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequestKind {
    QueryString,
    UrlEncoded,
    Multipart,
    Json,
    XmlRpc,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::QueryString => write!(f, "Query-String Request"),
            RequestKind::UrlEncoded => write!(f, "URL-Encoded Post Request"),
            RequestKind::Multipart => write!(f, "Multipart Request"),
            RequestKind::Json => write!(f, "JSON Post Data Request"),
            RequestKind::XmlRpc => write!(f, "XML-RPC Request"),
        }
    }
}
