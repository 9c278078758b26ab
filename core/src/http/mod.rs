pub mod headers;
pub mod raw;

pub use headers::Headers;

use reqwest::Method;
use url::Url;

/// Represents an HTTP request with all its components.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Creates a GET request with no headers and no body.
    pub fn new(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Converts into a `reqwest::Request` ready to be executed by a client.
    /// Headers reqwest refuses are dropped with a warning.
    pub fn to_reqwest(&self) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.to_header_map();
        if !self.body.is_empty() {
            *request.body_mut() = Some(self.body.clone().into());
        }
        request
    }
}

/// Read access to an already built, transport-level request.
pub trait TransportRequest {
    fn url(&self) -> &Url;
    fn method(&self) -> &Method;
    fn headers(&self) -> Headers;
    fn body(&self) -> &[u8];
}

impl TransportRequest for HttpRequest {
    fn url(&self) -> &Url {
        &self.url
    }

    fn method(&self) -> &Method {
        &self.method
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}

impl TransportRequest for reqwest::Request {
    fn url(&self) -> &Url {
        reqwest::Request::url(self)
    }

    fn method(&self) -> &Method {
        reqwest::Request::method(self)
    }

    fn headers(&self) -> Headers {
        Headers::from_header_map(reqwest::Request::headers(self))
    }

    /// Streaming bodies cannot be inspected without consuming them and are
    /// treated as empty.
    fn body(&self) -> &[u8] {
        reqwest::Request::body(self)
            .and_then(|body| body.as_bytes())
            .unwrap_or(&[])
    }
}
