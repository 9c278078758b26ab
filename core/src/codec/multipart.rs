use log::debug;
use rand::distr::Alphanumeric;
use rand::Rng;

use super::{BodyCodec, DecodeError};
use crate::core::params::Parameters;
use crate::core::RequestKind;
use crate::utils::content_type::{parse_header_params, MediaType};

const FORMAT: &str = "multipart";

/// `multipart/form-data` bodies delimited by a fixed boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartCodec {
    boundary: String,
    /// `(field, filename)` of every decoded file upload.
    files: Vec<(String, String)>,
}

impl MultipartCodec {
    pub fn new(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            files: Vec::new(),
        }
    }

    /// Builds a codec from a `Content-Type` header value. Fails with
    /// [`DecodeError::MissingBoundary`] unless the value is
    /// `multipart/form-data` with a usable boundary.
    pub fn from_content_type(value: &str) -> Result<Self, DecodeError> {
        MediaType::parse(value)
            .filter(MediaType::is_multipart_form)
            .and_then(|mt| mt.boundary().map(Self::new))
            .ok_or(DecodeError::MissingBoundary)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `Content-Type` header value matching this codec's output.
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", mime::MULTIPART_FORM_DATA, self.boundary)
    }

    /// File name sent for `field`, if it was decoded as an upload.
    pub fn file_name(&self, field: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, file)| file.as_str())
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// Skips transport padding and the line break that must follow a
/// delimiter. Returns the index of the first byte of the next line.
fn skip_line_end(body: &[u8], mut pos: usize) -> Result<usize, DecodeError> {
    while matches!(body.get(pos), Some(b' ') | Some(b'\t')) {
        pos += 1;
    }
    if body[pos..].starts_with(b"\r\n") {
        Ok(pos + 2)
    } else if body[pos..].starts_with(b"\n") {
        Ok(pos + 1)
    } else {
        Err(DecodeError::malformed(FORMAT, "delimiter is not followed by a line break"))
    }
}

/// Splits a part into its header block and its content.
fn split_part(part: &[u8]) -> Result<(&str, &[u8]), DecodeError> {
    let (head_end, sep_len) = match (find(part, b"\r\n\r\n", 0), find(part, b"\n\n", 0)) {
        (Some(a), Some(b)) if b < a => (b, 2),
        (Some(a), _) => (a, 4),
        (None, Some(b)) => (b, 2),
        (None, None) => {
            return Err(DecodeError::malformed(FORMAT, "part has no header block"));
        }
    };
    let head = std::str::from_utf8(&part[..head_end]).map_err(|_| DecodeError::InvalidUtf8)?;
    Ok((head, &part[head_end + sep_len..]))
}

/// Extracts `(name, filename)` from a part's header block.
fn disposition(head: &str) -> Result<(String, Option<String>), DecodeError> {
    let value = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-disposition"))
        .map(|(_, value)| value.trim())
        .ok_or_else(|| DecodeError::malformed(FORMAT, "part has no Content-Disposition"))?;

    let (kind, params) = parse_header_params(value);
    if kind != "form-data" {
        return Err(DecodeError::malformed(
            FORMAT,
            format!("unexpected disposition {:?}", kind),
        ));
    }
    let param = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| unquote_param(v))
    };
    let name = param("name")
        .ok_or_else(|| DecodeError::malformed(FORMAT, "part has no field name"))?;
    Ok((name, param("filename")))
}

/// Escapes a field or file name the way browsers do inside
/// `Content-Disposition` quoted strings.
fn quote_param(value: &str) -> String {
    value.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

fn unquote_param(value: &str) -> String {
    value.replace("%22", "\"").replace("%0D", "\r").replace("%0A", "\n")
}

impl BodyCodec for MultipartCodec {
    fn kind(&self) -> RequestKind {
        RequestKind::Multipart
    }

    fn decode(&mut self, body: &[u8]) -> Result<Parameters, DecodeError> {
        let delimiter = format!("--{}", self.boundary).into_bytes();
        let inner_delimiter = [b"\n".as_slice(), delimiter.as_slice()].concat();

        let mut pos = if body.starts_with(&delimiter) {
            delimiter.len()
        } else {
            find(body, &inner_delimiter, 0)
                .map(|i| i + inner_delimiter.len())
                .ok_or_else(|| DecodeError::malformed(FORMAT, "boundary never appears in body"))?
        };

        let mut params = Parameters::new();
        let mut files = Vec::new();
        loop {
            if body[pos..].starts_with(b"--") {
                break;
            }
            let start = skip_line_end(body, pos)?;
            let next = find(body, &inner_delimiter, start)
                .ok_or_else(|| DecodeError::malformed(FORMAT, "missing closing delimiter"))?;
            let end = if next > start && body[next - 1] == b'\r' { next - 1 } else { next };

            let (head, content) = split_part(&body[start..end])?;
            let (name, filename) = disposition(head)?;
            if let Some(filename) = filename {
                files.push((name.clone(), filename));
            }
            params.append(name, String::from_utf8_lossy(content).into_owned());

            pos = next + inner_delimiter.len();
        }

        debug!(
            "Decoded {} multipart field(s), {} upload(s), boundary {:?}",
            params.len(),
            files.len(),
            self.boundary
        );
        self.files = files;
        Ok(params)
    }

    fn encode(&self, params: &Parameters) -> Result<Vec<u8>, DecodeError> {
        let mut body = Vec::new();
        for (name, value) in params.pairs() {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", quote_param(name));
            if let Some(filename) = self.file_name(name) {
                disposition.push_str(&format!(
                    "; filename=\"{}\"\r\nContent-Type: application/octet-stream",
                    quote_param(filename)
                ));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n\r\n");
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Ok(body)
    }
}

/// Encodes plain form fields with a freshly generated boundary. Returns the
/// boundary and the body.
pub fn multipart_encode<K: AsRef<str>, V: AsRef<str>>(fields: &[(K, V)]) -> (String, Vec<u8>) {
    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    let boundary = format!("------------------------{}", token);

    let params: Parameters = fields
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .collect();
    let codec = MultipartCodec::new(boundary.clone());
    let body = codec.encode(&params).unwrap_or_default();
    (boundary, body)
}
