//! Body encoding and decoding.
//!
//! Encoding maps a request payload and its declared [`BodyKind`] to wire
//! bytes, defaulting the `content-type` header when it is absent. Decoding
//! maps response bytes to a [`Body`], either directly for an explicit
//! [`DecodeMode`] or by content-type sniffing for [`DecodeMode::Auto`]. The
//! sniffing tables are policy data ([`SniffPolicy`]), not hard-coded logic.

use bytes::Bytes;
use derive_more::Display;
use http::HeaderMap;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde_json::Value;

use crate::{Body, BodyKind, BodyShape, Error, Form, Payload, QueryPairs, RawResponse, Request, Response, Result};

/// The requested shape for a decoded response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum DecodeMode {
    /// Infer the shape from the response `Content-Type`.
    #[default]
    #[display("auto")]
    Auto,
    /// Decode as JSON.
    #[display("json")]
    Json,
    /// Decode as UTF-8 text.
    #[display("text")]
    Text,
    /// Decode as an opaque binary blob.
    #[display("blob")]
    Blob,
    /// Decode as a raw byte buffer.
    #[display("buffer")]
    Buffer,
    /// Decode as a multipart form.
    #[display("form")]
    Form,
    /// Decode as URL-encoded query pairs.
    #[display("query")]
    Query,
}

const MIME_JSON: &str = "application/json";
const MIME_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Subtypes decoded as text despite a non-`text/*` top-level type.
const DEFAULT_TEXT_SUBTYPES: &[&str] = &["application/base64", "application/plain", "application/xml"];

/// Top-level families decoded as binary blobs.
const DEFAULT_BLOB_FAMILIES: &[&str] =
    &["image", "video", "audio", "font", "model", "music", "x-music"];

/// Common binary, archive, and office subtypes decoded as binary blobs.
const DEFAULT_BLOB_SUBTYPES: &[&str] = &[
    "application/octet-stream",
    "application/mac-binary",
    "application/macbinary",
    "application/x-binary",
    "application/x-macbinary",
    "application/msword",
    "application/x-gtar",
    "application/x-compressed",
    "application/x-gzip",
    "application/x-midi",
    "application/x-frame",
    "application/pdf",
    "application/mspowerpoint",
    "application/vnd.ms-powerpoint",
    "application/powerpoint",
    "application/x-mspowerpoint",
    "application/x-tar",
    "application/gnutar",
    "application/world",
    "application/x-world",
    "application/wordperfect",
    "application/excel",
    "application/x-excel",
    "application/x-msexcel",
    "application/vnd.ms-excel",
    "application/x-compress",
    "application/x-zip-compressed",
    "application/zip",
    "application/x-7z-compressed",
    "application/x-rar-compressed",
    "application/x-gca-compressed",
    "application/x-lzh-compressed",
    "application/vnd.ms-cab-compressed",
    "application/x-ace-compressed",
    "application/x-cfs-compressed",
    "application/x-dgc-compressed",
    "application/x-java-archive",
];

/// Content-type heuristics for [`DecodeMode::Auto`].
///
/// The defaults follow common browser conventions; the boundaries of the
/// allow-lists are policy, so callers with unusual upstreams can swap them.
#[derive(Debug, Clone)]
pub struct SniffPolicy {
    /// Non-`text/*` subtypes still decoded as text.
    pub text_subtypes: Vec<String>,
    /// Top-level type families decoded as blobs.
    pub blob_families: Vec<String>,
    /// Exact subtypes decoded as blobs.
    pub blob_subtypes: Vec<String>,
}

impl Default for SniffPolicy {
    fn default() -> Self {
        Self {
            text_subtypes: DEFAULT_TEXT_SUBTYPES.iter().map(ToString::to_string).collect(),
            blob_families: DEFAULT_BLOB_FAMILIES.iter().map(ToString::to_string).collect(),
            blob_subtypes: DEFAULT_BLOB_SUBTYPES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl SniffPolicy {
    fn is_text(&self, essence: &str) -> bool {
        essence == "text"
            || essence.starts_with("text/")
            || self.text_subtypes.iter().any(|t| t == essence)
    }

    fn is_blob(&self, essence: &str) -> bool {
        let family = essence.split('/').next().unwrap_or(essence);
        self.blob_families.iter().any(|f| f == family)
            || self.blob_subtypes.iter().any(|t| t == essence)
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes the request payload into wire bytes.
///
/// Transport-native payload shapes pass through unchanged regardless of the
/// declared kind; structured values are converted per [`BodyKind`]. The
/// `content-type` header is defaulted only when absent.
pub fn encode(request: &mut Request) -> Result<Option<Bytes>> {
    let Some(payload) = request.payload().cloned() else {
        return Ok(None);
    };

    let bytes = match payload {
        Payload::Bytes(bytes) => bytes,
        Payload::Form(form) => {
            default_content_type(request.headers_mut(), &form.content_type())?;
            form.encode()
        }
        Payload::Query(pairs) => {
            default_content_type(request.headers_mut(), MIME_URLENCODED)?;
            Bytes::from(pairs.to_query_string())
        }
        Payload::Value(value) => encode_value(request, &value)?,
        Payload::Text(text) => encode_text(request, text)?,
    };

    Ok(Some(bytes))
}

fn encode_value(request: &mut Request, value: &Value) -> Result<Bytes> {
    match request.kind() {
        BodyKind::Json => {
            default_content_type(request.headers_mut(), MIME_JSON)?;
            Ok(Bytes::from(serde_json::to_vec(value)?))
        }
        BodyKind::Query => {
            default_content_type(request.headers_mut(), MIME_URLENCODED)?;
            if value.is_object() {
                let mut pairs = QueryPairs::new();
                pairs.append_object(value);
                Ok(Bytes::from(pairs.to_query_string()))
            } else {
                Ok(Bytes::from(value_to_text(value)))
            }
        }
        BodyKind::Form => {
            let form = form_from_value(value);
            default_content_type(request.headers_mut(), &form.content_type())?;
            Ok(form.encode())
        }
        BodyKind::Raw => Ok(Bytes::from(value_to_text(value))),
    }
}

fn encode_text(request: &mut Request, text: String) -> Result<Bytes> {
    match request.kind() {
        BodyKind::Json => {
            default_content_type(request.headers_mut(), MIME_JSON)?;
            Ok(Bytes::from(serde_json::to_vec(&text)?))
        }
        BodyKind::Query => {
            default_content_type(request.headers_mut(), MIME_URLENCODED)?;
            Ok(Bytes::from(text))
        }
        BodyKind::Form => {
            // Only object-shaped values contribute fields.
            let form = Form::new();
            default_content_type(request.headers_mut(), &form.content_type())?;
            Ok(form.encode())
        }
        BodyKind::Raw => Ok(Bytes::from(text)),
    }
}

/// Builds a multipart form from the fields of an object value.
///
/// Scalars are stringified, arrays and objects become JSON text, nulls are
/// skipped. Binary file parts are attached via a pre-built [`Payload::Form`].
fn form_from_value(value: &Value) -> Form {
    let mut form = Form::new();
    if let Value::Object(fields) = value {
        for (key, field) in fields {
            let text = match field {
                Value::Null => continue,
                other => value_to_text(other),
            };
            form = form.text(key.clone(), text);
        }
    }
    form
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn default_content_type(headers: &mut HeaderMap, value: &str) -> Result<()> {
    if headers.contains_key(CONTENT_TYPE) {
        return Ok(());
    }
    let value = http::HeaderValue::from_str(value)
        .map_err(|e| Error::invalid_request(e.to_string()))?;
    headers.insert(CONTENT_TYPE, value);
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes a response body into the requested shape.
///
/// Explicit modes decode directly; [`DecodeMode::Auto`] sniffs the
/// `Content-Type` using `policy`. Failures are [`Error::ReadBody`] classified
/// by the attempted shape.
pub fn decode(
    mode: DecodeMode,
    policy: &SniffPolicy,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Option<Body>> {
    match mode {
        DecodeMode::Auto => decode_auto(policy, headers, body),
        DecodeMode::Json => decode_json(body).map(Some),
        DecodeMode::Text => decode_text(body).map(Some),
        DecodeMode::Blob => Ok(Some(Body::Blob(body.clone()))),
        DecodeMode::Buffer => Ok(Some(Body::Buffer(body.clone()))),
        DecodeMode::Form => decode_form(headers, body).map(Some),
        DecodeMode::Query => decode_query(body).map(Some),
    }
}

/// Decodes a raw transport result into a tagged [`Response`].
///
/// On a successful status the body decodes into `data` and failures
/// propagate. On a non-success status the body is probed with an auto decode
/// for the diagnostic `err` payload; probe failures are swallowed so the
/// original status is never masked by a decode exception.
pub fn decode_response(raw: RawResponse, mode: DecodeMode, policy: &SniffPolicy) -> Result<Response> {
    let ok = raw.is_success();
    let (data, err) = if ok {
        (decode(mode, policy, &raw.headers, &raw.body)?, None)
    } else {
        let probed = decode(DecodeMode::Auto, policy, &raw.headers, &raw.body).unwrap_or(None);
        (None, probed)
    };
    Ok(Response::new(
        mode,
        data,
        err,
        raw.headers,
        ok,
        raw.status,
        raw.status_text,
        raw.url,
    ))
}

fn decode_auto(policy: &SniffPolicy, headers: &HeaderMap, body: &Bytes) -> Result<Option<Body>> {
    if content_length_is_zero(headers) {
        return Ok(None);
    }

    let Some(raw_content_type) = header_str(headers, &CONTENT_TYPE) else {
        return decode_text(body).map(Some);
    };
    let essence = essence_of(raw_content_type);

    let decoded = if essence == MIME_JSON || essence == "text/json" {
        // Checked before the text family, which would otherwise shadow
        // `text/json`.
        decode_json(body)?
    } else if policy.is_text(&essence) {
        decode_text(body)?
    } else if essence == MIME_URLENCODED {
        decode_query(body)?
    } else if policy.is_blob(&essence) {
        Body::Blob(body.clone())
    } else if essence == "multipart/form-data" {
        decode_form(headers, body)?
    } else {
        decode_text(body)?
    };
    Ok(Some(decoded))
}

fn decode_json(body: &Bytes) -> Result<Body> {
    serde_json::from_slice::<Value>(body)
        .map(Body::Json)
        .map_err(|e| Error::read_body(BodyShape::Json, e.to_string(), body.clone()))
}

fn decode_text(body: &Bytes) -> Result<Body> {
    std::str::from_utf8(body)
        .map(|text| Body::Text(text.to_string()))
        .map_err(|e| Error::read_body(BodyShape::Text, e.to_string(), body.clone()))
}

fn decode_query(body: &Bytes) -> Result<Body> {
    std::str::from_utf8(body)
        .map(|text| Body::Query(QueryPairs::from_encoded(text.as_bytes())))
        .map_err(|e| Error::read_body(BodyShape::Query, e.to_string(), body.clone()))
}

fn decode_form(headers: &HeaderMap, body: &Bytes) -> Result<Body> {
    let content_type = header_str(headers, &CONTENT_TYPE).unwrap_or_default();
    Form::parse(content_type, body)
        .map(Body::Form)
        .map_err(|message| Error::read_body(BodyShape::Form, message, body.clone()))
}

fn content_length_is_zero(headers: &HeaderMap) -> bool {
    header_str(headers, &CONTENT_LENGTH)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .is_some_and(|length| length == 0)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Lowercased content type with parameters stripped (`;` onward).
fn essence_of(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}
