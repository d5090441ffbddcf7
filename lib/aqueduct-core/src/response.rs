//! The completed response record.

use bytes::Bytes;
use http::HeaderMap;
use url::Url;

use crate::{DecodeMode, Form, QueryPairs, Result};

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A JSON value.
    Json(serde_json::Value),
    /// UTF-8 text.
    Text(String),
    /// An opaque binary blob.
    Blob(Bytes),
    /// A raw byte buffer.
    Buffer(Bytes),
    /// A multipart form.
    Form(Form),
    /// URL-encoded query pairs.
    Query(QueryPairs),
}

impl Body {
    /// The text content, if this body decoded as text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The JSON value, if this body decoded as JSON.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The raw bytes, if this body decoded as a blob or buffer.
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Blob(bytes) | Self::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deserializes a JSON body into a typed value.
    ///
    /// Errors carry the path to the failing field.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        match self {
            Self::Json(value) => serde_path_to_error::deserialize(value.clone()).map_err(|e| {
                crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
            }),
            other => Err(crate::Error::json_deserialization(
                String::new(),
                format!("body is not JSON (decoded as {})", other.shape_name()),
            )),
        }
    }

    fn shape_name(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Buffer(_) => "buffer",
            Self::Form(_) => "form",
            Self::Query(_) => "query",
        }
    }
}

/// The raw, undecoded result of a transport exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Status text (canonical reason phrase).
    pub status_text: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Final resolved URL.
    pub url: Url,
    /// Buffered body bytes.
    pub body: Bytes,
}

impl RawResponse {
    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// A completed HTTP response.
///
/// `data` holds the decoded body of a successful exchange; `err` holds the
/// diagnostically-decoded body of a non-success one. The two are never both
/// set. The decode-mode tag records which decode produced the response and is
/// immutable once set.
#[derive(Debug, Clone)]
pub struct Response {
    data: Option<Body>,
    err: Option<Body>,
    headers: HeaderMap,
    ok: bool,
    status: u16,
    status_text: String,
    url: Url,
    mode: DecodeMode,
}

impl Response {
    /// Creates a response.
    #[must_use]
    #[allow(clippy::fn_params_excessive_bools)]
    pub fn new(
        mode: DecodeMode,
        data: Option<Body>,
        err: Option<Body>,
        headers: HeaderMap,
        ok: bool,
        status: u16,
        status_text: impl Into<String>,
        url: Url,
    ) -> Self {
        Self {
            data,
            err,
            headers,
            ok,
            status,
            status_text: status_text.into(),
            url,
            mode,
        }
    }

    /// The decoded body, if the exchange succeeded and had one.
    #[must_use]
    pub const fn data(&self) -> Option<&Body> {
        self.data.as_ref()
    }

    /// The diagnostic error body of a non-success exchange, if decodable.
    #[must_use]
    pub const fn err(&self) -> Option<&Body> {
        self.err.as_ref()
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Single header value by name, if valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.ok
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Status text.
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Final resolved URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// The decode mode that produced this response.
    #[must_use]
    pub const fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Deserializes the data body as typed JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        match &self.data {
            Some(body) => body.json(),
            None => Err(crate::Error::json_deserialization(
                String::new(),
                "response has no data body",
            )),
        }
    }

    /// The data body as text, if it decoded as text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.data.as_ref().and_then(Body::as_text)
    }

    /// The data body as raw bytes, if it decoded as a blob or buffer.
    #[must_use]
    pub fn bytes(&self) -> Option<&Bytes> {
        self.data.as_ref().and_then(Body::as_bytes)
    }

    /// Applies a partial override record.
    ///
    /// Headers are appended; every other present field replaces the current
    /// value. The decode-mode tag cannot be overridden.
    pub fn merge(&mut self, patch: ResponsePatch) {
        if let Some(data) = patch.data {
            self.data = Some(data);
        }
        if let Some(err) = patch.err {
            self.err = Some(err);
        }
        for (name, value) in &patch.headers {
            self.headers.append(name.clone(), value.clone());
        }
        if let Some(ok) = patch.ok {
            self.ok = ok;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(status_text) = patch.status_text {
            self.status_text = status_text;
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
    }
}

/// A partial response record, applied with [`Response::merge`].
#[derive(Debug, Clone, Default)]
pub struct ResponsePatch {
    /// Replacement data body.
    pub data: Option<Body>,
    /// Replacement error body.
    pub err: Option<Body>,
    /// Headers to append.
    pub headers: HeaderMap,
    /// Replacement success flag.
    pub ok: Option<bool>,
    /// Replacement status code.
    pub status: Option<u16>,
    /// Replacement status text.
    pub status_text: Option<String>,
    /// Replacement URL.
    pub url: Option<Url>,
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use serde_json::json;

    use super::*;

    fn response(data: Option<Body>) -> Response {
        Response::new(
            DecodeMode::Auto,
            data,
            None,
            HeaderMap::new(),
            true,
            200,
            "OK",
            Url::parse("https://api.example.com/x").expect("url"),
        )
    }

    #[test]
    fn typed_json_access() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Item {
            id: u64,
        }

        let res = response(Some(Body::Json(json!({"id": 7}))));
        check!(res.json::<Item>().expect("json") == Item { id: 7 });
    }

    #[test]
    fn typed_json_error_carries_path() {
        let res = response(Some(Body::Json(json!({"user": {"age": "old"}}))));

        #[derive(Debug, serde::Deserialize)]
        struct Outer {
            #[allow(dead_code)]
            user: Inner,
        }
        #[derive(Debug, serde::Deserialize)]
        struct Inner {
            #[allow(dead_code)]
            age: u32,
        }

        let_assert!(Err(err) = res.json::<Outer>());
        check!(err.to_string().contains("user.age"));
    }

    #[test]
    fn json_on_text_body_fails() {
        let res = response(Some(Body::Text("hello".to_string())));
        let_assert!(Err(err) = res.json::<serde_json::Value>());
        check!(err.to_string().contains("not JSON"));
    }

    #[test]
    fn merge_keeps_mode_and_appends_headers() {
        let mut res = response(Some(Body::Text("hi".to_string())));
        let mut patch = ResponsePatch {
            status: Some(204),
            ..ResponsePatch::default()
        };
        patch.headers.append(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("no-store"),
        );
        res.merge(patch);

        check!(res.status() == 204);
        check!(res.mode() == DecodeMode::Auto);
        check!(res.header("cache-control") == Some("no-store"));
        check!(res.text() == Some("hi"));
    }
}
