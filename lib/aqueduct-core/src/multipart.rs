//! Multipart form data: building for uploads, parsing for decoded responses.

use bytes::{BufMut, Bytes, BytesMut};

/// A single part in a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Part {
    /// Creates a part with the given field name and data.
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            data: data.into(),
        }
    }

    /// Creates a text field part.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Bytes::from(value.into()))
    }

    /// Creates a file part; the content type is guessed from the extension.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let filename = filename.into();
        let content_type = guess_content_type(&filename).to_string();
        Self {
            name: name.into(),
            filename: Some(filename),
            content_type: Some(content_type),
            data: data.into(),
        }
    }

    /// Overrides the filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Overrides the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filename, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Content type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Part data.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Part data as UTF-8 text, if valid.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// Guess a content type from a filename extension.
fn guess_content_type(filename: &str) -> &'static str {
    let extension = filename.rsplit('.').next().unwrap_or_default();
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// A multipart form: an ordered list of parts plus a boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    parts: Vec<Part>,
    boundary: String,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    /// Creates an empty form with a fresh boundary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parts: Vec::new(),
            boundary: generate_boundary(),
        }
    }

    /// Creates an empty form with an explicit boundary.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            parts: Vec::new(),
            boundary: boundary.into(),
        }
    }

    /// Adds a part.
    #[must_use]
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Adds a text field.
    #[must_use]
    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.part(Part::text(name, value))
    }

    /// Adds a file field.
    #[must_use]
    pub fn file(
        self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.part(Part::file(name, filename, data))
    }

    /// The boundary string.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The parts, in order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// The first part with the given field name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// The `Content-Type` header value for this form.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encodes the form into wire bytes.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for part in &self.parts {
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\n");

            buf.put_slice(b"Content-Disposition: form-data; name=\"");
            buf.put_slice(part.name.as_bytes());
            buf.put_slice(b"\"");
            if let Some(filename) = &part.filename {
                buf.put_slice(b"; filename=\"");
                buf.put_slice(filename.as_bytes());
                buf.put_slice(b"\"");
            }
            buf.put_slice(b"\r\n");

            if let Some(content_type) = &part.content_type {
                buf.put_slice(b"Content-Type: ");
                buf.put_slice(content_type.as_bytes());
                buf.put_slice(b"\r\n");
            }

            buf.put_slice(b"\r\n");
            buf.put_slice(&part.data);
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");
        buf.freeze()
    }

    /// Parses a `multipart/form-data` body.
    ///
    /// `content_type` must carry a `boundary` parameter.
    ///
    /// # Errors
    ///
    /// Returns a message describing the malformation; the caller wraps it in
    /// the appropriate read error.
    pub fn parse(content_type: &str, body: &[u8]) -> Result<Self, String> {
        let boundary = content_type
            .split(';')
            .map(str::trim)
            .find_map(|param| param.strip_prefix("boundary="))
            .map(|b| b.trim_matches('"'))
            .ok_or_else(|| "missing boundary parameter".to_string())?;
        if boundary.is_empty() {
            return Err("empty boundary parameter".to_string());
        }

        let delimiter = format!("--{boundary}");
        let mut parts = Vec::new();
        let mut sections = split_on(body, delimiter.as_bytes());
        // Preamble before the first delimiter is ignored.
        sections.next();
        for section in sections {
            // The closing delimiter starts with "--".
            if section.starts_with(b"--") {
                break;
            }
            let section = strip_crlf(section);
            let (head, data) = split_once_on(section, b"\r\n\r\n")
                .ok_or_else(|| "part without header/body separator".to_string())?;
            let part = parse_part(head, data)?;
            parts.push(part);
        }

        Ok(Self {
            parts,
            boundary: boundary.to_string(),
        })
    }
}

fn parse_part(head: &[u8], data: &[u8]) -> Result<Part, String> {
    let head = std::str::from_utf8(head).map_err(|e| format!("malformed part headers: {e}"))?;

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in head.split("\r\n") {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if header.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').map(str::trim) {
                if let Some(v) = param.strip_prefix("name=") {
                    name = Some(v.trim_matches('"').to_string());
                } else if let Some(v) = param.strip_prefix("filename=") {
                    filename = Some(v.trim_matches('"').to_string());
                }
            }
        } else if header.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        }
    }

    let name = name.ok_or_else(|| "part without a field name".to_string())?;
    Ok(Part {
        name,
        filename,
        content_type,
        data: Bytes::copy_from_slice(data),
    })
}

/// Splits `haystack` on every occurrence of `needle`.
fn split_on<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = &'a [u8]> {
    let mut rest = Some(haystack);
    std::iter::from_fn(move || {
        let current = rest.take()?;
        match find_subslice(current, needle) {
            Some(at) => {
                let (before, after) = current.split_at(at);
                rest = after.get(needle.len()..);
                Some(before)
            }
            None => Some(current),
        }
    })
}

fn split_once_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Option<(&'a [u8], &'a [u8])> {
    let at = find_subslice(haystack, needle)?;
    let (before, after) = haystack.split_at(at);
    Some((before, after.get(needle.len()..).unwrap_or_default()))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn strip_crlf(section: &[u8]) -> &[u8] {
    let section = section.strip_prefix(b"\r\n".as_slice()).unwrap_or(section);
    section.strip_suffix(b"\r\n".as_slice()).unwrap_or(section)
}

/// Generate a boundary unlikely to collide with part data.
fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    format!("----AqueductBoundary{timestamp:x}")
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    #[test]
    fn part_constructors() {
        let part = Part::text("field", "value");
        check!(part.name() == "field");
        check!(part.as_text() == Some("value"));
        check!(part.content_type().is_none());

        let part = Part::file("upload", "photo.jpg", vec![0xFF, 0xD8]);
        check!(part.filename() == Some("photo.jpg"));
        check!(part.content_type() == Some("image/jpeg"));
    }

    #[test]
    fn form_encode_layout() {
        let form = Form::with_boundary("bnd123")
            .text("field", "value")
            .file("upload", "notes.txt", "file content");

        let body = String::from_utf8(form.encode().to_vec()).expect("utf8");
        check!(body.contains("--bnd123\r\n"));
        check!(body.contains("Content-Disposition: form-data; name=\"field\"\r\n"));
        check!(body.contains("name=\"upload\"; filename=\"notes.txt\""));
        check!(body.contains("Content-Type: text/plain\r\n"));
        check!(body.contains("value\r\n"));
        check!(body.ends_with("--bnd123--\r\n"));
    }

    #[test]
    fn parse_two_part_body() {
        let body = b"--xyz\r\n\
            Content-Disposition: form-data; name=\"greeting\"\r\n\
            \r\n\
            hello\r\n\
            --xyz\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.bin\"\r\n\
            Content-Type: application/octet-stream\r\n\
            \r\n\
            \x01\x02\x03\r\n\
            --xyz--\r\n";

        let form =
            Form::parse("multipart/form-data; boundary=xyz", body.as_slice()).expect("parse");
        check!(form.parts().len() == 2);
        let_assert!(Some(greeting) = form.field("greeting"));
        check!(greeting.as_text() == Some("hello"));
        let_assert!(Some(upload) = form.field("upload"));
        check!(upload.filename() == Some("a.bin"));
        check!(upload.content_type() == Some("application/octet-stream"));
        check!(upload.data().as_ref() == &[1, 2, 3]);
    }

    #[test]
    fn parse_rejects_missing_boundary() {
        let_assert!(Err(message) = Form::parse("multipart/form-data", b"body"));
        check!(message.contains("boundary"));
    }

    #[test]
    fn parse_quoted_boundary() {
        let body = b"--q1\r\n\
            Content-Disposition: form-data; name=\"k\"\r\n\
            \r\n\
            v\r\n\
            --q1--\r\n";
        let form =
            Form::parse("multipart/form-data; boundary=\"q1\"", body.as_slice()).expect("parse");
        check!(form.boundary() == "q1");
        check!(form.field("k").and_then(Part::as_text) == Some("v"));
    }

    #[test]
    fn guess_content_type_known_and_unknown() {
        check!(guess_content_type("a.PNG") == "image/png");
        check!(guess_content_type("b.unknown") == "application/octet-stream");
    }
}
