//! HTTP method types.

use derive_more::Display;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Method {
    /// GET method.
    #[display("GET")]
    Get,
    /// POST method.
    #[display("POST")]
    Post,
    /// PUT method.
    #[display("PUT")]
    Put,
    /// DELETE method.
    #[display("DELETE")]
    Delete,
    /// PATCH method.
    #[display("PATCH")]
    Patch,
    /// HEAD method.
    #[display("HEAD")]
    Head,
    /// OPTIONS method.
    #[display("OPTIONS")]
    Options,
}

impl Method {
    /// Returns `true` if the method is read-only by convention.
    #[must_use]
    pub const fn is_safe(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }

    /// Returns `true` if repeating the request has the same effect as
    /// sending it once.
    #[must_use]
    pub const fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Self::Get | Self::Head | Self::Options | Self::Put | Self::Delete
        )
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
            Method::Patch => Self::PATCH,
            Method::Head => Self::HEAD,
            Method::Options => Self::OPTIONS,
        }
    }
}

impl TryFrom<http::Method> for Method {
    type Error = crate::Error;

    fn try_from(method: http::Method) -> Result<Self, Self::Error> {
        match method.as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(crate::Error::invalid_request(format!(
                "unsupported HTTP method: {other}"
            ))),
        }
    }
}
