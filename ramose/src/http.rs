//! The minimal request/response contract the Operation Executor exposes to
//! an HTTP adapter (see `ramose_actix`).
//!

/// An inbound API call, already stripped of its scheme/host: the path
/// (including the configured `base_url`) and the raw, still-percent-encoded
/// query string (without a leading `?`).
///
#[derive(Clone, Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: String,
    /// The content type to return when the request's own `format` query
    /// parameter doesn't override it (e.g. the CLI's `--format` flag, or
    /// an HTTP adapter's reading of the `Accept` header).
    pub default_content_type: String,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: query.into(),
            default_content_type: "application/json".to_string(),
        }
    }

    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }
}

/// The Executor's response: an HTTP status, a body already serialized into
/// the requested format, and that format's content type.
///
#[derive(Clone, Debug)]
pub struct Response {
    pub status: u16,
    pub body: String,
    pub content_type: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: content_type.into(),
        }
    }
}
