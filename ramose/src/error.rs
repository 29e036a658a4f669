//! The ramose error type.
//!

use std::fmt::Display;

/// Create an [`Error`] variant that wraps another error's `Display` text.
///
/// ```text
/// map_error!(Internal, some_fallible_call())
/// ```
/// is shorthand for
/// ```text
/// some_fallible_call().map_err(|e| Error::Internal(e.to_string()))
/// ```
///
#[macro_export]
macro_rules! map_error {
    ($variant: ident, $result: expr $( , )? ) => {
        ($result).map_err(|e| $crate::Error::$variant(e.to_string()))
    };
}

/// Ramose's error type, one variant per error kind in the specification's
/// failure classification.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Startup-time: a malformed Hash-Format document, a missing required
    /// header field, or an unresolvable addon reference. Fatal.
    ///
    Config(String),

    /// No operation matched the request path.
    ///
    NotFound,

    /// An operation matched, but not for the request's HTTP method.
    ///
    MethodNotAllowed,

    /// A path parameter failed type coercion, or an addon raised what looks
    /// like a type error during pre/postprocess.
    ///
    BadParameter(String),

    /// The remote SPARQL endpoint did not respond in time.
    ///
    Timeout,

    /// The remote endpoint returned a non-2xx response.
    ///
    Upstream { status: u16, reason: String },

    /// Anything else.
    ///
    Internal(String),
}

impl Error {
    /// Create an [`Error::Config`].
    ///
    pub fn config<T: Display>(text: T) -> Self {
        Self::Config(text.to_string())
    }

    /// Create an [`Error::BadParameter`].
    ///
    pub fn bad_parameter<T: Display>(text: T) -> Self {
        Self::BadParameter(text.to_string())
    }

    /// Create an [`Error::Internal`].
    ///
    pub fn internal<T: Display>(text: T) -> Self {
        Self::Internal(text.to_string())
    }

    /// The HTTP status code this error kind maps to, per the
    /// specification's failure classification.
    ///
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::BadParameter(_) => 400,
            Self::Timeout => 408,
            Self::Upstream { status, .. } => *status,
            Self::Internal(_) => 500,
        }
    }

    /// The one-line diagnostic used as the `text/plain` error body.
    ///
    pub fn message(&self) -> String {
        match self {
            Self::Config(t) => t.clone(),
            Self::NotFound => "the operation requested does not exist".to_string(),
            Self::MethodNotAllowed => "method not allowed".to_string(),
            Self::BadParameter(t) => t.clone(),
            Self::Timeout => "request timeout".to_string(),
            Self::Upstream { status, reason } => {
                format!("HTTP status code {}: {}", status, reason)
            }
            Self::Internal(t) => t.clone(),
        }
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Upstream { .. } => write!(f, "{}", self.message()),
            _ => write!(f, "HTTP status code {}: {}", self.status_code(), self.message()),
        }
    }
}

/// Create an [`Error::Internal`].
///
impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Create an [`Error::Internal`].
///
impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}
