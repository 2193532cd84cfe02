use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::chain::CodeInfo;

/// Leading byte of the serialized form, and the status/message delimiter.
pub const SEPARATOR: char = '#';

/// Status used when nothing more specific is known.
pub const DEFAULT_STATUS: u16 = 500;

/// Shared handle to the error an `ErrorCode` was derived from.
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// The externally visible error: HTTP-like status, business code, message.
///
/// Serializes on the wire as `#{status}:{code}#{message}` (its `Display`),
/// and back through [`ErrorCode::parse_msg`]. When produced by tracing it
/// also carries the [`CodeInfo`] chain that produced the code, and the
/// original error as `source()`.
///
/// Never mutated after construction.
#[derive(Clone, Serialize)]
pub struct ErrorCode {
    #[serde(skip)]
    status: u16,
    code: String,
    message: String,
    #[serde(skip)]
    cause: Option<SharedError>,
    #[serde(skip)]
    code_info: Option<Box<CodeInfo>>,
}

// ── Constructors ──────────────────────────────────────────────────

impl ErrorCode {
    /// An error with an explicit status and code. No tracing involved.
    ///
    /// [`SEPARATOR`] is removed from `code` so the wire form always parses
    /// back to the same value.
    ///
    /// ```
    /// use bizcode_core::ErrorCode;
    /// let e = ErrorCode::new(404, "100200300", "user not found");
    /// assert_eq!(e.to_string(), "#404:100200300#user not found");
    /// assert_eq!(ErrorCode::new(500, "12#3", "x").code(), "123");
    /// ```
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        let mut code = code.into();
        code.retain(|c| c != SEPARATOR);
        Self {
            status,
            code,
            message: message.into(),
            cause: None,
            code_info: None,
        }
    }

    /// Attach the error this code was derived from.
    pub fn with_cause(mut self, cause: SharedError) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Attach the call-site trace.
    pub fn with_code_info(mut self, code_info: CodeInfo) -> Self {
        self.code_info = Some(Box::new(code_info));
        self
    }

    /// Parse the serialized form.
    ///
    /// Returns `None` unless `msg` starts with [`SEPARATOR`], contains a
    /// second separator, and has a numeric status before the `:`.
    ///
    /// ```
    /// use bizcode_core::ErrorCode;
    /// let e = ErrorCode::parse_msg("#409:123456789#already exists").unwrap();
    /// assert_eq!(e.status(), 409);
    /// assert_eq!(e.code(), "123456789");
    /// assert_eq!(e.message(), "already exists");
    /// assert!(ErrorCode::parse_msg("plain text").is_none());
    /// ```
    pub fn parse_msg(msg: &str) -> Option<Self> {
        msg.parse().ok()
    }
}

// ── Accessors ─────────────────────────────────────────────────────

impl ErrorCode {
    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original error, if this code wraps one.
    pub fn cause(&self) -> Option<&SharedError> {
        self.cause.as_ref()
    }

    /// Root of the call-site trace, if one was recorded.
    pub fn code_info(&self) -> Option<&CodeInfo> {
        self.code_info.as_deref()
    }

    /// The trace as a flat list of copies, root first, cause links removed.
    pub fn trace_info(&self) -> Vec<CodeInfo> {
        self.code_info
            .as_deref()
            .map(|root| root.iter().map(CodeInfo::detached).collect())
            .unwrap_or_default()
    }
}

// ── std::error::Error ─────────────────────────────────────────────

impl Error for ErrorCode {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

// ── Display / Debug ───────────────────────────────────────────────

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{sep}{}:{}{sep}{}",
            self.status,
            self.code,
            self.message,
            sep = SEPARATOR
        )
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ErrorCode");
        d.field("status", &self.status);
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(cause) = &self.cause {
            d.field("cause", &cause.to_string());
        }
        if let Some(info) = &self.code_info {
            d.field("trace_len", &info.iter().count());
        }
        d.finish()
    }
}

/// Equal when status, code, message and trace agree. The cause is not
/// compared.
impl PartialEq for ErrorCode {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status
            && self.code == other.code
            && self.message == other.message
            && self.code_info == other.code_info
    }
}

impl Eq for ErrorCode {}

// ── Parsing ───────────────────────────────────────────────────────

/// Why a string is not in `#{status}:{code}#{message}` form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseMsgError {
    #[error("message does not start with '#'")]
    MissingPrefix,
    #[error("message has no closing '#'")]
    MissingSeparator,
    #[error("status segment {0:?} has no ':'")]
    MissingColon(String),
    #[error("status {0:?} is not numeric")]
    InvalidStatus(String),
}

impl FromStr for ErrorCode {
    type Err = ParseMsgError;

    fn from_str(msg: &str) -> Result<Self, Self::Err> {
        let body = msg
            .strip_prefix(SEPARATOR)
            .ok_or(ParseMsgError::MissingPrefix)?;
        let (head, message) = body
            .split_once(SEPARATOR)
            .ok_or(ParseMsgError::MissingSeparator)?;
        let (status, code) = head
            .split_once(':')
            .ok_or_else(|| ParseMsgError::MissingColon(head.to_string()))?;
        let status: u16 = status
            .parse()
            .map_err(|_| ParseMsgError::InvalidStatus(status.to_string()))?;
        Ok(Self::new(status, code, message))
    }
}
