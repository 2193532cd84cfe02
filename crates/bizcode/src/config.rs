//! Formatter configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder methods (programmatic)
//! 2. Environment variables (`from_env()`)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust
//! use bizcode::FormatterConfig;
//!
//! let config = FormatterConfig::new()
//!     .include(["myapp"])
//!     .exclude(["myapp::middleware"])
//!     .registry_file(None::<&str>);
//! assert_eq!(config.include, ["myapp"]);
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Library defaults.
pub mod defaults {
    /// Registry file written next to the working directory.
    pub const REGISTRY_FILE: &str = "error_codes.json";
    /// Pending traces buffered before new ones are dropped.
    pub const QUEUE_CAPACITY: usize = 10;
    /// Frames captured per formatting call.
    pub const MAX_FRAMES: usize = 32;
    /// Caller frames skipped after the library's own frames.
    pub const SKIP: usize = 0;
    /// Reuse messages already in `#status:code#message` form.
    pub const PARSE_SERIALIZED: bool = true;
    /// Keep the call-site chain on produced `ErrorCode`s.
    pub const WITH_TRACE: bool = true;
    /// Prefix error-derived messages with the error's type name.
    pub const TYPE_PREFIX: bool = true;
    /// Worker park timeout while the queue is empty.
    pub const IDLE_PARK_MS: u64 = 50;
}

/// Formatter configuration with builder pattern.
///
/// Use `from_env()` to start with library defaults and apply any
/// environment variable overrides.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Substrings a frame must match to be attributed (empty = all)
    pub include: Vec<String>,
    /// Substrings that drop a frame
    pub exclude: Vec<String>,
    /// Registry JSON file; `None` disables persistence
    pub registry_file: Option<PathBuf>,
    /// Optional JSON status table (package / function → status)
    pub status_file: Option<PathBuf>,
    /// Emission queue bound
    pub queue_capacity: usize,
    /// Frames captured per call (0 = unlimited)
    pub max_frames: usize,
    /// Extra caller frames to skip
    pub skip: usize,
    /// Reuse already-serialized messages
    pub parse_serialized: bool,
    /// Attach the call-site chain to produced errors
    pub with_trace: bool,
    /// Prefix `from_error` messages with the error type
    pub type_prefix: bool,
    /// Worker park timeout
    pub idle_park: Duration,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl FormatterConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `BIZCODE_INCLUDE` - Comma-separated include substrings
    /// - `BIZCODE_EXCLUDE` - Comma-separated exclude substrings
    /// - `BIZCODE_REGISTRY_FILE` - Registry path (empty disables it)
    /// - `BIZCODE_STATUS_FILE` - JSON status table path
    /// - `BIZCODE_QUEUE_CAPACITY` - Emission queue bound
    /// - `BIZCODE_MAX_FRAMES` - Frames captured per call
    /// - `BIZCODE_SKIP` - Extra caller frames to skip
    /// - `BIZCODE_PARSE_SERIALIZED` - Reuse serialized messages (0/1)
    /// - `BIZCODE_WITH_TRACE` - Keep the chain on errors (0/1)
    /// - `BIZCODE_TYPE_PREFIX` - Prefix error messages with the type name (0/1)
    /// - `BIZCODE_IDLE_PARK_MS` - Worker park timeout in milliseconds
    pub fn from_env() -> Self {
        let base = Self::new();
        Self {
            include: env_get_list("BIZCODE_INCLUDE").unwrap_or(base.include),
            exclude: env_get_list("BIZCODE_EXCLUDE").unwrap_or(base.exclude),
            registry_file: match std::env::var("BIZCODE_REGISTRY_FILE") {
                Ok(v) if v.trim().is_empty() => None,
                Ok(v) => Some(PathBuf::from(v)),
                Err(_) => base.registry_file,
            },
            status_file: std::env::var_os("BIZCODE_STATUS_FILE").map(PathBuf::from),
            queue_capacity: env_get("BIZCODE_QUEUE_CAPACITY", base.queue_capacity),
            max_frames: env_get("BIZCODE_MAX_FRAMES", base.max_frames),
            skip: env_get("BIZCODE_SKIP", base.skip),
            parse_serialized: env_get_bool("BIZCODE_PARSE_SERIALIZED", base.parse_serialized),
            with_trace: env_get_bool("BIZCODE_WITH_TRACE", base.with_trace),
            type_prefix: env_get_bool("BIZCODE_TYPE_PREFIX", base.type_prefix),
            idle_park: Duration::from_millis(env_get(
                "BIZCODE_IDLE_PARK_MS",
                defaults::IDLE_PARK_MS,
            )),
        }
    }

    /// Create config with explicit defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            registry_file: Some(PathBuf::from(defaults::REGISTRY_FILE)),
            status_file: None,
            queue_capacity: defaults::QUEUE_CAPACITY,
            max_frames: defaults::MAX_FRAMES,
            skip: defaults::SKIP,
            parse_serialized: defaults::PARSE_SERIALIZED,
            with_trace: defaults::WITH_TRACE,
            type_prefix: defaults::TYPE_PREFIX,
            idle_park: Duration::from_millis(defaults::IDLE_PARK_MS),
        }
    }

    // Builder methods

    pub fn include<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn registry_file<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.registry_file = path.map(Into::into);
        self
    }

    pub fn status_file<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.status_file = path.map(Into::into);
        self
    }

    pub fn queue_capacity(mut self, cap: usize) -> Self {
        self.queue_capacity = cap;
        self
    }

    pub fn max_frames(mut self, n: usize) -> Self {
        self.max_frames = n;
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn parse_serialized(mut self, enable: bool) -> Self {
        self.parse_serialized = enable;
        self
    }

    pub fn with_trace(mut self, enable: bool) -> Self {
        self.with_trace = enable;
        self
    }

    pub fn type_prefix(mut self, enable: bool) -> Self {
        self.type_prefix = enable;
        self
    }

    pub fn idle_park(mut self, d: Duration) -> Self {
        self.idle_park = d;
        self
    }
}

// ── Environment helpers ───────────────────────────────────────────

/// Environment variable parsed as `T`, or `default` when unset or invalid.
fn env_get<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Accepts "1", "true", "yes", "on" (case-insensitive) as true; any
/// other set value is false.
fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Comma-separated list; blank entries dropped. `None` when unset.
fn env_get_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|v| split_list(&v))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
