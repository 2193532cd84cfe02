//! Stack-trace providers.
//!
//! The formatter needs an ordered list of [`Frame`]s, nearest call site
//! first. [`LiveStack`] captures the stack the formatter was called from.
//! A [`TraceProvider`] can instead supply the stack an error captured when
//! it was created, which is what [`TracedError`] carries.
//!
//! ```text
//! formatter.from_error(err)
//!       │
//!       ├─ provider.frames(err) ── Some(frames) ──┐
//!       │                                          ▼
//!       └─ None ──► LiveStack::capture() ──► ChainBuilder
//! ```

use std::error::Error;
use std::fmt;

use backtrace::Backtrace;
use bizcode_core::Frame;

/// Symbol prefixes that belong to the capture machinery, not the caller.
/// Every frame up to the last match is dropped.
const INTERNAL: &[&str] = &[
    "backtrace::",
    "<backtrace::",
    "bizcode::trace::LiveStack::",
    "bizcode::trace::TracedError::",
    "bizcode::trace::caller_frames",
    "bizcode::trace::resolve_frames",
    "bizcode::formatter::Formatter::",
    "bizcode::global::format",
    "bizcode::error_chain::ErrorChain::",
];

fn is_internal(name: &str) -> bool {
    INTERNAL.iter().any(|p| name.starts_with(p)) || name.contains(" as bizcode::trace::ResultExt")
}

/// Supplies frames embedded in an error, if it carries any.
///
/// Return `None` to fall back to the live stack.
pub trait TraceProvider: Send + Sync {
    fn frames(&self, err: &(dyn Error + 'static)) -> Option<Vec<Frame>>;
}

impl<F> TraceProvider for F
where
    F: Fn(&(dyn Error + 'static)) -> Option<Vec<Frame>> + Send + Sync,
{
    fn frames(&self, err: &(dyn Error + 'static)) -> Option<Vec<Frame>> {
        self(err)
    }
}

/// Reads the stack captured by a [`TracedError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTrace {
    pub max_frames: usize,
}

impl EmbeddedTrace {
    pub fn new(max_frames: usize) -> Self {
        Self { max_frames }
    }
}

impl TraceProvider for EmbeddedTrace {
    fn frames(&self, err: &(dyn Error + 'static)) -> Option<Vec<Frame>> {
        let traced = err.downcast_ref::<TracedError>()?;
        let mut frames = traced.frames();
        if self.max_frames > 0 {
            frames.truncate(self.max_frames);
        }
        Some(frames)
    }
}

/// Captures the current call stack.
#[derive(Debug, Clone, Copy)]
pub struct LiveStack {
    /// Caller frames skipped after the library's own.
    pub skip: usize,
    /// 0 means unlimited.
    pub max_frames: usize,
}

impl LiveStack {
    pub fn new(skip: usize, max_frames: usize) -> Self {
        Self { skip, max_frames }
    }

    /// Frames of the caller's stack, nearest first.
    #[inline(never)]
    pub fn capture(&self) -> Vec<Frame> {
        let bt = Backtrace::new();
        let mut frames = caller_frames(&bt);
        frames.drain(..self.skip.min(frames.len()));
        if self.max_frames > 0 {
            frames.truncate(self.max_frames);
        }
        frames
    }
}

/// Resolve `bt` and strip the capture machinery from its top.
fn caller_frames(bt: &Backtrace) -> Vec<Frame> {
    let frames = resolve_frames(bt);
    let first_caller = frames
        .iter()
        .rposition(|(name, _)| is_internal(name))
        .map_or(0, |i| i + 1);
    frames
        .into_iter()
        .skip(first_caller)
        .map(|(_, frame)| frame)
        .collect()
}

/// Every resolved symbol in `bt`, inlined ones included, as
/// `(qualified name, frame)`.
fn resolve_frames(bt: &Backtrace) -> Vec<(String, Frame)> {
    bt.frames()
        .iter()
        .flat_map(|f| f.symbols())
        .filter_map(|sym| {
            // `{:#}` drops the trailing `::h0123abcd` hash.
            let name = format!("{:#}", sym.name()?);
            let mut frame = Frame::from_symbol(&name, sym.lineno().unwrap_or(0));
            if let Some(file) = sym.filename() {
                frame = frame.with_file(file.display().to_string());
            }
            Some((name, frame))
        })
        .collect()
}

// ── TracedError ───────────────────────────────────────────────────

/// An error that remembers the stack it was created on.
///
/// Capture is cheap (unresolved instruction pointers); symbols are only
/// resolved when a formatter asks for [`TracedError::frames`].
pub struct TracedError {
    message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
    source_type: Option<&'static str>,
    backtrace: Backtrace,
}

impl TracedError {
    /// A new error with no source.
    #[inline(never)]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            source_type: None,
            backtrace: Backtrace::new_unresolved(),
        }
    }

    /// Wrap `err`, capturing the current stack. Displays as `err` does.
    #[inline(never)]
    pub fn wrap<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
            source_type: Some(std::any::type_name::<E>()),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    /// `err` itself if it already is a `TracedError`, otherwise
    /// [`TracedError::wrap`] of it.
    #[inline(never)]
    pub fn from_error<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let boxed: Box<dyn Error + Send + Sync> = Box::new(err);
        match boxed.downcast::<TracedError>() {
            Ok(traced) => *traced,
            Err(other) => Self {
                message: other.to_string(),
                source: Some(other),
                source_type: Some(std::any::type_name::<E>()),
                backtrace: Backtrace::new_unresolved(),
            },
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Type name of the wrapped error, if this wraps one.
    pub fn source_type(&self) -> Option<&'static str> {
        self.source_type
    }

    /// The creation stack, nearest caller first.
    pub fn frames(&self) -> Vec<Frame> {
        let mut bt = self.backtrace.clone();
        bt.resolve();
        caller_frames(&bt)
    }
}

impl fmt::Display for TracedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for TracedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("TracedError");
        d.field("message", &self.message);
        if let Some(src) = &self.source {
            d.field("source", &src.to_string());
        }
        d.field("depth", &self.backtrace.frames().len());
        d.finish()
    }
}

impl Error for TracedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Capture the stack where a `Result`'s error is first seen.
///
/// ```ignore
/// use bizcode::ResultExt;
///
/// let data = std::fs::read("config.toml").traced()?;
/// ```
pub trait ResultExt<T> {
    fn traced(self) -> Result<T, TracedError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    #[inline(never)]
    fn traced(self) -> Result<T, TracedError> {
        self.map_err(TracedError::wrap)
    }
}
