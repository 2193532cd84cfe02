//! The formatting pipeline.
//!
//! ```text
//! Raw ──► Unwrapped ──► Traced ──► Filtered ──► Composed ──► Resolved ──► Emitted
//!        (resolver)   (provider   (Chain-      (compose)    (status      (sink,
//!                      or live)    Builder)                  policy)      non-blocking)
//! ```
//!
//! Formatting never fails and performs no I/O; the only side effect is a
//! non-blocking push to the configured [`TraceSink`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use bizcode_core::{
    compose, ChainBuilder, CodeInfo, ErrorCode, Frame, SharedError, DEFAULT_STATUS,
};

use crate::cause::{CauseResolver, SourceChain};
use crate::config::FormatterConfig;
use crate::error::Result;
use crate::registry::Registry;
use crate::sink::{RegistryWorker, TraceRecord, TraceSink};
use crate::status::{StatusPolicy, StatusTable};
use crate::trace::{EmbeddedTrace, LiveStack, TraceProvider, TracedError};

/// Input to [`Formatter::from_error`]: either an error that still needs a
/// code, or one that already has it.
#[derive(Debug)]
pub enum Failure {
    Raw {
        error: Box<dyn Error + Send + Sync>,
        /// Concrete type of `error`, when known at conversion.
        type_name: Option<&'static str>,
    },
    Coded(ErrorCode),
}

impl Failure {
    /// Classify any error, recognizing an [`ErrorCode`].
    pub fn from_error<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        match Self::from(Box::new(err) as Box<dyn Error + Send + Sync>) {
            Failure::Raw { error, .. } => Failure::Raw {
                error,
                type_name: Some(std::any::type_name::<E>()),
            },
            coded => coded,
        }
    }
}

impl From<ErrorCode> for Failure {
    fn from(code: ErrorCode) -> Self {
        Failure::Coded(code)
    }
}

impl From<Box<dyn Error + Send + Sync>> for Failure {
    fn from(err: Box<dyn Error + Send + Sync>) -> Self {
        match err.downcast::<ErrorCode>() {
            Ok(code) => Failure::Coded(*code),
            Err(error) => Failure::Raw {
                error,
                type_name: None,
            },
        }
    }
}

impl From<TracedError> for Failure {
    fn from(err: TracedError) -> Self {
        Failure::from_error(err)
    }
}

/// Turns messages and errors into [`ErrorCode`]s.
///
/// Cheap to share behind a reference; every call owns its own chain.
pub struct Formatter {
    chain: ChainBuilder,
    live: LiveStack,
    parse_serialized: bool,
    with_trace: bool,
    type_prefix: bool,
    provider: Option<Arc<dyn TraceProvider>>,
    resolver: Arc<dyn CauseResolver>,
    status: Option<Arc<dyn StatusPolicy>>,
    sink: Option<Arc<dyn TraceSink>>,
}

impl Formatter {
    /// A formatter with the embedded-trace provider and source-chain
    /// resolver, no status policy and no sink.
    pub fn new(config: &FormatterConfig) -> Self {
        Self {
            chain: ChainBuilder::new(config.include.clone(), config.exclude.clone()),
            live: LiveStack::new(config.skip, config.max_frames),
            parse_serialized: config.parse_serialized,
            with_trace: config.with_trace,
            type_prefix: config.type_prefix,
            provider: Some(Arc::new(EmbeddedTrace::new(config.max_frames))),
            resolver: Arc::new(SourceChain),
            status: None,
            sink: None,
        }
    }

    /// [`Formatter::new`], plus the status table and registry worker named
    /// by `config`. The worker must outlive the formatter's use.
    pub fn standard(config: &FormatterConfig) -> Result<(Self, Option<RegistryWorker>)> {
        let mut formatter = Self::new(config);
        if let Some(path) = &config.status_file {
            formatter = formatter.with_status_policy(StatusTable::from_file(path)?);
        }
        let worker = match &config.registry_file {
            Some(path) => {
                let registry = Arc::new(Registry::open(path)?);
                let worker =
                    RegistryWorker::spawn(registry, config.queue_capacity, config.idle_park)?;
                formatter = formatter.with_sink(worker.sink());
                Some(worker)
            }
            None => None,
        };
        Ok((formatter, worker))
    }

    /// Replace the embedded-trace provider.
    pub fn with_provider(mut self, provider: impl TraceProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Always use the live stack.
    pub fn without_provider(mut self) -> Self {
        self.provider = None;
        self
    }

    pub fn with_resolver(mut self, resolver: impl CauseResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_status_policy(mut self, policy: impl StatusPolicy + 'static) -> Self {
        self.status = Some(Arc::new(policy));
        self
    }

    pub fn with_sink(mut self, sink: impl TraceSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    // ── Entry points ──────────────────────────────────────────────

    /// Code for `msg`, attributed to the calling stack.
    ///
    /// A message already in wire form is parsed back instead, unless
    /// disabled in the config.
    #[inline(never)]
    pub fn from_message(&self, msg: &str) -> ErrorCode {
        self.message_code(msg, None)
    }

    #[inline(never)]
    pub fn from_message_with_status(&self, msg: &str, status: u16) -> ErrorCode {
        self.message_code(msg, Some(status))
    }

    /// A fixed code; the stack is not consulted and nothing is recorded.
    pub fn from_message_with_code(&self, msg: &str, status: u16, code: u32) -> ErrorCode {
        ErrorCode::new(status, code.to_string(), msg)
    }

    /// Code for an error. An [`ErrorCode`], given directly or found by
    /// cause resolution, comes back unchanged.
    #[inline(never)]
    pub fn from_error(&self, err: impl Into<Failure>) -> ErrorCode {
        self.error_code(err.into(), None)
    }

    /// As [`Formatter::from_error`], with `status` overriding the policy.
    #[inline(never)]
    pub fn from_error_with_status(&self, err: impl Into<Failure>, status: u16) -> ErrorCode {
        self.error_code(err.into(), Some(status))
    }

    /// Shorthand for `from_error(Failure::from_error(err))`.
    #[inline(never)]
    pub fn wrap<E>(&self, err: E) -> ErrorCode
    where
        E: Error + Send + Sync + 'static,
    {
        self.error_code(Failure::from_error(err), None)
    }

    // ── Pipeline ──────────────────────────────────────────────────

    fn message_code(&self, msg: &str, status: Option<u16>) -> ErrorCode {
        if self.parse_serialized {
            if let Some(code) = ErrorCode::parse_msg(msg) {
                return code;
            }
        }
        let frames = self.live.capture();
        self.finish(msg.to_string(), status, &frames, None)
    }

    fn error_code(&self, failure: Failure, status: Option<u16>) -> ErrorCode {
        let (err, outer_type): (SharedError, _) = match failure {
            Failure::Coded(code) => return code,
            Failure::Raw { error, type_name } => (Arc::from(error), type_name),
        };
        let outer = err.as_ref() as &(dyn Error + 'static);
        let target = self.resolver.resolve(outer);
        if let Some(code) = target.downcast_ref::<ErrorCode>() {
            return code.clone();
        }

        let mut message = target.to_string();
        if self.parse_serialized {
            if let Some(code) = ErrorCode::parse_msg(&message) {
                return code.with_cause(err);
            }
        }
        if self.type_prefix {
            if let Some(kind) = type_of(target, outer, outer_type) {
                message = format!("{}: {}", kind, message);
            }
        }

        let frames = match self.provider.as_ref().and_then(|p| p.frames(target)) {
            Some(frames) => frames,
            None => self.live.capture(),
        };
        self.finish(message, status, &frames, Some(Arc::clone(&err)))
    }

    /// Filter, compose, resolve status and emit.
    fn finish(
        &self,
        message: String,
        status: Option<u16>,
        frames: &[Frame],
        cause: Option<SharedError>,
    ) -> ErrorCode {
        let chain = self.chain.build(frames);
        let code = compose(&chain);

        // An empty chain asks the policy about the empty site.
        let status = status
            .or_else(|| {
                let (package, function) = chain
                    .head()
                    .map_or(("", ""), |h| (h.package.as_str(), h.function.as_str()));
                self.status.as_ref()?.resolve_status(package, function)
            })
            .unwrap_or(DEFAULT_STATUS);

        let mut result = ErrorCode::new(status, code.as_str(), message.as_str());
        if let Some(cause) = cause {
            result = result.with_cause(cause);
        }

        // Nothing attributable: the sentinel carries no trace.
        let Some(head) = chain.head() else {
            return result;
        };
        let mut root = CodeInfo {
            code,
            message,
            cause: None,
            ..head.detached()
        };
        root.cause = chain.into_head();

        self.emit(&root);
        if self.with_trace {
            result = result.with_code_info(root);
        }
        result
    }

    fn emit(&self, root: &CodeInfo) {
        let Some(sink) = &self.sink else {
            return;
        };
        let record = TraceRecord {
            code: root.code.clone(),
            trace: root.iter().map(CodeInfo::detached).collect(),
        };
        sink.try_emit(record);
    }
}

/// Type name of the error a message describes: the wrapped type of a
/// [`TracedError`] target, or the caller's type when the target is the
/// outer error itself.
fn type_of(
    target: &(dyn Error + 'static),
    outer: &(dyn Error + 'static),
    outer_type: Option<&'static str>,
) -> Option<&'static str> {
    if let Some(traced) = target.downcast_ref::<TracedError>() {
        return traced.source_type();
    }
    if std::ptr::addr_eq(target, outer) {
        return outer_type;
    }
    None
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter")
            .field("include", &self.chain.include())
            .field("exclude", &self.chain.exclude())
            .field("live", &self.live)
            .field("parse_serialized", &self.parse_serialized)
            .field("with_trace", &self.with_trace)
            .field("type_prefix", &self.type_prefix)
            .field("provider", &self.provider.is_some())
            .field("status_policy", &self.status.is_some())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use bizcode_core::{encode, SENTINEL};

    fn config() -> FormatterConfig {
        FormatterConfig::new()
            .registry_file(None::<&str>)
            .type_prefix(false)
    }

    fn fixed(frames: Vec<Frame>) -> impl TraceProvider {
        move |_: &(dyn Error + 'static)| Some(frames.clone())
    }

    fn users_frames() -> Vec<Frame> {
        vec![
            Frame::new("app/users", "Create", 42),
            Frame::new("app/http", "Handle", 10),
        ]
    }

    fn not_found() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "no such user")
    }

    #[derive(Debug)]
    struct Context(Box<dyn Error + Send + Sync>);

    impl fmt::Display for Context {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "context: {}", self.0)
        }
    }

    impl Error for Context {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(self.0.as_ref())
        }
    }

    #[inline(never)]
    fn fail_here(f: &Formatter) -> ErrorCode {
        f.from_message("boom")
    }

    #[inline(never)]
    fn make_traced() -> TracedError {
        TracedError::new("disk full")
    }

    #[test]
    fn same_site_same_code() {
        let f = Formatter::new(&config());
        let codes: Vec<String> = (0..5).map(|_| fail_here(&f).code().to_string()).collect();
        assert!(codes.iter().all(|c| c == &codes[0]));
        assert_eq!(codes[0].len(), 9);
    }

    #[test]
    fn live_stack_attributes_caller() {
        let f = Formatter::new(&config().include(["bizcode::formatter::tests"]));
        let e = fail_here(&f);
        assert_eq!(e.status(), DEFAULT_STATUS);
        assert_eq!(e.message(), "boom");

        let head = e.code_info().and_then(|root| root.cause.as_deref()).unwrap();
        assert_eq!(head.package, "bizcode::formatter::tests");
        assert_eq!(head.function, "fail_here");
    }

    #[test]
    fn zero_max_frames_keeps_attribution() {
        let f = Formatter::new(&config().max_frames(0).include(["bizcode::formatter::tests"]));
        let e = fail_here(&f);
        assert_ne!(e.code(), SENTINEL);
        let head = e.code_info().and_then(|root| root.cause.as_deref()).unwrap();
        assert_eq!(head.function, "fail_here");
    }

    #[test]
    fn error_messages_name_the_error_type() {
        let cfg = config().type_prefix(true);
        let f = Formatter::new(&cfg).with_provider(fixed(users_frames()));
        let io_type = std::any::type_name::<io::Error>();

        let e = f.wrap(not_found());
        assert_eq!(e.message(), format!("{}: no such user", io_type));

        let e = f.from_error(TracedError::wrap(not_found()));
        assert_eq!(e.message(), format!("{}: no such user", io_type));

        // Nothing wrapped, nothing to name.
        let e = f.from_error(TracedError::new("disk full"));
        assert_eq!(e.message(), "disk full");

        let boxed: Box<dyn Error + Send + Sync> = Box::new(not_found());
        assert_eq!(f.from_error(boxed).message(), "no such user");

        // The resolved cause is named, not the wrapper.
        let e = f.wrap(Context(Box::new(TracedError::wrap(not_found()))));
        assert_eq!(e.message(), format!("{}: no such user", io_type));
    }

    #[test]
    fn sentinel_still_consults_status_policy() {
        let policy = |package: &str, function: &str| {
            (package.is_empty() && function.is_empty()).then_some(503)
        };
        let f = Formatter::new(&config().include(["no-such-frame"])).with_status_policy(policy);
        let e = f.from_message("lost");
        assert_eq!(e.code(), SENTINEL);
        assert_eq!(e.status(), 503);
    }

    #[test]
    fn exclude_all_gives_sentinel() {
        let f = Formatter::new(&config().include(["no-such-frame"]));
        let e = f.from_message("lost");
        assert_eq!(e.code(), SENTINEL);
        assert!(e.code_info().is_none());

        let e = f.wrap(not_found());
        assert_eq!(e.code(), SENTINEL);
        assert_eq!(e.message(), "no such user");
    }

    #[test]
    fn single_frame_passes_through() {
        let f = Formatter::new(&config())
            .with_provider(fixed(vec![Frame::new("app/users", "Create", 42)]));
        let e = f.wrap(not_found());
        assert_eq!(e.code(), encode("app/users", "Create", 42));
        assert_eq!(e.code(), "223040042");
    }

    #[test]
    fn multi_frame_composes() {
        let frames = users_frames();
        let f = Formatter::new(&config()).with_provider(fixed(frames.clone()));
        let e = f.wrap(not_found());

        let expected = compose(&ChainBuilder::default().build(&frames));
        assert_eq!(e.code(), expected);
        assert!(e.code().ends_with("040042"));

        let trace = e.trace_info();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].code, expected);
        assert_eq!(trace[0].message, "no such user");
        assert_eq!(trace[1].code, "223040042");
        assert_eq!(trace[2].function, "Handle");
    }

    #[test]
    fn from_error_is_idempotent() {
        let f = Formatter::new(&config()).with_provider(fixed(users_frames()));
        let first = f.wrap(not_found());
        let again = f.from_error(first.clone());
        assert_eq!(again, first);

        let nested = f.wrap(Context(Box::new(first.clone())));
        assert_eq!(nested, first);

        let boxed: Box<dyn Error + Send + Sync> = Box::new(first.clone());
        assert!(matches!(Failure::from(boxed), Failure::Coded(_)));
    }

    #[test]
    fn resolves_to_traced_cause() {
        let f = Formatter::new(&config().include(["bizcode::formatter::tests"]));
        let e = f.wrap(Context(Box::new(make_traced())));
        assert_eq!(e.message(), "disk full");

        let head = e.code_info().and_then(|root| root.cause.as_deref()).unwrap();
        assert_eq!(head.function, "make_traced");
        assert!(e.source().unwrap().to_string().starts_with("context: "));
    }

    #[test]
    fn serialized_messages_are_reused() {
        let f = Formatter::new(&config());
        let e = f.from_message("#404:123456789#missing");
        assert_eq!(e.status(), 404);
        assert_eq!(e.code(), "123456789");
        assert_eq!(e.message(), "missing");

        let raw = io::Error::new(io::ErrorKind::Other, "#409:111222333#taken");
        let e = f.wrap(raw);
        assert_eq!(e.code(), "111222333");
        assert!(e.source().is_some());

        let f = Formatter::new(&config().parse_serialized(false));
        let e = f.from_message("#404:123456789#missing");
        assert_eq!(e.message(), "#404:123456789#missing");
        assert_eq!(e.status(), DEFAULT_STATUS);
    }

    #[test]
    fn explicit_code_skips_tracing() {
        let f = Formatter::new(&config());
        let e = f.from_message_with_code("bad input", 400, 42);
        assert_eq!(e.to_string(), "#400:42#bad input");
        assert!(e.code_info().is_none());
    }

    #[test]
    fn status_policy_and_override() {
        let frames = vec![Frame::new("app::auth", "login", 9)];
        let f = Formatter::new(&config())
            .with_provider(fixed(frames))
            .with_status_policy(StatusTable::new().with_package("app::auth", 401));
        assert_eq!(f.wrap(not_found()).status(), 401);
        assert_eq!(f.from_error_with_status(Failure::from_error(not_found()), 418).status(), 418);

        let f = Formatter::new(&config()).with_provider(fixed(users_frames()));
        assert_eq!(f.wrap(not_found()).status(), DEFAULT_STATUS);
    }

    #[test]
    fn trace_can_be_left_off() {
        let f = Formatter::new(&config().with_trace(false)).with_provider(fixed(users_frames()));
        let e = f.wrap(not_found());
        assert!(e.code_info().is_none());
        assert!(e.trace_info().is_empty());
        assert!(e.code().ends_with("040042"));
    }

    struct Refusing(AtomicUsize);

    impl TraceSink for Arc<Refusing> {
        fn try_emit(&self, _record: TraceRecord) -> bool {
            self.0.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    #[test]
    fn refused_emission_still_formats() {
        let sink = Arc::new(Refusing(AtomicUsize::new(0)));
        let f = Formatter::new(&config())
            .with_provider(fixed(users_frames()))
            .with_sink(Arc::clone(&sink));
        for _ in 0..10 {
            assert!(f.wrap(not_found()).code().ends_with("040042"));
        }
        assert_eq!(sink.0.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn saturated_registry_queue_never_blocks() {
        let registry = Arc::new(Registry::in_memory());
        let worker =
            RegistryWorker::spawn(Arc::clone(&registry), 1, Duration::from_millis(5)).unwrap();
        let f = Formatter::new(&config()).with_sink(worker.sink());

        let start = Instant::now();
        for i in 0..200u32 {
            let frames = vec![Frame::new("app", "handler", i)];
            let f = Formatter::new(&config())
                .with_provider(fixed(frames))
                .with_sink(worker.sink());
            f.wrap(not_found());
        }
        f.from_message("one more");
        assert!(start.elapsed() < Duration::from_secs(5));

        assert!(worker.flush(Duration::from_secs(5)));
        assert!(!registry.is_empty());
        assert_eq!(registry.len() as u64, worker.recorded());
        assert!(worker.recorded() + worker.dropped() <= 201);
        worker.stop();
    }

    #[test]
    fn emitted_trace_reaches_registry() {
        let registry = Arc::new(Registry::in_memory());
        let worker =
            RegistryWorker::spawn(Arc::clone(&registry), 8, Duration::from_millis(5)).unwrap();
        let f = Formatter::new(&config())
            .with_provider(fixed(users_frames()))
            .with_sink(worker.sink());

        let e = f.wrap(not_found());
        f.wrap(not_found());
        assert!(worker.flush(Duration::from_secs(5)));

        let trace = registry.lookup(e.code()).unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[1].package, "app/users");
        assert!(trace.iter().all(|n| n.cause.is_none()));
        assert_eq!(registry.len(), 1);
        worker.stop();
    }

    #[test]
    fn sentinel_is_not_recorded() {
        let registry = Arc::new(Registry::in_memory());
        let worker =
            RegistryWorker::spawn(Arc::clone(&registry), 8, Duration::from_millis(5)).unwrap();
        let f = Formatter::new(&config().include(["no-such-frame"])).with_sink(worker.sink());
        f.from_message("lost");
        assert!(worker.flush(Duration::from_secs(5)));
        assert!(registry.is_empty());
        worker.stop();
    }

    #[test]
    fn standard_wires_registry_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status.json");
        std::fs::write(&status, r#"{"packages": {"app/users": 409}}"#).unwrap();
        let cfg = config()
            .registry_file(Some(dir.path().join("codes.json")))
            .status_file(Some(&status));

        let (f, worker) = Formatter::standard(&cfg).unwrap();
        let worker = worker.unwrap();
        let f = f.with_provider(fixed(users_frames()));
        let e = f.wrap(not_found());
        assert_eq!(e.status(), 409);
        assert!(worker.flush(Duration::from_secs(5)));
        worker.stop();

        let reloaded = Registry::load(dir.path().join("codes.json")).unwrap();
        assert!(reloaded.lookup(e.code()).is_some());
    }
}
