//! # bizcode — business error codes from call sites
//!
//! Turns an error message or an error value into an [`ErrorCode`]: an
//! HTTP-like status, a 9-digit business code derived from where the error
//! happened, and the message. The same call path always yields the same
//! code, so the code can be shown to users and looked up later.
//!
//! ## Design
//!
//! - [`Formatter`] runs the pipeline: cause resolution, stack capture,
//!   filtering, composition, status resolution, emission.
//! - Stacks come from a [`TraceProvider`] ([`EmbeddedTrace`] reads the
//!   stack a [`TracedError`] captured) or the live call stack.
//! - New codes and their call paths go to a [`Registry`] JSON file through
//!   a bounded queue and one [`RegistryWorker`] thread. A full queue drops
//!   the record; formatting never waits on I/O.
//! - [`ErrorChain`] runs steps until the first failure and keeps that
//!   error with its stack.
//!
//! The pure encoding engine lives in `bizcode-core` and is re-exported here.
//!
//! ## Quick Start
//!
//! ```rust
//! use bizcode::{Formatter, FormatterConfig, ResultExt};
//!
//! let config = FormatterConfig::new().registry_file(None::<&str>);
//! let formatter = Formatter::new(&config);
//!
//! let err = formatter.from_message("user not found");
//! assert_eq!(err.status(), 500);
//! assert_eq!(err.code().len(), 9);
//!
//! // The wire form parses back into the same code.
//! let again = formatter.from_message(&err.to_string());
//! assert_eq!(again.code(), err.code());
//!
//! // Errors remember where they were created.
//! let failed: Result<(), _> = std::fs::read("/no/such/file").map(|_| ()).traced();
//! let coded = formatter.from_error(failed.unwrap_err());
//! assert_eq!(coded.code().len(), 9);
//! ```
//!
//! ## Configuration
//!
//! [`FormatterConfig::from_env`] reads `BIZCODE_*` variables; see
//! [`FormatterConfig`]. [`format`] and [`format_error`] use a default
//! formatter built that way on first use.
//!
//! ## Logging
//!
//! Events go through `tracing`. The library never installs a subscriber.

mod cause;
mod config;
mod error;
mod error_chain;
mod formatter;
mod global;
mod registry;
mod sink;
mod status;
mod trace;

// ── Public API ────────────────────────────────────────────────────

pub use cause::{CauseResolver, SourceChain};
pub use config::{defaults, FormatterConfig};
pub use error::{Error, Result};
pub use error_chain::ErrorChain;
pub use formatter::{Failure, Formatter};
pub use global::{format, format_error, global, init_global};
pub use registry::Registry;
pub use sink::{RegistrySink, RegistryWorker, TraceRecord, TraceSink};
pub use status::{StatusPolicy, StatusTable};
pub use trace::{EmbeddedTrace, LiveStack, ResultExt, TraceProvider, TracedError};

pub use bizcode_core::{
    compose, encode, encode_frame, is_well_formed, Chain, ChainBuilder, CodeInfo, ErrorCode,
    Frame, ParseMsgError, SharedError, CODE_LEN, DEFAULT_STATUS, SENTINEL, SEPARATOR,
};
