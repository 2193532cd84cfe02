//! Run fallible steps until the first one fails.
//!
//! ```
//! use bizcode::ErrorChain;
//!
//! let mut port = 0u16;
//! let mut steps = ErrorChain::new();
//! steps
//!     .run(|| "8080".parse().map(|p| port = p))
//!     .run(|| "oops".parse::<u16>().map(drop))
//!     .run(|| -> Result<(), std::io::Error> { unreachable!() });
//! assert_eq!(port, 8080);
//! assert!(steps.error().is_some());
//! ```

use std::error::Error;

use crate::trace::TracedError;

/// Holds the first error seen, with the stack where it was recorded.
///
/// Once an error is set, later steps are skipped and later errors ignored.
#[derive(Debug, Default)]
pub struct ErrorChain {
    err: Option<TracedError>,
}

impl ErrorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `step` unless an earlier step failed; keep its error if it fails.
    #[inline(never)]
    pub fn run<E, F>(&mut self, step: F) -> &mut Self
    where
        F: FnOnce() -> Result<(), E>,
        E: Error + Send + Sync + 'static,
    {
        if self.err.is_some() {
            return self;
        }
        if let Err(e) = step() {
            self.set_error(e);
        }
        self
    }

    /// Record `err` if no error is held yet. An error without a captured
    /// stack is wrapped in a [`TracedError`].
    #[inline(never)]
    pub fn set_error<E>(&mut self, err: E) -> &mut Self
    where
        E: Error + Send + Sync + 'static,
    {
        if self.err.is_none() {
            self.err = Some(TracedError::from_error(err));
        }
        self
    }

    pub fn error(&self) -> Option<&TracedError> {
        self.err.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }

    pub fn into_result(self) -> Result<(), TracedError> {
        match self.err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
