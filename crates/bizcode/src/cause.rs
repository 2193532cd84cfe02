//! Cause resolution: which error in a `source()` chain gets the code.

use std::error::Error;

use bizcode_core::ErrorCode;

use crate::trace::TracedError;

/// Upper bound on `source()` hops, in case a chain loops.
const MAX_DEPTH: usize = 64;

/// Picks the error a formatter should attribute, given the outermost one.
///
/// Must terminate and be idempotent: resolving the result again returns it.
pub trait CauseResolver: Send + Sync {
    fn resolve<'a>(&self, err: &'a (dyn Error + 'static)) -> &'a (dyn Error + 'static);
}

/// Walks `Error::source()` and targets the innermost error that is either
/// an [`ErrorCode`] or a [`TracedError`]. If neither appears, the outermost
/// error is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceChain;

impl CauseResolver for SourceChain {
    fn resolve<'a>(&self, err: &'a (dyn Error + 'static)) -> &'a (dyn Error + 'static) {
        let mut target = err;
        let mut current = Some(err);
        let mut depth = 0;
        while let Some(e) = current {
            if is_terminal(e) {
                target = e;
            }
            depth += 1;
            if depth >= MAX_DEPTH {
                break;
            }
            current = e.source();
        }
        target
    }
}

/// Errors that own their attribution: an existing code or a captured stack.
fn is_terminal(err: &(dyn Error + 'static)) -> bool {
    err.is::<ErrorCode>() || err.is::<TracedError>()
}
