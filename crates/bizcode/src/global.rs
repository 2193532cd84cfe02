//! Process-wide default formatter.
//!
//! Set up once, either explicitly with [`init_global`] or lazily from the
//! environment on first use. The registry worker, if any, lives for the
//! rest of the process.

use std::error::Error;
use std::sync::OnceLock;

use bizcode_core::ErrorCode;

use crate::config::FormatterConfig;
use crate::error::{Error as SetupError, Result};
use crate::formatter::{Failure, Formatter};
use crate::sink::RegistryWorker;

struct Global {
    formatter: Formatter,
    _worker: Option<RegistryWorker>,
}

static GLOBAL: OnceLock<Global> = OnceLock::new();

/// Install the default formatter built from `config`.
///
/// Fails if setup fails or a default is already in place (including one
/// created lazily by [`global`]).
pub fn init_global(config: &FormatterConfig) -> Result<&'static Formatter> {
    if GLOBAL.get().is_some() {
        return Err(SetupError::AlreadyInitialized);
    }
    let (formatter, worker) = Formatter::standard(config)?;
    let global = Global {
        formatter,
        _worker: worker,
    };
    if GLOBAL.set(global).is_err() {
        return Err(SetupError::AlreadyInitialized);
    }
    GLOBAL
        .get()
        .map(|g| &g.formatter)
        .ok_or(SetupError::AlreadyInitialized)
}

/// The default formatter, built from [`FormatterConfig::from_env`] on first
/// use. If the registry cannot be set up the formatter runs without one.
pub fn global() -> &'static Formatter {
    &GLOBAL.get_or_init(build_from_env).formatter
}

fn build_from_env() -> Global {
    let config = FormatterConfig::from_env();
    match Formatter::standard(&config) {
        Ok((formatter, worker)) => Global {
            formatter,
            _worker: worker,
        },
        Err(e) => {
            tracing::error!(error = %e, "bizcode setup failed, registry disabled");
            Global {
                formatter: Formatter::new(&config),
                _worker: None,
            }
        }
    }
}

/// [`Formatter::from_message`] on the default formatter.
#[inline(never)]
pub fn format(msg: &str) -> ErrorCode {
    global().from_message(msg)
}

/// [`Formatter::wrap`] on the default formatter.
#[inline(never)]
pub fn format_error<E>(err: E) -> ErrorCode
where
    E: Error + Send + Sync + 'static,
{
    global().from_error(Failure::from_error(err))
}
