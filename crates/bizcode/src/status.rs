//! Status resolution: which HTTP status an attributed call site maps to.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maps `(package, function)` of the head call site to a status.
///
/// `None` means "no opinion"; the formatter then uses 500.
pub trait StatusPolicy: Send + Sync {
    fn resolve_status(&self, package: &str, function: &str) -> Option<u16>;
}

impl<F> StatusPolicy for F
where
    F: Fn(&str, &str) -> Option<u16> + Send + Sync,
{
    fn resolve_status(&self, package: &str, function: &str) -> Option<u16> {
        self(package, function)
    }
}

/// Static status tables.
///
/// A package entry applies to every function in that package and takes
/// precedence over a `package::function` entry.
///
/// ```
/// use bizcode::{StatusPolicy, StatusTable};
///
/// let table = StatusTable::new()
///     .with_package("app::auth", 401)
///     .with_function("app::users::find", 404);
/// assert_eq!(table.resolve_status("app::auth", "login"), Some(401));
/// assert_eq!(table.resolve_status("app::users", "find"), Some(404));
/// assert_eq!(table.resolve_status("app::users", "create"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTable {
    #[serde(default)]
    pub packages: HashMap<String, u16>,
    #[serde(default)]
    pub functions: HashMap<String, u16>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: impl Into<String>, status: u16) -> Self {
        self.packages.insert(package.into(), status);
        self
    }

    /// `qualified` is `package::function`.
    pub fn with_function(mut self, qualified: impl Into<String>, status: u16) -> Self {
        self.functions.insert(qualified.into(), status);
        self
    }

    /// Parse `{"packages": {..}, "functions": {..}}`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| Error::StatusFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.functions.is_empty()
    }
}

impl StatusPolicy for StatusTable {
    fn resolve_status(&self, package: &str, function: &str) -> Option<u16> {
        if let Some(&status) = self.packages.get(package) {
            return Some(status);
        }
        self.functions
            .get(&format!("{}::{}", package, function))
            .copied()
    }
}
