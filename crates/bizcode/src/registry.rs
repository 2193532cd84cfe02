//! Code registry: composite code → first-seen trace.
//!
//! The whole table lives in memory and is rewritten to a JSON file each
//! time a new code is recorded. Codes repeat far more often than they
//! appear, so full rewrites stay rare.
//!
//! File layout:
//!
//! ```text
//! {
//!   "138040042": [
//!     { "code": "223040042", "package": "app/users", "function": "Create", "line": "42", "message": "dup" },
//!     { "code": "...", ... }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bizcode_core::CodeInfo;

use crate::error::{Error, Result};

type Table = BTreeMap<String, Vec<CodeInfo>>;

/// Durable code → trace table. First write wins per code.
#[derive(Debug)]
pub struct Registry {
    path: Option<PathBuf>,
    table: Mutex<Table>,
}

impl Registry {
    /// A registry that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: Mutex::new(Table::new()),
        }
    }

    /// Open `path` for recording, creating it and its directory if needed.
    ///
    /// Existing content is loaded; a corrupt file is treated as empty and
    /// overwritten on the next record.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| Error::RegistryDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::RegistryFile {
                path: path.clone(),
                source,
            })?;

        let table = read_table(&path).unwrap_or_default();
        tracing::debug!(path = %path.display(), codes = table.len(), "registry opened");
        Ok(Self {
            path: Some(path),
            table: Mutex::new(table),
        })
    }

    /// Read an existing registry file without creating anything.
    ///
    /// Unlike [`Registry::open`], a missing or unreadable file is an error.
    /// A file that is not valid JSON still loads as empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = read_table(&path).map_err(|source| Error::RegistryFile {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path: Some(path),
            table: Mutex::new(table),
        })
    }

    /// Record `trace` under `code` unless the code is already known.
    ///
    /// Returns `true` if this call added the code. Persistence failures are
    /// logged and otherwise ignored; the in-memory entry stays.
    pub fn record(&self, code: &str, trace: Vec<CodeInfo>) -> bool {
        let mut table = self.lock();
        if table.contains_key(code) {
            return false;
        }
        let trace = trace.iter().map(CodeInfo::detached).collect();
        table.insert(code.to_string(), trace);

        if let Some(path) = &self.path {
            if let Err(e) = write_table(path, &table) {
                tracing::warn!(path = %path.display(), code, error = %e, "registry write failed");
            }
        }
        true
    }

    /// The trace first recorded for `code`.
    pub fn lookup(&self, code: &str) -> Option<Vec<CodeInfo>> {
        self.lock().get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Known codes, sorted.
    pub fn codes(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // A panic mid-record leaves the map itself consistent.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read the table at `path`. Empty or malformed content yields an empty
/// table; only I/O failures are errors.
fn read_table(path: &Path) -> io::Result<Table> {
    let data = fs::read(path)?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Table::new());
    }
    match serde_json::from_slice(&data) {
        Ok(table) => Ok(table),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt registry, starting empty");
            Ok(Table::new())
        }
    }
}

fn write_table(path: &Path, table: &Table) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(table)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(code: &str, function: &str, message: &str) -> CodeInfo {
        CodeInfo {
            code: code.to_string(),
            package: "app".to_string(),
            function: function.to_string(),
            line: "7".to_string(),
            message: message.to_string(),
            ..CodeInfo::default()
        }
    }

    #[test]
    fn first_write_wins() {
        let reg = Registry::in_memory();
        assert!(reg.record("111222333", vec![node("111222333", "first", "a")]));
        assert!(!reg.record("111222333", vec![node("111222333", "second", "b")]));

        let trace = reg.lookup("111222333").unwrap();
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].function, "first");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn recorded_nodes_are_detached() {
        let mut head = node("1", "head", "m");
        head.cause = Some(Box::new(node("2", "tail", "m")));
        let reg = Registry::in_memory();
        reg.record("1", vec![head]);
        assert!(reg.lookup("1").unwrap()[0].cause.is_none());
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("codes.json");

        let reg = Registry::open(&path).unwrap();
        assert!(reg.is_empty());
        reg.record("123456789", vec![node("123456789", "run", "boom")]);
        reg.record("000111222", vec![node("000111222", "stop", "halt")]);
        drop(reg);

        let reopened = Registry::open(&path).unwrap();
        assert_eq!(reopened.codes(), vec!["000111222", "123456789"]);
        assert_eq!(reopened.lookup("123456789").unwrap()[0].message, "boom");

        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn file_uses_plain_node_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.json");
        let reg = Registry::open(&path).unwrap();
        reg.record("123456789", vec![node("123456789", "run", "boom")]);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &raw["123456789"][0];
        assert_eq!(entry["function"], "run");
        assert_eq!(entry["line"], "7");
        assert!(entry.get("cause").is_none());
    }

    #[test]
    fn corrupt_file_is_empty_and_gets_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.json");
        fs::write(&path, "{ this is not json").unwrap();

        let reg = Registry::open(&path).unwrap();
        assert!(reg.is_empty());
        reg.record("123456789", vec![node("123456789", "run", "boom")]);

        let reloaded = Registry::load(&path).unwrap();
        assert_eq!(reloaded.codes(), vec!["123456789"]);
    }

    #[test]
    fn load_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            Registry::load(&missing),
            Err(Error::RegistryFile { .. })
        ));
        assert!(!missing.exists());
    }

    #[test]
    fn concurrent_records_keep_first_snapshot() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        const THREADS: usize = 8;
        const CODES: usize = 16;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.json");
        let reg = Arc::new(Registry::open(&path).unwrap());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let reg = Arc::clone(&reg);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..CODES)
                        .filter(|c| {
                            let code = format!("{:09}", c);
                            let writer = format!("thread-{}", t);
                            reg.record(&code, vec![node(&code, &writer, "m")])
                        })
                        .map(|c| (format!("{:09}", c), format!("thread-{}", t)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let winners: Vec<(String, String)> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        // Exactly one winner per code.
        assert_eq!(winners.len(), CODES);
        assert_eq!(reg.len(), CODES);

        let reloaded = Registry::load(&path).unwrap();
        assert_eq!(reloaded.len(), CODES);
        for (code, writer) in &winners {
            let in_memory = reg.lookup(code).unwrap();
            let on_disk = reloaded.lookup(code).unwrap();
            assert_eq!(in_memory.len(), 1);
            assert_eq!(&in_memory[0].function, writer);
            assert_eq!(in_memory, on_disk);
        }
    }

    #[test]
    fn open_creates_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.json");
        let reg = Registry::open(&path).unwrap();
        assert!(path.exists());
        assert!(reg.is_empty());
        assert_eq!(reg.path(), Some(path.as_path()));
    }
}
