//! One call-site record.

use core::fmt;

/// Path separator in demangled Rust symbols.
const SEP: &str = "::";

/// A single resolved stack frame: which function, in which package, at
/// which line.
///
/// Frames are produced by a stack-trace provider and live for the duration
/// of one formatting call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Frame {
    pub package: String,
    pub function: String,
    pub line: u32,
    /// Source file, when debug info has it. Empty otherwise.
    pub file: String,
}

impl Frame {
    pub fn new(package: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        Self {
            package: package.into(),
            function: function.into(),
            line,
            file: String::new(),
        }
    }

    /// Build a frame from a demangled symbol such as
    /// `app::users::create::{{closure}}`.
    ///
    /// Closure segments are folded into the enclosing function, and the
    /// last top-level `::` separates package from function.
    ///
    /// ```
    /// use bizcode_core::Frame;
    /// let f = Frame::from_symbol("app::users::create::{{closure}}", 12);
    /// assert_eq!(f.package, "app::users");
    /// assert_eq!(f.function, "create");
    /// ```
    pub fn from_symbol(symbol: &str, line: u32) -> Self {
        let (package, function) = split_symbol(symbol);
        Self::new(package, function, line)
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// `package::function`, the string include/exclude filters match against.
    pub fn qualified_name(&self) -> String {
        if self.package.is_empty() {
            self.function.clone()
        } else {
            format!("{}{}{}", self.package, SEP, self.function)
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.qualified_name(), self.line)
    }
}

/// Split a demangled symbol into `(package, function)`.
///
/// Trailing closure (`{{closure}}`, `{closure#0}`) and generic-argument
/// (`::<T>`) segments are dropped first.
fn split_symbol(symbol: &str) -> (&str, &str) {
    let name = symbol.trim();
    let seps = top_level_separators(name);

    // Segment boundaries: [start, end) of each `::`-separated piece.
    let mut bounds = Vec::with_capacity(seps.len() + 1);
    let mut start = 0;
    for &at in &seps {
        bounds.push((start, at));
        start = at + SEP.len();
    }
    bounds.push((start, name.len()));

    while bounds.len() > 1 {
        let (s, e) = bounds[bounds.len() - 1];
        let segment = &name[s..e];
        if segment.starts_with('{') || segment.starts_with('<') || segment.is_empty() {
            bounds.pop();
        } else {
            break;
        }
    }

    let (fs, fe) = bounds[bounds.len() - 1];
    let function = &name[fs..fe];
    if bounds.len() == 1 {
        return ("", function);
    }
    let (_, pe) = bounds[bounds.len() - 2];
    (&name[..pe], function)
}

/// Byte offsets of every `::` outside angle brackets, so
/// `<app::Type as core::fmt::Display>::fmt` only splits after the `>`.
/// The `>` of a `->` arrow does not close a bracket.
fn top_level_separators(name: &str) -> Vec<usize> {
    let bytes = name.as_bytes();
    let mut depth = 0i32;
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' if depth > 0 && (i == 0 || bytes[i - 1] != b'-') => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                out.push(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path() {
        let f = Frame::from_symbol("app::users::create", 42);
        assert_eq!(f.package, "app::users");
        assert_eq!(f.function, "create");
        assert_eq!(f.line, 42);
        assert_eq!(f.qualified_name(), "app::users::create");
    }

    #[test]
    fn nested_closures_fold_into_parent() {
        let f = Frame::from_symbol("app::run::{{closure}}::{{closure}}", 7);
        assert_eq!(f.package, "app");
        assert_eq!(f.function, "run");
    }

    #[test]
    fn trait_impl_splits_outside_brackets() {
        let f = Frame::from_symbol("<app::Store as core::ops::Drop>::drop", 3);
        assert_eq!(f.package, "<app::Store as core::ops::Drop>");
        assert_eq!(f.function, "drop");
    }

    #[test]
    fn fn_pointer_arrow_stays_inside_brackets() {
        let f = Frame::from_symbol("<fn() -> u32 as core::ops::FnOnce<()>>::call_once", 1);
        assert_eq!(f.package, "<fn() -> u32 as core::ops::FnOnce<()>>");
        assert_eq!(f.function, "call_once");
    }

    #[test]
    fn v0_closure_and_generics_are_dropped() {
        let f = Frame::from_symbol("app::run::{closure#0}", 7);
        assert_eq!(f.qualified_name(), "app::run");
        let f = Frame::from_symbol("app::Store::get::<u32>", 7);
        assert_eq!(f.package, "app::Store");
        assert_eq!(f.function, "get");
    }

    #[test]
    fn bare_function_has_no_package() {
        let f = Frame::from_symbol("main", 1);
        assert_eq!(f.package, "");
        assert_eq!(f.function, "main");
        assert_eq!(f.qualified_name(), "main");
    }

    #[test]
    fn display_includes_line() {
        let f = Frame::new("app", "serve", 9).with_file("src/app.rs");
        assert_eq!(f.to_string(), "app::serve:9");
        assert_eq!(f.file, "src/app.rs");
    }
}
