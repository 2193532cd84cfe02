//! Filtered call-site chains.
//!
//! A [`Chain`] is a singly linked list of [`CodeInfo`] nodes, head first.
//! The head is the frame nearest to where the error was produced; each
//! `cause` link points one caller further out.

use serde::{Deserialize, Serialize};

use crate::coder;
use crate::Frame;

/// Code and location of one call site.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeInfo {
    pub code: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub message: String,
    /// `path:line`, when the frame had a source file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(skip)]
    pub cause: Option<Box<CodeInfo>>,
}

impl CodeInfo {
    /// Encode one frame into a detached node.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            code: coder::encode_frame(frame),
            package: frame.package.clone(),
            function: frame.function.clone(),
            line: frame.line.to_string(),
            message: String::new(),
            file: if frame.file.is_empty() {
                String::new()
            } else {
                format!("{}:{}", frame.file, frame.line)
            },
            cause: None,
        }
    }

    /// Copy of this node with the cause link stripped.
    pub fn detached(&self) -> Self {
        Self {
            cause: None,
            ..self.clone()
        }
    }

    /// Iterate this node and every cause behind it.
    pub fn iter(&self) -> Iter<'_> {
        Iter { next: Some(self) }
    }
}

/// Walks a `CodeInfo` list through its cause links.
pub struct Iter<'a> {
    next: Option<&'a CodeInfo>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a CodeInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.cause.as_deref();
        Some(node)
    }
}

/// Ordered, possibly empty chain of call sites.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Chain {
    head: Option<Box<CodeInfo>>,
    len: usize,
}

impl Chain {
    /// Link `nodes` in order; any existing cause links are replaced.
    pub fn from_nodes(nodes: Vec<CodeInfo>) -> Self {
        let len = nodes.len();
        let head = nodes.into_iter().rev().fold(None, |cause, mut node| {
            node.cause = cause;
            Some(Box::new(node))
        });
        Self { head, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<&CodeInfo> {
        self.head.as_deref()
    }

    pub fn into_head(self) -> Option<Box<CodeInfo>> {
        self.head
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter { next: self.head() }
    }

    /// Per-frame codes, head first.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|node| node.code.as_str())
    }
}

/// Include/exclude filtering over a frame sequence.
///
/// Filters are plain substrings matched against
/// [`Frame::qualified_name`]. A non-empty include list admits only frames
/// matching at least one entry; the exclude list then drops any frame
/// matching one of its entries.
#[derive(Clone, Debug, Default)]
pub struct ChainBuilder {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ChainBuilder {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// Whether `frame` survives both filters.
    pub fn accepts(&self, frame: &Frame) -> bool {
        let name = frame.qualified_name();
        if !self.include.is_empty() && !self.include.iter().any(|k| name.contains(k.as_str())) {
            return false;
        }
        if self.exclude.iter().any(|k| name.contains(k.as_str())) {
            return false;
        }
        true
    }

    /// Encode every accepted frame, keeping the order they were given in.
    ///
    /// Skipped frames never end the walk. An empty result means no frame
    /// was attributable.
    pub fn build<'a, I>(&self, frames: I) -> Chain
    where
        I: IntoIterator<Item = &'a Frame>,
    {
        let nodes = frames
            .into_iter()
            .filter(|frame| self.accepts(frame))
            .map(CodeInfo::from_frame)
            .collect();
        Chain::from_nodes(nodes)
    }
}
