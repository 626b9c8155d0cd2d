//=====================================================
// File: ast/breadcrumbs.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Structural addresses for syntax tree nodes
// Objective: Provide breadcrumbs, document positions, and source positions that
//            every later phase uses as stable keys
//=====================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step in a breadcrumb path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BreadcrumbEntry {
    Index(usize),
    Name(String),
}

impl fmt::Display for BreadcrumbEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreadcrumbEntry::Index(index) => write!(f, "{index}"),
            BreadcrumbEntry::Name(name) => f.write_str(name),
        }
    }
}

/// Path from the file root to a node, e.g. `declarations.0.body.statements.1`.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Breadcrumbs(Vec<BreadcrumbEntry>);

impl Breadcrumbs {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn entries(&self) -> &[BreadcrumbEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn append_name(&self, name: &str) -> Self {
        let mut entries = self.0.clone();
        entries.push(BreadcrumbEntry::Name(name.to_string()));
        Self(entries)
    }

    pub fn append_index(&self, index: usize) -> Self {
        let mut entries = self.0.clone();
        entries.push(BreadcrumbEntry::Index(index));
        Self(entries)
    }

    /// Whether this addresses one of the file's own top-level declarations.
    pub fn is_file_declaration(&self) -> bool {
        matches!(
            self.0.as_slice(),
            [BreadcrumbEntry::Name(name), BreadcrumbEntry::Index(_)] if name == "declarations"
        )
    }

    /// Breadcrumbs of the parent node. The root is its own parent.
    pub fn up(&self) -> Self {
        let mut entries = self.0.clone();
        entries.pop();
        Self(entries)
    }

    /// Parse the dot-joined form produced by `Display`. Numeric steps become indices.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::empty();
        }
        let entries = text
            .split('.')
            .map(|part| match part.parse::<usize>() {
                Ok(index) => BreadcrumbEntry::Index(index),
                Err(_) => BreadcrumbEntry::Name(part.to_string()),
            })
            .collect();
        Self(entries)
    }
}

impl fmt::Display for Breadcrumbs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentPosition {
    pub line: u32,
    pub column: u32,
}

impl DocumentPosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for DocumentPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRange {
    pub start: DocumentPosition,
    pub end: DocumentPosition,
}

impl DocumentRange {
    pub fn new(start: DocumentPosition, end: DocumentPosition) -> Self {
        Self { start, end }
    }
}

/// Where a value or error came from: a node in a source file, or a named export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourcePosition {
    Source {
        path: String,
        breadcrumbs: Breadcrumbs,
        position: DocumentRange,
    },
    Export {
        path: String,
        export_name: String,
    },
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePosition::Source {
                path,
                breadcrumbs,
                position,
            } => write!(f, "{path}:{} ({breadcrumbs})", position.start),
            SourcePosition::Export { path, export_name } => write!(f, "{path}::{export_name}"),
        }
    }
}

/// Metadata carried by every syntax tree node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeInfo {
    pub position: DocumentRange,
    pub breadcrumbs: Breadcrumbs,
}

impl NodeInfo {
    pub fn new(position: DocumentRange, breadcrumbs: Breadcrumbs) -> Self {
        Self {
            position,
            breadcrumbs,
        }
    }

    pub fn source_position(&self, path: &str) -> SourcePosition {
        SourcePosition::Source {
            path: path.to_string(),
            breadcrumbs: self.breadcrumbs.clone(),
            position: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let crumbs = Breadcrumbs::empty()
            .append_name("declarations")
            .append_index(2)
            .append_name("body");
        assert_eq!(crumbs.to_string(), "declarations.2.body");
        assert_eq!(Breadcrumbs::parse("declarations.2.body"), crumbs);
    }

    #[test]
    fn up_drops_the_last_step() {
        let crumbs = Breadcrumbs::parse("declarations.0.value");
        assert_eq!(crumbs.up(), Breadcrumbs::parse("declarations.0"));
        assert!(Breadcrumbs::empty().up().is_empty());
    }

    #[test]
    fn ordering_follows_document_order_for_siblings() {
        let first = Breadcrumbs::parse("declarations.2");
        let second = Breadcrumbs::parse("declarations.10");
        assert!(first < second);
    }
}
