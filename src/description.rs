//! Hierarchical test identifiers
//!
//! A `Description` names a spec or a test case by its full path from the
//! spec root. The first segment is always the owning spec.

use std::fmt;

/// Immutable path identifying a spec or test case node.
///
/// Equality, hashing and ordering all go through the full path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Description {
    parts: Vec<String>,
}

impl Description {
    /// Create a root description for a spec
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            parts: vec![name.into()],
        }
    }

    /// Build a description from path segments, root first.
    ///
    /// Returns `None` for an empty path; every description has a root.
    pub fn from_parts<I, S>(parts: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() {
            None
        } else {
            Some(Self { parts })
        }
    }

    /// Return a child description one level below this one
    pub fn append(&self, name: impl Into<String>) -> Self {
        let mut parts = self.parts.clone();
        parts.push(name.into());
        Self { parts }
    }

    /// The enclosing description, or `None` for a root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }

    /// The last path segment
    pub fn name(&self) -> &str {
        // parts is never empty, see from_parts
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    /// True for spec descriptions
    pub fn is_root(&self) -> bool {
        self.parts.len() == 1
    }

    /// The description of the spec that owns this node.
    pub fn spec_root(&self) -> Self {
        Self {
            parts: self.parts[..1].to_vec(),
        }
    }

    /// True if `other` lies strictly below this description
    pub fn is_ancestor_of(&self, other: &Description) -> bool {
        other.parts.len() > self.parts.len() && other.parts.starts_with(&self.parts)
    }

    pub fn is_descendant_of(&self, other: &Description) -> bool {
        other.is_ancestor_of(self)
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join(" / "))
    }
}
