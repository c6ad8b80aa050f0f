//! Spec handles and test cases
//!
//! Listeners never look inside a spec; they only need something to name.

use crate::description::Description;

/// A user-defined executable test container.
pub trait Spec: Send + Sync {
    /// Display name, defaults to the implementing type's name
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// A spec known only by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSpec {
    name: String,
}

impl NamedSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The root description this spec runs under
    pub fn description(&self) -> Description {
        Description::root(self.name.clone())
    }
}

impl Spec for NamedSpec {
    fn name(&self) -> String {
        self.name.clone()
    }
}

/// A named unit of execution under a spec
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestCase {
    description: Description,
}

impl TestCase {
    /// Create a top-level test case in the given spec
    pub fn new(spec: &Description, name: impl Into<String>) -> Self {
        Self {
            description: spec.spec_root().append(name),
        }
    }

    /// Create a test case nested under another one
    pub fn nested(parent: &TestCase, name: impl Into<String>) -> Self {
        Self {
            description: parent.description.append(name),
        }
    }

    pub fn name(&self) -> &str {
        self.description.name()
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    /// Description of the owning spec
    pub fn spec(&self) -> Description {
        self.description.spec_root()
    }
}
