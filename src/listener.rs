//! The listener contract
//!
//! Every callback has a no-op default, so an observer implements only what it
//! needs. Callbacks take `&self` because the dispatcher may be driven from
//! several threads at once; observers with state keep it behind a lock.
//!
//! Ordering seen by a single listener:
//!
//! ```text
//! project_started
//! after_discovery
//!   spec_started            (once per spec instance)
//!     test_started
//!     test_finished         (exactly once per test_started)
//!   spec_finished
//! project_finished
//! ```
//!
//! Events from specs running in parallel may interleave.

use std::sync::Arc;

use crate::description::Description;
use crate::result::TestResult;
use crate::spec::Spec;

/// An observer of test lifecycle events.
///
/// Returning an error (or panicking) from a callback does not affect other
/// listeners or the run; the dispatcher reports it and moves on.
pub trait TestListener: Send + Sync {
    /// Name used when reporting callback failures
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// The run is starting. Fired once.
    fn project_started(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// All specs were located. Fired once, before any spec starts.
    fn after_discovery(&self, _descriptions: &[Description]) -> anyhow::Result<()> {
        Ok(())
    }

    /// A spec instance is about to run its tests
    fn spec_started(&self, _description: &Description, _spec: &dyn Spec) -> anyhow::Result<()> {
        Ok(())
    }

    /// A spec instance has finished all of its tests
    fn spec_finished(&self, _description: &Description, _spec: &dyn Spec) -> anyhow::Result<()> {
        Ok(())
    }

    /// A test case attempt is starting
    fn test_started(&self, _description: &Description) -> anyhow::Result<()> {
        Ok(())
    }

    /// A test case attempt produced its result
    fn test_finished(
        &self,
        _description: &Description,
        _result: &TestResult,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// The run is over. Fired once, after every spec has finished.
    fn project_finished(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

macro_rules! forward_listener {
    () => {
        fn name(&self) -> String {
            (**self).name()
        }

        fn project_started(&self) -> anyhow::Result<()> {
            (**self).project_started()
        }

        fn after_discovery(&self, descriptions: &[Description]) -> anyhow::Result<()> {
            (**self).after_discovery(descriptions)
        }

        fn spec_started(&self, description: &Description, spec: &dyn Spec) -> anyhow::Result<()> {
            (**self).spec_started(description, spec)
        }

        fn spec_finished(&self, description: &Description, spec: &dyn Spec) -> anyhow::Result<()> {
            (**self).spec_finished(description, spec)
        }

        fn test_started(&self, description: &Description) -> anyhow::Result<()> {
            (**self).test_started(description)
        }

        fn test_finished(
            &self,
            description: &Description,
            result: &TestResult,
        ) -> anyhow::Result<()> {
            (**self).test_finished(description, result)
        }

        fn project_finished(&self) -> anyhow::Result<()> {
            (**self).project_finished()
        }
    };
}

impl<L: TestListener + ?Sized> TestListener for Arc<L> {
    forward_listener!();
}

impl<L: TestListener + ?Sized> TestListener for Box<L> {
    forward_listener!();
}

impl<L: TestListener + ?Sized> TestListener for &L {
    forward_listener!();
}

/// A boxed listener
pub type BoxedListener = Box<dyn TestListener>;
