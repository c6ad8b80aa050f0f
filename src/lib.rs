//! emx-testlisten: test lifecycle listeners and exact-type failure assertions
//!
//! # Overview
//!
//! A test engine reports progress to any number of observers through the
//! [`TestListener`] contract. Observers are registered once per run in a
//! [`Listeners`] dispatcher, which fans every event out in registration order
//! and keeps a failing observer from disturbing the others or the run.
//!
//! Independently, test code can assert that a block fails with exactly a
//! given type using [`assert_exact_type`].
//!
//! ```rust,ignore
//! let recorder = Arc::new(EventRecorder::new());
//! let listeners = Listeners::builder()
//!     .listener(Arc::clone(&recorder))
//!     .build();
//!
//! let spec = NamedSpec::new("Parser");
//! let root = spec.description();
//! listeners.run_project(&[root.clone()], || {
//!     listeners.run_spec(&root, &spec, || {
//!         listeners.run_test(&root.append("rejects %%"), || {
//!             let err = assert_exact_type::<ParseFailure>(|| parse("%%"));
//!             assert_eq!(err.offset, 0);
//!         });
//!     });
//! });
//! check_lifecycle(&recorder.events()).unwrap();
//! ```
//!
//! # Events
//!
//! | Callback | Fired |
//! |----------|-------|
//! | `project_started` | once, first |
//! | `after_discovery` | once, with every discovered spec, before any spec starts |
//! | `spec_started` | once per spec instance |
//! | `test_started` | once per test case attempt |
//! | `test_finished` | exactly once per `test_started` |
//! | `spec_finished` | after every test of the spec instance |
//! | `project_finished` | once, last |
//!
//! # Exact-type outcomes
//!
//! - the thrown value is exactly `T`: it is returned
//! - nothing was thrown: `NoFailureThrown`
//! - an [`AssertionError`] was thrown: it keeps unwinding untouched
//! - anything else: `WrongFailureType`, with the thrown value as cause

mod assertion;
mod description;
mod dispatch;
mod error;
mod listener;
mod recorder;
mod result;
mod spec;

pub use assertion::{
    assert_exact_type, assert_exact_type_any, catch_exact, throw, CapturedFailure, TypeTag,
};
pub use description::Description;
pub use dispatch::{DispatchConfig, FailureHook, Listeners, ListenersBuilder};
pub use error::{fail, AssertionError, ErrorKind, ListenerFailure};
pub use listener::{BoxedListener, TestListener};
pub use recorder::{check_lifecycle, compare_events, Event, EventRecorder};
pub use result::{Cause, TestResult, TestStatus};
pub use spec::{NamedSpec, Spec, TestCase};
