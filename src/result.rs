//! Test outcomes
//!
//! A `TestResult` is produced exactly once per test case attempt and handed
//! to every listener through `test_finished`.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::assertion::CapturedFailure;
use crate::error::AssertionError;

/// Shared, cheaply clonable failure cause
pub type Cause = Arc<dyn Error + Send + Sync + 'static>;

/// The tag of a `TestResult`, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestStatus {
    Success,
    Failure,
    Error,
    Ignored,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::Failure => "FAILED",
            Self::Error => "ERROR",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single test case attempt
#[derive(Debug, Clone)]
pub enum TestResult {
    /// The test ran to completion
    Success,
    /// An expectation was not met
    Failure(Cause),
    /// The test broke for some other reason
    Error(Cause),
    /// The test was not run, with an optional reason
    Ignored(Option<String>),
}

impl TestResult {
    pub fn success() -> Self {
        Self::Success
    }

    pub fn failure(cause: impl Error + Send + Sync + 'static) -> Self {
        Self::Failure(Arc::new(cause))
    }

    pub fn error(cause: impl Error + Send + Sync + 'static) -> Self {
        Self::Error(Arc::new(cause))
    }

    pub fn ignored(reason: Option<String>) -> Self {
        Self::Ignored(reason)
    }

    /// Classify a panic payload caught while running a test.
    ///
    /// The assertion marker becomes `Failure`; anything else is an `Error`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match AssertionError::from_payload(payload) {
            Ok(assertion) => Self::failure(assertion),
            Err(payload) => Self::error(CapturedFailure::from_payload(payload)),
        }
    }

    pub fn status(&self) -> TestStatus {
        match self {
            Self::Success => TestStatus::Success,
            Self::Failure(_) => TestStatus::Failure,
            Self::Error(_) => TestStatus::Error,
            Self::Ignored(_) => TestStatus::Ignored,
        }
    }

    /// The failure or error cause, if any
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::Failure(cause) | Self::Error(cause) => Some(cause),
            _ => None,
        }
    }

    /// The reason an ignored test was skipped
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ignored(reason) => reason.as_deref(),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }
}

impl From<()> for TestResult {
    fn from(_: ()) -> Self {
        Self::Success
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "{}", self.status()),
            Self::Failure(cause) | Self::Error(cause) => write!(f, "{}: {}", self.status(), cause),
            Self::Ignored(Some(reason)) => write!(f, "{}: {}", self.status(), reason),
            Self::Ignored(None) => write!(f, "{}", self.status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_status_tags() {
        assert_eq!(TestResult::success().status(), TestStatus::Success);
        assert_eq!(TestResult::ignored(None).status().as_str(), "ignored");
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let r = TestResult::error(io);
        assert!(r.is_error());
        assert_eq!(r.cause().unwrap().to_string(), "disk gone");
        assert_eq!(r.to_string(), "ERROR: disk gone");
    }

    #[test]
    fn test_ignored_reason() {
        let r = TestResult::ignored(Some("flaky on CI".into()));
        assert_eq!(r.reason(), Some("flaky on CI"));
        assert!(r.cause().is_none());
        assert!(TestResult::success().reason().is_none());
    }

    #[test]
    fn test_from_panic_assertion_is_failure() {
        let payload: Box<dyn Any + Send> =
            Box::new(AssertionError::new(ErrorKind::AssertionFailed, "expected 1 but was 2"));
        let r = TestResult::from_panic(payload);
        assert!(r.is_failure());
        assert_eq!(r.cause().unwrap().to_string(), "expected 1 but was 2");
    }

    #[test]
    fn test_from_panic_other_is_error() {
        let payload: Box<dyn Any + Send> = Box::new("index out of bounds");
        let r = TestResult::from_panic(payload);
        assert!(r.is_error());
        assert!(r.cause().unwrap().to_string().contains("index out of bounds"));
    }

    #[test]
    fn test_clone_shares_cause() {
        let r = TestResult::failure(std::fmt::Error);
        let c = r.clone();
        match (&r, &c) {
            (TestResult::Failure(a), TestResult::Failure(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected failures"),
        }
    }
}
