//! Assertion and listener errors

use std::any::Any;
use std::fmt;

use crate::assertion::{throw, CapturedFailure, Thrown, TypeTag};

/// The kind of error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A failure was required but the block completed normally
    NoFailureThrown,
    /// A failure occurred but its exact type was not the expected one
    WrongFailureType,
    /// A user expectation was not met
    AssertionFailed,
    /// A listener callback returned an error or panicked
    ListenerCallback,
    /// A recorded event stream broke the lifecycle ordering rules
    LifecycleViolation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoFailureThrown => "no failure thrown",
            Self::WrongFailureType => "wrong failure type",
            Self::AssertionFailed => "assertion failed",
            Self::ListenerCallback => "listener callback failed",
            Self::LifecycleViolation => "lifecycle violation",
        }
    }
}

/// The framework's "expectation not met" signal.
///
/// Raised (as a panic payload) by the exact-type assertions and by
/// `fail`. Test runners classify it as a `Failure` rather than an `Error`.
#[derive(Debug)]
pub struct AssertionError {
    pub kind: ErrorKind,
    pub message: String,
    /// The failure type that was asserted, if any
    pub expected: Option<TypeTag>,
    /// The unexpected failure that was captured instead
    pub cause: Option<CapturedFailure>,
}

impl AssertionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            expected: None,
            cause: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AssertionFailed, message)
    }

    pub fn no_failure_thrown(expected: TypeTag) -> Self {
        Self::new(
            ErrorKind::NoFailureThrown,
            format!("Expected exception {} but no exception was thrown.", expected),
        )
        .with_expected(expected)
    }

    pub fn wrong_failure_type(expected: TypeTag, cause: CapturedFailure) -> Self {
        Self::new(
            ErrorKind::WrongFailureType,
            format!(
                "Expected exception {} but a {} was thrown instead.",
                expected,
                cause.type_tag()
            ),
        )
        .with_expected(expected)
        .with_cause(cause)
    }

    pub fn with_expected(mut self, expected: TypeTag) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn with_cause(mut self, cause: CapturedFailure) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn is_no_failure_thrown(&self) -> bool {
        self.kind == ErrorKind::NoFailureThrown
    }

    pub fn is_wrong_failure_type(&self) -> bool {
        self.kind == ErrorKind::WrongFailureType
    }

    /// Throw this error as a panic
    pub fn raise(self) -> ! {
        throw(self)
    }

    /// Recover an `AssertionError` from a panic payload, thrown or raw.
    ///
    /// Hands the payload back untouched if it carries something else.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Result<Self, Box<dyn Any + Send>> {
        let payload = match payload.downcast::<Thrown>() {
            Ok(thrown) => match thrown.take::<AssertionError>() {
                Ok(err) => return Ok(err),
                Err(thrown) => thrown as Box<dyn Any + Send>,
            },
            Err(raw) => raw,
        };
        payload.downcast::<AssertionError>().map(|err| *err)
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AssertionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Fail the current test with an assertion error
pub fn fail(message: impl Into<String>) -> ! {
    AssertionError::failed(message).raise()
}

/// A contained error from one listener callback
#[derive(Debug, Clone)]
pub struct ListenerFailure {
    pub kind: ErrorKind,
    /// Name of the listener that failed
    pub listener: String,
    /// The callback being delivered
    pub event: &'static str,
    pub message: String,
    /// True if the callback panicked rather than returning an error
    pub panicked: bool,
}

impl ListenerFailure {
    pub fn new(
        listener: impl Into<String>,
        event: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::ListenerCallback,
            listener: listener.into(),
            event,
            message: message.into(),
            panicked: false,
        }
    }

    pub fn panicked(mut self) -> Self {
        self.panicked = true;
        self
    }
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener {} failed on {}", self.listener, self.event)?;
        if self.panicked {
            write!(f, " (panic)")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ListenerFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Timeout;

    #[test]
    fn test_no_failure_thrown_message() {
        let err = AssertionError::no_failure_thrown(TypeTag::of::<Timeout>());
        assert!(err.is_no_failure_thrown());
        assert!(err.to_string().starts_with("Expected exception "));
        assert!(err.to_string().contains("Timeout"));
        assert!(err.to_string().ends_with("but no exception was thrown."));
    }

    #[test]
    fn test_from_payload_raw_and_thrown() {
        let raw: Box<dyn Any + Send> = Box::new(AssertionError::failed("raw"));
        assert_eq!(AssertionError::from_payload(raw).unwrap().message, "raw");

        let thrown: Box<dyn Any + Send> = Box::new(Thrown::new(AssertionError::failed("thrown")));
        assert_eq!(AssertionError::from_payload(thrown).unwrap().message, "thrown");
    }

    #[test]
    fn test_from_payload_hands_back_other_values() {
        let thrown: Box<dyn Any + Send> = Box::new(Thrown::new(Timeout));
        let back = AssertionError::from_payload(thrown).unwrap_err();
        assert!(back.is::<Thrown>());

        let raw: Box<dyn Any + Send> = Box::new("boom");
        let back = AssertionError::from_payload(raw).unwrap_err();
        assert_eq!(*back.downcast::<&str>().unwrap(), "boom");
    }

    #[test]
    fn test_listener_failure_display() {
        let f = ListenerFailure::new("Junit", "test_started", "disk full").panicked();
        assert_eq!(f.kind, ErrorKind::ListenerCallback);
        assert_eq!(f.to_string(), "listener Junit failed on test_started (panic): disk full");
    }
}
