//! Exact-type failure assertions
//!
//! A block "throws" by panicking. `throw` wraps the value in a payload that
//! remembers the thrown type's name so mismatches can be reported; plain
//! `panic!` payloads and raw `panic_any` values are classified too.
//!
//! Classification order for a caught payload against an expected type `T`:
//!
//! 1. nothing thrown: `NoFailureThrown`
//! 2. exactly `T`: the value itself is returned
//! 3. the `AssertionError` marker: re-raised untouched
//! 4. anything else: `WrongFailureType`, carrying the payload as cause
//!
//! Step 2 runs before step 3, so asserting on `AssertionError` itself works.
//! There is no subtype matching; a newtype around `T` is a different type.
//!
//! `throw` skips the panic hook, so an uncaught throw fails its test without
//! a "panicked at" line. Plain `panic!` payloads still go through the hook.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use crate::error::AssertionError;

const OPAQUE_PAYLOAD: &str = "<opaque panic payload>";

/// Runtime descriptor of a failure type.
///
/// Compared by `TypeId` only; the name is for messages.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    fn opaque(id: TypeId) -> Self {
        Self {
            id,
            name: OPAQUE_PAYLOAD,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: Any + ?Sized>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Panic payload produced by `throw`
pub(crate) struct Thrown {
    tag: TypeTag,
    value: Box<dyn Any + Send>,
}

impl Thrown {
    pub(crate) fn new<E: Any + Send>(value: E) -> Self {
        Self {
            tag: TypeTag::of::<E>(),
            value: Box::new(value),
        }
    }

    /// Move the value out if it is an `E`, otherwise hand the wrapper back
    pub(crate) fn take<E: Any>(self: Box<Self>) -> Result<E, Box<Self>> {
        let Thrown { tag, value } = *self;
        match value.downcast::<E>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Box::new(Thrown { tag, value })),
        }
    }
}

/// Throw `failure` by unwinding with it.
///
/// Unwinds through `resume_unwind`, so the panic hook is not invoked and a
/// caught throw prints nothing.
pub fn throw<E: Any + Send>(failure: E) -> ! {
    panic::resume_unwind(Box::new(Thrown::new(failure)))
}

fn payload_tag(payload: &(dyn Any + Send)) -> TypeTag {
    if let Some(thrown) = payload.downcast_ref::<Thrown>() {
        thrown.tag
    } else if payload.is::<&'static str>() {
        TypeTag::of::<&'static str>()
    } else if payload.is::<String>() {
        TypeTag::of::<String>()
    } else if payload.is::<AssertionError>() {
        TypeTag::of::<AssertionError>()
    } else {
        TypeTag::opaque((*payload).type_id())
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> Option<String> {
    let value = match payload.downcast_ref::<Thrown>() {
        Some(thrown) => &*thrown.value,
        None => payload,
    };
    if let Some(s) = value.downcast_ref::<&'static str>() {
        Some((*s).to_string())
    } else if let Some(s) = value.downcast_ref::<String>() {
        Some(s.clone())
    } else {
        value.downcast_ref::<AssertionError>().map(|e| e.to_string())
    }
}

/// Take the value out of a payload if it is exactly a `T`
fn downcast_exact<T: Any>(payload: Box<dyn Any + Send>) -> Result<T, Box<dyn Any + Send>> {
    match payload.downcast::<Thrown>() {
        Ok(thrown) => thrown.take::<T>().map_err(|thrown| thrown as Box<dyn Any + Send>),
        Err(raw) => raw.downcast::<T>().map(|value| *value),
    }
}

/// A failure value captured from a protected block.
pub struct CapturedFailure {
    tag: TypeTag,
    message: Option<String>,
    payload: Mutex<Box<dyn Any + Send>>,
}

impl CapturedFailure {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        Self {
            tag: payload_tag(&*payload),
            message: payload_message(&*payload),
            payload: Mutex::new(payload),
        }
    }

    /// The runtime type of the captured value
    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    /// The panic message, for string payloads and assertion errors
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is<E: Any>(&self) -> bool {
        self.tag.is::<E>()
    }

    /// The original panic payload, suitable for `resume_unwind`
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recover the captured value as an `E`
    pub fn downcast<E: Any>(self) -> Result<E, Self> {
        downcast_exact::<E>(self.into_payload()).map_err(Self::from_payload)
    }
}

impl fmt::Debug for CapturedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedFailure")
            .field("type", &self.tag.name)
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for CapturedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message {
            Some(ref message) => write!(f, "{}: {}", self.tag, message),
            None => write!(f, "{}", self.tag),
        }
    }
}

impl std::error::Error for CapturedFailure {}

/// Run `block` and classify what it throws against `T`.
///
/// Returns the thrown `T` on an exact match and an `AssertionError` of
/// kind `NoFailureThrown` or `WrongFailureType` otherwise. An
/// `AssertionError` thrown by the block (when `T` is something else)
/// resumes unwinding with the original payload.
pub fn catch_exact<T, R>(block: impl FnOnce() -> R) -> Result<T, AssertionError>
where
    T: Any + Send,
{
    let expected = TypeTag::of::<T>();
    let payload = match panic::catch_unwind(AssertUnwindSafe(block)) {
        Ok(_) => {
            tracing::trace!(expected = %expected, "block completed without failure");
            return Err(AssertionError::no_failure_thrown(expected));
        }
        Err(payload) => payload,
    };

    let payload = match downcast_exact::<T>(payload) {
        Ok(value) => return Ok(value),
        Err(payload) => payload,
    };

    let actual = payload_tag(&*payload);
    if actual.is::<AssertionError>() {
        tracing::trace!(expected = %expected, "re-raising assertion error");
        panic::resume_unwind(payload);
    }

    tracing::trace!(expected = %expected, actual = %actual, "failure type mismatch");
    Err(AssertionError::wrong_failure_type(
        expected,
        CapturedFailure::from_payload(payload),
    ))
}

/// Assert that `block` throws exactly a `T` and return it.
///
/// ```rust,ignore
/// let err = assert_exact_type::<ParseFailure>(|| parse_or_throw("%%"));
/// assert_eq!(err.offset, 0);
/// ```
pub fn assert_exact_type<T>(block: impl FnOnce()) -> T
where
    T: Any + Send,
{
    catch_exact::<T, ()>(block).unwrap_or_else(|err| err.raise())
}

/// Like `assert_exact_type`, for blocks that produce a value.
pub fn assert_exact_type_any<T, R>(block: impl FnOnce() -> R) -> T
where
    T: Any + Send,
{
    catch_exact::<T, R>(block).unwrap_or_else(|err| err.raise())
}
