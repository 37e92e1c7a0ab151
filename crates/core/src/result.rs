//! Result type definition and extension traits for Railway-Oriented Programming.
//!
//! Provides tap-style combinators so that logging side effects can be chained
//! onto fallible calls without unwrap/expect/panic.

use crate::error::Error;

/// The standard Result type for swarmwait core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Generic extension trait for any Result type.
///
/// Provides combinators for side effects and recovery.
pub trait GenericResultExt<T, E> {
    /// Perform a side effect on Err value without consuming the Result.
    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self;

    /// Turn errors matching `predicate` into `Ok(fallback)`.
    ///
    /// Used where an error means the desired outcome already holds, such as a
    /// delete of something that is already gone.
    fn recover_if<P: FnOnce(&E) -> bool>(self, predicate: P, fallback: T) -> Self;
}

impl<T, E> GenericResultExt<T, E> for std::result::Result<T, E> {
    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }

    fn recover_if<P: FnOnce(&E) -> bool>(self, predicate: P, fallback: T) -> Self {
        match self {
            Err(ref e) if predicate(e) => Ok(fallback),
            other => other,
        }
    }
}
