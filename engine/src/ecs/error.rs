//! Error types for the entity/component core.
//!
//! Every fallible public operation in this crate returns `Result<T, Error>`.
//! Staleness is deliberately **not** an error variant here: per the data
//! model, a stale handle is an observable state (`is_alive() == false`),
//! not a thrown failure, so mutating operations on a stale handle return
//! quietly rather than populating this enum.

use std::fmt;

/// The error type produced by fallible operations on the store, schema
/// builder, and scheduler.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A component schema violates one of the closed-set/naming rules
    /// enforced at build time. Raised only when building a `Schema`; no
    /// partial schema is ever registered.
    #[error("ill-defined schema: {0}")]
    IllDefinedSchema(String),

    /// An argument was invalid for the requested operation: a null/missing
    /// value where disallowed, a template or owner from a different store,
    /// an empty view type set, or a violated validation constraint.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A `Result` subtype marked `singleton` was reported more than once
    /// within the same job execution.
    #[error("singleton result {0} reported more than once in this job")]
    SingletonResultReported(&'static str),

    /// A `Job` was submitted to a `Scheduler` other than the one it was
    /// built from.
    #[error("job was submitted to the wrong scheduler")]
    WrongScheduler,

    /// A user-supplied clone hook or field validator panicked, or a
    /// validator rejected a value outright. The triggering add/remove is
    /// rolled back (any row already allocated for it is released) before
    /// this propagates to the caller.
    #[error("{site} failed: {message}")]
    Callback {
        site: CallbackSite,
        message: String,
    },
}

impl Error {
    pub(crate) fn callback(site: CallbackSite, message: impl Into<String>) -> Self {
        Error::Callback {
            site,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Wraps a panic payload from a caught user callback into a readable string,
/// mirroring how the teacher engine logs worker-thread panics.
pub(crate) fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked with a non-string payload".to_string()
    }
}

impl fmt::Display for CallbackSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Small tag type used to annotate which callback site produced a
/// `Error::Callback`, purely for nicer log messages (e.g. `"field validator"`,
/// `"clone hook"`).
#[derive(Debug, Clone, Copy)]
pub struct CallbackSite(pub &'static str);
