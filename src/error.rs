//! Typed error domain for the joint calling core.
//!
//! Every fallible operation in this crate returns `Result<T, Error>`. There
//! is no `Ok`-shaped variant on `Error` itself: success is represented by
//! `Result::Ok`, matching ordinary Rust idiom rather than the status-code
//! style of the systems this crate's on-disk formats originated from.

use thiserror::Error as ThisError;

/// The three ways a request into this crate can fail.
///
/// `IOError` is the only retryable kind: it means a record store read
/// failed for a reason that may be transient (a dropped connection, a
/// truncated read). `Invalid` and `NotFound` are both fatal to the request
/// that triggered them and should not be retried without changing the
/// request itself.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A record store read failed. Retryable.
    #[error("I/O error: {0}")]
    IOError(String),

    /// A record, header, or configuration value was malformed. Fatal.
    #[error("invalid data: {0}")]
    Invalid(String),

    /// A requested sample is unknown to the store. Fatal.
    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
