//! # stateless-error
//!
//! The error type shared by every crate above the trie.
//!
//! An [`Error`] carries an [`ErrorKind`] to match on, an [`ErrorStatus`]
//! derived from it, the operation that raised it and key/value context.
//! Foreign errors are wrapped with `set_source` rather than converted.
//!
//! ```rust
//! use stateless_error::{Error, ErrorKind};
//!
//! fn check(expected: &str, claimed: &str) -> Result<(), Error> {
//!     if expected != claimed {
//!         return Err(Error::invalid_bundle("claimed root does not match")
//!             .with_operation("verifier::verify_bundle")
//!             .with_context("expected", expected)
//!             .with_context("claimed", claimed));
//!     }
//!     Ok(())
//! }
//!
//! let err = check("0xabc", "0xdef").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidBundle);
//! assert!(err.kind().is_rejection());
//! ```
//!
//! An error is handled once. Layers it passes through only add context or
//! a new operation name; they never re-wrap it.

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

pub type Result<T> = std::result::Result<T, Error>;
