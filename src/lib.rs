//! Tsundoku is a reading-progress tracker for the books you bought faster
//! than you read them. Every book on the shelf is paired with a character
//! persona resolved from its genre, and each progress change produces a fresh
//! in-character message nudging the reader to keep going.
//!
//! ## Core Components
//! - [`core`]: the data model, progress math, character catalog, persistence.
//! - [`services`]: dialogue generation (LLM-backed with a local fallback),
//!   the book operations layer, and the OpenBD bibliographic lookup.

pub mod core;
pub mod services;

use thiserror::Error;

/// Errors surfaced by the tsundoku library.
///
/// Only `Validation` and `NotFound` cross the operations boundary; the
/// persistence variants exist so the internal `Result`-returning storage
/// layer stays observable in tests while the public operations absorb them.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller supplied invalid input when creating a book.
    #[error("validation error: {0}")]
    Validation(String),
    /// The referenced book id is not in the collection.
    #[error("book not found: {0}")]
    NotFound(String),
    /// An I/O error occurred while reading or writing the collection.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for tsundoku operations.
pub type Result<T> = std::result::Result<T, Error>;
