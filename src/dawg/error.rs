use std::io;

use thiserror::Error;

/// Errors reported by builders and finders.
#[derive(Error, Debug)]
pub enum DawgError {
    /// Words were not added in strictly increasing lexicographic order.
    ///
    /// Carries the previously added word and the offending word.
    #[error("words not in alphabetical order: {word:?} added after {previous:?}")]
    OrderViolation {
        /// The most recently added word.
        previous: String,
        /// The word that failed to be added.
        word: String,
    },

    /// `add` was called on a builder that has already been finished.
    #[error("word added to a finished builder")]
    AfterFinish,

    /// A serialization operation was invoked before `finish`.
    #[error("builder has not been finished")]
    NotFinished,

    /// `at_index` was called with an index outside `[0, num_added)`.
    #[error("index {index} out of range for {len} words")]
    OutOfRange {
        /// The requested index.
        index: usize,
        /// The number of words in the dictionary.
        len: usize,
    },

    /// A query was issued after `close` released the byte source.
    #[error("finder is closed")]
    Closed,

    /// A value does not fit the variable-length integer encoding.
    #[error("value {0} exceeds the maximum varint width")]
    EncodingLimit(u64),

    /// The byte source or sink failed, or the image is corrupt (a bit
    /// offset left the declared image bounds).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DawgError>;

pub(crate) fn corrupt(msg: impl Into<String>) -> DawgError {
    DawgError::Io(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
}
