// dixsearch: Double-indexed local alignment search
//
// Copyright 2024 Tommi Mäklin [tommi@maklin.fi].

// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.

// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
//! Crate-wide error type.
use std::path::PathBuf;

/// Errors returned by dixsearch.
///
/// Configuration errors ([Error::Config], [Error::UnsupportedFeature]) are
/// always raised before any index or sequence data is touched.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sequence file could not be parsed.
    #[error("could not parse sequence file {path}: {detail}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser message.
        detail: String,
    },

    /// Invalid or contradictory options.
    #[error("configuration error: {0}")]
    Config(String),

    /// Recognised option value that this build does not support.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Sequence sets cannot hold empty sequences.
    #[error("cannot add an empty sequence to a sequence set")]
    EmptySequence,

    /// Translation frame outside of ±1..±3.
    #[error("invalid translation frame {0}")]
    InvalidFrame(i8),

    /// An allocation failed while building or loading data.
    #[error("out of memory while {0}: reduce input size")]
    OutOfMemory(String),

    /// The pre-flight check estimated more memory than is available.
    #[error("estimated memory use of {required} bytes exceeds the {available} bytes available")]
    InsufficientMemory {
        /// Estimated requirement in bytes.
        required: usize,
        /// Detected available memory in bytes.
        available: usize,
    },

    /// Index files are missing, truncated or inconsistent.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Internal consistency check failed while processing a query block.
    #[error("query block {block}: {detail}")]
    Block {
        /// Index of the failed block.
        block: usize,
        /// What went wrong.
        detail: String,
    },

    /// Every query block failed.
    #[error("all {0} query blocks failed")]
    AllBlocksFailed(usize),
}

/// Shorthand for results with [Error].
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::collections::TryReserveError> for Error {
    fn from(err: std::collections::TryReserveError) -> Error {
        Error::OutOfMemory(format!("reserving memory ({})", err))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    #[test]
    fn out_of_memory_message_mentions_input_size() {
        let err = super::Error::OutOfMemory("building the suffix array".to_string());
        assert_eq!(err.to_string(), "out of memory while building the suffix array: reduce input size");
    }

    #[test]
    fn try_reserve_failure_converts_to_out_of_memory() {
        let mut v: Vec<u64> = Vec::new();
        let err: super::Error = v.try_reserve(usize::MAX).unwrap_err().into();
        assert!(matches!(err, super::Error::OutOfMemory(_)));
    }
}
