//! Typed error hierarchy for the analysis engine and its ambient collaborators.
//!
//! Fallible functions in this crate return `Result<_, Error>`; the CLI
//! binary wraps these in `anyhow::Result` at its boundary.

use std::path::PathBuf;

/// Errors raised while loading rules, discovering files, or constructing a
/// grammar for a file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A rule file failed to parse or was missing a required field.
    #[error("invalid rule file {path}: {reason}")]
    InvalidRule {
        /// Path to the offending rule file.
        path: PathBuf,
        /// Human-readable reason the rule was rejected.
        reason: String,
    },

    /// No grammar implementation exists for the detected language module.
    #[error("unknown language module {module}")]
    UnknownModule {
        /// The module name that could not be resolved to a grammar.
        module: String,
    },

    /// The file's bytes could not be decoded as UTF-8 text.
    #[error("undecodable file {path}")]
    Undecodable {
        /// Path to the file that failed to decode.
        path: PathBuf,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the I/O operation concerned.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Report generation or output failed.
    #[error("report error: {0}")]
    Report(String),
}

/// Convenience alias for results produced by this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
