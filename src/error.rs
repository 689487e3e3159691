//! Error type of the public reader/writer API.
//!
//! The serialization layer below reports plain `io::Error`s; they
//! surface here as `FileRead`.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The brand set matches neither the still-image nor the
    /// image-sequence combination.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// Short read, broken box structure, or an underlying I/O failure.
    #[error("file read error: {0}")]
    FileRead(#[from] io::Error),

    #[error("invalid item id {0}")]
    InvalidItemId(u32),

    #[error("invalid context id {0}")]
    InvalidContextId(u32),

    #[error("invalid property index {0}")]
    InvalidPropertyIndex(u16),

    #[error("invalid sample description index {0}")]
    InvalidSampleDescriptionIndex(u32),

    /// Item data was requested for a protected item.
    #[error("item {0} is protected")]
    ProtectedItem(u32),

    /// A protection query on an unprotected item.
    #[error("item {0} is not protected")]
    UnprotectedItem(u32),

    /// The feature is not implemented for this file shape.
    #[error("not applicable: {0}")]
    NotApplicable(&'static str),

    /// A parameter-set parse failed structurally.
    #[error("media parsing error: {0}")]
    MediaParsing(String),

    #[error("invalid function parameter: {0}")]
    InvalidFunctionParameter(&'static str),

    /// A writer-time invariant was violated.
    #[error("writer validation error: {0}")]
    WriterValidation(String),

    /// The reader has not been initialized with a file.
    #[error("reader is not initialized")]
    Uninitialized,
}
