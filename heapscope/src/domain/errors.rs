//! Structured error types for heapscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! [`ReadError`] is the transient class: heuristic code turns it into a miss.
//! [`InspectError`] is the fatal class and always names the offending entity.

use std::path::PathBuf;
use thiserror::Error;

/// A single read against the inspected address space failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("Address 0x{address:x} is not mapped")]
    NotMapped { address: u64 },

    #[error("Misaligned {width}-byte read at 0x{address:x}")]
    Misaligned { address: u64, width: usize },

    #[error("Implausible value at 0x{address:x}: {reason}")]
    Implausible { address: u64, reason: &'static str },

    #[error("Struct kind {0} is not bound in this runtime")]
    Unbound(&'static str),
}

#[derive(Error, Debug)]
pub enum ElfError {
    #[error("Not an ELF image (bad magic)")]
    BadMagic,

    #[error("Unsupported ELF class {0}")]
    UnsupportedClass(u8),

    #[error("Unsupported ELF data encoding {0}")]
    UnsupportedEncoding(u8),

    #[error("Unsupported ELF version {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed ELF image: {0}")]
    Malformed(#[from] object::read::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum InspectError {
    #[error("Required symbol {0} not found (is the target runtime loaded into this process?)")]
    MissingSymbol(String),

    #[error("Failed to read symbols from {}: {source}", path.display())]
    Elf {
        path: PathBuf,
        #[source]
        source: ElfError,
    },

    #[error("Type {0} is not described by the runtime type table")]
    MissingType(String),

    #[error("Constant {0} is not described by the runtime constant tables")]
    MissingConstant(String),

    #[error("Field {owner}::{field} ({signature}) is not described by the runtime field table")]
    MissingField { owner: String, field: String, signature: String },

    #[error("Field {owner}::{field} has type {found}, expected {expected}")]
    FieldSignatureMismatch { owner: String, field: String, expected: String, found: String },

    #[error("Field {owner}::{field} is {native} bytes wide but is read as {declared} bytes")]
    FieldWidthMismatch { owner: String, field: String, declared: usize, native: usize },

    #[error("Field {owner}::{field} at 0x{location:x} is not aligned for a {width}-byte read")]
    MisalignedField { owner: String, field: String, location: u64, width: usize },

    #[error("Field {owner}::{field} has type {signature} of unknown width")]
    UnknownFieldType { owner: String, field: String, signature: String },

    #[error("Unsupported heap layout: {0}")]
    UnsupportedHeap(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write report file: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
