// error.rs — Error types for each layer of the overlay.
//
// Only `OverlayError` is ever fatal. Read errors are absorbed at the slot or
// frame boundary by the caller.

use thiserror::Error;

/// A failed read from the remote address space.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("address {address:#x} (+{len}) is not readable")]
    Unmapped { address: u64, len: usize },

    #[error("short read at {address:#x}: wanted {wanted} bytes, got {got}")]
    Short { address: u64, wanted: usize, got: usize },

    #[error("pointer at {address:#x} is null")]
    Null { address: u64 },

    #[error("target process is gone")]
    ProcessGone,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug)]
pub enum OffsetsError {
    #[error("offset table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("offset `{name}` missing from module `{module}`")]
    Missing { module: String, name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start-up failures. These are surfaced to the operator and end the run.
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("module `{0}` not found in target process")]
    ModuleNotFound(String),

    #[error("target window not found (title {title:?}, class {class:?})")]
    WindowNotFound { title: String, class: String },

    #[error("overlay window creation failed: {0}")]
    WindowCreation(String),

    #[error("offset {offset:#x} overflows module `{module}` at {base:#x}")]
    AddressOverflow { module: String, base: u64, offset: u64 },

    #[error(transparent)]
    Offsets(#[from] OffsetsError),
}
