//! Exit codes for the plate-ingest CLI.
//!
//! Exit codes communicate the run outcome without requiring output parsing.

use pi_common::Error;

/// Exit codes for plate-ingest operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every accepted directory and file was ingested
    Clean = 0,

    /// Run finished but some directories or files were skipped
    CompletedWithSkips = 1,

    /// Configuration error
    ConfigError = 10,

    /// Reference selection or reference load failed
    ReferenceError = 11,

    /// A frame could not be aligned to its reference schema
    SchemaMismatch = 12,

    /// I/O error
    IoError = 13,

    /// Output store error
    StoreError = 14,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates the run completed.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::CompletedWithSkips)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Exit code for a run that stopped on `error`.
    pub fn for_error(error: &Error) -> Self {
        match error {
            Error::Config(_) => ExitCode::ConfigError,
            Error::ReferenceSelection(_) | Error::ReferenceSamplingExhausted { .. } => {
                ExitCode::ReferenceError
            }
            Error::SchemaMismatch { .. } | Error::UnsupportedType { .. } => {
                ExitCode::SchemaMismatch
            }
            Error::DirectoryInvalid { .. }
            | Error::Io(_)
            | Error::IoAt { .. }
            | Error::Csv { .. } => ExitCode::IoError,
            Error::Store(_) | Error::WriterClosed { .. } => ExitCode::StoreError,
            Error::Json(_) | Error::Arrow(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
