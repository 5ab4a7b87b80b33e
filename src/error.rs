//! Custom error types for the bridge.
//!
//! This module defines the primary error type, `BridgeError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to classify the failures a caller has to be prepared for:
//!
//! - **`StartupFailure`**: the retry budget for opening the measurement
//!   configuration was exhausted. Fatal; no usable engine connection remains.
//! - **`ScriptNotFound`** / **`ScriptRead`**: the CAPL script path did not
//!   resolve, or the file could not be read as text. Fatal to registry
//!   construction when a script path was supplied.
//! - **`FunctionNotFound`**: a call was issued for a name that was never
//!   discovered, or was discovered but has not (yet) been resolved to a live
//!   handle. Recoverable; it signals "not ready or not real".
//! - **`FunctionCall`**: the engine rejected or errored during an invocation.
//!   Logged and re-raised, never swallowed.
//! - **`SignalRead`**: the engine's signal accessor failed or produced a
//!   value that is not numeric-convertible.
//! - **`RunningTimeout`**: the engine never reported a running measurement
//!   within the configured bound.
//!
//! Errors from the engine boundary that carry no bridge-level meaning are
//! wrapped in `Engine`, keeping the underlying `anyhow` chain intact.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the bridge error type.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Failure taxonomy for the measurement bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Opening the measurement configuration failed on every attempt.
    #[error("measurement engine failed to open after {attempts} attempts")]
    StartupFailure {
        /// Number of open attempts made before giving up.
        attempts: u32,
    },

    /// The CAPL script path did not resolve to a file.
    #[error("CAPL script not found at path: {0}")]
    ScriptNotFound(PathBuf),

    /// The CAPL script exists but could not be read as text.
    #[error("error reading CAPL script {path}: {source}")]
    ScriptRead {
        /// Path of the script that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// No resolved callable handle exists under this name.
    #[error("CAPL function '{0}' not found")]
    FunctionNotFound(String),

    /// The engine errored while invoking a resolved function.
    #[error("error calling CAPL function '{name}': {message}")]
    FunctionCall {
        /// Name of the function that failed.
        name: String,
        /// Engine-reported failure description.
        message: String,
    },

    /// The signal accessor failed or returned a non-numeric value.
    #[error("signal read failed: {0}")]
    SignalRead(String),

    /// The measurement never reported running within the configured bound.
    #[error("measurement did not report running within {0:?}")]
    RunningTimeout(Duration),

    /// Settings file could not be loaded or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Opaque failure from the engine's automation boundary.
    #[error("measurement engine error: {0}")]
    Engine(anyhow::Error),
}
