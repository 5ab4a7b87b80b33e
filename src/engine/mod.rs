//! Abstract boundary to the measurement application's automation interface.
//!
//! The measurement engine (a CANalyzer-class tool) is a black box to this
//! crate. Everything the bridge needs from it is captured by the
//! [`MeasurementEngine`] trait: open a configuration, start and observe the
//! measurement, read bus signals, compile the loaded CAPL script, and hand
//! out callable handles for its functions.
//!
//! # Event delivery
//!
//! The engine fires a one-shot "initialized" event when its running
//! environment becomes able to resolve callable handles. Delivery happens on
//! whatever task or thread the engine's runtime uses, so listeners must be
//! treated as concurrent with caller code. Registration is explicit via
//! [`MeasurementEngine::subscribe_initialized`]; the bridge assumes only
//! that the event eventually fires on some task, once per run start.
//!
//! # Error handling
//!
//! Boundary methods return `anyhow::Result`. The bridge maps these into its
//! own [`BridgeError`](crate::error::BridgeError) taxonomy where a failure
//! has a defined meaning, and wraps the rest opaquely.

pub mod mock;

use crate::value::EngineValue;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Observer for the engine's one-shot measurement-initialized event.
///
/// Invoked by the engine's event-delivery mechanism on an arbitrary task.
/// Implementations must tolerate racing with caller operations.
#[async_trait]
pub trait InitializedListener: Send + Sync {
    /// Called when the measurement environment is ready to resolve
    /// callable handles.
    async fn on_initialized(&self);
}

/// One resolved, invocable CAPL function inside the engine.
///
/// Handles stay valid for the duration of the measurement run that produced
/// them. The engine's calling convention has no "no value" sentinel: absence
/// of an argument means the zero-argument invocation form.
#[async_trait]
pub trait CallableFunction: Send + Sync {
    /// Invoke with zero arguments.
    async fn call(&self) -> Result<EngineValue>;

    /// Invoke with exactly one argument.
    async fn call_with(&self, value: EngineValue) -> Result<EngineValue>;
}

/// Capability set the bridge consumes from the measurement application.
#[async_trait]
pub trait MeasurementEngine: Send + Sync {
    /// Load a measurement configuration file.
    async fn open(&self, config_path: &Path) -> Result<()>;

    /// Terminate the measurement application.
    async fn quit(&self) -> Result<()>;

    /// Write a line to the application's output window.
    async fn write_output(&self, text: &str) -> Result<()>;

    /// Issue the measurement start command.
    async fn start_measurement(&self) -> Result<()>;

    /// Whether the measurement currently reports running.
    async fn is_running(&self) -> Result<bool>;

    /// Read the current value of a bus signal.
    async fn get_signal(
        &self,
        channel: &str,
        message: &str,
        signal: &str,
    ) -> Result<EngineValue>;

    /// Compile the CAPL script loaded with the configuration.
    async fn compile_script(&self) -> Result<()>;

    /// Resolve a callable handle for a named CAPL function.
    ///
    /// Only succeeds once the measurement environment has initialized.
    async fn get_function(&self, name: &str) -> Result<Arc<dyn CallableFunction>>;

    /// Register a listener for the one-shot initialized event.
    async fn subscribe_initialized(&self, listener: Arc<dyn InitializedListener>);
}
