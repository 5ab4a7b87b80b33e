//! Measurement session lifecycle and caller-facing surface.
//!
//! A [`Session`] owns exactly one engine connection and drives the startup
//! protocol:
//!
//! ```text
//! Unopened -> Opening (retrying) -> Open -> Started -> Running -> Shutdown
//! ```
//!
//! `Opening` loops on itself up to the configured retry ceiling before
//! either reaching `Open` or failing the session for good with
//! [`BridgeError::StartupFailure`]. Once open, the session constructs the
//! function registry, wires a [`ReadinessNotifier`] to the engine's
//! initialized event, issues the start command, and polls at a fixed
//! interval until the engine reports running — bounded by
//! `running_timeout`, after which [`BridgeError::RunningTimeout`] fires.
//!
//! After a successful open the caller gets the signal read/write and
//! named-function-call surface. `Shutdown` is terminal; issuing operations
//! after it is a caller error and is not guarded against here.

use crate::config::BridgeSettings;
use crate::engine::MeasurementEngine;
use crate::error::{BridgeError, BridgeResult};
use crate::notifier::ReadinessNotifier;
use crate::registry::{CallOutcome, FunctionRegistry};
use crate::value::EngineValue;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};

/// Lifecycle state of a measurement session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No configuration loaded yet.
    Unopened,
    /// Open attempts in progress (may retry).
    Opening,
    /// Configuration loaded, measurement not started.
    Open,
    /// Start command issued, waiting for running.
    Started,
    /// Measurement reports running; full surface available.
    Running,
    /// Quit issued; terminal.
    Shutdown,
}

/// One live connection to the measurement application.
pub struct Session {
    engine: Arc<dyn MeasurementEngine>,
    registry: Arc<FunctionRegistry>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Open a configuration and bring the measurement up.
    ///
    /// Retries the open up to `settings.max_retries` times, logging a
    /// warning with the attempt number on each failure and sleeping
    /// `settings.retry_delay` in between. Exhausting the budget fails with
    /// [`BridgeError::StartupFailure`] and leaves no usable connection.
    ///
    /// On success the CAPL script (if any) is scanned and compiled, the
    /// readiness notifier is subscribed, the measurement is started, and
    /// the call blocks until the engine reports running or
    /// `settings.running_timeout` expires.
    pub async fn open(
        engine: Arc<dyn MeasurementEngine>,
        config_path: &Path,
        script_path: Option<&Path>,
        settings: BridgeSettings,
    ) -> BridgeResult<Self> {
        open_with_retry(&engine, config_path, &settings).await?;

        let registry = Arc::new(FunctionRegistry::new(engine.clone(), script_path).await?);
        let notifier = Arc::new(ReadinessNotifier::new(registry.clone()));
        engine.subscribe_initialized(notifier).await;

        engine
            .write_output("Starting measurement...")
            .await
            .map_err(BridgeError::Engine)?;
        engine
            .start_measurement()
            .await
            .map_err(BridgeError::Engine)?;

        wait_until_running(&engine, &settings).await?;

        engine
            .write_output("Measurement started.")
            .await
            .map_err(BridgeError::Engine)?;
        info!("Measurement session is running");

        Ok(Self {
            engine,
            registry,
            state: RwLock::new(SessionState::Running),
        })
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Function names discovered from the session's CAPL script.
    pub fn function_names(&self) -> &[String] {
        self.registry.function_names()
    }

    /// Terminate the measurement application and release the connection.
    pub async fn shutdown(&self) -> BridgeResult<()> {
        info!("Shutting down measurement session");
        self.engine.quit().await.map_err(BridgeError::Engine)?;
        *self.state.write().await = SessionState::Shutdown;
        Ok(())
    }

    /// Read a bus signal and convert it to a floating-point number.
    pub async fn read_signal(
        &self,
        channel: &str,
        message: &str,
        signal: &str,
    ) -> BridgeResult<f64> {
        let value = self
            .engine
            .get_signal(channel, message, signal)
            .await
            .map_err(|e| {
                error!(
                    "Failed to read signal {}::{} on {}: {:#}",
                    message, signal, channel, e
                );
                BridgeError::SignalRead(e.to_string())
            })?;

        value.as_f64().ok_or_else(|| {
            BridgeError::SignalRead(format!(
                "signal {}::{} produced non-numeric value '{}'",
                message, signal, value
            ))
        })
    }

    /// Write a signal by calling its `{message}_{signal}` CAPL setter.
    ///
    /// Delegates to [`Session::call_function`]; "function not found" and
    /// "found but failed" are not distinguished at this layer.
    pub async fn write_signal(
        &self,
        message: &str,
        signal: &str,
        value: EngineValue,
    ) -> BridgeResult<CallOutcome> {
        let func_name = format!("{}_{}", message, signal);
        self.call_function(&func_name, Some(value), false).await
    }

    /// Call a CAPL function by name with an optional argument.
    ///
    /// With `want_return`, the engine's result value comes back as
    /// [`CallOutcome::Value`]; otherwise a successful invocation yields
    /// [`CallOutcome::Completed`].
    pub async fn call_function(
        &self,
        name: &str,
        value: Option<EngineValue>,
        want_return: bool,
    ) -> BridgeResult<CallOutcome> {
        self.registry.call(name, value, want_return).await
    }
}

/// Retrying open protocol. Races in the engine's own startup make early
/// open attempts flaky, hence the fixed-interval retry budget.
async fn open_with_retry(
    engine: &Arc<dyn MeasurementEngine>,
    config_path: &Path,
    settings: &BridgeSettings,
) -> BridgeResult<()> {
    let mut attempt = 0;
    loop {
        match engine.open(config_path).await {
            Ok(()) => {
                info!(
                    "Measurement configuration loaded: {}",
                    config_path.display()
                );
                return Ok(());
            }
            Err(e) => {
                attempt += 1;
                warn!(
                    "[Attempt {}] measurement engine failed to open: {:#}",
                    attempt, e
                );
                if attempt >= settings.max_retries {
                    return Err(BridgeError::StartupFailure { attempts: attempt });
                }
                sleep(settings.retry_delay).await;
            }
        }
    }
}

/// Fixed-interval poll for running=true, bounded by the configured timeout.
async fn wait_until_running(
    engine: &Arc<dyn MeasurementEngine>,
    settings: &BridgeSettings,
) -> BridgeResult<()> {
    let deadline = Instant::now() + settings.running_timeout;
    loop {
        if engine.is_running().await.map_err(BridgeError::Engine)? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            error!(
                "Measurement did not report running within {:?}",
                settings.running_timeout
            );
            return Err(BridgeError::RunningTimeout(settings.running_timeout));
        }
        sleep(settings.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use std::time::Duration;

    fn fast_settings() -> BridgeSettings {
        BridgeSettings {
            max_retries: 5,
            retry_delay: Duration::from_millis(5),
            poll_interval: Duration::from_millis(5),
            running_timeout: Duration::from_millis(500),
            ..BridgeSettings::default()
        }
    }

    #[tokio::test]
    async fn test_open_retries_then_succeeds() {
        let engine = MockEngine::new().with_open_failures(2);
        let settings = BridgeSettings {
            max_retries: 3,
            ..fast_settings()
        };

        let session = Session::open(
            Arc::new(engine.clone()),
            Path::new("sim.cfg"),
            None,
            settings,
        )
        .await
        .unwrap();

        assert_eq!(engine.open_attempts(), 3);
        assert_eq!(session.state().await, SessionState::Running);
    }

    #[tokio::test]
    async fn test_open_exhausts_retry_budget() {
        let engine = MockEngine::new().with_open_failures(10);
        let settings = BridgeSettings {
            max_retries: 3,
            ..fast_settings()
        };

        let result = Session::open(
            Arc::new(engine.clone()),
            Path::new("sim.cfg"),
            None,
            settings,
        )
        .await;

        assert!(matches!(
            result,
            Err(BridgeError::StartupFailure { attempts: 3 })
        ));
        // No further attempts after the budget is spent.
        assert_eq!(engine.open_attempts(), 3);
    }

    #[tokio::test]
    async fn test_running_wait_is_bounded() {
        let engine = MockEngine::new().never_runs();
        let settings = BridgeSettings {
            running_timeout: Duration::from_millis(50),
            ..fast_settings()
        };

        let result =
            Session::open(Arc::new(engine), Path::new("sim.cfg"), None, settings).await;
        assert!(matches!(result, Err(BridgeError::RunningTimeout(_))));
    }

    #[tokio::test]
    async fn test_read_signal_converts_stringable() {
        let engine = MockEngine::new();
        engine
            .set_signal("CAN1", "EngineData", "EngSpeed", EngineValue::Str("2500".into()))
            .await;

        let session = Session::open(
            Arc::new(engine),
            Path::new("sim.cfg"),
            None,
            fast_settings(),
        )
        .await
        .unwrap();

        let value = session.read_signal("CAN1", "EngineData", "EngSpeed").await.unwrap();
        assert_eq!(value, 2500.0);
    }

    #[tokio::test]
    async fn test_read_signal_non_numeric_fails() {
        let engine = MockEngine::new();
        engine
            .set_signal("CAN1", "Status", "Mode", EngineValue::Str("offline".into()))
            .await;

        let session = Session::open(
            Arc::new(engine),
            Path::new("sim.cfg"),
            None,
            fast_settings(),
        )
        .await
        .unwrap();

        let result = session.read_signal("CAN1", "Status", "Mode").await;
        assert!(matches!(result, Err(BridgeError::SignalRead(_))));
    }

    #[tokio::test]
    async fn test_read_unknown_signal_fails() {
        let engine = MockEngine::new();
        let session = Session::open(
            Arc::new(engine),
            Path::new("sim.cfg"),
            None,
            fast_settings(),
        )
        .await
        .unwrap();

        let result = session.read_signal("CAN1", "Nope", "Missing").await;
        assert!(matches!(result, Err(BridgeError::SignalRead(_))));
    }

    #[tokio::test]
    async fn test_shutdown_quits_engine() {
        let engine = MockEngine::new();
        let session = Session::open(
            Arc::new(engine.clone()),
            Path::new("sim.cfg"),
            None,
            fast_settings(),
        )
        .await
        .unwrap();

        session.shutdown().await.unwrap();
        assert!(engine.quit_called());
        assert_eq!(session.state().await, SessionState::Shutdown);
    }

    #[tokio::test]
    async fn test_output_window_messages() {
        let engine = MockEngine::new();
        let _session = Session::open(
            Arc::new(engine.clone()),
            Path::new("sim.cfg"),
            None,
            fast_settings(),
        )
        .await
        .unwrap();

        let lines = engine.output_lines().await;
        assert_eq!(
            lines,
            vec!["Starting measurement...".to_string(), "Measurement started.".to_string()]
        );
    }
}
