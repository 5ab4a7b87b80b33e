//! Mock measurement engine for tests and demos.
//!
//! Simulates the automation boundary of a CANalyzer-class application
//! without any COM or hardware dependency. All state lives behind async-safe
//! primitives, and the measurement start is simulated on a spawned task so
//! the initialized event races caller code the way the real engine's event
//! delivery does.
//!
//! # Behavior
//!
//! - `open` fails for a configurable number of leading attempts
//!   (to exercise the session's retry protocol), then succeeds.
//! - `start_measurement` spawns a task that waits a simulated init delay,
//!   fires every registered initialized listener, then flips the running
//!   flag. With `never_runs`, the start command is accepted but the run
//!   never initializes.
//! - CAPL functions and signal values are plain tables the test sets up;
//!   function invocations are recorded for inspection.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = MockEngine::new().with_open_failures(2);
//! let init = engine.provide_function("InitTest").await;
//! init.returns(EngineValue::Int(42)).await;
//!
//! let session = Session::open(Arc::new(engine.clone()), cfg, None, settings).await?;
//! assert_eq!(engine.open_attempts(), 3);
//! ```

use crate::engine::{CallableFunction, InitializedListener, MeasurementEngine};
use crate::value::EngineValue;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{sleep, Duration};

/// A scripted CAPL function inside the [`MockEngine`].
///
/// Records every invocation (with its optional argument) and returns a
/// configurable value, or fails when marked failing.
pub struct MockFunction {
    name: String,
    result: RwLock<EngineValue>,
    calls: Mutex<Vec<Option<EngineValue>>>,
    fail: AtomicBool,
}

impl MockFunction {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            result: RwLock::new(EngineValue::Null),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Set the value every subsequent invocation returns.
    pub async fn returns(&self, value: EngineValue) {
        *self.result.write().await = value;
    }

    /// Make every subsequent invocation fail.
    pub fn fail_calls(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Arguments of all recorded invocations, `None` for the zero-arg form.
    pub async fn recorded_calls(&self) -> Vec<Option<EngineValue>> {
        self.calls.lock().await.clone()
    }

    /// Number of recorded invocations.
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl CallableFunction for MockFunction {
    async fn call(&self) -> Result<EngineValue> {
        self.calls.lock().await.push(None);
        if self.fail.load(Ordering::SeqCst) {
            bail!("simulated runtime error in '{}'", self.name);
        }
        Ok(self.result.read().await.clone())
    }

    async fn call_with(&self, value: EngineValue) -> Result<EngineValue> {
        self.calls.lock().await.push(Some(value));
        if self.fail.load(Ordering::SeqCst) {
            bail!("simulated runtime error in '{}'", self.name);
        }
        Ok(self.result.read().await.clone())
    }
}

#[derive(Default)]
struct MockEngineState {
    open_failures: AtomicU32,
    open_attempts: AtomicU32,
    opened: AtomicBool,
    running: AtomicBool,
    never_runs: AtomicBool,
    init_delay_ms: AtomicU64,
    compile_calls: AtomicU32,
    lookup_calls: AtomicU32,
    quit_called: AtomicBool,
    functions: RwLock<HashMap<String, Arc<MockFunction>>>,
    signals: RwLock<HashMap<String, EngineValue>>,
    listeners: RwLock<Vec<Arc<dyn InitializedListener>>>,
    output: RwLock<Vec<String>>,
}

/// In-process stand-in for the measurement application.
///
/// Cheap to clone; all clones share state, so tests keep one handle for
/// inspection while the session owns another.
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<MockEngineState>,
}

impl MockEngine {
    /// Create a mock engine that opens on the first attempt and initializes
    /// 10 ms after the start command.
    pub fn new() -> Self {
        let engine = Self::default();
        engine.state.init_delay_ms.store(10, Ordering::SeqCst);
        engine
    }

    /// Fail the first `count` open attempts before succeeding.
    pub fn with_open_failures(self, count: u32) -> Self {
        self.state.open_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Delay between the start command and the initialized event.
    pub fn with_init_delay(self, delay: Duration) -> Self {
        self.state
            .init_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    /// Accept the start command but never initialize or report running.
    pub fn never_runs(self) -> Self {
        self.state.never_runs.store(true, Ordering::SeqCst);
        self
    }

    /// Register a resolvable CAPL function and return it for inspection.
    pub async fn provide_function(&self, name: &str) -> Arc<MockFunction> {
        let func = Arc::new(MockFunction::new(name));
        self.state
            .functions
            .write()
            .await
            .insert(name.to_string(), func.clone());
        func
    }

    /// Set the value a signal read returns.
    pub async fn set_signal(&self, channel: &str, message: &str, signal: &str, value: EngineValue) {
        self.state
            .signals
            .write()
            .await
            .insert(signal_key(channel, message, signal), value);
    }

    /// Deliver the initialized event to all listeners immediately.
    pub async fn fire_initialized(&self) {
        let listeners = self.state.listeners.read().await.clone();
        for listener in listeners {
            listener.on_initialized().await;
        }
    }

    /// Total open attempts the engine has seen.
    pub fn open_attempts(&self) -> u32 {
        self.state.open_attempts.load(Ordering::SeqCst)
    }

    /// Number of compile commands received.
    pub fn compile_calls(&self) -> u32 {
        self.state.compile_calls.load(Ordering::SeqCst)
    }

    /// Number of function-handle lookups received.
    pub fn lookup_calls(&self) -> u32 {
        self.state.lookup_calls.load(Ordering::SeqCst)
    }

    /// Whether the quit command was received.
    pub fn quit_called(&self) -> bool {
        self.state.quit_called.load(Ordering::SeqCst)
    }

    /// Lines written to the simulated output window.
    pub async fn output_lines(&self) -> Vec<String> {
        self.state.output.read().await.clone()
    }
}

#[async_trait]
impl MeasurementEngine for MockEngine {
    async fn open(&self, config_path: &Path) -> Result<()> {
        self.state.open_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.state.open_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state
                .open_failures
                .store(remaining - 1, Ordering::SeqCst);
            bail!("simulated open failure for '{}'", config_path.display());
        }
        self.state.opened.store(true, Ordering::SeqCst);
        debug!("Mock engine opened configuration: {}", config_path.display());
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        self.state.quit_called.store(true, Ordering::SeqCst);
        self.state.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn write_output(&self, text: &str) -> Result<()> {
        self.state.output.write().await.push(text.to_string());
        Ok(())
    }

    async fn start_measurement(&self) -> Result<()> {
        if !self.state.opened.load(Ordering::SeqCst) {
            bail!("no measurement configuration loaded");
        }
        if self.state.never_runs.load(Ordering::SeqCst) {
            return Ok(());
        }

        // Initialization happens off the caller's task, like the real
        // engine's event delivery. Listeners fire before the running flag
        // flips, so functions are callable by the time a start-waiter
        // observes running=true.
        let state = self.state.clone();
        tokio::spawn(async move {
            let delay = state.init_delay_ms.load(Ordering::SeqCst);
            sleep(Duration::from_millis(delay)).await;
            let listeners = state.listeners.read().await.clone();
            for listener in listeners {
                listener.on_initialized().await;
            }
            state.running.store(true, Ordering::SeqCst);
        });
        Ok(())
    }

    async fn is_running(&self) -> Result<bool> {
        Ok(self.state.running.load(Ordering::SeqCst))
    }

    async fn get_signal(&self, channel: &str, message: &str, signal: &str) -> Result<EngineValue> {
        self.state
            .signals
            .read()
            .await
            .get(&signal_key(channel, message, signal))
            .cloned()
            .ok_or_else(|| anyhow!("unknown signal {}::{} on {}", message, signal, channel))
    }

    async fn compile_script(&self) -> Result<()> {
        self.state.compile_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_function(&self, name: &str) -> Result<Arc<dyn CallableFunction>> {
        self.state.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .functions
            .read()
            .await
            .get(name)
            .map(|f| f.clone() as Arc<dyn CallableFunction>)
            .ok_or_else(|| anyhow!("function '{}' not available in measurement", name))
    }

    async fn subscribe_initialized(&self, listener: Arc<dyn InitializedListener>) {
        self.state.listeners.write().await.push(listener);
    }
}

fn signal_key(channel: &str, message: &str, signal: &str) -> String {
    format!("{}/{}/{}", channel, message, signal)
}
