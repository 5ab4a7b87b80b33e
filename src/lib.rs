//! Bridge between a host test-automation process and an external CAN-bus
//! measurement application, reached only through its automation interface.
//!
//! The crate opens a measurement configuration, scans a CAPL script for
//! declared functions, starts a live measurement run, and exposes a small
//! surface to read bus signals and invoke the script's functions by name
//! while the run is active.
//!
//! # Architecture
//!
//! ```text
//! Session ──owns──> MeasurementEngine (automation boundary, black box)
//!    │                     │
//!    ├──owns──> FunctionRegistry <──resolve_all── ReadinessNotifier
//!    │              (name → callable handle)            ▲
//!    │                                                  │
//!    └── subscribe_initialized ─────────────────────────┘
//! ```
//!
//! The engine cannot hand out live callable handles until its run has
//! initialized, so the registry keeps a "known by name, not yet callable"
//! state between construction and the engine's one-shot initialized event.
//! The [`ReadinessNotifier`] bridges that event to
//! [`FunctionRegistry::resolve_all`].
//!
//! # Example
//!
//! ```rust,ignore
//! use capl_bridge::{BridgeSettings, EngineValue, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Arc::new(connect_to_engine()?);
//!     let session = Session::open(
//!         engine,
//!         "config/measurement.cfg".as_ref(),
//!         Some("scripts/testsuite.can".as_ref()),
//!         BridgeSettings::default(),
//!     )
//!     .await?;
//!
//!     session.call_function("InitTest", Some(EngineValue::Int(2)), true).await?;
//!     let rpm = session.read_signal("CAN1", "EngineData", "EngSpeed").await?;
//!     println!("EngSpeed = {} rpm", rpm);
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod registry;
pub mod session;
pub mod value;

pub use config::BridgeSettings;
pub use engine::mock::{MockEngine, MockFunction};
pub use engine::{CallableFunction, InitializedListener, MeasurementEngine};
pub use error::{BridgeError, BridgeResult};
pub use notifier::ReadinessNotifier;
pub use registry::{CallOutcome, FunctionRegistry};
pub use session::{Session, SessionState};
pub use value::EngineValue;
