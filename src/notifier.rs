//! One-shot bridge from the engine's initialized event to function
//! resolution.

use crate::engine::InitializedListener;
use crate::registry::FunctionRegistry;
use async_trait::async_trait;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Listener that triggers [`FunctionRegistry::resolve_all`] when the
/// measurement environment becomes ready.
///
/// Holds no state beyond the registry and a fired-once latch: the engine
/// delivers the initialized event once per run start, and the notifier does
/// not re-arm on stop/restart. Resolution failures are handled inside
/// `resolve_all` (non-fatal per name); the notifier itself never errors.
pub struct ReadinessNotifier {
    registry: Arc<FunctionRegistry>,
    fired: AtomicBool,
}

impl ReadinessNotifier {
    /// Create a notifier bound to the registry it will resolve.
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            fired: AtomicBool::new(false),
        }
    }

    /// Whether the initialized event has been delivered.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InitializedListener for ReadinessNotifier {
    async fn on_initialized(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("Ignoring repeated measurement-initialized event");
            return;
        }
        self.registry.resolve_all().await;
    }
}
