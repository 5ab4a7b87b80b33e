//! Discovery and invocation of CAPL functions.
//!
//! The registry bridges two moments in the session lifecycle that the
//! engine keeps apart:
//!
//! 1. **Discovery** happens at construction time, before the measurement
//!    runs. The CAPL source is scanned for function *declarations*, giving
//!    an ordered list of names that are "known but not yet callable".
//! 2. **Resolution** happens once the engine's initialized event fires.
//!    Each discovered name is exchanged for a live callable handle; names
//!    the engine cannot resolve stay absent from the mapping and surface as
//!    [`BridgeError::FunctionNotFound`] on call, never as a crash.
//!
//! The resolved mapping is written by the readiness callback on the
//! engine's task and read by the caller's own task, so it sits behind a
//! `tokio::sync::RwLock`. A call landing before resolution completes simply
//! misses the mapping and fails; it never blocks waiting for readiness.

use crate::engine::{CallableFunction, MeasurementEngine};
use crate::error::{BridgeError, BridgeResult};
use crate::value::EngineValue;
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Matches CAPL function declarations: a return-type keyword, whitespace,
/// an identifier, optional whitespace, an open parenthesis. Call sites and
/// other return types do not match; no trailing body is required.
static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:void|int|byte|word|dword|long|int64|qword)\s+(\w+)\s*\(")
        .expect("hard-coded declaration pattern is valid")
});

/// Extract declared function names from CAPL source text.
///
/// Names are returned in first-appearance order; duplicates in the source
/// are preserved as found.
pub fn extract_function_names(source: &str) -> Vec<String> {
    DECLARATION
        .captures_iter(source)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Result of a by-name function invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum CallOutcome {
    /// The invocation succeeded; its result was not requested.
    Completed,
    /// The invocation succeeded and produced this value.
    Value(EngineValue),
}

impl CallOutcome {
    /// The produced value, if one was requested.
    pub fn into_value(self) -> Option<EngineValue> {
        match self {
            CallOutcome::Completed => None,
            CallOutcome::Value(v) => Some(v),
        }
    }
}

/// Registry of CAPL functions discovered from a script and resolved against
/// the live measurement.
pub struct FunctionRegistry {
    engine: Arc<dyn MeasurementEngine>,
    script_path: Option<PathBuf>,
    names: Vec<String>,
    resolved: RwLock<HashMap<String, Arc<dyn CallableFunction>>>,
}

impl FunctionRegistry {
    /// Scan the script for declared functions and request compilation.
    ///
    /// With no script path the registry is empty and the engine is never
    /// touched. A compile failure is logged and does not abort
    /// construction; it resurfaces later as unresolvable functions.
    pub async fn new(
        engine: Arc<dyn MeasurementEngine>,
        script_path: Option<&Path>,
    ) -> BridgeResult<Self> {
        let mut names = Vec::new();

        if let Some(path) = script_path {
            let source = tokio::fs::read_to_string(path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    error!("CAPL script not found at path: {}", path.display());
                    BridgeError::ScriptNotFound(path.to_path_buf())
                } else {
                    error!("Error reading CAPL script {}: {}", path.display(), e);
                    BridgeError::ScriptRead {
                        path: path.to_path_buf(),
                        source: e,
                    }
                }
            })?;

            names = extract_function_names(&source);
            info!(
                "Discovered {} CAPL function(s) in {}",
                names.len(),
                path.display()
            );

            if !names.is_empty() {
                if let Err(e) = engine.compile_script().await {
                    warn!("CAPL compile command failed: {:#}", e);
                }
            }
        }

        Ok(Self {
            engine,
            script_path: script_path.map(Path::to_path_buf),
            names,
            resolved: RwLock::new(HashMap::new()),
        })
    }

    /// Names discovered from the script, in first-appearance order.
    pub fn function_names(&self) -> &[String] {
        &self.names
    }

    /// Path of the script the registry was built from, if any.
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }

    /// Number of names currently bound to live handles.
    pub async fn resolved_len(&self) -> usize {
        self.resolved.read().await.len()
    }

    /// Exchange every discovered name for a live callable handle.
    ///
    /// Invoked by the readiness callback once the measurement environment
    /// has initialized. A name the engine fails to resolve is logged and
    /// left out of the mapping; resolution of the remaining names
    /// continues. Re-running overwrites entries by name.
    pub async fn resolve_all(&self) {
        for name in &self.names {
            match self.engine.get_function(name).await {
                Ok(handle) => {
                    self.resolved.write().await.insert(name.clone(), handle);
                    debug!("Resolved CAPL function '{}'", name);
                }
                Err(e) => {
                    warn!("Failed to load CAPL function '{}': {:#}", name, e);
                }
            }
        }
        info!(
            "CAPL function resolution complete: {}/{} callable",
            self.resolved_len().await,
            self.names.len()
        );
    }

    /// Invoke a resolved function by name.
    ///
    /// `value` of `None` selects the zero-argument invocation form; the
    /// engine's calling convention has no "no value" argument sentinel.
    /// With `want_return` the engine's result value is handed back
    /// unchanged; otherwise a successful invocation yields
    /// [`CallOutcome::Completed`].
    pub async fn call(
        &self,
        name: &str,
        value: Option<EngineValue>,
        want_return: bool,
    ) -> BridgeResult<CallOutcome> {
        let handle = self.resolved.read().await.get(name).cloned();
        let Some(handle) = handle else {
            error!("CAPL function '{}' not found", name);
            return Err(BridgeError::FunctionNotFound(name.to_string()));
        };

        let result = match value {
            Some(v) => handle.call_with(v).await,
            None => handle.call().await,
        };

        match result {
            Ok(v) if want_return => Ok(CallOutcome::Value(v)),
            Ok(_) => Ok(CallOutcome::Completed),
            Err(e) => {
                error!("Error calling CAPL function '{}': {:#}", name, e);
                Err(BridgeError::FunctionCall {
                    name: name.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use std::io::Write;

    #[test]
    fn test_extracts_declarations_in_order() {
        let source = "void InitTest(int x) { }\nint Helper() { }";
        assert_eq!(extract_function_names(source), vec!["InitTest", "Helper"]);
    }

    #[test]
    fn test_all_return_type_keywords_match() {
        let source = "\
void A(\nint B(\nbyte C(\nword D(\ndword E(\nlong F(\nint64 G(\nqword H(";
        assert_eq!(
            extract_function_names(source),
            vec!["A", "B", "C", "D", "E", "F", "G", "H"]
        );
    }

    #[test]
    fn test_other_return_types_and_call_sites_ignored() {
        let source = "\
float NotCapl(int x) { }
double AlsoNot() { }
void Real(int x) {
  Helper(3);
}
";
        assert_eq!(extract_function_names(source), vec!["Real"]);
    }

    #[test]
    fn test_duplicates_preserved() {
        let source = "void Twice() { }\nvoid Twice() { }";
        assert_eq!(extract_function_names(source), vec!["Twice", "Twice"]);
    }

    #[test]
    fn test_declaration_must_start_line() {
        // Indented occurrences (e.g. inside comments or bodies) do not match.
        let source = "  void Indented() { }\nvoid TopLevel() { }";
        assert_eq!(extract_function_names(source), vec!["TopLevel"]);
    }

    #[test]
    fn test_whitespace_before_paren_allowed() {
        let source = "int Spaced   (int a)";
        assert_eq!(extract_function_names(source), vec!["Spaced"]);
    }

    #[tokio::test]
    async fn test_no_script_is_empty_and_silent() {
        let engine = MockEngine::new();
        let registry = FunctionRegistry::new(Arc::new(engine.clone()), None)
            .await
            .unwrap();
        assert!(registry.function_names().is_empty());
        assert_eq!(engine.compile_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_script_no_engine_interaction() {
        let engine = MockEngine::new();
        let result = FunctionRegistry::new(
            Arc::new(engine.clone()),
            Some(Path::new("/nonexistent/script.can")),
        )
        .await;
        assert!(matches!(result, Err(BridgeError::ScriptNotFound(_))));
        assert_eq!(engine.compile_calls(), 0);
        assert_eq!(engine.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn test_discovery_triggers_compile() {
        let engine = MockEngine::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "void InitTest(int x) {{ }}").unwrap();

        let registry = FunctionRegistry::new(Arc::new(engine.clone()), Some(file.path()))
            .await
            .unwrap();
        assert_eq!(registry.function_names(), ["InitTest"]);
        assert_eq!(engine.compile_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_discovery_skips_compile() {
        let engine = MockEngine::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "// nothing declared here").unwrap();

        let registry = FunctionRegistry::new(Arc::new(engine.clone()), Some(file.path()))
            .await
            .unwrap();
        assert!(registry.function_names().is_empty());
        assert_eq!(engine.compile_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_all_partial_failure_is_non_fatal() {
        let engine = MockEngine::new();
        engine.provide_function("Good").await;
        // "Bad" is discovered but the engine has no handle for it.
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "void Good() {{ }}\nvoid Bad() {{ }}").unwrap();

        let registry = FunctionRegistry::new(Arc::new(engine.clone()), Some(file.path()))
            .await
            .unwrap();
        registry.resolve_all().await;

        assert_eq!(registry.resolved_len().await, 1);
        assert!(registry.call("Good", None, false).await.is_ok());
        assert!(matches!(
            registry.call("Bad", None, false).await,
            Err(BridgeError::FunctionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_call_before_resolution_is_not_found() {
        let engine = MockEngine::new();
        engine.provide_function("Ready").await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "void Ready() {{ }}").unwrap();

        let registry = FunctionRegistry::new(Arc::new(engine.clone()), Some(file.path()))
            .await
            .unwrap();

        // Discovered but not yet resolved: unavailable, not a crash.
        assert!(matches!(
            registry.call("Ready", None, false).await,
            Err(BridgeError::FunctionNotFound(_))
        ));

        registry.resolve_all().await;
        assert!(registry.call("Ready", None, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_call_argument_and_return_conventions() {
        let engine = MockEngine::new();
        let func = engine.provide_function("Conv").await;
        func.returns(EngineValue::Int(99)).await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "int Conv(int x) {{ }}").unwrap();

        let registry = FunctionRegistry::new(Arc::new(engine.clone()), Some(file.path()))
            .await
            .unwrap();
        registry.resolve_all().await;

        // No value: zero-arg form, result handed back unchanged.
        let outcome = registry.call("Conv", None, true).await.unwrap();
        assert_eq!(outcome, CallOutcome::Value(EngineValue::Int(99)));

        // One value, no return requested: one-arg form, Completed.
        let outcome = registry
            .call("Conv", Some(EngineValue::Int(5)), false)
            .await
            .unwrap();
        assert_eq!(outcome, CallOutcome::Completed);

        let calls = func.recorded_calls().await;
        assert_eq!(calls, vec![None, Some(EngineValue::Int(5))]);
    }

    #[tokio::test]
    async fn test_invocation_failure_propagates() {
        let engine = MockEngine::new();
        let func = engine.provide_function("Flaky").await;
        func.fail_calls();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "void Flaky() {{ }}").unwrap();

        let registry = FunctionRegistry::new(Arc::new(engine.clone()), Some(file.path()))
            .await
            .unwrap();
        registry.resolve_all().await;

        assert!(matches!(
            registry.call("Flaky", None, false).await,
            Err(BridgeError::FunctionCall { .. })
        ));
    }
}
