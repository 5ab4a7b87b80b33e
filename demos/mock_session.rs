//! Walkthrough of a full bridge session against the mock engine.
//!
//! Run with: `cargo run --example mock_session`

use capl_bridge::{BridgeSettings, EngineValue, MockEngine, Session};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // In a real deployment these point at the measurement tool's .cfg and
    // the CAPL test script it loads.
    let mut script = tempfile::NamedTempFile::new()?;
    write!(
        script,
        "void InitTest(int x) {{ }}\n\
         int Helper() {{ }}\n\
         void EngineData_EngSpeed(int value) {{ }}"
    )?;

    let engine = MockEngine::new().with_init_delay(Duration::from_millis(50));
    let init_test = engine.provide_function("InitTest").await;
    init_test.returns(EngineValue::Int(1)).await;
    engine.provide_function("Helper").await;
    engine.provide_function("EngineData_EngSpeed").await;
    engine
        .set_signal("CAN1", "EngineData", "EngSpeed", EngineValue::Str("2500".into()))
        .await;

    let session = Session::open(
        Arc::new(engine.clone()),
        "measurement.cfg".as_ref(),
        Some(script.path()),
        BridgeSettings {
            poll_interval: Duration::from_millis(20),
            ..BridgeSettings::default()
        },
    )
    .await?;

    println!("Discovered functions: {:?}", session.function_names());

    session.call_function("InitTest", None, false).await?;
    let result = session
        .call_function("InitTest", Some(EngineValue::Int(2)), true)
        .await?;
    println!("InitTest(2) returned {:?}", result.into_value());

    let speed = session.read_signal("CAN1", "EngineData", "EngSpeed").await?;
    println!("EngSpeed = {} rpm", speed);

    session
        .write_signal("EngineData", "EngSpeed", EngineValue::Int(100))
        .await?;

    session.shutdown().await?;
    println!("Session shut down cleanly.");
    Ok(())
}
