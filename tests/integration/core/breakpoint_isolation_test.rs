//! Confirms breakpoints set on one session are invisible to a concurrent,
//! independent session against the same script (§5 concurrency model).

use cdp_debugger_mcp::session::state::BreakpointKind;
use cdp_debugger_mcp::session::SessionManager;
use cdp_debugger_mcp::Config;
use std::io::Write;
use std::time::Duration;

fn node_available() -> bool {
    std::process::Command::new("node")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn write_fixture() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".js").tempfile().expect("create fixture file");
    file.write_all(b"function add(a, b) {\n  return a + b;\n}\nadd(1, 2);\n").unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn breakpoints_do_not_leak_across_sessions() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }

    let fixture_a = write_fixture();
    let fixture_b = write_fixture();
    let manager = SessionManager::new(Config::default());

    let session_a = manager
        .start_session("node", &[fixture_a.path().to_str().unwrap().to_string()], None, &[], Some(Duration::from_secs(10)))
        .await
        .expect("start session a");
    let session_b = manager
        .start_session("node", &[fixture_b.path().to_str().unwrap().to_string()], None, &[], Some(Duration::from_secs(10)))
        .await
        .expect("start session b");

    session_a
        .breakpoints
        .create(BreakpointKind::Line, fixture_a.path().to_str().unwrap().to_string(), 2, None, None, None, None)
        .await
        .expect("set breakpoint on session a");

    assert_eq!(session_a.breakpoints.list().await.len(), 1);
    assert!(session_b.breakpoints.list().await.is_empty());

    manager.stop_session(&session_a.id).await.expect("stop session a");
    manager.stop_session(&session_b.id).await.expect("stop session b");
}
