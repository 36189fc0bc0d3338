//! Drives a real Node.js target through the full session lifecycle. Skips
//! gracefully when `node` isn't available on PATH.

use cdp_debugger_mcp::session::state::SessionState;
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

fn write_fixture(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".js").tempfile().expect("create fixture file");
    file.write_all(body.as_bytes()).expect("write fixture body");
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn session_starts_paused_then_resumes_and_stops() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }

    let fixture = write_fixture("let x = 1;\nx += 1;\nconsole.log(x);\n");
    let path = fixture.path().to_str().unwrap().to_string();

    let manager = SessionManager::new(Config::default());
    let session = manager
        .start_session("node", &[path], None, &[], Some(Duration::from_secs(10)))
        .await
        .expect("start session");

    assert_eq!(session.state().await, SessionState::Paused);
    assert_eq!(manager.active_count().await, 1);

    session.resume().await.expect("resume");
    manager.stop_session(&session.id).await.expect("stop session");

    assert_eq!(manager.active_count().await, 0);
    assert_eq!(session.state().await, SessionState::Stopped);
}
