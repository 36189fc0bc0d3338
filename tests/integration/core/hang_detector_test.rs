//! Exercises the standalone hang detector against a busy-loop fixture and a
//! fast-exiting fixture, independent of `DebugSession`.

use cdp_debugger_mcp::hang_detector::detect_hang;
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
    file.write_all(body.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn busy_loop_is_not_classified_as_cleanly_completed() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }

    let fixture = write_fixture("while (true) {}\n");
    let path = fixture.path().to_str().unwrap().to_string();

    let report = detect_hang(
        "node",
        &[path],
        Duration::from_secs(2),
        Duration::from_millis(100),
        3,
        Duration::from_secs(10),
        Duration::from_secs(5),
    )
    .await
    .expect("detect_hang should not error on a busy loop");

    assert!(!report.completed);
}

#[tokio::test]
async fn quick_exit_is_classified_as_completed() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }

    let fixture = write_fixture("console.log('done');\n");
    let path = fixture.path().to_str().unwrap().to_string();

    let report = detect_hang(
        "node",
        &[path],
        Duration::from_secs(5),
        Duration::from_millis(100),
        3,
        Duration::from_secs(10),
        Duration::from_secs(5),
    )
    .await
    .expect("detect_hang should not error on a quick script");

    assert!(report.completed);
    assert!(!report.hung);
}
