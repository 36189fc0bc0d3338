//! Exercises the CLI surface end-to-end: spawn the binary, speak line-delimited
//! JSON-RPC over its stdio, and confirm `initialize`/`tools/list` round-trip.

use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

struct ServerProcess {
    child: std::process::Child,
    stdin: std::process::ChildStdin,
    stdout: BufReader<std::process::ChildStdout>,
}

impl ServerProcess {
    fn spawn() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_cdp_debugger_mcp"))
            .args(["serve", "--log-level", "error"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn cdp_debugger_mcp binary");

        let stdin = child.stdin.take().unwrap();
        let stdout = BufReader::new(child.stdout.take().unwrap());
        Self { child, stdin, stdout }
    }

    fn request(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request line");
        self.stdin.flush().unwrap();

        let mut response = String::new();
        self.stdout.read_line(&mut response).expect("read response line");
        serde_json::from_str(response.trim()).expect("response is valid JSON")
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn initialize_then_tools_list_round_trips() {
    let mut server = ServerProcess::spawn();

    let init = server.request(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#);
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "cdp_debugger_mcp");

    let list = server.request(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#);
    let tools = list["result"]["tools"].as_array().expect("tools array");
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"debugger_start"));
    assert!(names.contains(&"debugger_detect_hang"));
}

#[test]
fn unknown_method_returns_json_rpc_error() {
    let mut server = ServerProcess::spawn();
    let resp = server.request(r#"{"jsonrpc":"2.0","id":1,"method":"not/a/method","params":{}}"#);
    assert_eq!(resp["error"]["code"], -32601);
}
