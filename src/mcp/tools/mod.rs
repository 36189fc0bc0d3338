use crate::breakpoints::BreakpointRegistry;
use crate::hang_detector;
use crate::session::state::{
    Breakpoint, BreakpointKind, ExceptionPauseState, HitCountPredicate, SessionState, WatchExpression,
};
use crate::session::{DebugSession, SessionManager};
use crate::variables::{render_stack, ObjectRef};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggerStartArgs {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdArgs {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameIndexArgs {
    pub session_id: String,
    pub frame_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchFrameArgs {
    pub session_id: String,
    pub frame_index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectArgs {
    pub session_id: String,
    pub expression: String,
    pub frame_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op", content = "value")]
pub enum HitConditionArg {
    AtLeast(u32),
    Equals(u32),
    Modulo(u32),
}

impl From<HitConditionArg> for HitCountPredicate {
    fn from(arg: HitConditionArg) -> Self {
        match arg {
            HitConditionArg::AtLeast(n) => HitCountPredicate::AtLeast(n),
            HitConditionArg::Equals(n) => HitCountPredicate::Equals(n),
            HitConditionArg::Modulo(n) => HitCountPredicate::Modulo(n),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointArgs {
    pub session_id: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub condition: Option<String>,
    pub log_message: Option<String>,
    pub hit_condition: Option<HitConditionArg>,
    pub function_name: Option<String>,
    pub exception_filter: Option<ExceptionFilterArg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionFilterArg {
    Uncaught,
    All,
}

impl From<ExceptionFilterArg> for ExceptionPauseState {
    fn from(arg: ExceptionFilterArg) -> Self {
        match arg {
            ExceptionFilterArg::Uncaught => ExceptionPauseState::Uncaught,
            ExceptionFilterArg::All => ExceptionPauseState::All,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointIdArgs {
    pub session_id: String,
    pub breakpoint_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBreakpointArgs {
    pub session_id: String,
    pub breakpoint_id: u64,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWatchArgs {
    pub session_id: String,
    pub expression: String,
    pub frame_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchIdArgs {
    pub session_id: String,
    pub watch_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRefArgs {
    pub session_id: String,
    pub object_ref: ObjectRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectHangArgs {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_ms: Option<u64>,
    pub sample_interval_ms: Option<u64>,
    pub threshold_samples: Option<u32>,
}

fn breakpoint_json(bp: &Breakpoint) -> Value {
    json!({
        "breakpointId": bp.id,
        "kind": bp.kind,
        "file": bp.file,
        "line": bp.line,
        "column": bp.column,
        "condition": bp.condition,
        "logMessage": bp.log_message,
        "hitCountPredicate": bp.hit_count_predicate,
        "enabled": bp.enabled,
        "pending": bp.is_pending(),
        "hitCount": bp.hit_count,
    })
}

fn watch_json(w: &WatchExpression) -> Value {
    json!({
        "watchId": w.id,
        "expression": w.expression,
        "frameIndex": w.frame_index,
        "lastValue": w.last_value,
        "lastError": w.last_error,
        "changed": w.changed,
    })
}

/// Bridges the MCP tool catalog (§6) onto [`SessionManager`]/[`DebugSession`]. Every
/// handler returns a plain success payload; `Err` is converted to the
/// `{status: "error", code, message}` shape by [`super::protocol::ProtocolHandler`]
/// (§7 propagation policy).
pub struct ToolsHandler {
    session_manager: Arc<SessionManager>,
    auth_token: Option<String>,
}

impl ToolsHandler {
    pub fn new(session_manager: Arc<SessionManager>, auth_token: Option<String>) -> Self {
        Self { session_manager, auth_token }
    }

    /// Checks a caller-supplied token against the configured one, when set. With no
    /// `auth_token` configured, every call is authorized.
    pub fn check_auth(&self, provided: Option<&str>) -> Result<()> {
        match &self.auth_token {
            None => Ok(()),
            Some(expected) if provided == Some(expected.as_str()) => Ok(()),
            Some(_) => Err(Error::Unauthorized("invalid or missing auth token".to_string())),
        }
    }

    pub async fn handle_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        match name {
            "debugger_start" => self.debugger_start(arguments).await,
            "debugger_stop_session" => self.debugger_stop_session(arguments).await,
            "debugger_continue" => self.debugger_continue(arguments).await,
            "debugger_pause" => self.debugger_pause(arguments).await,
            "debugger_step_over" => self.debugger_step_over(arguments).await,
            "debugger_step_into" => self.debugger_step_into(arguments).await,
            "debugger_step_out" => self.debugger_step_out(arguments).await,
            "debugger_set_breakpoint" => self.debugger_set_breakpoint(arguments).await,
            "debugger_remove_breakpoint" => self.debugger_remove_breakpoint(arguments).await,
            "debugger_toggle_breakpoint" => self.debugger_toggle_breakpoint(arguments).await,
            "debugger_list_breakpoints" => self.debugger_list_breakpoints(arguments).await,
            "debugger_inspect" => self.debugger_inspect(arguments).await,
            "debugger_get_local_variables" => self.debugger_get_local_variables(arguments).await,
            "debugger_get_global_variables" => self.debugger_get_global_variables(arguments).await,
            "debugger_get_stack" => self.debugger_get_stack(arguments).await,
            "debugger_switch_stack_frame" => self.debugger_switch_stack_frame(arguments).await,
            "debugger_get_properties" => self.debugger_get_properties(arguments).await,
            "debugger_add_watch" => self.debugger_add_watch(arguments).await,
            "debugger_remove_watch" => self.debugger_remove_watch(arguments).await,
            "debugger_get_watches" => self.debugger_get_watches(arguments).await,
            "debugger_detect_hang" => self.debugger_detect_hang(arguments).await,
            "debugger_start_cpu_profile" => self.debugger_start_cpu_profile(arguments).await,
            "debugger_stop_cpu_profile" => self.debugger_stop_cpu_profile(arguments).await,
            "debugger_take_heap_snapshot" => self.debugger_take_heap_snapshot(arguments).await,
            "debugger_get_performance_metrics" => self.debugger_get_performance_metrics(arguments).await,
            _ => Err(Error::MethodNotFound(name.to_string())),
        }
    }

    async fn session(&self, session_id: &str) -> Result<Arc<DebugSession>> {
        self.session_manager.get(session_id).await
    }

    async fn debugger_start(&self, arguments: Value) -> Result<Value> {
        let args: DebuggerStartArgs = serde_json::from_value(arguments)?;
        let timeout = args.timeout_ms.map(Duration::from_millis);
        let session = self
            .session_manager
            .start_session(&args.command, &args.args, args.cwd.as_deref(), &args.env, timeout)
            .await?;

        Ok(json!({
            "status": "success",
            "sessionId": session.id,
            "state": session.state().await,
            "pid": session.pid().await,
        }))
    }

    async fn debugger_stop_session(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        self.session_manager.stop_session(&args.session_id).await?;
        Ok(json!({ "status": "success" }))
    }

    async fn state_and_location(&self, session: &DebugSession) -> Value {
        let state = session.state().await;
        let location = if state == SessionState::Paused {
            session.get_call_stack().await.ok().and_then(|frames| frames.into_iter().next())
        } else {
            None
        };
        json!({ "status": "success", "state": state, "location": location })
    }

    async fn debugger_continue(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.resume().await?;
        Ok(self.state_and_location(&session).await)
    }

    async fn debugger_pause(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.pause().await?;
        Ok(self.state_and_location(&session).await)
    }

    async fn debugger_step_over(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.step_over().await?;
        Ok(self.state_and_location(&session).await)
    }

    async fn debugger_step_into(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.step_into().await?;
        Ok(self.state_and_location(&session).await)
    }

    async fn debugger_step_out(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.step_out().await?;
        Ok(self.state_and_location(&session).await)
    }

    async fn debugger_set_breakpoint(&self, arguments: Value) -> Result<Value> {
        let args: SetBreakpointArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let breakpoint: &Arc<BreakpointRegistry> = &session.breakpoints;

        if let Some(name) = args.function_name {
            let bp = breakpoint.create_function_breakpoint(name, args.condition).await?;
            return Ok(json!({ "status": "success", "breakpoint": breakpoint_json(&bp) }));
        }

        if let Some(filter) = args.exception_filter {
            let bp = breakpoint.create_exception_breakpoint(filter.into()).await?;
            return Ok(json!({ "status": "success", "breakpoint": breakpoint_json(&bp) }));
        }

        let file = args.file.ok_or_else(|| Error::InvalidArgument("file is required for line breakpoints".to_string()))?;
        let line = args.line.ok_or_else(|| Error::InvalidArgument("line is required for line breakpoints".to_string()))?;

        let kind = if args.log_message.is_some() {
            BreakpointKind::Log
        } else if args.hit_condition.is_some() {
            BreakpointKind::HitCount
        } else if args.condition.is_some() {
            BreakpointKind::Conditional
        } else {
            BreakpointKind::Line
        };

        let bp = breakpoint
            .create(
                kind,
                file,
                line,
                args.column,
                args.condition,
                args.log_message,
                args.hit_condition.map(Into::into),
            )
            .await?;

        Ok(json!({ "status": "success", "breakpoint": breakpoint_json(&bp) }))
    }

    async fn debugger_remove_breakpoint(&self, arguments: Value) -> Result<Value> {
        let args: BreakpointIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.breakpoints.remove(args.breakpoint_id).await?;
        Ok(json!({ "status": "success" }))
    }

    async fn debugger_toggle_breakpoint(&self, arguments: Value) -> Result<Value> {
        let args: ToggleBreakpointArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let bp = session.breakpoints.toggle(args.breakpoint_id, args.enabled).await?;
        Ok(json!({ "status": "success", "breakpoint": breakpoint_json(&bp) }))
    }

    async fn debugger_list_breakpoints(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let breakpoints: Vec<Value> = session.breakpoints.list().await.iter().map(breakpoint_json).collect();
        Ok(json!({ "status": "success", "breakpoints": breakpoints }))
    }

    async fn debugger_inspect(&self, arguments: Value) -> Result<Value> {
        let args: InspectArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let result = session.evaluate(&args.expression, args.frame_index).await?;
        Ok(json!({ "status": "success", "result": result }))
    }

    async fn debugger_get_local_variables(&self, arguments: Value) -> Result<Value> {
        let args: FrameIndexArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let variables = session.get_local_variables(args.frame_index).await?;
        Ok(json!({ "status": "success", "variables": variables }))
    }

    async fn debugger_get_global_variables(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let variables = session.get_global_variables().await?;
        Ok(json!({ "status": "success", "variables": variables }))
    }

    async fn debugger_get_stack(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let frames = session.get_call_stack().await?;
        Ok(json!({ "status": "success", "stack": render_stack(&frames) }))
    }

    async fn debugger_switch_stack_frame(&self, arguments: Value) -> Result<Value> {
        let args: SwitchFrameArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.switch_frame(args.frame_index).await?;
        Ok(json!({ "status": "success", "frameIndex": args.frame_index }))
    }

    async fn debugger_get_properties(&self, arguments: Value) -> Result<Value> {
        let args: ObjectRefArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let variables = session.get_properties(&args.object_ref).await?;
        Ok(json!({ "status": "success", "variables": variables }))
    }

    async fn debugger_add_watch(&self, arguments: Value) -> Result<Value> {
        let args: AddWatchArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let watch_id = session.add_watch(args.expression, args.frame_index).await;
        Ok(json!({ "status": "success", "watchId": watch_id }))
    }

    async fn debugger_remove_watch(&self, arguments: Value) -> Result<Value> {
        let args: WatchIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.remove_watch(args.watch_id).await?;
        Ok(json!({ "status": "success" }))
    }

    async fn debugger_get_watches(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        let watches: Vec<Value> = session.list_watches().await.iter().map(watch_json).collect();
        Ok(json!({ "status": "success", "watches": watches }))
    }

    async fn debugger_detect_hang(&self, arguments: Value) -> Result<Value> {
        let args: DetectHangArgs = serde_json::from_value(arguments)?;
        let report = hang_detector::detect_hang(
            &args.command,
            &args.args,
            Duration::from_millis(args.timeout_ms.unwrap_or(10_000)),
            Duration::from_millis(args.sample_interval_ms.unwrap_or(100)),
            args.threshold_samples.unwrap_or(5),
            Duration::from_secs(10),
            Duration::from_secs(5),
        )
        .await?;
        Ok(json!({ "status": "success", "hung": report.hung, "completed": report.completed, "location": report.location }))
    }

    async fn debugger_start_cpu_profile(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.require_active().await?;
        session.profiler.start_cpu_profile(Duration::from_secs(5)).await?;
        Ok(json!({ "status": "success" }))
    }

    async fn debugger_stop_cpu_profile(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.require_active().await?;
        let profile = session.profiler.stop_cpu_profile(Duration::from_secs(30)).await?;
        let analysis = session.profiler.analyze_cpu_profile(&profile);
        Ok(json!({ "status": "success", "analysis": analysis }))
    }

    async fn debugger_take_heap_snapshot(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.require_active().await?;
        let snapshot = session.profiler.take_heap_snapshot(Duration::from_secs(30)).await?;
        Ok(json!({ "status": "success", "snapshot": snapshot }))
    }

    async fn debugger_get_performance_metrics(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = serde_json::from_value(arguments)?;
        let session = self.session(&args.session_id).await?;
        session.require_active().await?;
        let memory = session.profiler.get_memory_usage(Duration::from_secs(5)).await?;
        let report = session.profiler.performance_report().await;
        Ok(json!({ "status": "success", "memory": memory, "report": report }))
    }

    pub fn list_tools() -> Vec<Value> {
        vec![
            json!({
                "name": "debugger_start",
                "description": "Launch a target program with the inspector enabled and break on the first line.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "command": { "type": "string", "description": "Executable to launch" },
                        "args": { "type": "array", "items": { "type": "string" } },
                        "cwd": { "type": "string" },
                        "env": { "type": "array" },
                        "timeoutMs": { "type": "integer" }
                    },
                    "required": ["command"]
                }
            }),
            json!({
                "name": "debugger_stop_session",
                "description": "Tear down a debug session, terminating its target process.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_continue",
                "description": "Resume a paused session.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_pause",
                "description": "Request a pause on a running session.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_step_over",
                "description": "Step over the current line.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_step_into",
                "description": "Step into the current call.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_step_out",
                "description": "Step out of the current function.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_set_breakpoint",
                "description": "Set a breakpoint. Providing functionName creates a function breakpoint; exceptionFilter creates an exception breakpoint; otherwise file and line are required: logMessage creates a log point, hitCondition creates a hit-count breakpoint, condition alone creates a conditional breakpoint, and none of those creates a plain line breakpoint.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "sessionId": { "type": "string" },
                        "file": { "type": "string" },
                        "line": { "type": "integer" },
                        "column": { "type": "integer" },
                        "condition": { "type": "string" },
                        "logMessage": { "type": "string" },
                        "hitCondition": { "type": "object" },
                        "functionName": { "type": "string" },
                        "exceptionFilter": { "type": "string", "enum": ["uncaught", "all"] }
                    },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_remove_breakpoint",
                "description": "Remove a breakpoint by id.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" }, "breakpointId": { "type": "integer" } },
                    "required": ["sessionId", "breakpointId"]
                }
            }),
            json!({
                "name": "debugger_toggle_breakpoint",
                "description": "Enable or disable a breakpoint without losing its configuration.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "sessionId": { "type": "string" },
                        "breakpointId": { "type": "integer" },
                        "enabled": { "type": "boolean" }
                    },
                    "required": ["sessionId", "breakpointId", "enabled"]
                }
            }),
            json!({
                "name": "debugger_list_breakpoints",
                "description": "List all breakpoints registered on a session.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_inspect",
                "description": "Evaluate an expression in a stack frame.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "sessionId": { "type": "string" },
                        "expression": { "type": "string" },
                        "frameIndex": { "type": "integer" }
                    },
                    "required": ["sessionId", "expression"]
                }
            }),
            json!({
                "name": "debugger_get_local_variables",
                "description": "List the local variables of a stack frame.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" }, "frameIndex": { "type": "integer" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_get_global_variables",
                "description": "List global object properties.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_get_stack",
                "description": "Return the current call stack.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_switch_stack_frame",
                "description": "Change the active stack frame used for evaluation.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" }, "frameIndex": { "type": "integer" } },
                    "required": ["sessionId", "frameIndex"]
                }
            }),
            json!({
                "name": "debugger_get_properties",
                "description": "Walk the named properties of an object reference returned by a prior evaluation.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" }, "objectRef": { "type": "object" } },
                    "required": ["sessionId", "objectRef"]
                }
            }),
            json!({
                "name": "debugger_add_watch",
                "description": "Register a watch expression, re-evaluated on every pause.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "sessionId": { "type": "string" },
                        "expression": { "type": "string" },
                        "frameIndex": { "type": "integer" }
                    },
                    "required": ["sessionId", "expression"]
                }
            }),
            json!({
                "name": "debugger_remove_watch",
                "description": "Remove a watch expression by id.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" }, "watchId": { "type": "integer" } },
                    "required": ["sessionId", "watchId"]
                }
            }),
            json!({
                "name": "debugger_get_watches",
                "description": "List all watch expressions and their last-evaluated values.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_detect_hang",
                "description": "Launch a target standalone and classify it as hung/completed/running by sampling its top frame.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "command": { "type": "string" },
                        "args": { "type": "array", "items": { "type": "string" } },
                        "timeoutMs": { "type": "integer" },
                        "sampleIntervalMs": { "type": "integer" },
                        "thresholdSamples": { "type": "integer" }
                    },
                    "required": ["command"]
                }
            }),
            json!({
                "name": "debugger_start_cpu_profile",
                "description": "Start CPU profiling on a session.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_stop_cpu_profile",
                "description": "Stop CPU profiling and return a self/total time breakdown with bottlenecks flagged.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_take_heap_snapshot",
                "description": "Take a heap snapshot.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
            json!({
                "name": "debugger_get_performance_metrics",
                "description": "Return current memory usage and the recorded performance timeline report.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "sessionId": { "type": "string" } },
                    "required": ["sessionId"]
                }
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn handler() -> ToolsHandler {
        ToolsHandler::new(Arc::new(SessionManager::new(Config::default())), None)
    }

    fn handler_with_token(token: &str) -> ToolsHandler {
        ToolsHandler::new(Arc::new(SessionManager::new(Config::default())), Some(token.to_string()))
    }

    #[test]
    fn check_auth_passes_when_no_token_configured() {
        let handler = handler();
        assert!(handler.check_auth(None).is_ok());
        assert!(handler.check_auth(Some("anything")).is_ok());
    }

    #[test]
    fn check_auth_rejects_missing_or_wrong_token_when_configured() {
        let handler = handler_with_token("s3cr3t");
        assert!(matches!(handler.check_auth(None), Err(Error::Unauthorized(_))));
        assert!(matches!(handler.check_auth(Some("wrong")), Err(Error::Unauthorized(_))));
        assert!(handler.check_auth(Some("s3cr3t")).is_ok());
    }

    #[tokio::test]
    async fn unknown_tool_name_fails_with_method_not_found() {
        let handler = handler();
        let result = handler.handle_tool("not_a_real_tool", Value::Null).await;
        assert!(matches!(result, Err(Error::MethodNotFound(_))));
    }

    #[tokio::test]
    async fn debugger_continue_on_unknown_session_fails_with_session_not_found() {
        let handler = handler();
        let result = handler.handle_tool("debugger_continue", json!({ "sessionId": "nonexistent" })).await;
        assert!(matches!(result, Err(Error::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn list_tools_includes_the_full_catalog() {
        let tools = ToolsHandler::list_tools();
        let names: Vec<&str> = tools.iter().filter_map(|t| t.get("name").and_then(|n| n.as_str())).collect();
        assert!(names.contains(&"debugger_start"));
        assert!(names.contains(&"debugger_detect_hang"));
        assert!(names.contains(&"debugger_get_performance_metrics"));
        assert_eq!(names.len(), tools.len(), "every tool entry must have a name");
    }
}
