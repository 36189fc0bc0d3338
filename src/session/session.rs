use crate::breakpoints::{BreakpointRegistry, CdpBreakpointOps};
use crate::config::Config;
use crate::inspector::types::{CallFrame, ExceptionDetails, PausedParams};
use crate::inspector::InspectorClient;
use crate::launcher::{self, LaunchedTarget};
use crate::profiler::Profiler;
use crate::session::state::{
    Breakpoint, BreakpointKind, FrameSnapshot, PauseReason, PauseSnapshot, SessionState, WatchExpression,
};
use crate::sourcemap::SourceMapManager;
use crate::variables::{EvalResult, ObjectRef, Variable, VariableInspector};
use crate::{Error, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

type CrashHandler = Arc<dyn Fn(&str) + Send + Sync>;

const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

fn strip_file_scheme(url: &str) -> String {
    url.strip_prefix("file://").unwrap_or(url).to_string()
}

/// The composition point (§4.7): owns the state machine and the event pump, and
/// delegates to the breakpoint/variable/profiler components for everything else.
pub struct DebugSession {
    pub id: String,
    inspector: Arc<InspectorClient>,
    child: Mutex<Child>,
    source_maps: Arc<SourceMapManager>,
    breakpoint_ops: Arc<CdpBreakpointOps>,
    pub breakpoints: Arc<BreakpointRegistry>,
    pub variables: Arc<VariableInspector>,
    pub profiler: Arc<Profiler>,
    watches: RwLock<HashMap<u64, WatchExpression>>,
    next_watch_id: AtomicU64,
    last_call_frames: RwLock<Vec<CallFrame>>,
    pause_snapshot: RwLock<Option<PauseSnapshot>>,
    state: RwLock<SessionState>,
    paused_notify: Arc<Notify>,
    stopping: AtomicBool,
    crashed_notified: AtomicBool,
    command_timeout: Duration,
    crash_handler: RwLock<Option<CrashHandler>>,
}

impl DebugSession {
    /// Launch `command`, attach the inspector, enable the `Debugger`/`Runtime`
    /// domains, and wait for the initial break-on-start pause.
    pub async fn start(
        command: &str,
        args: &[String],
        cwd: Option<&str>,
        env: &[(String, String)],
        config: &Config,
    ) -> Result<Arc<Self>> {
        let target: LaunchedTarget = launcher::launch(
            command,
            args,
            cwd,
            env,
            config.workspace_root.as_deref(),
            config.attach_timeout,
        )
        .await?;

        let inspector = Arc::new(InspectorClient::connect(&target.ws_url).await?);
        let session = Self::assemble(inspector.clone(), target.child, config.command_timeout).await;

        session.spawn_crash_watchers();

        inspector.send("Debugger.enable", None, config.command_timeout).await?;
        inspector.send("Runtime.enable", None, config.command_timeout).await?;

        session.wait_for_pause(config.session_start_timeout).await?;
        Ok(session)
    }

    async fn assemble(inspector: Arc<InspectorClient>, child: Child, command_timeout: Duration) -> Arc<Self> {
        let source_maps = Arc::new(SourceMapManager::new(None));
        let breakpoint_ops = Arc::new(CdpBreakpointOps::new(inspector.clone(), source_maps.clone()));
        breakpoint_ops.attach().await;
        let breakpoints = Arc::new(BreakpointRegistry::new(
            breakpoint_ops.clone(),
            command_timeout,
            command_timeout,
        ));
        let variables = Arc::new(VariableInspector::new());
        let profiler = Arc::new(Profiler::new(inspector.clone()));

        let late_resolution_target = breakpoints.clone();
        breakpoint_ops
            .on_breakpoint_resolved(move |server_id, locations| {
                let breakpoints = late_resolution_target.clone();
                tokio::spawn(async move { breakpoints.mark_resolved(&server_id, locations).await });
            })
            .await;

        let session = Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            inspector,
            child: Mutex::new(child),
            source_maps,
            breakpoint_ops,
            breakpoints,
            variables,
            profiler,
            watches: RwLock::new(HashMap::new()),
            next_watch_id: AtomicU64::new(1),
            last_call_frames: RwLock::new(Vec::new()),
            pause_snapshot: RwLock::new(None),
            state: RwLock::new(SessionState::Initializing),
            paused_notify: Arc::new(Notify::new()),
            stopping: AtomicBool::new(false),
            crashed_notified: AtomicBool::new(false),
            command_timeout,
            crash_handler: RwLock::new(None),
        });

        session.attach_event_pump().await;
        session
    }

    pub async fn register_crash_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.crash_handler.write().await = Some(Arc::new(handler));
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.id()
    }

    async fn require_state(&self, allowed: &[SessionState]) -> Result<()> {
        let state = self.state.read().await.clone();
        if allowed.contains(&state) {
            Ok(())
        } else if state == SessionState::Crashed {
            Err(Error::TargetCrashed(format!("session {} crashed", self.id)))
        } else {
            Err(Error::InvalidState(format!(
                "operation not valid in state {:?} (expected one of {:?})",
                state, allowed
            )))
        }
    }

    /// Public guard for operations outside this module (e.g. profiler tool handlers)
    /// that only need "the session is alive" rather than a specific state list.
    pub async fn require_active(&self) -> Result<()> {
        self.require_state(&[SessionState::Paused, SessionState::Running]).await
    }

    async fn attach_event_pump(self: &Arc<Self>) {
        let session = self.clone();
        self.inspector
            .on_event("Debugger.paused", move |event| {
                let session = session.clone();
                tokio::spawn(async move { session.handle_paused(event.params).await });
            })
            .await;

        let session = self.clone();
        self.inspector
            .on_event("Debugger.resumed", move |_event| {
                let session = session.clone();
                tokio::spawn(async move { session.handle_resumed().await });
            })
            .await;

        let session = self.clone();
        self.inspector
            .on_event("Runtime.exceptionThrown", move |event| {
                let session = session.clone();
                tokio::spawn(async move { session.handle_exception(event.params).await });
            })
            .await;

        let session = self.clone();
        self.inspector
            .on_event("Runtime.consoleAPICalled", move |event| {
                let session = session.clone();
                tokio::spawn(async move { session.handle_console(event.params).await });
            })
            .await;
    }

    fn spawn_crash_watchers(self: &Arc<Self>) {
        let session = self.clone();
        tokio::spawn(async move {
            session.inspector.wait_for_disconnect().await;
            session.handle_possible_crash("inspector transport closed").await;
        });

        let session = self.clone();
        tokio::spawn(async move {
            loop {
                let exited = {
                    let mut child = session.child.lock().await;
                    child.try_wait().ok().flatten()
                };
                if let Some(status) = exited {
                    session
                        .handle_possible_crash(&format!("target process exited: {:?}", status))
                        .await;
                    break;
                }
                if session.state().await.is_terminal() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });
    }

    async fn handle_possible_crash(&self, reason: &str) {
        if self.stopping.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut state = self.state.write().await;
            if state.is_terminal() {
                return;
            }
            *state = SessionState::Crashed;
        }
        warn!(session_id = %self.id, "{}", reason);
        if !self.crashed_notified.swap(true, Ordering::SeqCst) {
            if let Some(handler) = self.crash_handler.read().await.clone() {
                handler(&self.id);
            }
        }
    }

    async fn resolve_hit_breakpoint_ids(&self, hit_breakpoints: &[String]) -> Vec<u64> {
        let mut ids = Vec::new();
        for server_id in hit_breakpoints {
            if let Some(bp) = self.breakpoints.find_by_server_id(server_id).await {
                ids.push(bp.id);
            }
        }
        ids
    }

    async fn handle_paused(&self, params: serde_json::Value) {
        let parsed: PausedParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                warn!("malformed paused event: {}", e);
                return;
            }
        };

        let hit_ids = self.resolve_hit_breakpoint_ids(&parsed.hit_breakpoints).await;
        let mut should_surface = hit_ids.is_empty();

        for id in &hit_ids {
            let Ok(bp) = self.breakpoints.get(*id).await else {
                should_surface = true;
                continue;
            };
            if bp.kind == BreakpointKind::Log {
                self.emit_log_point(&bp, &parsed).await;
                continue;
            }
            match self.breakpoints.record_hit(*id).await {
                Ok(surface) => should_surface = should_surface || surface,
                Err(_) => should_surface = true,
            }
        }

        if !should_surface {
            let _ = self.inspector.send("Debugger.resume", None, self.command_timeout).await;
            return;
        }

        let is_initial = matches!(*self.state.read().await, SessionState::Initializing);
        let reason = if !hit_ids.is_empty() {
            PauseReason::BreakpointHit
        } else if is_initial {
            PauseReason::DebuggerStatement
        } else {
            match parsed.reason.as_str() {
                "exception" => PauseReason::Exception,
                "step" => PauseReason::Step,
                "debugCommand" => PauseReason::Pause,
                _ => PauseReason::Other,
            }
        };

        let exception_description = if reason == PauseReason::Exception {
            parsed
                .data
                .as_ref()
                .and_then(|d| d.get("text"))
                .and_then(|t| t.as_str())
                .map(String::from)
        } else {
            None
        };

        let mut frames = Vec::with_capacity(parsed.call_frames.len());
        for (index, frame) in parsed.call_frames.iter().enumerate() {
            frames.push(self.build_frame_snapshot(index, frame).await);
        }

        *self.last_call_frames.write().await = parsed.call_frames;
        *self.pause_snapshot.write().await = Some(PauseSnapshot {
            frames,
            reason,
            hit_breakpoint_ids: hit_ids,
            exception_description,
        });
        *self.state.write().await = SessionState::Paused;

        self.evaluate_watches().await;
        self.paused_notify.notify_waiters();
    }

    async fn emit_log_point(&self, bp: &Breakpoint, parsed: &PausedParams) {
        let Some(template) = bp.log_message.clone() else { return };
        let call_frame_id = parsed.call_frames.first().map(|f| f.call_frame_id.clone());
        if let Ok(rendered) = self
            .variables
            .evaluate(&self.inspector, call_frame_id.as_deref(), &template, self.command_timeout)
            .await
        {
            info!(session_id = %self.id, breakpoint_id = bp.id, value = ?rendered, "log point");
        }
    }

    async fn handle_resumed(&self) {
        self.variables.advance_epoch();
        self.last_call_frames.write().await.clear();
        *self.pause_snapshot.write().await = None;
        let mut state = self.state.write().await;
        if !state.is_terminal() {
            *state = SessionState::Running;
        }
    }

    async fn handle_exception(&self, params: serde_json::Value) {
        if let Ok(details) = serde_json::from_value::<ExceptionDetails>(params) {
            warn!(session_id = %self.id, "uncaught exception: {}", details.text);
        }
    }

    async fn handle_console(&self, params: serde_json::Value) {
        debug!(session_id = %self.id, event = %params, "console event");
    }

    async fn build_frame_snapshot(&self, index: usize, frame: &CallFrame) -> FrameSnapshot {
        let raw_url = self.breakpoint_ops.url_for_script(&frame.location.script_id).await;
        let compiled_path = raw_url
            .as_deref()
            .map(strip_file_scheme)
            .unwrap_or_else(|| frame.location.script_id.clone());

        match self
            .source_maps
            .map_compiled_to_source(&compiled_path, frame.location.line_number, frame.location.column_number)
            .await
        {
            Some(loc) => FrameSnapshot {
                index,
                function_name: frame.function_name.clone(),
                file: loc.file,
                line: loc.line,
                column: loc.column.unwrap_or(0),
            },
            None => FrameSnapshot {
                index,
                function_name: frame.function_name.clone(),
                file: compiled_path,
                line: frame.location.line_number,
                column: frame.location.column_number.unwrap_or(0),
            },
        }
    }

    async fn wait_for_pause(&self, deadline: Duration) -> Result<()> {
        if matches!(*self.state.read().await, SessionState::Paused) {
            return Ok(());
        }
        let notified = self.paused_notify.notified();
        if matches!(*self.state.read().await, SessionState::Paused) {
            return Ok(());
        }
        tokio::time::timeout(deadline, notified).await.map_err(|_| Error::AttachTimeout)?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.require_state(&[SessionState::Paused]).await?;
        self.inspector.send("Debugger.resume", None, self.command_timeout).await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.require_state(&[SessionState::Running]).await?;
        self.inspector.send("Debugger.pause", None, self.command_timeout).await?;
        Ok(())
    }

    pub async fn step_over(&self) -> Result<()> {
        self.require_state(&[SessionState::Paused]).await?;
        self.inspector.send("Debugger.stepOver", None, self.command_timeout).await?;
        Ok(())
    }

    pub async fn step_into(&self) -> Result<()> {
        self.require_state(&[SessionState::Paused]).await?;
        self.inspector.send("Debugger.stepInto", None, self.command_timeout).await?;
        Ok(())
    }

    pub async fn step_out(&self) -> Result<()> {
        self.require_state(&[SessionState::Paused]).await?;
        self.inspector.send("Debugger.stepOut", None, self.command_timeout).await?;
        Ok(())
    }

    pub async fn evaluate(&self, expression: &str, frame_index: Option<usize>) -> Result<EvalResult> {
        self.require_state(&[SessionState::Paused]).await?;
        let idx = frame_index.unwrap_or_else(|| self.variables.current_frame_index());
        let call_frame_id = self.last_call_frames.read().await.get(idx).map(|f| f.call_frame_id.clone());
        self.variables
            .evaluate(&self.inspector, call_frame_id.as_deref(), expression, self.command_timeout)
            .await
    }

    pub async fn get_local_variables(&self, frame_index: Option<usize>) -> Result<Vec<Variable>> {
        self.require_state(&[SessionState::Paused]).await?;
        let idx = frame_index.unwrap_or_else(|| self.variables.current_frame_index());
        let frames = self.last_call_frames.read().await;
        let frame = frames
            .get(idx)
            .ok_or_else(|| Error::InvalidArgument(format!("frame index {} out of range", idx)))?;

        let mut out = Vec::new();
        for scope in &frame.scope_chain {
            let Some(object_id) = scope.object.object_id.clone() else { continue };
            let object_ref = ObjectRef {
                object_id,
                epoch: self.variables.current_epoch(),
            };
            let props = self
                .variables
                .get_properties(&self.inspector, &object_ref, self.command_timeout)
                .await?;
            out.extend(props);
        }
        Ok(out)
    }

    pub async fn get_global_variables(&self) -> Result<Vec<Variable>> {
        self.require_state(&[SessionState::Paused]).await?;
        let global = self.variables.evaluate(&self.inspector, None, "globalThis", self.command_timeout).await?;
        match global {
            EvalResult::Object { object_ref, .. } => {
                self.variables.get_properties(&self.inspector, &object_ref, self.command_timeout).await
            }
            _ => Ok(Vec::new()),
        }
    }

    pub async fn get_call_stack(&self) -> Result<Vec<FrameSnapshot>> {
        self.require_state(&[SessionState::Paused]).await?;
        Ok(self
            .pause_snapshot
            .read()
            .await
            .as_ref()
            .map(|s| s.frames.clone())
            .unwrap_or_default())
    }

    pub async fn switch_frame(&self, index: usize) -> Result<()> {
        self.require_state(&[SessionState::Paused]).await?;
        let count = self.last_call_frames.read().await.len();
        self.variables.switch_frame(index, count)
    }

    pub async fn get_properties(&self, object_ref: &ObjectRef) -> Result<Vec<Variable>> {
        self.require_state(&[SessionState::Paused]).await?;
        self.variables.get_properties(&self.inspector, object_ref, self.command_timeout).await
    }

    pub async fn add_watch(&self, expression: String, frame_index: Option<usize>) -> u64 {
        let id = self.next_watch_id.fetch_add(1, Ordering::SeqCst);
        self.watches.write().await.insert(
            id,
            WatchExpression {
                id,
                expression,
                frame_index,
                last_value: None,
                last_error: None,
                changed: false,
            },
        );
        id
    }

    pub async fn remove_watch(&self, id: u64) -> Result<()> {
        self.watches
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidArgument(format!("unknown watch id {}", id)))
    }

    pub async fn list_watches(&self) -> Vec<WatchExpression> {
        self.watches.read().await.values().cloned().collect()
    }

    /// Set on every pause: re-evaluates each watch in its bound frame (top frame by
    /// default) and updates its `changed` flag.
    async fn evaluate_watches(&self) {
        let ids: Vec<u64> = self.watches.read().await.keys().copied().collect();
        for id in ids {
            let (expression, frame_index) = {
                let watches = self.watches.read().await;
                let Some(w) = watches.get(&id) else { continue };
                (w.expression.clone(), w.frame_index)
            };
            let result = self.evaluate(&expression, frame_index).await;
            let mut watches = self.watches.write().await;
            if let Some(w) = watches.get_mut(&id) {
                match result {
                    Ok(value) => {
                        let json = serde_json::to_value(&value).unwrap_or(serde_json::Value::Null);
                        w.changed = w.last_value.as_ref() != Some(&json);
                        w.last_value = Some(json);
                        w.last_error = None;
                    }
                    Err(e) => {
                        w.last_error = Some(e.to_string());
                        w.changed = false;
                    }
                }
            }
        }
    }

    /// Idempotent teardown (§4.7): always completes. Concurrent callers after the
    /// first observe the flag already set and return immediately.
    pub async fn stop(&self) -> Result<()> {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if matches!(*self.state.read().await, SessionState::Stopped) {
            return Ok(());
        }

        let _ = tokio::time::timeout(self.command_timeout, self.inspector.send("Profiler.disable", None, self.command_timeout)).await;
        let _ = self.inspector.disconnect().await;

        let pid = self.child.lock().await.id();
        if let Some(pid) = pid {
            let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }

        let waited = {
            let mut child = self.child.lock().await;
            tokio::time::timeout(TEARDOWN_GRACE, child.wait()).await
        };
        if waited.is_err() {
            let mut child = self.child.lock().await;
            let _ = child.start_kill();
            let _ = child.wait().await;
        }

        *self.state.write().await = SessionState::Stopped;
        info!(session_id = %self.id, "session stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::transport_trait::InspectorTransportTrait;
    use crate::inspector::types::{CdpMessage, CdpRequest};
    use tokio::process::Command;

    struct NullTransport;

    #[async_trait::async_trait]
    impl InspectorTransportTrait for NullTransport {
        async fn read_message(&mut self) -> Result<CdpMessage> {
            std::future::pending().await
        }
        async fn write_message(&mut self, _msg: &CdpRequest) -> Result<()> {
            Ok(())
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    async fn test_session(initial_state: SessionState) -> Arc<DebugSession> {
        let inspector = Arc::new(InspectorClient::new_with_transport(Box::new(NullTransport)).await.unwrap());
        let child = Command::new("sleep").arg("5").spawn().expect("spawn sleep for test harness");
        let session = DebugSession::assemble(inspector, child, Duration::from_millis(100)).await;
        *session.state.write().await = initial_state;
        session
    }

    #[tokio::test]
    async fn resume_fails_outside_paused_state() {
        let session = test_session(SessionState::Running).await;
        let result = session.resume().await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn step_over_fails_when_not_paused() {
        let session = test_session(SessionState::Initializing).await;
        let result = session.step_over().await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn operations_on_crashed_session_surface_target_crashed() {
        let session = test_session(SessionState::Crashed).await;
        let result = session.resume().await;
        assert!(matches!(result, Err(Error::TargetCrashed(_))));
        let result = session.require_active().await;
        assert!(matches!(result, Err(Error::TargetCrashed(_))));
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_marks_session_stopped() {
        let session = test_session(SessionState::Paused).await;
        session.stop().await.unwrap();
        session.stop().await.unwrap();
        assert_eq!(session.state().await, SessionState::Stopped);
    }

    #[tokio::test]
    async fn operations_after_stop_fail_with_invalid_state() {
        let session = test_session(SessionState::Paused).await;
        session.stop().await.unwrap();
        let result = session.resume().await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn watch_lifecycle_add_list_remove() {
        let session = test_session(SessionState::Paused).await;
        let id = session.add_watch("1 + 1".to_string(), None).await;
        assert_eq!(session.list_watches().await.len(), 1);
        session.remove_watch(id).await.unwrap();
        assert!(session.list_watches().await.is_empty());
        session.stop().await.unwrap();
    }
}
