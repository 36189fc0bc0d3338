use crate::inspector::types::{BreakpointResolvedParams, CdpLocation, ScriptParsedParams, SetBreakpointByUrlResult};
use crate::inspector::InspectorClient;
use crate::sourcemap::SourceMapManager;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, RwLock};
use tracing::{debug, warn};

type ResolvedHandler = Arc<dyn Fn(String, Vec<CdpLocation>) + Send + Sync>;

/// Tracks parsed scripts by URL (populated from `Debugger.scriptParsed`) and drives
/// the CDP breakpoint-set/remove primitives. Decoupled from the user-facing
/// breakpoint model, which lives in [`super::registry::BreakpointRegistry`].
pub struct CdpBreakpointOps {
    inspector: Arc<InspectorClient>,
    source_maps: Arc<SourceMapManager>,
    scripts_by_url: Arc<RwLock<HashMap<String, String>>>,
    script_parsed: Arc<Notify>,
    resolved_handlers: Arc<RwLock<Vec<ResolvedHandler>>>,
}

/// Result of a successful `set_breakpoint` call.
pub struct SetBreakpointOutcome {
    pub server_id: String,
    pub resolved_locations: Vec<CdpLocation>,
}

impl CdpBreakpointOps {
    pub fn new(inspector: Arc<InspectorClient>, source_maps: Arc<SourceMapManager>) -> Self {
        Self {
            inspector,
            source_maps,
            scripts_by_url: Arc::new(RwLock::new(HashMap::new())),
            script_parsed: Arc::new(Notify::new()),
            resolved_handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Subscribe to `Debugger.scriptParsed` and `Debugger.breakpointResolved`. Must be
    /// called once after the inspector transport is connected, before any
    /// `set_breakpoint` call that might need to wait for a pending script.
    pub async fn attach(&self) {
        let scripts_by_url = self.scripts_by_url.clone();
        let script_parsed = self.script_parsed.clone();
        self.inspector
            .on_event("Debugger.scriptParsed", move |event| {
                let Ok(params) = serde_json::from_value::<ScriptParsedParams>(event.params) else {
                    return;
                };
                let scripts_by_url = scripts_by_url.clone();
                let script_parsed = script_parsed.clone();
                tokio::spawn(async move {
                    scripts_by_url.write().await.insert(params.url, params.script_id);
                    script_parsed.notify_waiters();
                });
            })
            .await;

        let resolved_handlers = self.resolved_handlers.clone();
        self.inspector
            .on_event("Debugger.breakpointResolved", move |event| {
                let Ok(params) = serde_json::from_value::<BreakpointResolvedParams>(event.params) else {
                    return;
                };
                let resolved_handlers = resolved_handlers.clone();
                tokio::spawn(async move {
                    for handler in resolved_handlers.read().await.iter() {
                        handler(params.breakpoint_id.clone(), vec![params.location.clone()]);
                    }
                });
            })
            .await;
    }

    /// Register a callback invoked whenever a script parses after a breakpoint was
    /// already set against it (late resolution).
    pub async fn on_breakpoint_resolved<F>(&self, handler: F)
    where
        F: Fn(String, Vec<CdpLocation>) + Send + Sync + 'static,
    {
        self.resolved_handlers.write().await.push(Arc::new(handler));
    }

    /// Set a breakpoint at `file:line[:column]`, translating through the source-map
    /// manager first. Waits up to `resolve_deadline` for a matching `scriptParsed`
    /// event if the script hasn't been seen yet.
    pub async fn set_breakpoint(
        &self,
        file: &str,
        line: u32,
        column: Option<u32>,
        condition: Option<&str>,
        resolve_deadline: Duration,
        request_deadline: Duration,
    ) -> Result<SetBreakpointOutcome> {
        let (target_file, target_line) = match self.source_maps.map_source_to_compiled(file, line, column).await {
            Some(loc) => (loc.file, loc.line),
            None => (file.to_string(), line),
        };

        let url = format!("file://{}", target_file);
        self.wait_for_script(&url, resolve_deadline).await;

        let mut params = serde_json::json!({
            "url": url,
            "lineNumber": target_line,
        });
        if let Some(col) = column {
            params["columnNumber"] = serde_json::json!(col);
        }
        if let Some(cond) = condition {
            params["condition"] = serde_json::json!(cond);
        }

        let result = self
            .inspector
            .send("Debugger.setBreakpointByUrl", Some(params), request_deadline)
            .await?;
        let parsed: SetBreakpointByUrlResult = serde_json::from_value(result).map_err(Error::Json)?;

        Ok(SetBreakpointOutcome {
            server_id: parsed.breakpoint_id,
            resolved_locations: parsed.locations,
        })
    }

    /// `Debugger.setBreakpointsActive` toggles whether any breakpoint (of any kind)
    /// pauses execution. Used by function breakpoints (§4.5), which have no per-
    /// location URL-resolution path of their own to hook into.
    pub async fn set_breakpoints_active(&self, active: bool, request_deadline: Duration) -> Result<()> {
        self.inspector
            .send("Debugger.setBreakpointsActive", Some(serde_json::json!({ "active": active })), request_deadline)
            .await?;
        Ok(())
    }

    /// `Debugger.setPauseOnExceptions` drives exception breakpoints (§4.5): `state` is
    /// one of `"none"`, `"uncaught"`, `"all"`.
    pub async fn set_pause_on_exceptions(&self, state: &str, request_deadline: Duration) -> Result<()> {
        self.inspector
            .send("Debugger.setPauseOnExceptions", Some(serde_json::json!({ "state": state })), request_deadline)
            .await?;
        Ok(())
    }

    /// Idempotent removal: an unknown ID is treated as already-removed, per §4.4.
    pub async fn remove_breakpoint(&self, server_id: &str, request_deadline: Duration) -> Result<()> {
        let result = self
            .inspector
            .send(
                "Debugger.removeBreakpoint",
                Some(serde_json::json!({ "breakpointId": server_id })),
                request_deadline,
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(Error::CommandTimeout) => Err(Error::CommandTimeout),
            Err(Error::TransportClosed) => Err(Error::TransportClosed),
            Err(_) => {
                debug!("remove_breakpoint for unknown id {} treated as success", server_id);
                Ok(())
            }
        }
    }

    /// Reverse-lookup the URL a script ID was parsed from, used to render absolute
    /// file paths in pause snapshots and stack frames.
    pub async fn url_for_script(&self, script_id: &str) -> Option<String> {
        self.scripts_by_url
            .read()
            .await
            .iter()
            .find(|(_, id)| id.as_str() == script_id)
            .map(|(url, _)| url.clone())
    }

    async fn wait_for_script(&self, url: &str, deadline: Duration) {
        if self.scripts_by_url.read().await.contains_key(url) {
            return;
        }

        let start = Instant::now();
        loop {
            let remaining = deadline.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                warn!("no scriptParsed for {} within deadline; setting by URL anyway", url);
                return;
            }
            let notified = self.script_parsed.notified();
            if self.scripts_by_url.read().await.contains_key(url) {
                return;
            }
            let _ = tokio::time::timeout(remaining, notified).await;
            if self.scripts_by_url.read().await.contains_key(url) {
                return;
            }
        }
    }
}
