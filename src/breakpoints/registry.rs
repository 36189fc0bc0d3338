use super::cdp_ops::CdpBreakpointOps;
use crate::inspector::CdpLocation;
use crate::session::state::{Breakpoint, BreakpointKind, ExceptionPauseState, HitCountPredicate};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Translates user intent into CDP breakpoint operations and maintains the
/// user-visible breakpoint model (§4.5). Local IDs are a separate namespace from
/// inspector-assigned IDs (§9); this registry is the only place that keeps both.
pub struct BreakpointRegistry {
    ops: Arc<CdpBreakpointOps>,
    breakpoints: RwLock<HashMap<u64, Breakpoint>>,
    next_id: AtomicU64,
    resolve_deadline: Duration,
    request_deadline: Duration,
}

impl BreakpointRegistry {
    pub fn new(ops: Arc<CdpBreakpointOps>, resolve_deadline: Duration, request_deadline: Duration) -> Self {
        Self {
            ops,
            breakpoints: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            resolve_deadline,
            request_deadline,
        }
    }

    /// Create and register a line/conditional/log/hit-count breakpoint. Function and
    /// exception breakpoints bypass the URL-resolution path entirely (§4.5) and are
    /// created through [`Self::create_function_breakpoint`] /
    /// [`Self::create_exception_breakpoint`] instead.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        kind: BreakpointKind,
        file: String,
        line: u32,
        column: Option<u32>,
        condition: Option<String>,
        log_message: Option<String>,
        hit_count_predicate: Option<HitCountPredicate>,
    ) -> Result<Breakpoint> {
        if matches!(kind, BreakpointKind::Function | BreakpointKind::Exception) {
            return Err(Error::InvalidArgument(
                "function/exception breakpoints use their own creation path".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut breakpoint = Breakpoint {
            id,
            kind,
            file: file.clone(),
            line,
            column,
            condition: condition.clone(),
            log_message,
            hit_count_predicate,
            enabled: true,
            server_id: None,
            resolved_locations: vec![],
            hit_count: 0,
        };

        match self
            .ops
            .set_breakpoint(
                &file,
                line,
                column,
                condition.as_deref(),
                self.resolve_deadline,
                self.request_deadline,
            )
            .await
        {
            Ok(outcome) => {
                breakpoint.server_id = Some(outcome.server_id);
                breakpoint.resolved_locations = outcome.resolved_locations;
            }
            Err(_) => {
                // Held pending: the registry still tracks it, reported via `is_pending`.
            }
        }

        self.breakpoints.write().await.insert(id, breakpoint.clone());
        Ok(breakpoint)
    }

    /// Create a function breakpoint (§4.5). There is no per-function URL to resolve
    /// against, so this ensures breakpoints are globally active
    /// (`Debugger.setBreakpointsActive`) rather than resolving a location; `name`
    /// is kept in the `file` field for display, matching how the registry otherwise
    /// identifies breakpoints.
    pub async fn create_function_breakpoint(&self, name: String, condition: Option<String>) -> Result<Breakpoint> {
        self.ops.set_breakpoints_active(true, self.request_deadline).await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let breakpoint = Breakpoint {
            id,
            kind: BreakpointKind::Function,
            file: name,
            line: 0,
            column: None,
            condition,
            log_message: None,
            hit_count_predicate: None,
            enabled: true,
            server_id: None,
            resolved_locations: vec![],
            hit_count: 0,
        };

        self.breakpoints.write().await.insert(id, breakpoint.clone());
        Ok(breakpoint)
    }

    /// Create an exception breakpoint (§4.5): drives `Debugger.setPauseOnExceptions`
    /// directly instead of the URL-resolution path. `pause_on` governs whether the
    /// inspector pauses on all thrown exceptions or only uncaught ones.
    pub async fn create_exception_breakpoint(&self, pause_on: ExceptionPauseState) -> Result<Breakpoint> {
        self.ops.set_pause_on_exceptions(pause_on.as_cdp_str(), self.request_deadline).await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let breakpoint = Breakpoint {
            id,
            kind: BreakpointKind::Exception,
            file: pause_on.as_cdp_str().to_string(),
            line: 0,
            column: None,
            condition: None,
            log_message: None,
            hit_count_predicate: None,
            enabled: true,
            server_id: None,
            resolved_locations: vec![],
            hit_count: 0,
        };

        self.breakpoints.write().await.insert(id, breakpoint.clone());
        Ok(breakpoint)
    }

    /// Applied when a late `Debugger.breakpointResolved` event arrives for a
    /// breakpoint that was set before its script had parsed (§4.4).
    pub async fn mark_resolved(&self, server_id: &str, locations: Vec<CdpLocation>) {
        let mut breakpoints = self.breakpoints.write().await;
        if let Some(bp) = breakpoints.values_mut().find(|bp| bp.server_id.as_deref() == Some(server_id)) {
            bp.resolved_locations = locations;
        }
    }

    pub async fn list(&self) -> Vec<Breakpoint> {
        self.breakpoints.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: u64) -> Result<Breakpoint> {
        self.breakpoints
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))
    }

    pub async fn remove(&self, id: u64) -> Result<()> {
        let breakpoint = {
            let mut breakpoints = self.breakpoints.write().await;
            breakpoints
                .remove(&id)
                .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?
        };

        if let Some(server_id) = breakpoint.server_id {
            self.ops.remove_breakpoint(&server_id, self.request_deadline).await?;
        }
        Ok(())
    }

    /// Disable releases the server-side registration but preserves the local entry
    /// and all metadata; enable re-resolves it (§4.5).
    pub async fn toggle(&self, id: u64, enabled: bool) -> Result<Breakpoint> {
        let mut breakpoints = self.breakpoints.write().await;
        let breakpoint = breakpoints
            .get_mut(&id)
            .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?;

        if breakpoint.enabled == enabled {
            return Ok(breakpoint.clone());
        }
        breakpoint.enabled = enabled;

        if !enabled {
            if let Some(server_id) = breakpoint.server_id.take() {
                drop(breakpoints);
                self.ops.remove_breakpoint(&server_id, self.request_deadline).await?;
                return self.get(id).await;
            }
            return Ok(breakpoint.clone());
        }

        let (file, line, column, condition) = (
            breakpoint.file.clone(),
            breakpoint.line,
            breakpoint.column,
            breakpoint.condition.clone(),
        );
        drop(breakpoints);

        if let Ok(outcome) = self
            .ops
            .set_breakpoint(&file, line, column, condition.as_deref(), self.resolve_deadline, self.request_deadline)
            .await
        {
            let mut breakpoints = self.breakpoints.write().await;
            if let Some(bp) = breakpoints.get_mut(&id) {
                bp.server_id = Some(outcome.server_id);
                bp.resolved_locations = outcome.resolved_locations;
            }
        }
        self.get(id).await
    }

    pub async fn set_condition(&self, id: u64, condition: Option<String>) -> Result<Breakpoint> {
        let mut breakpoints = self.breakpoints.write().await;
        let breakpoint = breakpoints
            .get_mut(&id)
            .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?;
        breakpoint.condition = condition;
        Ok(breakpoint.clone())
    }

    pub async fn set_hit_count(&self, id: u64, predicate: Option<HitCountPredicate>) -> Result<Breakpoint> {
        let mut breakpoints = self.breakpoints.write().await;
        let breakpoint = breakpoints
            .get_mut(&id)
            .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?;
        breakpoint.hit_count_predicate = predicate;
        Ok(breakpoint.clone())
    }

    pub async fn set_log_message(&self, id: u64, message: Option<String>) -> Result<Breakpoint> {
        let mut breakpoints = self.breakpoints.write().await;
        let breakpoint = breakpoints
            .get_mut(&id)
            .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?;
        breakpoint.log_message = message;
        Ok(breakpoint.clone())
    }

    /// Find the local breakpoint owning a given inspector-assigned server ID, used by
    /// the event pump to attribute a `paused` hit back to the user-facing model.
    pub async fn find_by_server_id(&self, server_id: &str) -> Option<Breakpoint> {
        self.breakpoints
            .read()
            .await
            .values()
            .find(|bp| bp.server_id.as_deref() == Some(server_id))
            .cloned()
    }

    /// Record a hit against a breakpoint, incrementing its local counter, and report
    /// whether the hit-count predicate (if any) says the pause should surface.
    pub async fn record_hit(&self, id: u64) -> Result<bool> {
        let mut breakpoints = self.breakpoints.write().await;
        let breakpoint = breakpoints
            .get_mut(&id)
            .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?;
        breakpoint.hit_count += 1;
        Ok(match breakpoint.hit_count_predicate {
            Some(predicate) => predicate.matches(breakpoint.hit_count),
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::transport_trait::InspectorTransportTrait;
    use crate::inspector::types::{CdpMessage, CdpRequest};
    use crate::inspector::InspectorClient;
    use crate::sourcemap::SourceMapManager;
    use mockall::mock;

    mock! {
        pub Transport {}

        #[async_trait::async_trait]
        impl InspectorTransportTrait for Transport {
            async fn read_message(&mut self) -> Result<CdpMessage>;
            async fn write_message(&mut self, msg: &CdpRequest) -> Result<()>;
            async fn close(&mut self) -> Result<()>;
        }
    }

    async fn registry_with_mock_ops() -> BreakpointRegistry {
        let mut mock = MockTransport::new();
        mock.expect_write_message().returning(|_| Ok(()));
        mock.expect_read_message().returning(|| {
            Ok(CdpMessage {
                id: Some(1),
                method: None,
                params: None,
                result: Some(serde_json::json!({
                    "breakpointId": "1:3:0:file:///tmp/test.js",
                    "locations": [],
                })),
                error: None,
            })
        });
        let inspector = Arc::new(InspectorClient::new_with_transport(Box::new(mock)).await.unwrap());
        let source_maps = Arc::new(SourceMapManager::new(None));
        let ops = Arc::new(CdpBreakpointOps::new(inspector, source_maps));
        BreakpointRegistry::new(ops, Duration::from_millis(50), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn create_then_list_includes_the_breakpoint() {
        let registry = registry_with_mock_ops().await;
        let bp = registry
            .create(BreakpointKind::Line, "test.js".to_string(), 3, None, None, None, None)
            .await
            .unwrap();

        let listed = registry.list().await;
        assert!(listed.iter().any(|b| b.id == bp.id));
    }

    #[tokio::test]
    async fn remove_then_list_excludes_the_breakpoint() {
        let registry = registry_with_mock_ops().await;
        let bp = registry
            .create(BreakpointKind::Line, "test.js".to_string(), 3, None, None, None, None)
            .await
            .unwrap();

        registry.remove(bp.id).await.unwrap();
        let listed = registry.list().await;
        assert!(!listed.iter().any(|b| b.id == bp.id));
    }

    #[tokio::test]
    async fn function_breakpoints_rejected_from_url_resolution_path() {
        let registry = registry_with_mock_ops().await;
        let result = registry
            .create(BreakpointKind::Function, "ignored".to_string(), 0, None, None, None, None)
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn create_function_breakpoint_bypasses_url_resolution() {
        let registry = registry_with_mock_ops().await;
        let bp = registry.create_function_breakpoint("myFunction".to_string(), None).await.unwrap();
        assert_eq!(bp.kind, BreakpointKind::Function);
        assert_eq!(bp.file, "myFunction");
        assert!(!bp.is_pending());
    }

    #[tokio::test]
    async fn create_exception_breakpoint_bypasses_url_resolution() {
        let registry = registry_with_mock_ops().await;
        let bp = registry.create_exception_breakpoint(ExceptionPauseState::Uncaught).await.unwrap();
        assert_eq!(bp.kind, BreakpointKind::Exception);
        assert!(!bp.is_pending());
    }

    #[tokio::test]
    async fn mark_resolved_updates_locations_for_matching_server_id() {
        let registry = registry_with_mock_ops().await;
        let bp = registry
            .create(BreakpointKind::Line, "test.js".to_string(), 3, None, None, None, None)
            .await
            .unwrap();
        let server_id = bp.server_id.clone().expect("mock always resolves on create");

        registry
            .mark_resolved(
                &server_id,
                vec![CdpLocation { script_id: "1".to_string(), line_number: 3, column_number: None }],
            )
            .await;

        let updated = registry.get(bp.id).await.unwrap();
        assert!(!updated.resolved_locations.is_empty());
    }

    #[tokio::test]
    async fn record_hit_without_predicate_always_surfaces() {
        let registry = registry_with_mock_ops().await;
        let bp = registry
            .create(BreakpointKind::Line, "test.js".to_string(), 3, None, None, None, None)
            .await
            .unwrap();
        assert!(registry.record_hit(bp.id).await.unwrap());
    }

    #[tokio::test]
    async fn record_hit_respects_hit_count_predicate() {
        let registry = registry_with_mock_ops().await;
        let bp = registry
            .create(
                BreakpointKind::HitCount,
                "test.js".to_string(),
                3,
                None,
                None,
                None,
                Some(HitCountPredicate::Equals(2)),
            )
            .await
            .unwrap();

        assert!(!registry.record_hit(bp.id).await.unwrap());
        assert!(registry.record_hit(bp.id).await.unwrap());
        assert!(!registry.record_hit(bp.id).await.unwrap());
    }
}
