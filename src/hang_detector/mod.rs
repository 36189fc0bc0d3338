use crate::inspector::InspectorClient;
use crate::launcher;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info};

/// A standalone hang-detection run: spawns the target with inspector-break-on-start,
/// attaches a minimal transport, resumes, then samples the top frame periodically
/// without ever constructing a full [`crate::session::DebugSession`] (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HangReport {
    pub hung: bool,
    pub completed: bool,
    pub location: Option<FrameLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLocation {
    pub file: String,
    pub line: u32,
}

fn frame_from_paused_params(params: &serde_json::Value) -> Option<FrameLocation> {
    let first = params.get("callFrames")?.get(0)?;
    let file = first.get("url").and_then(|u| u.as_str())?.to_string();
    let line = first
        .get("location")
        .and_then(|l| l.get("lineNumber"))
        .and_then(|n| n.as_u64())? as u32;
    Some(FrameLocation { file, line })
}

/// Run the detector. `sample_interval` governs tick spacing; `consecutive_threshold`
/// is K: the number of consecutive identical top-frame samples that classifies the
/// target as hung. `timeout` bounds total wall time, after which an inconclusive
/// `running` result (`hung: false, completed: false`) is returned.
pub async fn detect_hang(
    command: &str,
    args: &[String],
    timeout: Duration,
    sample_interval: Duration,
    consecutive_threshold: u32,
    attach_timeout: Duration,
    request_timeout: Duration,
) -> Result<HangReport> {
    let mut target = launcher::launch(command, args, None, &[], None, attach_timeout).await?;
    let inspector = Arc::new(InspectorClient::connect(&target.ws_url).await?);
    inspector.send("Debugger.enable", None, request_timeout).await?;
    inspector.send("Runtime.enable", None, request_timeout).await?;

    let last_pause: Arc<RwLock<Option<serde_json::Value>>> = Arc::new(RwLock::new(None));
    let paused_notify = Arc::new(Notify::new());
    {
        let last_pause = last_pause.clone();
        let paused_notify = paused_notify.clone();
        inspector
            .on_event("Debugger.paused", move |event| {
                let last_pause = last_pause.clone();
                let paused_notify = paused_notify.clone();
                tokio::spawn(async move {
                    *last_pause.write().await = Some(event.params);
                    paused_notify.notify_waiters();
                });
            })
            .await;
    }

    inspector.send("Debugger.resume", None, request_timeout).await?;

    let start = tokio::time::Instant::now();
    let mut last_location: Option<FrameLocation> = None;
    let mut consecutive = 0u32;
    let mut ticker = tokio::time::interval(sample_interval);

    while start.elapsed() < timeout {
        ticker.tick().await;

        if let Ok(Some(status)) = target.child.try_wait() {
            debug!("hang-detector target exited with {:?}", status);
            return Ok(HangReport {
                hung: false,
                completed: true,
                location: last_location,
            });
        }

        let notified = paused_notify.notified();
        if inspector.send("Debugger.pause", None, request_timeout).await.is_err() {
            continue;
        }
        let _ = tokio::time::timeout(sample_interval, notified).await;
        let location = last_pause.read().await.as_ref().and_then(frame_from_paused_params);
        let _ = inspector.send("Debugger.resume", None, request_timeout).await;

        match (&location, &last_location) {
            (Some(loc), Some(prev)) if loc == prev => consecutive += 1,
            (Some(_), _) => consecutive = 1,
            (None, _) => consecutive = 0,
        }
        if location.is_some() {
            last_location = location;
        }

        if consecutive >= consecutive_threshold {
            info!("hang detected at {:?} after {} identical samples", last_location, consecutive);
            let _ = target.child.start_kill();
            return Ok(HangReport {
                hung: true,
                completed: false,
                location: last_location,
            });
        }
    }

    let _ = target.child.start_kill();
    Ok(HangReport {
        hung: false,
        completed: false,
        location: last_location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_location_equality_is_by_value() {
        let a = FrameLocation { file: "a.js".to_string(), line: 3 };
        let b = FrameLocation { file: "a.js".to_string(), line: 3 };
        assert_eq!(a, b);
    }

    #[test]
    fn frame_from_paused_params_extracts_file_and_line() {
        let raw = serde_json::json!({
            "callFrames": [{
                "url": "file:///tmp/a.js",
                "location": {"scriptId": "1", "lineNumber": 9},
            }],
            "reason": "other",
        });
        let loc = frame_from_paused_params(&raw).unwrap();
        assert_eq!(loc.file, "file:///tmp/a.js");
        assert_eq!(loc.line, 9);
    }

    #[tokio::test]
    async fn detect_hang_propagates_launch_failure_for_missing_binary() {
        let report = detect_hang(
            "definitely-not-a-real-binary-xyz",
            &[],
            Duration::from_secs(1),
            Duration::from_millis(20),
            3,
            Duration::from_millis(200),
            Duration::from_millis(200),
        )
        .await;
        assert!(report.is_err());
    }
}
