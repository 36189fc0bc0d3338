use crate::inspector::{InspectorClient, RemoteObject};
use crate::session::state::FrameSnapshot;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// An object reference tagged with the pause epoch it was issued in (§9). Any call
/// that accepts a reference from a stale epoch is rejected without touching the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: String,
    pub epoch: u64,
}

/// The dynamic value model at the boundary (§9): internal code past this point never
/// handles raw `Runtime.RemoteObject` JSON directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EvalResult {
    Primitive { value: JsonValue },
    Object { object_ref: ObjectRef, preview: Option<String> },
    Undefined,
    Function { description: String },
}

impl EvalResult {
    fn from_remote_object(obj: RemoteObject, epoch: u64) -> Self {
        match obj.kind.as_str() {
            "object" if obj.object_id.is_some() => EvalResult::Object {
                object_ref: ObjectRef {
                    object_id: obj.object_id.unwrap(),
                    epoch,
                },
                preview: obj.description,
            },
            "function" => EvalResult::Function {
                description: obj.description.unwrap_or_else(|| "[Function]".to_string()),
            },
            "undefined" => EvalResult::Undefined,
            _ => EvalResult::Primitive {
                value: obj.value.unwrap_or(JsonValue::Null),
            },
        }
    }
}

/// A named variable, as returned by `get_local_variables`/`get_global_variables`/
/// `get_properties`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: EvalResult,
}

/// Evaluates expressions in a selected stack frame, walks object properties, and
/// tracks the session's "current frame" for calls that omit an explicit index.
pub struct VariableInspector {
    current_frame: AtomicU64,
    epoch: AtomicU64,
}

impl Default for VariableInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableInspector {
    pub fn new() -> Self {
        Self {
            current_frame: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Invalidate all object references issued during the previous pause. Called by
    /// the session on every resume/step.
    pub fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.current_frame.store(0, Ordering::SeqCst);
    }

    pub fn switch_frame(&self, frame_index: usize, frame_count: usize) -> Result<()> {
        if frame_index >= frame_count {
            return Err(Error::InvalidArgument(format!(
                "frame index {} out of range (stack has {} frames)",
                frame_index, frame_count
            )));
        }
        self.current_frame.store(frame_index as u64, Ordering::SeqCst);
        Ok(())
    }

    pub fn current_frame_index(&self) -> usize {
        self.current_frame.load(Ordering::SeqCst) as usize
    }

    /// Evaluate `expression` on `frame_index` (falling back to the current frame, or
    /// a global evaluate if no frame is active).
    pub async fn evaluate(
        &self,
        inspector: &InspectorClient,
        call_frame_id: Option<&str>,
        expression: &str,
        deadline: Duration,
    ) -> Result<EvalResult> {
        let (method, params) = match call_frame_id {
            Some(frame_id) => (
                "Debugger.evaluateOnCallFrame",
                serde_json::json!({
                    "callFrameId": frame_id,
                    "expression": expression,
                    "generatePreview": true,
                }),
            ),
            None => (
                "Runtime.evaluate",
                serde_json::json!({
                    "expression": expression,
                    "generatePreview": true,
                }),
            ),
        };

        let result = inspector.send(method, Some(params), deadline).await?;
        self.extract_eval_result(result)
    }

    /// Walk the named properties of an object reference. Rejects references from a
    /// pause epoch other than the current one with [`Error::StaleReference`], never
    /// touching the wire for a reference known to be stale.
    pub async fn get_properties(
        &self,
        inspector: &InspectorClient,
        object_ref: &ObjectRef,
        deadline: Duration,
    ) -> Result<Vec<Variable>> {
        if object_ref.epoch != self.current_epoch() {
            return Err(Error::StaleReference);
        }

        let result = inspector
            .send(
                "Runtime.getProperties",
                Some(serde_json::json!({
                    "objectId": object_ref.object_id,
                    "ownProperties": true,
                })),
                deadline,
            )
            .await?;

        let descriptors: Vec<crate::inspector::types::PropertyDescriptor> =
            serde_json::from_value(result.get("result").cloned().unwrap_or(JsonValue::Null))
                .map_err(Error::Json)?;

        let epoch = self.current_epoch();
        Ok(descriptors
            .into_iter()
            .filter(|d| d.enumerable)
            .filter_map(|d| {
                d.value.map(|value| Variable {
                    name: d.name,
                    value: EvalResult::from_remote_object(value, epoch),
                })
            })
            .collect())
    }

    fn extract_eval_result(&self, result: JsonValue) -> Result<EvalResult> {
        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception
                .get("text")
                .and_then(|t| t.as_str())
                .unwrap_or("evaluation threw")
                .to_string();
            return Err(Error::ConditionError(text));
        }

        let remote: RemoteObject =
            serde_json::from_value(result.get("result").cloned().unwrap_or(JsonValue::Null))
                .map_err(Error::Json)?;
        Ok(EvalResult::from_remote_object(remote, self.current_epoch()))
    }
}

/// Render frame snapshots as `{file}:{line}`-style stack entries for the tool
/// façade; kept separate from [`VariableInspector`] since navigation over an
/// already-captured snapshot needs no inspector round-trip.
pub fn render_stack(frames: &[FrameSnapshot]) -> Vec<serde_json::Value> {
    frames
        .iter()
        .map(|f| {
            serde_json::json!({
                "index": f.index,
                "functionName": f.function_name,
                "file": f.file,
                "line": f.line,
                "column": f.column,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_epoch_invalidates_prior_frame_selection() {
        let inspector = VariableInspector::new();
        inspector.switch_frame(0, 3).unwrap();
        assert_eq!(inspector.current_frame_index(), 0);
        let before = inspector.current_epoch();
        inspector.advance_epoch();
        assert_eq!(inspector.current_epoch(), before + 1);
    }

    #[test]
    fn switch_frame_rejects_out_of_range_index() {
        let inspector = VariableInspector::new();
        let result = inspector.switch_frame(5, 2);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn eval_result_tags_undefined() {
        let remote = RemoteObject {
            kind: "undefined".to_string(),
            subtype: None,
            value: None,
            description: None,
            object_id: None,
        };
        let result = EvalResult::from_remote_object(remote, 0);
        assert!(matches!(result, EvalResult::Undefined));
    }

    #[test]
    fn eval_result_tags_object_with_reference() {
        let remote = RemoteObject {
            kind: "object".to_string(),
            subtype: None,
            value: None,
            description: Some("Object".to_string()),
            object_id: Some("1.2.3".to_string()),
        };
        let result = EvalResult::from_remote_object(remote, 7);
        match result {
            EvalResult::Object { object_ref, .. } => {
                assert_eq!(object_ref.epoch, 7);
                assert_eq!(object_ref.object_id, "1.2.3");
            }
            _ => panic!("expected Object variant"),
        }
    }
}
