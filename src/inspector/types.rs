use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound CDP request: `{id, method, params}`.
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A CDP structured error (`{code, message, data?}`), carried inside an error response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CdpError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Inbound CDP message. Responses carry `id`; events carry `method` with no `id`.
/// Both shapes are parsed into this one struct since CDP does not tag messages.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpMessage {
    pub id: Option<u64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<CdpError>,
}

/// A fanned-out unsolicited inspector event.
#[derive(Debug, Clone)]
pub struct InspectorEvent {
    pub method: String,
    pub params: Value,
}

/// `Debugger.scriptParsed` event body (fields used by script indexing; the inspector
/// sends more, which are ignored via `#[serde(default)]` on callers' destructuring).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedParams {
    pub script_id: String,
    pub url: String,
}

/// A concrete breakpoint location as reported by `Debugger.setBreakpointByUrl` or a
/// `Debugger.breakpointResolved` event.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CdpLocation {
    pub script_id: String,
    pub line_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
}

/// Result of `Debugger.setBreakpointByUrl`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlResult {
    pub breakpoint_id: String,
    #[serde(default)]
    pub locations: Vec<CdpLocation>,
}

/// `Debugger.breakpointResolved` event body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResolvedParams {
    pub breakpoint_id: String,
    pub location: CdpLocation,
}

/// `Debugger.paused` event body (trimmed to the fields the session engine consumes).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedParams {
    pub call_frames: Vec<CallFrame>,
    pub reason: String,
    #[serde(default)]
    pub hit_breakpoints: Vec<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// One CDP call frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    pub call_frame_id: String,
    pub function_name: String,
    pub location: CdpLocation,
    #[serde(default)]
    pub scope_chain: Vec<CdpScope>,
    #[serde(default)]
    pub this: Option<RemoteObject>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpScope {
    #[serde(rename = "type")]
    pub kind: String,
    pub object: RemoteObject,
}

/// `Runtime.RemoteObject`: the tagged value CDP uses for every evaluation result.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

/// `Runtime.PropertyDescriptor`, as returned by `Runtime.getProperties`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(default)]
    pub value: Option<RemoteObject>,
    #[serde(default)]
    pub enumerable: bool,
}

/// `Runtime.ExceptionDetails`, attached to `Debugger.paused` when `reason == "exception"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub text: String,
    #[serde(default)]
    pub exception: Option<RemoteObject>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cdp_request_omits_absent_params() {
        let req = CdpRequest {
            id: 1,
            method: "Debugger.enable".to_string(),
            params: None,
        };
        let serialized = serde_json::to_string(&req).unwrap();
        assert!(!serialized.contains("params"));
    }

    #[test]
    fn cdp_message_parses_response_shape() {
        let raw = r#"{"id":7,"result":{"breakpointId":"1:10:0:foo.js","locations":[]}}"#;
        let msg: CdpMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.id, Some(7));
        assert!(msg.method.is_none());
        assert!(msg.result.is_some());
    }

    #[test]
    fn cdp_message_parses_event_shape() {
        let raw = r#"{"method":"Debugger.scriptParsed","params":{"scriptId":"42","url":"file.js"}}"#;
        let msg: CdpMessage = serde_json::from_str(raw).unwrap();
        assert!(msg.id.is_none());
        assert_eq!(msg.method.as_deref(), Some("Debugger.scriptParsed"));
    }

    #[test]
    fn paused_params_decode_call_frames() {
        let raw = json!({
            "callFrames": [{
                "callFrameId": "frame1",
                "functionName": "main",
                "location": {"scriptId": "1", "lineNumber": 3},
                "scopeChain": [],
            }],
            "reason": "Break on start",
        });
        let parsed: PausedParams = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.call_frames.len(), 1);
        assert_eq!(parsed.call_frames[0].function_name, "main");
    }
}
