use thiserror::Error;

/// The closed set of error kinds the engine can surface, from the inspector transport
/// up through the tool façade. Every variant maps to a stable JSON-RPC-style code via
/// [`Error::error_code`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("failed to spawn target process: {0}")]
    SpawnFailed(String),

    #[error("timed out waiting for inspector attach")]
    AttachTimeout,

    #[error("inspector transport closed")]
    TransportClosed,

    #[error("inspector command timed out")]
    CommandTimeout,

    #[error("operation not valid in current session state: {0}")]
    InvalidState(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("breakpoint not found: {0}")]
    BreakpointNotFound(String),

    #[error("breakpoint could not be resolved: {0}")]
    BreakpointUnresolvable(String),

    #[error("breakpoint condition error: {0}")]
    ConditionError(String),

    #[error("object reference is from a stale pause epoch")]
    StaleReference,

    #[error("target process crashed: {0}")]
    TargetCrashed(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl Error {
    /// Stable, machine-readable JSON-RPC-style error code. Negative range mirrors the
    /// reserved JSON-RPC server-error band; application-specific kinds get their own
    /// slots below it so callers can match on code without string comparison.
    pub fn error_code(&self) -> i32 {
        match self {
            Error::InvalidRequest(_) => -32600,
            Error::InvalidArgument(_) => -32602,
            Error::MethodNotFound(_) => -32601,
            Error::Io(_) | Error::Json(_) | Error::WebSocket(_) | Error::Internal(_) => -32603,
            Error::InvalidTarget(_) => -32001,
            Error::SpawnFailed(_) => -32002,
            Error::AttachTimeout => -32003,
            Error::TransportClosed => -32004,
            Error::CommandTimeout => -32005,
            Error::InvalidState(_) => -32006,
            Error::SessionNotFound(_) => -32007,
            Error::BreakpointNotFound(_) => -32008,
            Error::BreakpointUnresolvable(_) => -32009,
            Error::ConditionError(_) => -32010,
            Error::StaleReference => -32011,
            Error::TargetCrashed(_) => -32012,
            Error::RateLimited(_) => -32013,
            Error::Unauthorized(_) => -32014,
        }
    }

    /// The stable string kind, used in tool-façade error payloads and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "InvalidRequest",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::InvalidTarget(_) => "InvalidTarget",
            Error::SpawnFailed(_) => "SpawnFailed",
            Error::AttachTimeout => "AttachTimeout",
            Error::TransportClosed => "TransportClosed",
            Error::CommandTimeout => "CommandTimeout",
            Error::InvalidState(_) => "InvalidState",
            Error::SessionNotFound(_) => "SessionNotFound",
            Error::BreakpointNotFound(_) => "BreakpointNotFound",
            Error::BreakpointUnresolvable(_) => "BreakpointUnresolvable",
            Error::ConditionError(_) => "ConditionError",
            Error::StaleReference => "StaleReference",
            Error::TargetCrashed(_) => "TargetCrashed",
            Error::RateLimited(_) => "RateLimited",
            Error::Unauthorized(_) => "Unauthorized",
            Error::MethodNotFound(_) => "MethodNotFound",
            Error::Internal(_) | Error::Io(_) | Error::Json(_) | Error::WebSocket(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable_and_distinct() {
        let errors: Vec<Error> = vec![
            Error::InvalidRequest("x".into()),
            Error::InvalidArgument("x".into()),
            Error::InvalidTarget("x".into()),
            Error::SpawnFailed("x".into()),
            Error::AttachTimeout,
            Error::TransportClosed,
            Error::CommandTimeout,
            Error::InvalidState("x".into()),
            Error::SessionNotFound("x".into()),
            Error::BreakpointNotFound("x".into()),
            Error::BreakpointUnresolvable("x".into()),
            Error::ConditionError("x".into()),
            Error::StaleReference,
            Error::TargetCrashed("x".into()),
            Error::RateLimited("x".into()),
            Error::Unauthorized("x".into()),
            Error::MethodNotFound("x".into()),
            Error::Internal("x".into()),
        ];

        let codes: Vec<i32> = errors.iter().map(Error::error_code).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len(), "error codes must be distinct per kind");
    }

    #[test]
    fn kind_strings_match_variants() {
        assert_eq!(Error::StaleReference.kind(), "StaleReference");
        assert_eq!(Error::SessionNotFound("s1".into()).kind(), "SessionNotFound");
    }
}
