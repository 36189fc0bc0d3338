use serde::{Deserialize, Serialize};

/// The session state machine (§3). `Stopped` and `Crashed` are terminal: once
/// reached, every operation but `stop` fails with a fixed error kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Initializing,
    Paused,
    Running,
    Stopped,
    Crashed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Crashed)
    }
}

/// The kind of a user-created breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointKind {
    Line,
    Conditional,
    Log,
    Exception,
    Function,
    HitCount,
}

/// The pause-on-exception mode passed to `Debugger.setPauseOnExceptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionPauseState {
    None,
    Uncaught,
    All,
}

impl ExceptionPauseState {
    pub fn as_cdp_str(&self) -> &'static str {
        match self {
            ExceptionPauseState::None => "none",
            ExceptionPauseState::Uncaught => "uncaught",
            ExceptionPauseState::All => "all",
        }
    }
}

/// A hit-count predicate, e.g. "≥ N", "= N", "% N == 0".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum HitCountPredicate {
    AtLeast(u32),
    Equals(u32),
    Modulo(u32),
}

impl HitCountPredicate {
    pub fn matches(&self, hits: u32) -> bool {
        match *self {
            HitCountPredicate::AtLeast(n) => hits >= n,
            HitCountPredicate::Equals(n) => hits == n,
            HitCountPredicate::Modulo(n) => n != 0 && hits % n == 0,
        }
    }
}

/// The user-facing breakpoint model (§3), decoupled from inspector-assigned
/// identifiers. The mapping between this `id` and the CDP `server_id` lives
/// entirely inside [`crate::breakpoints::registry::BreakpointRegistry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakpoint {
    pub id: u64,
    pub kind: BreakpointKind,
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
    pub condition: Option<String>,
    pub log_message: Option<String>,
    pub hit_count_predicate: Option<HitCountPredicate>,
    pub enabled: bool,
    pub server_id: Option<String>,
    pub resolved_locations: Vec<crate::inspector::CdpLocation>,
    #[serde(skip)]
    pub hit_count: u32,
}

impl Breakpoint {
    /// Function and exception breakpoints have no URL-resolution concept (§4.5) and
    /// are never reported as pending. Everything else is pending while enabled and
    /// either never sent to the inspector or sent but not yet resolved to a concrete
    /// location — a `server_id` with empty `resolved_locations` happens when the
    /// script hasn't parsed yet.
    pub fn is_pending(&self) -> bool {
        match self.kind {
            BreakpointKind::Function | BreakpointKind::Exception => false,
            _ => self.enabled && (self.server_id.is_none() || self.resolved_locations.is_empty()),
        }
    }
}

/// A user-registered watch expression (§3). `changed` reflects whether the value
/// differed from the previous evaluation; the spec deliberately mandates only this
/// much (see Open Questions) and no deeper structural diffing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchExpression {
    pub id: u64,
    pub expression: String,
    pub frame_index: Option<usize>,
    pub last_value: Option<serde_json::Value>,
    pub last_error: Option<String>,
    pub changed: bool,
}

/// Why a `paused` event occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    BreakpointHit,
    Step,
    Pause,
    Exception,
    DebuggerStatement,
    Other,
}

/// One frame in a pause snapshot (§3): resolved against current frame navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub index: usize,
    pub function_name: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// The most recent pause (§3): ordered frames plus why the target stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseSnapshot {
    pub frames: Vec<FrameSnapshot>,
    pub reason: PauseReason,
    pub hit_breakpoint_ids: Vec<u64>,
    pub exception_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_stopped_and_crashed() {
        assert!(SessionState::Stopped.is_terminal());
        assert!(SessionState::Crashed.is_terminal());
        assert!(!SessionState::Paused.is_terminal());
        assert!(!SessionState::Running.is_terminal());
        assert!(!SessionState::Initializing.is_terminal());
    }

    #[test]
    fn hit_count_predicate_at_least() {
        let pred = HitCountPredicate::AtLeast(3);
        assert!(!pred.matches(2));
        assert!(pred.matches(3));
        assert!(pred.matches(4));
    }

    #[test]
    fn hit_count_predicate_modulo() {
        let pred = HitCountPredicate::Modulo(4);
        assert!(pred.matches(4));
        assert!(pred.matches(8));
        assert!(!pred.matches(5));
    }

    #[test]
    fn breakpoint_is_pending_until_resolved() {
        let mut bp = Breakpoint {
            id: 1,
            kind: BreakpointKind::Line,
            file: "a.js".to_string(),
            line: 3,
            column: None,
            condition: None,
            log_message: None,
            hit_count_predicate: None,
            enabled: true,
            server_id: None,
            resolved_locations: vec![],
            hit_count: 0,
        };
        assert!(bp.is_pending());

        // A server_id with no resolved locations yet (unparsed script) is still pending.
        bp.server_id = Some("1:1".to_string());
        assert!(bp.is_pending());

        bp.resolved_locations = vec![crate::inspector::CdpLocation {
            script_id: "1".to_string(),
            line_number: 3,
            column_number: None,
        }];
        assert!(!bp.is_pending());
    }

    #[test]
    fn function_and_exception_breakpoints_are_never_pending() {
        let bp = Breakpoint {
            id: 1,
            kind: BreakpointKind::Function,
            file: "myFunction".to_string(),
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
        assert!(!bp.is_pending());
    }
}
