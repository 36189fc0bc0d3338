use std::time::Duration;

/// Process-wide configuration, resolved once at startup from CLI flags and environment
/// variables and passed to components by explicit injection. No config file — the
/// server is stdio-first, matching its CLI surface.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub command_timeout: Duration,
    pub attach_timeout: Duration,
    pub session_start_timeout: Duration,
    pub profiler_stop_timeout: Duration,
    pub hang_sample_interval: Duration,
    pub hang_threshold_samples: u32,
    pub max_concurrent_sessions: usize,
    pub workspace_root: Option<String>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            command_timeout: Duration::from_secs(5),
            attach_timeout: Duration::from_secs(10),
            session_start_timeout: Duration::from_secs(10),
            profiler_stop_timeout: Duration::from_secs(30),
            hang_sample_interval: Duration::from_millis(100),
            hang_threshold_samples: 5,
            max_concurrent_sessions: 32,
            workspace_root: None,
            auth_token: None,
        }
    }
}

impl Config {
    /// Merge CLI-provided overrides onto defaults, then apply environment variable
    /// overrides for settings that have no CLI flag. CLI flags win over environment,
    /// environment wins over built-in defaults.
    pub fn resolve(log_level: Option<String>, log_format: Option<LogFormat>) -> Self {
        let mut config = Config::default();

        if let Ok(max) = std::env::var("DEBUGGER_MCP_MAX_SESSIONS") {
            if let Ok(parsed) = max.parse() {
                config.max_concurrent_sessions = parsed;
            }
        }
        if let Ok(root) = std::env::var("DEBUGGER_MCP_WORKSPACE_ROOT") {
            config.workspace_root = Some(root);
        }
        if let Ok(level) = std::env::var("DEBUGGER_MCP_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(token) = std::env::var("DEBUGGER_MCP_AUTH_TOKEN") {
            config.auth_token = Some(token);
        }

        if let Some(level) = log_level {
            config.log_level = level;
        }
        if let Some(format) = log_format {
            config.log_format = format;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_overrides_default() {
        let config = Config::resolve(Some("debug".to_string()), None);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn env_var_overrides_default_when_no_cli_flag() {
        std::env::set_var("DEBUGGER_MCP_MAX_SESSIONS", "7");
        let config = Config::resolve(None, None);
        assert_eq!(config.max_concurrent_sessions, 7);
        std::env::remove_var("DEBUGGER_MCP_MAX_SESSIONS");
    }

    #[test]
    fn cli_flag_wins_over_env_var() {
        std::env::set_var("DEBUGGER_MCP_LOG_LEVEL", "warn");
        let config = Config::resolve(Some("trace".to_string()), None);
        assert_eq!(config.log_level, "trace");
        std::env::remove_var("DEBUGGER_MCP_LOG_LEVEL");
    }

    #[test]
    fn auth_token_env_var_is_picked_up() {
        std::env::set_var("DEBUGGER_MCP_AUTH_TOKEN", "s3cr3t");
        let config = Config::resolve(None, None);
        assert_eq!(config.auth_token.as_deref(), Some("s3cr3t"));
        std::env::remove_var("DEBUGGER_MCP_AUTH_TOKEN");
    }

    #[test]
    fn defaults_match_spec_deadlines() {
        let config = Config::default();
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.session_start_timeout, Duration::from_secs(10));
        assert_eq!(config.profiler_stop_timeout, Duration::from_secs(30));
    }
}
