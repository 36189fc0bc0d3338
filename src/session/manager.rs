use crate::config::Config;
use crate::session::DebugSession;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Indexes active sessions by opaque ID, enforces `max_concurrent_sessions`, and
/// drives graceful shutdown of every session it owns (§5, §4.10).
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<DebugSession>>>,
    config: Config,
}

impl SessionManager {
    pub fn new(config: Config) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub async fn start_session(
        &self,
        command: &str,
        args: &[String],
        cwd: Option<&str>,
        env: &[(String, String)],
        start_timeout: Option<Duration>,
    ) -> Result<Arc<DebugSession>> {
        {
            let sessions = self.sessions.read().await;
            if sessions.len() >= self.config.max_concurrent_sessions {
                return Err(Error::RateLimited(format!(
                    "max_concurrent_sessions ({}) reached",
                    self.config.max_concurrent_sessions
                )));
            }
        }

        let mut config = self.config.clone();
        if let Some(timeout) = start_timeout {
            config.attach_timeout = timeout;
            config.session_start_timeout = timeout;
        }

        let session = DebugSession::start(command, args, cwd, env, &config).await?;
        let session_id = session.id.clone();
        session
            .register_crash_handler(move |id| {
                warn!(session_id = %id, "session crashed");
            })
            .await;

        self.sessions.write().await.insert(session_id.clone(), session.clone());
        info!(session_id = %session_id, "session started");
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> Result<Arc<DebugSession>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    pub async fn stop_session(&self, session_id: &str) -> Result<()> {
        let session = self.get(session_id).await?;
        session.stop().await?;
        self.sessions.write().await.remove(session_id);
        info!(session_id = %session_id, "session removed from registry");
        Ok(())
    }

    pub async fn list_session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Cancels every session, driving each through teardown, and awaits completion
    /// up to `grace` before giving up on stragglers (§4.10). Always clears the
    /// registry afterward; a session whose teardown didn't finish in time is no
    /// longer reachable through this manager regardless.
    pub async fn shutdown(&self, grace: Duration) {
        let sessions: Vec<Arc<DebugSession>> = self.sessions.read().await.values().cloned().collect();
        let teardown = futures_util::future::join_all(sessions.iter().map(|s| s.stop()));
        if tokio::time::timeout(grace, teardown).await.is_err() {
            warn!("session shutdown grace period elapsed before all sessions finished teardown");
        }
        self.sessions.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_session_rejects_when_at_capacity() {
        let mut config = Config::default();
        config.max_concurrent_sessions = 0;
        let manager = SessionManager::new(config);
        let result = manager.start_session("node", &[], None, &[], None).await;
        assert!(matches!(result, Err(Error::RateLimited(_))));
    }

    #[tokio::test]
    async fn get_unknown_session_fails_with_session_not_found() {
        let manager = SessionManager::new(Config::default());
        let result = manager.get("nonexistent").await;
        assert!(matches!(result, Err(Error::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn stop_unknown_session_fails_with_session_not_found() {
        let manager = SessionManager::new(Config::default());
        let result = manager.stop_session("nonexistent").await;
        assert!(matches!(result, Err(Error::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn shutdown_with_no_sessions_completes_immediately() {
        let manager = SessionManager::new(Config::default());
        manager.shutdown(Duration::from_millis(50)).await;
        assert_eq!(manager.active_count().await, 0);
    }
}
