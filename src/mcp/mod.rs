pub mod protocol;
pub mod tools;
pub mod transport;
pub mod transport_trait;

use crate::config::Config;
use crate::session::SessionManager;
use crate::{Error, Result};
use protocol::ProtocolHandler;
use std::sync::Arc;
use std::time::Duration;
use tools::ToolsHandler;
use tracing::{error, info};
use transport::StdioTransport;

/// Grace period the registry's session teardown gets before shutdown forces through.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct McpServer {
    transport: StdioTransport,
    handler: ProtocolHandler,
    session_manager: Arc<SessionManager>,
}

impl McpServer {
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing MCP server");

        let auth_token = config.auth_token.clone();
        let session_manager = Arc::new(SessionManager::new(config));
        let tools_handler = Arc::new(ToolsHandler::new(session_manager.clone(), auth_token));

        let mut handler = ProtocolHandler::new();
        handler.set_tools_handler(tools_handler);

        Ok(Self {
            transport: StdioTransport::new(),
            handler,
            session_manager,
        })
    }

    /// Runs the read/dispatch/write loop until SIGINT/SIGTERM or stdin EOF, at which
    /// point every session is torn down before returning (§4.10).
    pub async fn run(mut self) -> Result<()> {
        info!("Starting MCP server");

        #[cfg(unix)]
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");

        loop {
            #[cfg(unix)]
            let terminated = sigterm.recv();
            #[cfg(not(unix))]
            let terminated = std::future::pending::<Option<()>>();

            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("Received interrupt, shutting down gracefully");
                    self.session_manager.shutdown(SHUTDOWN_GRACE).await;
                    return Ok(());
                }
                _ = terminated => {
                    info!("Received SIGTERM, shutting down gracefully");
                    self.session_manager.shutdown(SHUTDOWN_GRACE).await;
                    return Ok(());
                }
                read = self.transport.read_message() => {
                    match read {
                        Ok(msg) => {
                            let response = self.handler.handle_message(msg).await;
                            if let Err(e) = self.transport.write_message(&response).await {
                                error!("Failed to write response: {}", e);
                                return Err(e);
                            }
                        }
                        Err(Error::InvalidRequest(ref reason)) if reason == "EOF reached" => {
                            info!("stdin closed, shutting down gracefully");
                            self.session_manager.shutdown(SHUTDOWN_GRACE).await;
                            return Ok(());
                        }
                        Err(e) => {
                            error!("Failed to read message: {}", e);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}
