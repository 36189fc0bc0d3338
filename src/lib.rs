pub mod breakpoints;
pub mod config;
pub mod error;
pub mod hang_detector;
pub mod inspector;
pub mod launcher;
pub mod mcp;
pub mod profiler;
pub mod session;
pub mod sourcemap;
pub mod variables;

pub use config::Config;
pub use error::Error;
pub use mcp::McpServer;

pub type Result<T> = std::result::Result<T, Error>;

pub async fn serve(config: Config) -> Result<()> {
    let server = McpServer::new(config).await?;
    server.run().await
}
