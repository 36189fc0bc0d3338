use cdp_debugger_mcp::config::LogFormat;
use cdp_debugger_mcp::{Config, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cdp_debugger_mcp")]
#[command(about = "CDP-based MCP debugging server", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server listening on STDIO
    Serve {
        /// Set log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,

        /// Log output format
        #[arg(long, value_enum, default_value = "compact")]
        log_format: CliLogFormat,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum CliLogFormat {
    Compact,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Compact => LogFormat::Compact,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { log_level, log_format } => {
            let config = Config::resolve(log_level, Some(log_format.into()));

            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
            let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
            match config.log_format {
                LogFormat::Json => subscriber.json().init(),
                LogFormat::Compact => subscriber.init(),
            }

            cdp_debugger_mcp::serve(config).await?;
        }
    }

    Ok(())
}
