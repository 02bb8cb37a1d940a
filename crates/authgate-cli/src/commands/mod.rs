//! CLI command definitions and dispatch.

pub mod login;
pub mod logout;
pub mod request;
pub mod status;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use authgate_client::{AuthClient, ReauthHandler};
use authgate_core::config::GatewayConfig;
use authgate_core::error::AppError;

use crate::output::OutputFormat;

/// authgate: authenticated requests with automatic token refresh
#[derive(Debug, Parser)]
#[command(name = "authgate", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in and store the issued tokens
    Login(login::LoginArgs),
    /// End the session and clear stored tokens
    Logout,
    /// Show the stored tokens
    Status,
    /// Send a request through the gateway
    Request(request::RequestArgs),
    /// Keep the access token fresh until interrupted
    Watch(watch::WatchArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: GatewayConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Login(args) => login::execute(args, config, self.format).await,
            Commands::Logout => logout::execute(config).await,
            Commands::Status => status::execute(config, self.format),
            Commands::Request(args) => request::execute(args, config, self.format).await,
            Commands::Watch(args) => watch::execute(args, config).await,
        }
    }
}

/// Helper: build a client from configuration
pub fn build_client(
    config: GatewayConfig,
    reauth: Option<Arc<dyn ReauthHandler>>,
) -> Result<Arc<AuthClient>, AppError> {
    debug!(
        base_url = %config.client.base_url,
        storage = ?config.storage.backend,
        "Building client"
    );
    let mut builder = AuthClient::builder(config);
    if let Some(handler) = reauth {
        builder = builder.reauth_handler(handler);
    }
    Ok(Arc::new(builder.build()?))
}
