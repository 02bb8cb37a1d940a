//! Login command.

use clap::Args;
use serde::Serialize;

use authgate_client::SessionService;
use authgate_core::config::GatewayConfig;
use authgate_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for login
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email; prompted when omitted
    #[arg(short, long)]
    pub email: Option<String>,

    /// Account password; prompted when omitted
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Login result shown to the user
#[derive(Debug, Serialize)]
struct LoginSummary {
    subject: Option<String>,
    email: Option<String>,
    role: Option<String>,
    expires_at: Option<String>,
    refresh_token_issued: bool,
}

/// Execute login
pub async fn execute(
    args: &LoginArgs,
    config: GatewayConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let email = match &args.email {
        Some(email) => email.clone(),
        None => dialoguer::Input::<String>::new()
            .with_prompt("Email")
            .interact_text()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?,
    };

    let password = match &args.password {
        Some(password) => password.clone(),
        None => dialoguer::Password::new()
            .with_prompt("Password")
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?,
    };

    let client = super::build_client(config, None)?;
    let session = SessionService::new(client).login(&email, &password).await?;

    let claims = session.claims.unwrap_or_default();
    let summary = LoginSummary {
        expires_at: claims.expires_at().map(|t| t.to_rfc3339()),
        subject: claims.sub,
        email: claims.email,
        role: claims.role,
        refresh_token_issued: session.refresh_token.is_some(),
    };

    match format {
        OutputFormat::Json => output::print_json(&summary),
        OutputFormat::Table => {
            output::print_success("Logged in");
            output::print_kv("Subject", summary.subject.as_deref().unwrap_or("-"));
            output::print_kv("Email", summary.email.as_deref().unwrap_or(&email));
            output::print_kv("Role", summary.role.as_deref().unwrap_or("-"));
            output::print_kv("Expires", summary.expires_at.as_deref().unwrap_or("unknown"));
            output::print_kv(
                "Refresh token",
                if summary.refresh_token_issued { "issued" } else { "not issued" },
            );
        }
    }

    Ok(())
}
