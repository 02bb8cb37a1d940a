//! Logout command.

use authgate_client::SessionService;
use authgate_core::config::GatewayConfig;
use authgate_core::error::AppError;

use crate::output;

/// Execute logout
pub async fn execute(config: GatewayConfig) -> Result<(), AppError> {
    let client = super::build_client(config, None)?;

    if !client.token_store().has_credentials() {
        output::print_warning("No session stored");
        return Ok(());
    }

    SessionService::new(client).logout().await?;
    output::print_success("Logged out");
    Ok(())
}
