//! Send an arbitrary request through the gateway.

use clap::Args;
use reqwest::Method;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use authgate_client::ApiRequest;
use authgate_core::config::GatewayConfig;
use authgate_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for request
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// HTTP method, e.g. GET or POST
    pub method: String,

    /// Path relative to the configured base URL
    pub path: String,

    /// JSON request body
    #[arg(short, long)]
    pub data: Option<String>,
}

/// Execute request
pub async fn execute(
    args: &RequestArgs,
    config: GatewayConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .map_err(|_| AppError::invalid_input(format!("Invalid HTTP method: {}", args.method)))?;

    let mut request = ApiRequest::new(method, args.path.clone());
    if let Some(data) = &args.data {
        let body: Value = serde_json::from_str(data)
            .map_err(|e| AppError::invalid_input(format!("Invalid JSON body: {e}")))?;
        request = request.json(body);
    }

    // Ctrl-C aborts the request, including while it waits on a refresh.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let client = super::build_client(config, None)?;
    let response = client.send(request.with_cancellation(cancel)).await?;

    let body = response
        .json::<Value>()
        .unwrap_or_else(|_| Value::String(response.text()));

    match format {
        OutputFormat::Json => output::print_json(&json!({
            "status": response.status.as_u16(),
            "body": body,
        })),
        OutputFormat::Table => {
            output::print_kv("Status", &response.status.to_string());
            match body {
                Value::String(text) => println!("{text}"),
                other => output::print_json(&other),
            }
        }
    }

    Ok(())
}
