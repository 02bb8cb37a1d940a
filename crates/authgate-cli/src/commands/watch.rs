//! Run the proactive refresh monitor in the foreground.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::broadcast::error::RecvError;

use authgate_client::{ReauthHandler, ReauthNotifier, RefreshMonitor};
use authgate_core::config::GatewayConfig;
use authgate_core::error::AppError;

use crate::output;

/// Arguments for watch
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between checks; overrides `refresh.check_interval_seconds`
    #[arg(long)]
    pub interval: Option<u64>,

    /// Refresh once this many seconds or fewer remain; overrides
    /// `refresh.threshold_seconds`
    #[arg(long)]
    pub threshold: Option<i64>,
}

/// Execute watch
pub async fn execute(args: &WatchArgs, config: GatewayConfig) -> Result<(), AppError> {
    let interval = args
        .interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.refresh.check_interval());
    let threshold = args.threshold.unwrap_or(config.refresh.threshold_seconds);

    let notifier = Arc::new(ReauthNotifier::default());
    let mut signals = notifier.subscribe();
    let handler: Arc<dyn ReauthHandler> = notifier;
    let client = super::build_client(config, Some(handler))?;

    if client.token_store().access_token().is_none() {
        output::print_warning("No access token stored; run `authgate login` first");
        return Ok(());
    }

    let monitor = RefreshMonitor::new(
        client.coordinator().clone(),
        client.token_store().clone(),
        interval,
        threshold,
    );
    monitor.start();
    output::print_success(&format!(
        "Watching token expiry every {}s (threshold {}s), Ctrl-C to stop",
        interval.as_secs(),
        threshold
    ));

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut liveness = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = &mut interrupt => break,
            signal = signals.recv() => match signal {
                Ok(reason) => {
                    output::print_warning(&format!("Re-authentication required: {reason}"));
                    break;
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = liveness.tick() => {
                if !monitor.is_running() {
                    output::print_warning("Session ended");
                    break;
                }
            }
        }
    }

    monitor.stop();
    output::print_success("Stopped watching");
    Ok(())
}
