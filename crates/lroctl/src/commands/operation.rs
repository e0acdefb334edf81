//! status, wait and result commands

use lroctl_core::{Config, OperationHandle, ProgressCallback, ProgressEvent, ReqwestSender};
use serde_json::{Value, json};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{load_state, print_json, save_state};
use crate::error::{CliError, Result};

/// Summary of an operation as printed by `status` and `wait`
fn summary(op: &OperationHandle) -> Value {
    json!({
        "method": op.method().map(|m| m.to_string()),
        "pollingMethod": op.polling_method().to_string(),
        "pollingURI": op.polling_url(),
        "resultURI": op.result_url(),
        "state": op.status(),
        "terminated": op.is_terminated(),
        "error": op.service_error(),
    })
}

pub fn handle_status(file: &Path) -> Result<()> {
    let op = load_state(file)?;
    print_json(&summary(&op))
}

fn log_progress() -> ProgressCallback {
    Box::new(|event: ProgressEvent| match event {
        ProgressEvent::Polling {
            url,
            status,
            elapsed,
        } => info!(%url, %status, ?elapsed, "operation still running"),
        ProgressEvent::Retrying {
            attempt,
            delay,
            error,
        } => warn!(attempt, ?delay, %error, "polling failed, retrying"),
        ProgressEvent::Completed { status, elapsed } => {
            info!(%status, ?elapsed, "operation completed")
        }
        ProgressEvent::Failed { error } => warn!(%error, "operation did not complete"),
    })
}

/// Cancel the token on Ctrl-C
fn cancel_on_interrupt(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling wait");
            cancel.cancel();
        }
    });
}

pub async fn handle_wait(
    config: &Config,
    file: &Path,
    timeout_secs: Option<u64>,
    no_save: bool,
) -> Result<()> {
    let mut op = load_state(file)?;
    let sender = ReqwestSender::from_config(&config.http)?;

    let mut polling = config.polling.clone();
    if let Some(secs) = timeout_secs {
        polling.polling_timeout_secs = secs;
    }

    let cancel = CancellationToken::new();
    cancel_on_interrupt(&cancel);

    let outcome = op
        .wait_for_completion(&sender, &polling, &cancel, Some(log_progress()))
        .await;

    if !no_save {
        save_state(file, &op)?;
        debug!(path = %file.display(), "state file updated");
    }
    print_json(&summary(&op))?;

    outcome.map_err(CliError::from)
}

pub async fn handle_result(config: &Config, file: &Path) -> Result<()> {
    let op = load_state(file)?;
    let sender = ReqwestSender::from_config(&config.http)?;

    let response = op.get_result(&sender, &CancellationToken::new()).await?;
    debug!(status = response.status.as_u16(), "fetched operation result");

    match serde_json::from_slice::<Value>(&response.body) {
        Ok(body) => print_json(&body),
        Err(_) => {
            println!("{}", response.body_text());
            Ok(())
        }
    }
}
