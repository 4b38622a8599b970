//! The daily check-in sequence.
//!
//! login → check in → fetch account info → convert reward traffic.
//! Only login is fatal; every later step records its outcome in the
//! [`RunReport`] and the run carries on.

use tracing::{info, warn};

use crate::api::AccountApi;
use crate::config::ConvertConfig;
use crate::types::{
    format_gb, format_mb, AccountInfo, CheckinError, RunReport, Session, StepStatus,
};

/// Run the whole sequence once.
pub async fn run(
    api: &dyn AccountApi,
    convert: &ConvertConfig,
) -> Result<RunReport, CheckinError> {
    // 1. Login
    let session = api.login().await?;

    // 2. Check in
    let checkin = match api.checkin(&session).await {
        Ok(outcome) => {
            let message = outcome
                .message
                .clone()
                .unwrap_or_else(|| "no result field".to_string());
            if outcome.status.is_success() {
                info!(
                    endpoint = %outcome.endpoint,
                    method = %outcome.method,
                    result = %message,
                    "Check-in done"
                );
                StepStatus::Done(message)
            } else {
                warn!(
                    endpoint = %outcome.endpoint,
                    status = %outcome.status,
                    result = %message,
                    "Check-in refused"
                );
                StepStatus::Failed(format!("HTTP {}: {message}", outcome.status.as_u16()))
            }
        }
        Err(e) => {
            warn!(error = %e, "Check-in failed, continuing");
            StepStatus::Failed(e.to_string())
        }
    };

    // 3. Account info
    let account = match api.user_info(&session).await {
        Ok(info) => {
            log_account(&info);
            Some(info)
        }
        Err(e) => {
            warn!(error = %e, "Could not fetch account info, skipping conversion");
            None
        }
    };

    // 4. Convert reward traffic
    let convert = match account {
        None => StepStatus::Skipped("no account info".to_string()),
        Some(ref info) => convert_reward(api, &session, info, convert).await,
    };

    let report = RunReport {
        checkin,
        account,
        convert,
    };
    info!(report = %report, "Check-in run complete");
    Ok(report)
}

async fn convert_reward(
    api: &dyn AccountApi,
    session: &Session,
    info: &AccountInfo,
    cfg: &ConvertConfig,
) -> StepStatus {
    let Some(traffic_mb) = info.reward_traffic_mb() else {
        warn!("Account info has no reward traffic field");
        return StepStatus::Skipped("no reward traffic field".to_string());
    };
    info!(traffic_mb, "Reward traffic available");

    if traffic_mb == 0 || traffic_mb < cfg.min_traffic_mb {
        info!(traffic_mb, min = cfg.min_traffic_mb, "Nothing to convert, come back tomorrow");
        return StepStatus::Skipped(format!("nothing to convert ({traffic_mb} MB)"));
    }
    if !cfg.enabled {
        info!(traffic_mb, "Conversion disabled");
        return StepStatus::Skipped(format!("conversion disabled ({traffic_mb} MB available)"));
    }

    match api.convert_traffic(session, traffic_mb).await {
        Ok(outcome) => {
            let message = outcome
                .message
                .clone()
                .unwrap_or_else(|| "no msg field".to_string());
            if let Some(ref detail) = outcome.detail {
                info!(detail = %detail, "Conversion detail");
            }
            if outcome.status.is_success() {
                info!(traffic_mb, endpoint = %outcome.endpoint, result = %message, "Conversion done");
                StepStatus::Done(format!("{traffic_mb} MB: {message}"))
            } else {
                warn!(traffic_mb, status = %outcome.status, result = %message, "Conversion refused");
                StepStatus::Failed(format!("HTTP {}: {message}", outcome.status.as_u16()))
            }
        }
        Err(e) => {
            warn!(traffic_mb, error = %e, "Conversion failed");
            StepStatus::Failed(e.to_string())
        }
    }
}

/// Log each known account field on its own line.
fn log_account(info: &AccountInfo) {
    if let Some(ref email) = info.email {
        info!(email = %email, "Account email");
    }
    if let Some(ref plan) = info.plan {
        info!(plan = %plan, "Current plan");
    }
    if let Some(ref until) = info.plan_time {
        info!(plan_time = %until, "Plan expires");
    }
    if let Some(ref money) = info.money {
        info!(balance = %money, "Account balance");
    }
    if let (Some(total), Some(left)) = (info.transfer_enable, info.remaining()) {
        info!(
            total = %format_gb(total),
            used = %format_gb(info.used.unwrap_or(0)),
            remaining = %format_gb(left),
            "Traffic usage"
        );
    }
    if let Some(reward) = info.transfer_checkin {
        info!(reward = %format_mb(reward), "Check-in reward traffic");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
