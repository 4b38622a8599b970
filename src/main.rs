//! checkin — daily check-in client for a panel account API.
//!
//! Entry point. Loads `.env` and configuration, initialises structured
//! logging, and runs the login → check-in → info → convert sequence once.

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use tracing::{error, info, warn};

use checkin::api::client::PanelClient;
use checkin::config::AppConfig;
use checkin::workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    info!("Starting daily check-in");

    let cfg = AppConfig::from_env().context("Failed to load configuration")?;
    info!(
        base_url = %cfg.panel.base_url,
        email = %cfg.panel.email,
        password_len = cfg.panel.password.expose_secret().len(),
        "Configuration loaded"
    );

    let client = PanelClient::new(&cfg).context("Failed to build panel client")?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tokio::select! {
        result = workflow::run(&client, &cfg.convert) => match result {
            Ok(report) => {
                if !report.checkin.is_done() {
                    warn!(checkin = %report.checkin, "Check-in did not succeed");
                }
                info!("Check-in script finished");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed, stopping");
                Err(e).context("Check-in run aborted")
            }
        },
        _ = &mut shutdown => {
            warn!("Interrupted by user");
            Ok(())
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("checkin=info"));

    let json_logging = std::env::var("CHECKIN_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
