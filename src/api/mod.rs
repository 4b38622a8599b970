//! Panel API access.
//!
//! Defines the `AccountApi` trait the workflow drives, and the reqwest
//! implementation (`PanelClient`) that walks the panel's unstable
//! endpoints and envelopes.

pub mod client;
pub mod envelope;

use async_trait::async_trait;

use crate::types::{AccountInfo, CheckinError, CheckinOutcome, ConvertOutcome, Session};

/// Operations the check-in workflow needs from the panel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Authenticate with the configured credentials.
    async fn login(&self) -> Result<Session, CheckinError>;

    /// Claim the daily reward.
    async fn checkin(&self, session: &Session) -> Result<CheckinOutcome, CheckinError>;

    /// Fetch account and usage state.
    async fn user_info(&self, session: &Session) -> Result<AccountInfo, CheckinError>;

    /// Convert `traffic_mb` MiB of reward traffic into quota.
    async fn convert_traffic(
        &self,
        session: &Session,
        traffic_mb: u64,
    ) -> Result<ConvertOutcome, CheckinError>;
}
