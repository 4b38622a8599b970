//! Shared types for the check-in client.
//!
//! Everything the panel hands back is normalised into these types before
//! the workflow looks at it, so the workflow never touches raw JSON.

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Bytes per mebibyte, the unit the panel uses for reward traffic.
pub const MIB: u64 = 1024 * 1024;

/// Bytes per gibibyte.
pub const GIB: u64 = 1024 * MIB;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An authenticated panel session.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }

    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// First 20 characters of the token, safe to put in a log line.
    pub fn token_prefix(&self) -> String {
        self.token().chars().take(20).collect()
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Account and usage state as reported by the panel.
///
/// Every field is optional: panels disagree on which ones they send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub email: Option<String>,
    pub plan: Option<String>,
    /// Plan expiry, passed through verbatim (timestamp or date string).
    pub plan_time: Option<String>,
    /// Account balance, passed through verbatim.
    pub money: Option<String>,
    /// Total quota in bytes.
    pub transfer_enable: Option<u64>,
    /// Used quota in bytes.
    pub used: Option<u64>,
    /// Reward traffic earned from check-ins, in bytes.
    pub transfer_checkin: Option<u64>,
}

impl AccountInfo {
    /// Remaining quota in bytes. Only known when the total is known.
    pub fn remaining(&self) -> Option<u64> {
        self.transfer_enable
            .map(|total| total.saturating_sub(self.used.unwrap_or(0)))
    }

    /// Reward traffic in whole MiB, rounded down.
    pub fn reward_traffic_mb(&self) -> Option<u64> {
        self.transfer_checkin.map(|bytes| bytes / MIB)
    }
}

impl fmt::Display for AccountInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref email) = self.email {
            parts.push(format!("email={email}"));
        }
        if let Some(ref plan) = self.plan {
            parts.push(format!("plan={plan}"));
        }
        if let Some(ref until) = self.plan_time {
            parts.push(format!("expires={until}"));
        }
        if let Some(ref money) = self.money {
            parts.push(format!("balance={money}"));
        }
        if let Some(total) = self.transfer_enable {
            parts.push(format!("total={}", format_gb(total)));
            parts.push(format!("used={}", format_gb(self.used.unwrap_or(0))));
        }
        if let Some(left) = self.remaining() {
            parts.push(format!("remaining={}", format_gb(left)));
        }
        if let Some(reward) = self.transfer_checkin {
            parts.push(format!("reward={}", format_mb(reward)));
        }
        if parts.is_empty() {
            write!(f, "(no account fields)")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// Render a byte count as GiB with two decimals.
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB as f64)
}

/// Render a byte count as MiB with two decimals.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MIB as f64)
}

// ---------------------------------------------------------------------------
// Endpoint outcomes
// ---------------------------------------------------------------------------

/// Result of the first check-in candidate the panel accepted.
#[derive(Debug, Clone)]
pub struct CheckinOutcome {
    /// Candidate path that answered.
    pub endpoint: String,
    pub method: Method,
    pub status: StatusCode,
    /// Human-readable result, if the envelope carried one.
    pub message: Option<String>,
    pub raw: serde_json::Value,
}

/// Result of the first convert candidate the panel accepted.
#[derive(Debug, Clone)]
pub struct ConvertOutcome {
    pub endpoint: String,
    pub method: Method,
    pub status: StatusCode,
    pub message: Option<String>,
    /// Extra detail from a `result` field, when it differs from `message`.
    pub detail: Option<String>,
    pub raw: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// How a non-fatal step of the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Done(String),
    Failed(String),
    Skipped(String),
}

impl StepStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, StepStatus::Done(_))
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Done(msg) => write!(f, "done ({msg})"),
            StepStatus::Failed(msg) => write!(f, "failed ({msg})"),
            StepStatus::Skipped(msg) => write!(f, "skipped ({msg})"),
        }
    }
}

/// Summary of one check-in run. Only produced once login succeeded.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub checkin: StepStatus,
    pub account: Option<AccountInfo>,
    pub convert: StepStatus,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "checkin: {} | ", self.checkin)?;
        match self.account {
            Some(ref info) => write!(f, "account: {info} | ")?,
            None => write!(f, "account: unavailable | ")?,
        }
        write!(f, "convert: {}", self.convert)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors for the check-in client.
#[derive(Debug, thiserror::Error)]
pub enum CheckinError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP {kind} during {action}: {source}")]
    Http {
        action: &'static str,
        kind: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Login failed: {0}")]
    Auth(String),

    #[error("Unrecognised {action} response: {body}")]
    Envelope { action: &'static str, body: String },

    #[error("No working {action} endpoint (tried: {})", .tried.join("; "))]
    NoEndpoint {
        action: &'static str,
        tried: Vec<String>,
    },
}

impl CheckinError {
    pub fn http(action: &'static str, source: reqwest::Error) -> Self {
        CheckinError::Http {
            action,
            kind: transport_kind(&source),
            source,
        }
    }
}

/// Short label for a transport failure: timeout, connect, or other.
pub fn transport_kind(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connection error"
    } else if err.is_decode() {
        "decode error"
    } else {
        "request error"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
