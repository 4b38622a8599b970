//! Reqwest implementation of [`AccountApi`].
//!
//! The panel's endpoints and encodings are not stable, so every action
//! walks an ordered list of candidates:
//! - login: each path, JSON body first, then form body;
//! - check-in / convert: each path, GET first, then POST;
//! - user info: each path, GET.
//!
//! A candidate is rejected (and the next one tried) on transport error,
//! 404, 405, or a body that is not JSON. Any other JSON answer means the
//! endpoint exists, and it is interpreted as the final answer.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::envelope;
use super::AccountApi;
use crate::config::{AppConfig, EndpointsConfig, PanelConfig};
use crate::types::{
    transport_kind, AccountInfo, CheckinError, CheckinOutcome, ConvertOutcome, Session,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const ACTION_LOGIN: &str = "login";
const ACTION_CHECKIN: &str = "checkin";
const ACTION_INFO: &str = "user info";
const ACTION_CONVERT: &str = "convert";

/// Keys that may carry the check-in result, most specific first.
const CHECKIN_RESULT_KEYS: [&str; 4] = ["result", "msg", "message", "data"];

/// Response headers whose values are masked in debug logs.
const REDACTED_HEADERS: [&str; 3] = ["set-cookie", "cookie", "authorization"];

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    passwd: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Json,
    Form,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Json => write!(f, "json"),
            Encoding::Form => write!(f, "form"),
        }
    }
}

/// A candidate the panel answered with a JSON body.
#[derive(Debug)]
struct Accepted {
    status: StatusCode,
    body: Value,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Panel client that walks candidate endpoints in order.
pub struct PanelClient {
    http: Client,
    panel: PanelConfig,
    endpoints: EndpointsConfig,
    token_headers: Vec<HeaderName>,
    token_fields: Vec<String>,
}

impl PanelClient {
    pub fn new(cfg: &AppConfig) -> Result<Self, CheckinError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.http.timeout_secs))
            .user_agent(cfg.http.user_agent.as_str())
            .build()
            .map_err(|e| CheckinError::http("client setup", e))?;

        let token_headers = cfg
            .http
            .token_headers
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                    CheckinError::Config(format!("invalid token header name {name:?}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            http,
            panel: cfg.panel.clone(),
            endpoints: cfg.endpoints.clone(),
            token_headers,
            token_fields: cfg.http.token_fields.clone(),
        })
    }

    // -- Internal helpers ------------------------------------------------

    /// Full URL for `path` with encoded `query` pairs and a `t=<millis>`
    /// cache-buster appended.
    fn stamped_url(&self, path: &str, query: &[(&str, String)]) -> String {
        let mut url = self.panel.url(path);
        let mut sep = if url.contains('?') { '&' } else { '?' };
        for (key, value) in query {
            url.push(sep);
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            sep = '&';
        }
        url.push(sep);
        url.push_str(&format!("t={}", Utc::now().timestamp_millis()));
        url
    }

    /// Attach the session token under every configured header name.
    fn authed(&self, req: RequestBuilder, session: &Session) -> RequestBuilder {
        self.token_headers
            .iter()
            .fold(req, |req, name| req.header(name.clone(), session.token()))
    }

    /// Response headers as `name: value` strings, with cookies and the
    /// session token headers masked.
    fn loggable_headers(&self, headers: &HeaderMap) -> Vec<String> {
        headers
            .iter()
            .map(|(name, value)| {
                let secret = REDACTED_HEADERS.contains(&name.as_str())
                    || self.token_headers.contains(name);
                let shown = if secret {
                    "<redacted>"
                } else {
                    value.to_str().unwrap_or("<binary>")
                };
                format!("{name}: {shown}")
            })
            .collect()
    }

    /// Send one candidate request. `Err` carries the rejection reason.
    async fn attempt(
        &self,
        action: &'static str,
        label: &str,
        req: RequestBuilder,
    ) -> Result<Accepted, String> {
        debug!(action, candidate = label, "Trying panel endpoint");

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let kind = transport_kind(&e);
                warn!(action, candidate = label, error = %e, "Panel request failed: {kind}");
                return Err(format!("{label}: {kind}"));
            }
        };

        let status = resp.status();
        debug!(
            action,
            candidate = label,
            status = %status,
            headers = ?self.loggable_headers(resp.headers()),
            "Panel responded"
        );

        if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
            return Err(format!("{label}: HTTP {}", status.as_u16()));
        }

        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => return Err(format!("{label}: {}", transport_kind(&e))),
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok(Accepted { status, body }),
            Err(e) => {
                debug!(
                    action,
                    candidate = label,
                    body = %envelope::preview(&text),
                    "Panel returned a non-JSON body"
                );
                Err(format!("{label}: non-JSON body ({e})"))
            }
        }
    }

    fn login_request(
        &self,
        url: &str,
        encoding: Encoding,
        creds: &LoginRequest<'_>,
    ) -> RequestBuilder {
        let req = self.http.post(url).header("Accept", "application/json");
        match encoding {
            Encoding::Json => req.json(creds),
            Encoding::Form => req.form(creds),
        }
    }
}

// ---------------------------------------------------------------------------
// AccountApi implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl AccountApi for PanelClient {
    async fn login(&self) -> Result<Session, CheckinError> {
        info!(email = %self.panel.email, base_url = %self.panel.base_url, "Logging in");

        let creds = LoginRequest {
            email: &self.panel.email,
            passwd: self.panel.password.expose_secret(),
        };
        let mut tried = Vec::new();

        for path in &self.endpoints.login {
            let url = self.stamped_url(path, &[]);

            for encoding in [Encoding::Json, Encoding::Form] {
                let label = format!("POST {path} ({encoding})");
                let req = self.login_request(&url, encoding, &creds);

                let accepted = match self.attempt(ACTION_LOGIN, &label, req).await {
                    Ok(accepted) => accepted,
                    Err(reason) => {
                        tried.push(reason);
                        continue;
                    }
                };

                if accepted.status.is_success() {
                    let token = envelope::extract_token(&accepted.body, &self.token_fields);
                    if let Some(token) = token {
                        let session = Session::new(token);
                        info!(
                            endpoint = %path,
                            encoding = %encoding,
                            token_prefix = %session.token_prefix(),
                            "Login successful"
                        );
                        return Ok(session);
                    }
                }

                let reason = envelope::extract_message(&accepted.body)
                    .unwrap_or_else(|| "no token in response".to_string());
                let fields: Vec<&str> = accepted
                    .body
                    .as_object()
                    .map(|obj| obj.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                warn!(
                    candidate = %label,
                    status = %accepted.status,
                    reason = %reason,
                    fields = ?fields,
                    "Login attempt refused"
                );
                tried.push(format!("{label}: HTTP {}: {reason}", accepted.status.as_u16()));
            }
        }

        Err(CheckinError::Auth(tried.join("; ")))
    }

    async fn checkin(&self, session: &Session) -> Result<CheckinOutcome, CheckinError> {
        let mut tried = Vec::new();

        for path in &self.endpoints.checkin {
            for method in [Method::GET, Method::POST] {
                let url = self.stamped_url(path, &[]);
                let label = format!("{method} {path}");
                let mut req = self.authed(self.http.request(method.clone(), &url), session);
                if method == Method::POST {
                    req = req.json(&json!({}));
                }

                match self.attempt(ACTION_CHECKIN, &label, req).await {
                    Ok(accepted) => {
                        let message = envelope::first_text(&accepted.body, &CHECKIN_RESULT_KEYS);
                        info!(
                            candidate = %label,
                            status = %accepted.status,
                            message = message.as_deref().unwrap_or("-"),
                            "Check-in endpoint answered"
                        );
                        return Ok(CheckinOutcome {
                            endpoint: path.clone(),
                            method,
                            status: accepted.status,
                            message,
                            raw: accepted.body,
                        });
                    }
                    Err(reason) => tried.push(reason),
                }
            }
        }

        Err(CheckinError::NoEndpoint {
            action: ACTION_CHECKIN,
            tried,
        })
    }

    async fn user_info(&self, session: &Session) -> Result<AccountInfo, CheckinError> {
        let mut tried = Vec::new();
        let mut unrecognised = None;

        for path in &self.endpoints.info {
            let url = self.stamped_url(path, &[]);
            let label = format!("GET {path}");
            let req = self.authed(self.http.get(&url), session);

            match self.attempt(ACTION_INFO, &label, req).await {
                Ok(accepted) => match envelope::account_info(&accepted.body) {
                    Some(info) => {
                        info!(candidate = %label, status = %accepted.status, "Account info fetched");
                        return Ok(info);
                    }
                    None => {
                        warn!(
                            candidate = %label,
                            status = %accepted.status,
                            body = %accepted.body,
                            "Account info envelope not recognised"
                        );
                        tried.push(format!("{label}: unrecognised envelope"));
                        unrecognised = Some(envelope::preview(&accepted.body.to_string()));
                    }
                },
                Err(reason) => tried.push(reason),
            }
        }

        match unrecognised {
            Some(body) => Err(CheckinError::Envelope {
                action: ACTION_INFO,
                body,
            }),
            None => Err(CheckinError::NoEndpoint {
                action: ACTION_INFO,
                tried,
            }),
        }
    }

    async fn convert_traffic(
        &self,
        session: &Session,
        traffic_mb: u64,
    ) -> Result<ConvertOutcome, CheckinError> {
        let traffic = traffic_mb.to_string();
        let mut tried = Vec::new();

        for path in &self.endpoints.convert {
            for method in [Method::GET, Method::POST] {
                let label = format!("{method} {path}");
                let req = if method == Method::GET {
                    let url = self.stamped_url(path, &[("traffic", traffic.clone())]);
                    self.authed(self.http.get(&url), session)
                } else {
                    let url = self.stamped_url(path, &[]);
                    self.authed(self.http.post(&url), session)
                        .json(&json!({ "traffic": traffic }))
                };

                match self.attempt(ACTION_CONVERT, &label, req).await {
                    Ok(accepted) => {
                        let message = envelope::extract_message(&accepted.body);
                        let detail = envelope::first_text(&accepted.body, &["result"])
                            .filter(|d| Some(d) != message.as_ref());
                        info!(
                            candidate = %label,
                            status = %accepted.status,
                            traffic_mb,
                            message = message.as_deref().unwrap_or("-"),
                            "Convert endpoint answered"
                        );
                        return Ok(ConvertOutcome {
                            endpoint: path.clone(),
                            method,
                            status: accepted.status,
                            message,
                            detail,
                            raw: accepted.body,
                        });
                    }
                    Err(reason) => tried.push(reason),
                }
            }
        }

        Err(CheckinError::NoEndpoint {
            action: ACTION_CONVERT,
            tried,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
