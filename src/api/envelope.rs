//! Response-shape detection.
//!
//! The panel wraps its payloads inconsistently: tokens show up under
//! several names, sometimes nested under `data`; account fields may sit
//! under `result.data`, `data`, `result`, or at the top level; numbers
//! arrive as JSON numbers or as strings. These helpers hide all of that.

use serde_json::{Map, Value};

use crate::types::AccountInfo;

/// Token field names, in the order they are tried. `auth_data` wins over
/// `token` because panels that send both use `token` for the subscription
/// hash and `auth_data` for the session.
pub const DEFAULT_TOKEN_FIELDS: [&str; 3] = ["auth_data", "token", "access_token"];

/// Fields that mark an object as carrying account data.
const ACCOUNT_FIELDS: [&str; 11] = [
    "email",
    "plan",
    "plan_time",
    "expired_at",
    "money",
    "balance",
    "transfer_enable",
    "used",
    "u",
    "d",
    "transfer_checkin",
];

/// Maximum characters of a raw body kept for diagnostics.
const PREVIEW_CHARS: usize = 500;

/// Find the session token, top level first, then under `data`, trying
/// `fields` in order within each scope.
pub fn extract_token<S: AsRef<str>>(body: &Value, fields: &[S]) -> Option<String> {
    for scope in [Some(body), body.get("data")].into_iter().flatten() {
        for field in fields {
            let token = scope
                .get(field.as_ref())
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty());
            if let Some(token) = token {
                return Some(token.to_string());
            }
        }
    }
    None
}

/// First of `keys` that holds a scalar, rendered as text.
pub fn first_text(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| body.get(*k)).find_map(as_text)
}

/// The human-readable message of a response, if any.
pub fn extract_message(body: &Value) -> Option<String> {
    first_text(body, &["msg", "message", "result", "data"])
}

/// Locate the object holding account fields.
pub fn locate_user_data(body: &Value) -> Option<&Map<String, Value>> {
    let candidates = [
        body.pointer("/result/data"),
        body.get("data"),
        body.get("result"),
        Some(body),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .find(|obj| ACCOUNT_FIELDS.iter().any(|f| obj.contains_key(*f)))
}

/// Build [`AccountInfo`] from whichever envelope the panel used.
pub fn account_info(body: &Value) -> Option<AccountInfo> {
    let obj = locate_user_data(body)?;
    let get = |key: &str| obj.get(key);

    let plan = get("plan").and_then(|p| match p {
        Value::Object(inner) => inner.get("name").and_then(as_text),
        other => as_text(other),
    });

    let used = get("used").and_then(as_u64).or_else(|| {
        let up = get("u").and_then(as_u64);
        let down = get("d").and_then(as_u64);
        match (up, down) {
            (None, None) => None,
            (u, d) => Some(u.unwrap_or(0).saturating_add(d.unwrap_or(0))),
        }
    });

    Some(AccountInfo {
        email: get("email").and_then(as_text),
        plan,
        plan_time: get("plan_time").or_else(|| get("expired_at")).and_then(as_text),
        money: get("money").or_else(|| get("balance")).and_then(as_text),
        transfer_enable: get("transfer_enable").and_then(as_u64),
        used,
        transfer_checkin: get("transfer_checkin").and_then(as_u64),
    })
}

/// Coerce a JSON number or numeric string to `u64`. Fractions are
/// truncated; negatives and non-numbers yield `None`.
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

/// Render a scalar as text. Empty strings, nulls and containers yield `None`.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Truncate a raw body for logging.
pub fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}
