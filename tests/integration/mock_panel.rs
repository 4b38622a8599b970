//! Fake panel for integration testing.
//!
//! An axum server bound to an ephemeral localhost port. Routes are keyed
//! by (method, path) and answer through a responder closure, so each test
//! can model one particular flavour of the panel. Unknown paths get an
//! HTML 404, known paths with the wrong method get 405, and every request
//! is recorded for later assertions.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use checkin::config::AppConfig;

/// One request as seen by the fake panel.
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl Hit {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.starts_with("application/json"))
    }
}

type Responder = Arc<dyn Fn(&Hit) -> (StatusCode, String) + Send + Sync>;

struct Shared {
    routes: HashMap<(Method, String), Responder>,
    hits: Mutex<Vec<Hit>>,
}

/// Builder for a fake panel.
#[derive(Default)]
pub struct MockPanel {
    routes: HashMap<(Method, String), Responder>,
}

impl MockPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` through `f`.
    pub fn route<F>(mut self, method: Method, path: &str, f: F) -> Self
    where
        F: Fn(&Hit) -> (StatusCode, String) + Send + Sync + 'static,
    {
        self.routes.insert((method, path.to_string()), Arc::new(f));
        self
    }

    /// Answer `method path` with a fixed JSON body.
    pub fn json(self, method: Method, path: &str, status: StatusCode, body: Value) -> Self {
        let text = body.to_string();
        self.route(method, path, move |_| (status, text.clone()))
    }

    /// Bind to 127.0.0.1 on a free port and serve in the background.
    pub async fn start(self) -> RunningPanel {
        let shared = Arc::new(Shared {
            routes: self.routes,
            hits: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(dispatch).with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock panel port");
        let addr = listener.local_addr().expect("Mock panel has no address");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock panel server error");
        });

        RunningPanel {
            base_url: format!("http://{addr}"),
            shared,
        }
    }
}

/// A started fake panel.
pub struct RunningPanel {
    pub base_url: String,
    shared: Arc<Shared>,
}

impl RunningPanel {
    /// All requests received so far, in arrival order.
    pub fn hits(&self) -> Vec<Hit> {
        self.shared.hits.lock().unwrap().clone()
    }

    /// Requests received for `path`.
    pub fn hits_for(&self, path: &str) -> Vec<Hit> {
        self.hits().into_iter().filter(|h| h.path == path).collect()
    }

    /// Client configuration pointing at this panel.
    pub fn config(&self) -> AppConfig {
        config_for(&self.base_url)
    }
}

/// Client configuration for the panel at `base_url`.
pub fn config_for(base_url: &str) -> AppConfig {
    let base_url = base_url.to_string();
    let mut cfg = AppConfig::from_lookup(move |name| match name {
        "BASE_URL" => Some(base_url.clone()),
        "EMAIL" => Some("user@example.com".to_string()),
        "PASSWORD" => Some("hunter2".to_string()),
        _ => None,
    })
    .expect("Mock panel config should be valid");
    cfg.http.timeout_secs = 5;
    cfg
}

/// Configuration pointing at a localhost port nothing listens on.
pub async fn closed_port_config() -> AppConfig {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind throwaway port");
    let addr = listener.local_addr().expect("Throwaway listener has no address");
    drop(listener);
    config_for(&format!("http://{addr}"))
}

async fn dispatch(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let hit = Hit {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    shared.hits.lock().unwrap().push(hit.clone());

    let key = (method, hit.path.clone());
    if let Some(responder) = shared.routes.get(&key) {
        let (status, text) = responder(&hit);
        return (status, [(header::CONTENT_TYPE, "application/json")], text).into_response();
    }

    if shared.routes.keys().any(|(_, path)| *path == hit.path) {
        return (StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response();
    }

    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/html")],
        "<html><body>404 Not Found</body></html>",
    )
        .into_response()
}
