// File: src/client/core.rs
//! HTTPS plumbing shared by the service bindings: TLS setup, default
//! headers, bearer auth, timeouts and JSON request/response handling.
use crate::client::middleware::{DefaultHeadersLayer, DefaultHeadersService};
use crate::error::ServiceError;

use http::{HeaderValue, Method, Request, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;
use tower_http::auth::AddAuthorization;
use tower_layer::Layer;

type HttpsClient = AddAuthorization<
    DefaultHeadersService<Client<hyper_rustls::HttpsConnector<HttpConnector>, String>>,
>;

/// A JSON-over-HTTPS client bound to one API base URL and token.
#[derive(Clone, Debug)]
pub struct JsonClient {
    inner: HttpsClient,
    base_url: String,
    timeout: Duration,
}

impl JsonClient {
    pub fn new(
        base_url: &str,
        token: &str,
        headers: DefaultHeadersLayer,
        timeout: Duration,
    ) -> Result<Self, String> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let uri: Uri = base_url
            .parse()
            .map_err(|e: http::uri::InvalidUri| format!("invalid base URL '{}': {}", base_url, e))?;
        let plain_http = uri.scheme_str() == Some("http");

        // AddAuthorization::bearer panics on values that are not valid headers.
        HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| "API token contains characters not allowed in a header".to_string())?;

        let mut root_store = rustls::RootCertStore::empty();
        let result = rustls_native_certs::load_native_certs();
        root_store.add_parsable_certificates(result.certs);
        if root_store.is_empty() {
            if !plain_http {
                return Err("No valid system certificates found.".to_string());
            }
            log::warn!("No system certificates found; only plain HTTP will work");
        }
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let https_connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();

        let http_client = Client::builder(TokioExecutor::new()).build(https_connector);
        let with_headers = headers.layer(http_client);
        let inner = AddAuthorization::bearer(with_headers, token);

        Ok(Self {
            inner,
            base_url,
            timeout,
        })
    }

    /// Sends `body` as JSON to `path` (relative to the base URL) and decodes
    /// the JSON answer. Non-2xx answers are mapped onto `ServiceError`; a 404
    /// reports `subject` as the missing thing.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        subject: &str,
    ) -> Result<Value, ServiceError> {
        let uri = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let payload = match body {
            Some(v) => serde_json::to_string(v).map_err(|e| ServiceError::Network(e.to_string()))?,
            None => String::new(),
        };
        let mut builder = Request::builder().method(method.clone()).uri(&uri);
        if body.is_some() {
            builder = builder.header(http::header::CONTENT_TYPE, "application/json");
        }
        let req = builder
            .body(payload)
            .map_err(|e| ServiceError::Network(format!("invalid request {}: {}", uri, e)))?;

        log::debug!("{} {}", method, uri);
        let exchange = async {
            let resp = self
                .inner
                .clone()
                .oneshot(req)
                .await
                .map_err(|e| ServiceError::Network(e.to_string()))?;
            let status = resp.status();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| ServiceError::Network(e.to_string()))?
                .to_bytes();
            Ok::<_, ServiceError>((status, bytes))
        };
        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                ServiceError::Network(format!("{} {} timed out after {:?}", method, uri, self.timeout))
            })??;

        if !status.is_success() {
            return Err(map_status(status, &bytes, subject));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Network(format!("invalid JSON from {}: {}", uri, e)))
    }
}

/// Error answers carry `{"message": ...}`; fall back to the status text.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.to_string())
}

pub(crate) fn map_status(status: StatusCode, body: &[u8], subject: &str) -> ServiceError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ServiceError::Auth(error_message(status, body))
        }
        StatusCode::NOT_FOUND => ServiceError::NotFound(subject.to_string()),
        _ => ServiceError::Network(format!("HTTP {}: {}", status.as_u16(), error_message(status, body))),
    }
}
