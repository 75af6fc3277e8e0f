//! reqwest-backed implementation of [`RulesApi`].
//!
//! Every call is a single request/response cycle awaited by the caller, so the
//! client never has more than one request in flight.

use std::error::Error as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Certificate, Client, Identity, Method, RequestBuilder, Response, StatusCode, Url};
use rulesctl_config::{ClientConfig, Credentials};
use rulesctl_core::{EncodedRulesBlob, RulesApi, RulesError, RulesResult, ServerStatus};
use serde_json::Value;
use tracing::debug;

use crate::client::{CliError, CliResult, HEADER_REQUEST_ID};

const STATUS_PATH: &str = "status";
const RULES_PATH: &str = "rules";

/// Rules service client speaking HTTP(S) to the entitlement server.
pub(crate) struct HttpRulesClient {
    client: Client,
    status_url: Url,
    rules_url: Url,
    basic_auth: Option<(String, String)>,
}

impl HttpRulesClient {
    /// Build a client from validated connection settings.
    ///
    /// `trace_id` is sent as `x-request-id` on every request.
    pub(crate) fn new(config: &ClientConfig, trace_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .danger_accept_invalid_certs(config.insecure);

        if let Some(ca) = &config.server_ca {
            let pem = read_pem(ca)?;
            let certificate = Certificate::from_pem(&pem).map_err(|err| {
                CliError::validation(format!("invalid CA bundle {}: {err}", ca.display()))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        let mut basic_auth = None;
        match &config.credentials {
            Credentials::None => {}
            Credentials::Basic { username, password } => {
                basic_auth = Some((username.clone(), password.clone()));
            }
            Credentials::ClientCert { cert, key } => {
                let mut pem = read_pem(cert)?;
                if let Some(key) = key {
                    pem.push(b'\n');
                    pem.extend(read_pem(key)?);
                }
                let identity = Identity::from_pem(&pem).map_err(|err| {
                    CliError::validation(format!(
                        "invalid client certificate {}: {err}",
                        cert.display()
                    ))
                })?;
                builder = builder.identity(identity);
            }
        }

        let client = builder
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            status_url: config.endpoint(STATUS_PATH).map_err(CliError::config)?,
            rules_url: config.endpoint(RULES_PATH).map_err(CliError::config)?,
            basic_auth,
        })
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        let builder = self.client.request(method, url.clone());
        match &self.basic_auth {
            Some((username, password)) => builder.basic_auth(username, Some(password)),
            None => builder,
        }
    }
}

#[async_trait]
impl RulesApi for HttpRulesClient {
    async fn get_status(&self) -> RulesResult<ServerStatus> {
        const OPERATION: &str = "get_status";
        let builder = self
            .request(Method::GET, &self.status_url)
            .header(ACCEPT, "application/json");
        let response = send(OPERATION, builder, &self.status_url).await?;
        if !response.status().is_success() {
            return Err(classify_failure(OPERATION, response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error(OPERATION, &err))?;
        serde_json::from_slice::<ServerStatus>(&bytes).map_err(|err| RulesError::InvalidResponse {
            operation: OPERATION,
            detail: err.to_string(),
        })
    }

    async fn list_rules(&self) -> RulesResult<EncodedRulesBlob> {
        const OPERATION: &str = "list_rules";
        let builder = self.request(Method::GET, &self.rules_url);
        let response = send(OPERATION, builder, &self.rules_url).await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(EncodedRulesBlob::default());
        }
        if !status.is_success() {
            return Err(classify_failure(OPERATION, response).await);
        }

        let text = response
            .text()
            .await
            .map_err(|err| transport_error(OPERATION, &err))?;
        Ok(parse_rules_body(&text))
    }

    async fn upload_rules(&self, encoded: &EncodedRulesBlob) -> RulesResult<()> {
        const OPERATION: &str = "upload_rules";
        let builder = self
            .request(Method::POST, &self.rules_url)
            .header(CONTENT_TYPE, "text/plain")
            .body(encoded.as_str().to_owned());
        let response = send(OPERATION, builder, &self.rules_url).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(classify_failure(OPERATION, response).await)
        }
    }

    async fn delete_rules(&self) -> RulesResult<()> {
        const OPERATION: &str = "delete_rules";
        let builder = self.request(Method::DELETE, &self.rules_url);
        let response = send(OPERATION, builder, &self.rules_url).await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(classify_failure(OPERATION, response).await)
        }
    }
}

async fn send(
    operation: &'static str,
    builder: RequestBuilder,
    url: &Url,
) -> RulesResult<Response> {
    debug!(operation, url = %url, "sending rules request");
    let response = builder
        .send()
        .await
        .map_err(|err| transport_error(operation, &err))?;
    debug!(operation, status = response.status().as_u16(), "received response");
    Ok(response)
}

fn read_pem(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))
        .map_err(CliError::failure)
}

/// Servers answer either with the raw encoded text or with a JSON string literal.
fn parse_rules_body(text: &str) -> EncodedRulesBlob {
    let trimmed = text.trim();
    if trimmed.starts_with('"')
        && let Ok(inner) = serde_json::from_str::<String>(trimmed)
    {
        return EncodedRulesBlob::new(inner);
    }
    EncodedRulesBlob::new(trimmed)
}

fn transport_error(operation: &'static str, err: &reqwest::Error) -> RulesError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    RulesError::transport(operation, message)
}

/// Turn a non-success response into a [`RulesError::Server`].
async fn classify_failure(operation: &'static str, response: Response) -> RulesError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();

    let message = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|value| problem_message(&value))
        .unwrap_or(body_text);

    if message.is_empty() {
        RulesError::server(
            operation,
            status.as_u16(),
            format!("request failed with status {status}"),
        )
    } else {
        RulesError::server(operation, status.as_u16(), message)
    }
}

fn problem_message(value: &Value) -> Option<String> {
    ["displayMessage", "detail", "title", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}
