//! HTTP transport that handles authentication and automatic ticket refresh.

use crate::{
    auth::application::service::login_service::LoginService,
    core::{
        domain::{
            error::{ProxmoxError, ProxmoxResult, ValidationError},
            model::{
                client_config::ClientConfig, proxmox_auth::ProxmoxAuth,
                proxmox_connection::ProxmoxConnection, qemu_config::value_text,
            },
        },
        infrastructure::transport::ClusterTransport,
    },
};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use hyper::ext::ReasonPhrase;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// The default [`ClusterTransport`]: a `reqwest` client against
/// `{base}/api2/json`.
///
/// Each request carries the `PVEAuthCookie` and `CSRFPreventionToken`
/// headers. Without a valid ticket the client logs in first; a `401` triggers
/// one ticket refresh and one retry. Concurrent requests share one login.
#[derive(Clone)]
pub struct ApiClient {
    http_client: Client,
    connection: Arc<ProxmoxConnection>,
    auth: Arc<RwLock<Option<ProxmoxAuth>>>,
    login_lock: Arc<Mutex<()>>,
    config: Arc<ClientConfig>,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("url", &self.connection.url().as_str())
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a new `ApiClient`. The client starts unauthenticated.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Connection` if the HTTP client cannot be built,
    /// and `ProxmoxError::Validation` for a zero rate limit.
    pub fn new(connection: ProxmoxConnection, config: ClientConfig) -> ProxmoxResult<Self> {
        let http_client = Client::builder()
            .danger_accept_invalid_certs(connection.accept_invalid_certs())
            .build()
            .map_err(|e| ProxmoxError::Connection(e.to_string()))?;

        let rate_limiter = match config.rate_limit {
            Some(rl) => {
                let per_second = NonZeroU32::new(rl.requests_per_second).ok_or_else(|| {
                    ValidationError::field("requests_per_second", "must be greater than 0")
                })?;
                let burst = NonZeroU32::new(rl.burst_size)
                    .ok_or_else(|| ValidationError::field("burst_size", "must be greater than 0"))?;
                let quota = Quota::per_second(per_second).allow_burst(burst);
                Some(Arc::new(DefaultDirectRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            http_client,
            connection: Arc::new(connection),
            auth: Arc::new(RwLock::new(None)),
            login_lock: Arc::new(Mutex::new(())),
            config: Arc::new(config),
            rate_limiter,
        })
    }

    pub fn connection(&self) -> &ProxmoxConnection {
        &self.connection
    }

    /// Sets the authentication state (after a login or a restored session).
    pub async fn set_auth(&self, auth: ProxmoxAuth) {
        *self.auth.write().await = Some(auth);
    }

    pub async fn auth(&self) -> Option<ProxmoxAuth> {
        self.auth.read().await.clone()
    }

    /// Returns `true` if there is a non-expired ticket.
    pub async fn is_authenticated(&self) -> bool {
        self.auth
            .read()
            .await
            .as_ref()
            .is_some_and(|a| !a.ticket().is_expired(self.config.ticket_lifetime))
    }

    /// Performs a fresh login with the stored credentials.
    pub async fn login(&self) -> ProxmoxResult<()> {
        let auth = LoginService::new()
            .execute(&self.http_client, &self.connection)
            .await?;
        self.set_auth(auth).await;
        Ok(())
    }

    async fn ensure_authenticated(&self) -> ProxmoxResult<()> {
        if self.is_authenticated().await {
            return Ok(());
        }
        let _guard = self.login_lock.lock().await;
        if !self.is_authenticated().await {
            debug!(user = %self.connection.user_id(), "no valid ticket, logging in");
            self.login().await?;
        }
        Ok(())
    }

    async fn current_ticket(&self) -> Option<String> {
        self.auth
            .read()
            .await
            .as_ref()
            .map(|a| a.ticket().as_str().to_string())
    }

    /// Replaces a ticket the server rejected. A request that lost the race to
    /// another refresh reuses the newer ticket instead of logging in again.
    async fn refresh(&self, rejected: Option<&str>) -> ProxmoxResult<()> {
        let _guard = self.login_lock.lock().await;
        if self.current_ticket().await.as_deref() == rejected {
            self.login().await?;
        }
        Ok(())
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&Value>,
        body: Option<&Value>,
    ) -> ProxmoxResult<Vec<u8>> {
        self.ensure_authenticated().await?;

        let used = self.current_ticket().await;
        let mut response = self.send(method.clone(), path, query, body).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(%method, path, "ticket rejected, refreshing once");
            self.refresh(used.as_deref()).await?;
            response = self.send(method, path, query, body).await?;
        }

        read_body(path, response).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&Value>,
        body: Option<&Value>,
    ) -> ProxmoxResult<Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let mut url = self.connection.url().api_url(path)?;
        if let Some(Value::Object(params)) = query {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                if let Some(text) = value_text(value) {
                    pairs.append_pair(key, &text);
                }
            }
        }

        debug!(%method, %url, "sending request");
        let mut request = self.http_client.request(method, url);
        if let Some(auth) = self.auth.read().await.as_ref() {
            request = request.header("Cookie", auth.ticket().as_cookie_header());
            if let Some(csrf) = auth.csrf_token() {
                request = request.header("CSRFPreventionToken", csrf.as_str());
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| ProxmoxError::Connection(format!("HTTP request failed: {}", e)))
    }
}

/// Maps the response status onto the error taxonomy and returns the body.
///
/// Proxmox reports a missing VM as `500` with the reason phrase
/// `Configuration file '...' does not exist` and a `{"data":null}` body, so
/// the reason phrase is read before the body is consumed.
async fn read_body(path: &str, response: Response) -> ProxmoxResult<Vec<u8>> {
    let status = response.status();
    if status.is_success() {
        return response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| ProxmoxError::Connection(format!("Failed to read response: {}", e)));
    }

    let reason = response
        .extensions()
        .get::<ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned());
    let text = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND
        || reason.as_deref().is_some_and(is_missing_config)
        || is_missing_config(&text)
    {
        return Err(ProxmoxError::NotFound(path.to_string()));
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ProxmoxError::Authentication(format!(
            "ticket rejected after refresh for {}",
            path
        )));
    }

    let message = match (reason, text.trim()) {
        (Some(reason), "" | r#"{"data":null}"#) => reason,
        (None, "") => status.canonical_reason().unwrap_or("unknown").to_string(),
        (_, body) => body.to_string(),
    };
    Err(ProxmoxError::Api {
        status: status.as_u16(),
        message,
    })
}

/// The hypervisor's message for a VM whose config file is gone. Other
/// "does not exist" errors (a storage, a bridge) are plain API errors.
fn is_missing_config(message: &str) -> bool {
    message.contains("Configuration file") && message.contains("does not exist")
}

#[async_trait]
impl ClusterTransport for ApiClient {
    async fn get(&self, path: &str, query: &Value) -> ProxmoxResult<Vec<u8>> {
        self.execute(Method::GET, path, Some(query), None).await
    }

    async fn post(&self, path: &str, body: &Value) -> ProxmoxResult<Vec<u8>> {
        self.execute(Method::POST, path, None, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> ProxmoxResult<Vec<u8>> {
        self.execute(Method::PUT, path, None, Some(body)).await
    }

    async fn delete(&self, path: &str) -> ProxmoxResult<Vec<u8>> {
        self.execute(Method::DELETE, path, None, None).await
    }
}
