use crate::{
    auth::application::{
        request::login_request::LoginRequest, response::login_response::LoginResponse,
    },
    core::domain::{
        error::{ProxmoxError, ProxmoxResult, ValidationError},
        model::{proxmox_auth::ProxmoxAuth, proxmox_connection::ProxmoxConnection},
        value_object::{ProxmoxCSRFToken, ProxmoxTicket, validate_csrf_token, validate_ticket},
    },
};

use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use tracing::{debug, info, warn};

/// Exchanges the stored credentials for a ticket at `/access/ticket`.
pub struct LoginService {
    default_headers: HeaderMap,
}

impl LoginService {
    pub fn new() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self { default_headers }
    }

    pub async fn execute(
        &self,
        http_client: &Client,
        connection: &ProxmoxConnection,
    ) -> ProxmoxResult<ProxmoxAuth> {
        let url = connection.url().api_url("/access/ticket")?;
        let request = LoginRequest {
            username: connection.username().as_str(),
            password: connection.password().as_str(),
            realm: connection.realm().as_str(),
        };

        debug!(user = %connection.user_id(), "requesting ticket");
        let response = http_client
            .post(url)
            .headers(self.default_headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProxmoxError::Connection(e.to_string()))?;

        match response.status() {
            StatusCode::OK => self.handle_successful_login(response).await,
            StatusCode::UNAUTHORIZED => {
                warn!(user = %connection.user_id(), "login rejected");
                Err(ProxmoxError::Authentication(
                    "Invalid credentials provided".to_string(),
                ))
            }
            StatusCode::BAD_REQUEST => Err(ValidationError::field(
                "request",
                "Invalid request format",
            )
            .into()),
            StatusCode::NOT_FOUND => Err(ProxmoxError::Connection(
                "Login endpoint not found".to_string(),
            )),
            StatusCode::SERVICE_UNAVAILABLE => Err(ProxmoxError::Connection(
                "Proxmox service is currently unavailable".to_string(),
            )),
            status => Err(ProxmoxError::Connection(format!(
                "Unexpected response status: {}",
                status
            ))),
        }
    }

    async fn handle_successful_login(
        &self,
        response: reqwest::Response,
    ) -> ProxmoxResult<ProxmoxAuth> {
        let login_response = response.json::<LoginResponse>().await.map_err(|e| {
            ProxmoxError::Authentication(format!("Failed to parse login response: {}", e))
        })?;
        let data = login_response.data;

        validate_ticket(&data.ticket)?;
        let csrf_token = match data.csrf_token {
            Some(token) => {
                validate_csrf_token(&token)?;
                Some(ProxmoxCSRFToken::new_unchecked(token))
            }
            None => None,
        };

        info!(user = data.username.as_deref().unwrap_or_default(), "logged in");
        Ok(ProxmoxAuth::new(
            ProxmoxTicket::new_unchecked(data.ticket),
            csrf_token,
        ))
    }
}

impl Default for LoginService {
    fn default() -> Self {
        Self::new()
    }
}
