//! Addressing of the Proxmox API: host, port and the derived base URL.

use crate::core::domain::error::ValidationError;
use url::Url;

const MAX_HOSTNAME_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;

/// A validated Proxmox host (DNS name or IP address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxHost(String);

impl ProxmoxHost {
    /// Creates a new host without validation.
    pub(crate) fn new_unchecked(host: String) -> Self {
        Self(host)
    }

    /// Returns the host as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validates a hostname label by label, or accepts a literal IP address.
pub(crate) fn validate_host(host: &str) -> Result<(), ValidationError> {
    if host.is_empty() {
        return Err(ValidationError::field("host", "Host cannot be empty"));
    }
    if host.parse::<std::net::IpAddr>().is_ok() {
        return Ok(());
    }
    if host.len() > MAX_HOSTNAME_LENGTH {
        return Err(ValidationError::ConstraintViolation(format!(
            "Host length exceeds maximum of {} characters",
            MAX_HOSTNAME_LENGTH
        )));
    }
    for label in host.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(ValidationError::Format(format!(
                "Label must be between 1 and {} characters",
                MAX_LABEL_LENGTH
            )));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ValidationError::Format(
                "Label can only contain alphanumeric characters and hyphens".to_string(),
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(ValidationError::Format(
                "Label cannot start or end with hyphen".to_string(),
            ));
        }
    }
    Ok(())
}

/// A validated Proxmox port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxmoxPort(u16);

impl ProxmoxPort {
    pub(crate) fn new_unchecked(port: u16) -> Self {
        Self(port)
    }

    /// Returns the port number.
    pub fn get(&self) -> u16 {
        self.0
    }
}

pub(crate) fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError::field("port", "Port cannot be 0"));
    }
    Ok(())
}

/// The base URL of a Proxmox API endpoint, e.g. `https://pve.example.com:8006/`.
///
/// API paths are joined below `/api2/json` by [`ProxmoxUrl::api_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxUrl(Url);

impl ProxmoxUrl {
    /// Builds the base URL from a validated host and port. IPv6 literals are
    /// bracketed.
    pub(crate) fn from_parts(
        host: &ProxmoxHost,
        port: ProxmoxPort,
        secure: bool,
    ) -> Result<Self, ValidationError> {
        let scheme = if secure { "https" } else { "http" };
        let host = host.as_str();
        if host.contains(':') && !host.starts_with('[') {
            Self::parse(&format!("{}://[{}]:{}/", scheme, host, port.get()))
        } else {
            Self::parse(&format!("{}://{}:{}/", scheme, host, port.get()))
        }
    }

    /// Parses an already-formatted base URL (used by tests pointing at mock servers).
    pub(crate) fn parse(value: &str) -> Result<Self, ValidationError> {
        let url = Url::parse(value)
            .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(ValidationError::ConstraintViolation(format!(
                "Invalid scheme '{}'. Must be one of: https, http",
                other
            ))),
        }
    }

    /// Returns the base URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Resolves an API path such as `/nodes/pve1/qemu` to
    /// `{base}/api2/json/nodes/pve1/qemu`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, ValidationError> {
        let full = format!(
            "{}/api2/json/{}",
            self.0.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&full).map_err(|e| ValidationError::Format(format!("Invalid API path: {}", e)))
    }
}
