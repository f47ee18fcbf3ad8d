//! Client-side settings that do not identify the cluster itself.

use std::time::Duration;

/// Proxmox tickets are valid for two hours; renew a little earlier.
const DEFAULT_TICKET_LIFETIME: Duration = Duration::from_secs(110 * 60);

/// Token-bucket throttling applied by the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 20,
        }
    }
}

/// Settings for credential validation, session renewal and throttling.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Minimum zxcvbn score a password must reach; `None` disables the check.
    pub password_min_score: Option<zxcvbn::Score>,
    /// Reject well-known system account names at build time.
    pub block_reserved_usernames: bool,
    /// Age after which a ticket is renewed before the next request.
    pub ticket_lifetime: Duration,
    /// `None` disables throttling.
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            password_min_score: None,
            block_reserved_usernames: false,
            ticket_lifetime: DEFAULT_TICKET_LIFETIME,
            rate_limit: None,
        }
    }
}
