mod credentials;
mod endpoint;
mod session;

pub use credentials::{ProxmoxPassword, ProxmoxRealm, ProxmoxUsername};
pub use endpoint::{ProxmoxHost, ProxmoxPort, ProxmoxUrl};
pub use session::{ProxmoxCSRFToken, ProxmoxTicket};

// Re-export validation functions for internal use
pub(crate) use credentials::{validate_password, validate_realm, validate_username};
pub(crate) use endpoint::{validate_host, validate_port};
pub(crate) use session::{validate_csrf_token, validate_ticket};
