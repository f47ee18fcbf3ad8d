//! Login credentials: username, password and authentication realm.

use crate::core::domain::error::ValidationError;
use zxcvbn::zxcvbn;

const RESERVED_USERNAMES: [&str; 6] = [
    "root",
    "admin",
    "administrator",
    "nobody",
    "guest",
    "www-data",
];

/// A validated Proxmox username (without the `@realm` suffix).
#[derive(Debug, Clone)]
pub struct ProxmoxUsername(String);

impl ProxmoxUsername {
    pub(crate) fn new_unchecked(username: String) -> Self {
        Self(username)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validates a username; `block_reserved` rejects well-known system accounts.
pub(crate) fn validate_username(
    username: &str,
    block_reserved: bool,
) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::field("username", "Username cannot be empty"));
    }
    if username.len() < 3 || username.len() > 64 {
        return Err(ValidationError::Format(format!(
            "Username length must be between 3 and 64 characters (got {})",
            username.len()
        )));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@');
    if !username.chars().all(allowed) {
        return Err(ValidationError::Format(
            "Username contains invalid characters. Allowed: alphanumeric, -, _, ., @".to_string(),
        ));
    }
    if block_reserved && RESERVED_USERNAMES.contains(&username) {
        return Err(ValidationError::ConstraintViolation(
            "Username is reserved".to_string(),
        ));
    }
    Ok(())
}

/// A Proxmox password. Only kept in memory to renew tickets.
#[derive(Clone)]
pub struct ProxmoxPassword(String);

impl ProxmoxPassword {
    pub(crate) fn new_unchecked(password: String) -> Self {
        Self(password)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ProxmoxPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProxmoxPassword(***)")
    }
}

/// Validates a password. With `min_score` set, the zxcvbn strength estimate
/// must reach it.
pub(crate) fn validate_password(
    password: &str,
    min_score: Option<zxcvbn::Score>,
) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::field("password", "Password cannot be empty"));
    }
    if password.len() > 128 {
        return Err(ValidationError::Format(
            "Password cannot exceed 128 characters".to_string(),
        ));
    }
    if let Some(min_score) = min_score {
        if zxcvbn(password, &[]).score() < min_score {
            return Err(ValidationError::ConstraintViolation(
                "Password is too weak (increase complexity)".to_string(),
            ));
        }
    }
    Ok(())
}

/// An authentication realm such as `pam`, `pve` or an LDAP/AD realm id.
#[derive(Debug, Clone)]
pub struct ProxmoxRealm(String);

impl ProxmoxRealm {
    pub(crate) fn new_unchecked(realm: String) -> Self {
        Self(realm)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Realm ids are 2-32 characters: lowercase letters, digits, `-` and `_`,
/// starting with a letter.
pub(crate) fn validate_realm(realm: &str) -> Result<(), ValidationError> {
    if realm.is_empty() {
        return Err(ValidationError::field("realm", "Realm cannot be empty"));
    }
    if realm.len() < 2 || realm.len() > 32 {
        return Err(ValidationError::Format(
            "Realm length must be between 2 and 32 characters".to_string(),
        ));
    }
    let valid = realm.starts_with(|c: char| c.is_ascii_lowercase())
        && realm
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !valid {
        return Err(ValidationError::Format(
            "Realm contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
