use thiserror::Error;

/// The main error type for Proxmox QEMU operations.
///
/// Every failure surfaced by the lifecycle client ends up here. Transport and
/// decoding failures raised while serving a lifecycle call are wrapped in
/// [`ProxmoxError::Qemu`] so the caller can log which operation and which VM
/// failed; use [`ProxmoxError::is_not_found`] and
/// [`ProxmoxError::is_validation`] to classify through that wrapper.
#[derive(Error, Debug)]
pub enum ProxmoxError {
    /// Network failures or an HTTP client that could not be constructed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Login was rejected or the ticket could not be refreshed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The hypervisor answered with a non-success HTTP status.
    ///
    /// # Fields
    /// * `status` - The HTTP status code
    /// * `message` - Reason phrase and body returned by the hypervisor
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The addressed resource does not exist on the hypervisor.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A response body did not match the expected schema.
    #[error("Failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A local precondition failed; nothing was sent over the wire.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Context added by the lifecycle client around a failed call.
    ///
    /// # Fields
    /// * `operation` - The lifecycle operation (e.g. `clone`, `resize`)
    /// * `target` - The addressed VM as `cluster/node/vmid`
    /// * `source` - The underlying failure
    #[error("{operation} failed for {target}: {source}")]
    Qemu {
        operation: &'static str,
        target: String,
        #[source]
        source: Box<ProxmoxError>,
    },
}

impl ProxmoxError {
    /// Strips any [`ProxmoxError::Qemu`] context and returns the underlying cause.
    pub fn root(&self) -> &ProxmoxError {
        let mut current = self;
        while let ProxmoxError::Qemu { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns `true` if the hypervisor reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), ProxmoxError::NotFound(_))
    }

    /// Returns `true` for local validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), ProxmoxError::Validation(_))
    }

    pub(crate) fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        ProxmoxError::Decode {
            context: context.into(),
            source,
        }
    }
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A specific field is missing or invalid
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Format/syntax violations
    #[error("Format error: {0}")]
    Format(String),

    /// Violations of domain constraints
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

impl ValidationError {
    pub(crate) fn field(field: &str, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Type alias for Results that may fail with a ProxmoxError
pub type ProxmoxResult<T> = Result<T, ProxmoxError>;
