//! VM lifecycle reconciliation client for Proxmox VE.
//!
//! [`QemuService`] issues the imperative calls (create, clone, configure,
//! power, resize, delete) that move a VM towards a declarative [`QemuSpec`];
//! [`project`] maps what the hypervisor reports back onto the small
//! [`QemuSyncStatus`] taxonomy a reconciler stores in its custom resource.

mod auth;
mod cluster;
mod core;
mod qemu;

#[cfg(test)]
mod tests;

pub use crate::{
    cluster::application::service::cluster_service::ClusterService,
    core::{
        domain::{
            error::{ProxmoxError, ProxmoxResult, ValidationError},
            model::{
                client_config::{ClientConfig, RateLimitConfig},
                cluster_resource::ClusterGuest,
                placement::Placement,
                proxmox_auth::ProxmoxAuth,
                proxmox_connection::ProxmoxConnection,
                qemu_config::{DiskSlot, NetworkSlot, QemuConfig, QemuPendingConfig, parse_size},
                qemu_operation::{CloneOperation, Observation},
                qemu_spec::{QemuCpu, QemuDisk, QemuMemory, QemuNetwork, QemuSpec},
                qemu_status::{HaState, QemuStatusSnapshot},
                sync_status::{
                    PowerState, Projection, QemuResourceStatus, QemuStatusNetwork, QemuSyncStatus,
                },
            },
            value_object::{
                ProxmoxCSRFToken, ProxmoxHost, ProxmoxPassword, ProxmoxPort, ProxmoxRealm,
                ProxmoxTicket, ProxmoxUrl, ProxmoxUsername,
            },
        },
        infrastructure::{api_client::ApiClient, transport::ClusterTransport},
    },
    qemu::application::service::{
        qemu_service::QemuService,
        status_projection::{mismatches, project},
    },
};
pub use zxcvbn::Score as PasswordScore;

use crate::core::domain::value_object::{
    validate_host, validate_password, validate_port, validate_realm, validate_username,
};
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_PORT: u16 = 8006;
const DEFAULT_CLUSTER: &str = "default";

/// A client for one Proxmox VE cluster.
///
/// Holds the authenticated HTTP transport and hands out node-scoped
/// [`QemuService`] handles. Cloning the client shares the session.
///
/// # Examples
///
/// ```no_run
/// use proxmox_qemu::{ProxmoxClient, ProxmoxResult};
///
/// #[tokio::main]
/// async fn main() -> ProxmoxResult<()> {
///     let client = ProxmoxClient::builder()
///         .host("proxmox.example.com")
///         .credentials("operator", "password", "pve")
///         .cluster("prod")
///         .build()?;
///
///     client.login().await?;
///     let status = client.qemu("pve1").status(100).await?;
///     println!("{:?}", status.status);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ProxmoxClient {
    api_client: ApiClient,
    cluster: String,
}

/// Builder for ProxmoxClient configuration
#[derive(Debug)]
pub struct ProxmoxClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    realm: Option<String>,
    cluster: Option<String>,
    secure: bool,
    accept_invalid_certs: bool,
    config: ClientConfig,
}

impl Default for ProxmoxClientBuilder {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            username: None,
            password: None,
            realm: None,
            cluster: None,
            secure: true,
            accept_invalid_certs: false,
            config: ClientConfig::default(),
        }
    }
}

impl ProxmoxClientBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self.realm = Some(realm.into());
        self
    }

    /// Name reported in placements and log lines.
    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// `true` (the default) talks HTTPS.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Accepts self-signed certificates, as shipped by a fresh Proxmox install.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn ticket_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.ticket_lifetime = lifetime;
        self
    }

    pub fn rate_limit(mut self, requests_per_second: u32, burst_size: u32) -> Self {
        self.config.rate_limit = Some(RateLimitConfig {
            requests_per_second,
            burst_size,
        });
        self
    }

    /// Rejects passwords whose zxcvbn score is below `min_score`.
    pub fn enable_password_strength(mut self, min_score: PasswordScore) -> Self {
        self.config.password_min_score = Some(min_score);
        self
    }

    pub fn block_reserved_usernames(mut self, block: bool) -> Self {
        self.config.block_reserved_usernames = block;
        self
    }

    /// Starts a builder from `PROXMOX_HOST`, `PROXMOX_PORT`,
    /// `PROXMOX_USERNAME`, `PROXMOX_PASSWORD`, `PROXMOX_REALM`,
    /// `PROXMOX_CLUSTER` and `PROXMOX_INSECURE`. Host, username, password
    /// and realm are required.
    pub fn from_env() -> ProxmoxResult<Self> {
        let mut builder = Self::default()
            .host(required_env("PROXMOX_HOST")?)
            .credentials(
                required_env("PROXMOX_USERNAME")?,
                required_env("PROXMOX_PASSWORD")?,
                required_env("PROXMOX_REALM")?,
            );
        if let Ok(port) = env::var("PROXMOX_PORT") {
            let port = port.parse().map_err(|_| {
                ValidationError::Format(format!("PROXMOX_PORT is not a port number: {}", port))
            })?;
            builder = builder.port(port);
        }
        if let Ok(cluster) = env::var("PROXMOX_CLUSTER") {
            builder = builder.cluster(cluster);
        }
        if env::var("PROXMOX_INSECURE").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
            builder = builder.accept_invalid_certs(true);
        }
        Ok(builder)
    }

    /// Validates every setting and builds the client. Nothing is sent until
    /// the first request or an explicit [`ProxmoxClient::login`].
    pub fn build(self) -> ProxmoxResult<ProxmoxClient> {
        let host = self
            .host
            .ok_or_else(|| ValidationError::field("host", "Host is required"))?;
        validate_host(&host)?;
        let port = self.port.unwrap_or(DEFAULT_PORT);
        validate_port(port)?;

        let username = self
            .username
            .ok_or_else(|| ValidationError::field("username", "Username is required"))?;
        validate_username(&username, self.config.block_reserved_usernames)?;
        let password = self
            .password
            .ok_or_else(|| ValidationError::field("password", "Password is required"))?;
        validate_password(&password, self.config.password_min_score)?;
        let realm = self
            .realm
            .ok_or_else(|| ValidationError::field("realm", "Realm is required"))?;
        validate_realm(&realm)?;

        let host = ProxmoxHost::new_unchecked(host);
        let port = ProxmoxPort::new_unchecked(port);
        let url = ProxmoxUrl::from_parts(&host, port, self.secure)?;
        let connection = ProxmoxConnection::new(
            host,
            port,
            ProxmoxUsername::new_unchecked(username),
            ProxmoxPassword::new_unchecked(password),
            ProxmoxRealm::new_unchecked(realm),
            self.accept_invalid_certs,
            url,
        );

        Ok(ProxmoxClient {
            api_client: ApiClient::new(connection, self.config)?,
            cluster: self.cluster.unwrap_or_else(|| DEFAULT_CLUSTER.to_string()),
        })
    }
}

fn required_env(name: &str) -> ProxmoxResult<String> {
    env::var(name).map_err(|_| ValidationError::field(name, format!("{} is not set", name)).into())
}

impl ProxmoxClient {
    /// Creates a new builder for ProxmoxClient configuration
    pub fn builder() -> ProxmoxClientBuilder {
        ProxmoxClientBuilder::default()
    }

    /// Authenticates with the Proxmox server.
    ///
    /// Optional: requests log in on their own when no valid ticket exists.
    ///
    /// # Errors
    ///
    /// `ProxmoxError::Authentication` for rejected credentials,
    /// `ProxmoxError::Connection` when the server is unreachable.
    pub async fn login(&self) -> ProxmoxResult<()> {
        self.api_client.login().await?;
        info!(cluster = %self.cluster, user = %self.api_client.connection().user_id(), "authenticated");
        Ok(())
    }

    /// Returns true if the client holds a ticket that has not expired yet
    pub async fn is_authenticated(&self) -> bool {
        self.api_client.is_authenticated().await
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// The placement of `vmid` on `node` in this cluster.
    pub fn placement(&self, node: impl Into<String>, vmid: u32) -> Placement {
        Placement::new(self.cluster.as_str(), node, vmid)
    }

    /// Lifecycle calls against VMs on `node`.
    pub fn qemu<'a>(&'a self, node: &'a str) -> QemuService<'a, ApiClient> {
        QemuService::new(&self.api_client, &self.cluster, node)
    }

    /// Cluster-wide lookups (clone templates, free VM ids).
    pub fn resources(&self) -> ClusterService<'_, ApiClient> {
        ClusterService::new(&self.api_client, &self.cluster)
    }

    /// The underlying transport, for callers that drive their own requests.
    pub fn transport(&self) -> &ApiClient {
        &self.api_client
    }
}
