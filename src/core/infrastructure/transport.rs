//! The seam between lifecycle logic and the HTTP stack.

use crate::core::domain::error::ProxmoxResult;
use async_trait::async_trait;
use serde_json::Value;

/// Authenticated access to a cluster's JSON API.
///
/// Paths are API paths such as `/nodes/pve1/qemu/100/config`; bodies and
/// queries are flat JSON objects. Implementations return the raw response
/// body so decoding errors stay distinguishable from transport errors.
///
/// GET is safe to repeat; POST, PUT and DELETE are not.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    async fn get(&self, path: &str, query: &Value) -> ProxmoxResult<Vec<u8>>;

    async fn post(&self, path: &str, body: &Value) -> ProxmoxResult<Vec<u8>>;

    async fn put(&self, path: &str, body: &Value) -> ProxmoxResult<Vec<u8>>;

    async fn delete(&self, path: &str) -> ProxmoxResult<Vec<u8>>;
}
