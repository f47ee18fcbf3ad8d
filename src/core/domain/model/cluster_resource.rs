//! Domain models for cluster-wide resources.
//!
//! `/cluster/resources?type=vm` lists every guest of the cluster with the
//! node it runs on. The lifecycle client uses it to locate clone templates by
//! name.

use serde::{Deserialize, Serialize};

/// One guest entry of `/cluster/resources`.
///
/// The `type` field distinguishes QEMU VMs from LXC containers; other
/// resource kinds are filtered out by the query.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterGuest {
    /// `qemu` or `lxc`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Unique resource identifier (e.g., `qemu/100`).
    pub id: String,
    pub node: String,
    pub vmid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `1` for templates.
    #[serde(default)]
    pub template: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl ClusterGuest {
    pub fn is_qemu(&self) -> bool {
        self.kind == "qemu"
    }

    pub fn is_template(&self) -> bool {
        self.template == 1
    }
}
