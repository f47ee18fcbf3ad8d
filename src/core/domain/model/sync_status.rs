//! The status taxonomy reported back into the custom resource.

use crate::core::domain::model::{placement::Placement, qemu_config::QemuConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reconciliation state of one VM.
///
/// Serialised with the strings the custom resource's status block uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum QemuSyncStatus {
    /// No status has been recorded yet.
    #[default]
    #[serde(rename = "")]
    Empty,
    /// Create or clone requested, not confirmed yet.
    #[serde(rename = "PENDING")]
    Pending,
    /// Clone in flight on the hypervisor.
    #[serde(rename = "CLONING")]
    Cloning,
    /// Applied config matches the spec and nothing is pending.
    #[serde(rename = "SYNCED")]
    Synced,
    /// Applied config diverges from the spec or changes are pending.
    #[serde(rename = "OUT OF SYNC")]
    OutOfSync,
    #[serde(rename = "DELETING")]
    Deleting,
    /// Retrieval failed or the hypervisor returned inconsistent data.
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl QemuSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QemuSyncStatus::Empty => "",
            QemuSyncStatus::Pending => "PENDING",
            QemuSyncStatus::Cloning => "CLONING",
            QemuSyncStatus::Synced => "SYNCED",
            QemuSyncStatus::OutOfSync => "OUT OF SYNC",
            QemuSyncStatus::Deleting => "DELETING",
            QemuSyncStatus::Unknown => "UNKNOWN",
        }
    }

    /// `true` while the VM is being provisioned and may not exist yet.
    pub fn is_provisioning(&self) -> bool {
        matches!(self, QemuSyncStatus::Pending | QemuSyncStatus::Cloning)
    }
}

impl fmt::Display for QemuSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Power state, reported independently of the sync status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
    #[default]
    Unknown,
}

impl PowerState {
    /// Maps the hypervisor's runtime `status` field.
    pub fn from_runtime(status: Option<&str>) -> Self {
        match status {
            Some("running") => PowerState::On,
            Some("stopped") => PowerState::Off,
            _ => PowerState::Unknown,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::On => "ON",
            PowerState::Off => "OFF",
            PowerState::Unknown => "UNKNOWN",
        })
    }
}

/// The outcome of one status projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub status: QemuSyncStatus,
    pub power: PowerState,
}

/// The custom resource's `status` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QemuResourceStatus {
    pub status: QemuSyncStatus,
    pub power: PowerState,
    pub cluster: String,
    pub node: String,
    pub vmid: u32,
    #[serde(default)]
    pub net: Vec<QemuStatusNetwork>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QemuStatusNetwork {
    pub name: String,
    pub mac: String,
}

impl QemuResourceStatus {
    /// Builds the status block. NIC MAC addresses come from the applied
    /// config when one was fetched.
    pub fn new(projection: Projection, placement: &Placement, applied: Option<&QemuConfig>) -> Self {
        let net = applied
            .map(|config| {
                config
                    .networks()
                    .into_iter()
                    .filter_map(|(name, nic)| nic.mac.map(|mac| QemuStatusNetwork { name, mac }))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            status: projection.status,
            power: projection.power,
            cluster: placement.cluster.clone(),
            node: placement.node.clone(),
            vmid: placement.vmid,
            net,
        }
    }
}
