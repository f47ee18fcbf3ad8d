//! Results of lifecycle calls that outlive the call itself.

use crate::core::domain::{
    error::ProxmoxResult,
    model::{
        placement::Placement,
        qemu_config::{QemuConfig, QemuPendingConfig},
        qemu_status::QemuStatusSnapshot,
    },
};

/// A clone job the hypervisor accepted.
///
/// The target is `CLONING` until its config can be fetched without a clone
/// lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOperation {
    pub source: Placement,
    pub target: Placement,
    /// Task id (`UPID:...`) when the hypervisor returned one.
    pub upid: Option<String>,
}

/// One round of reads for a single VM. Every fetch keeps its own outcome so
/// the projection can tell a missing VM from an unreachable one.
#[derive(Debug)]
pub struct Observation {
    pub config: ProxmoxResult<QemuConfig>,
    pub pending: ProxmoxResult<Vec<QemuPendingConfig>>,
    pub status: ProxmoxResult<QemuStatusSnapshot>,
}
