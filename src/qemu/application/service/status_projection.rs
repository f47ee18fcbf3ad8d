//! Maps what the hypervisor reports back onto the status taxonomy.
//!
//! Both functions are pure: the same inputs always give the same answer, and
//! nothing here touches the network.

use crate::core::domain::model::{
    qemu_config::QemuConfig,
    qemu_operation::Observation,
    qemu_spec::QemuSpec,
    sync_status::{PowerState, Projection, QemuSyncStatus},
};
use std::collections::BTreeSet;
use tracing::debug;

/// Derives sync status and power state for one VM.
///
/// `last` is the status recorded by the previous reconcile. It decides how a
/// missing VM is read: while provisioning it is expected, afterwards it is
/// unknown.
pub fn project(desired: &QemuSpec, observation: &Observation, last: QemuSyncStatus) -> Projection {
    let power = match &observation.status {
        Ok(snapshot) => PowerState::from_runtime(snapshot.status.as_deref()),
        Err(_) => PowerState::Unknown,
    };
    let status = sync_status(desired, observation, last);
    debug!(vmid = desired.vmid, last = %last, status = %status, power = %power, "projected qemu vm status");
    Projection { status, power }
}

fn sync_status(desired: &QemuSpec, observation: &Observation, last: QemuSyncStatus) -> QemuSyncStatus {
    if last == QemuSyncStatus::Deleting {
        return last;
    }

    let applied = match &observation.config {
        Ok(config) => config,
        Err(e) if e.is_not_found() && (last.is_provisioning() || last == QemuSyncStatus::Empty) => {
            return last;
        }
        Err(_) => return QemuSyncStatus::Unknown,
    };

    if desired.vmid > 0 && applied.vmid().is_some_and(|vmid| vmid != desired.vmid) {
        return QemuSyncStatus::Unknown;
    }
    if applied.lock().as_deref() == Some("clone") {
        return QemuSyncStatus::Cloning;
    }

    let pending = match &observation.pending {
        Ok(pending) => pending,
        Err(_) => return QemuSyncStatus::Unknown,
    };
    if observation.status.is_err() {
        return QemuSyncStatus::Unknown;
    }
    if !pending.is_empty() {
        return QemuSyncStatus::OutOfSync;
    }

    let diff = mismatches(desired, applied);
    if diff.is_empty() {
        QemuSyncStatus::Synced
    } else {
        debug!(vmid = desired.vmid, keys = ?diff, "applied config differs");
        QemuSyncStatus::OutOfSync
    }
}

/// Native keys whose applied value differs from what `desired` asks for.
///
/// Only fields the spec sets are compared: a zero CPU count or memory size,
/// an empty CPU type and an empty tag list leave the hypervisor's value
/// alone. Disk sizes compare by byte count; NIC MACs case-insensitively.
pub fn mismatches(desired: &QemuSpec, applied: &QemuConfig) -> Vec<String> {
    let mut keys = Vec::new();

    if desired.cpu.cores > 0 && applied.cores().unwrap_or(1) != u64::from(desired.cpu.cores) {
        keys.push("cores".to_string());
    }
    if desired.cpu.sockets > 0 && applied.sockets().unwrap_or(1) != u64::from(desired.cpu.sockets) {
        keys.push("sockets".to_string());
    }
    if !desired.cpu.cpu_type.is_empty()
        && applied.cpu_type().as_deref() != Some(desired.cpu.cpu_type.as_str())
    {
        keys.push("cpu".to_string());
    }
    if desired.memory.size > 0 {
        if applied.memory() != Some(desired.memory.size) {
            keys.push("memory".to_string());
        }
        if applied.balloon().unwrap_or(0) != desired.memory.balloon {
            keys.push("balloon".to_string());
        }
    }
    if applied.onboot() != desired.autostart {
        keys.push("onboot".to_string());
    }

    let applied_disks = applied.disks();
    for (slot, disk) in &desired.disk {
        let matches = applied_disks.get(slot).is_some_and(|current| {
            (disk.storage.is_empty() || current.storage == disk.storage)
                && disk.size_bytes().is_some()
                && current.size_bytes() == disk.size_bytes()
        });
        if !matches {
            keys.push(slot.clone());
        }
    }

    let applied_nics = applied.networks();
    for (slot, nic) in &desired.network {
        let matches = applied_nics.get(slot).is_some_and(|current| {
            current.model == nic.effective_model()
                && (nic.bridge.is_empty() || current.bridge.as_deref() == Some(nic.bridge.as_str()))
                && current.tag.unwrap_or(0) == nic.tag
                && (nic.mac.is_empty()
                    || current
                        .mac
                        .as_deref()
                        .is_some_and(|mac| mac.eq_ignore_ascii_case(&nic.mac)))
        });
        if !matches {
            keys.push(slot.clone());
        }
    }

    if !desired.tags.is_empty() {
        let wanted: BTreeSet<String> = desired.tags.iter().cloned().collect();
        if applied.tags() != wanted {
            keys.push("tags".to_string());
        }
    }

    keys
}
