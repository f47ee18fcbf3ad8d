use serde::{Deserialize, Serialize};

/// Runtime state of a VM from `/nodes/{node}/qemu/{vmid}/status/current`.
///
/// A point-in-time read; never cached or mutated by the client.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct QemuStatusSnapshot {
    /// Current VM status (`running` or `stopped`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// QEMU monitor status (e.g. `running`, `paused`, `prelaunch`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qmpstatus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// CPU usage (0.0 to `cpus`).
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub cpus: u32,
    /// Memory ceiling in bytes.
    #[serde(default)]
    pub maxmem: u64,
    /// Memory in use, in bytes.
    #[serde(default)]
    pub mem: u64,
    /// Lowest balloon target in bytes.
    #[serde(default)]
    pub balloon_min: u64,
    /// Boot disk size in bytes.
    #[serde(default)]
    pub maxdisk: u64,
    #[serde(default)]
    pub disk: u64,
    #[serde(default)]
    pub diskread: u64,
    #[serde(default)]
    pub diskwrite: u64,
    #[serde(default)]
    pub netin: u64,
    #[serde(default)]
    pub netout: u64,
    /// Uptime in seconds.
    #[serde(default)]
    pub uptime: u64,
    /// CPU shares for the fair scheduler.
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub ha: HaState,
}

impl QemuStatusSnapshot {
    /// Whether the VM is managed by the HA stack.
    pub fn is_ha_managed(&self) -> bool {
        self.ha.managed > 0
    }
}

/// High-availability state of a VM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HaState {
    #[serde(default)]
    pub managed: u8,
}
