//! The desired state of a VM, as written by the user in the custom resource.
//!
//! Field names follow the custom resource's JSON (`anti-affinity`, `vmid`,
//! ...). This crate only reads the spec; rendering turns it into the
//! hypervisor-native document submitted on create and update.

use crate::core::domain::{
    error::ValidationError,
    model::qemu_config::{QemuConfig, parse_size},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const GIB: u64 = 1 << 30;
const DEFAULT_NIC_MODEL: &str = "virtio";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QemuSpec {
    /// Keep the VM running and start it with its node (`onboot`).
    pub autostart: bool,
    /// Stop the VM before it is deleted.
    pub autostop: bool,
    pub cluster: String,
    pub node: String,
    pub pool: String,
    /// Name of the template to clone from; empty means create from scratch.
    pub clone: String,
    #[serde(rename = "anti-affinity")]
    pub anti_affinity: String,
    pub vmid: u32,
    pub cpu: QemuCpu,
    pub memory: QemuMemory,
    pub disk: BTreeMap<String, QemuDisk>,
    pub network: BTreeMap<String, QemuNetwork>,
    pub options: BTreeMap<String, Value>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QemuCpu {
    pub cores: u32,
    pub sockets: u32,
    #[serde(rename = "type")]
    pub cpu_type: String,
}

/// Sizes in MiB.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QemuMemory {
    pub size: u64,
    pub balloon: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QemuDisk {
    /// Size with unit suffix, e.g. `32G`.
    pub size: String,
    /// Storage backend id, e.g. `local-lvm`.
    pub storage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QemuNetwork {
    pub bridge: String,
    pub mac: String,
    pub model: String,
    /// VLAN tag; `0` means untagged.
    pub tag: u16,
}

impl QemuNetwork {
    /// Renders the `netN` value, e.g. `virtio=BC:24:11:2E:53:01,bridge=vmbr0,tag=20`.
    pub fn render(&self) -> String {
        let model = self.effective_model();
        let mut out = if self.mac.is_empty() {
            model.to_string()
        } else {
            format!("{}={}", model, self.mac)
        };
        if !self.bridge.is_empty() {
            out.push_str(&format!(",bridge={}", self.bridge));
        }
        if self.tag > 0 {
            out.push_str(&format!(",tag={}", self.tag));
        }
        out
    }

    pub(crate) fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            DEFAULT_NIC_MODEL
        } else {
            &self.model
        }
    }
}

impl QemuDisk {
    pub fn size_bytes(&self) -> Option<u64> {
        parse_size(&self.size)
    }

    /// Renders a new-volume allocation, `storage:GiB`, rounding up.
    fn render_allocation(&self, slot: &str) -> Result<String, ValidationError> {
        if self.storage.is_empty() {
            return Err(ValidationError::field(
                slot,
                "disk storage must not be empty",
            ));
        }
        let bytes = self.size_bytes().ok_or_else(|| {
            ValidationError::Format(format!("invalid size '{}' for disk {}", self.size, slot))
        })?;
        let gib = bytes.div_ceil(GIB).max(1);
        Ok(format!("{}:{}", self.storage, gib))
    }
}

impl QemuSpec {
    /// Renders the document for a from-scratch create: identity, sizing,
    /// NICs, freshly allocated disks and the free-form options.
    pub fn to_config(&self, name: &str) -> Result<QemuConfig, ValidationError> {
        let mut config = self.to_update_config(name)?;
        for (slot, disk) in &self.disk {
            config.insert(slot.clone(), disk.render_allocation(slot)?);
        }
        if !self.pool.is_empty() {
            config.insert("pool", self.pool.clone());
        }
        Ok(config)
    }

    /// Renders the document for updating an existing VM. Disk slots are left
    /// out because submitting `storage:size` would allocate a new volume;
    /// growth goes through resize instead.
    pub fn to_update_config(&self, name: &str) -> Result<QemuConfig, ValidationError> {
        if self.node.is_empty() {
            return Err(ValidationError::field("node", "spec.node must be set"));
        }
        if self.vmid == 0 {
            return Err(ValidationError::field("vmid", "spec.vmid must be set"));
        }

        let mut config = QemuConfig::new();
        for (key, value) in &self.options {
            config.insert(key.clone(), value.clone());
        }
        config.insert("node", self.node.clone());
        config.insert("vmid", self.vmid);
        if !name.is_empty() {
            config.insert("name", name);
        }
        if self.cpu.cores > 0 {
            config.insert("cores", self.cpu.cores);
        }
        if self.cpu.sockets > 0 {
            config.insert("sockets", self.cpu.sockets);
        }
        if !self.cpu.cpu_type.is_empty() {
            config.insert("cpu", self.cpu.cpu_type.clone());
        }
        if self.memory.size > 0 {
            config.insert("memory", self.memory.size);
            config.insert("balloon", self.memory.balloon);
        }
        config.insert("onboot", u8::from(self.autostart));
        if !self.tags.is_empty() {
            config.insert("tags", self.tags.join(";"));
        }
        for (slot, nic) in &self.network {
            config.insert(slot.clone(), nic.render());
        }
        Ok(config)
    }

    /// Disk slots whose desired size exceeds the applied one, with the
    /// absolute size to request. Shrinking is never proposed.
    pub fn disk_growth(&self, applied: &QemuConfig) -> Vec<(String, String)> {
        let applied_disks = applied.disks();
        self.disk
            .iter()
            .filter_map(|(slot, disk)| {
                let wanted = disk.size_bytes()?;
                let current = applied_disks.get(slot)?.size_bytes()?;
                (wanted > current).then(|| (slot.clone(), disk.size.clone()))
            })
            .collect()
    }
}
