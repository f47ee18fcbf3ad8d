//! Domain models for QEMU configuration documents.
//!
//! The hypervisor's option set is large and extensible, so the configuration
//! is kept as an open JSON map. Keys the lifecycle client reasons about get
//! typed accessors; everything else passes through verbatim.

use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

const DISK_BUSES: [&str; 4] = ["scsi", "virtio", "sata", "ide"];

/// A hypervisor-native VM configuration, as returned by
/// `/nodes/{node}/qemu/{vmid}/config` or submitted on create/update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct QemuConfig(Map<String, Value>);

impl QemuConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns a scalar value as text. Numbers are rendered in decimal and
    /// booleans as `1`/`0`, matching how the hypervisor stores them.
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn node(&self) -> Option<&str> {
        self.get("node").and_then(Value::as_str)
    }

    /// The VM id, accepting both JSON numbers and numeric strings.
    pub fn vmid(&self) -> Option<u32> {
        self.get_number("vmid").and_then(|vmid| u32::try_from(vmid).ok())
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    pub fn cores(&self) -> Option<u64> {
        self.get_number("cores")
    }

    pub fn sockets(&self) -> Option<u64> {
        self.get_number("sockets")
    }

    /// Memory in MiB.
    pub fn memory(&self) -> Option<u64> {
        self.get_number("memory")
    }

    /// Balloon target in MiB; `0` disables the balloon device.
    pub fn balloon(&self) -> Option<u64> {
        self.get_number("balloon")
    }

    /// The CPU model, i.e. the leading value of the `cpu` property
    /// (`host` for `host,flags=+aes`, `kvm64` for `cputype=kvm64`).
    pub fn cpu_type(&self) -> Option<String> {
        let raw = self.get_text("cpu")?;
        let first = raw.split(',').next().unwrap_or_default();
        let model = first.strip_prefix("cputype=").unwrap_or(first);
        Some(model.to_string())
    }

    /// Whether the VM starts with its node. Absent means off.
    pub fn onboot(&self) -> bool {
        self.get_text("onboot").is_some_and(|v| v == "1")
    }

    /// Tags, split on the separators the hypervisor accepts (`;`, `,`, space).
    pub fn tags(&self) -> BTreeSet<String> {
        self.get_text("tags")
            .map(|raw| split_tags(&raw))
            .unwrap_or_default()
    }

    /// The lock held on the VM (e.g. `clone`, `migrate`), if any.
    pub fn lock(&self) -> Option<String> {
        self.get_text("lock")
    }

    /// Disk slots (`scsiN`, `virtioN`, `sataN`, `ideN`), skipping CD-ROM drives.
    pub fn disks(&self) -> BTreeMap<String, DiskSlot> {
        self.0
            .iter()
            .filter(|(key, _)| is_disk_slot(key))
            .filter_map(|(key, value)| {
                let raw = value_text(value)?;
                DiskSlot::parse(&raw).map(|disk| (key.clone(), disk))
            })
            .collect()
    }

    /// NIC slots (`netN`).
    pub fn networks(&self) -> BTreeMap<String, NetworkSlot> {
        self.0
            .iter()
            .filter(|(key, _)| slot_index(key, "net").is_some())
            .filter_map(|(key, value)| {
                let raw = value_text(value)?;
                NetworkSlot::parse(&raw).map(|nic| (key.clone(), nic))
            })
            .collect()
    }

    /// Checks the keys every create/update must carry and returns them.
    pub(crate) fn require_target(&self) -> Result<(String, u32), ValidationError> {
        let node = match self.get("node") {
            None => {
                return Err(ValidationError::field(
                    "node",
                    "no node name in qemu config",
                ));
            }
            Some(Value::String(node)) if !node.is_empty() => node.clone(),
            Some(_) => {
                return Err(ValidationError::field(
                    "node",
                    "node must be a non-empty string",
                ));
            }
        };
        if !self.contains_key("vmid") {
            return Err(ValidationError::field("vmid", "no vmid in qemu config"));
        }
        let vmid = self
            .vmid()
            .filter(|vmid| *vmid > 0)
            .ok_or_else(|| ValidationError::field("vmid", "vmid must be a positive integer"))?;
        Ok((node, vmid))
    }

    fn get_number(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for QemuConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One entry of `/nodes/{node}/qemu/{vmid}/pending`.
///
/// `value` is what is applied now; `pending` is the accepted but not yet
/// applied value. `delete` is set when removal of the key is pending.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QemuPendingConfig {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<u8>,
}

impl QemuPendingConfig {
    /// `true` when the key has a change waiting to be applied.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some() || self.delete.is_some_and(|d| d > 0)
    }
}

/// A parsed disk slot, e.g. `local-lvm:vm-100-disk-0,size=32G`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSlot {
    pub storage: String,
    pub volume: String,
    pub size: Option<String>,
}

impl DiskSlot {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(',');
        let spec = parts.next()?.trim();
        let mut size = None;
        for option in parts {
            match option.split_once('=') {
                Some(("media", "cdrom")) => return None,
                Some(("size", value)) => size = Some(value.to_string()),
                _ => {}
            }
        }
        let (storage, volume) = spec.split_once(':')?;
        Some(Self {
            storage: storage.to_string(),
            volume: volume.to_string(),
            size,
        })
    }

    /// The slot size in bytes, if known.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(parse_size)
    }
}

/// A parsed NIC slot, e.g. `virtio=BC:24:11:2E:53:01,bridge=vmbr0,tag=20`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkSlot {
    pub model: String,
    pub mac: Option<String>,
    pub bridge: Option<String>,
    pub tag: Option<u16>,
}

impl NetworkSlot {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut nic = NetworkSlot::default();
        for (index, part) in raw.split(',').map(str::trim).enumerate() {
            let (key, value) = match part.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (part, None),
            };
            match (key, value) {
                ("model", Some(model)) => nic.model = model.to_string(),
                ("macaddr", Some(mac)) => nic.mac = Some(mac.to_string()),
                ("bridge", Some(bridge)) => nic.bridge = Some(bridge.to_string()),
                ("tag", Some(tag)) => nic.tag = tag.parse().ok(),
                (model, mac) if index == 0 => {
                    nic.model = model.to_string();
                    nic.mac = mac.map(str::to_string);
                }
                _ => {}
            }
        }
        (!nic.model.is_empty()).then_some(nic)
    }
}

/// Parses a disk size such as `32G`, `512M` or `1T` into bytes. A bare
/// number is taken as bytes.
pub fn parse_size(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.starts_with('+') {
        return None;
    }
    let (digits, shift) = match raw.chars().last()?.to_ascii_uppercase() {
        'K' => (&raw[..raw.len() - 1], 10),
        'M' => (&raw[..raw.len() - 1], 20),
        'G' => (&raw[..raw.len() - 1], 30),
        'T' => (&raw[..raw.len() - 1], 40),
        _ => (raw, 0),
    };
    digits.parse::<u64>().ok()?.checked_mul(1u64 << shift)
}

pub(crate) fn split_tags(raw: &str) -> BTreeSet<String> {
    raw.split([';', ',', ' '])
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

fn is_disk_slot(key: &str) -> bool {
    DISK_BUSES.iter().any(|bus| slot_index(key, bus).is_some())
}

fn slot_index(key: &str, prefix: &str) -> Option<u32> {
    let index = key.strip_prefix(prefix)?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    index.parse().ok()
}
