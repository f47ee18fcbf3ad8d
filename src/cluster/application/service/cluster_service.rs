use crate::core::{
    domain::{
        error::{ProxmoxResult, ValidationError},
        model::{cluster_resource::ClusterGuest, placement::Placement},
    },
    infrastructure::{response::decode_data, transport::ClusterTransport},
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::debug;

/// `/cluster/nextid` answers with a numeric string on most releases and a
/// bare number on some.
struct NextVmid(u32);

impl<'de> Deserialize<'de> for NextVmid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrU32 {
            String(String),
            U32(u32),
        }

        match StringOrU32::deserialize(deserializer)? {
            StringOrU32::String(s) => s.parse::<u32>().map(NextVmid).map_err(serde::de::Error::custom),
            StringOrU32::U32(id) => Ok(NextVmid(id)),
        }
    }
}

/// Cluster-wide lookups a reconciler needs before it can address a VM:
/// where a clone template lives and which id a new VM can take.
pub struct ClusterService<'a, T: ClusterTransport + ?Sized> {
    transport: &'a T,
    cluster: &'a str,
}

impl<'a, T: ClusterTransport + ?Sized> ClusterService<'a, T> {
    pub fn new(transport: &'a T, cluster: &'a str) -> Self {
        Self { transport, cluster }
    }

    /// Lists every QEMU guest of the cluster.
    pub async fn guests(&self) -> ProxmoxResult<Vec<ClusterGuest>> {
        let body = self
            .transport
            .get("/cluster/resources", &json!({ "type": "vm" }))
            .await?;
        let guests: Vec<ClusterGuest> = decode_data("cluster resources", &body)?;
        Ok(guests.into_iter().filter(ClusterGuest::is_qemu).collect())
    }

    /// Finds the VM named `name` to clone from. Templates win over regular
    /// VMs carrying the same name.
    pub async fn find_template(&self, name: &str) -> ProxmoxResult<Option<Placement>> {
        if name.is_empty() {
            return Err(ValidationError::field("clone", "template name must not be empty").into());
        }
        let guests = self.guests().await?;
        let mut candidates = guests
            .iter()
            .filter(|guest| guest.name.as_deref() == Some(name));
        let found = candidates
            .clone()
            .find(|guest| guest.is_template())
            .or_else(|| candidates.next());

        debug!(cluster = self.cluster, name, found = found.is_some(), "resolved clone template");
        Ok(found.map(|guest| Placement::new(self.cluster, guest.node.as_str(), guest.vmid)))
    }

    /// Asks the cluster for the next free VM id.
    pub async fn next_vmid(&self) -> ProxmoxResult<u32> {
        let body = self.transport.get("/cluster/nextid", &json!({})).await?;
        let NextVmid(vmid) = decode_data("next vmid", &body)?;
        Ok(vmid)
    }
}
