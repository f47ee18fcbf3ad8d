use serde::{Deserialize, Serialize};
use std::fmt;

/// Addresses one VM instance: cluster, node and numeric VM id.
///
/// Clone sources and clone targets are both placements and may live on
/// different nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Placement {
    pub cluster: String,
    pub node: String,
    pub vmid: u32,
}

impl Placement {
    pub fn new(cluster: impl Into<String>, node: impl Into<String>, vmid: u32) -> Self {
        Self {
            cluster: cluster.into(),
            node: node.into(),
            vmid,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.cluster, self.node, self.vmid)
    }
}
