use crate::core::{
    domain::{
        error::{ProxmoxError, ProxmoxResult, ValidationError},
        model::{
            placement::Placement,
            qemu_config::{QemuConfig, QemuPendingConfig},
            qemu_operation::{CloneOperation, Observation},
            qemu_status::QemuStatusSnapshot,
        },
    },
    infrastructure::{response::decode_data, transport::ClusterTransport},
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// VM lifecycle calls against one node of one cluster.
///
/// Each method is exactly one hypervisor request (`observe` issues three).
/// Preconditions are checked locally before anything is sent; failures from
/// the transport are returned wrapped in [`ProxmoxError::Qemu`] and never
/// retried here. The service only borrows its state, so handles for
/// different VMs can be driven concurrently.
pub struct QemuService<'a, T: ClusterTransport + ?Sized> {
    transport: &'a T,
    cluster: &'a str,
    node: &'a str,
}

impl<'a, T: ClusterTransport + ?Sized> QemuService<'a, T> {
    pub fn new(transport: &'a T, cluster: &'a str, node: &'a str) -> Self {
        Self {
            transport,
            cluster,
            node,
        }
    }

    pub fn cluster(&self) -> &str {
        self.cluster
    }

    pub fn node(&self) -> &str {
        self.node
    }

    /// The placement of `vmid` on this service's node.
    pub fn placement(&self, vmid: u32) -> Placement {
        Placement::new(self.cluster, self.node, vmid)
    }

    /// Submits a create request. The node in the path is the config's
    /// `node`. Returns once the hypervisor accepted the request.
    pub async fn create(&self, config: &QemuConfig) -> ProxmoxResult<()> {
        let (node, vmid) = config.require_target()?;
        let target = Placement::new(self.cluster, node.as_str(), vmid);
        info!(cluster = self.cluster, node = %node, vmid, keys = config.len(), "creating qemu vm");

        let path = format!("/nodes/{}/qemu", node);
        self.transport
            .post(&path, &Value::Object(config.as_map().clone()))
            .await
            .map_err(|e| wrap("create", &target, e))?;
        Ok(())
    }

    /// Starts a full clone of `source` into `target`.
    ///
    /// The request goes to the source's node; the new VM lands on
    /// `target.node` with id `target.vmid`. The hypervisor runs the copy as a
    /// background task, so the returned [`CloneOperation`] only says the job
    /// was accepted.
    pub async fn clone_vm(
        &self,
        name: &str,
        source: &Placement,
        target: &Placement,
    ) -> ProxmoxResult<CloneOperation> {
        if source.node.is_empty() || source.vmid == 0 {
            return Err(ValidationError::field("source", "clone source needs a node and a vmid").into());
        }
        if target.node.is_empty() || target.vmid == 0 {
            return Err(ValidationError::field("target", "clone target needs a node and a vmid").into());
        }
        if source.cluster != target.cluster {
            warn!(source = %source, vm = %target, "cloning across clusters");
        }
        info!(source = %source, vm = %target, name, "cloning qemu vm");

        let path = format!("/nodes/{}/qemu/{}/clone", source.node, source.vmid);
        let body = json!({
            "node": source.node,
            "vmid": source.vmid,
            "newid": target.vmid,
            "name": name,
            "target": target.node,
            "full": true,
        });
        let response = self
            .transport
            .post(&path, &body)
            .await
            .map_err(|e| wrap("clone", target, e))?;
        let upid = decode_data::<Option<String>>("clone task", &response)
            .map_err(|e| wrap("clone", target, e))?;
        debug!(vm = %target, upid = upid.as_deref().unwrap_or_default(), "clone accepted");

        Ok(CloneOperation {
            source: source.clone(),
            target: target.clone(),
            upid,
        })
    }

    /// Submits a config update. Pending changes are left for the hypervisor
    /// to apply; this says nothing about sync status.
    pub async fn set_config(&self, config: &QemuConfig) -> ProxmoxResult<()> {
        let (node, vmid) = config.require_target()?;
        let target = Placement::new(self.cluster, node.as_str(), vmid);
        info!(cluster = self.cluster, node = %node, vmid, keys = config.len(), "setting qemu vm config");

        let path = format!("/nodes/{}/qemu/{}/config", node, vmid);
        self.transport
            .post(&path, &Value::Object(config.as_map().clone()))
            .await
            .map_err(|e| wrap("set config", &target, e))?;
        Ok(())
    }

    /// Fetches the applied config.
    pub async fn config(&self, vmid: u32) -> ProxmoxResult<QemuConfig> {
        let target = self.target(vmid)?;
        debug!(vm = %target, "fetching qemu vm config");
        let body = self
            .transport
            .get(&self.vm_path(vmid, "/config"), &self.query(vmid))
            .await
            .map_err(|e| wrap("get config", &target, e))?;
        decode_data("qemu config", &body).map_err(|e| wrap("get config", &target, e))
    }

    /// Fetches the changes accepted but not yet applied. An empty list means
    /// nothing is pending.
    pub async fn pending_config(&self, vmid: u32) -> ProxmoxResult<Vec<QemuPendingConfig>> {
        let target = self.target(vmid)?;
        debug!(vm = %target, "fetching qemu vm pending config");
        let body = self
            .transport
            .get(&self.vm_path(vmid, "/pending"), &self.query(vmid))
            .await
            .map_err(|e| wrap("get pending config", &target, e))?;
        let entries: Vec<QemuPendingConfig> = decode_data("qemu pending config", &body)
            .map_err(|e| wrap("get pending config", &target, e))?;
        Ok(entries.into_iter().filter(QemuPendingConfig::is_pending).collect())
    }

    /// Requests deletion. Does not wait for the VM to disappear.
    pub async fn delete(&self, vmid: u32) -> ProxmoxResult<()> {
        let target = self.target(vmid)?;
        info!(vm = %target, "deleting qemu vm");
        self.transport
            .delete(&self.vm_path(vmid, ""))
            .await
            .map_err(|e| wrap("delete", &target, e))?;
        Ok(())
    }

    /// Powers the VM on.
    pub async fn start(&self, vmid: u32) -> ProxmoxResult<()> {
        self.power("start", vmid).await
    }

    /// Powers the VM off without a guest shutdown.
    pub async fn stop(&self, vmid: u32) -> ProxmoxResult<()> {
        self.power("stop", vmid).await
    }

    /// Fetches the runtime state.
    pub async fn status(&self, vmid: u32) -> ProxmoxResult<QemuStatusSnapshot> {
        let target = self.target(vmid)?;
        debug!(vm = %target, "fetching qemu vm status");
        let body = self
            .transport
            .get(&self.vm_path(vmid, "/status/current"), &self.query(vmid))
            .await
            .map_err(|e| wrap("get status", &target, e))?;
        decode_data("qemu status", &body).map_err(|e| wrap("get status", &target, e))
    }

    /// Resizes `disk` to `size`. The size is forwarded verbatim, so both
    /// absolute (`40G`) and relative (`+8G`) forms reach the hypervisor.
    pub async fn resize(&self, vmid: u32, disk: &str, size: &str) -> ProxmoxResult<()> {
        let target = self.target(vmid)?;
        if disk.is_empty() {
            return Err(ValidationError::field("disk", "disk slot must not be empty").into());
        }
        if size.is_empty() {
            return Err(ValidationError::field("size", "size must not be empty").into());
        }
        info!(vm = %target, disk, size, "resizing qemu vm disk");

        let body = json!({
            "node": self.node,
            "vmid": vmid,
            "disk": disk,
            "size": size,
        });
        self.transport
            .put(&self.vm_path(vmid, "/resize"), &body)
            .await
            .map_err(|e| wrap("resize", &target, e))?;
        Ok(())
    }

    /// Fetches config, pending config and status of one VM, keeping each
    /// outcome for [`project`](crate::project).
    pub async fn observe(&self, vmid: u32) -> Observation {
        let (config, pending, status) =
            tokio::join!(self.config(vmid), self.pending_config(vmid), self.status(vmid));
        Observation {
            config,
            pending,
            status,
        }
    }

    async fn power(&self, action: &'static str, vmid: u32) -> ProxmoxResult<()> {
        let target = self.target(vmid)?;
        info!(vm = %target, action, "changing qemu vm power state");
        self.transport
            .post(&self.vm_path(vmid, &format!("/status/{}", action)), &self.query(vmid))
            .await
            .map_err(|e| wrap(action, &target, e))?;
        Ok(())
    }

    fn target(&self, vmid: u32) -> ProxmoxResult<Placement> {
        if self.node.is_empty() {
            return Err(ValidationError::field("node", "node name must not be empty").into());
        }
        if vmid == 0 {
            return Err(ValidationError::field("vmid", "vmid must be a positive integer").into());
        }
        Ok(self.placement(vmid))
    }

    fn vm_path(&self, vmid: u32, suffix: &str) -> String {
        format!("/nodes/{}/qemu/{}{}", self.node, vmid, suffix)
    }

    fn query(&self, vmid: u32) -> Value {
        json!({ "node": self.node, "vmid": vmid })
    }
}

fn wrap(operation: &'static str, target: &Placement, source: ProxmoxError) -> ProxmoxError {
    ProxmoxError::Qemu {
        operation,
        target: target.to_string(),
        source: Box::new(source),
    }
}
