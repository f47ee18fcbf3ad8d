pub mod client_config;
pub mod cluster_resource;
pub mod placement;
pub mod proxmox_auth;
pub mod proxmox_connection;
pub mod qemu_config;
pub mod qemu_operation;
pub mod qemu_spec;
pub mod qemu_status;
pub mod sync_status;
