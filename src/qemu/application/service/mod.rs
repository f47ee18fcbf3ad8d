pub mod qemu_service;
pub mod status_projection;
