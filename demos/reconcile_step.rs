//! Runs one reconcile step for a VM described by a custom-resource spec.
//!
//! ```text
//! PROXMOX_HOST=... PROXMOX_USERNAME=... PROXMOX_PASSWORD=... PROXMOX_REALM=pam \
//!   RUST_LOG=proxmox_qemu=debug cargo run --example reconcile_step -- web-1 spec.json
//! ```

use proxmox_qemu::{
    ProxmoxClientBuilder, ProxmoxResult, QemuResourceStatus, QemuSpec, QemuSyncStatus,
    mismatches, project,
};
use std::{env, fs};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ProxmoxResult<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,proxmox_qemu=debug,reqwest=warn")),
        )
        .init();

    let mut args = env::args().skip(1);
    let name = args.next().unwrap_or_else(|| "web-1".to_string());
    let spec_path = args.next().unwrap_or_else(|| "spec.json".to_string());
    let raw = fs::read_to_string(&spec_path).expect("spec file must be readable");
    let spec: QemuSpec = serde_json::from_str(&raw).expect("spec file must hold a qemu spec");

    let mut builder = ProxmoxClientBuilder::from_env()?;
    if !spec.cluster.is_empty() {
        builder = builder.cluster(spec.cluster.clone());
    }
    let client = builder.build()?;
    client.login().await?;

    let qemu = client.qemu(&spec.node);
    let observation = qemu.observe(spec.vmid).await;
    let projection = project(&spec, &observation, QemuSyncStatus::Empty);
    println!("observed: {} / {}", projection.status, projection.power);

    match &observation.config {
        Err(e) if e.is_not_found() => {
            if spec.clone.is_empty() {
                qemu.create(&spec.to_config(&name)?).await?;
                println!("create requested");
            } else if let Some(source) = client.resources().find_template(&spec.clone).await? {
                let operation = qemu.clone_vm(&name, &source, &qemu.placement(spec.vmid)).await?;
                println!("clone requested: {:?}", operation.upid);
            } else {
                println!("clone template {} not found", spec.clone);
            }
        }
        Ok(applied) if projection.status == QemuSyncStatus::OutOfSync => {
            println!("drift: {:?}", mismatches(&spec, applied));
            qemu.set_config(&spec.to_update_config(&name)?).await?;
            for (disk, size) in spec.disk_growth(applied) {
                qemu.resize(spec.vmid, &disk, &size).await?;
            }
            if spec.autostart && observation.status.as_ref().is_ok_and(|s| s.status.as_deref() == Some("stopped")) {
                qemu.start(spec.vmid).await?;
            }
        }
        _ => {}
    }

    let status = QemuResourceStatus::new(
        projection,
        &qemu.placement(spec.vmid),
        observation.config.as_ref().ok(),
    );
    println!("{}", serde_json::to_string_pretty(&status).expect("status serialises"));
    Ok(())
}
