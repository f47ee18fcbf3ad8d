use super::{
    authenticated_client_for, create_authenticated_client, create_test_connection,
    start_raw_server,
};
use crate::{
    ApiClient, ClientConfig, Placement, PowerState, ProxmoxError, QemuResourceStatus, QemuService, QemuSpec,
    QemuSyncStatus, mismatches, project,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_partial_json, method, path, query_param},
};

fn web_spec() -> QemuSpec {
    serde_json::from_value(json!({
        "autostart": true,
        "cluster": "prod",
        "node": "pve1",
        "vmid": 100,
        "cpu": {"cores": 2, "sockets": 1, "type": "host"},
        "memory": {"size": 4096, "balloon": 0},
        "disk": {"scsi0": {"size": "32G", "storage": "local-lvm"}},
        "network": {"net0": {"bridge": "vmbr0", "mac": "BC:24:11:2E:53:01", "tag": 20}},
        "options": {"agent": "1"},
        "tags": ["prod", "web"]
    }))
    .unwrap()
}

fn applied_config() -> serde_json::Value {
    json!({
        "name": "web-1",
        "cores": 2,
        "sockets": 1,
        "cpu": "host",
        "memory": "2048",
        "balloon": 0,
        "onboot": 1,
        "agent": "1",
        "scsi0": "local-lvm:vm-100-disk-0,size=32G",
        "net0": "virtio=BC:24:11:2E:53:01,bridge=vmbr0,tag=20",
        "tags": "prod;web",
        "digest": "6a3f1e"
    })
}

async fn mount_observation(server: &MockServer, config: serde_json::Value, status: &str) {
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .and(query_param("node", "pve1"))
        .and(query_param("vmid", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": config })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"key": "cores", "value": 2},
                {"key": "memory", "value": "2048"}
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/status/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "status": status,
                "qmpstatus": status,
                "vmid": 100,
                "name": "web-1",
                "cpu": 0.02,
                "cpus": 2,
                "maxmem": 4294967296_u64,
                "mem": 1073741824_u64,
                "maxdisk": 34359738368_u64,
                "uptime": 3600,
                "ha": {"managed": 0}
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_vm_from_spec() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .and(body_partial_json(json!({
            "node": "pve1",
            "vmid": 100,
            "name": "web-1",
            "memory": 4096,
            "scsi0": "local-lvm:32",
            "net0": "virtio=BC:24:11:2E:53:01,bridge=vmbr0,tag=20",
            "agent": "1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": "UPID:pve1:00001234:00005678:6553F000:qmcreate:100:testuser@pam:"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = QemuService::new(&client, "prod", "pve1");
    let config = web_spec().to_config("web-1").unwrap();
    service.create(&config).await.unwrap();
}

#[tokio::test]
async fn test_clone_vm_from_template() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve2/qemu/9000/clone"))
        .and(body_json(json!({
            "node": "pve2",
            "vmid": 9000,
            "newid": 100,
            "name": "web-1",
            "target": "pve1",
            "full": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": "UPID:pve2:0000AAAA:0000BBBB:6553F000:qmclone:9000:testuser@pam:"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = QemuService::new(&client, "prod", "pve1");
    let operation = service
        .clone_vm(
            "web-1",
            &Placement::new("prod", "pve2", 9000),
            &Placement::new("prod", "pve1", 100),
        )
        .await
        .unwrap();
    assert!(operation.upid.unwrap().contains("qmclone"));
    assert_eq!(operation.target.node, "pve1");
}

#[tokio::test]
async fn test_observe_and_project_out_of_sync() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;
    mount_observation(&mock_server, applied_config(), "running").await;

    let service = QemuService::new(&client, "prod", "pve1");
    let spec = web_spec();
    let observation = service.observe(100).await;

    let projection = project(&spec, &observation, QemuSyncStatus::Synced);
    assert_eq!(projection.status, QemuSyncStatus::OutOfSync);
    assert_eq!(projection.power, PowerState::On);

    let applied = observation.config.as_ref().unwrap();
    assert_eq!(mismatches(&spec, applied), vec!["memory".to_string()]);

    let status = QemuResourceStatus::new(projection, &service.placement(100), Some(applied));
    assert_eq!(status.net[0].mac, "BC:24:11:2E:53:01");
}

#[tokio::test]
async fn test_observe_and_project_synced_and_stopped() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;
    let mut config = applied_config();
    config["memory"] = json!(4096);
    mount_observation(&mock_server, config, "stopped").await;

    let service = QemuService::new(&client, "prod", "pve1");
    let observation = service.observe(100).await;
    let projection = project(&web_spec(), &observation, QemuSyncStatus::OutOfSync);
    assert_eq!(projection.status, QemuSyncStatus::Synced);
    assert_eq!(projection.power, PowerState::Off);
}

#[tokio::test]
async fn test_observe_logs_in_once() {
    let mock_server = MockServer::start().await;
    let client =
        ApiClient::new(create_test_connection(&mock_server.uri()), ClientConfig::default()).unwrap();
    Mock::given(method("POST"))
        .and(path("/api2/json/access/ticket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "ticket": "PVE:testuser@pam:4EEC61E2::sig",
                "CSRFPreventionToken": "4EEC61E2:token"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_observation(&mock_server, applied_config(), "running").await;

    let service = QemuService::new(&client, "prod", "pve1");
    let observation = service.observe(100).await;
    assert!(observation.config.is_ok());
    assert!(observation.pending.is_ok());
    assert!(observation.status.is_ok());
}

#[tokio::test]
async fn test_pending_changes_reported() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"key": "memory", "value": 2048, "pending": 4096},
                {"key": "cores", "value": 2}
            ]
        })))
        .mount(&mock_server)
        .await;

    let service = QemuService::new(&client, "prod", "pve1");
    let pending = service.pending_config(100).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key, "memory");
    assert_eq!(pending[0].pending, Some(json!(4096)));
}

#[tokio::test]
async fn test_missing_vm_while_provisioning() {
    let uri = start_raw_server(
        "500 Configuration file 'nodes/pve1/qemu-server/100.conf' does not exist",
        r#"{"data":null}"#,
    )
    .await;
    let client = authenticated_client_for(&uri).await;

    let service = QemuService::new(&client, "prod", "pve1");
    let observation = service.observe(100).await;
    assert!(observation.config.as_ref().unwrap_err().is_not_found());
    assert!(observation.pending.as_ref().unwrap_err().is_not_found());
    assert!(observation.status.as_ref().unwrap_err().is_not_found());

    for last in [QemuSyncStatus::Pending, QemuSyncStatus::Cloning] {
        let projection = project(&web_spec(), &observation, last);
        assert_eq!(projection.status, last);
        assert_eq!(projection.power, PowerState::Unknown);
    }
    let projection = project(&web_spec(), &observation, QemuSyncStatus::Synced);
    assert_eq!(projection.status, QemuSyncStatus::Unknown);
}

#[tokio::test]
async fn test_update_config_and_grow_disk() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .and(body_partial_json(json!({"memory": 4096, "vmid": 100})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api2/json/nodes/pve1/qemu/100/resize"))
        .and(body_partial_json(json!({"disk": "scsi0", "size": "40G"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = QemuService::new(&client, "prod", "pve1");
    let mut spec = web_spec();
    spec.disk.get_mut("scsi0").unwrap().size = "40G".into();

    let update = spec.to_update_config("web-1").unwrap();
    service.set_config(&update).await.unwrap();

    let applied = crate::QemuConfig::new().with("scsi0", "local-lvm:vm-100-disk-0,size=32G");
    for (disk, size) in spec.disk_growth(&applied) {
        service.resize(100, &disk, &size).await.unwrap();
    }
}

#[tokio::test]
async fn test_power_and_delete() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    for action in ["start", "stop"] {
        Mock::given(method("POST"))
            .and(path(format!("/api2/json/nodes/pve1/qemu/100/status/{}", action)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "UPID:pve1:1"})))
            .expect(1)
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path("/api2/json/nodes/pve1/qemu/100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "UPID:pve1:2"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = QemuService::new(&client, "prod", "pve1");
    service.start(100).await.unwrap();
    service.stop(100).await.unwrap();
    service.delete(100).await.unwrap();
}

#[tokio::test]
async fn test_hypervisor_error_is_wrapped() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/100/status/start"))
        .respond_with(ResponseTemplate::new(500).set_body_string("VM is locked (clone)"))
        .mount(&mock_server)
        .await;

    let service = QemuService::new(&client, "prod", "pve1");
    let err = service.start(100).await.unwrap_err();
    match err {
        ProxmoxError::Qemu { operation, target, source } => {
            assert_eq!(operation, "start");
            assert_eq!(target, "prod/pve1/100");
            assert!(matches!(*source, ProxmoxError::Api { status: 500, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_vm_actions_unauthorized_triggers_refresh() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/100/status/start"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api2/json/access/ticket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "ticket": "PVE:testuser@pam:4EEC61E2::new_sig",
                "CSRFPreventionToken": "4EEC61E2:new_token"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/100/status/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "UPID:pve1:3"})))
        .mount(&mock_server)
        .await;

    let service = QemuService::new(&client, "prod", "pve1");
    service.start(100).await.unwrap();

    let auth = client.auth().await.unwrap();
    assert_eq!(auth.ticket().as_str(), "PVE:testuser@pam:4EEC61E2::new_sig");
}
