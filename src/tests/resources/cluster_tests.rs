use super::create_authenticated_client;
use crate::{Placement, ProxmoxClient};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

#[tokio::test]
async fn test_cluster_guests_success() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api2/json/cluster/resources"))
        .and(query_param("type", "vm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "type": "qemu",
                    "vmid": 100,
                    "node": "pve1",
                    "id": "qemu/100",
                    "name": "ubuntu-vm",
                    "status": "running",
                    "maxcpu": 4,
                    "maxmem": 8589934592_i64,
                    "uptime": 123456,
                    "tags": "ubuntu;production"
                },
                {
                    "type": "lxc",
                    "vmid": 200,
                    "node": "pve2",
                    "id": "lxc/200",
                    "name": "alpine-ct",
                    "status": "stopped"
                },
                {
                    "type": "qemu",
                    "vmid": 9000,
                    "node": "pve2",
                    "id": "qemu/9000",
                    "name": "ubuntu-template",
                    "status": "stopped",
                    "template": 1,
                    "pool": "templates"
                }
            ]
        })))
        .mount(&mock_server)
        .await;

    let proxmox_client = ProxmoxClient {
        api_client: client,
        cluster: "prod".to_string(),
    };

    let guests = proxmox_client.resources().guests().await.unwrap();
    assert_eq!(guests.len(), 2);
    assert_eq!(guests[0].name.as_deref(), Some("ubuntu-vm"));
    assert!(!guests[0].is_template());
    assert_eq!(guests[1].pool.as_deref(), Some("templates"));
    assert!(guests[1].is_template());

    let template = proxmox_client
        .resources()
        .find_template("ubuntu-template")
        .await
        .unwrap();
    assert_eq!(template, Some(Placement::new("prod", "pve2", 9000)));
}

#[tokio::test]
async fn test_cluster_guests_empty() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api2/json/cluster/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&mock_server)
        .await;

    let proxmox_client = ProxmoxClient {
        api_client: client,
        cluster: "prod".to_string(),
    };

    assert!(proxmox_client.resources().guests().await.unwrap().is_empty());
    assert_eq!(
        proxmox_client.resources().find_template("missing").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_next_vmid() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api2/json/cluster/nextid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "101"})))
        .mount(&mock_server)
        .await;

    let proxmox_client = ProxmoxClient {
        api_client: client,
        cluster: "prod".to_string(),
    };
    assert_eq!(proxmox_client.resources().next_vmid().await.unwrap(), 101);
}

#[tokio::test]
async fn test_cluster_guests_unauthorized_triggers_refresh() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api2/json/cluster/resources"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api2/json/access/ticket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "ticket": "PVE:testuser@pam:4EEC61E2::refreshed",
                "CSRFPreventionToken": "4EEC61E2:newtoken"
            }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api2/json/cluster/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "type": "qemu",
                    "vmid": 100,
                    "node": "pve1",
                    "id": "qemu/100",
                    "name": "retry-vm",
                    "status": "running"
                }
            ]
        })))
        .mount(&mock_server)
        .await;

    let proxmox_client = ProxmoxClient {
        api_client: client,
        cluster: "prod".to_string(),
    };

    let guests = proxmox_client.resources().guests().await.unwrap();
    assert_eq!(guests.len(), 1);
    assert_eq!(guests[0].name.as_deref(), Some("retry-vm"));
}
