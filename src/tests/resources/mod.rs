mod cluster_tests;
mod qemu_tests;

use crate::{
    ApiClient, ClientConfig, ProxmoxAuth, ProxmoxCSRFToken, ProxmoxConnection, ProxmoxHost,
    ProxmoxPassword, ProxmoxPort, ProxmoxRealm, ProxmoxTicket, ProxmoxUrl, ProxmoxUsername,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::MockServer;

fn create_test_connection(server_url: &str) -> ProxmoxConnection {
    let host = ProxmoxHost::new_unchecked("127.0.0.1".to_string());
    let port = ProxmoxPort::new_unchecked(8006);
    let username = ProxmoxUsername::new_unchecked("testuser".to_string());
    let password = ProxmoxPassword::new_unchecked("testpass".to_string());
    let realm = ProxmoxRealm::new_unchecked("pam".to_string());
    let url = ProxmoxUrl::parse(&(server_url.to_string() + "/")).unwrap();
    ProxmoxConnection::new(host, port, username, password, realm, true, url)
}

async fn create_authenticated_client(mock_server: &MockServer) -> ApiClient {
    authenticated_client_for(&mock_server.uri()).await
}

async fn authenticated_client_for(uri: &str) -> ApiClient {
    let connection = create_test_connection(uri);
    let client = ApiClient::new(connection, ClientConfig::default()).unwrap();

    let ticket = ProxmoxTicket::new_unchecked("PVE:testuser@pam:4EEC61E2::sig".to_string());
    let csrf = ProxmoxCSRFToken::new_unchecked("4EEC61E2:token".to_string());
    client.set_auth(ProxmoxAuth::new(ticket, Some(csrf))).await;
    client
}

/// Answers every request with `status_line` and a JSON `body`, keeping the
/// reason phrase Proxmox uses to carry its error text.
async fn start_raw_server(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json;charset=UTF-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}
