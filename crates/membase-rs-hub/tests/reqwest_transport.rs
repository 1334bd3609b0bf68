use membase_rs_hub::{HubRequest, HubTransport, ReqwestTransport, TransportError};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[tokio::test]
async fn unresponsive_hub_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let transport = ReqwestTransport::new("membase-rs-test").expect("transport");
    let request = HubRequest::post(format!("http://{addr}/api/upload"))
        .json(json!({}))
        .timeout(Duration::from_millis(100));
    let err = transport.send(request).await.unwrap_err();
    assert_eq!(err, TransportError::Timeout { timeout_ms: 100 });
    server.abort();
}

#[tokio::test]
async fn sends_identity_headers_and_reads_body() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = socket.read(&mut buf).await.expect("read");
            if read == 0 {
                break;
            }
            head.extend_from_slice(&buf[..read]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n[]")
            .await
            .expect("write");
        String::from_utf8_lossy(&head).to_ascii_lowercase()
    });

    let transport = ReqwestTransport::new("membase-rs-test").expect("transport");
    let request = HubRequest::post(format!("http://{addr}/api/conversation"))
        .form([("owner", "alice")])
        .timeout(Duration::from_secs(5));
    let response = transport.send(request).await.expect("response");
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"[]".to_vec());

    let head = server.await.expect("server");
    assert!(head.starts_with("post /api/conversation"), "{head}");
    assert!(head.contains("user-agent: membase-rs-test"), "{head}");
    assert!(head.contains("accept: application/json"), "{head}");
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let transport = ReqwestTransport::new("membase-rs-test").expect("transport");
    let err = transport
        .send(HubRequest::post(format!("http://{addr}/api/download")).timeout(Duration::from_secs(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Network(_)), "{err:?}");
}
