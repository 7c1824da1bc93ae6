#![cfg(feature = "reqwest")]

use std::net::SocketAddr;

use spotcheck_fetch::{
    CarFetcher, DagScope, FetchOptions, Protocol, ReqwestClient, RetrievalRequest, codes,
};
use spotcheck_verify::fixtures;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, answer it with a fixed response and hand back the
/// raw request head.
async fn serve_once(status_line: &'static str, body: Vec<u8>) -> (SocketAddr, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 8192];
        let n = socket.read(&mut request).await.unwrap();

        let head = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/vnd.ipld.car\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();

        String::from_utf8_lossy(&request[..n]).into_owned()
    });

    (addr, handle)
}

fn http_request(addr: SocketAddr) -> RetrievalRequest {
    RetrievalRequest {
        protocol:           Protocol::Http,
        address:            format!("/ip4/127.0.0.1/tcp/{}/http", addr.port()),
        cid:                fixtures::HELLO_CID.to_string(),
        dag_scope:          DagScope::Block,
        entity_bytes_range: None,
    }
}

#[tokio::test]
async fn retrieves_and_verifies_over_http() {
    let (addr, server) = serve_once("200 OK", fixtures::hello_car()).await;
    let fetcher = CarFetcher::new(ReqwestClient::new().unwrap());

    let stats = fetcher.retrieve(&http_request(addr), &FetchOptions::default()).await;
    let request = server.await.unwrap().to_ascii_lowercase();

    assert_eq!(stats.status_code, Some(200));
    assert_eq!(stats.byte_length, fixtures::HELLO_CAR_LEN as u64);
    assert_eq!(stats.car_checksum.as_deref(), Some(fixtures::HELLO_CAR_CHECKSUM));
    assert!(request.starts_with(&format!("get /ipfs/{}?dag-scope=block ", fixtures::HELLO_CID)));
    assert!(request.contains("accept: application/vnd.ipld.car"));
}

#[tokio::test]
async fn server_error_status_is_recorded() {
    let (addr, server) = serve_once("500 Internal Server Error", b"boom".to_vec()).await;
    let fetcher = CarFetcher::new(ReqwestClient::new().unwrap());

    let stats = fetcher.retrieve(&http_request(addr), &FetchOptions::default()).await;
    server.await.unwrap();

    assert_eq!(stats.status_code, Some(500));
    assert!(stats.car_checksum.is_none());
}

#[tokio::test]
async fn refused_connection_is_a_tcp_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = CarFetcher::new(ReqwestClient::new().unwrap());
    let stats = fetcher.retrieve(&http_request(addr), &FetchOptions::default()).await;

    assert_eq!(stats.status_code, Some(codes::TCP_CONNECT_ERROR));
    assert!(!stats.timeout);
}

#[tokio::test]
async fn indirection_urls_go_through_the_gateway() {
    let (addr, server) = serve_once("200 OK", fixtures::hello_car()).await;
    let client = ReqwestClient::new().unwrap().ipfs_gateway(format!("http://{addr}"));
    let fetcher = CarFetcher::new(client);

    let request = RetrievalRequest {
        protocol:           Protocol::Graphsync,
        address:            "/ip4/10.0.0.1/tcp/24001/p2p/12D3KooWRH71ovvfJ3g3zjLwJRr3ogMZpWmHbb1TRQERzPdfsuPu".into(),
        cid:                fixtures::HELLO_CID.into(),
        dag_scope:          DagScope::All,
        entity_bytes_range: None,
    };
    let stats = fetcher.retrieve(&request, &FetchOptions::default()).await;
    let head = server.await.unwrap();

    assert!(stats.is_success());
    assert!(head.starts_with(&format!(
        "GET /ipfs/{}?dag-scope=all&protocols=graphsync&providers=%2Fip4%2F10.0.0.1",
        fixtures::HELLO_CID
    )));
}
