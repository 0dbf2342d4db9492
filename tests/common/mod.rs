//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use flood_guard::net::{Listener, ListenerError};
use flood_guard::{ConnectionGuard, GuardConfig, GuardServer, RequestGuard, Shutdown};

pub struct TestServer {
    pub addr: SocketAddr,
    pub connections: Arc<ConnectionGuard>,
    pub requests: Arc<RequestGuard>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ListenerError>>,
}

/// Run a guarded server on an ephemeral localhost port.
pub async fn spawn_server(config: GuardConfig) -> TestServer {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections);

    let connections = Arc::new(ConnectionGuard::new(config.connection_guard.clone()));
    let requests = Arc::new(RequestGuard::new(config.request_guard.clone()));
    let shutdown = Shutdown::new();

    let server = GuardServer::new(config.listener, connections.clone(), requests.clone());
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        connections,
        requests,
        shutdown,
        handle,
    }
}

/// Send one request and read until the server closes the connection.
pub async fn send_request(addr: SocketAddr, user_agent: Option<&str>) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut request = String::from("GET / HTTP/1.1\r\nHost: localhost\r\n");
    if let Some(ua) = user_agent {
        request.push_str(&format!("User-Agent: {ua}\r\n"));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response).await;
    String::from_utf8_lossy(&response).into_owned()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
