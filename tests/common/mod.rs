//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use resilient_fetch::fetch::remote::ResourceFetcher;
use resilient_fetch::fetch::{FetchResult, ResourceId};

/// In-process fetcher driven by a closure, for exercising the controller
/// without a network.
#[allow(dead_code)]
pub struct ProgrammableFetcher<F> {
    f: Arc<F>,
}

#[allow(dead_code)]
impl<F, Fut> ProgrammableFetcher<F>
where
    F: Fn(ResourceId, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult<u64>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, Fut> ResourceFetcher for ProgrammableFetcher<F>
where
    F: Fn(ResourceId, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult<u64>> + Send + 'static,
{
    type Output = u64;

    async fn fetch(&self, id: ResourceId, cancel: CancellationToken) -> FetchResult<u64> {
        (self.f)(id, cancel).await
    }
}

/// Start a programmable mock resource server on an ephemeral port.
///
/// The closure decides status and JSON body per request; the path is ignored.
#[allow(dead_code)]
pub async fn start_programmable_resource_server<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Drain the request head before answering
                        let mut buf = [0u8; 4096];
                        let mut head = Vec::new();
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) => break,
                                Ok(n) => {
                                    head.extend_from_slice(&buf[..n]);
                                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                }
                                Err(_) => return,
                            }
                        }

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
