//! Flaky mock resource server for manual testing.
//!
//! Serves JSON resources on `/users/{id}`. Toggle failure mode with
//! `GET /fail` and `GET /ok` to watch the circuit breaker open and recover:
//!
//! ```text
//! cargo run --example mock_resource_server
//! cargo run -- --base-url http://127.0.0.1:8081
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    let addr = SocketAddr::from(([127, 0, 0, 1], 8081));
    let listener = TcpListener::bind(addr).await.expect("bind mock server");
    println!("Mock resource server listening on http://{}", addr);
    println!("GET /fail turns failures on, GET /ok turns them off");

    let failing = Arc::new(AtomicBool::new(false));

    loop {
        let Ok((mut socket, _)) = listener.accept().await else {
            break;
        };
        let failing = failing.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            let Ok(n) = socket.read(&mut buf).await else {
                return;
            };
            let head = String::from_utf8_lossy(&buf[..n]);
            let path = head
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/")
                .to_string();

            let (status, body) = if path == "/fail" {
                failing.store(true, Ordering::SeqCst);
                ("200 OK", r#"{"failing": true}"#.to_string())
            } else if path == "/ok" {
                failing.store(false, Ordering::SeqCst);
                ("200 OK", r#"{"failing": false}"#.to_string())
            } else if failing.load(Ordering::SeqCst) {
                ("503 Service Unavailable", r#"{"error": "flaky"}"#.to_string())
            } else if let Some(id) = path.strip_prefix("/users/") {
                match id.parse::<u64>() {
                    Ok(id) => (
                        "200 OK",
                        format!(r#"{{"id": {}, "name": "User {}"}}"#, id, id),
                    ),
                    Err(_) => ("404 Not Found", r#"{"error": "bad id"}"#.to_string()),
                }
            } else {
                ("404 Not Found", r#"{"error": "not found"}"#.to_string())
            };

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
    }
}
