//! Connection accept loop with a bounded header read timeout.
//!
//! `axum::serve` offers no header read timeout, so connections are driven by
//! hyper-util directly to keep slow clients from holding sockets open.

use std::time::Duration;

use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use tokio::net::TcpListener;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Accept connections until `shutdown` is cancelled.
///
/// Each connection runs on `tracker`; on shutdown in-flight connections finish
/// their current requests before closing.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    header_read_timeout: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(header_read_timeout);

    loop {
        let (stream, remote_addr) = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(error = ?err, "failed to accept connection");
                    continue;
                }
            },
        };

        tracing::trace!(%remote_addr, "accepted connection");

        let builder = builder.clone();
        let service = TowerToHyperService::new(app.clone());
        let shutdown = shutdown.clone();

        tracker.spawn(async move {
            let connection = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
            tokio::pin!(connection);

            let result = tokio::select! {
                result = connection.as_mut() => result,
                () = shutdown.cancelled() => {
                    connection.as_mut().graceful_shutdown();
                    connection.await
                }
            };

            if let Err(err) = result {
                tracing::debug!(%remote_addr, error = ?err, "connection closed with error");
            }
        });
    }

    tracing::info!("stopped accepting connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn start(
        header_read_timeout: Duration,
    ) -> (SocketAddr, CancellationToken, TaskTracker, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/", get(|| async { "ok" }));
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let server = tokio::spawn(serve(
            listener,
            app,
            header_read_timeout,
            shutdown.clone(),
            tracker.clone(),
        ));
        (addr, shutdown, tracker, server)
    }

    #[tokio::test]
    async fn test_slow_headers_are_cut_off() {
        let (addr, shutdown, _tracker, _server) = start(Duration::from_millis(200)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        // Header block never terminated
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n")
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            let mut buf = Vec::new();
            let _ = stream.read_to_end(&mut buf).await;
        })
        .await;

        assert!(closed.is_ok(), "connection stayed open past the header read timeout");
        assert!(started.elapsed() >= Duration::from_millis(100));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_connections() {
        let (addr, shutdown, tracker, server) = start(Duration::from_secs(5)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 1024];
        let read = stream.read(&mut buf).await.unwrap();
        let response = String::from_utf8_lossy(&buf[..read]);
        assert!(response.starts_with("HTTP/1.1 200"));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("accept loop did not stop")
            .unwrap();

        tracker.close();
        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("kept-alive connection was not shut down");

        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest)).await;
        assert!(read.is_ok());
    }
}
