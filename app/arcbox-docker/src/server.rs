//! Docker API server.
//!
//! Serves the router over a Unix socket. The accept loop is tied to the
//! runtime's shutdown: once [`Runtime::shutdown`] fires, no new connections
//! are accepted, in-flight `/system/df` requests observe cancellation, and
//! the socket file is removed.

use crate::api::create_router;
use crate::error::{DockerError, Result};
use arcbox_core::Runtime;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tower::Service;
use tower_http::trace::TraceLayer;

/// Docker API server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Unix socket path.
    pub socket_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".arcbox")
                .join("docker.sock"),
        }
    }
}

/// Docker API server.
pub struct DockerApiServer {
    config: ServerConfig,
    runtime: Arc<Runtime>,
}

impl DockerApiServer {
    /// Creates a new Docker API server.
    #[must_use]
    pub const fn new(config: ServerConfig, runtime: Arc<Runtime>) -> Self {
        Self { config, runtime }
    }

    /// Returns the socket path.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Runs the server until the runtime shuts down.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or accepting fails.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        tracing::info!(socket = %self.config.socket_path.display(), "Docker API server listening");

        let result = accept_loop(
            listener,
            create_router(Arc::clone(&self.runtime)),
            self.runtime.request_token(),
        )
        .await;

        if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to remove socket {}: {}",
                    self.config.socket_path.display(),
                    e
                );
            }
        }
        result
    }

    fn bind(&self) -> Result<UnixListener> {
        let path = &self.config.socket_path;
        // Stale socket from a previous run.
        let _ = std::fs::remove_file(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DockerError::Server(format!(
                    "failed to create socket directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        UnixListener::bind(path).map_err(|e| {
            DockerError::Server(format!("failed to bind {}: {e}", path.display()))
        })
    }
}

async fn accept_loop(
    listener: UnixListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router.layer(TraceLayer::new_for_http());

    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => {
                accepted.map_err(|e| DockerError::Server(e.to_string()))?.0
            }
            () = shutdown.cancelled() => {
                tracing::info!("Docker API server stopped");
                return Ok(());
            }
        };
        tokio::spawn(serve_connection(stream, app.clone()));
    }
}

async fn serve_connection(stream: UnixStream, app: Router) {
    let service = hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
        app.clone().call(request)
    });

    if let Err(err) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        if !is_client_disconnect(&err) {
            tracing::error!("Error serving connection: {}", err);
        }
    }
}

/// Errors caused by the peer going away mid-request, e.g. `docker system df`
/// being interrupted.
fn is_client_disconnect(err: &hyper::Error) -> bool {
    if err.is_incomplete_message() || err.is_canceled() {
        return true;
    }
    let message = err.to_string().to_lowercase();
    message.contains("connection reset") || message.contains("broken pipe")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcbox_core::Config;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn server(tmp: &TempDir, socket_path: PathBuf) -> (Arc<Runtime>, DockerApiServer) {
        let config = Config {
            data_dir: tmp.path().join("data"),
            ..Default::default()
        };
        let runtime = Arc::new(Runtime::new(config).unwrap());
        let server = DockerApiServer::new(ServerConfig { socket_path }, Arc::clone(&runtime));
        (runtime, server)
    }

    async fn wait_for_socket(path: &Path) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !path.exists() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("socket never appeared");
    }

    #[tokio::test]
    async fn serves_disk_usage_over_unix_socket_until_shutdown() {
        let tmp = TempDir::new().unwrap();
        let (runtime, server) = server(&tmp, tmp.path().join("run").join("docker.sock"));
        let socket = server.socket_path().to_path_buf();
        let handle = tokio::spawn(async move { server.run().await });
        wait_for_socket(&socket).await;

        let mut stream = UnixStream::connect(&socket).await.unwrap();
        stream
            .write_all(b"GET /system/df?type=volume HTTP/1.1\r\nHost: docker\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.contains(r#"{"Volumes":[]}"#), "{response}");

        runtime.shutdown();
        handle.await.unwrap().unwrap();
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn bind_fails_when_parent_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let (_runtime, server) = server(&tmp, blocker.join("docker.sock"));

        let err = server.run().await.unwrap_err();
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
