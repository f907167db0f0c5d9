//! Relay server listener
//!
//! Binds the HTTP listener, mounts the upgrade route and ties the engine's
//! lifecycle to the server's.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::engine::Engine;
use crate::error::Result;
use crate::server::config::RelayConfig;
use crate::server::upgrade::upgrade_handler;

/// WebSocket relay server
pub struct RelayServer {
    config: RelayConfig,
    engine: Arc<Engine>,
    extra_routes: Option<Router>,
}

impl RelayServer {
    /// Create a new server with its own engine
    pub fn new(config: RelayConfig) -> Self {
        let engine = Engine::with_config(config.engine.clone());
        Self::with_engine(config, engine)
    }

    /// Create a server around an existing engine
    pub fn with_engine(config: RelayConfig, engine: Arc<Engine>) -> Self {
        Self {
            config,
            engine,
            extra_routes: None,
        }
    }

    /// Serve additional routes (static assets, health checks) alongside the relay route
    pub fn merge(mut self, routes: Router) -> Self {
        self.extra_routes = Some(match self.extra_routes.take() {
            Some(existing) => existing.merge(routes),
            None => routes,
        });
        self
    }

    /// Get a reference to the engine
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Router with the upgrade route and any merged routes
    pub fn router(&self) -> Router {
        let relay = Router::new()
            .route(&self.config.path, get(upgrade_handler))
            .with_state(Arc::clone(&self.engine));

        match &self.extra_routes {
            Some(extra) => relay.merge(extra.clone()),
            None => relay,
        }
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// Starts the engine if it is not running. On shutdown the engine is
    /// stopped first, which closes every subscriber.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;

        if let Err(e) = self.engine.start() {
            if !self.engine.is_running() {
                return Err(e);
            }
        }

        tracing::info!(addr = %addr, path = %self.config.path, "Relay listening");

        let engine = Arc::clone(&self.engine);
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                engine.stop().await;
            })
            .await;

        // Covers a serve error that skipped the shutdown future
        self.engine.stop().await;

        result.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout, Instant};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    use super::*;
    use crate::error::UPGRADE_FAILED_BODY;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    struct TestServer {
        addr: SocketAddr,
        engine: Arc<Engine>,
        shutdown: Option<oneshot::Sender<()>>,
        task: JoinHandle<Result<()>>,
    }

    impl TestServer {
        async fn start(config: RelayConfig) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = RelayServer::new(config);
            let engine = Arc::clone(server.engine());
            let (tx, rx) = oneshot::channel();

            let task = tokio::spawn(async move {
                server
                    .serve(listener, async move {
                        let _ = rx.await;
                    })
                    .await
            });

            Self {
                addr,
                engine,
                shutdown: Some(tx),
                task,
            }
        }

        async fn connect(&self) -> Client {
            let url = format!("ws://{}/ws", self.addr);
            let (client, _) = connect_async(url).await.unwrap();
            client
        }

        async fn stop(mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
            timeout(Duration::from_secs(5), self.task)
                .await
                .expect("server did not shut down")
                .unwrap()
                .unwrap();
        }
    }

    async fn wait_for_subscribers(engine: &Engine, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.subscriber_count().await != expected {
            assert!(
                Instant::now() < deadline,
                "expected {} subscribers, have {}",
                expected,
                engine.subscriber_count().await
            );
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn next_data(client: &mut Client) -> Message {
        loop {
            let message = timeout(Duration::from_secs(2), client.next())
                .await
                .expect("timed out waiting for frame")
                .expect("connection ended")
                .expect("read failed");

            if message.is_text() || message.is_binary() {
                return message;
            }
        }
    }

    #[tokio::test]
    async fn test_hello_world() {
        let server = TestServer::start(RelayConfig::default()).await;
        let sink = server.engine.sink();

        let mut first = server.connect().await;
        wait_for_subscribers(&server.engine, 1).await;

        assert_eq!(sink.write(b"hello").await.unwrap(), 5);
        let message = next_data(&mut first).await;
        assert!(message.is_text());
        assert_eq!(message.into_data(), Bytes::from_static(b"hello"));

        let mut second = server.connect().await;
        wait_for_subscribers(&server.engine, 2).await;

        sink.write(b"world").await.unwrap();
        assert_eq!(next_data(&mut first).await.into_data(), Bytes::from_static(b"world"));
        // Joined after "hello", so "world" is the first thing it sees
        assert_eq!(next_data(&mut second).await.into_data(), Bytes::from_static(b"world"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_order_preserved_over_websocket() {
        let server = TestServer::start(RelayConfig::default()).await;
        let sink = server.engine.sink();
        let mut client = server.connect().await;
        wait_for_subscribers(&server.engine, 1).await;

        for i in 0..50 {
            sink.write(format!("{{\"seq\":{}}}", i).as_bytes()).await.unwrap();
        }

        for i in 0..50 {
            let expected = format!("{{\"seq\":{}}}", i);
            assert_eq!(next_data(&mut client).await.into_data(), Bytes::from(expected));
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn test_non_utf8_record_arrives_as_binary() {
        let server = TestServer::start(RelayConfig::default()).await;
        let mut client = server.connect().await;
        wait_for_subscribers(&server.engine, 1).await;

        server.engine.sink().write(&[0xff, 0x00, 0xfe]).await.unwrap();

        let message = next_data(&mut client).await;
        assert!(message.is_binary());
        assert_eq!(message.into_data(), Bytes::from_static(&[0xff, 0x00, 0xfe]));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_removed() {
        let server = TestServer::start(RelayConfig::default()).await;
        let sink = server.engine.sink();

        let mut leaving = server.connect().await;
        let mut staying = server.connect().await;
        wait_for_subscribers(&server.engine, 2).await;

        leaving.close(None).await.unwrap();
        wait_for_subscribers(&server.engine, 1).await;

        // A later fan-out skips the departed subscriber without error
        sink.write(b"still here").await.unwrap();
        assert_eq!(
            next_data(&mut staying).await.into_data(),
            Bytes::from_static(b"still here")
        );

        let stats = server.engine.stats().snapshot();
        assert_eq!(stats.subscribers_connected, 2);
        assert_eq!(stats.subscribers_disconnected, 1);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_dropped_client_is_removed() {
        let server = TestServer::start(RelayConfig::default()).await;
        let client = server.connect().await;
        wait_for_subscribers(&server.engine, 1).await;

        drop(client);
        wait_for_subscribers(&server.engine, 0).await;

        server.stop().await;
    }

    #[tokio::test]
    async fn test_upgrade_failure_returns_500() {
        let server = TestServer::start(RelayConfig::default()).await;

        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        stream
            .write_all(b"GET /ws HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        timeout(Duration::from_secs(2), stream.read_to_end(&mut response))
            .await
            .unwrap()
            .unwrap();
        let response = String::from_utf8_lossy(&response);

        assert!(response.starts_with("HTTP/1.1 500"), "got: {}", response);
        assert!(response.ends_with(UPGRADE_FAILED_BODY), "got: {}", response);
        assert_eq!(server.engine.subscriber_count().await, 0);
        assert_eq!(server.engine.stats().snapshot().subscribers_connected, 0);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscribers() {
        let server = TestServer::start(RelayConfig::default()).await;
        let mut client = server.connect().await;
        wait_for_subscribers(&server.engine, 1).await;

        let engine = Arc::clone(&server.engine);
        server.stop().await;

        assert_eq!(engine.subscriber_count().await, 0);
        assert!(!engine.is_running());

        // The client sees a close frame or the end of the stream
        let ended = timeout(Duration::from_secs(2), async {
            loop {
                match client.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(ended.is_ok());
    }

    #[tokio::test]
    async fn test_custom_path_and_extra_routes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = RelayServer::new(RelayConfig::default().path("/logs"))
            .merge(Router::new().route("/health", get(|| async { "ok" })));
        let engine = Arc::clone(server.engine());
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = rx.await;
                })
                .await
        });

        let (mut client, _) = connect_async(format!("ws://{}/logs", addr)).await.unwrap();
        wait_for_subscribers(&engine, 1).await;
        engine.sink().write(b"on custom path").await.unwrap();
        assert_eq!(
            next_data(&mut client).await.into_data(),
            Bytes::from_static(b"on custom path")
        );

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 200"));

        client.send(Message::Close(None)).await.unwrap();
        let _ = tx.send(());
        task.await.unwrap().unwrap();
    }
}
