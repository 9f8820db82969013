use super::server::{ACCEPT_BACKOFF, accept_failed};
use super::{Connection, Server};
use crate::broker::{Broker, SubscriberId};
use crate::config::BrokerSettings;
use crate::processor::CommandProcessor;
use crate::protocol::{DEFAULT_MAX_FRAME_LEN, ProtocolError, read_frame, write_frame};
use crate::utils::error::ConnectionError;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf, duplex};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

struct Harness {
    client: DuplexStream,
    handle: JoinHandle<Result<(), ConnectionError>>,
    subscriber: SubscriberId,
    broker: Arc<Broker>,
}

fn spawn_with(broker: Arc<Broker>, settings: BrokerSettings) -> Harness {
    let (client, server) = duplex(4096);
    let subscriber = SubscriberId::generate();
    let connection = Connection::new(
        server,
        subscriber.clone(),
        CommandProcessor::new(broker.clone()),
        &settings,
    );
    let handle = tokio::spawn(connection.run());
    Harness {
        client,
        handle,
        subscriber,
        broker,
    }
}

fn spawn_default() -> Harness {
    spawn_with(Arc::new(Broker::new()), BrokerSettings::default())
}

async fn roundtrip(client: &mut DuplexStream, request: &str) -> String {
    write_frame(client, request).await.unwrap();
    read_frame(client, DEFAULT_MAX_FRAME_LEN)
        .await
        .unwrap()
        .expect("connection closed before response")
}

#[tokio::test]
async fn test_request_response_loop() {
    let mut h = spawn_default();

    assert_eq!(roundtrip(&mut h.client, "SUBSCRIBE|app|news").await, "SUSCRITO_A|news");
    assert_eq!(roundtrip(&mut h.client, "RECEIVE|app|news").await, "EMPTY");
    assert!(h.broker.is_subscribed(&h.subscriber, "news"));
}

#[tokio::test]
async fn test_command_errors_keep_connection_open() {
    let mut h = spawn_default();

    assert_eq!(roundtrip(&mut h.client, "NOPE").await, "ERROR: Formato inválido");
    assert_eq!(
        roundtrip(&mut h.client, "FETCH|app|news").await,
        "ERROR: Comando desconocido"
    );
    assert_eq!(
        roundtrip(&mut h.client, "PUBLISH|app|news").await,
        "ERROR: Falta mensaje"
    );
    assert_eq!(roundtrip(&mut h.client, "SUBSCRIBE|app|news").await, "SUSCRITO_A|news");
}

#[tokio::test]
async fn test_pipelined_requests_answered_in_order() {
    let mut h = spawn_default();

    write_frame(&mut h.client, "SUBSCRIBE|app|a").await.unwrap();
    write_frame(&mut h.client, "SUBSCRIBE|app|a").await.unwrap();
    write_frame(&mut h.client, "UNSUBSCRIBE|app|a").await.unwrap();

    for expected in ["SUSCRITO_A|a", "YA_SUSCRITO_A|a", "DESUSCRITO_DE|a"] {
        let got = read_frame(&mut h.client, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        assert_eq!(got.as_deref(), Some(expected));
    }
}

#[tokio::test]
async fn test_clean_close_releases_subscriptions() {
    let mut h = spawn_default();
    roundtrip(&mut h.client, "SUBSCRIBE|app|one").await;
    roundtrip(&mut h.client, "SUBSCRIBE|app|two").await;
    assert_eq!(h.broker.topic_count(), 2);

    drop(h.client);

    h.handle.await.unwrap().unwrap();
    assert_eq!(h.broker.topic_count(), 0);
    assert!(h.broker.topics_of(&h.subscriber).is_empty());
}

#[tokio::test]
async fn test_zero_length_frame_closes_connection_and_releases() {
    let mut h = spawn_default();
    roundtrip(&mut h.client, "SUBSCRIBE|app|news").await;

    h.client.write_all(&0i32.to_le_bytes()).await.unwrap();

    let err = h.handle.await.unwrap().unwrap_err();
    assert!(err.is_protocol_violation());
    assert!(matches!(
        err,
        ConnectionError::Protocol(ProtocolError::InvalidLength(0))
    ));

    // No response is sent; the stream just ends.
    let next = read_frame(&mut h.client, DEFAULT_MAX_FRAME_LEN).await.unwrap();
    assert!(next.is_none());
    assert!(!h.broker.is_subscribed(&h.subscriber, "news"));
}

#[tokio::test]
async fn test_truncated_body_closes_connection() {
    let mut h = spawn_default();
    roundtrip(&mut h.client, "SUBSCRIBE|app|news").await;

    h.client.write_all(&32i32.to_le_bytes()).await.unwrap();
    h.client.write_all(b"SUBSCR").await.unwrap();
    h.client.shutdown().await.unwrap();

    let err = h.handle.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::Protocol(ProtocolError::Truncated { expected: 32 })
    ));
    assert_eq!(h.broker.topic_count(), 0);
}

#[tokio::test]
async fn test_oversized_frame_rejected() {
    let settings = BrokerSettings {
        max_frame_len: 8,
        ..BrokerSettings::default()
    };
    let mut h = spawn_with(Arc::new(Broker::new()), settings);

    write_frame(&mut h.client, "SUBSCRIBE|app|a-long-topic-name").await.unwrap();

    let err = h.handle.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::Protocol(ProtocolError::FrameTooLarge { max: 8, .. })
    ));
}

#[tokio::test]
async fn test_idle_timeout_closes_connection() {
    let settings = BrokerSettings {
        idle_timeout_secs: 1,
        ..BrokerSettings::default()
    };
    let mut h = spawn_with(Arc::new(Broker::new()), settings);
    roundtrip(&mut h.client, "SUBSCRIBE|app|news").await;

    let result = tokio::time::timeout(Duration::from_secs(5), h.handle)
        .await
        .expect("idle connection was not closed");
    let err = result.unwrap().unwrap_err();
    assert!(matches!(err, ConnectionError::IdleTimeout(_)));
    assert!(!err.is_protocol_violation());
    assert_eq!(h.broker.topic_count(), 0);
}

#[tokio::test]
async fn test_idle_timeout_does_not_cut_slow_body() {
    let settings = BrokerSettings {
        idle_timeout_secs: 1,
        ..BrokerSettings::default()
    };
    let mut h = spawn_with(Arc::new(Broker::new()), settings);

    let request = "SUBSCRIBE|app|news";
    h.client
        .write_all(&(request.len() as i32).to_le_bytes())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    h.client.write_all(request.as_bytes()).await.unwrap();

    let response = read_frame(&mut h.client, DEFAULT_MAX_FRAME_LEN).await.unwrap();
    assert_eq!(response.as_deref(), Some("SUSCRITO_A|news"));
    assert!(h.broker.is_subscribed(&h.subscriber, "news"));
}

/// Stream whose first read panics inside the connection task.
struct PanickingStream;

impl AsyncRead for PanickingStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        panic!("stream fault");
    }
}

impl AsyncWrite for PanickingStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_panicking_task_still_releases() {
    let broker = Arc::new(Broker::new());
    let subscriber = SubscriberId::generate();
    broker.subscribe(&subscriber, "news");

    let connection = Connection::new(
        PanickingStream,
        subscriber.clone(),
        CommandProcessor::new(broker.clone()),
        &BrokerSettings::default(),
    );
    let err = tokio::spawn(connection.run()).await.unwrap_err();

    assert!(err.is_panic());
    assert!(!broker.is_subscribed(&subscriber, "news"));
    assert_eq!(broker.topic_count(), 0);
}

#[tokio::test]
async fn test_server_clamps_connection_limit() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let settings = BrokerSettings {
        max_connections: usize::MAX,
        ..BrokerSettings::default()
    };

    let server = Server::from_listener(listener, Arc::new(Broker::new()), settings);
    assert_eq!(server.connection_limit(), Semaphore::MAX_PERMITS);
}

#[tokio::test]
async fn test_accept_error_backs_off() {
    let error = io::Error::other("too many open files");
    let started = tokio::time::Instant::now();
    accept_failed(&error).await;
    assert!(started.elapsed() >= ACCEPT_BACKOFF);
}

#[tokio::test]
async fn test_aborted_task_still_releases() {
    let mut h = spawn_default();
    roundtrip(&mut h.client, "SUBSCRIBE|app|news").await;

    h.handle.abort();
    assert!(h.handle.await.unwrap_err().is_cancelled());
    assert!(!h.broker.is_subscribed(&h.subscriber, "news"));
}

#[tokio::test]
async fn test_teardown_of_one_connection_leaves_others_intact() {
    let broker = Arc::new(Broker::new());
    let mut a = spawn_with(broker.clone(), BrokerSettings::default());
    let mut b = spawn_with(broker.clone(), BrokerSettings::default());

    roundtrip(&mut a.client, "SUBSCRIBE|a|news").await;
    roundtrip(&mut b.client, "SUBSCRIBE|b|news").await;

    a.client.write_all(&(-1i32).to_le_bytes()).await.unwrap();
    assert!(a.handle.await.unwrap().is_err());

    assert_eq!(broker.subscribers_of("news"), vec![b.subscriber.clone()]);
    assert_eq!(roundtrip(&mut b.client, "PUBLISH|b|news|x").await, "PUBLICADO_EN|news");
    assert_eq!(roundtrip(&mut b.client, "RECEIVE|b|news").await, "EMPTY");
}
