//! WebSocket transport against a local cable-style server.

use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use pubsub_cable::{Client, ConnectionState, SubscribeOptions};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

/// Accepts one connection, greets it, confirms every subscription and
/// forwards received frames. Closes after `close_after` frames if set.
async fn serve(
    listener: TcpListener,
    frames: mpsc::UnboundedSender<Value>,
    close_after: Option<usize>,
) -> anyhow::Result<()> {
    let (stream, _) = listener.accept().await?;
    let mut ws = tokio_tungstenite::accept_async(stream).await?;
    ws.send(Message::Text(json!({"type": "welcome"}).to_string().into()))
        .await?;

    let mut received = 0;
    while let Some(message) = ws.next().await {
        let Message::Text(text) = message? else {
            continue;
        };
        let frame: Value = serde_json::from_str(text.as_str())?;
        frames.send(frame.clone())?;
        received += 1;

        if frame["command"] == "subscribe" {
            let confirm = json!({
                "identifier": frame["identifier"].clone(),
                "type": "confirm_subscription"
            });
            ws.send(Message::Text(confirm.to_string().into())).await?;
        }

        if close_after == Some(received) {
            ws.close(None).await?;
            break;
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn subscribe_confirm_then_message() -> anyhow::Result<()> {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve(listener, frames_tx, None));

    let client = Client::builder()
        .socket_url(format!("ws://{addr}/cable"))
        .build()?;
    let event_loop = client.spawn_loop()?;

    let (welcome_tx, mut welcome_rx) = mpsc::unbounded_channel();
    client.bus().subscribe(
        "socket.message.welcome",
        move |_, _| {
            let _ = welcome_tx.send(());
        },
        SubscribeOptions::new(),
    )?;

    client.connect()?;
    client.subscribe_channel("rooms", Value::Null)?;
    client.message("rooms", json!({"action": "ping"}))?;

    timeout(WAIT, welcome_rx.recv())
        .await?
        .context("welcome frame")?;

    let first = timeout(WAIT, frames_rx.recv()).await?.context("subscribe frame")?;
    assert_eq!(first["command"], "subscribe");
    assert_eq!(first["identifier"], "{\"channel\":\"rooms\"}");

    let second = timeout(WAIT, frames_rx.recv()).await?.context("message frame")?;
    assert_eq!(second["command"], "message");
    assert_eq!(second["data"], "{\"action\":\"ping\"}");

    client.shutdown();
    timeout(WAIT, server).await???;
    timeout(WAIT, event_loop).await??;
    Ok(())
}

#[tokio::test]
async fn server_close_is_published() -> anyhow::Result<()> {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (frames_tx, _frames_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve(listener, frames_tx, Some(1)));

    let client = Client::builder()
        .socket_url(format!("ws://{addr}/cable"))
        .build()?;
    let _event_loop = client.spawn_loop()?;

    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
    client.bus().subscribe(
        "socket.close",
        move |_, _| {
            let _ = closed_tx.send(());
        },
        SubscribeOptions::new(),
    )?;

    client.connect()?;
    client.subscribe_channel("rooms", Value::Null)?;

    timeout(WAIT, closed_rx.recv()).await?.context("close event")?;
    assert_eq!(client.session().state(), ConnectionState::Closed);
    assert!(!client.session().is_subscribed("rooms"));

    timeout(WAIT, server).await???;
    Ok(())
}

#[tokio::test]
async fn unreachable_server_reports_error_and_close() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = Client::builder()
        .socket_url(format!("ws://{addr}/cable"))
        .build()?;
    let _event_loop = client.spawn_loop()?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    for topic in ["socket.error", "socket.close"] {
        let tx = events_tx.clone();
        client.bus().subscribe(
            topic,
            move |topic, _| {
                let _ = tx.send(topic.to_string());
            },
            SubscribeOptions::new().with_sync(),
        )?;
    }

    client.connect()?;

    let first = timeout(WAIT, events_rx.recv()).await?.context("error event")?;
    let second = timeout(WAIT, events_rx.recv()).await?.context("close event")?;
    assert_eq!((first.as_str(), second.as_str()), ("socket.error", "socket.close"));
    assert_eq!(client.session().state(), ConnectionState::Closed);
    Ok(())
}
