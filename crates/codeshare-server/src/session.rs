//! One WebSocket connection attached to a room.
//!
//! A session runs two tasks: a read loop that feeds frames into the room and
//! a write loop that drains the session's outbound queue onto the socket and
//! pings the peer on a fixed interval. A peer that sends nothing, not even a
//! pong, for two intervals is dropped. When either side ends the session
//! leaves the room and the remaining members get a fresh user list.

use axum::body::Bytes;
use axum::extract::ws::Message;
use codeshare_core::hub::{dispatch_inbound, outbound_queue, ClientId, Inbox};
use codeshare_core::Room;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use uuid::Uuid;

/// How long a finished reader waits for the writer to flush and close.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub queue_capacity: usize,
    pub keepalive_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            keepalive_interval: Duration::from_secs(5),
        }
    }
}

/// Why the write loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// The room closed the queue (unregistered or evicted).
    QueueClosed,
    /// A frame or ping could not be written.
    SendFailed,
    /// Nothing arrived from the peer for two keep-alive intervals.
    PeerUnresponsive,
}

/// Serve one connection until either direction ends.
pub async fn run_session<W, R, E>(
    sink: W,
    stream: R,
    room: Arc<Room>,
    username: String,
    settings: SessionSettings,
) where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let id = Uuid::new_v4();
    let (outbox, inbox) = outbound_queue(settings.queue_capacity);
    room.register(id, &username, outbox);
    room.broadcast_user_list();

    let (seen_tx, seen_rx) = watch::channel(Instant::now());
    let mut writer = tokio::spawn(write_loop(
        sink,
        inbox,
        settings.keepalive_interval,
        seen_rx,
        id,
    ));
    let mut reader = tokio::spawn(read_loop(
        stream,
        room.clone(),
        username.clone(),
        seen_tx,
        id,
    ));

    tokio::select! {
        _ = &mut reader => {
            room.unregister(id);
            // Unregistering closed the queue, so the writer flushes and sends Close.
            if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
                writer.abort();
            }
        }
        exit = &mut writer => {
            log::debug!("Writer for {} stopped: {:?}", username, exit);
            reader.abort();
            room.unregister(id);
        }
    }

    room.broadcast_user_list();
    log::info!("Session ended for {} in room {}", username, room.code());
}

async fn read_loop<R, E>(
    mut stream: R,
    room: Arc<Room>,
    username: String,
    last_seen: watch::Sender<Instant>,
    id: ClientId,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(message) = stream.next().await {
        if message.is_ok() {
            last_seen.send_replace(Instant::now());
        }
        match message {
            Ok(Message::Text(text)) => {
                dispatch_inbound(&room, &username, text.as_str());
            }
            Ok(Message::Binary(data)) => {
                log::debug!("Ignoring {} byte binary frame from {}", data.len(), username);
            }
            Ok(Message::Close(_)) => {
                log::debug!("Client {} ({}) sent close frame", username, id);
                break;
            }
            // Pings are answered by the transport; pongs only refresh `last_seen`.
            Ok(_) => continue,
            Err(e) => {
                log::warn!("WebSocket read error for {}: {}", username, e);
                break;
            }
        }
    }
}

async fn write_loop<W>(
    mut sink: W,
    mut inbox: Inbox,
    keepalive: Duration,
    last_seen: watch::Receiver<Instant>,
    id: ClientId,
) -> WriterExit
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            frame = inbox.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(Message::Text(frame.as_ref().into())).await {
                        log::debug!("WebSocket send to {} failed: {}", id, e);
                        break WriterExit::SendFailed;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break WriterExit::QueueClosed;
                }
            },
            _ = ticker.tick() => {
                let silent_for = last_seen.borrow().elapsed();
                if silent_for > keepalive * 2 {
                    log::info!("Client {} silent for {:?}, closing", id, silent_for);
                    break WriterExit::PeerUnresponsive;
                }
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    log::debug!("Keepalive ping to {} failed: {}", id, e);
                    break WriterExit::SendFailed;
                }
            }
        }
    };

    let _ = sink.close().await;
    exit
}
