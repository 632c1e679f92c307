use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::events::{Handshake, ServerEvent},
    state::{RoomId, SharedState},
};

/// Subscribe to a fan-out room.
pub fn subscribe(state: &SharedState, room: RoomId) -> broadcast::Receiver<ServerEvent> {
    state.fanout().subscribe(room)
}

/// Build the handshake event sent as the first element of a new stream.
pub async fn handshake(state: &SharedState, room: &RoomId) -> Option<ServerEvent> {
    let label = match room {
        RoomId::Session(id) => format!("session:{id}"),
        RoomId::User(id) => format!("user:{id}"),
    };

    ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            room: label,
            degraded: state.is_degraded().await,
        },
    )
    .ok()
}

/// Convert a broadcast receiver into an SSE response, forwarding the room's
/// events until the client disconnects.
pub fn to_sse_stream(
    room: RoomId,
    mut receiver: broadcast::Receiver<ServerEvent>,
    handshake: Option<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    if let Some(payload) = handshake {
        let _ = tx.try_send(Ok(to_event(payload)));
    }

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        let mut dropped: u64 = 0;
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Slow consumer: count what the buffer lost and
                            // keep the stream alive.
                            dropped += skipped;
                        }
                    }
                }
            }
        }

        if dropped > 0 {
            tracing::warn!(?room, dropped, "SSE subscriber lagged behind its room buffer");
        }
        tracing::info!(?room, "SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
