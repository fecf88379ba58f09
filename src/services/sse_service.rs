use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::sse::ServerEvent, error::ServiceError, services::sse_events, state::SharedState,
};

/// Subscribe to a session's event stream, returning the receiver and the
/// handshake to send first.
pub async fn subscribe_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, Option<ServerEvent>), ServiceError> {
    let session = state.session(session_id)?;
    // Subscribe before taking the snapshot so no transition falls between the two.
    let receiver = session.events().subscribe();
    let view = session.view().await;
    let handshake = sse_events::handshake_event(&view, state.is_degraded().await);
    info!(%session_id, "session SSE stream connected");
    Ok((receiver, handshake))
}

/// Convert a broadcast receiver into an SSE response, forwarding events until
/// the client disconnects or the session is dropped.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    handshake: Option<ServerEvent>,
    session_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(first) = handshake {
            if tx.send(Ok(to_event(first))).await.is_err() {
                return;
            }
        }

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
                        Err(RecvError::Closed) => {
                            debug!(%session_id, "session dropped; closing SSE stream");
                            break;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(%session_id, skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(%session_id, "session SSE stream disconnected");
    });

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
