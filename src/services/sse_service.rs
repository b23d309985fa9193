use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::sse_events::{EVENT_HANDSHAKE, system_status_event},
    state::SharedState,
};

/// Everything a new SSE connection needs: the event feed, the degraded flag
/// and the greeting sent first.
pub struct Subscription {
    receiver: broadcast::Receiver<ServerEvent>,
    degraded: watch::Receiver<bool>,
    handshake: Option<ServerEvent>,
}

/// Subscribe to the shared match event stream.
pub fn subscribe(state: &SharedState) -> Subscription {
    let receiver = state.sse().subscribe();
    let mut degraded = state.degraded_watcher();
    let is_degraded = *degraded.borrow_and_update();

    let handshake = ServerEvent::json(
        Some(EVENT_HANDSHAKE.to_string()),
        &Handshake {
            stream: "matches".into(),
            message: "match stream connected".into(),
            degraded: is_degraded,
        },
    )
    .ok();

    Subscription {
        receiver,
        degraded,
        handshake,
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a subscription into an SSE response, forwarding events and
/// degraded-mode flips until the client disconnects.
pub fn to_sse_stream(subscription: Subscription) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let Subscription {
        mut receiver,
        mut degraded,
        handshake,
    } = subscription;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(handshake) = handshake {
            if tx.send(Ok(to_event(handshake))).await.is_err() {
                return;
            }
        }

        let mut watch_degraded = true;
        loop {
            let payload = tokio::select! {
                _ = tx.closed() => break,
                changed = degraded.changed(), if watch_degraded => {
                    if changed.is_err() {
                        watch_degraded = false;
                        continue;
                    }
                    let value = *degraded.borrow_and_update();
                    match system_status_event(value) {
                        Some(event) => event,
                        None => continue,
                    }
                }
                recv_result = receiver.recv() => match recv_result {
                    Ok(payload) => payload,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        // Skip lagged messages but keep the stream alive.
                        debug!(skipped, "SSE subscriber lagged");
                        continue;
                    }
                },
            };

            if tx.send(Ok(to_event(payload))).await.is_err() {
                break;
            }
        }

        info!("match SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn handshake_reports_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let subscription = subscribe(&state);

        let handshake = subscription.handshake.unwrap();
        assert_eq!(handshake.event.as_deref(), Some("handshake"));
        let value: serde_json::Value = serde_json::from_str(&handshake.data).unwrap();
        assert_eq!(value["degraded"], true);
        assert_eq!(value["stream"], "matches");
    }

    #[tokio::test]
    async fn subscription_sees_later_broadcasts() {
        let state = AppState::new(AppConfig::default());
        let mut subscription = subscribe(&state);

        state
            .sse()
            .broadcast(ServerEvent::json(Some("ping".to_string()), &1).unwrap());
        let event = subscription.receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("ping"));
    }
}
