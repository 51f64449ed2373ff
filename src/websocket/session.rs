use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::SyncError;
use crate::services::sync_service;
use crate::state::AppState;
use crate::store::Subscription;
use crate::websocket::msg_broadcast_handler::handle_broadcast_message;
use crate::websocket::msg_edit_handler::handle_edit_message;

type WsSink = SplitSink<WebSocket, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Joined,
    Syncing,
    Active,
    Leaving,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Joined => "joined",
            SessionPhase::Syncing => "syncing",
            SessionPhase::Active => "active",
            SessionPhase::Leaving => "leaving",
            SessionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One participant's connection to a room, from join to teardown.
pub struct Session {
    session_id: Uuid,
    room_id: String,
    user_id: String,
    state: AppState,
    phase: SessionPhase,
}

impl Session {
    pub fn new(room_id: String, user_id: String, state: AppState) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            room_id,
            user_id,
            state,
            phase: SessionPhase::Connecting,
        }
    }

    fn enter(&mut self, phase: SessionPhase) {
        debug!(
            "Session {} ({} in room {}): {} -> {}",
            self.session_id, self.user_id, self.room_id, self.phase, phase
        );
        self.phase = phase;
    }

    /// Drive the session over an upgraded socket until the client goes away.
    pub async fn run(mut self, mut socket: WebSocket) {
        info!(
            "WebSocket connection established for room {} by user {} (session {})",
            self.room_id, self.user_id, self.session_id
        );

        if let Err(e) = self.state.membership.join(&self.room_id, &self.user_id).await {
            error!("Failed to join room {} for user {}: {}", self.room_id, self.user_id, e);
            if let Err(e) = socket.close().await {
                debug!("Error while closing websocket: {}", e);
            }
            self.enter(SessionPhase::Closed);
            return;
        }
        self.enter(SessionPhase::Joined);

        self.enter(SessionPhase::Syncing);
        let subscription = match self.sync(&mut socket).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("Initial sync failed for room {} (session {}): {}", self.room_id, self.session_id, e);
                self.enter(SessionPhase::Leaving);
                if let Err(e) = socket.close().await {
                    debug!("Error while closing websocket: {}", e);
                }
                self.leave_room().await;
                return;
            }
        };

        self.enter(SessionPhase::Active);
        let (sink, mut stream) = socket.split();
        let cancel = CancellationToken::new();
        let outbound = tokio::spawn(outbound_pipeline(
            sink,
            subscription,
            self.state.clone(),
            self.room_id.clone(),
            cancel.clone(),
        ));

        self.inbound_pipeline(&mut stream).await;

        self.enter(SessionPhase::Leaving);
        cancel.cancel();
        match outbound.await {
            Ok(mut sink) => {
                if let Err(e) = sink.close().await {
                    debug!("Error while closing websocket: {}", e);
                }
            }
            Err(e) => error!("Outbound task for session {} failed: {}", self.session_id, e),
        }
        self.leave_room().await;
    }

    /// Subscribe to the room, then send the replay batch as one frame.
    ///
    /// The subscription is taken first so no edit published while the
    /// batch is being built is missed.
    async fn sync(&self, socket: &mut WebSocket) -> Result<Subscription, SyncError> {
        let subscription = self.state.broadcast.subscribe(&self.room_id).await?;
        let batch = sync_service::initial_batch(&self.state, &self.room_id).await?;
        let frame = serde_json::to_vec(&batch)?;
        socket.send(Message::Binary(frame)).await?;
        info!("Sent {} replay messages to session {}", batch.len(), self.session_id);
        Ok(subscription)
    }

    /// Process inbound frames in arrival order until the connection ends.
    async fn inbound_pipeline(&self, stream: &mut SplitStream<WebSocket>) {
        while let Some(frame) = stream.next().await {
            let raw = match frame {
                Ok(Message::Binary(data)) => data,
                Ok(Message::Text(text)) => text.into_bytes(),
                Ok(Message::Close(_)) => {
                    info!("Session {} closed by peer", self.session_id);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => {
                    info!("Error while reading message for session {}: {}", self.session_id, e);
                    break;
                }
            };

            if let Err(e) = handle_edit_message(&raw, &self.room_id, &self.state).await {
                warn!("Dropped edit in room {} from session {}: {}", self.room_id, self.session_id, e);
            }
        }
    }

    /// Leave the room and collapse it if this was the last participant.
    /// Both steps always run.
    async fn leave_room(&mut self) {
        if let Err(e) = self.state.membership.leave(&self.room_id, &self.user_id).await {
            error!("Failed to leave room {} for user {}: {}", self.room_id, self.user_id, e);
        }
        match self.state.lifecycle.collapse_if_empty(&self.room_id).await {
            Ok(true) => info!("Room {} cleaned up after last participant left", self.room_id),
            Ok(false) => {}
            Err(e) => error!("Failed to clean room {}: {}", self.room_id, e),
        }
        self.enter(SessionPhase::Closed);
        info!("WebSocket connection terminated (session {})", self.session_id);
    }
}

/// Forward every published edit to the connection until cancelled.
///
/// Failed items are logged and dropped. The sink is handed back so the
/// session can close it.
async fn outbound_pipeline(
    mut sink: WsSink,
    mut subscription: Subscription,
    state: AppState,
    room_id: String,
    cancel: CancellationToken,
) -> WsSink {
    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => break,
            item = subscription.next() => match item {
                Some(raw) => raw,
                None => {
                    warn!("Subscription for room {} ended, no further live updates", room_id);
                    cancel.cancelled().await;
                    break;
                }
            },
        };

        let frame = match handle_broadcast_message(&raw, &room_id, &state.membership).await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to prepare broadcast for room {}: {}", room_id, e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Binary(frame)).await {
            warn!("Error while writing message for room {}: {}", room_id, e);
        }
    }
    sink
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BroadcastMessage, LogEntry, SeedData, SeedKey};
    use crate::routes::create_app;
    use crate::store::failing::FailingStore;
    use crate::store::KeySpace;
    use std::future::Future;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn spawn_server(state: AppState) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_app(state, None);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr, room: &str, user: &str) -> Client {
        let url = format!("ws://{}/project/{}/karte?userId={}", addr, room, user);
        let (client, _) = connect_async(url).await.unwrap();
        client
    }

    async fn next_batch(client: &mut Client) -> Vec<BroadcastMessage> {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("connection ended")
                .unwrap();
            match frame {
                WsMessage::Binary(data) => return serde_json::from_slice(&data).unwrap(),
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached in time");
    }

    /// Wait for the server to end the connection.
    async fn closed(client: &mut Client) {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for the connection to end");
            match frame {
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(other)) => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    fn failing_state() -> (Arc<FailingStore>, AppState) {
        let store = Arc::new(FailingStore::new());
        let state = AppState::new(store.clone(), KeySpace::default(), hello_seed());
        (store, state)
    }

    fn hello_seed() -> SeedData {
        SeedData::new(vec![SeedKey {
            key: "message".to_string(),
            entries: vec![LogEntry::new("hello", "seed")],
        }])
    }

    #[tokio::test]
    async fn test_two_participants_converge_and_room_is_cleaned() {
        let state = AppState::in_memory(hello_seed());
        let addr = spawn_server(state.clone()).await;

        // A joins an empty room and gets the seed
        let mut a = connect(addr, "demo", "A").await;
        let batch = next_batch(&mut a).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].content, "hello");
        assert_eq!(batch[0].user_ids, vec!["A"]);

        // B joins and sees the same single entry
        let mut b = connect(addr, "demo", "B").await;
        let batch = next_batch(&mut b).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].content, "hello");
        assert_eq!(batch[0].user_ids, vec!["A", "B"]);
        assert_eq!(state.membership.list("demo").await.unwrap(), vec!["A", "B"]);

        // A edits; both A and B receive it
        a.send(WsMessage::Text(r#"{"key":"msg","content":"hi","sentBy":"A"}"#.into()))
            .await
            .unwrap();
        let expected = vec![BroadcastMessage {
            key: "msg".to_string(),
            content: "hi".to_string(),
            sent_by: "A".to_string(),
            project_id: "demo".to_string(),
            user_ids: vec!["A".to_string(), "B".to_string()],
        }];
        assert_eq!(next_batch(&mut a).await, expected);
        assert_eq!(next_batch(&mut b).await, expected);

        // A leaves; the room survives while B remains
        a.close(None).await.unwrap();
        eventually(|| async { state.membership.list("demo").await.unwrap() == vec!["B"] }).await;
        assert_eq!(state.replay_log.read_all("demo", "msg").await.unwrap().len(), 1);

        // B leaves; the room is collapsed
        b.close(None).await.unwrap();
        eventually(|| async {
            state.membership.list("demo").await.unwrap().is_empty()
                && state.replay_log.read_all("demo", "msg").await.unwrap().is_empty()
                && state.replay_log.read_all("demo", "message").await.unwrap().is_empty()
        })
        .await;
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_end_session() {
        let state = AppState::in_memory(hello_seed());
        let addr = spawn_server(state.clone()).await;

        let mut a = connect(addr, "demo", "A").await;
        next_batch(&mut a).await;

        a.send(WsMessage::Text("this is not json".into())).await.unwrap();
        a.send(WsMessage::Binary(br#"{"key":"msg","content":"ok","sentBy":"A"}"#.to_vec().into()))
            .await
            .unwrap();

        let batch = next_batch(&mut a).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].content, "ok");
        assert_eq!(state.replay_log.read_all("demo", "msg").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_late_joiner_replays_history() {
        let state = AppState::in_memory(hello_seed());
        let addr = spawn_server(state.clone()).await;

        let mut a = connect(addr, "demo", "A").await;
        next_batch(&mut a).await;
        a.send(WsMessage::Text(r#"{"key":"msg","content":"first","sentBy":"A"}"#.into()))
            .await
            .unwrap();
        next_batch(&mut a).await;

        let mut b = connect(addr, "demo", "B").await;
        let batch = next_batch(&mut b).await;
        let contents: Vec<&str> = batch.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "first"]);
    }

    #[tokio::test]
    async fn test_missing_user_id_is_rejected_before_upgrade() {
        let state = AppState::in_memory(hello_seed());
        let addr = spawn_server(state.clone()).await;

        for url in [
            format!("ws://{}/project/demo/karte", addr),
            format!("ws://{}/project/demo/karte?userId=", addr),
        ] {
            match connect_async(url).await {
                Err(tungstenite::Error::Http(response)) => {
                    assert_eq!(response.status(), 400);
                }
                other => panic!("expected HTTP 400, got {:?}", other.map(|_| ())),
            }
        }
        assert!(state.membership.is_empty("demo").await.unwrap());
    }

    #[tokio::test]
    async fn test_room_id_with_separator_is_rejected_before_upgrade() {
        let state = AppState::in_memory(hello_seed());
        let addr = spawn_server(state.clone()).await;

        match connect_async(format!("ws://{}/project/a:data:b/karte?userId=A", addr)).await {
            Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 400),
            other => panic!("expected HTTP 400, got {:?}", other.map(|_| ())),
        }
        assert!(state.membership.is_empty("a:data:b").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_join_closes_without_sync() {
        let (store, state) = failing_state();
        store.fail("set_add", "demo:room");
        let addr = spawn_server(state.clone()).await;

        let mut a = connect(addr, "demo", "A").await;
        closed(&mut a).await;

        assert!(state.membership.is_empty("demo").await.unwrap());
        let calls = store.calls();
        assert!(!calls.contains(&"subscribe"));
        assert!(!calls.contains(&"list_push_if_absent"));
    }

    #[tokio::test]
    async fn test_failed_sync_closes_and_leaves() {
        let (store, state) = failing_state();
        store.fail("list_range_all", "demo:data:");
        let addr = spawn_server(state.clone()).await;

        let mut a = connect(addr, "demo", "A").await;
        closed(&mut a).await;

        eventually(|| async { store.calls().contains(&"set_remove") }).await;
        eventually(|| async { state.replay_log.indexed_keys("demo").await.unwrap().is_empty() }).await;
        assert!(state.membership.is_empty("demo").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_append_skips_publish_and_keeps_session() {
        let (store, state) = failing_state();
        store.fail("list_push", "demo:data:broken");
        let addr = spawn_server(state.clone()).await;

        let mut a = connect(addr, "demo", "A").await;
        next_batch(&mut a).await;

        a.send(WsMessage::Text(r#"{"key":"broken","content":"lost","sentBy":"A"}"#.into()))
            .await
            .unwrap();
        a.send(WsMessage::Text(r#"{"key":"msg","content":"kept","sentBy":"A"}"#.into()))
            .await
            .unwrap();

        let batch = next_batch(&mut a).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].key, "msg");
        assert_eq!(batch[0].content, "kept");
        assert!(state.replay_log.read_all("demo", "broken").await.unwrap().is_empty());
        assert_eq!(store.calls().iter().filter(|op| **op == "publish").count(), 1);
    }

    #[tokio::test]
    async fn test_failed_leave_still_checks_for_collapse() {
        let (store, state) = failing_state();
        store.fail("set_remove", "demo:room");
        let addr = spawn_server(state.clone()).await;

        let mut a = connect(addr, "demo", "A").await;
        next_batch(&mut a).await;
        a.close(None).await.unwrap();

        eventually(|| async {
            let calls = store.calls();
            match calls.iter().rposition(|op| *op == "set_remove") {
                Some(at) => calls[at..].contains(&"set_len"),
                None => false,
            }
        })
        .await;
        // The member could not be removed, so the room is kept
        assert_eq!(state.membership.list("demo").await.unwrap(), vec!["A"]);
        assert_eq!(state.replay_log.read_all("demo", "message").await.unwrap().len(), 1);
    }
}
