use super::{ConnectionRepository, RoomRepository};
use crate::config::RelayConfig;
use crate::model::{
    CallEvent, ConnectionId, Departure, JoinPolicy, RelayError, RoomId, ServerEvent,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Routes signaling messages between participants.
///
/// Every outbound message is addressed to exactly one connection. Delivery
/// is fire-and-forget: nothing is buffered, retried, reordered or
/// deduplicated here. Per-pair ordering comes from each channel's own
/// ordered queue.
#[derive(Clone)]
pub struct RelayEngine {
    connection_repo: Arc<dyn ConnectionRepository>,
    room_repo: Arc<dyn RoomRepository>,
    join_policy: JoinPolicy,
    notify_peer_left: bool,
    notify_unreachable: bool,
}

impl RelayEngine {
    pub fn new(
        connection_repo: Arc<dyn ConnectionRepository>,
        room_repo: Arc<dyn RoomRepository>,
        config: &RelayConfig,
    ) -> Self {
        RelayEngine {
            connection_repo,
            room_repo,
            join_policy: config.join_policy,
            notify_peer_left: config.notify_peer_left,
            notify_unreachable: config.notify_unreachable,
        }
    }

    /// Add the participant to a room, acknowledge to it, and announce it to
    /// each member that was already there.
    #[instrument(skip(self, label))]
    pub async fn handle_join(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        label: Option<String>,
    ) -> Result<(), RelayError> {
        let outcome = self
            .room_repo
            .join_room(connection_id, room_id, label.clone(), self.join_policy)
            .await?;
        info!(
            room_id = %outcome.room_id,
            label = ?label,
            existing_members = outcome.members.len(),
            "Participant joined room"
        );

        if let Some(departure) = outcome.departure {
            self.announce_departure(&departure).await;
        }

        self.deliver_or_log(
            connection_id,
            ServerEvent::RoomJoined {
                email: label.clone(),
                room: outcome.room_id,
            },
        )
        .await;

        for member in outcome.members {
            self.deliver_or_log(
                member.connection_id,
                ServerEvent::UserJoined {
                    email: label.clone(),
                    id: connection_id,
                },
            )
            .await;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn handle_leave(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<RoomId>, RelayError> {
        let departure = self.room_repo.leave_room(connection_id).await?;
        match departure {
            Some(departure) => {
                info!(room_id = %departure.room_id, "Participant left room");
                self.announce_departure(&departure).await;
                Ok(Some(departure.room_id))
            }
            None => {
                debug!("Leave requested outside of any room");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, offer))]
    pub async fn handle_offer(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        offer: Value,
    ) -> Result<(), RelayError> {
        self.relay(from, to, ServerEvent::IncomingCall { from, offer })
            .await?;
        self.track(from, CallEvent::OfferSent { to }).await;
        self.track(to, CallEvent::OfferReceived { from }).await;
        Ok(())
    }

    #[instrument(skip(self, ans))]
    pub async fn handle_answer(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        ans: Value,
    ) -> Result<(), RelayError> {
        self.relay(from, to, ServerEvent::CallAccepted { from, ans })
            .await?;
        self.track(from, CallEvent::AnswerSent { to }).await;
        self.track(to, CallEvent::AnswerReceived { from }).await;
        Ok(())
    }

    #[instrument(skip(self, candidate))]
    pub async fn handle_candidate(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        candidate: Value,
    ) -> Result<(), RelayError> {
        self.relay(from, to, ServerEvent::Candidate { from, candidate })
            .await
    }

    /// Tell the remaining members that someone left, when enabled.
    pub async fn announce_departure(&self, departure: &Departure) {
        if !self.notify_peer_left {
            return;
        }
        for member in &departure.remaining {
            self.deliver_or_log(
                *member,
                ServerEvent::UserLeft {
                    email: departure.label.clone(),
                    id: departure.connection_id,
                },
            )
            .await;
        }
    }

    /// Deliver a single event to one connection.
    pub async fn send_event(&self, to: ConnectionId, event: ServerEvent) -> Result<(), RelayError> {
        let connection = self
            .connection_repo
            .get_connection(to)
            .await?
            .filter(|connection| !connection.is_closed())
            .ok_or(RelayError::UnknownTarget(to))?;
        connection.deliver(&event).await?;
        debug!(%to, event = event.name(), "Delivered event");
        Ok(())
    }

    async fn relay(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), RelayError> {
        match self.send_event(to, event).await {
            Err(RelayError::UnknownTarget(target)) => {
                if self.notify_unreachable {
                    self.deliver_or_log(from, ServerEvent::TargetUnreachable { to: target })
                        .await;
                }
                Err(RelayError::UnknownTarget(target))
            }
            other => other,
        }
    }

    async fn deliver_or_log(&self, to: ConnectionId, event: ServerEvent) {
        let name = event.name();
        if let Err(e) = self.send_event(to, event).await {
            warn!(%to, event = name, error = %e, "Dropped outbound event");
        }
    }

    async fn track(&self, connection_id: ConnectionId, event: CallEvent) {
        match self.room_repo.record_call_event(connection_id, event).await {
            Ok(Some(transition)) if !transition.expected => {
                warn!(
                    %connection_id,
                    previous = ?transition.previous,
                    next = ?transition.next,
                    "Unexpected call state transition"
                );
            }
            Ok(Some(transition)) => {
                debug!(%connection_id, state = ?transition.next, "Call state updated");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(%connection_id, error = %e, "Failed to record call state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CallState;
    use crate::server::{Connection, MemoryStorage};
    use axum::extract::ws::Message;
    use serde_json::json;
    use tokio::sync::mpsc::{channel, Receiver};

    struct Harness {
        storage: Arc<MemoryStorage>,
        relay: RelayEngine,
    }

    impl Harness {
        fn new(config: RelayConfig) -> Self {
            let storage = Arc::new(MemoryStorage::new());
            let relay = RelayEngine::new(storage.clone(), storage.clone(), &config);
            Harness { storage, relay }
        }

        async fn connect(&self, n: u128) -> (ConnectionId, Receiver<Message>) {
            let id = ConnectionId::from_u128(n);
            let (tx, rx) = channel(16);
            self.storage
                .add_connection(Connection::new(id, tx))
                .await
                .unwrap();
            self.storage.register_participant(id).await.unwrap();
            (id, rx)
        }
    }

    fn drain(rx: &mut Receiver<Message>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                events.push(serde_json::from_str(&text).unwrap());
            }
        }
        events
    }

    #[tokio::test]
    async fn test_first_join_only_acknowledges() {
        let harness = Harness::new(RelayConfig::default());
        let (a, mut rx_a) = harness.connect(1).await;

        harness
            .relay
            .handle_join(a, "r1".to_string(), Some("a@x".to_string()))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx_a),
            vec![ServerEvent::RoomJoined {
                email: Some("a@x".to_string()),
                room: "r1".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_join_announces_to_each_existing_member_once() {
        let harness = Harness::new(RelayConfig::default());
        let (a, mut rx_a) = harness.connect(1).await;
        let (b, mut rx_b) = harness.connect(2).await;
        let (p, mut rx_p) = harness.connect(3).await;

        harness.relay.handle_join(a, "r1".to_string(), None).await.unwrap();
        harness.relay.handle_join(b, "r1".to_string(), None).await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        harness
            .relay
            .handle_join(p, "r1".to_string(), Some("p@x".to_string()))
            .await
            .unwrap();

        let announcement = ServerEvent::UserJoined {
            email: Some("p@x".to_string()),
            id: p,
        };
        assert_eq!(drain(&mut rx_a), vec![announcement.clone()]);
        assert_eq!(drain(&mut rx_b), vec![announcement]);

        let own = drain(&mut rx_p);
        assert_eq!(own.len(), 1);
        assert!(matches!(own[0], ServerEvent::RoomJoined { .. }));
    }

    #[tokio::test]
    async fn test_join_second_room_rejected_by_default() {
        let harness = Harness::new(RelayConfig::default());
        let (a, mut rx_a) = harness.connect(1).await;

        harness.relay.handle_join(a, "r1".to_string(), None).await.unwrap();
        drain(&mut rx_a);

        let result = harness.relay.handle_join(a, "r2".to_string(), None).await;
        assert!(matches!(result, Err(RelayError::AlreadyInRoom { .. })));
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn test_join_transfer_notifies_old_room_when_enabled() {
        let config = RelayConfig::default()
            .with_join_policy(JoinPolicy::Transfer)
            .with_peer_left_notification(true);
        let harness = Harness::new(config);
        let (a, _rx_a) = harness.connect(1).await;
        let (b, mut rx_b) = harness.connect(2).await;

        harness.relay.handle_join(b, "r1".to_string(), None).await.unwrap();
        harness.relay.handle_join(a, "r1".to_string(), None).await.unwrap();
        drain(&mut rx_b);

        harness.relay.handle_join(a, "r2".to_string(), None).await.unwrap();
        assert_eq!(
            drain(&mut rx_b),
            vec![ServerEvent::UserLeft { email: None, id: a }]
        );
        assert_eq!(
            harness.storage.room_of(a).await.unwrap(),
            Some("r2".to_string())
        );
    }

    #[tokio::test]
    async fn test_offer_is_addressed_with_server_identity() {
        let harness = Harness::new(RelayConfig::default());
        let (a, mut rx_a) = harness.connect(1).await;
        let (b, mut rx_b) = harness.connect(2).await;

        harness
            .relay
            .handle_offer(a, b, json!({"sdp": "O1"}))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx_b),
            vec![ServerEvent::IncomingCall {
                from: a,
                offer: json!({"sdp": "O1"}),
            }]
        );
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn test_answer_is_forwarded_to_caller() {
        let harness = Harness::new(RelayConfig::default());
        let (a, mut rx_a) = harness.connect(1).await;
        let (b, _rx_b) = harness.connect(2).await;
        harness.relay.handle_join(a, "r1".to_string(), None).await.unwrap();
        harness.relay.handle_join(b, "r1".to_string(), None).await.unwrap();
        drain(&mut rx_a);

        harness
            .relay
            .handle_offer(a, b, json!({"sdp": "O1"}))
            .await
            .unwrap();
        harness
            .relay
            .handle_answer(b, a, json!({"sdp": "A1"}))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx_a),
            vec![ServerEvent::CallAccepted {
                from: b,
                ans: json!({"sdp": "A1"}),
            }]
        );

        let directory = harness.storage.snapshot().unwrap();
        assert_eq!(
            directory.participant(&a).unwrap().call_state(),
            CallState::Connected { peer: b }
        );
        assert_eq!(
            directory.participant(&b).unwrap().call_state(),
            CallState::Connected { peer: a }
        );
    }

    #[tokio::test]
    async fn test_duplicate_offers_are_not_deduplicated() {
        let harness = Harness::new(RelayConfig::default());
        let (a, _rx_a) = harness.connect(1).await;
        let (b, mut rx_b) = harness.connect(2).await;

        for _ in 0..2 {
            harness
                .relay
                .handle_offer(a, b, json!({"sdp": "O1"}))
                .await
                .unwrap();
        }
        assert_eq!(drain(&mut rx_b).len(), 2);
    }

    #[tokio::test]
    async fn test_candidate_is_relayed() {
        let harness = Harness::new(RelayConfig::default());
        let (a, _rx_a) = harness.connect(1).await;
        let (b, mut rx_b) = harness.connect(2).await;

        harness
            .relay
            .handle_candidate(a, b, json!({"candidate": "c1", "sdpMid": "0"}))
            .await
            .unwrap();
        assert_eq!(
            drain(&mut rx_b),
            vec![ServerEvent::Candidate {
                from: a,
                candidate: json!({"candidate": "c1", "sdpMid": "0"}),
            }]
        );
    }

    #[tokio::test]
    async fn test_offer_to_unknown_target_is_dropped() {
        let harness = Harness::new(RelayConfig::default());
        let (a, mut rx_a) = harness.connect(1).await;
        let ghost = ConnectionId::from_u128(99);

        let result = harness.relay.handle_offer(a, ghost, json!({})).await;
        assert_eq!(result, Err(RelayError::UnknownTarget(ghost)));
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(
            harness
                .storage
                .snapshot()
                .unwrap()
                .participant(&a)
                .unwrap()
                .call_state(),
            CallState::Idle
        );
    }

    #[tokio::test]
    async fn test_offer_to_unknown_target_notifies_sender_when_enabled() {
        let harness = Harness::new(RelayConfig::default().with_unreachable_notification(true));
        let (a, mut rx_a) = harness.connect(1).await;
        let ghost = ConnectionId::from_u128(99);

        let result = harness.relay.handle_offer(a, ghost, json!({})).await;
        assert!(result.is_err());
        assert_eq!(
            drain(&mut rx_a),
            vec![ServerEvent::TargetUnreachable { to: ghost }]
        );
    }

    #[tokio::test]
    async fn test_offer_to_closed_channel_is_unknown_target() {
        let harness = Harness::new(RelayConfig::default());
        let (a, _rx_a) = harness.connect(1).await;
        let (b, rx_b) = harness.connect(2).await;
        drop(rx_b);

        let result = harness.relay.handle_offer(a, b, json!({})).await;
        assert_eq!(result, Err(RelayError::UnknownTarget(b)));
    }

    #[tokio::test]
    async fn test_closed_channel_reported_before_disconnect_cleanup() {
        let harness = Harness::new(RelayConfig::default().with_unreachable_notification(true));
        let (a, mut rx_a) = harness.connect(1).await;
        let (b, rx_b) = harness.connect(2).await;
        harness.relay.handle_join(a, "r1".to_string(), None).await.unwrap();
        harness.relay.handle_join(b, "r1".to_string(), None).await.unwrap();
        drain(&mut rx_a);
        drop(rx_b);

        let result = harness
            .relay
            .send_event(b, ServerEvent::Connected { id: b })
            .await;
        assert_eq!(result, Err(RelayError::UnknownTarget(b)));

        let result = harness.relay.handle_offer(a, b, json!({"sdp": "O1"})).await;
        assert_eq!(result, Err(RelayError::UnknownTarget(b)));
        assert_eq!(
            drain(&mut rx_a),
            vec![ServerEvent::TargetUnreachable { to: b }]
        );

        let directory = harness.storage.snapshot().unwrap();
        assert_eq!(directory.participant(&a).unwrap().call_state(), CallState::InRoom);
        assert_eq!(directory.participant(&b).unwrap().call_state(), CallState::InRoom);
    }

    #[tokio::test]
    async fn test_leave_without_room_is_noop() {
        let harness = Harness::new(RelayConfig::default().with_peer_left_notification(true));
        let (a, mut rx_a) = harness.connect(1).await;

        assert_eq!(harness.relay.handle_leave(a).await.unwrap(), None);
        assert_eq!(harness.relay.handle_leave(a).await.unwrap(), None);
        assert!(drain(&mut rx_a).is_empty());
    }
}
