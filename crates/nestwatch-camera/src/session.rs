//! Per-viewer negotiation state machine.
//!
//! The camera is always the answering side: it reacts to `offer`,
//! `ice-candidate`, and `close-webrtc` messages and never proposes.
//! Negotiation-step failures abort only the current attempt; the
//! connection and session stay alive. Only a dead outbound queue (the
//! connection is going down anyway) propagates out of dispatch.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use nestwatch_common::{Error, Result};
use nestwatch_core::{parse_candidate, MessageKind, SignalMessage};
use tracing::{debug, info, trace, warn};

use crate::config::CameraConfig;
use crate::peer::{LocalCandidateSink, MediaSource, PeerSession, PeerSessionFactory};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session bound for the current viewer
    Idle,
    /// Offer received or first candidate pending, answer not yet sent
    Negotiating,
    /// Answer sent and/or candidates flowing
    Active,
    /// Peer session released by close-webrtc; next message starts fresh
    Closed,
}

pub struct SessionController {
    config: CameraConfig,
    media: Arc<dyn MediaSource>,
    factory: Arc<dyn PeerSessionFactory>,
    outbound: tokio::sync::mpsc::Sender<SignalMessage>,
    viewer_id: Option<String>,
    peer: Option<Box<dyn PeerSession>>,
    state: SessionState,
}

impl SessionController {
    pub fn new(
        config: CameraConfig,
        media: Arc<dyn MediaSource>,
        factory: Arc<dyn PeerSessionFactory>,
        outbound: tokio::sync::mpsc::Sender<SignalMessage>,
    ) -> Self {
        Self {
            config,
            media,
            factory,
            outbound,
            viewer_id: None,
            peer: None,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn viewer_id(&self) -> Option<&str> {
        self.viewer_id.as_deref()
    }

    /// Dispatch one inbound message. Message kinds outside the state
    /// machine are ignored without a transition.
    pub async fn handle_message(&mut self, msg: SignalMessage) -> Result<()> {
        match msg.kind {
            MessageKind::Offer => self.on_offer(msg).await,
            MessageKind::IceCandidate => self.on_candidate(msg).await,
            MessageKind::CloseWebrtc => {
                self.on_close().await;
                Ok(())
            }
            other => {
                trace!(kind = other.as_str(), "ignoring message");
                Ok(())
            }
        }
    }

    /// Release the peer session. Called on `close-webrtc` and by the
    /// supervisor when the connection drops; no session survives either.
    pub async fn shutdown(&mut self) {
        self.release_peer().await;
        self.viewer_id = None;
    }

    async fn on_offer(&mut self, msg: SignalMessage) -> Result<()> {
        let Some(viewer) = msg.sender.clone() else {
            warn!("offer without sender, dropping");
            return Ok(());
        };
        let offer = match msg.description_data() {
            Ok(offer) => offer,
            Err(e) => {
                warn!(viewer = %viewer, "offer with undecodable payload, dropping: {e}");
                return Ok(());
            }
        };

        self.bind_viewer(&viewer).await;
        if let Err(e) = self.ensure_peer().await {
            warn!(viewer = %viewer, "failed to create peer session: {e:#}");
            return Ok(());
        }

        let resume = self.state;
        self.state = SessionState::Negotiating;
        match self.negotiate_answer(&offer.sdp).await {
            Ok(answer_sdp) => {
                let answer =
                    SignalMessage::answer(&self.config.identity.camera_id, &viewer, answer_sdp);
                self.outbound
                    .send(answer)
                    .await
                    .map_err(|_| Error::transport("outbound queue closed"))?;
                info!(viewer = %viewer, "sent answer");
                self.state = SessionState::Active;
            }
            Err(e) => {
                // Abort this attempt only; a later offer is still welcome.
                warn!(viewer = %viewer, "negotiation failed: {e:#}");
                self.state = resume;
            }
        }
        Ok(())
    }

    async fn negotiate_answer(&mut self, offer_sdp: &str) -> anyhow::Result<String> {
        let peer = self.peer.as_mut().ok_or_else(|| anyhow!("no peer session"))?;
        peer.set_remote_description(offer_sdp)
            .await
            .context("set remote description")?;
        let answer_sdp = peer.create_answer().await.context("create answer")?;
        peer.set_local_description(&answer_sdp)
            .await
            .context("set local description")?;
        Ok(answer_sdp)
    }

    async fn on_candidate(&mut self, msg: SignalMessage) -> Result<()> {
        let Some(viewer) = msg.sender.clone() else {
            warn!("ice-candidate without sender, dropping");
            return Ok(());
        };
        let data = match msg.candidate_data() {
            Ok(data) => data,
            Err(e) => {
                warn!(viewer = %viewer, "ice-candidate with undecodable payload, dropping: {e}");
                return Ok(());
            }
        };
        self.bind_viewer(&viewer).await;
        if let Err(e) = self.ensure_peer().await {
            warn!(viewer = %viewer, "failed to create peer session: {e:#}");
            return Ok(());
        }

        // Malformed candidate strings are local to this one message.
        let candidate = match parse_candidate(&data.candidate) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(viewer = %viewer, "dropping malformed candidate: {e}");
                return Ok(());
            }
        };

        let Some(peer) = self.peer.as_mut() else {
            return Ok(());
        };
        match peer
            .add_ice_candidate(&candidate, data.sdp_mid.as_deref(), data.sdp_mline_index)
            .await
        {
            Ok(()) => {
                debug!(viewer = %viewer, kind = %candidate.kind, "added remote candidate");
                self.state = match self.state {
                    SessionState::Idle | SessionState::Closed => SessionState::Negotiating,
                    SessionState::Negotiating | SessionState::Active => SessionState::Active,
                };
            }
            Err(e) => {
                warn!(viewer = %viewer, "failed to add candidate: {e:#}");
            }
        }
        Ok(())
    }

    async fn on_close(&mut self) {
        info!(viewer = ?self.viewer_id, "viewer closed the session");
        self.release_peer().await;
        self.viewer_id = None;
        self.state = SessionState::Closed;
    }

    /// Bind the viewer id from the message sender. A different viewer id
    /// while a session is live replaces the old binding.
    async fn bind_viewer(&mut self, viewer: &str) {
        match self.viewer_id.as_deref() {
            Some(current) if current == viewer => {}
            Some(current) => {
                info!(old = %current, new = %viewer, "viewer replaced, releasing previous peer session");
                self.release_peer().await;
                self.viewer_id = Some(viewer.to_string());
                self.state = SessionState::Idle;
            }
            None => {
                self.viewer_id = Some(viewer.to_string());
                if self.state == SessionState::Closed {
                    self.state = SessionState::Idle;
                }
            }
        }
    }

    /// Lazily create the peer session for the bound viewer: build it from
    /// the static ICE server list, open the media source, attach the track.
    async fn ensure_peer(&mut self) -> anyhow::Result<()> {
        if self.peer.is_some() {
            return Ok(());
        }
        let viewer = self
            .viewer_id
            .clone()
            .ok_or_else(|| anyhow!("no viewer bound"))?;

        let sink = LocalCandidateSink::new(
            self.config.identity.camera_id.clone(),
            viewer,
            self.outbound.clone(),
        );
        let mut peer = self
            .factory
            .create(&self.config.ice_servers, sink)
            .await
            .context("create peer session")?;
        let track = self
            .media
            .open(&self.config.media)
            .await
            .context("open media source")?;
        peer.add_track(track).await.context("add local track")?;

        self.peer = Some(peer);
        Ok(())
    }

    async fn release_peer(&mut self) {
        if let Some(mut peer) = self.peer.take() {
            if let Err(e) = peer.close().await {
                debug!("peer session close failed: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IceServer, MediaConfig};
    use crate::peer::{MediaTrack, PeerSession, PeerSessionFactory};
    use async_trait::async_trait;
    use nestwatch_core::{DeviceIdentity, IceCandidate};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct PeerLog {
        remote_sdp: Vec<String>,
        local_sdp: Vec<String>,
        candidates: Vec<(IceCandidate, Option<String>, Option<u32>)>,
        tracks: usize,
        closes: usize,
        fail_remote_times: usize,
    }

    struct MockPeer {
        log: Arc<Mutex<PeerLog>>,
    }

    #[async_trait]
    impl PeerSession for MockPeer {
        async fn add_track(&mut self, _track: MediaTrack) -> anyhow::Result<()> {
            self.log.lock().unwrap().tracks += 1;
            Ok(())
        }

        async fn set_remote_description(&mut self, sdp: &str) -> anyhow::Result<()> {
            let mut log = self.log.lock().unwrap();
            if log.fail_remote_times > 0 {
                log.fail_remote_times -= 1;
                anyhow::bail!("engine rejected remote description");
            }
            log.remote_sdp.push(sdp.to_string());
            Ok(())
        }

        async fn create_answer(&mut self) -> anyhow::Result<String> {
            Ok("v=0 answer".to_string())
        }

        async fn set_local_description(&mut self, sdp: &str) -> anyhow::Result<()> {
            self.log.lock().unwrap().local_sdp.push(sdp.to_string());
            Ok(())
        }

        async fn add_ice_candidate(
            &mut self,
            candidate: &IceCandidate,
            sdp_mid: Option<&str>,
            sdp_mline_index: Option<u32>,
        ) -> anyhow::Result<()> {
            self.log.lock().unwrap().candidates.push((
                candidate.clone(),
                sdp_mid.map(str::to_string),
                sdp_mline_index,
            ));
            Ok(())
        }

        async fn close(&mut self) -> anyhow::Result<()> {
            self.log.lock().unwrap().closes += 1;
            Ok(())
        }
    }

    struct MockFactory {
        peers: Arc<Mutex<Vec<Arc<Mutex<PeerLog>>>>>,
        fail_remote_times: usize,
    }

    #[async_trait]
    impl PeerSessionFactory for MockFactory {
        async fn create(
            &self,
            _ice_servers: &[IceServer],
            _candidates: LocalCandidateSink,
        ) -> anyhow::Result<Box<dyn PeerSession>> {
            let log = Arc::new(Mutex::new(PeerLog {
                fail_remote_times: self.fail_remote_times,
                ..PeerLog::default()
            }));
            self.peers.lock().unwrap().push(log.clone());
            Ok(Box::new(MockPeer { log }))
        }
    }

    struct MockSource;

    #[async_trait]
    impl MediaSource for MockSource {
        async fn open(&self, _config: &MediaConfig) -> anyhow::Result<MediaTrack> {
            Ok(MediaTrack::new(()))
        }
    }

    type Peers = Arc<Mutex<Vec<Arc<Mutex<PeerLog>>>>>;

    fn controller(
        fail_remote_times: usize,
    ) -> (SessionController, mpsc::Receiver<SignalMessage>, Peers) {
        let peers: Peers = Arc::new(Mutex::new(Vec::new()));
        let factory = Arc::new(MockFactory {
            peers: peers.clone(),
            fail_remote_times,
        });
        let config = CameraConfig {
            identity: DeviceIdentity::new("camera-1", b"secret".to_vec()),
            relay_url: "ws://relay.test".to_string(),
            ice_servers: Vec::new(),
            media: MediaConfig::default(),
        };
        let (tx, rx) = mpsc::channel(16);
        (
            SessionController::new(config, Arc::new(MockSource), factory, tx),
            rx,
            peers,
        )
    }

    fn offer_from(viewer: &str) -> SignalMessage {
        SignalMessage {
            kind: MessageKind::Offer,
            sender: Some(viewer.to_string()),
            target: Some("camera-1".to_string()),
            client_type: None,
            data: json!({"sdp": "v=0 offer", "type": "offer"}),
        }
    }

    fn candidate_from(viewer: &str, candidate: &str) -> SignalMessage {
        SignalMessage {
            kind: MessageKind::IceCandidate,
            sender: Some(viewer.to_string()),
            target: Some("camera-1".to_string()),
            client_type: None,
            data: json!({"candidate": candidate, "sdpMid": "0", "sdpMLineIndex": 0}),
        }
    }

    fn close_message() -> SignalMessage {
        SignalMessage {
            kind: MessageKind::CloseWebrtc,
            sender: Some("v1".to_string()),
            target: Some("camera-1".to_string()),
            client_type: None,
            data: json!({}),
        }
    }

    #[tokio::test]
    async fn offer_produces_targeted_answer() {
        let (mut ctrl, mut rx, peers) = controller(0);

        ctrl.handle_message(offer_from("v1")).await.unwrap();

        assert_eq!(ctrl.state(), SessionState::Active);
        assert_eq!(ctrl.viewer_id(), Some("v1"));

        let answer = rx.try_recv().unwrap();
        assert_eq!(answer.kind, MessageKind::Answer);
        assert_eq!(answer.sender.as_deref(), Some("camera-1"));
        assert_eq!(answer.target.as_deref(), Some("v1"));
        assert_eq!(answer.data["sdp"], "v=0 answer");
        assert!(rx.try_recv().is_err());

        let log = peers.lock().unwrap()[0].clone();
        let log = log.lock().unwrap();
        assert_eq!(log.remote_sdp, vec!["v=0 offer"]);
        assert_eq!(log.local_sdp, vec!["v=0 answer"]);
        assert_eq!(log.tracks, 1);
    }

    #[tokio::test]
    async fn set_remote_failure_sends_no_answer_and_recovers() {
        let (mut ctrl, mut rx, _peers) = controller(1);

        ctrl.handle_message(offer_from("v1")).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(ctrl.state(), SessionState::Idle);

        // The next offer is accepted and answered.
        ctrl.handle_message(offer_from("v1")).await.unwrap();
        let answer = rx.try_recv().unwrap();
        assert_eq!(answer.kind, MessageKind::Answer);
        assert_eq!(ctrl.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn candidate_feeds_parsed_fields_into_peer() {
        let (mut ctrl, _rx, peers) = controller(0);

        ctrl.handle_message(candidate_from(
            "v1",
            "candidate:1 1 udp 12345 10.0.0.5 54321 typ host",
        ))
        .await
        .unwrap();

        let log = peers.lock().unwrap()[0].clone();
        let log = log.lock().unwrap();
        let (candidate, sdp_mid, sdp_mline_index) = &log.candidates[0];
        assert_eq!(candidate.foundation, 1);
        assert_eq!(candidate.component, 1);
        assert_eq!(candidate.protocol, "udp");
        assert_eq!(candidate.priority, 12345);
        assert_eq!(candidate.ip, "10.0.0.5");
        assert_eq!(candidate.port, 54321);
        assert_eq!(candidate.kind, nestwatch_core::CandidateKind::Host);
        assert_eq!(sdp_mid.as_deref(), Some("0"));
        assert_eq!(*sdp_mline_index, Some(0));
    }

    #[tokio::test]
    async fn malformed_candidate_is_dropped_session_continues() {
        let (mut ctrl, _rx, peers) = controller(0);

        ctrl.handle_message(candidate_from("v1", "candidate:abc 1 udp 1 1.2.3.4 1 typ host"))
            .await
            .unwrap();
        {
            let peers = peers.lock().unwrap();
            assert!(peers[0].lock().unwrap().candidates.is_empty());
        }

        ctrl.handle_message(candidate_from(
            "v1",
            "candidate:2 1 udp 99 10.0.0.9 4242 typ relay",
        ))
        .await
        .unwrap();
        let peers = peers.lock().unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].lock().unwrap().candidates.len(), 1);
    }

    #[tokio::test]
    async fn close_releases_peer_and_next_offer_starts_fresh() {
        let (mut ctrl, mut rx, peers) = controller(0);

        ctrl.handle_message(offer_from("v1")).await.unwrap();
        let _ = rx.try_recv().unwrap();

        ctrl.handle_message(close_message()).await.unwrap();
        assert_eq!(ctrl.state(), SessionState::Closed);
        assert_eq!(ctrl.viewer_id(), None);
        assert_eq!(peers.lock().unwrap()[0].lock().unwrap().closes, 1);

        ctrl.handle_message(offer_from("v2")).await.unwrap();
        let answer = rx.try_recv().unwrap();
        assert_eq!(answer.target.as_deref(), Some("v2"));
        assert_eq!(peers.lock().unwrap().len(), 2);
        // First peer closed exactly once.
        assert_eq!(peers.lock().unwrap()[0].lock().unwrap().closes, 1);
    }

    #[tokio::test]
    async fn new_viewer_replaces_live_session() {
        let (mut ctrl, mut rx, peers) = controller(0);

        ctrl.handle_message(offer_from("v1")).await.unwrap();
        let _ = rx.try_recv().unwrap();

        ctrl.handle_message(offer_from("v2")).await.unwrap();
        let answer = rx.try_recv().unwrap();
        assert_eq!(answer.target.as_deref(), Some("v2"));
        assert_eq!(ctrl.viewer_id(), Some("v2"));

        let peers = peers.lock().unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].lock().unwrap().closes, 1);
    }

    #[tokio::test]
    async fn unrelated_kinds_are_ignored() {
        let (mut ctrl, mut rx, peers) = controller(0);

        for kind in [
            MessageKind::Answer,
            MessageKind::Register,
            MessageKind::CameraRegisterAck,
            MessageKind::Unknown,
        ] {
            ctrl.handle_message(SignalMessage {
                kind,
                sender: Some("v1".to_string()),
                target: None,
                client_type: None,
                data: serde_json::Value::Null,
            })
            .await
            .unwrap();
        }

        assert_eq!(ctrl.state(), SessionState::Idle);
        assert!(ctrl.viewer_id().is_none());
        assert!(peers.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }
}
