//! Peer-session and media-source capability traits.
//!
//! The WebRTC media engine is an external collaborator; the session
//! controller only speaks these traits. Each method may fail with an
//! engine-specific error, which the controller treats as a failure of
//! that negotiation step only.

use std::any::Any;

use async_trait::async_trait;
use nestwatch_core::{CandidateData, IceCandidate, SignalMessage};
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::{IceServer, MediaConfig};

/// Opaque handle to a local media track, produced by a [`MediaSource`]
/// and consumed by a [`PeerSession`] of the same engine.
pub struct MediaTrack {
    inner: Box<dyn Any + Send>,
}

impl MediaTrack {
    pub fn new(inner: impl Any + Send) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    pub fn downcast<T: 'static>(self) -> Option<T> {
        self.inner.downcast().ok().map(|b| *b)
    }
}

/// Camera capture abstraction.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Open the capture device and produce a video track.
    async fn open(&self, config: &MediaConfig) -> anyhow::Result<MediaTrack>;
}

/// One peer connection, exclusively owned by the active session.
#[async_trait]
pub trait PeerSession: Send {
    async fn add_track(&mut self, track: MediaTrack) -> anyhow::Result<()>;
    async fn set_remote_description(&mut self, sdp: &str) -> anyhow::Result<()>;
    async fn create_answer(&mut self) -> anyhow::Result<String>;
    async fn set_local_description(&mut self, sdp: &str) -> anyhow::Result<()>;
    async fn add_ice_candidate(
        &mut self,
        candidate: &IceCandidate,
        sdp_mid: Option<&str>,
        sdp_mline_index: Option<u32>,
    ) -> anyhow::Result<()>;
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Builds one [`PeerSession`] per negotiation generation.
#[async_trait]
pub trait PeerSessionFactory: Send + Sync {
    /// Create a peer session configured with the static ICE server list.
    /// Locally gathered candidates must be delivered through `candidates`.
    async fn create(
        &self,
        ice_servers: &[IceServer],
        candidates: LocalCandidateSink,
    ) -> anyhow::Result<Box<dyn PeerSession>>;
}

/// Translates the engine's local-candidate events into outbound
/// `ice-candidate` messages addressed to the bound viewer.
///
/// Sends go through the channel-level outbox, so candidate traffic from
/// the engine and answers from the session controller are serialized on
/// the wire. The sink is handed to the factory once per session, after
/// the viewer id is bound.
#[derive(Clone)]
pub struct LocalCandidateSink {
    camera_id: String,
    viewer_id: String,
    outbound: mpsc::Sender<SignalMessage>,
}

impl LocalCandidateSink {
    pub fn new(
        camera_id: impl Into<String>,
        viewer_id: impl Into<String>,
        outbound: mpsc::Sender<SignalMessage>,
    ) -> Self {
        Self {
            camera_id: camera_id.into(),
            viewer_id: viewer_id.into(),
            outbound,
        }
    }

    /// Forward one locally gathered candidate. Engine callbacks are not
    /// async, so this never blocks; a full or closed outbox drops the
    /// candidate with a warning (the viewer retries connectivity checks).
    pub fn send(&self, data: &CandidateData) {
        let msg = SignalMessage::ice_candidate(&self.camera_id, &self.viewer_id, data);
        if let Err(e) = self.outbound.try_send(msg) {
            warn!(viewer = %self.viewer_id, "dropping local ICE candidate: {e}");
        }
    }
}
