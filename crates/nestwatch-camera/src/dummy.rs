//! Loopback media engine.
//!
//! Stands in for a real WebRTC engine adapter so the agent binary runs
//! end to end: it accepts any remote description, produces a canned
//! answer, and gathers one host candidate. No media flows.

use anyhow::Result;
use async_trait::async_trait;
use nestwatch_core::{CandidateData, IceCandidate};
use tracing::debug;

use crate::config::{IceServer, MediaConfig};
use crate::peer::{LocalCandidateSink, MediaSource, MediaTrack, PeerSession, PeerSessionFactory};

pub struct DummySource;

#[async_trait]
impl MediaSource for DummySource {
    async fn open(&self, config: &MediaConfig) -> Result<MediaTrack> {
        debug!(
            device = %config.device,
            width = config.width,
            height = config.height,
            framerate = config.framerate,
            "opening dummy capture"
        );
        Ok(MediaTrack::new(()))
    }
}

pub struct DummyPeer {
    candidates: LocalCandidateSink,
    remote_sdp: Option<String>,
}

#[async_trait]
impl PeerSession for DummyPeer {
    async fn add_track(&mut self, _track: MediaTrack) -> Result<()> {
        Ok(())
    }

    async fn set_remote_description(&mut self, sdp: &str) -> Result<()> {
        self.remote_sdp = Some(sdp.to_string());
        Ok(())
    }

    async fn create_answer(&mut self) -> Result<String> {
        anyhow::ensure!(self.remote_sdp.is_some(), "no remote description set");
        Ok("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=dummy\r\n".to_string())
    }

    async fn set_local_description(&mut self, _sdp: &str) -> Result<()> {
        // A real engine starts gathering here; emit one host candidate.
        self.candidates.send(&CandidateData {
            candidate: "candidate:1 1 udp 2130706431 127.0.0.1 9 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        });
        Ok(())
    }

    async fn add_ice_candidate(
        &mut self,
        candidate: &IceCandidate,
        _sdp_mid: Option<&str>,
        _sdp_mline_index: Option<u32>,
    ) -> Result<()> {
        debug!(ip = %candidate.ip, port = candidate.port, kind = %candidate.kind, "dummy add candidate");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct DummyFactory;

#[async_trait]
impl PeerSessionFactory for DummyFactory {
    async fn create(
        &self,
        ice_servers: &[IceServer],
        candidates: LocalCandidateSink,
    ) -> Result<Box<dyn PeerSession>> {
        debug!(ice_servers = ice_servers.len(), "creating dummy peer session");
        Ok(Box::new(DummyPeer {
            candidates,
            remote_sdp: None,
        }))
    }
}
