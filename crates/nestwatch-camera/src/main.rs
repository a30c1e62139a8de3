//! Nestwatch camera agent binary.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use nestwatch_camera::config::{parse_ice_servers, relay_url, CameraConfig, MediaConfig};
use nestwatch_camera::dummy::{DummyFactory, DummySource};
use nestwatch_camera::supervisor;
use nestwatch_core::DeviceIdentity;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "nestwatch-camera")]
#[command(about = "Nestwatch camera agent - answers viewer WebRTC sessions via a relay")]
struct Args {
    /// Camera identifier registered with the relay
    #[arg(long, env = "CAMERA_ID")]
    camera_id: String,

    /// Shared secret used to sign the registration token
    #[arg(long, env = "SHARED_SECRET")]
    shared_secret: String,

    /// Relay endpoint (host:port, ws:// or wss:// URL)
    #[arg(long, env = "SERVER")]
    server: String,

    /// Static ICE server list as a JSON array of {urls, username?, credential?}
    #[arg(
        long,
        env = "ICE_SERVERS",
        default_value = r#"[{"urls":"stun:stun.l.google.com:19302"}]"#
    )]
    ice_servers: String,

    /// Capture device name
    #[arg(long, default_value = "default")]
    video_device: String,

    /// Capture width in pixels
    #[arg(long, default_value_t = 640)]
    video_width: u32,

    /// Capture height in pixels
    #[arg(long, default_value_t = 480)]
    video_height: u32,

    /// Capture framerate
    #[arg(long, default_value_t = 30)]
    video_framerate: u32,
}

impl Args {
    fn into_config(self) -> Result<CameraConfig> {
        Ok(CameraConfig {
            identity: DeviceIdentity::new(self.camera_id, self.shared_secret.into_bytes()),
            relay_url: relay_url(&self.server)?,
            ice_servers: parse_ice_servers(&self.ice_servers)?,
            media: MediaConfig {
                device: self.video_device,
                width: self.video_width,
                height: self.video_height,
                framerate: self.video_framerate,
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    nestwatch_common::init_tracing();

    let args = Args::parse();
    let config = args.into_config()?;
    info!(
        camera = %config.identity.camera_id,
        relay = %config.relay_url,
        ice_servers = config.ice_servers.len(),
        "starting camera agent"
    );

    supervisor::run(config, Arc::new(DummySource), Arc::new(DummyFactory)).await;
    Ok(())
}
