//! Reconnection supervisor: process-wide lifecycle.
//!
//! Runs one connection generation at a time (connect, register,
//! dispatch) and retries forever with a fixed delay on any failure. A
//! camera must keep trying to reach its relay indefinitely, so there is
//! no backoff growth, no jitter, and no retry cap. No session survives a
//! connection drop.

use std::future::Future;
use std::sync::Arc;

use nestwatch_common::Result;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::channel::SignalingChannel;
use crate::config::CameraConfig;
use crate::peer::{MediaSource, PeerSessionFactory};
use crate::session::SessionController;

/// Fixed delay between connection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Lifecycle of the signaling channel, one instance per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Registering,
    Registered,
}

/// Run the camera agent forever.
pub async fn run(
    config: CameraConfig,
    media: Arc<dyn MediaSource>,
    factory: Arc<dyn PeerSessionFactory>,
) {
    let config = Arc::new(config);
    run_with(move || {
        let config = config.clone();
        let media = media.clone();
        let factory = factory.clone();
        async move {
            // Each generation starts from a clean Disconnected state.
            let mut state = ConnectionState::Disconnected;
            run_generation(&config, media, factory, &mut state).await
        }
    })
    .await
}

/// Retry loop around a generation closure. Split out so the retry
/// cadence is testable under a paused clock.
pub(crate) async fn run_with<F, Fut>(mut generation: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        match generation().await {
            Ok(()) => info!("relay closed the connection"),
            Err(e) => warn!("connection failed: {e}"),
        }
        debug!(delay_secs = RECONNECT_DELAY.as_secs(), "retrying after delay");
        sleep(RECONNECT_DELAY).await;
    }
}

/// One connection generation: connect, register, then dispatch inbound
/// messages to a fresh session controller until the connection ends.
/// The peer session, if any, is released before returning.
pub async fn run_generation(
    config: &CameraConfig,
    media: Arc<dyn MediaSource>,
    factory: Arc<dyn PeerSessionFactory>,
    state: &mut ConnectionState,
) -> Result<()> {
    *state = ConnectionState::Connecting;
    let connected = SignalingChannel::connect(&config.relay_url).await;
    let mut channel = match connected {
        Ok(channel) => channel,
        Err(e) => {
            *state = ConnectionState::Disconnected;
            return Err(e);
        }
    };

    *state = ConnectionState::Registering;
    if let Err(e) = channel.register(&config.identity).await {
        *state = ConnectionState::Disconnected;
        return Err(e);
    }
    *state = ConnectionState::Registered;

    let mut controller = SessionController::new(
        config.clone(),
        media,
        factory,
        channel.sender(),
    );
    let result = dispatch(&mut channel, &mut controller).await;
    controller.shutdown().await;
    *state = ConnectionState::Disconnected;
    result
}

async fn dispatch(
    channel: &mut SignalingChannel,
    controller: &mut SessionController,
) -> Result<()> {
    while let Some(msg) = channel.next_message().await? {
        controller.handle_message(msg).await?;
    }
    Ok(())
}
