//! Registration authentication.
//!
//! The camera proves possession of its shared secret by sending
//! `HMAC-SHA256(shared_secret, camera_id)` as the `token` field of the
//! `register` message. The trust model is one-directional: the relay
//! never proves itself back to the camera.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Immutable device identity, loaded once at startup.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub camera_id: String,
    pub shared_secret: Vec<u8>,
}

impl DeviceIdentity {
    pub fn new(camera_id: impl Into<String>, shared_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            camera_id: camera_id.into(),
            shared_secret: shared_secret.into(),
        }
    }

    /// Registration token for this identity.
    pub fn token(&self) -> String {
        registration_token(&self.camera_id, &self.shared_secret)
    }
}

/// Compute the registration token: HMAC-SHA256 over the UTF-8 bytes of
/// `camera_id`, keyed by `shared_secret`, as a lowercase hex digest.
pub fn registration_token(camera_id: &str, shared_secret: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(shared_secret).expect("HMAC accepts keys of any length");
    mac.update(camera_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
