//! Signal envelope exchanged with the relay server.
//!
//! Every message is one JSON object: `type` selects the payload shape
//! carried in `data`; `sender` and `target` route it between the camera
//! and a viewer. The camera always stamps `clientType: "camera"` on
//! outbound messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `clientType` stamped on every outbound camera message.
pub const CLIENT_TYPE_CAMERA: &str = "camera";

/// `target` used for messages addressed to the relay itself.
pub const SERVER_TARGET: &str = "server";

/// Wire-level message type.
///
/// Unknown type strings decode to [`MessageKind::Unknown`] so the
/// dispatcher can ignore them; an envelope with no `type` at all fails
/// to decode and tears down the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Register,
    CameraRegisterAck,
    Offer,
    Answer,
    IceCandidate,
    CloseWebrtc,
    Unknown,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Register => "register",
            MessageKind::CameraRegisterAck => "camera-register-ack",
            MessageKind::Offer => "offer",
            MessageKind::Answer => "answer",
            MessageKind::IceCandidate => "ice-candidate",
            MessageKind::CloseWebrtc => "close-webrtc",
            MessageKind::Unknown => "unknown",
        }
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        match s {
            "register" => MessageKind::Register,
            "camera-register-ack" => MessageKind::CameraRegisterAck,
            "offer" => MessageKind::Offer,
            "answer" => MessageKind::Answer,
            "ice-candidate" => MessageKind::IceCandidate,
            "close-webrtc" => MessageKind::CloseWebrtc,
            _ => MessageKind::Unknown,
        }
    }
}

impl Serialize for MessageKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(MessageKind::from(s.as_str()))
    }
}

/// One signaling message, inbound or outbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(rename = "clientType", default, skip_serializing_if = "Option::is_none")]
    pub client_type: Option<String>,

    /// Payload; shape depends on `kind`. Decoded on demand via the
    /// typed accessors so one bad payload never poisons the envelope.
    #[serde(default)]
    pub data: Value,
}

/// `data` payload of a `register` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterData {
    pub token: String,
}

/// `data` payload of an `offer` or `answer` message (RTC session description).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionData {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// `data` payload of an `ice-candidate` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateData {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u32>,
}

impl SignalMessage {
    /// Registration handshake message sent once per connection attempt.
    pub fn register(camera_id: &str, token: String) -> Self {
        Self {
            kind: MessageKind::Register,
            sender: Some(camera_id.to_string()),
            target: Some(SERVER_TARGET.to_string()),
            client_type: Some(CLIENT_TYPE_CAMERA.to_string()),
            data: serde_json::json!({ "token": token }),
        }
    }

    /// Answer to a viewer's offer.
    pub fn answer(camera_id: &str, viewer_id: &str, sdp: String) -> Self {
        Self {
            kind: MessageKind::Answer,
            sender: Some(camera_id.to_string()),
            target: Some(viewer_id.to_string()),
            client_type: Some(CLIENT_TYPE_CAMERA.to_string()),
            data: serde_json::json!({ "sdp": sdp, "type": "answer" }),
        }
    }

    /// Locally gathered ICE candidate forwarded to the viewer.
    pub fn ice_candidate(camera_id: &str, viewer_id: &str, data: &CandidateData) -> Self {
        Self {
            kind: MessageKind::IceCandidate,
            sender: Some(camera_id.to_string()),
            target: Some(viewer_id.to_string()),
            client_type: Some(CLIENT_TYPE_CAMERA.to_string()),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    /// Decode the payload of an `offer`/`answer` message.
    pub fn description_data(&self) -> Result<DescriptionData, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    /// Decode the payload of an `ice-candidate` message.
    pub fn candidate_data(&self) -> Result<CandidateData, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    /// Decode the payload of a `register` message.
    pub fn register_data(&self) -> Result<RegisterData, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}
