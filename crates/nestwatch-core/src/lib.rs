//! Core Nestwatch signaling protocol types.
//!
//! This crate provides:
//! - The JSON signal envelope exchanged with the relay server
//! - The ICE candidate string codec
//! - The HMAC registration token used by the camera handshake

#![forbid(unsafe_code)]

pub mod auth;
pub mod candidate;
pub mod protocol;

pub use auth::{registration_token, DeviceIdentity};
pub use candidate::{parse_candidate, CandidateError, CandidateKind, IceCandidate};
pub use protocol::{
    CandidateData, DescriptionData, MessageKind, RegisterData, SignalMessage, CLIENT_TYPE_CAMERA,
    SERVER_TARGET,
};
