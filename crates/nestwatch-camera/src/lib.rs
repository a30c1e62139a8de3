//! Nestwatch camera agent.
//!
//! The agent keeps a WebSocket connection to the relay server, registers
//! with an HMAC token, and answers viewer-initiated WebRTC negotiations:
//!
//! - [`supervisor`] owns the process lifecycle and retries the connection
//!   forever with a fixed delay
//! - [`channel`] owns one relay connection, the registration handshake,
//!   and ordered message dispatch
//! - [`session`] drives offer/answer/ICE exchange against the abstract
//!   peer-session capability in [`peer`]
//!
//! The media engine itself is out of scope; [`dummy`] provides a loopback
//! engine so the binary runs without one.

#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod dummy;
pub mod peer;
pub mod session;
pub mod supervisor;
