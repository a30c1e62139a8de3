//! ICE candidate string codec.
//!
//! Parses the textual candidate grammar used in trickle ICE signaling:
//!
//! ```text
//! candidate:<foundation> <component> <protocol> <priority> <ip> <port> typ <type> ...
//! ```
//!
//! Trailing attributes (`generation`, `ufrag`, `network-cost`, ...) are
//! tolerated and ignored. Parsing is total: malformed input yields a
//! [`CandidateError`], never a partial descriptor or a panic. No
//! serializer is provided; locally gathered candidates are forwarded
//! opaquely as produced by the media engine.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    #[error("missing `candidate:` prefix")]
    MissingPrefix,
    #[error("truncated candidate: expected at least 8 fields, got {0}")]
    Truncated(usize),
    #[error("expected `typ` keyword, found {0:?}")]
    MissingTyp(String),
    #[error("invalid {field} field: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("unknown candidate type {0:?}")]
    UnknownKind(String),
}

/// Candidate type from the `typ` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Host,
    Srflx,
    Prflx,
    Relay,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateKind::Host => "host",
            CandidateKind::Srflx => "srflx",
            CandidateKind::Prflx => "prflx",
            CandidateKind::Relay => "relay",
        }
    }
}

impl FromStr for CandidateKind {
    type Err = CandidateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(CandidateKind::Host),
            "srflx" => Ok(CandidateKind::Srflx),
            "prflx" => Ok(CandidateKind::Prflx),
            "relay" => Ok(CandidateKind::Relay),
            other => Err(CandidateError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured form of one ICE candidate string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub foundation: u64,
    pub component: u32,
    pub protocol: String,
    pub priority: u64,
    pub ip: String,
    pub port: u16,
    pub kind: CandidateKind,
}

fn numeric<T: FromStr>(field: &'static str, value: &str) -> Result<T, CandidateError> {
    value.parse().map_err(|_| CandidateError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Parse one candidate string into an [`IceCandidate`].
pub fn parse_candidate(candidate: &str) -> Result<IceCandidate, CandidateError> {
    let rest = candidate
        .strip_prefix("candidate:")
        .ok_or(CandidateError::MissingPrefix)?;

    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < 8 {
        return Err(CandidateError::Truncated(fields.len()));
    }
    if fields[6] != "typ" {
        return Err(CandidateError::MissingTyp(fields[6].to_string()));
    }

    Ok(IceCandidate {
        foundation: numeric("foundation", fields[0])?,
        component: numeric("component", fields[1])?,
        protocol: fields[2].to_string(),
        priority: numeric("priority", fields[3])?,
        ip: fields[4].to_string(),
        port: numeric("port", fields[5])?,
        kind: fields[7].parse()?,
    })
}
