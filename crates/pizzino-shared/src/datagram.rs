use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DatagramId, UserId};

/// Routing discriminant carried by every datagram.
///
/// Unrecognised tags survive decoding as [`Protocol::Unknown`] so that the
/// node can report them instead of failing the whole decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Protocol {
    Null,
    /// Stored for pickup by the receiver.
    Message,
    /// Forwarded to another node.
    Relay,
    Handshake,
    Unknown(u8),
}

impl Protocol {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::Null,
            0x01 => Self::Message,
            0x02 => Self::Relay,
            0x03 => Self::Handshake,
            other => Self::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Null => 0x00,
            Self::Message => 0x01,
            Self::Relay => 0x02,
            Self::Handshake => 0x03,
            Self::Unknown(b) => b,
        }
    }
}

impl From<u8> for Protocol {
    fn from(b: u8) -> Self {
        Self::from_byte(b)
    }
}

impl From<Protocol> for u8 {
    fn from(p: Protocol) -> Self {
        p.to_byte()
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Message => write!(f, "message"),
            Self::Relay => write!(f, "relay"),
            Self::Handshake => write!(f, "handshake"),
            Self::Unknown(b) => write!(f, "unknown(0x{b:02x})"),
        }
    }
}

/// A single protocol-tagged unit of ciphertext routed by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datagram {
    pub id: DatagramId,
    pub protocol: Protocol,
    pub sender: UserId,
    pub receiver: UserId,
    /// End-to-end encrypted payload, opaque to the node.
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl Datagram {
    pub fn new(protocol: Protocol, sender: UserId, receiver: UserId, payload: Vec<u8>) -> Self {
        Self {
            id: DatagramId::new(),
            protocol,
            sender,
            receiver,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// A datagram held for its receiver, with its delivery flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub datagram: Datagram,
    /// Set once the datagram has been handed to the receiver; the record is
    /// kept until the receiver acknowledges it.
    pub seen: bool,
}

impl StoredMessage {
    pub fn unseen(datagram: Datagram) -> Self {
        Self {
            datagram,
            seen: false,
        }
    }
}
