//! Identity types for FlightSurety
//!
//! Every caller is an explicit `ParticipantId`; authorization is a predicate
//! over that id, never an ambient lookup. Flights are addressed by a
//! `FlightKey` that any party can recompute without consulting the store.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a consortium participant (airline, passenger, reporter, operator)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Create a new random participant id
    pub fn new() -> Self {
        Self(format!("acct_{}", Uuid::new_v4()))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Slot an oracle request is addressed to; reporters hold a few of these
pub type RequestIndex = u8;

/// Deterministic flight identifier
///
/// Keccak-256 over the airline id, the flight designator and the scheduled
/// departure timestamp. The two variable-length fields are length-prefixed,
/// so `("AB", "C1")` and `("A", "BC1")` hash differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey(pub [u8; 32]);

impl FlightKey {
    /// Derive the key for `(airline, designator, departure_timestamp)`
    pub fn derive(airline: &ParticipantId, designator: &str, departure_timestamp: u64) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update((airline.0.len() as u64).to_be_bytes());
        hasher.update(airline.0.as_bytes());
        hasher.update((designator.len() as u64).to_be_bytes());
        hasher.update(designator.as_bytes());
        hasher.update(departure_timestamp.to_be_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}
