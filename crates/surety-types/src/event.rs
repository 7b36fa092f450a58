//! Domain events emitted by every successful state transition
//!
//! Events are append-only and carry enough fields to rebuild the entity they
//! describe. The client and dashboard consume only these plus read-only
//! queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AirlineState, Amount, FlightKey, FlightStatus, ParticipantId, RequestIndex};

/// Consortium-wide events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// Operational gate toggled by the owner
    OperationalStatusChanged {
        enabled: bool,
        changed_by: ParticipantId,
    },

    /// Administrative caller added by the owner
    CallerAuthorized {
        caller: ParticipantId,
        authorized_by: ParticipantId,
    },

    /// Administrative caller removed by the owner
    CallerDeauthorized {
        caller: ParticipantId,
        deauthorized_by: ParticipantId,
    },

    AirlineApplied {
        airline: ParticipantId,
    },

    /// Stake deposited by an airline
    AirlineFunded {
        airline: ParticipantId,
        amount: Amount,
        total_stake: Amount,
        state: AirlineState,
    },

    /// Admission vote recorded for a candidate
    AirlineVoteCast {
        candidate: ParticipantId,
        voter: ParticipantId,
        votes: usize,
        required: usize,
    },

    /// Airline promoted to a registered member
    AirlineRegistered {
        airline: ParticipantId,
        votes: Vec<ParticipantId>,
        total_stake: Amount,
        registered_count: u32,
    },

    FlightRegistered {
        key: FlightKey,
        airline: ParticipantId,
        designator: String,
        departure_timestamp: u64,
    },

    /// Cover bought or topped up
    InsurancePurchased {
        key: FlightKey,
        passenger: ParticipantId,
        amount: Amount,
        contribution: Amount,
    },

    /// Payout applied to a policyholder
    InsuranceCredited {
        key: FlightKey,
        passenger: ParticipantId,
        contribution: Amount,
        payout: Amount,
        payable_balance: Amount,
    },

    /// Payout could not be delivered; the policy stays uncredited
    PayoutFailed {
        key: FlightKey,
        passenger: ParticipantId,
        payout: Amount,
        reason: String,
    },

    /// Funds pushed out of a payable balance
    PayoutWithdrawn {
        passenger: ParticipantId,
        amount: Amount,
        receipt_id: String,
        payable_balance: Amount,
    },

    OracleReporterRegistered {
        reporter: ParticipantId,
        stake: Amount,
        indexes: Vec<RequestIndex>,
    },

    /// Status query opened for reporters holding `index`
    OracleRequestOpened {
        index: RequestIndex,
        key: FlightKey,
        airline: ParticipantId,
        designator: String,
        departure_timestamp: u64,
        requester: ParticipantId,
        expires_at: Option<u64>,
    },

    OracleResponseSubmitted {
        index: RequestIndex,
        key: FlightKey,
        reporter: ParticipantId,
        status: FlightStatus,
        matching: usize,
    },

    /// Quorum reached; flight status is final
    FlightStatusResolved {
        index: RequestIndex,
        key: FlightKey,
        status: FlightStatus,
        reporters: Vec<ParticipantId>,
    },
}

impl DomainEvent {
    /// Stable name of the event variant
    pub fn name(&self) -> &'static str {
        match self {
            Self::OperationalStatusChanged { .. } => "OperationalStatusChanged",
            Self::CallerAuthorized { .. } => "CallerAuthorized",
            Self::CallerDeauthorized { .. } => "CallerDeauthorized",
            Self::AirlineApplied { .. } => "AirlineApplied",
            Self::AirlineFunded { .. } => "AirlineFunded",
            Self::AirlineVoteCast { .. } => "AirlineVoteCast",
            Self::AirlineRegistered { .. } => "AirlineRegistered",
            Self::FlightRegistered { .. } => "FlightRegistered",
            Self::InsurancePurchased { .. } => "InsurancePurchased",
            Self::InsuranceCredited { .. } => "InsuranceCredited",
            Self::PayoutFailed { .. } => "PayoutFailed",
            Self::PayoutWithdrawn { .. } => "PayoutWithdrawn",
            Self::OracleReporterRegistered { .. } => "OracleReporterRegistered",
            Self::OracleRequestOpened { .. } => "OracleRequestOpened",
            Self::OracleResponseSubmitted { .. } => "OracleResponseSubmitted",
            Self::FlightStatusResolved { .. } => "FlightStatusResolved",
        }
    }
}

/// An event stamped with its position in the global operation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Monotonically increasing, gap-free
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: DomainEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DomainEvent::AirlineApplied {
            airline: ParticipantId::from("airline-2"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AirlineApplied");
        assert_eq!(json["airline"], "airline-2");
        assert_eq!(event.name(), "AirlineApplied");
    }
}
