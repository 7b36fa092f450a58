//! FlightSurety Core - consortium rules for flight-delay insurance
//!
//! Four components share one authoritative store:
//!
//! - `OperationalGate`: owner-controlled pause switch and administrative callers
//! - `AirlineGovernance`: bootstrap and majority-vote admission, stake funding
//! - `InsuranceEscrow`: flights, capped policies, payouts to passengers
//! - `OracleConsensus`: staked reporters agreeing on a flight status by quorum
//!
//! [`Consortium`] sequences every operation against them. Payout delivery and
//! time are seams (`PayoutChannel`, `Clock`) so callers can plug in real
//! transports or deterministic doubles.
//!
//! ```text
//! reporters ──submit_response──▶ OracleConsensus ──quorum──▶ InsuranceEscrow
//!                                                              │ credit
//!                                                              ▼
//!                                  Ledger (pool → payable) ──▶ PayoutChannel
//! ```

pub mod clock;
pub mod consortium;
pub mod error;
pub mod escrow;
pub mod events;
pub mod gate;
pub mod governance;
pub mod oracle;
pub mod payout;

pub use clock::{Clock, ManualClock, SystemClock};
pub use consortium::{Consortium, ConsortiumBuilder, ConsortiumState, ConsortiumSummary, ResponseOutcome};
pub use error::{Result, SuretyError};
pub use escrow::{CreditSummary, Flight, InsuranceEscrow, Policy};
pub use events::EventLog;
pub use gate::OperationalGate;
pub use governance::{AdmissionOutcome, Airline, AirlineGovernance};
pub use oracle::{
    FixedIndexAssigner, IndexAssigner, KeccakIndexAssigner, OracleConsensus, OracleRequest,
    Reporter, RequestState, Tally,
};
pub use payout::{InMemoryPayoutChannel, PayoutChannel, TransferError, TransferReceipt};

pub use surety_ledger::{Ledger, LedgerAccount};
pub use surety_types::{
    AirlineState, Amount, DomainEvent, EventRecord, FlightKey, FlightStatus, ParticipantId,
    PayoutMode, RequestIndex, SuretyConfig, TypesError, TYPES_VERSION,
};
