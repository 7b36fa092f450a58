//! Error types for consortium operations
//!
//! Every error is a synchronous rejection: the triggering operation leaves
//! the store exactly as it found it.

use surety_types::{Amount, FlightStatus, RequestIndex, TypesError};
use thiserror::Error;

/// Errors returned by the consortium's operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuretyError {
    #[error("System is disabled; mutating operations are paused")]
    SystemDisabled,

    #[error("Caller {caller} is not authorized for {action}")]
    Unauthorized { caller: String, action: String },

    #[error("Caller {caller} is not a registered airline")]
    CallerNotAuthorized { caller: String },

    #[error("Airline {airline} has not applied")]
    NotApplied { airline: String },

    #[error("Insufficient stake: provided {provided}, minimum {minimum}")]
    InsufficientStake { provided: Amount, minimum: Amount },

    #[error("Airline {airline} is already registered")]
    AlreadyRegistered { airline: String },

    #[error("Airline {voter} already voted for {candidate}")]
    DuplicateVote { voter: String, candidate: String },

    #[error("Flight {key} is already registered")]
    DuplicateFlight { key: String },

    #[error("Flight {key} not found")]
    FlightNotFound { key: String },

    #[error("Flight {key} is already resolved as {status}")]
    FlightResolved { key: String, status: FlightStatus },

    #[error("Flight {key} has no resolved status yet")]
    FlightNotResolved { key: String },

    #[error("Policy cap exceeded: requested {requested}, remaining {remaining}")]
    PolicyCapExceeded { requested: Amount, remaining: Amount },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Status {status} cannot be reported")]
    InvalidStatus { status: FlightStatus },

    #[error("Caller {caller} is not a registered reporter")]
    NotAReporter { caller: String },

    #[error("Reporter {reporter} is already registered")]
    ReporterAlreadyRegistered { reporter: String },

    #[error("Reporter {reporter} holds no slot for request index {index}")]
    UnassignedReporter { reporter: String, index: RequestIndex },

    #[error("Reporter {reporter} already responded to request {index} for {key}")]
    AlreadyResponded {
        reporter: String,
        index: RequestIndex,
        key: String,
    },

    #[error("No oracle request {index} for flight {key}")]
    RequestNotFound { index: RequestIndex, key: String },

    #[error("Oracle request {index} for flight {key} is closed")]
    RequestClosed { index: RequestIndex, key: String },

    #[error("Oracle request {index} for flight {key} expired at {expired_at}")]
    RequestExpired {
        index: RequestIndex,
        key: String,
        expired_at: u64,
    },

    #[error("Insufficient payable balance: have {available}, need {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    #[error("Transfer to {recipient} failed: {reason}")]
    TransferFailed { recipient: String, reason: String },

    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Ledger error: {0}")]
    Ledger(#[from] surety_ledger::LedgerError),
}

impl From<TypesError> for SuretyError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::AmountOverflow => SuretyError::AmountOverflow,
            other => SuretyError::InvalidAmount {
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SuretyError>;
