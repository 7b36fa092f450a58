//! FlightSurety Ledger - Account-keyed ledger for stakes, premiums and payouts
//!
//! The ledger is:
//! - Account-keyed (one shared pool plus a payable account per participant)
//! - Double-entry for internal movements (every pool debit has a payable credit)
//! - Immutable (entries are append-only)
//! - Reason-linked (every entry names the flight, stake or receipt behind it)
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason
//! 3. Only insurance payouts increase a payable balance
//! 4. Atomic operations only: a failed call leaves balances and entries untouched
//!
//! The ledger lives inside the consortium's authoritative store and is
//! mutated only while the store's write lock is held, so it carries no
//! locks of its own.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surety_types::{Amount, FlightKey, ParticipantId};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance in {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: String,
        available: Amount,
        required: Amount,
    },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Unique identifier for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(format!("entry_{}", Uuid::new_v4()))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Account a ledger entry applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerAccount {
    /// Consortium pool holding stakes and premiums
    Pool,
    /// Funds owed to a participant and not yet withdrawn
    Payable(ParticipantId),
}

impl fmt::Display for LedgerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pool => write!(f, "pool"),
            Self::Payable(id) => write!(f, "payable:{}", id),
        }
    }
}

/// Type of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Credit (increase) to an account
    Credit,
    /// Debit (decrease) from an account
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// Airline membership stake
    AirlineStake { airline: ParticipantId },
    /// Reporter registration stake
    ReporterStake { reporter: ParticipantId },
    /// Passenger cover contribution
    Premium {
        passenger: ParticipantId,
        flight: FlightKey,
    },
    /// Pool to payable on a carrier-fault resolution
    InsurancePayout { flight: FlightKey },
    /// Payable back to pool after a failed push transfer
    PayoutReversal { flight: FlightKey },
    /// Funds pushed out to the participant
    Withdrawal { receipt_id: String },
}

/// A single ledger entry (one side of a movement)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account: LedgerAccount,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub balance_after: Amount,
    pub reason: EntryReason,
    pub created_at: DateTime<Utc>,
}

/// The FlightSurety ledger
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<LedgerAccount, Amount>,
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Create a new in-memory ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of an account; unknown accounts hold zero
    pub fn balance(&self, account: &LedgerAccount) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn pool_balance(&self) -> Amount {
        self.balance(&LedgerAccount::Pool)
    }

    pub fn payable_balance(&self, participant: &ParticipantId) -> Amount {
        self.balance(&LedgerAccount::Payable(participant.clone()))
    }

    /// Credit an account (increase balance)
    ///
    /// Returns the new balance and the entry ID.
    pub fn credit(
        &mut self,
        account: LedgerAccount,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<(Amount, EntryId)> {
        let new_balance = self.credited_balance(&account, amount)?;
        Ok(self.append(account, EntryType::Credit, amount, new_balance, reason))
    }

    /// Debit an account (decrease balance)
    ///
    /// Fails if the balance would go negative.
    pub fn debit(
        &mut self,
        account: LedgerAccount,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<(Amount, EntryId)> {
        let new_balance = self.debited_balance(&account, amount)?;
        Ok(self.append(account, EntryType::Debit, amount, new_balance, reason))
    }

    /// Move funds between two accounts
    ///
    /// Both sides are checked before either is written, so a failed
    /// transfer records nothing.
    pub fn transfer(
        &mut self,
        from: LedgerAccount,
        to: LedgerAccount,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<(EntryId, EntryId)> {
        let from_after = self.debited_balance(&from, amount)?;
        let to_after = if from == to {
            self.balance(&to)
        } else {
            self.credited_balance(&to, amount)?
        };

        let (_, debit_entry) = self.append(from, EntryType::Debit, amount, from_after, reason.clone());
        let (_, credit_entry) = self.append(to, EntryType::Credit, amount, to_after, reason);
        Ok((debit_entry, credit_entry))
    }

    /// All entries for an account
    pub fn account_entries(&self, account: &LedgerAccount) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    /// Total number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Recent entries (newest first)
    pub fn recent_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    fn credited_balance(&self, account: &LedgerAccount, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount {
                message: "Amount must be greater than zero".to_string(),
            });
        }
        self.balance(account)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount {
                message: "Balance overflow".to_string(),
            })
    }

    fn debited_balance(&self, account: &LedgerAccount, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount {
                message: "Amount must be greater than zero".to_string(),
            });
        }
        let available = self.balance(account);
        available
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientBalance {
                account: account.to_string(),
                available,
                required: amount,
            })
    }

    fn append(
        &mut self,
        account: LedgerAccount,
        entry_type: EntryType,
        amount: Amount,
        balance_after: Amount,
        reason: EntryReason,
    ) -> (Amount, EntryId) {
        debug!(%account, ?entry_type, %amount, %balance_after, "ledger entry");
        let entry = LedgerEntry {
            entry_id: EntryId::new(),
            account: account.clone(),
            entry_type,
            amount,
            balance_after,
            reason,
            created_at: Utc::now(),
        };
        let entry_id = entry.entry_id.clone();
        self.balances.insert(account, balance_after);
        self.entries.push(entry);
        (balance_after, entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stake(airline: &str) -> EntryReason {
        EntryReason::AirlineStake {
            airline: ParticipantId::from(airline),
        }
    }

    #[test]
    fn test_credit_and_balance() {
        let mut ledger = Ledger::new();

        // Initial balance should be zero
        assert_eq!(ledger.pool_balance(), Amount::zero());

        let (balance, _) = ledger
            .credit(LedgerAccount::Pool, Amount::units(10), stake("airline-1"))
            .unwrap();

        assert_eq!(balance, Amount::units(10));
        assert_eq!(ledger.pool_balance(), Amount::units(10));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut ledger = Ledger::new();
        let result = ledger.credit(LedgerAccount::Pool, Amount::zero(), stake("airline-1"));
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
        assert_eq!(ledger.entry_count(), 0);
    }

    #[test]
    fn test_no_negative_balance() {
        let mut ledger = Ledger::new();
        let passenger = ParticipantId::from("passenger-1");

        let result = ledger.debit(
            LedgerAccount::Payable(passenger.clone()),
            Amount::units(1),
            EntryReason::Withdrawal {
                receipt_id: "r-1".to_string(),
            },
        );

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.payable_balance(&passenger), Amount::zero());
    }

    #[test]
    fn test_transfer_moves_funds() {
        let mut ledger = Ledger::new();
        let passenger = ParticipantId::from("passenger-1");
        let flight = FlightKey::derive(&ParticipantId::from("airline-1"), "FS100", 1);

        ledger
            .credit(LedgerAccount::Pool, Amount::units(10), stake("airline-1"))
            .unwrap();
        ledger
            .transfer(
                LedgerAccount::Pool,
                LedgerAccount::Payable(passenger.clone()),
                Amount::milli_units(1_500),
                EntryReason::InsurancePayout { flight },
            )
            .unwrap();

        assert_eq!(ledger.pool_balance(), Amount::milli_units(8_500));
        assert_eq!(ledger.payable_balance(&passenger), Amount::milli_units(1_500));
        assert_eq!(ledger.entry_count(), 3);
    }

    #[test]
    fn test_failed_transfer_records_nothing() {
        let mut ledger = Ledger::new();
        let flight = FlightKey::derive(&ParticipantId::from("airline-1"), "FS100", 1);

        ledger
            .credit(LedgerAccount::Pool, Amount::units(1), stake("airline-1"))
            .unwrap();
        let result = ledger.transfer(
            LedgerAccount::Pool,
            LedgerAccount::Payable(ParticipantId::from("passenger-1")),
            Amount::units(2),
            EntryReason::InsurancePayout { flight },
        );

        assert!(result.is_err());
        assert_eq!(ledger.pool_balance(), Amount::units(1));
        assert_eq!(ledger.entry_count(), 1);
    }

    #[test]
    fn test_entry_tracking() {
        let mut ledger = Ledger::new();

        ledger
            .credit(LedgerAccount::Pool, Amount::units(10), stake("airline-1"))
            .unwrap();
        ledger
            .credit(LedgerAccount::Pool, Amount::units(10), stake("airline-2"))
            .unwrap();

        let entries = ledger.account_entries(&LedgerAccount::Pool);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].balance_after, Amount::units(20));
        assert_eq!(ledger.recent_entries(1)[0].reason, stake("airline-2"));
    }
}
