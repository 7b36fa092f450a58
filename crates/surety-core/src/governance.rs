//! Airline governance - membership lifecycle of the consortium
//!
//! An airline moves `Applied → Funded → Registered`. Admission has two
//! halves that may arrive in either order:
//!
//! - **approval**: granted directly by any member while the consortium is
//!   smaller than the bootstrap size, otherwise by a majority vote of the
//!   current members;
//! - **funding**: a stake deposit of at least the minimum stake.
//!
//! The airline becomes `Registered` the moment it holds both. An airline
//! that never funds is never a member, no matter how many members approve it.
//! Approval is re-checked when it is redeemed: a bootstrap grant only holds
//! while membership is still below the bootstrap size, and a voted grant only
//! while its votes still form a majority. A lapsed approval is cleared and the
//! candidate goes back through voting.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use surety_ledger::{EntryReason, Ledger, LedgerAccount};
use surety_types::{AirlineState, Amount, DomainEvent, ParticipantId, SuretyConfig};
use tracing::{debug, info};

use crate::error::{Result, SuretyError};

/// Membership record of an airline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    pub id: ParticipantId,
    pub state: AirlineState,
    /// Latched once admission was granted
    pub approved: bool,
    pub stake: Amount,
    /// Distinct members that voted for this airline
    pub votes_received: BTreeSet<ParticipantId>,
}

impl Airline {
    fn applied(id: ParticipantId) -> Self {
        Self {
            id,
            state: AirlineState::Applied,
            approved: false,
            stake: Amount::zero(),
            votes_received: BTreeSet::new(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.state == AirlineState::Registered
    }
}

/// Result of a `register_airline` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionOutcome {
    /// Candidate is now a member
    Registered,
    /// Admission granted; membership starts once the candidate funds
    Approved,
    /// Vote counted, majority not reached yet
    VoteRecorded { votes: usize, required: usize },
}

#[derive(Debug, Clone)]
pub struct AirlineGovernance {
    airlines: HashMap<ParticipantId, Airline>,
    registered_count: u32,
    minimum_stake: Amount,
    bootstrap_size: u32,
}

impl AirlineGovernance {
    /// Seed the consortium with its first member
    pub fn new(genesis: ParticipantId, config: &SuretyConfig) -> Self {
        let mut first = Airline::applied(genesis.clone());
        first.state = AirlineState::Registered;
        first.approved = true;

        let mut airlines = HashMap::new();
        airlines.insert(genesis, first);

        Self {
            airlines,
            registered_count: 1,
            minimum_stake: config.minimum_stake,
            bootstrap_size: config.bootstrap_size,
        }
    }

    /// True iff the airline is a registered member
    pub fn is_airline(&self, id: &ParticipantId) -> bool {
        self.airlines.get(id).is_some_and(Airline::is_registered)
    }

    /// Number of registered members
    pub fn count(&self) -> u32 {
        self.registered_count
    }

    pub fn airline(&self, id: &ParticipantId) -> Option<&Airline> {
        self.airlines.get(id)
    }

    pub fn airlines(&self) -> impl Iterator<Item = &Airline> {
        self.airlines.values()
    }

    /// Votes a candidate needs under the current membership
    pub fn required_votes(&self) -> usize {
        (self.registered_count as usize).div_ceil(2)
    }

    /// Record an application; applying twice is a no-op
    pub fn apply(&mut self, caller: &ParticipantId, events: &mut Vec<DomainEvent>) -> Airline {
        if let Some(existing) = self.airlines.get(caller) {
            return existing.clone();
        }
        let airline = Airline::applied(caller.clone());
        self.airlines.insert(caller.clone(), airline.clone());
        info!(airline = %caller, "airline applied");
        events.push(DomainEvent::AirlineApplied {
            airline: caller.clone(),
        });
        airline
    }

    /// Deposit stake; promotes an approved airline to member
    pub fn fund(
        &mut self,
        caller: &ParticipantId,
        amount: Amount,
        ledger: &mut Ledger,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Airline> {
        let airline = self
            .airlines
            .get(caller)
            .ok_or_else(|| SuretyError::NotApplied {
                airline: caller.to_string(),
            })?;
        if amount < self.minimum_stake {
            return Err(SuretyError::InsufficientStake {
                provided: amount,
                minimum: self.minimum_stake,
            });
        }
        let total_stake = airline
            .stake
            .checked_add(amount)
            .ok_or(SuretyError::AmountOverflow)?;

        ledger.credit(
            LedgerAccount::Pool,
            amount,
            EntryReason::AirlineStake {
                airline: caller.clone(),
            },
        )?;

        let airline = self
            .airlines
            .get_mut(caller)
            .ok_or_else(|| SuretyError::NotApplied {
                airline: caller.to_string(),
            })?;
        airline.stake = total_stake;
        if airline.state == AirlineState::Applied {
            airline.state = AirlineState::Funded;
        }
        info!(airline = %caller, %amount, %total_stake, "airline funded");
        events.push(DomainEvent::AirlineFunded {
            airline: caller.clone(),
            amount,
            total_stake,
            state: airline.state,
        });

        if airline.approved && airline.state == AirlineState::Funded {
            if self.approval_holds(caller) {
                self.promote(caller, events);
            } else {
                self.revoke_approval(caller);
            }
        }
        Ok(self.airlines[caller].clone())
    }

    /// Admission entrypoint, called by an existing member
    pub fn register_airline(
        &mut self,
        caller: &ParticipantId,
        candidate: &ParticipantId,
        events: &mut Vec<DomainEvent>,
    ) -> Result<AdmissionOutcome> {
        if !self.is_airline(caller) {
            return Err(SuretyError::CallerNotAuthorized {
                caller: caller.to_string(),
            });
        }
        if self.is_airline(candidate) {
            return Err(SuretyError::AlreadyRegistered {
                airline: candidate.to_string(),
            });
        }

        if self.registered_count < self.bootstrap_size {
            self.apply(candidate, events);
            return Ok(self.approve(candidate, events));
        }

        if !self.airlines.contains_key(candidate) {
            return Err(SuretyError::NotApplied {
                airline: candidate.to_string(),
            });
        }
        if self.approval_holds(candidate) {
            return Ok(AdmissionOutcome::Approved);
        }
        self.revoke_approval(candidate);

        let required = self.required_votes();
        let record = self
            .airlines
            .get_mut(candidate)
            .ok_or_else(|| SuretyError::NotApplied {
                airline: candidate.to_string(),
            })?;
        if record.votes_received.contains(caller) {
            return Err(SuretyError::DuplicateVote {
                voter: caller.to_string(),
                candidate: candidate.to_string(),
            });
        }

        record.votes_received.insert(caller.clone());
        let votes = record.votes_received.len();
        debug!(%candidate, voter = %caller, votes, required, "admission vote");
        events.push(DomainEvent::AirlineVoteCast {
            candidate: candidate.clone(),
            voter: caller.clone(),
            votes,
            required,
        });

        if votes >= required {
            Ok(self.approve(candidate, events))
        } else {
            Ok(AdmissionOutcome::VoteRecorded { votes, required })
        }
    }

    /// True iff the candidate is approved and the grant is still valid
    fn approval_holds(&self, candidate: &ParticipantId) -> bool {
        let Some(record) = self.airlines.get(candidate) else {
            return false;
        };
        record.approved
            && (self.registered_count < self.bootstrap_size
                || record.votes_received.len() >= self.required_votes())
    }

    fn revoke_approval(&mut self, candidate: &ParticipantId) {
        if let Some(record) = self.airlines.get_mut(candidate) {
            if record.approved {
                record.approved = false;
                info!(
                    airline = %candidate,
                    members = self.registered_count,
                    "approval lapsed, candidate needs a majority vote"
                );
            }
        }
    }

    fn approve(&mut self, candidate: &ParticipantId, events: &mut Vec<DomainEvent>) -> AdmissionOutcome {
        let Some(record) = self.airlines.get_mut(candidate) else {
            return AdmissionOutcome::Approved;
        };
        record.approved = true;
        if record.state == AirlineState::Funded {
            self.promote(candidate, events);
            AdmissionOutcome::Registered
        } else {
            info!(airline = %candidate, "airline approved, awaiting stake");
            AdmissionOutcome::Approved
        }
    }

    fn promote(&mut self, id: &ParticipantId, events: &mut Vec<DomainEvent>) {
        let Some(record) = self.airlines.get_mut(id) else {
            return;
        };
        record.state = AirlineState::Registered;
        self.registered_count += 1;
        info!(airline = %id, members = self.registered_count, "airline registered");
        events.push(DomainEvent::AirlineRegistered {
            airline: id.clone(),
            votes: record.votes_received.iter().cloned().collect(),
            total_stake: record.stake,
            registered_count: self.registered_count,
        });
    }
}
