//! Insurance escrow - flights, passenger policies and payouts
//!
//! Premiums and stakes sit in the ledger pool. When a flight resolves as
//! carrier-at-fault, each uncredited policy is paid `contribution *
//! payout_multiplier` from the pool into the passenger's payable account.
//! The `credited` flag is a one-way latch, so crediting a flight twice pays
//! nobody twice. Failures are isolated per passenger: a payout that cannot
//! be delivered leaves that one policy uncredited for a later retry.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surety_ledger::{EntryReason, Ledger, LedgerAccount};
use surety_types::{Amount, DomainEvent, FlightKey, FlightStatus, ParticipantId, PayoutMode, SuretyConfig};
use tracing::{info, warn};

use crate::error::{Result, SuretyError};
use crate::payout::{PayoutChannel, TransferError, TransferReceipt};

/// A flight registered by a member airline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub key: FlightKey,
    pub airline: ParticipantId,
    pub designator: String,
    pub departure_timestamp: u64,
    pub status: FlightStatus,
    pub registered: bool,
}

/// A passenger's cover on one flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub passenger: ParticipantId,
    pub flight: FlightKey,
    pub contribution: Amount,
    pub credited: bool,
    /// Amount paid out; zero until credited
    pub payout: Amount,
}

/// Outcome of crediting the policyholders of one flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditSummary {
    pub key: FlightKey,
    pub status: FlightStatus,
    pub credited: Vec<ParticipantId>,
    pub failed: Vec<ParticipantId>,
    pub total_paid: Amount,
}

#[derive(Debug, Clone)]
pub struct InsuranceEscrow {
    flights: HashMap<FlightKey, Flight>,
    policies: HashMap<FlightKey, BTreeMap<ParticipantId, Policy>>,
    max_policy_amount: Amount,
    payout_multiplier: Decimal,
    payout_mode: PayoutMode,
    payout_timeout: Duration,
}

impl InsuranceEscrow {
    pub fn new(config: &SuretyConfig) -> Self {
        Self {
            flights: HashMap::new(),
            policies: HashMap::new(),
            max_policy_amount: config.max_policy_amount,
            payout_multiplier: config.payout_multiplier,
            payout_mode: config.payout_mode,
            payout_timeout: Duration::from_millis(config.payout_timeout_ms),
        }
    }

    pub fn flight(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    pub fn flights(&self) -> impl Iterator<Item = &Flight> {
        self.flights.values()
    }

    pub fn policy(&self, passenger: &ParticipantId, key: &FlightKey) -> Option<&Policy> {
        self.policies.get(key).and_then(|p| p.get(passenger))
    }

    pub fn policies(&self, key: &FlightKey) -> Vec<Policy> {
        self.policies
            .get(key)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Look up a flight that has not been resolved yet
    pub fn open_flight(&self, key: &FlightKey) -> Result<&Flight> {
        let flight = self.flights.get(key).ok_or_else(|| SuretyError::FlightNotFound {
            key: key.to_string(),
        })?;
        if flight.status.is_resolved() {
            return Err(SuretyError::FlightResolved {
                key: key.to_string(),
                status: flight.status,
            });
        }
        Ok(flight)
    }

    /// Register a flight; the caller has already been checked as a member
    pub fn register_flight(
        &mut self,
        airline: &ParticipantId,
        designator: &str,
        departure_timestamp: u64,
        events: &mut Vec<DomainEvent>,
    ) -> Result<FlightKey> {
        let key = FlightKey::derive(airline, designator, departure_timestamp);
        if self.flights.contains_key(&key) {
            return Err(SuretyError::DuplicateFlight {
                key: key.to_string(),
            });
        }

        self.flights.insert(
            key,
            Flight {
                key,
                airline: airline.clone(),
                designator: designator.to_string(),
                departure_timestamp,
                status: FlightStatus::Unknown,
                registered: true,
            },
        );
        info!(%airline, designator, departure_timestamp, key = %key.short(), "flight registered");
        events.push(DomainEvent::FlightRegistered {
            key,
            airline: airline.clone(),
            designator: designator.to_string(),
            departure_timestamp,
        });
        Ok(key)
    }

    /// Buy or top up cover, bounded by the per-policy cap
    pub fn buy_insurance(
        &mut self,
        passenger: &ParticipantId,
        key: &FlightKey,
        amount: Amount,
        ledger: &mut Ledger,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Policy> {
        self.open_flight(key)?;
        if amount.is_zero() {
            return Err(SuretyError::InvalidAmount {
                message: "Amount must be greater than zero".to_string(),
            });
        }

        let current = self
            .policy(passenger, key)
            .map(|p| p.contribution)
            .unwrap_or_default();
        let contribution = current
            .checked_add(amount)
            .filter(|total| *total <= self.max_policy_amount)
            .ok_or_else(|| SuretyError::PolicyCapExceeded {
                requested: amount,
                remaining: self.max_policy_amount.saturating_sub(current),
            })?;

        ledger.credit(
            LedgerAccount::Pool,
            amount,
            EntryReason::Premium {
                passenger: passenger.clone(),
                flight: *key,
            },
        )?;

        let policy = self
            .policies
            .entry(*key)
            .or_default()
            .entry(passenger.clone())
            .or_insert_with(|| Policy {
                passenger: passenger.clone(),
                flight: *key,
                contribution: Amount::zero(),
                credited: false,
                payout: Amount::zero(),
            });
        policy.contribution = contribution;

        info!(%passenger, key = %key.short(), %amount, %contribution, "insurance purchased");
        events.push(DomainEvent::InsurancePurchased {
            key: *key,
            passenger: passenger.clone(),
            amount,
            contribution,
        });
        Ok(policy.clone())
    }

    /// Set the final status of a flight; only oracle consensus resolves flights
    pub(crate) fn resolve(&mut self, key: &FlightKey, status: FlightStatus) -> Result<()> {
        self.open_flight(key)?;
        if let Some(flight) = self.flights.get_mut(key) {
            flight.status = status;
        }
        Ok(())
    }

    /// Credit every uncredited policyholder of a resolved flight
    ///
    /// Flights resolved without carrier fault credit nobody. In push mode
    /// each payout is delivered through `channel`; a failed delivery
    /// reverses that passenger's credit and leaves the rest of the batch
    /// untouched.
    pub async fn credit_insurees(
        &mut self,
        key: &FlightKey,
        ledger: &mut Ledger,
        channel: &dyn PayoutChannel,
        events: &mut Vec<DomainEvent>,
    ) -> Result<CreditSummary> {
        let flight = self.flights.get(key).ok_or_else(|| SuretyError::FlightNotFound {
            key: key.to_string(),
        })?;
        let status = flight.status;
        if !status.is_resolved() {
            return Err(SuretyError::FlightNotResolved {
                key: key.to_string(),
            });
        }

        let mut summary = CreditSummary {
            key: *key,
            status,
            credited: Vec::new(),
            failed: Vec::new(),
            total_paid: Amount::zero(),
        };
        if !status.is_carrier_fault() {
            return Ok(summary);
        }

        let Some(policies) = self.policies.get_mut(key) else {
            return Ok(summary);
        };

        for policy in policies.values_mut().filter(|p| !p.credited) {
            let passenger = policy.passenger.clone();
            let payout = match policy.contribution.scale(self.payout_multiplier) {
                Ok(payout) if !payout.is_zero() => payout,
                Ok(_) => continue,
                Err(err) => {
                    Self::record_failure(&mut summary, events, key, &passenger, Amount::zero(), err.to_string());
                    continue;
                }
            };

            let payable = LedgerAccount::Payable(passenger.clone());
            if let Err(err) = ledger.transfer(
                LedgerAccount::Pool,
                payable.clone(),
                payout,
                EntryReason::InsurancePayout { flight: *key },
            ) {
                Self::record_failure(&mut summary, events, key, &passenger, payout, err.to_string());
                continue;
            }
            policy.credited = true;
            policy.payout = payout;

            let delivered = match self.payout_mode {
                PayoutMode::Pull => None,
                PayoutMode::Push => match deliver(channel, self.payout_timeout, &passenger, payout).await {
                    Ok(receipt) => Some(receipt),
                    Err(err) => {
                        // Compensate: the pool takes the payout back and the latch reopens
                        match ledger.transfer(
                            payable.clone(),
                            LedgerAccount::Pool,
                            payout,
                            EntryReason::PayoutReversal { flight: *key },
                        ) {
                            Ok(_) => {
                                policy.credited = false;
                                policy.payout = Amount::zero();
                                warn!(%passenger, key = %key.short(), %payout, error = %err, "payout rolled back");
                                Self::record_failure(&mut summary, events, key, &passenger, payout, err.to_string());
                                continue;
                            }
                            // Credit stays on the payable balance for a later withdrawal
                            Err(reversal) => {
                                warn!(
                                    %passenger,
                                    key = %key.short(),
                                    %payout,
                                    error = %err,
                                    reversal = %reversal,
                                    "payout undelivered and not reversed, left payable"
                                );
                                None
                            }
                        }
                    }
                },
            };

            events.push(DomainEvent::InsuranceCredited {
                key: *key,
                passenger: passenger.clone(),
                contribution: policy.contribution,
                payout,
                payable_balance: ledger.balance(&payable),
            });
            if let Some(receipt) = delivered {
                match ledger.debit(
                    payable.clone(),
                    payout,
                    EntryReason::Withdrawal {
                        receipt_id: receipt.receipt_id.clone(),
                    },
                ) {
                    Ok((payable_balance, _)) => events.push(DomainEvent::PayoutWithdrawn {
                        passenger: passenger.clone(),
                        amount: payout,
                        receipt_id: receipt.receipt_id,
                        payable_balance,
                    }),
                    // Funds already left; the policy stays latched so it is never paid twice
                    Err(err) => {
                        warn!(%passenger, receipt = %receipt.receipt_id, error = %err, "delivered payout not debited");
                        Self::record_failure(&mut summary, events, key, &passenger, payout, err.to_string());
                        continue;
                    }
                }
            }

            summary.total_paid = summary.total_paid.saturating_add(payout);
            summary.credited.push(passenger);
        }

        info!(
            key = %key.short(),
            %status,
            credited = summary.credited.len(),
            failed = summary.failed.len(),
            total_paid = %summary.total_paid,
            "insurees credited"
        );
        Ok(summary)
    }

    /// Pull a credited payout out through the payout channel
    ///
    /// The balance is only debited after the channel accepted the transfer.
    pub async fn withdraw(
        &self,
        passenger: &ParticipantId,
        amount: Amount,
        ledger: &mut Ledger,
        channel: &dyn PayoutChannel,
        events: &mut Vec<DomainEvent>,
    ) -> Result<TransferReceipt> {
        if amount.is_zero() {
            return Err(SuretyError::InvalidAmount {
                message: "Amount must be greater than zero".to_string(),
            });
        }
        let available = ledger.payable_balance(passenger);
        if available < amount {
            return Err(SuretyError::InsufficientBalance {
                available,
                required: amount,
            });
        }

        let receipt = deliver(channel, self.payout_timeout, passenger, amount)
            .await
            .map_err(|err| SuretyError::TransferFailed {
                recipient: passenger.to_string(),
                reason: err.to_string(),
            })?;

        let (payable_balance, _) = ledger.debit(
            LedgerAccount::Payable(passenger.clone()),
            amount,
            EntryReason::Withdrawal {
                receipt_id: receipt.receipt_id.clone(),
            },
        )?;
        info!(%passenger, %amount, %payable_balance, "payout withdrawn");
        events.push(DomainEvent::PayoutWithdrawn {
            passenger: passenger.clone(),
            amount,
            receipt_id: receipt.receipt_id.clone(),
            payable_balance,
        });
        Ok(receipt)
    }

    fn record_failure(
        summary: &mut CreditSummary,
        events: &mut Vec<DomainEvent>,
        key: &FlightKey,
        passenger: &ParticipantId,
        payout: Amount,
        reason: String,
    ) {
        events.push(DomainEvent::PayoutFailed {
            key: *key,
            passenger: passenger.clone(),
            payout,
            reason,
        });
        summary.failed.push(passenger.clone());
    }
}

/// Send a payout, giving up once `limit` elapses
async fn deliver(
    channel: &dyn PayoutChannel,
    limit: Duration,
    to: &ParticipantId,
    amount: Amount,
) -> std::result::Result<TransferReceipt, TransferError> {
    tokio::time::timeout(limit, channel.transfer(to, amount))
        .await
        .unwrap_or_else(|_| {
            Err(TransferError::Unavailable {
                reason: format!("no answer within {}ms", limit.as_millis()),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::InMemoryPayoutChannel;

    /// Channel that never answers in time
    struct StalledChannel;

    #[async_trait::async_trait]
    impl PayoutChannel for StalledChannel {
        async fn transfer(
            &self,
            _to: &ParticipantId,
            _amount: Amount,
        ) -> std::result::Result<TransferReceipt, TransferError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(TransferError::Unavailable {
                reason: "stalled".to_string(),
            })
        }
    }

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    fn funded_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .credit(
                LedgerAccount::Pool,
                Amount::units(10),
                EntryReason::AirlineStake { airline: id("airline-1") },
            )
            .unwrap();
        ledger
    }

    fn setup(mode: PayoutMode) -> (InsuranceEscrow, Ledger, FlightKey) {
        let config = SuretyConfig {
            payout_mode: mode,
            ..SuretyConfig::default()
        };
        let mut escrow = InsuranceEscrow::new(&config);
        let mut events = Vec::new();
        let key = escrow
            .register_flight(&id("airline-1"), "ND1309", 1_700_000_000, &mut events)
            .unwrap();
        (escrow, funded_ledger(), key)
    }

    #[test]
    fn test_duplicate_flight_rejected() {
        let (mut escrow, _, key) = setup(PayoutMode::Pull);
        let mut events = Vec::new();
        let result = escrow.register_flight(&id("airline-1"), "ND1309", 1_700_000_000, &mut events);
        assert_eq!(
            result,
            Err(SuretyError::DuplicateFlight { key: key.to_string() })
        );
        assert_eq!(key, FlightKey::derive(&id("airline-1"), "ND1309", 1_700_000_000));
    }

    #[test]
    fn test_policy_cap() {
        let (mut escrow, mut ledger, key) = setup(PayoutMode::Pull);
        let mut events = Vec::new();
        let passenger = id("passenger-1");

        escrow
            .buy_insurance(&passenger, &key, Amount::milli_units(500), &mut ledger, &mut events)
            .unwrap();
        let policy = escrow
            .buy_insurance(&passenger, &key, Amount::milli_units(500), &mut ledger, &mut events)
            .unwrap();
        assert_eq!(policy.contribution, Amount::units(1));

        let result =
            escrow.buy_insurance(&passenger, &key, Amount::milli_units(500), &mut ledger, &mut events);
        assert_eq!(
            result,
            Err(SuretyError::PolicyCapExceeded {
                requested: Amount::milli_units(500),
                remaining: Amount::zero(),
            })
        );
        assert_eq!(ledger.pool_balance(), Amount::units(11));
    }

    #[test]
    fn test_buy_rejects_zero_and_unknown_flight() {
        let (mut escrow, mut ledger, key) = setup(PayoutMode::Pull);
        let mut events = Vec::new();

        let result = escrow.buy_insurance(&id("p"), &key, Amount::zero(), &mut ledger, &mut events);
        assert!(matches!(result, Err(SuretyError::InvalidAmount { .. })));

        let unknown = FlightKey::derive(&id("airline-1"), "XX1", 0);
        let result = escrow.buy_insurance(&id("p"), &unknown, Amount::units(1), &mut ledger, &mut events);
        assert!(matches!(result, Err(SuretyError::FlightNotFound { .. })));
    }

    #[test]
    fn test_cannot_insure_resolved_flight() {
        let (mut escrow, mut ledger, key) = setup(PayoutMode::Pull);
        let mut events = Vec::new();
        escrow.resolve(&key, FlightStatus::OnTime).unwrap();

        let result = escrow.buy_insurance(&id("p"), &key, Amount::units(1), &mut ledger, &mut events);
        assert!(matches!(result, Err(SuretyError::FlightResolved { .. })));
    }

    #[tokio::test]
    async fn test_credit_requires_resolution() {
        let (mut escrow, mut ledger, key) = setup(PayoutMode::Pull);
        let channel = InMemoryPayoutChannel::new();
        let mut events = Vec::new();

        let result = escrow
            .credit_insurees(&key, &mut ledger, &channel, &mut events)
            .await;
        assert!(matches!(result, Err(SuretyError::FlightNotResolved { .. })));
    }

    #[tokio::test]
    async fn test_credit_is_idempotent() {
        let (mut escrow, mut ledger, key) = setup(PayoutMode::Pull);
        let channel = InMemoryPayoutChannel::new();
        let mut events = Vec::new();
        let passenger = id("passenger-1");

        escrow
            .buy_insurance(&passenger, &key, Amount::units(1), &mut ledger, &mut events)
            .unwrap();
        escrow.resolve(&key, FlightStatus::LateAirline).unwrap();

        let summary = escrow
            .credit_insurees(&key, &mut ledger, &channel, &mut events)
            .await
            .unwrap();
        assert_eq!(summary.credited, vec![passenger.clone()]);
        assert_eq!(summary.total_paid, Amount::milli_units(1_500));
        assert_eq!(ledger.payable_balance(&passenger), Amount::milli_units(1_500));

        let again = escrow
            .credit_insurees(&key, &mut ledger, &channel, &mut events)
            .await
            .unwrap();
        assert!(again.credited.is_empty());
        assert_eq!(ledger.payable_balance(&passenger), Amount::milli_units(1_500));
    }

    #[tokio::test]
    async fn test_no_payout_without_carrier_fault() {
        let (mut escrow, mut ledger, key) = setup(PayoutMode::Pull);
        let channel = InMemoryPayoutChannel::new();
        let mut events = Vec::new();
        let passenger = id("passenger-1");

        escrow
            .buy_insurance(&passenger, &key, Amount::units(1), &mut ledger, &mut events)
            .unwrap();
        escrow.resolve(&key, FlightStatus::LateWeather).unwrap();

        let summary = escrow
            .credit_insurees(&key, &mut ledger, &channel, &mut events)
            .await
            .unwrap();
        assert!(summary.credited.is_empty());
        assert!(!escrow.policy(&passenger, &key).unwrap().credited);
        assert_eq!(ledger.payable_balance(&passenger), Amount::zero());
    }

    #[tokio::test]
    async fn test_push_failure_is_isolated() {
        let (mut escrow, mut ledger, key) = setup(PayoutMode::Push);
        let channel = InMemoryPayoutChannel::new();
        let mut events = Vec::new();
        let alice = id("alice");
        let bob = id("bob");

        for passenger in [&alice, &bob] {
            escrow
                .buy_insurance(passenger, &key, Amount::units(1), &mut ledger, &mut events)
                .unwrap();
        }
        escrow.resolve(&key, FlightStatus::LateAirline).unwrap();
        channel.reject(&bob).await;

        let summary = escrow
            .credit_insurees(&key, &mut ledger, &channel, &mut events)
            .await
            .unwrap();
        assert_eq!(summary.credited, vec![alice.clone()]);
        assert_eq!(summary.failed, vec![bob.clone()]);
        assert_eq!(channel.delivered(&alice).await, Amount::milli_units(1_500));
        assert!(escrow.policy(&alice, &key).unwrap().credited);
        assert!(!escrow.policy(&bob, &key).unwrap().credited);
        assert_eq!(ledger.payable_balance(&bob), Amount::zero());

        // Retried once the wallet accepts funds again
        channel.accept(&bob).await;
        let retry = escrow
            .credit_insurees(&key, &mut ledger, &channel, &mut events)
            .await
            .unwrap();
        assert_eq!(retry.credited, vec![bob.clone()]);
        assert_eq!(channel.delivered(&bob).await, Amount::milli_units(1_500));
        assert_eq!(channel.delivered(&alice).await, Amount::milli_units(1_500));
    }

    #[tokio::test]
    async fn test_insufficient_pool_fails_passenger_only() {
        let config = SuretyConfig::default();
        let mut escrow = InsuranceEscrow::new(&config);
        let mut ledger = Ledger::new();
        let channel = InMemoryPayoutChannel::new();
        let mut events = Vec::new();
        let key = escrow
            .register_flight(&id("airline-1"), "ND1309", 1, &mut events)
            .unwrap();

        // Pool only holds the premium, which cannot cover a 1.5x payout
        escrow
            .buy_insurance(&id("p"), &key, Amount::units(1), &mut ledger, &mut events)
            .unwrap();
        escrow.resolve(&key, FlightStatus::LateAirline).unwrap();

        let summary = escrow
            .credit_insurees(&key, &mut ledger, &channel, &mut events)
            .await
            .unwrap();
        assert_eq!(summary.failed, vec![id("p")]);
        assert!(!escrow.policy(&id("p"), &key).unwrap().credited);
        assert_eq!(ledger.pool_balance(), Amount::units(1));
    }

    #[tokio::test]
    async fn test_withdraw() {
        let (mut escrow, mut ledger, key) = setup(PayoutMode::Pull);
        let channel = InMemoryPayoutChannel::new();
        let mut events = Vec::new();
        let passenger = id("passenger-1");

        escrow
            .buy_insurance(&passenger, &key, Amount::units(1), &mut ledger, &mut events)
            .unwrap();
        escrow.resolve(&key, FlightStatus::LateAirline).unwrap();
        escrow
            .credit_insurees(&key, &mut ledger, &channel, &mut events)
            .await
            .unwrap();

        let too_much = escrow
            .withdraw(&passenger, Amount::units(2), &mut ledger, &channel, &mut events)
            .await;
        assert!(matches!(too_much, Err(SuretyError::InsufficientBalance { .. })));

        channel.reject(&passenger).await;
        let rejected = escrow
            .withdraw(&passenger, Amount::units(1), &mut ledger, &channel, &mut events)
            .await;
        assert!(matches!(rejected, Err(SuretyError::TransferFailed { .. })));
        assert_eq!(ledger.payable_balance(&passenger), Amount::milli_units(1_500));

        channel.accept(&passenger).await;
        escrow
            .withdraw(&passenger, Amount::units(1), &mut ledger, &channel, &mut events)
            .await
            .unwrap();
        assert_eq!(ledger.payable_balance(&passenger), Amount::milli_units(500));
        assert_eq!(channel.delivered(&passenger).await, Amount::units(1));
    }

    #[tokio::test]
    async fn test_unpayable_policy_does_not_abort_batch() {
        let config = SuretyConfig {
            max_policy_amount: Amount::new(u128::MAX),
            ..SuretyConfig::default()
        };
        let mut escrow = InsuranceEscrow::new(&config);
        let mut ledger = funded_ledger();
        let channel = InMemoryPayoutChannel::new();
        let mut events = Vec::new();
        let key = escrow
            .register_flight(&id("airline-1"), "ND1309", 1, &mut events)
            .unwrap();

        // Too large to scale by the multiplier
        let whale = id("whale");
        escrow
            .buy_insurance(&whale, &key, Amount::new(10u128.pow(30)), &mut ledger, &mut events)
            .unwrap();
        let passenger = id("passenger-1");
        escrow
            .buy_insurance(&passenger, &key, Amount::units(1), &mut ledger, &mut events)
            .unwrap();
        escrow.resolve(&key, FlightStatus::LateAirline).unwrap();
        events.clear();

        let summary = escrow
            .credit_insurees(&key, &mut ledger, &channel, &mut events)
            .await
            .unwrap();
        assert_eq!(summary.credited, vec![passenger.clone()]);
        assert_eq!(summary.failed, vec![whale.clone()]);
        assert_eq!(summary.total_paid, Amount::milli_units(1_500));
        assert!(!escrow.policy(&whale, &key).unwrap().credited);

        let names: Vec<_> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["InsuranceCredited", "PayoutFailed"]);
    }

    #[tokio::test]
    async fn test_stalled_push_times_out_and_rolls_back() {
        let config = SuretyConfig {
            payout_mode: PayoutMode::Push,
            payout_timeout_ms: 20,
            ..SuretyConfig::default()
        };
        let mut escrow = InsuranceEscrow::new(&config);
        let mut ledger = funded_ledger();
        let mut events = Vec::new();
        let key = escrow
            .register_flight(&id("airline-1"), "ND1309", 1, &mut events)
            .unwrap();
        let passenger = id("passenger-1");
        escrow
            .buy_insurance(&passenger, &key, Amount::units(1), &mut ledger, &mut events)
            .unwrap();
        escrow.resolve(&key, FlightStatus::LateAirline).unwrap();

        let summary = escrow
            .credit_insurees(&key, &mut ledger, &StalledChannel, &mut events)
            .await
            .unwrap();
        assert_eq!(summary.failed, vec![passenger.clone()]);
        assert!(!escrow.policy(&passenger, &key).unwrap().credited);
        assert_eq!(ledger.payable_balance(&passenger), Amount::zero());
        assert_eq!(ledger.pool_balance(), Amount::units(11));
        assert!(matches!(
            events.last(),
            Some(DomainEvent::PayoutFailed { reason, .. }) if reason.contains("20ms")
        ));
    }

    #[tokio::test]
    async fn test_stalled_withdrawal_times_out() {
        let config = SuretyConfig {
            payout_timeout_ms: 20,
            ..SuretyConfig::default()
        };
        let escrow = InsuranceEscrow::new(&config);
        let mut ledger = Ledger::new();
        let mut events = Vec::new();
        let passenger = id("passenger-1");
        ledger
            .credit(
                LedgerAccount::Payable(passenger.clone()),
                Amount::units(1),
                EntryReason::InsurancePayout {
                    flight: FlightKey::derive(&id("airline-1"), "ND1309", 1),
                },
            )
            .unwrap();

        let result = escrow
            .withdraw(&passenger, Amount::units(1), &mut ledger, &StalledChannel, &mut events)
            .await;
        assert!(matches!(result, Err(SuretyError::TransferFailed { .. })));
        assert_eq!(ledger.payable_balance(&passenger), Amount::units(1));
        assert!(events.is_empty());
    }
}
