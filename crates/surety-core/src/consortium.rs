//! The authoritative consortium store
//!
//! One [`Consortium`] owns every component behind a single write lock.
//! Each mutating call takes the lock once, checks the operational gate,
//! validates, mutates, and only then commits its events to the log. A
//! rejected call leaves both state and log untouched, and no two calls
//! interleave, so the event sequence is the total order of operations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use surety_ledger::Ledger;
use surety_types::{
    Amount, DomainEvent, EventRecord, FlightKey, FlightStatus, ParticipantId, RequestIndex,
    SuretyConfig,
};
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SuretyError};
use crate::escrow::{CreditSummary, Flight, InsuranceEscrow, Policy};
use crate::events::EventLog;
use crate::gate::OperationalGate;
use crate::governance::{AdmissionOutcome, Airline, AirlineGovernance};
use crate::oracle::{
    IndexAssigner, KeccakIndexAssigner, OracleConsensus, OracleRequest, Reporter, Tally,
};
use crate::payout::{InMemoryPayoutChannel, PayoutChannel, TransferReceipt};

/// Result of `submit_response`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseOutcome {
    /// Counted; the status bucket has not reached quorum yet
    Pending { matching: usize, required: usize },
    /// Quorum reached; the flight is resolved and its policies were credited
    Resolved {
        status: FlightStatus,
        credit: CreditSummary,
    },
}

/// Point-in-time counters for dashboards and the simulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsortiumSummary {
    pub enabled: bool,
    pub airlines: u32,
    /// Funded or registered airlines
    pub staked_airlines: usize,
    pub flights: usize,
    pub resolved_flights: usize,
    pub reporters: usize,
    pub pool_balance: Amount,
    pub events: usize,
}

/// Everything the consortium owns
#[derive(Debug)]
pub struct ConsortiumState {
    pub gate: OperationalGate,
    pub governance: AirlineGovernance,
    pub escrow: InsuranceEscrow,
    pub oracle: OracleConsensus,
    pub ledger: Ledger,
    pub log: EventLog,
}

/// Builder for a [`Consortium`] with custom seams
pub struct ConsortiumBuilder {
    owner: ParticipantId,
    genesis: ParticipantId,
    config: SuretyConfig,
    channel: Option<Arc<dyn PayoutChannel>>,
    clock: Option<Arc<dyn Clock>>,
    assigner: Option<Box<dyn IndexAssigner>>,
}

impl ConsortiumBuilder {
    pub fn config(mut self, config: SuretyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn payout_channel(mut self, channel: Arc<dyn PayoutChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn index_assigner(mut self, assigner: Box<dyn IndexAssigner>) -> Self {
        self.assigner = Some(assigner);
        self
    }

    pub fn build(self) -> Result<Consortium> {
        self.config.validate().map_err(SuretyError::InvalidConfig)?;

        let assigner = self
            .assigner
            .unwrap_or_else(|| Box::new(KeccakIndexAssigner::new()));
        let state = ConsortiumState {
            gate: OperationalGate::new(self.owner.clone()),
            governance: AirlineGovernance::new(self.genesis.clone(), &self.config),
            escrow: InsuranceEscrow::new(&self.config),
            oracle: OracleConsensus::new(&self.config, assigner),
            ledger: Ledger::new(),
            log: EventLog::new(self.config.event_buffer),
        };
        info!(owner = %self.owner, genesis = %self.genesis, "consortium initialized");

        Ok(Consortium {
            state: Arc::new(RwLock::new(state)),
            channel: self
                .channel
                .unwrap_or_else(|| Arc::new(InMemoryPayoutChannel::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: Arc::new(self.config),
        })
    }
}

/// Shared handle to the consortium; clones see the same state
#[derive(Clone)]
pub struct Consortium {
    state: Arc<RwLock<ConsortiumState>>,
    channel: Arc<dyn PayoutChannel>,
    clock: Arc<dyn Clock>,
    config: Arc<SuretyConfig>,
}

impl Consortium {
    /// Consortium with the default seams: in-memory payouts, wall clock,
    /// Keccak index assignment
    pub fn new(owner: ParticipantId, genesis: ParticipantId, config: SuretyConfig) -> Result<Self> {
        Self::builder(owner, genesis).config(config).build()
    }

    pub fn builder(owner: ParticipantId, genesis: ParticipantId) -> ConsortiumBuilder {
        ConsortiumBuilder {
            owner,
            genesis,
            config: SuretyConfig::default(),
            channel: None,
            clock: None,
            assigner: None,
        }
    }

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    /// Run a synchronous, gated operation and commit its events on success
    async fn mutate<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut ConsortiumState, &mut Vec<DomainEvent>) -> Result<T>,
    {
        let mut state = self.state.write().await;
        state.gate.require_enabled()?;
        let mut events = Vec::new();
        let output = op(&mut *state, &mut events)?;
        state.log.commit(events);
        Ok(output)
    }

    // ========================================================================
    // Operational gate
    // ========================================================================

    pub async fn is_enabled(&self) -> bool {
        self.state.read().await.gate.is_enabled()
    }

    /// Pause or resume every mutating operation; owner only, never gated
    pub async fn set_enabled(&self, caller: &ParticipantId, value: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let mut events = Vec::new();
        state.gate.set_enabled(caller, value, &mut events)?;
        state.log.commit(events);
        Ok(())
    }

    pub async fn authorize_caller(&self, caller: &ParticipantId, target: &ParticipantId) -> Result<()> {
        let mut state = self.state.write().await;
        let mut events = Vec::new();
        state.gate.authorize_caller(caller, target, &mut events)?;
        state.log.commit(events);
        Ok(())
    }

    pub async fn deauthorize_caller(&self, caller: &ParticipantId, target: &ParticipantId) -> Result<()> {
        let mut state = self.state.write().await;
        let mut events = Vec::new();
        state.gate.deauthorize_caller(caller, target, &mut events)?;
        state.log.commit(events);
        Ok(())
    }

    pub async fn is_authorized(&self, caller: &ParticipantId) -> bool {
        self.state.read().await.gate.is_authorized(caller)
    }

    /// Callers the owner granted administrative rights, owner excluded
    pub async fn authorized_callers(&self) -> Vec<ParticipantId> {
        self.state.read().await.gate.authorized_callers()
    }

    // ========================================================================
    // Airline governance
    // ========================================================================

    pub async fn apply(&self, caller: &ParticipantId) -> Result<Airline> {
        self.mutate(|s, events| Ok(s.governance.apply(caller, events)))
            .await
    }

    pub async fn fund(&self, caller: &ParticipantId, amount: Amount) -> Result<Airline> {
        self.mutate(|s, events| s.governance.fund(caller, amount, &mut s.ledger, events))
            .await
    }

    pub async fn register_airline(
        &self,
        caller: &ParticipantId,
        candidate: &ParticipantId,
    ) -> Result<AdmissionOutcome> {
        self.mutate(|s, events| s.governance.register_airline(caller, candidate, events))
            .await
    }

    pub async fn is_airline(&self, id: &ParticipantId) -> bool {
        self.state.read().await.governance.is_airline(id)
    }

    pub async fn airline_count(&self) -> u32 {
        self.state.read().await.governance.count()
    }

    pub async fn airline(&self, id: &ParticipantId) -> Option<Airline> {
        self.state.read().await.governance.airline(id).cloned()
    }

    // ========================================================================
    // Insurance escrow
    // ========================================================================

    /// Register a flight; only member airlines may
    pub async fn register_flight(
        &self,
        caller: &ParticipantId,
        designator: &str,
        departure_timestamp: u64,
    ) -> Result<FlightKey> {
        self.mutate(|s, events| {
            if !s.governance.is_airline(caller) {
                return Err(SuretyError::CallerNotAuthorized {
                    caller: caller.to_string(),
                });
            }
            s.escrow
                .register_flight(caller, designator, departure_timestamp, events)
        })
        .await
    }

    pub async fn buy_insurance(
        &self,
        passenger: &ParticipantId,
        key: &FlightKey,
        amount: Amount,
    ) -> Result<Policy> {
        self.mutate(|s, events| s.escrow.buy_insurance(passenger, key, amount, &mut s.ledger, events))
            .await
    }

    /// Administrative override of the crediting step
    ///
    /// Oracle quorum credits policyholders on its own; this path exists for
    /// operators, and only the owner or an authorized caller may use it.
    pub async fn admin_credit_insurees(
        &self,
        caller: &ParticipantId,
        key: &FlightKey,
    ) -> Result<CreditSummary> {
        let mut state = self.state.write().await;
        let s = &mut *state;
        s.gate.require_enabled()?;
        if !s.gate.is_authorized(caller) {
            return Err(SuretyError::Unauthorized {
                caller: caller.to_string(),
                action: "admin_credit_insurees".to_string(),
            });
        }

        let mut events = Vec::new();
        let summary = s
            .escrow
            .credit_insurees(key, &mut s.ledger, self.channel.as_ref(), &mut events)
            .await?;
        s.log.commit(events);
        Ok(summary)
    }

    /// Move credited funds out to the caller through the payout channel
    pub async fn withdraw(&self, caller: &ParticipantId, amount: Amount) -> Result<TransferReceipt> {
        let mut state = self.state.write().await;
        let s = &mut *state;
        s.gate.require_enabled()?;

        let mut events = Vec::new();
        let receipt = s
            .escrow
            .withdraw(caller, amount, &mut s.ledger, self.channel.as_ref(), &mut events)
            .await?;
        s.log.commit(events);
        Ok(receipt)
    }

    pub async fn flight(&self, key: &FlightKey) -> Option<Flight> {
        self.state.read().await.escrow.flight(key).cloned()
    }

    pub async fn policy(&self, passenger: &ParticipantId, key: &FlightKey) -> Option<Policy> {
        self.state.read().await.escrow.policy(passenger, key).cloned()
    }

    pub async fn policies(&self, key: &FlightKey) -> Vec<Policy> {
        self.state.read().await.escrow.policies(key)
    }

    pub async fn payable_balance(&self, id: &ParticipantId) -> Amount {
        self.state.read().await.ledger.payable_balance(id)
    }

    pub async fn pool_balance(&self) -> Amount {
        self.state.read().await.ledger.pool_balance()
    }

    // ========================================================================
    // Oracle consensus
    // ========================================================================

    pub async fn register_reporter(&self, caller: &ParticipantId, stake: Amount) -> Result<Reporter> {
        self.mutate(|s, events| s.oracle.register_reporter(caller, stake, &mut s.ledger, events))
            .await
    }

    pub async fn reporter_indexes(&self, id: &ParticipantId) -> Result<Vec<RequestIndex>> {
        self.state.read().await.oracle.reporter_indexes(id)
    }

    /// Ask the reporters for the status of a registered, unresolved flight
    pub async fn open_request(
        &self,
        caller: &ParticipantId,
        airline: &ParticipantId,
        designator: &str,
        departure_timestamp: u64,
    ) -> Result<RequestIndex> {
        let now = self.clock.now();
        self.mutate(|s, events| {
            let key = FlightKey::derive(airline, designator, departure_timestamp);
            let flight = s.escrow.open_flight(&key)?;
            s.oracle.open_request(caller, flight, now, events)
        })
        .await
    }

    /// Count a reporter's observation; quorum resolves and credits the flight
    pub async fn submit_response(
        &self,
        caller: &ParticipantId,
        index: RequestIndex,
        key: &FlightKey,
        status: FlightStatus,
    ) -> Result<ResponseOutcome> {
        let mut state = self.state.write().await;
        let s = &mut *state;
        s.gate.require_enabled()?;

        let now = self.clock.now();
        let mut events = Vec::new();
        let outcome = match s
            .oracle
            .submit_response(caller, index, key, status, now, &mut events)?
        {
            Tally::Pending { matching, required } => ResponseOutcome::Pending { matching, required },
            Tally::Quorum { status } => {
                let credited = match s.escrow.resolve(key, status) {
                    Ok(()) => {
                        s.escrow
                            .credit_insurees(key, &mut s.ledger, self.channel.as_ref(), &mut events)
                            .await
                    }
                    Err(err) => Err(err),
                };
                match credited {
                    Ok(credit) => ResponseOutcome::Resolved { status, credit },
                    Err(err) => {
                        // The request is already resolved; its events stay with it
                        s.log.commit(events);
                        return Err(err);
                    }
                }
            }
        };
        s.log.commit(events);
        Ok(outcome)
    }

    /// Every request opened for a flight, ordered by index
    pub async fn requests(&self, key: &FlightKey) -> Vec<OracleRequest> {
        self.state
            .read()
            .await
            .oracle
            .requests_for(key)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn request(&self, index: RequestIndex, key: &FlightKey) -> Option<OracleRequest> {
        self.state.read().await.oracle.request(index, key).cloned()
    }

    pub async fn reporter(&self, id: &ParticipantId) -> Option<Reporter> {
        self.state.read().await.oracle.reporter(id).cloned()
    }

    // ========================================================================
    // Events and summaries
    // ========================================================================

    /// Snapshot of the event log
    pub async fn events(&self) -> Vec<EventRecord> {
        self.state.read().await.log.records().to_vec()
    }

    /// Live feed of events committed from now on
    pub async fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.state.read().await.log.subscribe()
    }

    pub async fn summary(&self) -> ConsortiumSummary {
        let state = self.state.read().await;
        ConsortiumSummary {
            enabled: state.gate.is_enabled(),
            airlines: state.governance.count(),
            staked_airlines: state
                .governance
                .airlines()
                .filter(|a| a.state.has_staked())
                .count(),
            flights: state.escrow.flights().count(),
            resolved_flights: state
                .escrow
                .flights()
                .filter(|f| f.status.is_resolved())
                .count(),
            reporters: state.oracle.reporter_count(),
            pool_balance: state.ledger.pool_balance(),
            events: state.log.len(),
        }
    }
}
