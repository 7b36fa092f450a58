//! Oracle consensus - independent reporters agreeing on a flight status
//!
//! Reporters stake once and receive a handful of index slots. A status
//! request is opened on one slot for one flight, and only reporters holding
//! that slot may answer it. Responses are bucketed by status; the first
//! bucket to reach the quorum wins and the request becomes immutable. Late
//! responses, including ones that would have formed a larger majority,
//! are rejected with `RequestClosed`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use surety_ledger::{EntryReason, Ledger, LedgerAccount};
use surety_types::{
    Amount, DomainEvent, FlightKey, FlightStatus, ParticipantId, RequestIndex, SuretyConfig,
};
use tracing::{debug, info};

use crate::error::{Result, SuretyError};
use crate::escrow::Flight;

/// Chooses index slots for reporters and requests
pub trait IndexAssigner: Send + Sync {
    /// Up to `count` distinct slots in `0..range` for a new reporter
    fn assign(&mut self, reporter: &ParticipantId, count: u8, range: u8) -> Vec<RequestIndex>;

    /// Slot a new request is opened on
    fn pick(&mut self, requester: &ParticipantId, range: u8) -> RequestIndex;
}

/// Pseudorandom slots from Keccak-256 over `(participant, nonce)`
#[derive(Debug, Clone, Default)]
pub struct KeccakIndexAssigner {
    nonce: u64,
}

impl KeccakIndexAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a chosen nonce, for reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self { nonce: seed }
    }

    fn draw(&mut self, participant: &ParticipantId, range: u8) -> RequestIndex {
        let mut hasher = Keccak256::new();
        hasher.update(participant.as_str().as_bytes());
        hasher.update(self.nonce.to_be_bytes());
        self.nonce = self.nonce.wrapping_add(1);
        let digest = hasher.finalize();
        digest[0] % range.max(1)
    }
}

impl IndexAssigner for KeccakIndexAssigner {
    fn assign(&mut self, reporter: &ParticipantId, count: u8, range: u8) -> Vec<RequestIndex> {
        let wanted = usize::from(count.min(range));
        let mut indexes = Vec::with_capacity(wanted);
        while indexes.len() < wanted {
            let index = self.draw(reporter, range);
            if !indexes.contains(&index) {
                indexes.push(index);
            }
        }
        indexes
    }

    fn pick(&mut self, requester: &ParticipantId, range: u8) -> RequestIndex {
        self.draw(requester, range)
    }
}

/// Hands out preset slots
#[derive(Debug, Clone, Default)]
pub struct FixedIndexAssigner {
    default_indexes: Vec<RequestIndex>,
    overrides: HashMap<ParticipantId, Vec<RequestIndex>>,
    request_index: RequestIndex,
}

impl FixedIndexAssigner {
    /// Every reporter gets `indexes`; every request opens on `request_index`
    pub fn new(indexes: Vec<RequestIndex>, request_index: RequestIndex) -> Self {
        Self {
            default_indexes: indexes,
            overrides: HashMap::new(),
            request_index,
        }
    }

    pub fn with_reporter(mut self, reporter: ParticipantId, indexes: Vec<RequestIndex>) -> Self {
        self.overrides.insert(reporter, indexes);
        self
    }
}

impl IndexAssigner for FixedIndexAssigner {
    fn assign(&mut self, reporter: &ParticipantId, count: u8, _range: u8) -> Vec<RequestIndex> {
        self.overrides
            .get(reporter)
            .unwrap_or(&self.default_indexes)
            .iter()
            .copied()
            .take(usize::from(count))
            .collect()
    }

    fn pick(&mut self, _requester: &ParticipantId, _range: u8) -> RequestIndex {
        self.request_index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporter {
    pub id: ParticipantId,
    pub stake: Amount,
    pub indexes: Vec<RequestIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Open,
    Resolved { status: FlightStatus },
    /// Another request for the same flight reached quorum first
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub index: RequestIndex,
    pub key: FlightKey,
    pub airline: ParticipantId,
    pub designator: String,
    pub departure_timestamp: u64,
    pub requester: ParticipantId,
    pub opened_at: u64,
    pub expires_at: Option<u64>,
    pub state: RequestState,
    pub responses_by_status: BTreeMap<FlightStatus, BTreeSet<ParticipantId>>,
    responders: BTreeSet<ParticipantId>,
}

impl OracleRequest {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn is_open(&self) -> bool {
        self.state == RequestState::Open
    }

    pub fn has_responded(&self, reporter: &ParticipantId) -> bool {
        self.responders.contains(reporter)
    }

    pub fn response_count(&self) -> usize {
        self.responders.len()
    }
}

/// Tally after a response was counted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tally {
    Pending { matching: usize, required: usize },
    Quorum { status: FlightStatus },
}

pub struct OracleConsensus {
    reporters: HashMap<ParticipantId, Reporter>,
    requests: HashMap<(RequestIndex, FlightKey), OracleRequest>,
    assigner: Box<dyn IndexAssigner>,
    quorum_size: usize,
    minimum_reporter_stake: Amount,
    reporter_index_count: u8,
    index_range: u8,
    request_ttl_secs: Option<u64>,
}

impl fmt::Debug for OracleConsensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConsensus")
            .field("reporters", &self.reporters.len())
            .field("requests", &self.requests.len())
            .field("quorum_size", &self.quorum_size)
            .finish()
    }
}

impl OracleConsensus {
    pub fn new(config: &SuretyConfig, assigner: Box<dyn IndexAssigner>) -> Self {
        Self {
            reporters: HashMap::new(),
            requests: HashMap::new(),
            assigner,
            quorum_size: config.quorum_size as usize,
            minimum_reporter_stake: config.minimum_reporter_stake,
            reporter_index_count: config.reporter_index_count,
            index_range: config.index_range,
            request_ttl_secs: config.request_ttl_secs,
        }
    }

    pub fn is_reporter(&self, id: &ParticipantId) -> bool {
        self.reporters.contains_key(id)
    }

    pub fn reporter(&self, id: &ParticipantId) -> Option<&Reporter> {
        self.reporters.get(id)
    }

    pub fn reporter_count(&self) -> usize {
        self.reporters.len()
    }

    pub fn reporter_indexes(&self, id: &ParticipantId) -> Result<Vec<RequestIndex>> {
        self.reporters
            .get(id)
            .map(|r| r.indexes.clone())
            .ok_or_else(|| SuretyError::NotAReporter {
                caller: id.to_string(),
            })
    }

    pub fn request(&self, index: RequestIndex, key: &FlightKey) -> Option<&OracleRequest> {
        self.requests.get(&(index, *key))
    }

    /// Every request ever opened for a flight
    pub fn requests_for(&self, key: &FlightKey) -> Vec<&OracleRequest> {
        let mut requests: Vec<_> = self.requests.values().filter(|r| &r.key == key).collect();
        requests.sort_by_key(|r| r.index);
        requests
    }

    pub fn register_reporter(
        &mut self,
        caller: &ParticipantId,
        stake: Amount,
        ledger: &mut Ledger,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Reporter> {
        if self.reporters.contains_key(caller) {
            return Err(SuretyError::ReporterAlreadyRegistered {
                reporter: caller.to_string(),
            });
        }
        if stake < self.minimum_reporter_stake {
            return Err(SuretyError::InsufficientStake {
                provided: stake,
                minimum: self.minimum_reporter_stake,
            });
        }

        ledger.credit(
            LedgerAccount::Pool,
            stake,
            EntryReason::ReporterStake {
                reporter: caller.clone(),
            },
        )?;
        let indexes = self
            .assigner
            .assign(caller, self.reporter_index_count, self.index_range);

        let reporter = Reporter {
            id: caller.clone(),
            stake,
            indexes: indexes.clone(),
        };
        self.reporters.insert(caller.clone(), reporter.clone());
        info!(reporter = %caller, %stake, ?indexes, "oracle reporter registered");
        events.push(DomainEvent::OracleReporterRegistered {
            reporter: caller.clone(),
            stake,
            indexes,
        });
        Ok(reporter)
    }

    /// Open a status request for an unresolved flight
    ///
    /// Re-opening a live request returns its index unchanged; an expired one
    /// starts over with an empty tally.
    pub fn open_request(
        &mut self,
        requester: &ParticipantId,
        flight: &Flight,
        now: u64,
        events: &mut Vec<DomainEvent>,
    ) -> Result<RequestIndex> {
        let index = self.assigner.pick(requester, self.index_range);
        let slot = (index, flight.key);

        if let Some(existing) = self.requests.get(&slot) {
            if existing.is_open() && !existing.is_expired(now) {
                debug!(index, key = %flight.key.short(), "oracle request already open");
                return Ok(index);
            }
        }

        let expires_at = self.request_ttl_secs.map(|ttl| now.saturating_add(ttl));
        self.requests.insert(
            slot,
            OracleRequest {
                index,
                key: flight.key,
                airline: flight.airline.clone(),
                designator: flight.designator.clone(),
                departure_timestamp: flight.departure_timestamp,
                requester: requester.clone(),
                opened_at: now,
                expires_at,
                state: RequestState::Open,
                responses_by_status: BTreeMap::new(),
                responders: BTreeSet::new(),
            },
        );
        info!(index, key = %flight.key.short(), %requester, "oracle request opened");
        events.push(DomainEvent::OracleRequestOpened {
            index,
            key: flight.key,
            airline: flight.airline.clone(),
            designator: flight.designator.clone(),
            departure_timestamp: flight.departure_timestamp,
            requester: requester.clone(),
            expires_at,
        });
        Ok(index)
    }

    /// Count one reporter's observation
    pub fn submit_response(
        &mut self,
        caller: &ParticipantId,
        index: RequestIndex,
        key: &FlightKey,
        status: FlightStatus,
        now: u64,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Tally> {
        if !status.is_resolved() {
            return Err(SuretyError::InvalidStatus { status });
        }
        let reporter = self
            .reporters
            .get(caller)
            .ok_or_else(|| SuretyError::NotAReporter {
                caller: caller.to_string(),
            })?;
        let request = self
            .requests
            .get_mut(&(index, *key))
            .ok_or_else(|| SuretyError::RequestNotFound {
                index,
                key: key.to_string(),
            })?;
        if !request.is_open() {
            return Err(SuretyError::RequestClosed {
                index,
                key: key.to_string(),
            });
        }
        if let Some(expired_at) = request.expires_at.filter(|_| request.is_expired(now)) {
            return Err(SuretyError::RequestExpired {
                index,
                key: key.to_string(),
                expired_at,
            });
        }
        if !reporter.indexes.contains(&index) {
            return Err(SuretyError::UnassignedReporter {
                reporter: caller.to_string(),
                index,
            });
        }
        if request.has_responded(caller) {
            return Err(SuretyError::AlreadyResponded {
                reporter: caller.to_string(),
                index,
                key: key.to_string(),
            });
        }

        request.responders.insert(caller.clone());
        let bucket = request.responses_by_status.entry(status).or_default();
        bucket.insert(caller.clone());
        let matching = bucket.len();
        debug!(%caller, index, key = %key.short(), %status, matching, "oracle response");
        events.push(DomainEvent::OracleResponseSubmitted {
            index,
            key: *key,
            reporter: caller.clone(),
            status,
            matching,
        });

        if matching < self.quorum_size {
            return Ok(Tally::Pending {
                matching,
                required: self.quorum_size,
            });
        }

        let reporters: Vec<ParticipantId> = bucket.iter().cloned().collect();
        request.state = RequestState::Resolved { status };
        self.close_siblings(index, key);
        info!(index, key = %key.short(), %status, "flight status resolved");
        events.push(DomainEvent::FlightStatusResolved {
            index,
            key: *key,
            status,
            reporters,
        });
        Ok(Tally::Quorum { status })
    }

    fn close_siblings(&mut self, resolved: RequestIndex, key: &FlightKey) {
        for request in self
            .requests
            .values_mut()
            .filter(|r| &r.key == key && r.index != resolved && r.is_open())
        {
            request.state = RequestState::Closed;
        }
    }
}
