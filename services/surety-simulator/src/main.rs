//! FlightSurety Simulator
//!
//! Boots a consortium in-process and drives one full insurance cycle:
//!
//! 1. The genesis airline admits the others (bootstrap, then majority vote)
//! 2. Airlines register flights
//! 3. Passengers buy cover up to the policy cap
//! 4. Reporters stake and receive index slots
//! 5. One status request per flight; assigned reporters answer until quorum
//! 6. Credited passengers withdraw their payouts
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run -p surety-simulator -- --airlines 6 --flights 4 --seed 7
//! cargo run -p surety-simulator -- --payout-mode push --json
//! ```
//!
//! Consortium constants come from `SURETY_*` variables (a `.env` file is
//! honored); flags override the payout mode.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use surety_core::{
    AdmissionOutcome, Amount, Consortium, FlightKey, FlightStatus, InMemoryPayoutChannel,
    KeccakIndexAssigner, ParticipantId, PayoutMode, ResponseOutcome, SuretyConfig, SuretyError,
    TYPES_VERSION,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Share of reporters that observe the true status
const HONEST_RATE: f64 = 0.8;

/// Request attempts per flight before giving up on a resolution
const MAX_ATTEMPTS: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "surety-simulator")]
#[command(version)]
#[command(about = "Simulate a FlightSurety consortium end to end", long_about = None)]
struct Cli {
    /// Member airlines, genesis included
    #[arg(long, default_value = "6")]
    airlines: u32,

    /// Oracle reporters in the fleet
    #[arg(long, default_value = "20")]
    reporters: u32,

    /// Passengers buying cover
    #[arg(long, default_value = "10")]
    passengers: u32,

    /// Flights to register
    #[arg(long, default_value = "5")]
    flights: u32,

    /// RNG seed; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Print the event log as JSON
    #[arg(long)]
    json: bool,

    /// Payout mode (pull, push)
    #[arg(long)]
    payout_mode: Option<PayoutMode>,
}

struct SimFlight {
    airline: ParticipantId,
    designator: String,
    departure: u64,
    key: FlightKey,
    observed: FlightStatus,
    resolved: Option<FlightStatus>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = SuretyConfig::from_env().context("reading SURETY_* configuration")?;
    if let Some(mode) = cli.payout_mode {
        config.payout_mode = mode;
    }
    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);

    info!(
        seed,
        payout_mode = ?config.payout_mode,
        types_version = TYPES_VERSION,
        "Starting FlightSurety simulator..."
    );

    let owner = ParticipantId::from("owner");
    let genesis = ParticipantId::from("airline-1");
    let channel = InMemoryPayoutChannel::new();
    let consortium = Consortium::builder(owner, genesis.clone())
        .config(config.clone())
        .payout_channel(Arc::new(channel.clone()))
        .index_assigner(Box::new(KeccakIndexAssigner::with_seed(seed)))
        .build()?;

    let members = admit_airlines(&consortium, &config, genesis, cli.airlines).await?;
    let mut flights = register_flights(&consortium, &members, cli.flights, &mut rng).await?;
    let passengers = sell_policies(&consortium, &config, &flights, cli.passengers, &mut rng).await?;
    let reporters = register_reporters(&consortium, &config, cli.reporters).await?;

    for flight in flights.iter_mut() {
        let resolved = resolve_flight(&consortium, &reporters, &passengers, flight, &mut rng).await?;
        flight.resolved = resolved;
    }

    let mut withdrawn = Amount::zero();
    for passenger in &passengers {
        let balance = consortium.payable_balance(passenger).await;
        if balance.is_zero() {
            continue;
        }
        let receipt = consortium.withdraw(passenger, balance).await?;
        withdrawn = withdrawn.checked_add(receipt.amount).unwrap_or(withdrawn);
    }

    if cli.json {
        let events = consortium.events().await;
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    println!();
    println!("Flights");
    println!("{:<10} {:<12} {:<16} {:<16} {:>8}", "flight", "airline", "observed", "resolved", "policies");
    for flight in &flights {
        let resolved = flight
            .resolved
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unresolved".to_string());
        println!(
            "{:<10} {:<12} {:<16} {:<16} {:>8}",
            flight.designator,
            flight.airline.as_str(),
            flight.observed.to_string(),
            resolved,
            consortium.policies(&flight.key).await.len()
        );
    }

    let summary = consortium.summary().await;
    let mut delivered = Amount::zero();
    for passenger in &passengers {
        delivered = delivered
            .checked_add(channel.delivered(passenger).await)
            .unwrap_or(delivered);
    }
    println!();
    println!("Summary");
    println!("  airlines:          {} ({} staked)", summary.airlines, summary.staked_airlines);
    println!("  reporters:         {}", summary.reporters);
    println!("  flights resolved:  {}/{}", summary.resolved_flights, summary.flights);
    println!("  pool balance:      {}", summary.pool_balance);
    println!("  withdrawn (pull):  {}", withdrawn);
    println!("  delivered (total): {}", delivered);
    println!("  events recorded:   {}", summary.events);
    println!("  seed:              {}", seed);

    Ok(())
}

/// Apply, fund and admit airlines until `target` are members
async fn admit_airlines(
    consortium: &Consortium,
    config: &SuretyConfig,
    genesis: ParticipantId,
    target: u32,
) -> anyhow::Result<Vec<ParticipantId>> {
    let mut members = vec![genesis];
    for n in 2..=target {
        let candidate = ParticipantId::from_string(format!("airline-{}", n));
        consortium.apply(&candidate).await?;
        consortium.fund(&candidate, config.minimum_stake).await?;

        for voter in members.clone() {
            match consortium.register_airline(&voter, &candidate).await? {
                AdmissionOutcome::Registered => break,
                AdmissionOutcome::Approved => {}
                AdmissionOutcome::VoteRecorded { votes, required } => {
                    debug!(%candidate, %voter, votes, required, "vote recorded");
                }
            }
        }

        if consortium.is_airline(&candidate).await {
            members.push(candidate);
        } else {
            warn!(%candidate, "airline was not admitted");
        }
    }
    info!(members = members.len(), "airline admission complete");
    Ok(members)
}

async fn register_flights(
    consortium: &Consortium,
    members: &[ParticipantId],
    count: u32,
    rng: &mut StdRng,
) -> anyhow::Result<Vec<SimFlight>> {
    let base = 1_700_000_000u64;
    let mut flights = Vec::new();
    for n in 0..count {
        let airline = members
            .choose(rng)
            .cloned()
            .context("consortium has no members")?;
        let designator = format!("FS{:03}", 100 + n);
        let departure = base + u64::from(n) * 3_600;
        let key = consortium
            .register_flight(&airline, &designator, departure)
            .await?;
        let observed = FlightStatus::REPORTABLE
            .choose(rng)
            .copied()
            .unwrap_or(FlightStatus::OnTime);

        flights.push(SimFlight {
            airline,
            designator,
            departure,
            key,
            observed,
            resolved: None,
        });
    }
    Ok(flights)
}

/// Every passenger covers roughly half the flights with a random premium
async fn sell_policies(
    consortium: &Consortium,
    config: &SuretyConfig,
    flights: &[SimFlight],
    count: u32,
    rng: &mut StdRng,
) -> anyhow::Result<Vec<ParticipantId>> {
    let cap = config.max_policy_amount.base_units();
    let mut passengers = Vec::new();
    for n in 1..=count {
        let passenger = ParticipantId::from_string(format!("passenger-{}", n));
        for flight in flights {
            if !rng.gen_bool(0.5) {
                continue;
            }
            let premium = Amount::new(rng.gen_range((cap / 10).max(1)..=cap.max(1)));
            match consortium.buy_insurance(&passenger, &flight.key, premium).await {
                Ok(policy) => debug!(%passenger, flight = %flight.designator, contribution = %policy.contribution, "policy bought"),
                Err(err @ SuretyError::PolicyCapExceeded { .. }) => warn!(%passenger, error = %err, "premium rejected"),
                Err(err) => return Err(err.into()),
            }
        }
        passengers.push(passenger);
    }
    Ok(passengers)
}

async fn register_reporters(
    consortium: &Consortium,
    config: &SuretyConfig,
    count: u32,
) -> anyhow::Result<Vec<ParticipantId>> {
    let mut reporters = Vec::new();
    for n in 1..=count {
        let reporter = ParticipantId::from_string(format!("reporter-{}", n));
        consortium
            .register_reporter(&reporter, config.minimum_reporter_stake)
            .await?;
        reporters.push(reporter);
    }
    Ok(reporters)
}

/// Open requests and let assigned reporters answer until quorum
async fn resolve_flight(
    consortium: &Consortium,
    reporters: &[ParticipantId],
    passengers: &[ParticipantId],
    flight: &SimFlight,
    rng: &mut StdRng,
) -> anyhow::Result<Option<FlightStatus>> {
    let requester = passengers
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| flight.airline.clone());

    for attempt in 1..=MAX_ATTEMPTS {
        let index = consortium
            .open_request(&requester, &flight.airline, &flight.designator, flight.departure)
            .await?;

        let mut assigned = Vec::new();
        for reporter in reporters {
            if consortium.reporter_indexes(reporter).await?.contains(&index) {
                assigned.push(reporter.clone());
            }
        }
        assigned.shuffle(rng);
        debug!(flight = %flight.designator, index, attempt, assigned = assigned.len(), "request opened");

        for reporter in &assigned {
            let status = if rng.gen_bool(HONEST_RATE) {
                flight.observed
            } else {
                FlightStatus::REPORTABLE
                    .choose(rng)
                    .copied()
                    .unwrap_or(flight.observed)
            };

            match consortium
                .submit_response(reporter, index, &flight.key, status)
                .await
            {
                Ok(ResponseOutcome::Pending { .. }) => {}
                Ok(ResponseOutcome::Resolved { status, credit }) => {
                    info!(
                        flight = %flight.designator,
                        %status,
                        credited = credit.credited.len(),
                        failed = credit.failed.len(),
                        total_paid = %credit.total_paid,
                        "flight resolved"
                    );
                    return Ok(Some(status));
                }
                Err(SuretyError::AlreadyResponded { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        warn!(flight = %flight.designator, index, attempt, "no quorum yet, reopening");
    }
    let slots: Vec<_> = consortium
        .requests(&flight.key)
        .await
        .into_iter()
        .map(|r| r.index)
        .collect();
    warn!(flight = %flight.designator, ?slots, "flight left unresolved");
    Ok(None)
}
