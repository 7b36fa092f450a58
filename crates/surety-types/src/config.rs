//! Consortium configuration
//!
//! Constants are fixed when the consortium is created. Defaults are the
//! reference values; `from_env` overlays `SURETY_*` variables.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Amount, Result, TypesError};

/// How credited payouts leave the escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutMode {
    /// Credit a payable balance; the passenger withdraws later
    Pull,
    /// Transfer to the passenger while crediting; failures roll the credit back
    ///
    /// Delivery runs while the consortium store is locked, so every other
    /// operation waits on the payout channel. Each transfer is bounded by
    /// `payout_timeout_ms`; a timed out transfer is rolled back like a
    /// rejected one.
    Push,
}

impl FromStr for PayoutMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            other => Err(format!("unknown payout mode {}", other)),
        }
    }
}

/// Configuration recognized by the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuretyConfig {
    /// Stake an airline must deposit per funding call
    pub minimum_stake: Amount,
    /// Membership size below which a single member admits directly
    pub bootstrap_size: u32,
    /// Cumulative cover cap per passenger and flight
    pub max_policy_amount: Amount,
    /// Payout = contribution * multiplier
    pub payout_multiplier: Decimal,
    /// Matching responses needed to resolve a flight status
    pub quorum_size: u32,
    /// Stake a reporter must deposit to join the registry
    pub minimum_reporter_stake: Amount,
    /// Distinct request slots handed to each reporter
    pub reporter_index_count: u8,
    /// Slots are drawn from `0..index_range`
    pub index_range: u8,
    /// Lifetime of an open oracle request; `None` never expires
    pub request_ttl_secs: Option<u64>,
    pub payout_mode: PayoutMode,
    /// Upper bound on a single payout channel transfer
    pub payout_timeout_ms: u64,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for SuretyConfig {
    fn default() -> Self {
        Self {
            minimum_stake: Amount::units(10),
            bootstrap_size: 4,
            max_policy_amount: Amount::units(1),
            payout_multiplier: dec!(1.5),
            quorum_size: 3,
            minimum_reporter_stake: Amount::units(1),
            reporter_index_count: 3,
            index_range: 10,
            request_ttl_secs: Some(3_600),
            payout_mode: PayoutMode::Pull,
            payout_timeout_ms: 5_000,
            event_buffer: 1_024,
        }
    }
}

impl SuretyConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Overlay values found through `lookup` onto the defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<Decimal, _>(&lookup, "SURETY_MINIMUM_STAKE")? {
            config.minimum_stake = Amount::from_decimal(v)?;
        }
        if let Some(v) = parse_var(&lookup, "SURETY_BOOTSTRAP_SIZE")? {
            config.bootstrap_size = v;
        }
        if let Some(v) = parse_var::<Decimal, _>(&lookup, "SURETY_MAX_POLICY_AMOUNT")? {
            config.max_policy_amount = Amount::from_decimal(v)?;
        }
        if let Some(v) = parse_var(&lookup, "SURETY_PAYOUT_MULTIPLIER")? {
            config.payout_multiplier = v;
        }
        if let Some(v) = parse_var(&lookup, "SURETY_QUORUM_SIZE")? {
            config.quorum_size = v;
        }
        if let Some(v) = parse_var::<Decimal, _>(&lookup, "SURETY_MINIMUM_REPORTER_STAKE")? {
            config.minimum_reporter_stake = Amount::from_decimal(v)?;
        }
        if let Some(v) = parse_var(&lookup, "SURETY_REPORTER_INDEX_COUNT")? {
            config.reporter_index_count = v;
        }
        if let Some(v) = parse_var(&lookup, "SURETY_INDEX_RANGE")? {
            config.index_range = v;
        }
        if let Some(raw) = lookup("SURETY_REQUEST_TTL_SECS") {
            config.request_ttl_secs = match raw.trim() {
                "" | "none" | "never" => None,
                value => Some(value.parse().map_err(|_| TypesError::InvalidEnvVar {
                    name: "SURETY_REQUEST_TTL_SECS".to_string(),
                    value: raw.clone(),
                })?),
            };
        }
        if let Some(v) = parse_var(&lookup, "SURETY_PAYOUT_MODE")? {
            config.payout_mode = v;
        }
        if let Some(v) = parse_var(&lookup, "SURETY_PAYOUT_TIMEOUT_MS")? {
            config.payout_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "SURETY_EVENT_BUFFER")? {
            config.event_buffer = v;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.minimum_stake.is_zero() {
            errors.push("Minimum airline stake must be greater than zero".to_string());
        }
        if self.bootstrap_size == 0 {
            errors.push("Bootstrap size must be at least 1".to_string());
        }
        if self.max_policy_amount.is_zero() {
            errors.push("Maximum policy amount must be greater than zero".to_string());
        }
        if self.payout_multiplier <= Decimal::ZERO {
            errors.push("Payout multiplier must be positive".to_string());
        }
        if self.quorum_size == 0 {
            errors.push("Quorum size must be at least 1".to_string());
        }
        if self.index_range == 0 {
            errors.push("Index range must be at least 1".to_string());
        }
        if self.reporter_index_count == 0 {
            errors.push("Reporters must hold at least one index".to_string());
        }
        if self.reporter_index_count > self.index_range {
            errors.push(format!(
                "Reporter index count {} exceeds index range {}",
                self.reporter_index_count, self.index_range
            ));
        }
        if self.request_ttl_secs == Some(0) {
            errors.push("Request TTL must be positive; use None to disable expiry".to_string());
        }
        if self.payout_timeout_ms == 0 {
            errors.push("Payout timeout must be positive".to_string());
        }
        if self.event_buffer == 0 {
            errors.push("Event buffer must hold at least one event".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TypesError::InvalidEnvVar {
                name: name.to_string(),
                value: raw,
            }),
    }
}
