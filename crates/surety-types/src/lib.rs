//! FlightSurety Types - Canonical domain types for the flight-delay insurance consortium
//!
//! This crate contains the foundational types shared by every FlightSurety
//! crate, with zero dependencies on other surety crates:
//!
//! - Identity types (`ParticipantId`, `FlightKey`)
//! - Fixed-point `Amount` in base units
//! - Flight and airline lifecycle states
//! - Domain events consumed by external observers
//! - `SuretyConfig`, the constants fixed at initialization
//!
//! # Control Flow
//!
//! ```text
//! apply → fund → admit (bootstrap | vote) → register flight → buy cover
//!       → oracle quorum → resolve status → credit insurees → withdraw
//! ```

pub mod identity;
pub mod amount;
pub mod status;
pub mod event;
pub mod config;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use status::*;
pub use event::*;
pub use config::*;
pub use error::*;

/// Version of the FlightSurety types schema
pub const TYPES_VERSION: &str = "0.1.0";
