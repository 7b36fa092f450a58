//! Lifecycle states for airlines and flights

use serde::{Deserialize, Serialize};
use std::fmt;

/// Observed status of a flight
///
/// Codes follow the status table the reporters speak on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlightStatus {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
    Cancelled,
}

impl FlightStatus {
    /// Every status a reporter may submit
    pub const REPORTABLE: [FlightStatus; 6] = [
        FlightStatus::OnTime,
        FlightStatus::LateAirline,
        FlightStatus::LateWeather,
        FlightStatus::LateTechnical,
        FlightStatus::LateOther,
        FlightStatus::Cancelled,
    ];

    pub fn code(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::OnTime => 10,
            Self::LateAirline => 20,
            Self::LateWeather => 30,
            Self::LateTechnical => 40,
            Self::LateOther => 50,
            Self::Cancelled => 60,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            10 => Some(Self::OnTime),
            20 => Some(Self::LateAirline),
            30 => Some(Self::LateWeather),
            40 => Some(Self::LateTechnical),
            50 => Some(Self::LateOther),
            60 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the carrier is liable, which is what makes a policy pay out
    pub fn is_carrier_fault(&self) -> bool {
        matches!(self, Self::LateAirline | Self::LateTechnical)
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::OnTime => "on_time",
            Self::LateAirline => "late_airline",
            Self::LateWeather => "late_weather",
            Self::LateTechnical => "late_technical",
            Self::LateOther => "late_other",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Membership state of an airline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AirlineState {
    /// Application recorded, no stake yet
    Applied,
    /// Stake deposited, admission pending
    Funded,
    /// Admitted member; may register flights and vote
    Registered,
}

impl AirlineState {
    /// Past the application stage
    pub fn has_staked(&self) -> bool {
        !matches!(self, Self::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for status in FlightStatus::REPORTABLE {
            assert_eq!(FlightStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(FlightStatus::from_code(0), Some(FlightStatus::Unknown));
        assert_eq!(FlightStatus::from_code(15), None);
    }

    #[test]
    fn test_carrier_fault() {
        assert!(FlightStatus::LateAirline.is_carrier_fault());
        assert!(FlightStatus::LateTechnical.is_carrier_fault());
        assert!(!FlightStatus::OnTime.is_carrier_fault());
        assert!(!FlightStatus::LateWeather.is_carrier_fault());
        assert!(!FlightStatus::Cancelled.is_carrier_fault());
    }

    #[test]
    fn test_staked_states() {
        assert!(!AirlineState::Applied.has_staked());
        assert!(AirlineState::Funded.has_staked());
        assert!(AirlineState::Registered.has_staked());
    }
}
