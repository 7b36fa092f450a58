//! Operational gate - the consortium's manual circuit breaker
//!
//! Every mutating operation of governance, escrow and oracle consensus calls
//! [`OperationalGate::require_enabled`] before touching state. Read-only
//! queries skip the check so a paused system stays inspectable. The gate's
//! own operations are never gated, otherwise the owner could not resume.

use std::collections::BTreeSet;

use surety_types::{DomainEvent, ParticipantId};
use tracing::{info, warn};

use crate::error::{Result, SuretyError};

#[derive(Debug, Clone)]
pub struct OperationalGate {
    enabled: bool,
    owner: ParticipantId,
    authorized: BTreeSet<ParticipantId>,
}

impl OperationalGate {
    /// A new gate starts enabled
    pub fn new(owner: ParticipantId) -> Self {
        Self {
            enabled: true,
            owner,
            authorized: BTreeSet::new(),
        }
    }

    pub fn owner(&self) -> &ParticipantId {
        &self.owner
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn require_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(SuretyError::SystemDisabled)
        }
    }

    /// Owner or an administrative caller the owner authorized
    pub fn is_authorized(&self, caller: &ParticipantId) -> bool {
        caller == &self.owner || self.authorized.contains(caller)
    }

    pub fn authorized_callers(&self) -> Vec<ParticipantId> {
        self.authorized.iter().cloned().collect()
    }

    pub fn set_enabled(
        &mut self,
        caller: &ParticipantId,
        value: bool,
        events: &mut Vec<DomainEvent>,
    ) -> Result<()> {
        self.require_owner(caller, "set_enabled")?;
        if self.enabled != value {
            if value {
                info!(by = %caller, "operations resumed");
            } else {
                warn!(by = %caller, "operations paused");
            }
        }
        self.enabled = value;
        events.push(DomainEvent::OperationalStatusChanged {
            enabled: value,
            changed_by: caller.clone(),
        });
        Ok(())
    }

    pub fn authorize_caller(
        &mut self,
        caller: &ParticipantId,
        target: &ParticipantId,
        events: &mut Vec<DomainEvent>,
    ) -> Result<()> {
        self.require_owner(caller, "authorize_caller")?;
        if self.authorized.insert(target.clone()) {
            events.push(DomainEvent::CallerAuthorized {
                caller: target.clone(),
                authorized_by: caller.clone(),
            });
        }
        Ok(())
    }

    pub fn deauthorize_caller(
        &mut self,
        caller: &ParticipantId,
        target: &ParticipantId,
        events: &mut Vec<DomainEvent>,
    ) -> Result<()> {
        self.require_owner(caller, "deauthorize_caller")?;
        if self.authorized.remove(target) {
            events.push(DomainEvent::CallerDeauthorized {
                caller: target.clone(),
                deauthorized_by: caller.clone(),
            });
        }
        Ok(())
    }

    fn require_owner(&self, caller: &ParticipantId, action: &str) -> Result<()> {
        if caller == &self.owner {
            Ok(())
        } else {
            Err(SuretyError::Unauthorized {
                caller: caller.to_string(),
                action: action.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_enabled() {
        let gate = OperationalGate::new(ParticipantId::from("owner"));
        assert!(gate.is_enabled());
        assert!(gate.require_enabled().is_ok());
    }

    #[test]
    fn test_only_owner_toggles() {
        let owner = ParticipantId::from("owner");
        let mut gate = OperationalGate::new(owner.clone());
        let mut events = Vec::new();

        let result = gate.set_enabled(&ParticipantId::from("intruder"), false, &mut events);
        assert!(matches!(result, Err(SuretyError::Unauthorized { .. })));
        assert!(gate.is_enabled());
        assert!(events.is_empty());

        gate.set_enabled(&owner, false, &mut events).unwrap();
        assert_eq!(gate.require_enabled(), Err(SuretyError::SystemDisabled));

        // Resuming works while paused
        gate.set_enabled(&owner, true, &mut events).unwrap();
        assert!(gate.is_enabled());
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_authorized_callers() {
        let owner = ParticipantId::from("owner");
        let app = ParticipantId::from("app");
        let mut gate = OperationalGate::new(owner.clone());
        let mut events = Vec::new();

        assert!(gate.is_authorized(&owner));
        assert!(!gate.is_authorized(&app));

        gate.authorize_caller(&owner, &app, &mut events).unwrap();
        assert!(gate.is_authorized(&app));

        // Authorized callers cannot grant authority themselves
        let result = gate.authorize_caller(&app, &ParticipantId::from("other"), &mut events);
        assert!(matches!(result, Err(SuretyError::Unauthorized { .. })));

        gate.deauthorize_caller(&owner, &app, &mut events).unwrap();
        assert!(!gate.is_authorized(&app));
        assert_eq!(events.len(), 2);
    }
}
