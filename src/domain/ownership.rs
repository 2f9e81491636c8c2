//! Resolved ownership chains.
//!
//! Every mutation is scoped to the organizer who owns the challenge tree. The
//! store resolves the whole chain in one lookup; these types carry the result.

use super::enrollment::Installment;
use super::{AthleteId, ChallengeId, EnrollmentId, OwnerId};
use crate::error::{LedgerError, Result};

/// Athlete → challenge → owner.
#[derive(Debug, PartialEq, Clone)]
pub struct AthleteOwnership {
    pub athlete_id: AthleteId,
    pub athlete_name: String,
    pub challenge_id: ChallengeId,
    pub owner_id: OwnerId,
}

/// Installment → enrollment → athlete → challenge → owner.
#[derive(Debug, PartialEq, Clone)]
pub struct InstallmentOwnership {
    pub installment: Installment,
    pub enrollment_id: EnrollmentId,
    pub athlete_id: AthleteId,
    pub challenge_id: ChallengeId,
    pub owner_id: OwnerId,
}

pub trait Owned: Sized {
    const KIND: &'static str;

    fn owner_id(&self) -> OwnerId;

    /// Keeps the chain only when it ends at `owner`. Missing and foreign
    /// records produce the same error.
    fn verify(chain: Option<Self>, owner: OwnerId) -> Result<Self> {
        chain
            .filter(|c| c.owner_id() == owner)
            .ok_or(LedgerError::NotFound(Self::KIND))
    }
}

impl Owned for AthleteOwnership {
    const KIND: &'static str = "athlete";

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}

impl Owned for InstallmentOwnership {
    const KIND: &'static str = "installment";

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(owner_id: OwnerId) -> AthleteOwnership {
        AthleteOwnership {
            athlete_id: 3,
            athlete_name: "Ana".to_string(),
            challenge_id: 2,
            owner_id,
        }
    }

    #[test]
    fn test_verify_accepts_owner() {
        let resolved = AthleteOwnership::verify(Some(chain(1)), 1).unwrap();
        assert_eq!(resolved.challenge_id, 2);
    }

    #[test]
    fn test_foreign_and_missing_look_the_same() {
        let foreign = AthleteOwnership::verify(Some(chain(2)), 1).unwrap_err();
        let missing = AthleteOwnership::verify(None, 1).unwrap_err();
        assert_eq!(foreign.to_string(), missing.to_string());
        assert!(matches!(foreign, LedgerError::NotFound("athlete")));
    }
}
