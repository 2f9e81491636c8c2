use super::engine::LedgerEngine;
use crate::domain::challenge::Challenge;
use crate::domain::ownership::{AthleteOwnership, InstallmentOwnership, Owned};
use crate::domain::{AthleteId, ChallengeId, InstallmentId, OwnerId};
use crate::error::{LedgerError, Result};

impl LedgerEngine {
    pub(crate) async fn authorize_challenge(
        &self,
        owner: OwnerId,
        challenge_id: ChallengeId,
    ) -> Result<Challenge> {
        self.store
            .get_challenge(challenge_id, owner)
            .await?
            .ok_or(LedgerError::NotFound("challenge"))
    }

    pub(crate) async fn authorize_athlete(
        &self,
        owner: OwnerId,
        athlete_id: AthleteId,
    ) -> Result<AthleteOwnership> {
        AthleteOwnership::verify(self.store.athlete_owner(athlete_id).await?, owner)
    }

    pub(crate) async fn authorize_installment(
        &self,
        owner: OwnerId,
        installment_id: InstallmentId,
    ) -> Result<InstallmentOwnership> {
        InstallmentOwnership::verify(self.store.installment_owner(installment_id).await?, owner)
    }
}
