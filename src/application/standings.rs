use super::engine::LedgerEngine;
use crate::domain::activity::total_km;
use crate::domain::challenge::ChallengeProgress;
use crate::domain::ranking::{Standing, rank};
use crate::domain::{ChallengeId, OwnerId};
use crate::error::Result;
use tracing::debug;

impl LedgerEngine {
    pub async fn ranking(
        &self,
        owner: OwnerId,
        challenge_id: ChallengeId,
    ) -> Result<Vec<Standing>> {
        let challenge = self.authorize_challenge(owner, challenge_id).await?;
        let athletes = self.store.athletes_of(challenge_id).await?;
        let activities = self.store.activities_of_challenge(challenge_id).await?;
        let standings = rank(challenge.goal_km, &athletes, &activities);
        debug!(
            challenge_id,
            athletes = standings.len(),
            activities = activities.len(),
            "ranking computed"
        );
        Ok(standings)
    }

    /// Collective distance against the challenge goal, capped at 100%.
    pub async fn progress(
        &self,
        owner: OwnerId,
        challenge_id: ChallengeId,
    ) -> Result<ChallengeProgress> {
        let challenge = self.authorize_challenge(owner, challenge_id).await?;
        let activities = self.store.activities_of_challenge(challenge_id).await?;
        Ok(ChallengeProgress::new(challenge.goal_km, total_km(&activities)))
    }
}
