use crate::domain::activity::{distance_totals, total_km};
use crate::domain::challenge::{
    Athlete, AthleteInput, Challenge, ChallengeInput, ChallengeSummary,
};
use crate::domain::delinquency::PaymentVerdict;
use crate::domain::enrollment::{Enrollment, Plan, PlanRequest};
use crate::domain::ports::{ClockBox, LedgerStoreBox};
use crate::domain::{AthleteId, ChallengeId, OwnerId};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Reverse;
use tracing::info;

/// The main entry point of the ledger.
///
/// `LedgerEngine` owns the store and the clock and exposes every organizer
/// operation. All operations are scoped to an owner id; records outside the
/// owner's challenge tree are reported as not found.
///
/// Operations are grouped by concern across the `application` modules:
/// challenges and athletes here, plans and payments in `payments`, activity
/// logging in `activities` and standings in `standings`.
pub struct LedgerEngine {
    pub(crate) store: LedgerStoreBox,
    pub(crate) clock: ClockBox,
}

/// An athlete as listed within a challenge.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct AthleteSummary {
    pub athlete: Athlete,
    pub total_km: f64,
    pub last_activity_date: Option<NaiveDate>,
    pub payment: PaymentVerdict,
}

impl LedgerEngine {
    /// Creates a new `LedgerEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - The ledger storage backend.
    /// * `clock` - Source of "today" for payment status and defaults.
    pub fn new(store: LedgerStoreBox, clock: ClockBox) -> Self {
        Self { store, clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn create_challenge(
        &self,
        owner: OwnerId,
        input: &ChallengeInput,
    ) -> Result<Challenge> {
        let draft = input.validate()?;
        let challenge = self
            .store
            .insert_challenge(owner, draft, self.clock.now())
            .await?;
        info!(challenge_id = challenge.id, owner, "challenge created");
        Ok(challenge)
    }

    pub async fn update_challenge(
        &self,
        owner: OwnerId,
        challenge_id: ChallengeId,
        input: &ChallengeInput,
    ) -> Result<Challenge> {
        let mut challenge = self.authorize_challenge(owner, challenge_id).await?;
        let draft = input.validate()?;
        challenge.title = draft.title;
        challenge.description = draft.description;
        challenge.goal_km = draft.goal_km;
        challenge.start_date = draft.start_date;
        challenge.end_date = draft.end_date;
        self.store.update_challenge(challenge.clone()).await?;
        info!(challenge_id, "challenge updated");
        Ok(challenge)
    }

    /// Deletes the challenge and everything under it.
    pub async fn delete_challenge(&self, owner: OwnerId, challenge_id: ChallengeId) -> Result<()> {
        if !self.store.delete_challenge(challenge_id, owner).await? {
            return Err(LedgerError::NotFound("challenge"));
        }
        info!(challenge_id, "challenge deleted with its athletes");
        Ok(())
    }

    /// The owner's challenges, soonest deadline first, with their total
    /// distance and athlete count.
    pub async fn list_challenges(&self, owner: OwnerId) -> Result<Vec<ChallengeSummary>> {
        let mut summaries = Vec::new();
        for challenge in self.store.challenges_of(owner).await? {
            let athletes_count = self.store.athletes_of(challenge.id).await?.len();
            let activities = self.store.activities_of_challenge(challenge.id).await?;
            summaries.push(ChallengeSummary {
                challenge,
                total_km: total_km(&activities),
                athletes_count,
            });
        }
        summaries.sort_by_key(|s| (s.challenge.end_date, Reverse(s.challenge.created_at)));
        Ok(summaries)
    }

    /// Registers an athlete together with the mandatory payment plan.
    pub async fn create_athlete(
        &self,
        owner: OwnerId,
        challenge_id: ChallengeId,
        input: &AthleteInput,
        plan: &PlanRequest,
    ) -> Result<(Athlete, Enrollment)> {
        self.authorize_challenge(owner, challenge_id).await?;
        let draft = input.validate()?;
        let plan = Plan::from_request(plan)?;
        let (athlete, enrollment) = self
            .store
            .insert_athlete(challenge_id, draft, self.clock.now(), &plan)
            .await?;
        info!(
            athlete_id = athlete.id,
            challenge_id,
            installments = plan.schedule.len(),
            "athlete enrolled"
        );
        Ok((athlete, enrollment))
    }

    /// Updates the athlete's data and replaces the plan in one step.
    pub async fn update_athlete(
        &self,
        owner: OwnerId,
        challenge_id: ChallengeId,
        athlete_id: AthleteId,
        input: &AthleteInput,
        plan: &PlanRequest,
    ) -> Result<(Athlete, Enrollment)> {
        self.authorize_challenge(owner, challenge_id).await?;
        let mut athlete = self
            .store
            .get_athlete(athlete_id, challenge_id)
            .await?
            .ok_or(LedgerError::NotFound("athlete"))?;
        let draft = input.validate()?;
        let plan = Plan::from_request(plan)?;
        athlete.name = draft.name;
        athlete.profile = draft.profile;
        let enrollment = self.store.update_athlete(athlete.clone(), &plan).await?;
        info!(athlete_id, "athlete updated and plan regenerated");
        Ok((athlete, enrollment))
    }

    /// Deletes the athlete with its plan and activities.
    pub async fn delete_athlete(
        &self,
        owner: OwnerId,
        challenge_id: ChallengeId,
        athlete_id: AthleteId,
    ) -> Result<()> {
        self.authorize_challenge(owner, challenge_id).await?;
        if !self.store.delete_athlete(athlete_id, challenge_id).await? {
            return Err(LedgerError::NotFound("athlete"));
        }
        info!(athlete_id, challenge_id, "athlete deleted");
        Ok(())
    }

    /// Athletes whose name contains `filter` (case-insensitive), sorted by
    /// name, each with distance totals and the current payment verdict.
    pub async fn list_athletes(
        &self,
        owner: OwnerId,
        challenge_id: ChallengeId,
        filter: &str,
    ) -> Result<Vec<AthleteSummary>> {
        self.authorize_challenge(owner, challenge_id).await?;
        let needle = filter.trim().to_lowercase();

        let totals = distance_totals(&self.store.activities_of_challenge(challenge_id).await?);

        let mut summaries = Vec::new();
        for athlete in self.store.athletes_of(challenge_id).await? {
            if !athlete.name.to_lowercase().contains(&needle) {
                continue;
            }
            let distance = totals.get(&athlete.id).copied().unwrap_or_default();
            let payment = self.verdict_for(athlete.id).await?;
            summaries.push(AthleteSummary {
                athlete,
                total_km: distance.km,
                last_activity_date: distance.last_activity_date,
                payment,
            });
        }
        summaries.sort_by_key(|s| s.athlete.name.to_lowercase());
        Ok(summaries)
    }
}
