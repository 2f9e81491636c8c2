use super::activity::{Activity, NewActivity};
use super::challenge::{Athlete, AthleteDraft, Challenge, ChallengeDraft};
use super::enrollment::{Enrollment, Installment, Plan};
use super::ownership::{AthleteOwnership, InstallmentOwnership};
use super::{AthleteId, ChallengeId, InstallmentId, OwnerId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// An installment joined with the athlete and challenge it belongs to.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct InstallmentRow {
    pub installment: Installment,
    pub athlete_id: AthleteId,
    pub athlete_name: String,
    pub challenge_id: ChallengeId,
    pub challenge_title: String,
}

/// Durable record of challenges, athletes, plans and activities.
///
/// Every operation that touches more than one record (athlete with plan, plan
/// replacement, cascading deletes) is atomic: readers see either the state
/// before or the state after, never a mix.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_challenge(
        &self,
        owner_id: OwnerId,
        draft: ChallengeDraft,
        created_at: NaiveDateTime,
    ) -> Result<Challenge>;
    async fn update_challenge(&self, challenge: Challenge) -> Result<()>;
    async fn get_challenge(&self, id: ChallengeId, owner_id: OwnerId) -> Result<Option<Challenge>>;
    async fn challenges_of(&self, owner_id: OwnerId) -> Result<Vec<Challenge>>;
    /// Removes the challenge with its athletes, plans and activities.
    /// Returns `false` when nothing matched.
    async fn delete_challenge(&self, id: ChallengeId, owner_id: OwnerId) -> Result<bool>;

    /// Creates the athlete together with its enrollment and installments.
    async fn insert_athlete(
        &self,
        challenge_id: ChallengeId,
        draft: AthleteDraft,
        created_at: NaiveDateTime,
        plan: &Plan,
    ) -> Result<(Athlete, Enrollment)>;
    /// Updates the athlete's fields and replaces its plan.
    async fn update_athlete(&self, athlete: Athlete, plan: &Plan) -> Result<Enrollment>;
    async fn get_athlete(
        &self,
        id: AthleteId,
        challenge_id: ChallengeId,
    ) -> Result<Option<Athlete>>;
    async fn athlete_owner(&self, athlete_id: AthleteId) -> Result<Option<AthleteOwnership>>;
    async fn athletes_of(&self, challenge_id: ChallengeId) -> Result<Vec<Athlete>>;
    /// Removes the athlete with its enrollment, installments and activities.
    async fn delete_athlete(&self, id: AthleteId, challenge_id: ChallengeId) -> Result<bool>;

    async fn enrollment_of(&self, athlete_id: AthleteId) -> Result<Option<Enrollment>>;
    /// Creates the athlete's enrollment, or updates it in place and swaps its
    /// whole installment set.
    async fn replace_plan(&self, athlete_id: AthleteId, plan: &Plan) -> Result<Enrollment>;

    /// All installments of the athlete, by number.
    async fn installments_of(&self, athlete_id: AthleteId) -> Result<Vec<Installment>>;
    async fn installment_owner(
        &self,
        installment_id: InstallmentId,
    ) -> Result<Option<InstallmentOwnership>>;
    async fn update_installment(&self, installment: Installment) -> Result<()>;
    /// Unpaid installments of the athlete due strictly before `date`.
    async fn unpaid_due_before(&self, athlete_id: AthleteId, date: NaiveDate)
    -> Result<Vec<Installment>>;
    /// Unpaid installments across the owner's challenges due strictly before
    /// `date`, ordered by due date then athlete name.
    async fn unpaid_obligations(
        &self,
        owner_id: OwnerId,
        challenge_id: Option<ChallengeId>,
        date: NaiveDate,
    ) -> Result<Vec<InstallmentRow>>;
    /// Every installment across the owner's challenges, ordered by due date
    /// then athlete name.
    async fn owner_installments(
        &self,
        owner_id: OwnerId,
        challenge_id: Option<ChallengeId>,
    ) -> Result<Vec<InstallmentRow>>;

    async fn insert_activity(&self, activity: NewActivity) -> Result<Activity>;
    async fn activities_of_challenge(&self, challenge_id: ChallengeId) -> Result<Vec<Activity>>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;

/// Source of "today". Injected so status and ranking queries are
/// reproducible.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn now(&self) -> NaiveDateTime;
}

pub type ClockBox = Box<dyn Clock>;
