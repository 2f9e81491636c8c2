use super::engine::LedgerEngine;
use crate::domain::activity::{Activity, NewActivity};
use crate::domain::delinquency::PaymentVerdict;
use crate::domain::{AthleteId, ChallengeId, OwnerId};
use crate::error::{LedgerError, Result};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct RecordedActivity {
    pub activity: Activity,
    pub challenge_id: ChallengeId,
    /// Verdict at the time of recording; may be a grace period.
    pub verdict: PaymentVerdict,
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct ActivityEntry {
    #[serde(flatten)]
    pub activity: Activity,
    pub athlete_name: String,
}

impl LedgerEngine {
    /// Appends a distance entry for the athlete.
    ///
    /// Fails with [`LedgerError::PaymentBlocked`] when the athlete has an
    /// installment overdue past the grace period; nothing is written then.
    pub async fn record_activity(
        &self,
        owner: OwnerId,
        athlete_id: AthleteId,
        date: &str,
        km: f64,
        note: Option<&str>,
    ) -> Result<RecordedActivity> {
        let chain = self.authorize_athlete(owner, athlete_id).await?;
        let new_activity = NewActivity::parse(athlete_id, date, km, note)?;

        let verdict = self.verdict_for(athlete_id).await?;
        if let PaymentVerdict::Blocked { max_overdue_days } = verdict {
            warn!(athlete_id, max_overdue_days, "activity rejected, athlete blocked");
            return Err(LedgerError::PaymentBlocked {
                overdue_days: max_overdue_days,
            });
        }

        let activity = self.store.insert_activity(new_activity).await?;
        info!(
            activity_id = activity.id,
            athlete_id,
            km = activity.km,
            date = %activity.date,
            "activity recorded"
        );
        Ok(RecordedActivity {
            activity,
            challenge_id: chain.challenge_id,
            verdict,
        })
    }

    /// Activities of the challenge, newest first.
    pub async fn list_activities(
        &self,
        owner: OwnerId,
        challenge_id: ChallengeId,
    ) -> Result<Vec<ActivityEntry>> {
        self.authorize_challenge(owner, challenge_id).await?;
        let names: HashMap<AthleteId, String> = self
            .store
            .athletes_of(challenge_id)
            .await?
            .into_iter()
            .map(|a| (a.id, a.name))
            .collect();

        let mut entries: Vec<ActivityEntry> = self
            .store
            .activities_of_challenge(challenge_id)
            .await?
            .into_iter()
            .map(|activity| ActivityEntry {
                athlete_name: names.get(&activity.athlete_id).cloned().unwrap_or_default(),
                activity,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.activity
                .date
                .cmp(&a.activity.date)
                .then(b.activity.id.cmp(&a.activity.id))
        });
        Ok(entries)
    }
}
