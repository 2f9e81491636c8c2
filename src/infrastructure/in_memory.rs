use crate::domain::activity::{Activity, NewActivity};
use crate::domain::challenge::{Athlete, AthleteDraft, Challenge, ChallengeDraft};
use crate::domain::enrollment::{Enrollment, Installment, Plan};
use crate::domain::ownership::{AthleteOwnership, InstallmentOwnership};
use crate::domain::ports::{InstallmentRow, LedgerStore};
use crate::domain::{ActivityId, AthleteId, ChallengeId, InstallmentId, OwnerId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Sequences {
    challenge: u64,
    athlete: u64,
    enrollment: u64,
    installment: u64,
    activity: u64,
}

fn bump(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

/// All tables behind one lock, so every multi-record write is atomic.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Tables {
    sequences: Sequences,
    challenges: BTreeMap<ChallengeId, Challenge>,
    athletes: BTreeMap<AthleteId, Athlete>,
    /// Keyed by athlete: one enrollment per athlete.
    enrollments: BTreeMap<AthleteId, Enrollment>,
    installments: BTreeMap<InstallmentId, Installment>,
    activities: BTreeMap<ActivityId, Activity>,
}

impl Tables {
    fn replace_plan(&mut self, athlete_id: AthleteId, plan: &Plan) -> Enrollment {
        let enrollment = match self.enrollments.get_mut(&athlete_id) {
            Some(existing) => {
                existing.apply_terms(&plan.terms);
                let enrollment_id = existing.id;
                self.installments
                    .retain(|_, i| i.enrollment_id != enrollment_id);
                existing.clone()
            }
            None => {
                let id = bump(&mut self.sequences.enrollment);
                let enrollment = Enrollment::new(id, athlete_id, &plan.terms);
                self.enrollments.insert(athlete_id, enrollment.clone());
                enrollment
            }
        };
        let sequence = &mut self.sequences.installment;
        for installment in plan.installments(enrollment.id, || bump(sequence)) {
            self.installments.insert(installment.id, installment);
        }
        enrollment
    }

    fn remove_athlete_tree(&mut self, athlete_id: AthleteId) {
        if let Some(enrollment) = self.enrollments.remove(&athlete_id) {
            self.installments
                .retain(|_, i| i.enrollment_id != enrollment.id);
        }
        self.activities.retain(|_, a| a.athlete_id != athlete_id);
        self.athletes.remove(&athlete_id);
    }

    fn athlete_owner(&self, athlete_id: AthleteId) -> Option<AthleteOwnership> {
        let athlete = self.athletes.get(&athlete_id)?;
        let challenge = self.challenges.get(&athlete.challenge_id)?;
        Some(AthleteOwnership {
            athlete_id,
            athlete_name: athlete.name.clone(),
            challenge_id: challenge.id,
            owner_id: challenge.owner_id,
        })
    }

    fn enrollment_by_id(&self, enrollment_id: u64) -> Option<&Enrollment> {
        self.enrollments.values().find(|e| e.id == enrollment_id)
    }

    fn installment_row(&self, installment: &Installment) -> Option<(InstallmentRow, OwnerId)> {
        let enrollment = self.enrollment_by_id(installment.enrollment_id)?;
        let athlete = self.athletes.get(&enrollment.athlete_id)?;
        let challenge = self.challenges.get(&athlete.challenge_id)?;
        let row = InstallmentRow {
            installment: installment.clone(),
            athlete_id: athlete.id,
            athlete_name: athlete.name.clone(),
            challenge_id: challenge.id,
            challenge_title: challenge.title.clone(),
        };
        Some((row, challenge.owner_id))
    }

    fn owner_rows<F>(
        &self,
        owner_id: OwnerId,
        challenge_id: Option<ChallengeId>,
        keep: F,
    ) -> Vec<InstallmentRow>
    where
        F: Fn(&Installment) -> bool,
    {
        let mut rows: Vec<InstallmentRow> = self
            .installments
            .values()
            .filter(|i| keep(i))
            .filter_map(|i| self.installment_row(i))
            .filter(|(row, owner)| {
                *owner == owner_id && challenge_id.is_none_or(|c| c == row.challenge_id)
            })
            .map(|(row, _)| row)
            .collect();
        sort_rows(&mut rows);
        rows
    }
}

pub(crate) fn sort_rows(rows: &mut [InstallmentRow]) {
    rows.sort_by(|a, b| {
        a.installment
            .due_date
            .cmp(&b.installment.due_date)
            .then_with(|| {
                a.athlete_name
                    .to_lowercase()
                    .cmp(&b.athlete_name.to_lowercase())
            })
            .then(a.installment.number.cmp(&b.installment.number))
    });
}

/// A thread-safe in-memory ledger.
///
/// Uses a single `Arc<RwLock<..>>` over all tables so that plan replacement and
/// cascades happen under one write guard. When opened from a snapshot file the
/// tables are written back to it after every mutation, and a mutation whose
/// write fails is not applied.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
    snapshot: Option<PathBuf>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a store backed by a JSON snapshot at `path`, loading it when the
    /// file already exists.
    pub fn open_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            Tables::default()
        };
        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
            snapshot: Some(path),
        })
    }

    fn persist(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(tables)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Runs `change` against a copy of the tables and swaps the copy in only
    /// after it has been persisted.
    async fn commit<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T> + Send,
        T: Send,
    {
        let mut live = self.tables.write().await;
        let mut next = live.clone();
        let value = change(&mut next)?;
        self.persist(&next)?;
        *live = next;
        Ok(value)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_challenge(
        &self,
        owner_id: OwnerId,
        draft: ChallengeDraft,
        created_at: NaiveDateTime,
    ) -> Result<Challenge> {
        self.commit(|tables| {
            let challenge = Challenge {
                id: bump(&mut tables.sequences.challenge),
                owner_id,
                title: draft.title,
                description: draft.description,
                goal_km: draft.goal_km,
                start_date: draft.start_date,
                end_date: draft.end_date,
                created_at,
            };
            tables.challenges.insert(challenge.id, challenge.clone());
            Ok(challenge)
        })
        .await
    }

    async fn update_challenge(&self, challenge: Challenge) -> Result<()> {
        self.commit(|tables| match tables.challenges.get_mut(&challenge.id) {
            Some(existing) if existing.owner_id == challenge.owner_id => {
                *existing = challenge;
                Ok(())
            }
            _ => Err(LedgerError::NotFound("challenge")),
        })
        .await
    }

    async fn get_challenge(
        &self,
        id: ChallengeId,
        owner_id: OwnerId,
    ) -> Result<Option<Challenge>> {
        let tables = self.tables.read().await;
        Ok(tables
            .challenges
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .cloned())
    }

    async fn challenges_of(&self, owner_id: OwnerId) -> Result<Vec<Challenge>> {
        let tables = self.tables.read().await;
        Ok(tables
            .challenges
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn delete_challenge(&self, id: ChallengeId, owner_id: OwnerId) -> Result<bool> {
        self.commit(|tables| {
            if !tables
                .challenges
                .get(&id)
                .is_some_and(|c| c.owner_id == owner_id)
            {
                return Ok(false);
            }
            let athlete_ids: Vec<AthleteId> = tables
                .athletes
                .values()
                .filter(|a| a.challenge_id == id)
                .map(|a| a.id)
                .collect();
            for athlete_id in athlete_ids {
                tables.remove_athlete_tree(athlete_id);
            }
            Ok(tables.challenges.remove(&id).is_some())
        })
        .await
    }

    async fn insert_athlete(
        &self,
        challenge_id: ChallengeId,
        draft: AthleteDraft,
        created_at: NaiveDateTime,
        plan: &Plan,
    ) -> Result<(Athlete, Enrollment)> {
        self.commit(|tables| {
            if !tables.challenges.contains_key(&challenge_id) {
                return Err(LedgerError::NotFound("challenge"));
            }
            let athlete = Athlete {
                id: bump(&mut tables.sequences.athlete),
                challenge_id,
                name: draft.name,
                profile: draft.profile,
                created_at,
            };
            tables.athletes.insert(athlete.id, athlete.clone());
            let enrollment = tables.replace_plan(athlete.id, plan);
            Ok((athlete, enrollment))
        })
        .await
    }

    async fn update_athlete(&self, athlete: Athlete, plan: &Plan) -> Result<Enrollment> {
        self.commit(|tables| {
            let athlete_id = athlete.id;
            match tables.athletes.get_mut(&athlete_id) {
                Some(existing) if existing.challenge_id == athlete.challenge_id => {
                    *existing = athlete;
                }
                _ => return Err(LedgerError::NotFound("athlete")),
            }
            Ok(tables.replace_plan(athlete_id, plan))
        })
        .await
    }

    async fn get_athlete(
        &self,
        id: AthleteId,
        challenge_id: ChallengeId,
    ) -> Result<Option<Athlete>> {
        let tables = self.tables.read().await;
        Ok(tables
            .athletes
            .get(&id)
            .filter(|a| a.challenge_id == challenge_id)
            .cloned())
    }

    async fn athlete_owner(&self, athlete_id: AthleteId) -> Result<Option<AthleteOwnership>> {
        let tables = self.tables.read().await;
        Ok(tables.athlete_owner(athlete_id))
    }

    async fn athletes_of(&self, challenge_id: ChallengeId) -> Result<Vec<Athlete>> {
        let tables = self.tables.read().await;
        Ok(tables
            .athletes
            .values()
            .filter(|a| a.challenge_id == challenge_id)
            .cloned()
            .collect())
    }

    async fn delete_athlete(&self, id: AthleteId, challenge_id: ChallengeId) -> Result<bool> {
        self.commit(|tables| {
            if !tables
                .athletes
                .get(&id)
                .is_some_and(|a| a.challenge_id == challenge_id)
            {
                return Ok(false);
            }
            tables.remove_athlete_tree(id);
            Ok(true)
        })
        .await
    }

    async fn enrollment_of(&self, athlete_id: AthleteId) -> Result<Option<Enrollment>> {
        let tables = self.tables.read().await;
        Ok(tables.enrollments.get(&athlete_id).cloned())
    }

    async fn replace_plan(&self, athlete_id: AthleteId, plan: &Plan) -> Result<Enrollment> {
        self.commit(|tables| {
            if !tables.athletes.contains_key(&athlete_id) {
                return Err(LedgerError::NotFound("athlete"));
            }
            Ok(tables.replace_plan(athlete_id, plan))
        })
        .await
    }

    async fn installments_of(&self, athlete_id: AthleteId) -> Result<Vec<Installment>> {
        let tables = self.tables.read().await;
        let Some(enrollment) = tables.enrollments.get(&athlete_id) else {
            return Ok(Vec::new());
        };
        let mut installments: Vec<Installment> = tables
            .installments
            .values()
            .filter(|i| i.enrollment_id == enrollment.id)
            .cloned()
            .collect();
        installments.sort_by_key(|i| i.number);
        Ok(installments)
    }

    async fn installment_owner(
        &self,
        installment_id: InstallmentId,
    ) -> Result<Option<InstallmentOwnership>> {
        let tables = self.tables.read().await;
        let Some(installment) = tables.installments.get(&installment_id) else {
            return Ok(None);
        };
        Ok(tables
            .installment_row(installment)
            .map(|(row, owner_id)| InstallmentOwnership {
                enrollment_id: row.installment.enrollment_id,
                installment: row.installment,
                athlete_id: row.athlete_id,
                challenge_id: row.challenge_id,
                owner_id,
            }))
    }

    async fn update_installment(&self, installment: Installment) -> Result<()> {
        self.commit(|tables| match tables.installments.get_mut(&installment.id) {
            Some(existing) if existing.enrollment_id == installment.enrollment_id => {
                *existing = installment;
                Ok(())
            }
            _ => Err(LedgerError::NotFound("installment")),
        })
        .await
    }

    async fn unpaid_due_before(
        &self,
        athlete_id: AthleteId,
        date: NaiveDate,
    ) -> Result<Vec<Installment>> {
        Ok(self
            .installments_of(athlete_id)
            .await?
            .into_iter()
            .filter(|i| !i.is_paid() && i.due_date < date)
            .collect())
    }

    async fn unpaid_obligations(
        &self,
        owner_id: OwnerId,
        challenge_id: Option<ChallengeId>,
        date: NaiveDate,
    ) -> Result<Vec<InstallmentRow>> {
        let tables = self.tables.read().await;
        Ok(tables.owner_rows(owner_id, challenge_id, |i| {
            !i.is_paid() && i.due_date < date
        }))
    }

    async fn owner_installments(
        &self,
        owner_id: OwnerId,
        challenge_id: Option<ChallengeId>,
    ) -> Result<Vec<InstallmentRow>> {
        let tables = self.tables.read().await;
        Ok(tables.owner_rows(owner_id, challenge_id, |_| true))
    }

    async fn insert_activity(&self, activity: NewActivity) -> Result<Activity> {
        self.commit(|tables| {
            if !tables.athletes.contains_key(&activity.athlete_id) {
                return Err(LedgerError::NotFound("athlete"));
            }
            let activity = Activity {
                id: bump(&mut tables.sequences.activity),
                athlete_id: activity.athlete_id,
                date: activity.date,
                km: activity.km,
                note: activity.note,
            };
            tables.activities.insert(activity.id, activity.clone());
            Ok(activity)
        })
        .await
    }

    async fn activities_of_challenge(&self, challenge_id: ChallengeId) -> Result<Vec<Activity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .activities
            .values()
            .filter(|a| {
                tables
                    .athletes
                    .get(&a.athlete_id)
                    .is_some_and(|athlete| athlete.challenge_id == challenge_id)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::challenge::AthleteProfile;
    use crate::domain::enrollment::PlanRequest;
    use crate::domain::money::Cents;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn created() -> NaiveDateTime {
        day("2024-01-01").and_hms_opt(8, 0, 0).unwrap()
    }

    fn plan(total: &str, count: i64) -> Plan {
        Plan::from_request(&PlanRequest {
            total_amount: total.to_string(),
            payment_type: "installments".to_string(),
            installments_count: Some(count),
            first_due_date: "2024-01-10".to_string(),
        })
        .unwrap()
    }

    async fn seeded() -> (InMemoryLedgerStore, Challenge, Athlete) {
        let store = InMemoryLedgerStore::new();
        let challenge = store
            .insert_challenge(
                1,
                ChallengeDraft {
                    title: "Run".to_string(),
                    description: String::new(),
                    goal_km: 100.0,
                    start_date: day("2024-01-01"),
                    end_date: day("2024-12-31"),
                },
                created(),
            )
            .await
            .unwrap();
        let (athlete, _) = store
            .insert_athlete(
                challenge.id,
                AthleteDraft {
                    name: "Ana".to_string(),
                    profile: AthleteProfile::default(),
                },
                created(),
                &plan("300", 3),
            )
            .await
            .unwrap();
        (store, challenge, athlete)
    }

    #[tokio::test]
    async fn test_replace_plan_keeps_enrollment_id_and_swaps_installments() {
        let (store, _, athlete) = seeded().await;
        let before = store.enrollment_of(athlete.id).await.unwrap().unwrap();
        let old_ids: Vec<_> = store
            .installments_of(athlete.id)
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();

        let after = store.replace_plan(athlete.id, &plan("100", 2)).await.unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.total_amount, Cents::new(10000));

        let installments = store.installments_of(athlete.id).await.unwrap();
        assert_eq!(installments.len(), 2);
        assert!(installments.iter().all(|i| !old_ids.contains(&i.id)));
    }

    #[tokio::test]
    async fn test_delete_athlete_cascades() {
        let (store, challenge, athlete) = seeded().await;
        store
            .insert_activity(NewActivity {
                athlete_id: athlete.id,
                date: day("2024-02-01"),
                km: 5.0,
                note: None,
            })
            .await
            .unwrap();

        assert!(store.delete_athlete(athlete.id, challenge.id).await.unwrap());
        assert!(store.enrollment_of(athlete.id).await.unwrap().is_none());
        assert!(store.activities_of_challenge(challenge.id).await.unwrap().is_empty());
        assert!(store.owner_installments(1, None).await.unwrap().is_empty());
        assert!(!store.delete_athlete(athlete.id, challenge.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_challenge_is_owner_scoped() {
        let (store, challenge, athlete) = seeded().await;
        assert!(!store.delete_challenge(challenge.id, 2).await.unwrap());
        assert!(store.delete_challenge(challenge.id, 1).await.unwrap());
        assert!(store.athlete_owner(athlete.id).await.unwrap().is_none());
        assert!(store.installments_of(athlete.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_installment_owner_resolves_full_chain() {
        let (store, challenge, athlete) = seeded().await;
        let first = store.installments_of(athlete.id).await.unwrap()[0].clone();
        let chain = store.installment_owner(first.id).await.unwrap().unwrap();
        assert_eq!(chain.owner_id, 1);
        assert_eq!(chain.challenge_id, challenge.id);
        assert_eq!(chain.athlete_id, athlete.id);
        assert!(store.installment_owner(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unpaid_due_before_is_strict() {
        let (store, _, athlete) = seeded().await;
        let due = store.unpaid_due_before(athlete.id, day("2024-02-10")).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].number, 1);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        {
            let store = InMemoryLedgerStore::open_snapshot(&path).unwrap();
            store
                .insert_challenge(
                    7,
                    ChallengeDraft {
                        title: "Swim".to_string(),
                        description: String::new(),
                        goal_km: 0.0,
                        start_date: day("2024-01-01"),
                        end_date: day("2024-01-31"),
                    },
                    created(),
                )
                .await
                .unwrap();
        }
        let reopened = InMemoryLedgerStore::open_snapshot(&path).unwrap();
        let challenges = reopened.challenges_of(7).await.unwrap();
        assert_eq!(challenges.len(), 1);
        assert_eq!(challenges[0].title, "Swim");
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_leaves_tables_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("ledger.json");
        let store = InMemoryLedgerStore::open_snapshot(&path).unwrap();

        let result = store
            .insert_challenge(
                1,
                ChallengeDraft {
                    title: "Ride".to_string(),
                    description: String::new(),
                    goal_km: 50.0,
                    start_date: day("2024-01-01"),
                    end_date: day("2024-06-30"),
                },
                created(),
            )
            .await;

        assert!(matches!(result, Err(LedgerError::IoError(_))));
        assert!(store.challenges_of(1).await.unwrap().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_plan_replacement_keeps_previous_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_dir = dir.path().join("ledger");
        fs::create_dir(&ledger_dir).unwrap();
        let path = ledger_dir.join("ledger.json");
        let store = InMemoryLedgerStore::open_snapshot(&path).unwrap();
        let challenge = store
            .insert_challenge(
                1,
                ChallengeDraft {
                    title: "Run".to_string(),
                    description: String::new(),
                    goal_km: 100.0,
                    start_date: day("2024-01-01"),
                    end_date: day("2024-12-31"),
                },
                created(),
            )
            .await
            .unwrap();
        let (athlete, enrollment) = store
            .insert_athlete(
                challenge.id,
                AthleteDraft {
                    name: "Ana".to_string(),
                    profile: AthleteProfile::default(),
                },
                created(),
                &plan("300", 3),
            )
            .await
            .unwrap();
        let schedule = store.installments_of(athlete.id).await.unwrap();

        fs::remove_dir_all(&ledger_dir).unwrap();
        assert!(store.replace_plan(athlete.id, &plan("100", 2)).await.is_err());

        let kept = store.enrollment_of(athlete.id).await.unwrap().unwrap();
        assert_eq!(kept.total_amount, enrollment.total_amount);
        assert_eq!(kept.installments_count, enrollment.installments_count);
        assert_eq!(store.installments_of(athlete.id).await.unwrap(), schedule);
        let logged = store
            .insert_activity(NewActivity {
                athlete_id: athlete.id,
                date: day("2024-02-01"),
                km: 3.0,
                note: None,
            })
            .await;
        assert!(logged.is_err());
        assert!(store.activities_of_challenge(challenge.id).await.unwrap().is_empty());
    }
}
