use super::in_memory::sort_rows;
use crate::domain::activity::{Activity, NewActivity};
use crate::domain::challenge::{Athlete, AthleteDraft, Challenge, ChallengeDraft};
use crate::domain::enrollment::{Enrollment, Installment, Plan};
use crate::domain::ownership::{AthleteOwnership, InstallmentOwnership};
use crate::domain::ports::{InstallmentRow, LedgerStore};
use crate::domain::{AthleteId, ChallengeId, EnrollmentId, InstallmentId, OwnerId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_CHALLENGES: &str = "challenges";
pub const CF_ATHLETES: &str = "athletes";
/// Keyed by athlete id: one enrollment per athlete.
pub const CF_ENROLLMENTS: &str = "enrollments";
pub const CF_INSTALLMENTS: &str = "installments";
pub const CF_ACTIVITIES: &str = "activities";
/// Id sequences.
pub const CF_META: &str = "meta";

const SEQUENCES_KEY: &[u8] = b"sequences";

const COLUMN_FAMILIES: [&str; 6] = [
    CF_CHALLENGES,
    CF_ATHLETES,
    CF_ENROLLMENTS,
    CF_INSTALLMENTS,
    CF_ACTIVITIES,
    CF_META,
];

#[derive(Debug, Default, Serialize, Deserialize)]
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

/// A persistent ledger backed by RocksDB.
///
/// Each entity lives in its own Column Family, keyed by big-endian id. Writes
/// that span several records are collected in one `WriteBatch`, which RocksDB
/// applies atomically; `write_lock` serializes the read-modify-write cycles
/// that build those batches.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// the column families on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, id: u64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        id: u64,
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(value)?);
        Ok(())
    }

    fn delete(&self, batch: &mut WriteBatch, cf_name: &str, id: u64) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.delete_cf(cf, id.to_be_bytes());
        Ok(())
    }

    fn sequences(&self) -> Result<Sequences> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(cf, SEQUENCES_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Sequences::default()),
        }
    }

    fn put_sequences(&self, batch: &mut WriteBatch, sequences: &Sequences) -> Result<()> {
        let cf = self.cf(CF_META)?;
        batch.put_cf(cf, SEQUENCES_KEY, serde_json::to_vec(sequences)?);
        Ok(())
    }

    fn installments_by_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Vec<Installment>> {
        let mut installments: Vec<Installment> = self
            .scan::<Installment>(CF_INSTALLMENTS)?
            .into_iter()
            .filter(|i| i.enrollment_id == enrollment_id)
            .collect();
        installments.sort_by_key(|i| i.number);
        Ok(installments)
    }

    /// Stages the plan for `athlete_id` into `batch`: the enrollment is
    /// created or updated in place and its installments are swapped whole.
    fn stage_plan(
        &self,
        batch: &mut WriteBatch,
        sequences: &mut Sequences,
        athlete_id: AthleteId,
        plan: &Plan,
    ) -> Result<Enrollment> {
        let enrollment = match self.get::<Enrollment>(CF_ENROLLMENTS, athlete_id)? {
            Some(mut existing) => {
                existing.apply_terms(&plan.terms);
                for stale in self.installments_by_enrollment(existing.id)? {
                    self.delete(batch, CF_INSTALLMENTS, stale.id)?;
                }
                existing
            }
            None => Enrollment::new(bump(&mut sequences.enrollment), athlete_id, &plan.terms),
        };
        self.put(batch, CF_ENROLLMENTS, athlete_id, &enrollment)?;
        for installment in plan.installments(enrollment.id, || bump(&mut sequences.installment)) {
            self.put(batch, CF_INSTALLMENTS, installment.id, &installment)?;
        }
        Ok(enrollment)
    }

    fn stage_athlete_removal(&self, batch: &mut WriteBatch, athlete_id: AthleteId) -> Result<()> {
        if let Some(enrollment) = self.get::<Enrollment>(CF_ENROLLMENTS, athlete_id)? {
            for installment in self.installments_by_enrollment(enrollment.id)? {
                self.delete(batch, CF_INSTALLMENTS, installment.id)?;
            }
            self.delete(batch, CF_ENROLLMENTS, athlete_id)?;
        }
        for activity in self.scan::<Activity>(CF_ACTIVITIES)? {
            if activity.athlete_id == athlete_id {
                self.delete(batch, CF_ACTIVITIES, activity.id)?;
            }
        }
        self.delete(batch, CF_ATHLETES, athlete_id)
    }

    fn owner_rows<F>(
        &self,
        owner_id: OwnerId,
        challenge_id: Option<ChallengeId>,
        keep: F,
    ) -> Result<Vec<InstallmentRow>>
    where
        F: Fn(&Installment) -> bool,
    {
        let challenges: HashMap<ChallengeId, Challenge> = self
            .scan::<Challenge>(CF_CHALLENGES)?
            .into_iter()
            .filter(|c| c.owner_id == owner_id && challenge_id.is_none_or(|id| id == c.id))
            .map(|c| (c.id, c))
            .collect();
        let athletes: HashMap<AthleteId, Athlete> = self
            .scan::<Athlete>(CF_ATHLETES)?
            .into_iter()
            .filter(|a| challenges.contains_key(&a.challenge_id))
            .map(|a| (a.id, a))
            .collect();
        let enrollments: HashMap<EnrollmentId, AthleteId> = self
            .scan::<Enrollment>(CF_ENROLLMENTS)?
            .into_iter()
            .filter(|e| athletes.contains_key(&e.athlete_id))
            .map(|e| (e.id, e.athlete_id))
            .collect();

        let mut rows = Vec::new();
        for installment in self.scan::<Installment>(CF_INSTALLMENTS)? {
            if !keep(&installment) {
                continue;
            }
            let Some(athlete) = enrollments
                .get(&installment.enrollment_id)
                .and_then(|id| athletes.get(id))
            else {
                continue;
            };
            let Some(challenge) = challenges.get(&athlete.challenge_id) else {
                continue;
            };
            rows.push(InstallmentRow {
                installment,
                athlete_id: athlete.id,
                athlete_name: athlete.name.clone(),
                challenge_id: challenge.id,
                challenge_title: challenge.title.clone(),
            });
        }
        sort_rows(&mut rows);
        Ok(rows)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn insert_challenge(
        &self,
        owner_id: OwnerId,
        draft: ChallengeDraft,
        created_at: NaiveDateTime,
    ) -> Result<Challenge> {
        let _guard = self.write_lock.lock().await;
        let mut sequences = self.sequences()?;
        let challenge = Challenge {
            id: bump(&mut sequences.challenge),
            owner_id,
            title: draft.title,
            description: draft.description,
            goal_km: draft.goal_km,
            start_date: draft.start_date,
            end_date: draft.end_date,
            created_at,
        };
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_CHALLENGES, challenge.id, &challenge)?;
        self.put_sequences(&mut batch, &sequences)?;
        self.db.write(batch)?;
        Ok(challenge)
    }

    async fn update_challenge(&self, challenge: Challenge) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match self.get::<Challenge>(CF_CHALLENGES, challenge.id)? {
            Some(existing) if existing.owner_id == challenge.owner_id => {}
            _ => return Err(LedgerError::NotFound("challenge")),
        }
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_CHALLENGES, challenge.id, &challenge)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn get_challenge(&self, id: ChallengeId, owner_id: OwnerId) -> Result<Option<Challenge>> {
        Ok(self
            .get::<Challenge>(CF_CHALLENGES, id)?
            .filter(|c| c.owner_id == owner_id))
    }

    async fn challenges_of(&self, owner_id: OwnerId) -> Result<Vec<Challenge>> {
        Ok(self
            .scan::<Challenge>(CF_CHALLENGES)?
            .into_iter()
            .filter(|c| c.owner_id == owner_id)
            .collect())
    }

    async fn delete_challenge(&self, id: ChallengeId, owner_id: OwnerId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.get_challenge(id, owner_id).await?.is_none() {
            return Ok(false);
        }
        let athletes = self.athletes_of(id).await?;
        let mut batch = WriteBatch::default();
        for athlete in athletes {
            self.stage_athlete_removal(&mut batch, athlete.id)?;
        }
        self.delete(&mut batch, CF_CHALLENGES, id)?;
        self.db.write(batch)?;
        Ok(true)
    }

    async fn insert_athlete(
        &self,
        challenge_id: ChallengeId,
        draft: AthleteDraft,
        created_at: NaiveDateTime,
        plan: &Plan,
    ) -> Result<(Athlete, Enrollment)> {
        let _guard = self.write_lock.lock().await;
        if self.get::<Challenge>(CF_CHALLENGES, challenge_id)?.is_none() {
            return Err(LedgerError::NotFound("challenge"));
        }
        let mut sequences = self.sequences()?;
        let athlete = Athlete {
            id: bump(&mut sequences.athlete),
            challenge_id,
            name: draft.name,
            profile: draft.profile,
            created_at,
        };
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_ATHLETES, athlete.id, &athlete)?;
        let enrollment = self.stage_plan(&mut batch, &mut sequences, athlete.id, plan)?;
        self.put_sequences(&mut batch, &sequences)?;
        self.db.write(batch)?;
        Ok((athlete, enrollment))
    }

    async fn update_athlete(&self, athlete: Athlete, plan: &Plan) -> Result<Enrollment> {
        let _guard = self.write_lock.lock().await;
        match self.get::<Athlete>(CF_ATHLETES, athlete.id)? {
            Some(existing) if existing.challenge_id == athlete.challenge_id => {}
            _ => return Err(LedgerError::NotFound("athlete")),
        }
        let mut sequences = self.sequences()?;
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_ATHLETES, athlete.id, &athlete)?;
        let enrollment = self.stage_plan(&mut batch, &mut sequences, athlete.id, plan)?;
        self.put_sequences(&mut batch, &sequences)?;
        self.db.write(batch)?;
        Ok(enrollment)
    }

    async fn get_athlete(
        &self,
        id: AthleteId,
        challenge_id: ChallengeId,
    ) -> Result<Option<Athlete>> {
        Ok(self
            .get::<Athlete>(CF_ATHLETES, id)?
            .filter(|a| a.challenge_id == challenge_id))
    }

    async fn athlete_owner(&self, athlete_id: AthleteId) -> Result<Option<AthleteOwnership>> {
        let Some(athlete) = self.get::<Athlete>(CF_ATHLETES, athlete_id)? else {
            return Ok(None);
        };
        let challenge = self.get::<Challenge>(CF_CHALLENGES, athlete.challenge_id)?;
        Ok(challenge.map(|c| AthleteOwnership {
            athlete_id,
            athlete_name: athlete.name,
            challenge_id: c.id,
            owner_id: c.owner_id,
        }))
    }

    async fn athletes_of(&self, challenge_id: ChallengeId) -> Result<Vec<Athlete>> {
        Ok(self
            .scan::<Athlete>(CF_ATHLETES)?
            .into_iter()
            .filter(|a| a.challenge_id == challenge_id)
            .collect())
    }

    async fn delete_athlete(&self, id: AthleteId, challenge_id: ChallengeId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.get_athlete(id, challenge_id).await?.is_none() {
            return Ok(false);
        }
        let mut batch = WriteBatch::default();
        self.stage_athlete_removal(&mut batch, id)?;
        self.db.write(batch)?;
        Ok(true)
    }

    async fn enrollment_of(&self, athlete_id: AthleteId) -> Result<Option<Enrollment>> {
        self.get(CF_ENROLLMENTS, athlete_id)
    }

    async fn replace_plan(&self, athlete_id: AthleteId, plan: &Plan) -> Result<Enrollment> {
        let _guard = self.write_lock.lock().await;
        if self.get::<Athlete>(CF_ATHLETES, athlete_id)?.is_none() {
            return Err(LedgerError::NotFound("athlete"));
        }
        let mut sequences = self.sequences()?;
        let mut batch = WriteBatch::default();
        let enrollment = self.stage_plan(&mut batch, &mut sequences, athlete_id, plan)?;
        self.put_sequences(&mut batch, &sequences)?;
        self.db.write(batch)?;
        Ok(enrollment)
    }

    async fn installments_of(&self, athlete_id: AthleteId) -> Result<Vec<Installment>> {
        match self.get::<Enrollment>(CF_ENROLLMENTS, athlete_id)? {
            Some(enrollment) => self.installments_by_enrollment(enrollment.id),
            None => Ok(Vec::new()),
        }
    }

    async fn installment_owner(
        &self,
        installment_id: InstallmentId,
    ) -> Result<Option<InstallmentOwnership>> {
        let Some(installment) = self.get::<Installment>(CF_INSTALLMENTS, installment_id)? else {
            return Ok(None);
        };
        let Some(enrollment) = self
            .scan::<Enrollment>(CF_ENROLLMENTS)?
            .into_iter()
            .find(|e| e.id == installment.enrollment_id)
        else {
            return Ok(None);
        };
        let Some(chain) = self.athlete_owner(enrollment.athlete_id).await? else {
            return Ok(None);
        };
        Ok(Some(InstallmentOwnership {
            installment,
            enrollment_id: enrollment.id,
            athlete_id: chain.athlete_id,
            challenge_id: chain.challenge_id,
            owner_id: chain.owner_id,
        }))
    }

    async fn update_installment(&self, installment: Installment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match self.get::<Installment>(CF_INSTALLMENTS, installment.id)? {
            Some(existing) if existing.enrollment_id == installment.enrollment_id => {}
            _ => return Err(LedgerError::NotFound("installment")),
        }
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_INSTALLMENTS, installment.id, &installment)?;
        self.db.write(batch)?;
        Ok(())
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
        self.owner_rows(owner_id, challenge_id, |i| !i.is_paid() && i.due_date < date)
    }

    async fn owner_installments(
        &self,
        owner_id: OwnerId,
        challenge_id: Option<ChallengeId>,
    ) -> Result<Vec<InstallmentRow>> {
        self.owner_rows(owner_id, challenge_id, |_| true)
    }

    async fn insert_activity(&self, activity: NewActivity) -> Result<Activity> {
        let _guard = self.write_lock.lock().await;
        if self.get::<Athlete>(CF_ATHLETES, activity.athlete_id)?.is_none() {
            return Err(LedgerError::NotFound("athlete"));
        }
        let mut sequences = self.sequences()?;
        let activity = Activity {
            id: bump(&mut sequences.activity),
            athlete_id: activity.athlete_id,
            date: activity.date,
            km: activity.km,
            note: activity.note,
        };
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_ACTIVITIES, activity.id, &activity)?;
        self.put_sequences(&mut batch, &sequences)?;
        self.db.write(batch)?;
        Ok(activity)
    }

    async fn activities_of_challenge(&self, challenge_id: ChallengeId) -> Result<Vec<Activity>> {
        let athletes: Vec<AthleteId> = self
            .athletes_of(challenge_id)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        Ok(self
            .scan::<Activity>(CF_ACTIVITIES)?
            .into_iter()
            .filter(|a| athletes.contains(&a.athlete_id))
            .collect())
    }
}
