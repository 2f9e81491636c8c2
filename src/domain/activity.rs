use super::calendar::parse_date;
use super::{ActivityId, AthleteId};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A distance entry. Activities are append-only: created once and removed
/// only when their athlete is deleted.
///
/// Ids are allocated monotonically by the store, so `id` doubles as the
/// insertion order within a day.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Activity {
    pub id: ActivityId,
    pub athlete_id: AthleteId,
    pub date: NaiveDate,
    pub km: f64,
    pub note: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct NewActivity {
    pub athlete_id: AthleteId,
    pub date: NaiveDate,
    pub km: f64,
    pub note: Option<String>,
}

impl NewActivity {
    pub fn parse(athlete_id: AthleteId, date: &str, km: f64, note: Option<&str>) -> Result<Self> {
        let date = parse_date(date, "date")?;
        if !km.is_finite() || km <= 0.0 {
            return Err(LedgerError::validation("distance must be a positive number"));
        }
        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        Ok(Self {
            athlete_id,
            date,
            km,
            note,
        })
    }
}

/// Activities by date, then by insertion. Every distance total is summed in
/// this order so that the same entries always add up to the same `f64`.
pub fn replay_order(activities: &[Activity]) -> Vec<&Activity> {
    let mut replay: Vec<&Activity> = activities.iter().collect();
    replay.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
    replay
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct DistanceTotal {
    pub km: f64,
    pub last_activity_date: Option<NaiveDate>,
}

pub fn distance_totals(activities: &[Activity]) -> HashMap<AthleteId, DistanceTotal> {
    let mut totals: HashMap<AthleteId, DistanceTotal> = HashMap::new();
    for activity in replay_order(activities) {
        let total = totals.entry(activity.athlete_id).or_default();
        total.km += activity.km;
        total.last_activity_date = total.last_activity_date.max(Some(activity.date));
    }
    totals
}

pub fn total_km(activities: &[Activity]) -> f64 {
    replay_order(activities).iter().map(|a| a.km).sum()
}
