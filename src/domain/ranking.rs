//! Challenge standings.

use super::activity::{Activity, replay_order};
use super::challenge::Athlete;
use super::{ActivityId, AthleteId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// The activity at which an athlete's running total first met the goal.
///
/// Field order matters: markers compare by date, then insertion order.
#[derive(Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct GoalMarker {
    pub date: NaiveDate,
    pub activity_id: ActivityId,
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct Standing {
    pub athlete_id: AthleteId,
    pub name: String,
    pub bib_number: Option<String>,
    pub total_km: f64,
    pub last_activity_date: Option<NaiveDate>,
    pub goal_reached: Option<GoalMarker>,
    #[serde(skip)]
    pub created_at: NaiveDateTime,
}

/// Orders `athletes` by accumulated distance.
///
/// Ties are broken by goal marker (holders first, earlier first), then by
/// last activity date ascending (athletes with no activity last), then by
/// creation time. A `goal_km` of zero disables goal markers.
pub fn rank(goal_km: f64, athletes: &[Athlete], activities: &[Activity]) -> Vec<Standing> {
    let mut standings: Vec<Standing> = athletes
        .iter()
        .map(|athlete| Standing {
            athlete_id: athlete.id,
            name: athlete.name.clone(),
            bib_number: athlete.profile.bib_number.clone(),
            total_km: 0.0,
            last_activity_date: None,
            goal_reached: None,
            created_at: athlete.created_at,
        })
        .collect();
    let index: HashMap<AthleteId, usize> = standings
        .iter()
        .enumerate()
        .map(|(i, s)| (s.athlete_id, i))
        .collect();

    for activity in replay_order(activities) {
        let Some(&i) = index.get(&activity.athlete_id) else {
            continue;
        };
        let standing = &mut standings[i];
        standing.total_km += activity.km;
        standing.last_activity_date = standing.last_activity_date.max(Some(activity.date));
        if goal_km > 0.0 && standing.goal_reached.is_none() && standing.total_km >= goal_km {
            standing.goal_reached = Some(GoalMarker {
                date: activity.date,
                activity_id: activity.id,
            });
        }
    }

    standings.sort_by(compare_standings);
    standings
}

fn compare_standings(a: &Standing, b: &Standing) -> Ordering {
    b.total_km
        .total_cmp(&a.total_km)
        .then_with(|| match (a.goal_reached, b.goal_reached) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        // Longer-inactive athletes rank first. Kept as-is, see DESIGN.md.
        .then_with(|| {
            let a_last = a.last_activity_date.unwrap_or(NaiveDate::MAX);
            let b_last = b.last_activity_date.unwrap_or(NaiveDate::MAX);
            a_last.cmp(&b_last)
        })
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.athlete_id.cmp(&b.athlete_id))
}
