use super::calendar::parse_date;
use super::{AthleteId, ChallengeId, OwnerId};
use crate::error::{LedgerError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A distance-accumulation challenge run by one organizer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Challenge {
    pub id: ChallengeId,
    pub owner_id: OwnerId,
    pub title: String,
    pub description: String,
    /// Target distance in km. Zero means the challenge has no goal.
    pub goal_km: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: NaiveDateTime,
}

/// Raw challenge fields as entered by the organizer.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChallengeInput {
    pub title: String,
    pub description: Option<String>,
    pub goal_km: f64,
    pub start_date: String,
    pub end_date: String,
}

/// Challenge fields after validation.
#[derive(Debug, PartialEq, Clone)]
pub struct ChallengeDraft {
    pub title: String,
    pub description: String,
    pub goal_km: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ChallengeInput {
    pub fn validate(&self) -> Result<ChallengeDraft> {
        let title = require_text(&self.title, "title")?;
        if !self.goal_km.is_finite() || self.goal_km < 0.0 {
            return Err(LedgerError::validation("goal must be greater than or equal to 0"));
        }
        let start_date = parse_date(&self.start_date, "start date")?;
        let end_date = parse_date(&self.end_date, "end date")?;
        if end_date < start_date {
            return Err(LedgerError::validation("end date must not be before the start date"));
        }
        Ok(ChallengeDraft {
            title,
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            goal_km: self.goal_km,
            start_date,
            end_date,
        })
    }
}

/// A participant of one challenge.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Athlete {
    pub id: AthleteId,
    pub challenge_id: ChallengeId,
    pub name: String,
    #[serde(flatten)]
    pub profile: AthleteProfile,
    pub created_at: NaiveDateTime,
}

/// Optional demographic data kept alongside the athlete's name.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct AthleteProfile {
    pub phone: Option<String>,
    pub bib_number: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub shirt_size: Option<String>,
    pub personal_goal_km: Option<f64>,
}

/// Raw athlete fields as entered by the organizer.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AthleteInput {
    pub name: String,
    pub phone: Option<String>,
    pub bib_number: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub shirt_size: Option<String>,
    pub personal_goal_km: Option<f64>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct AthleteDraft {
    pub name: String,
    pub profile: AthleteProfile,
}

impl AthleteInput {
    pub fn validate(&self) -> Result<AthleteDraft> {
        let name = require_text(&self.name, "athlete name")?;
        let birth_date = match optional_text(&self.birth_date) {
            Some(text) => Some(parse_date(&text, "birth date")?),
            None => None,
        };
        if let Some(goal) = self.personal_goal_km
            && (!goal.is_finite() || goal < 0.0)
        {
            return Err(LedgerError::validation(
                "personal goal must be greater than or equal to 0",
            ));
        }
        Ok(AthleteDraft {
            name,
            profile: AthleteProfile {
                phone: optional_text(&self.phone),
                bib_number: optional_text(&self.bib_number),
                birth_date,
                gender: optional_text(&self.gender),
                shirt_size: optional_text(&self.shirt_size),
                personal_goal_km: self.personal_goal_km,
            },
        })
    }
}

fn require_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Challenge row with its aggregated figures, as listed on the dashboard.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct ChallengeSummary {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub total_km: f64,
    pub athletes_count: usize,
}

#[derive(Debug, Serialize, PartialEq, Clone, Copy)]
pub struct ChallengeProgress {
    pub goal_km: f64,
    pub total_km: f64,
    pub percent: f64,
}

impl ChallengeProgress {
    pub fn new(goal_km: f64, total_km: f64) -> Self {
        let percent = if goal_km > 0.0 {
            (total_km / goal_km * 100.0).min(100.0)
        } else {
            0.0
        };
        Self {
            goal_km,
            total_km,
            percent,
        }
    }
}
