//! Database row types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::normalize::MatchStatus;

/// Name a league gets when it is first seen without one.
pub fn placeholder_league_name(api_league_id: i64) -> String {
    format!("League {}", api_league_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Country {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub flag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct League {
    pub id: Uuid,
    pub api_league_id: Option<i64>,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub league_type: String,
    pub logo: Option<String>,
    pub active: bool,
    pub country_id: Option<Uuid>,
    pub current_matchday: Option<i32>,
    pub metadata: Option<Value>,
}

impl League {
    pub fn has_placeholder_name(&self) -> bool {
        self.api_league_id
            .map(|id| self.name == placeholder_league_name(id))
            .unwrap_or(false)
    }

    /// Competition code such as `PL`, when the catalogue import stored one.
    pub fn code(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("code"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Season {
    pub id: Uuid,
    pub league_id: Uuid,
    pub year: i32,
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub current_matchday: Option<i32>,
    #[sqlx(rename = "is_current")]
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub api_team_id: Option<i64>,
    pub name: String,
    pub short_name: Option<String>,
    pub tla: Option<String>,
    pub logo: Option<String>,
    pub country_id: Option<Uuid>,
    pub league_id: Option<Uuid>,
    pub founded: Option<i32>,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub club_colors: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FootballMatch {
    pub id: Uuid,
    pub api_fixture_id: i64,
    pub league_id: Uuid,
    pub season_id: Uuid,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub match_date: Option<DateTime<Utc>>,
    pub status: String,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
    pub home_halftime_goals: Option<i32>,
    pub away_halftime_goals: Option<i32>,
    pub elapsed: Option<i32>,
    pub venue: Option<String>,
    pub referee: Option<String>,
    pub round: Option<String>,
    pub stats: Option<Value>,
    pub events: Option<Value>,
    pub lineups: Option<Value>,
    pub metadata: Option<Value>,
}

impl FootballMatch {
    pub fn match_status(&self) -> MatchStatus {
        MatchStatus::from_stored(&self.status)
    }
}

/// Input of the match upsert; the row minus its surrogate key.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMatch {
    pub api_fixture_id: i64,
    pub league_id: Uuid,
    pub season_id: Uuid,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub match_date: Option<DateTime<Utc>>,
    /// Absent status keeps the stored one; a new row starts as unknown.
    pub status: Option<MatchStatus>,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
    pub home_halftime_goals: Option<i32>,
    pub away_halftime_goals: Option<i32>,
    pub elapsed: Option<i32>,
    pub venue: Option<String>,
    pub referee: Option<String>,
    pub round: Option<String>,
    pub stats: Option<Value>,
    pub events: Option<Value>,
    pub lineups: Option<Value>,
    pub metadata: Option<Value>,
}

impl NewMatch {
    pub fn into_row(self, id: Uuid) -> FootballMatch {
        FootballMatch {
            id,
            api_fixture_id: self.api_fixture_id,
            league_id: self.league_id,
            season_id: self.season_id,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
            match_date: self.match_date,
            status: self.status.unwrap_or(MatchStatus::Unknown).as_str().to_string(),
            home_goals: self.home_goals,
            away_goals: self.away_goals,
            home_halftime_goals: self.home_halftime_goals,
            away_halftime_goals: self.away_halftime_goals,
            elapsed: self.elapsed,
            venue: self.venue,
            referee: self.referee,
            round: self.round,
            stats: self.stats,
            events: self.events,
            lineups: self.lineups,
            metadata: self.metadata,
        }
    }

    /// Apply this fixture to an existing row.
    ///
    /// References and raw metadata replace the stored values. Status, kickoff,
    /// scores and detail blocks only replace stored values when the new
    /// payload carries them. The SQL upsert in the Postgres store has the
    /// same shape.
    pub fn merge_into(&self, existing: &FootballMatch) -> FootballMatch {
        FootballMatch {
            id: existing.id,
            api_fixture_id: existing.api_fixture_id,
            league_id: self.league_id,
            season_id: self.season_id,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
            match_date: self.match_date.or(existing.match_date),
            status: self
                .status
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| existing.status.clone()),
            home_goals: self.home_goals.or(existing.home_goals),
            away_goals: self.away_goals.or(existing.away_goals),
            home_halftime_goals: self.home_halftime_goals.or(existing.home_halftime_goals),
            away_halftime_goals: self.away_halftime_goals.or(existing.away_halftime_goals),
            elapsed: self.elapsed.or(existing.elapsed),
            venue: self.venue.clone().or_else(|| existing.venue.clone()),
            referee: self.referee.clone().or_else(|| existing.referee.clone()),
            round: self.round.clone().or_else(|| existing.round.clone()),
            stats: self.stats.clone().or_else(|| existing.stats.clone()),
            events: self.events.clone().or_else(|| existing.events.clone()),
            lineups: self.lineups.clone().or_else(|| existing.lineups.clone()),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Player {
    pub id: Uuid,
    pub team_id: Uuid,
    pub api_player_id: i64,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub shirt_number: Option<i32>,
    pub market_value: Option<i64>,
    pub contract_start: Option<NaiveDate>,
    pub contract_until: Option<NaiveDate>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Coach {
    pub id: Uuid,
    pub team_id: Uuid,
    pub api_coach_id: i64,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub contract_start: Option<NaiveDate>,
    pub contract_until: Option<NaiveDate>,
    pub metadata: Option<Value>,
}

/// Cached statistics snapshot of one team in one league and season.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TeamStats {
    pub id: Uuid,
    pub team_id: Uuid,
    pub league_id: Uuid,
    pub season: i32,
    pub stats_json: Value,
    pub updated_at: DateTime<Utc>,
}

/// A match joined with the names and logos the browser shows.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MatchListing {
    pub id: Uuid,
    pub api_fixture_id: i64,
    pub match_date: Option<DateTime<Utc>>,
    pub status: String,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
    pub elapsed: Option<i32>,
    pub venue: Option<String>,
    pub league_id: Uuid,
    pub league_name: String,
    pub league_logo: Option<String>,
    pub country_name: Option<String>,
    pub home_team_name: String,
    pub home_team_logo: Option<String>,
    pub away_team_name: String,
    pub away_team_logo: Option<String>,
}
