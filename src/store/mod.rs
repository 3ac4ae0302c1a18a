//! Persistence seam.
//!
//! Every method is individually atomic and idempotent with respect to the
//! keys it writes, so a batch item that fails halfway leaves only complete
//! rows behind and can be replayed.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Coach, Country, FootballMatch, League, MatchListing, NewMatch, Player, Season, Team, TeamStats,
};

pub use postgres::PgStore;

/// Which teams a multi-team job walks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamFilter {
    pub team_id: Option<Uuid>,
    pub league_id: Option<Uuid>,
    /// Only teams with an upstream id.
    pub with_api_id: bool,
    /// Only teams that have no stats snapshot yet.
    pub without_stats: bool,
}

#[async_trait]
pub trait FootballStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    // Countries
    async fn country_by_name(&self, name: &str) -> Result<Option<Country>>;
    /// Insert, or return the row that already holds this name.
    async fn insert_country(&self, country: &Country) -> Result<Country>;

    // Leagues
    async fn league_by_id(&self, id: Uuid) -> Result<Option<League>>;
    async fn league_by_api_id(&self, api_league_id: i64) -> Result<Option<League>>;
    /// Exact, case-insensitive name match.
    async fn league_by_name(&self, name: &str) -> Result<Option<League>>;
    /// Competition code stored in the league metadata (`PL`, `CL`).
    async fn league_by_code(&self, code: &str) -> Result<Option<League>>;
    /// Case-insensitive substring match on the name, ordered by name.
    async fn leagues_matching(&self, fragment: &str) -> Result<Vec<League>>;
    /// Active leagues that carry an upstream id.
    async fn active_leagues(&self) -> Result<Vec<League>>;
    /// Insert, or return the row that already holds this upstream id.
    async fn insert_league(&self, league: &League) -> Result<League>;
    async fn update_league(&self, league: &League) -> Result<()>;

    // Seasons
    async fn season_for(&self, league_id: Uuid, year: i32) -> Result<Option<Season>>;
    async fn insert_season(&self, season: &Season) -> Result<Season>;
    async fn update_season(&self, season: &Season) -> Result<()>;

    // Teams
    async fn team_by_id(&self, id: Uuid) -> Result<Option<Team>>;
    async fn team_by_api_id(&self, api_team_id: i64) -> Result<Option<Team>>;
    async fn team_by_name(&self, name: &str) -> Result<Option<Team>>;
    /// First team, by name, whose name contains `fragment` (case-insensitive).
    async fn find_team(&self, fragment: &str) -> Result<Option<Team>>;
    async fn teams(&self, filter: &TeamFilter) -> Result<Vec<Team>>;
    async fn insert_team(&self, team: &Team) -> Result<Team>;
    async fn update_team(&self, team: &Team) -> Result<()>;

    // Matches
    async fn match_by_api_id(&self, api_fixture_id: i64) -> Result<Option<FootballMatch>>;
    /// Insert keyed on `api_fixture_id`, or merge into the existing row.
    async fn upsert_match(&self, new_match: &NewMatch) -> Result<FootballMatch>;
    /// Matches kicking off in `[from, to)`, ordered by kickoff.
    async fn match_listings(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<MatchListing>>;

    // Squads
    async fn upsert_player(&self, player: &Player) -> Result<Player>;
    async fn upsert_coach(&self, coach: &Coach) -> Result<Coach>;

    // Stats
    /// Most recently updated snapshot of a team.
    async fn latest_team_stats(&self, team_id: Uuid) -> Result<Option<TeamStats>>;
    async fn upsert_team_stats(&self, stats: &TeamStats) -> Result<TeamStats>;
}
