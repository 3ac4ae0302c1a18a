//! In-memory `FootballStore` for tests.

use std::collections::HashSet;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{FootballStore, TeamFilter};
use crate::error::{IngestError, Result};
use crate::models::{
    Coach, Country, FootballMatch, League, MatchListing, NewMatch, Player, Season, Team, TeamStats,
};

#[derive(Default)]
pub struct MemoryState {
    pub countries: Vec<Country>,
    pub leagues: Vec<League>,
    pub seasons: Vec<Season>,
    pub teams: Vec<Team>,
    pub matches: Vec<FootballMatch>,
    pub players: Vec<Player>,
    pub coaches: Vec<Coach>,
    pub team_stats: Vec<TeamStats>,
    failing_team_api_ids: HashSet<i64>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every lookup of this upstream team id fail.
    pub async fn fail_on_team(&self, api_team_id: i64) {
        self.state.lock().await.failing_team_api_ids.insert(api_team_id);
    }

    pub async fn snapshot<T>(&self, read: impl FnOnce(&MemoryState) -> T) -> T {
        let state = self.state.lock().await;
        read(&state)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl FootballStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn country_by_name(&self, name: &str) -> Result<Option<Country>> {
        let state = self.state.lock().await;
        Ok(state.countries.iter().find(|c| c.name == name).cloned())
    }

    async fn insert_country(&self, country: &Country) -> Result<Country> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.countries.iter().find(|c| c.name == country.name) {
            return Ok(existing.clone());
        }
        state.countries.push(country.clone());
        Ok(country.clone())
    }

    async fn league_by_id(&self, id: Uuid) -> Result<Option<League>> {
        let state = self.state.lock().await;
        Ok(state.leagues.iter().find(|l| l.id == id).cloned())
    }

    async fn league_by_api_id(&self, api_league_id: i64) -> Result<Option<League>> {
        let state = self.state.lock().await;
        Ok(state
            .leagues
            .iter()
            .find(|l| l.api_league_id == Some(api_league_id))
            .cloned())
    }

    async fn league_by_name(&self, name: &str) -> Result<Option<League>> {
        let state = self.state.lock().await;
        Ok(state
            .leagues
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn league_by_code(&self, code: &str) -> Result<Option<League>> {
        let state = self.state.lock().await;
        Ok(state
            .leagues
            .iter()
            .find(|l| l.code().map(|c| c.eq_ignore_ascii_case(code)).unwrap_or(false))
            .cloned())
    }

    async fn leagues_matching(&self, fragment: &str) -> Result<Vec<League>> {
        let state = self.state.lock().await;
        let mut leagues: Vec<League> = state
            .leagues
            .iter()
            .filter(|l| contains_ci(&l.name, fragment))
            .cloned()
            .collect();
        leagues.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(leagues)
    }

    async fn active_leagues(&self) -> Result<Vec<League>> {
        let state = self.state.lock().await;
        let mut leagues: Vec<League> = state
            .leagues
            .iter()
            .filter(|l| l.active && l.api_league_id.is_some())
            .cloned()
            .collect();
        leagues.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(leagues)
    }

    async fn insert_league(&self, league: &League) -> Result<League> {
        let mut state = self.state.lock().await;
        if let Some(api_id) = league.api_league_id {
            if let Some(existing) = state.leagues.iter().find(|l| l.api_league_id == Some(api_id)) {
                return Ok(existing.clone());
            }
        }
        state.leagues.push(league.clone());
        Ok(league.clone())
    }

    async fn update_league(&self, league: &League) -> Result<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .leagues
            .iter_mut()
            .find(|l| l.id == league.id)
            .ok_or_else(|| IngestError::NotFound(format!("league {}", league.id)))?;
        *slot = league.clone();
        Ok(())
    }

    async fn season_for(&self, league_id: Uuid, year: i32) -> Result<Option<Season>> {
        let state = self.state.lock().await;
        Ok(state
            .seasons
            .iter()
            .find(|s| s.league_id == league_id && s.year == year)
            .cloned())
    }

    async fn insert_season(&self, season: &Season) -> Result<Season> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .seasons
            .iter()
            .find(|s| s.league_id == season.league_id && s.year == season.year)
        {
            return Ok(existing.clone());
        }
        state.seasons.push(season.clone());
        Ok(season.clone())
    }

    async fn update_season(&self, season: &Season) -> Result<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .seasons
            .iter_mut()
            .find(|s| s.id == season.id)
            .ok_or_else(|| IngestError::NotFound(format!("season {}", season.id)))?;
        *slot = season.clone();
        Ok(())
    }

    async fn team_by_id(&self, id: Uuid) -> Result<Option<Team>> {
        let state = self.state.lock().await;
        Ok(state.teams.iter().find(|t| t.id == id).cloned())
    }

    async fn team_by_api_id(&self, api_team_id: i64) -> Result<Option<Team>> {
        let state = self.state.lock().await;
        if state.failing_team_api_ids.contains(&api_team_id) {
            return Err(IngestError::Other(anyhow!(
                "injected failure for team {}",
                api_team_id
            )));
        }
        Ok(state
            .teams
            .iter()
            .find(|t| t.api_team_id == Some(api_team_id))
            .cloned())
    }

    async fn team_by_name(&self, name: &str) -> Result<Option<Team>> {
        let state = self.state.lock().await;
        Ok(state
            .teams
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn find_team(&self, fragment: &str) -> Result<Option<Team>> {
        let state = self.state.lock().await;
        let mut found: Vec<&Team> = state
            .teams
            .iter()
            .filter(|t| contains_ci(&t.name, fragment))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found.first().map(|t| (*t).clone()))
    }

    async fn teams(&self, filter: &TeamFilter) -> Result<Vec<Team>> {
        let state = self.state.lock().await;
        let mut teams: Vec<Team> = state
            .teams
            .iter()
            .filter(|t| filter.team_id.map(|id| t.id == id).unwrap_or(true))
            .filter(|t| filter.league_id.map(|id| t.league_id == Some(id)).unwrap_or(true))
            .filter(|t| !filter.with_api_id || t.api_team_id.is_some())
            .filter(|t| !filter.without_stats || !state.team_stats.iter().any(|s| s.team_id == t.id))
            .cloned()
            .collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn insert_team(&self, team: &Team) -> Result<Team> {
        let mut state = self.state.lock().await;
        if let Some(api_id) = team.api_team_id {
            if state.failing_team_api_ids.contains(&api_id) {
                return Err(IngestError::Other(anyhow!("injected failure for team {}", api_id)));
            }
            if let Some(existing) = state.teams.iter().find(|t| t.api_team_id == Some(api_id)) {
                return Ok(existing.clone());
            }
        }
        state.teams.push(team.clone());
        Ok(team.clone())
    }

    async fn update_team(&self, team: &Team) -> Result<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .teams
            .iter_mut()
            .find(|t| t.id == team.id)
            .ok_or_else(|| IngestError::NotFound(format!("team {}", team.id)))?;
        *slot = team.clone();
        Ok(())
    }

    async fn match_by_api_id(&self, api_fixture_id: i64) -> Result<Option<FootballMatch>> {
        let state = self.state.lock().await;
        Ok(state
            .matches
            .iter()
            .find(|m| m.api_fixture_id == api_fixture_id)
            .cloned())
    }

    async fn upsert_match(&self, new_match: &NewMatch) -> Result<FootballMatch> {
        let mut state = self.state.lock().await;
        if let Some(slot) = state
            .matches
            .iter_mut()
            .find(|m| m.api_fixture_id == new_match.api_fixture_id)
        {
            *slot = new_match.merge_into(slot);
            return Ok(slot.clone());
        }
        let row = new_match.clone().into_row(Uuid::new_v4());
        state.matches.push(row.clone());
        Ok(row)
    }

    async fn match_listings(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<MatchListing>> {
        let state = self.state.lock().await;
        let mut listings = Vec::new();
        for m in &state.matches {
            let Some(kickoff) = m.match_date else { continue };
            if kickoff < from || kickoff >= to {
                continue;
            }
            let league = state.leagues.iter().find(|l| l.id == m.league_id);
            let home = state.teams.iter().find(|t| t.id == m.home_team_id);
            let away = state.teams.iter().find(|t| t.id == m.away_team_id);
            let (Some(league), Some(home), Some(away)) = (league, home, away) else {
                continue;
            };
            let country = league
                .country_id
                .and_then(|id| state.countries.iter().find(|c| c.id == id));
            listings.push(MatchListing {
                id: m.id,
                api_fixture_id: m.api_fixture_id,
                match_date: m.match_date,
                status: m.status.clone(),
                home_goals: m.home_goals,
                away_goals: m.away_goals,
                elapsed: m.elapsed,
                venue: m.venue.clone(),
                league_id: league.id,
                league_name: league.name.clone(),
                league_logo: league.logo.clone(),
                country_name: country.map(|c| c.name.clone()),
                home_team_name: home.name.clone(),
                home_team_logo: home.logo.clone(),
                away_team_name: away.name.clone(),
                away_team_logo: away.logo.clone(),
            });
        }
        listings.sort_by(|a, b| {
            a.match_date
                .cmp(&b.match_date)
                .then_with(|| a.league_name.cmp(&b.league_name))
        });
        Ok(listings)
    }

    async fn upsert_player(&self, player: &Player) -> Result<Player> {
        let mut state = self.state.lock().await;
        if let Some(slot) = state
            .players
            .iter_mut()
            .find(|p| p.team_id == player.team_id && p.api_player_id == player.api_player_id)
        {
            let id = slot.id;
            *slot = Player {
                id,
                first_name: player.first_name.clone().or_else(|| slot.first_name.clone()),
                last_name: player.last_name.clone().or_else(|| slot.last_name.clone()),
                position: player.position.clone().or_else(|| slot.position.clone()),
                date_of_birth: player.date_of_birth.or(slot.date_of_birth),
                nationality: player.nationality.clone().or_else(|| slot.nationality.clone()),
                shirt_number: player.shirt_number.or(slot.shirt_number),
                market_value: player.market_value.or(slot.market_value),
                contract_start: player.contract_start.or(slot.contract_start),
                contract_until: player.contract_until.or(slot.contract_until),
                metadata: player.metadata.clone().or_else(|| slot.metadata.clone()),
                ..player.clone()
            };
            return Ok(slot.clone());
        }
        state.players.push(player.clone());
        Ok(player.clone())
    }

    async fn upsert_coach(&self, coach: &Coach) -> Result<Coach> {
        let mut state = self.state.lock().await;
        if let Some(slot) = state
            .coaches
            .iter_mut()
            .find(|c| c.team_id == coach.team_id && c.api_coach_id == coach.api_coach_id)
        {
            let id = slot.id;
            *slot = Coach {
                id,
                first_name: coach.first_name.clone().or_else(|| slot.first_name.clone()),
                last_name: coach.last_name.clone().or_else(|| slot.last_name.clone()),
                date_of_birth: coach.date_of_birth.or(slot.date_of_birth),
                nationality: coach.nationality.clone().or_else(|| slot.nationality.clone()),
                contract_start: coach.contract_start.or(slot.contract_start),
                contract_until: coach.contract_until.or(slot.contract_until),
                metadata: coach.metadata.clone().or_else(|| slot.metadata.clone()),
                ..coach.clone()
            };
            return Ok(slot.clone());
        }
        state.coaches.push(coach.clone());
        Ok(coach.clone())
    }

    async fn latest_team_stats(&self, team_id: Uuid) -> Result<Option<TeamStats>> {
        let state = self.state.lock().await;
        Ok(state
            .team_stats
            .iter()
            .filter(|s| s.team_id == team_id)
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn upsert_team_stats(&self, stats: &TeamStats) -> Result<TeamStats> {
        let mut state = self.state.lock().await;
        if let Some(slot) = state.team_stats.iter_mut().find(|s| {
            s.team_id == stats.team_id && s.league_id == stats.league_id && s.season == stats.season
        }) {
            slot.stats_json = stats.stats_json.clone();
            slot.updated_at = stats.updated_at;
            return Ok(slot.clone());
        }
        state.team_stats.push(stats.clone());
        Ok(stats.clone())
    }
}
