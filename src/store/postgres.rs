use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::{FootballStore, TeamFilter};
use crate::error::{IngestError, Result};
use crate::models::{
    Coach, Country, FootballMatch, League, MatchListing, NewMatch, Player, Season, Team, TeamStats,
};

/// `FootballStore` over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect, retrying with exponential backoff.
    pub async fn connect(url: &str, max_retries: u32) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!("Connected to PostgreSQL");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        warn!("Failed to connect to database after {} attempts", max_retries);
                        return Err(IngestError::Database(e));
                    }
                    warn!("Database connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

/// `ILIKE` pattern matching `fragment` anywhere, with wildcards escaped.
fn contains_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl FootballStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Countries
    // ------------------------------------------------------------------------

    async fn country_by_name(&self, name: &str) -> Result<Option<Country>> {
        let country = sqlx::query_as::<_, Country>(
            "SELECT id, name, code, flag FROM countries WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(country)
    }

    async fn insert_country(&self, country: &Country) -> Result<Country> {
        // A concurrent insert may win the unique name; return that row then.
        let inserted = sqlx::query_as::<_, Country>(
            r#"
            INSERT INTO countries (id, name, code, flag)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name, code, flag
            "#,
        )
        .bind(country.id)
        .bind(&country.name)
        .bind(&country.code)
        .bind(&country.flag)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(country) => Ok(country),
            None => self
                .country_by_name(&country.name)
                .await?
                .ok_or_else(|| IngestError::NotFound(format!("country {}", country.name))),
        }
    }

    // ------------------------------------------------------------------------
    // Leagues
    // ------------------------------------------------------------------------

    async fn league_by_id(&self, id: Uuid) -> Result<Option<League>> {
        let league = sqlx::query_as::<_, League>("SELECT * FROM leagues WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(league)
    }

    async fn league_by_api_id(&self, api_league_id: i64) -> Result<Option<League>> {
        let league = sqlx::query_as::<_, League>("SELECT * FROM leagues WHERE api_league_id = $1")
            .bind(api_league_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(league)
    }

    async fn league_by_name(&self, name: &str) -> Result<Option<League>> {
        let league = sqlx::query_as::<_, League>(
            "SELECT * FROM leagues WHERE LOWER(name) = LOWER($1) ORDER BY created_at LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(league)
    }

    async fn league_by_code(&self, code: &str) -> Result<Option<League>> {
        let league = sqlx::query_as::<_, League>(
            "SELECT * FROM leagues WHERE UPPER(metadata->>'code') = UPPER($1) ORDER BY created_at LIMIT 1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(league)
    }

    async fn leagues_matching(&self, fragment: &str) -> Result<Vec<League>> {
        let leagues = sqlx::query_as::<_, League>(
            "SELECT * FROM leagues WHERE name ILIKE $1 ORDER BY name",
        )
        .bind(contains_pattern(fragment))
        .fetch_all(&self.pool)
        .await?;
        Ok(leagues)
    }

    async fn active_leagues(&self) -> Result<Vec<League>> {
        let leagues = sqlx::query_as::<_, League>(
            "SELECT * FROM leagues WHERE active AND api_league_id IS NOT NULL ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(leagues)
    }

    async fn insert_league(&self, league: &League) -> Result<League> {
        let inserted = sqlx::query_as::<_, League>(
            r#"
            INSERT INTO leagues (id, api_league_id, name, "type", logo, active, country_id, current_matchday, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (api_league_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(league.id)
        .bind(league.api_league_id)
        .bind(&league.name)
        .bind(&league.league_type)
        .bind(&league.logo)
        .bind(league.active)
        .bind(league.country_id)
        .bind(league.current_matchday)
        .bind(&league.metadata)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(league) = inserted {
            return Ok(league);
        }
        let api_id = league
            .api_league_id
            .ok_or_else(|| IngestError::NotFound(format!("league {}", league.name)))?;
        self.league_by_api_id(api_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("league with api id {}", api_id)))
    }

    async fn update_league(&self, league: &League) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE leagues SET
                api_league_id = $2,
                name = $3,
                "type" = $4,
                logo = $5,
                active = $6,
                country_id = $7,
                current_matchday = $8,
                metadata = $9,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(league.id)
        .bind(league.api_league_id)
        .bind(&league.name)
        .bind(&league.league_type)
        .bind(&league.logo)
        .bind(league.active)
        .bind(league.country_id)
        .bind(league.current_matchday)
        .bind(&league.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Seasons
    // ------------------------------------------------------------------------

    async fn season_for(&self, league_id: Uuid, year: i32) -> Result<Option<Season>> {
        let season = sqlx::query_as::<_, Season>(
            "SELECT * FROM seasons WHERE league_id = $1 AND year = $2",
        )
        .bind(league_id)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;
        Ok(season)
    }

    async fn insert_season(&self, season: &Season) -> Result<Season> {
        let inserted = sqlx::query_as::<_, Season>(
            r#"
            INSERT INTO seasons (id, league_id, year, name, start_date, end_date, current_matchday, is_current)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (league_id, year) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(season.id)
        .bind(season.league_id)
        .bind(season.year)
        .bind(&season.name)
        .bind(season.start_date)
        .bind(season.end_date)
        .bind(season.current_matchday)
        .bind(season.current)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(season) => Ok(season),
            None => self
                .season_for(season.league_id, season.year)
                .await?
                .ok_or_else(|| IngestError::NotFound(format!("season {}", season.year))),
        }
    }

    async fn update_season(&self, season: &Season) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE seasons SET
                name = $2,
                start_date = $3,
                end_date = $4,
                current_matchday = $5,
                is_current = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(season.id)
        .bind(&season.name)
        .bind(season.start_date)
        .bind(season.end_date)
        .bind(season.current_matchday)
        .bind(season.current)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------------

    async fn team_by_id(&self, id: Uuid) -> Result<Option<Team>> {
        let team = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(team)
    }

    async fn team_by_api_id(&self, api_team_id: i64) -> Result<Option<Team>> {
        let team = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE api_team_id = $1")
            .bind(api_team_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(team)
    }

    async fn team_by_name(&self, name: &str) -> Result<Option<Team>> {
        let team = sqlx::query_as::<_, Team>(
            "SELECT * FROM teams WHERE LOWER(name) = LOWER($1) ORDER BY created_at LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(team)
    }

    async fn find_team(&self, fragment: &str) -> Result<Option<Team>> {
        let team = sqlx::query_as::<_, Team>(
            "SELECT * FROM teams WHERE name ILIKE $1 ORDER BY name LIMIT 1",
        )
        .bind(contains_pattern(fragment))
        .fetch_optional(&self.pool)
        .await?;
        Ok(team)
    }

    async fn teams(&self, filter: &TeamFilter) -> Result<Vec<Team>> {
        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT t.* FROM teams t
            WHERE ($1::uuid IS NULL OR t.id = $1)
              AND ($2::uuid IS NULL OR t.league_id = $2)
              AND (NOT $3 OR t.api_team_id IS NOT NULL)
              AND (NOT $4 OR NOT EXISTS (SELECT 1 FROM team_stats s WHERE s.team_id = t.id))
            ORDER BY t.name
            "#,
        )
        .bind(filter.team_id)
        .bind(filter.league_id)
        .bind(filter.with_api_id)
        .bind(filter.without_stats)
        .fetch_all(&self.pool)
        .await?;
        Ok(teams)
    }

    async fn insert_team(&self, team: &Team) -> Result<Team> {
        let inserted = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (id, api_team_id, name, short_name, tla, logo, country_id, league_id,
                               founded, venue_name, address, website, club_colors, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (api_team_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(team.id)
        .bind(team.api_team_id)
        .bind(&team.name)
        .bind(&team.short_name)
        .bind(&team.tla)
        .bind(&team.logo)
        .bind(team.country_id)
        .bind(team.league_id)
        .bind(team.founded)
        .bind(&team.venue_name)
        .bind(&team.address)
        .bind(&team.website)
        .bind(&team.club_colors)
        .bind(&team.metadata)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(team) = inserted {
            return Ok(team);
        }
        let api_id = team
            .api_team_id
            .ok_or_else(|| IngestError::NotFound(format!("team {}", team.name)))?;
        self.team_by_api_id(api_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("team with api id {}", api_id)))
    }

    async fn update_team(&self, team: &Team) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE teams SET
                api_team_id = $2,
                name = $3,
                short_name = $4,
                tla = $5,
                logo = $6,
                country_id = $7,
                league_id = $8,
                founded = $9,
                venue_name = $10,
                address = $11,
                website = $12,
                club_colors = $13,
                metadata = $14,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(team.id)
        .bind(team.api_team_id)
        .bind(&team.name)
        .bind(&team.short_name)
        .bind(&team.tla)
        .bind(&team.logo)
        .bind(team.country_id)
        .bind(team.league_id)
        .bind(team.founded)
        .bind(&team.venue_name)
        .bind(&team.address)
        .bind(&team.website)
        .bind(&team.club_colors)
        .bind(&team.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Matches
    // ------------------------------------------------------------------------

    async fn match_by_api_id(&self, api_fixture_id: i64) -> Result<Option<FootballMatch>> {
        let found = sqlx::query_as::<_, FootballMatch>(
            "SELECT * FROM football_matches WHERE api_fixture_id = $1",
        )
        .bind(api_fixture_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found)
    }

    async fn upsert_match(&self, new_match: &NewMatch) -> Result<FootballMatch> {
        // Keep in step with NewMatch::merge_into.
        let row = sqlx::query_as::<_, FootballMatch>(
            r#"
            INSERT INTO football_matches (
                id, api_fixture_id, league_id, season_id, home_team_id, away_team_id,
                match_date, status, home_goals, away_goals, home_halftime_goals, away_halftime_goals,
                elapsed, venue, referee, round, stats, events, lineups, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, 'unknown'), $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            ON CONFLICT (api_fixture_id) DO UPDATE SET
                league_id = EXCLUDED.league_id,
                season_id = EXCLUDED.season_id,
                home_team_id = EXCLUDED.home_team_id,
                away_team_id = EXCLUDED.away_team_id,
                match_date = COALESCE(EXCLUDED.match_date, football_matches.match_date),
                status = COALESCE($8, football_matches.status),
                home_goals = COALESCE(EXCLUDED.home_goals, football_matches.home_goals),
                away_goals = COALESCE(EXCLUDED.away_goals, football_matches.away_goals),
                home_halftime_goals = COALESCE(EXCLUDED.home_halftime_goals, football_matches.home_halftime_goals),
                away_halftime_goals = COALESCE(EXCLUDED.away_halftime_goals, football_matches.away_halftime_goals),
                elapsed = COALESCE(EXCLUDED.elapsed, football_matches.elapsed),
                venue = COALESCE(EXCLUDED.venue, football_matches.venue),
                referee = COALESCE(EXCLUDED.referee, football_matches.referee),
                round = COALESCE(EXCLUDED.round, football_matches.round),
                stats = COALESCE(EXCLUDED.stats, football_matches.stats),
                events = COALESCE(EXCLUDED.events, football_matches.events),
                lineups = COALESCE(EXCLUDED.lineups, football_matches.lineups),
                metadata = EXCLUDED.metadata,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_match.api_fixture_id)
        .bind(new_match.league_id)
        .bind(new_match.season_id)
        .bind(new_match.home_team_id)
        .bind(new_match.away_team_id)
        .bind(new_match.match_date)
        .bind(new_match.status.map(|s| s.as_str()))
        .bind(new_match.home_goals)
        .bind(new_match.away_goals)
        .bind(new_match.home_halftime_goals)
        .bind(new_match.away_halftime_goals)
        .bind(new_match.elapsed)
        .bind(&new_match.venue)
        .bind(&new_match.referee)
        .bind(&new_match.round)
        .bind(&new_match.stats)
        .bind(&new_match.events)
        .bind(&new_match.lineups)
        .bind(&new_match.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn match_listings(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<MatchListing>> {
        let listings = sqlx::query_as::<_, MatchListing>(
            r#"
            SELECT m.id, m.api_fixture_id, m.match_date, m.status,
                   m.home_goals, m.away_goals, m.elapsed, m.venue,
                   l.id AS league_id, l.name AS league_name, l.logo AS league_logo,
                   c.name AS country_name,
                   ht.name AS home_team_name, ht.logo AS home_team_logo,
                   aw.name AS away_team_name, aw.logo AS away_team_logo
            FROM football_matches m
            JOIN leagues l ON l.id = m.league_id
            LEFT JOIN countries c ON c.id = l.country_id
            JOIN teams ht ON ht.id = m.home_team_id
            JOIN teams aw ON aw.id = m.away_team_id
            WHERE m.match_date >= $1 AND m.match_date < $2
            ORDER BY m.match_date, l.name
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(listings)
    }

    // ------------------------------------------------------------------------
    // Squads
    // ------------------------------------------------------------------------

    async fn upsert_player(&self, player: &Player) -> Result<Player> {
        let row = sqlx::query_as::<_, Player>(
            r#"
            INSERT INTO players (id, team_id, api_player_id, name, first_name, last_name, position,
                                 date_of_birth, nationality, shirt_number, market_value,
                                 contract_start, contract_until, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (team_id, api_player_id) DO UPDATE SET
                name = EXCLUDED.name,
                first_name = COALESCE(EXCLUDED.first_name, players.first_name),
                last_name = COALESCE(EXCLUDED.last_name, players.last_name),
                position = COALESCE(EXCLUDED.position, players.position),
                date_of_birth = COALESCE(EXCLUDED.date_of_birth, players.date_of_birth),
                nationality = COALESCE(EXCLUDED.nationality, players.nationality),
                shirt_number = COALESCE(EXCLUDED.shirt_number, players.shirt_number),
                market_value = COALESCE(EXCLUDED.market_value, players.market_value),
                contract_start = COALESCE(EXCLUDED.contract_start, players.contract_start),
                contract_until = COALESCE(EXCLUDED.contract_until, players.contract_until),
                metadata = COALESCE(EXCLUDED.metadata, players.metadata),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(player.id)
        .bind(player.team_id)
        .bind(player.api_player_id)
        .bind(&player.name)
        .bind(&player.first_name)
        .bind(&player.last_name)
        .bind(&player.position)
        .bind(player.date_of_birth)
        .bind(&player.nationality)
        .bind(player.shirt_number)
        .bind(player.market_value)
        .bind(player.contract_start)
        .bind(player.contract_until)
        .bind(&player.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_coach(&self, coach: &Coach) -> Result<Coach> {
        let row = sqlx::query_as::<_, Coach>(
            r#"
            INSERT INTO coaches (id, team_id, api_coach_id, name, first_name, last_name,
                                 date_of_birth, nationality, contract_start, contract_until, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (team_id, api_coach_id) DO UPDATE SET
                name = EXCLUDED.name,
                first_name = COALESCE(EXCLUDED.first_name, coaches.first_name),
                last_name = COALESCE(EXCLUDED.last_name, coaches.last_name),
                date_of_birth = COALESCE(EXCLUDED.date_of_birth, coaches.date_of_birth),
                nationality = COALESCE(EXCLUDED.nationality, coaches.nationality),
                contract_start = COALESCE(EXCLUDED.contract_start, coaches.contract_start),
                contract_until = COALESCE(EXCLUDED.contract_until, coaches.contract_until),
                metadata = COALESCE(EXCLUDED.metadata, coaches.metadata),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(coach.id)
        .bind(coach.team_id)
        .bind(coach.api_coach_id)
        .bind(&coach.name)
        .bind(&coach.first_name)
        .bind(&coach.last_name)
        .bind(coach.date_of_birth)
        .bind(&coach.nationality)
        .bind(coach.contract_start)
        .bind(coach.contract_until)
        .bind(&coach.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // ------------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------------

    async fn latest_team_stats(&self, team_id: Uuid) -> Result<Option<TeamStats>> {
        let stats = sqlx::query_as::<_, TeamStats>(
            r#"
            SELECT id, team_id, league_id, season, stats_json, updated_at
            FROM team_stats
            WHERE team_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn upsert_team_stats(&self, stats: &TeamStats) -> Result<TeamStats> {
        let row = sqlx::query_as::<_, TeamStats>(
            r#"
            INSERT INTO team_stats (id, team_id, league_id, season, stats_json, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (team_id, league_id, season) DO UPDATE SET
                stats_json = EXCLUDED.stats_json,
                updated_at = EXCLUDED.updated_at
            RETURNING id, team_id, league_id, season, stats_json, updated_at
            "#,
        )
        .bind(stats.id)
        .bind(stats.team_id)
        .bind(stats.league_id)
        .bind(stats.season)
        .bind(&stats.stats_json)
        .bind(stats.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
