//! Entity reconciliation: find-or-create for the catalogue entities a
//! fixture references.
//!
//! Lookup is by upstream id first and exact name second. Resolving an
//! existing entity never erases stored data; only the fields listed on each
//! method are patched.

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::models::{placeholder_league_name, Coach, Country, League, Player, Season, Team};
use crate::normalize::{CountryRef, LeagueRef, PersonRef, SeasonRef, TeamRef};
use crate::store::FootballStore;

const DEFAULT_LEAGUE_TYPE: &str = "LEAGUE";

/// Outcome of storing a squad.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SquadReport {
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Reconciler<'a, S: FootballStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: FootballStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn resolve_country(&self, country: &CountryRef) -> Result<Country> {
        if let Some(existing) = self.store.country_by_name(&country.name).await? {
            return Ok(existing);
        }
        info!("Creating country {}", country.name);
        self.store
            .insert_country(&Country {
                id: Uuid::new_v4(),
                name: country.name.clone(),
                code: country.code.clone(),
                flag: country.flag.clone(),
            })
            .await
    }

    async fn country_id(&self, country: Option<&CountryRef>) -> Result<Option<Uuid>> {
        match country {
            Some(c) => Ok(Some(self.resolve_country(c).await?.id)),
            None => Ok(None),
        }
    }

    async fn find_league(&self, league: &LeagueRef) -> Result<Option<League>> {
        match (league.api_id, league.name.as_deref()) {
            (Some(api_id), _) => self.store.league_by_api_id(api_id).await,
            (None, Some(name)) => self.store.league_by_name(name).await,
            (None, None) => Err(IngestError::invalid("league has neither id nor name")),
        }
    }

    async fn create_league(&self, league: &LeagueRef) -> Result<League> {
        let name = match (&league.name, league.api_id) {
            (Some(name), _) => name.clone(),
            (None, Some(api_id)) => placeholder_league_name(api_id),
            (None, None) => return Err(IngestError::invalid("league has neither id nor name")),
        };
        let country_id = self.country_id(league.country.as_ref()).await?;

        info!("Creating league {} (api id {:?})", name, league.api_id);
        self.store
            .insert_league(&League {
                id: Uuid::new_v4(),
                api_league_id: league.api_id,
                name,
                league_type: league
                    .league_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LEAGUE_TYPE.to_string()),
                logo: league.logo.clone(),
                active: true,
                country_id,
                current_matchday: league.current_matchday,
                metadata: league.raw.clone(),
            })
            .await
    }

    /// Find or create the league a fixture belongs to.
    ///
    /// On an existing league only the current matchday is kept up to date; a
    /// placeholder name is replaced and a missing logo or country filled in.
    pub async fn resolve_league(&self, league: &LeagueRef) -> Result<League> {
        let Some(mut existing) = self.find_league(league).await? else {
            return self.create_league(league).await;
        };

        let mut changed = false;
        if let Some(matchday) = league.current_matchday {
            if existing.current_matchday != Some(matchday) {
                info!(
                    "League {} current matchday {:?} -> {}",
                    existing.name, existing.current_matchday, matchday
                );
                existing.current_matchday = Some(matchday);
                changed = true;
            }
        }
        if let Some(name) = &league.name {
            if existing.has_placeholder_name() {
                info!("League {} renamed to {}", existing.name, name);
                existing.name = name.clone();
                changed = true;
            }
        }
        if existing.logo.is_none() && league.logo.is_some() {
            existing.logo = league.logo.clone();
            changed = true;
        }
        if existing.country_id.is_none() && league.country.is_some() {
            existing.country_id = self.country_id(league.country.as_ref()).await?;
            changed = true;
        }
        if existing.metadata.is_none() && league.raw.is_some() {
            existing.metadata = league.raw.clone();
            changed = true;
        }

        if changed {
            self.store.update_league(&existing).await?;
        }
        Ok(existing)
    }

    /// Catalogue import: supplied fields overwrite, absent ones are kept.
    pub async fn import_league(&self, league: &LeagueRef) -> Result<League> {
        let Some(mut existing) = self.find_league(league).await? else {
            return self.create_league(league).await;
        };

        if let Some(name) = &league.name {
            existing.name = name.clone();
        }
        if let Some(league_type) = &league.league_type {
            existing.league_type = league_type.clone();
        }
        if league.logo.is_some() {
            existing.logo = league.logo.clone();
        }
        if league.country.is_some() {
            existing.country_id = self.country_id(league.country.as_ref()).await?;
        }
        if league.current_matchday.is_some() {
            existing.current_matchday = league.current_matchday;
        }
        if league.raw.is_some() {
            existing.metadata = league.raw.clone();
        }
        if existing.api_league_id.is_none() {
            existing.api_league_id = league.api_id;
        }

        self.store.update_league(&existing).await?;
        Ok(existing)
    }

    /// Find or create the (league, year) season, keeping its matchday and
    /// current flag up to date.
    pub async fn resolve_season(&self, league: &League, season: &SeasonRef) -> Result<Season> {
        let Some(mut existing) = self.store.season_for(league.id, season.year).await? else {
            info!("Creating season {} for {}", season.year, league.name);
            return self
                .store
                .insert_season(&Season {
                    id: Uuid::new_v4(),
                    league_id: league.id,
                    year: season.year,
                    name: season.name.clone(),
                    start_date: season.start_date,
                    end_date: season.end_date,
                    current_matchday: season.current_matchday,
                    current: season.current.unwrap_or(false),
                })
                .await;
        };

        let mut changed = false;
        if season.current_matchday.is_some() && existing.current_matchday != season.current_matchday {
            existing.current_matchday = season.current_matchday;
            changed = true;
        }
        if let Some(current) = season.current {
            if existing.current != current {
                existing.current = current;
                changed = true;
            }
        }
        if existing.start_date.is_none() && season.start_date.is_some() {
            existing.start_date = season.start_date;
            changed = true;
        }
        if existing.end_date.is_none() && season.end_date.is_some() {
            existing.end_date = season.end_date;
            changed = true;
        }

        if changed {
            self.store.update_season(&existing).await?;
        }
        Ok(existing)
    }

    async fn find_team(&self, team: &TeamRef) -> Result<Option<Team>> {
        match (team.api_id, team.name.as_deref()) {
            (Some(api_id), _) => self.store.team_by_api_id(api_id).await,
            (None, Some(name)) => self.store.team_by_name(name).await,
            (None, None) => Err(IngestError::invalid("team has neither id nor name")),
        }
    }

    async fn create_team(&self, team: &TeamRef, league: Option<&League>) -> Result<Team> {
        let name = match (&team.name, team.api_id) {
            (Some(name), _) => name.clone(),
            (None, Some(api_id)) => format!("Team {}", api_id),
            (None, None) => return Err(IngestError::invalid("team has neither id nor name")),
        };
        let country_id = match team.country.as_ref() {
            Some(c) => Some(self.resolve_country(c).await?.id),
            None => league.and_then(|l| l.country_id),
        };

        info!("Creating team {} (api id {:?})", name, team.api_id);
        self.store
            .insert_team(&Team {
                id: Uuid::new_v4(),
                api_team_id: team.api_id,
                name,
                short_name: team.short_name.clone(),
                tla: team.tla.clone(),
                logo: team.logo.clone(),
                country_id,
                league_id: league.map(|l| l.id),
                founded: team.founded,
                venue_name: team.venue_name.clone(),
                address: team.address.clone(),
                website: team.website.clone(),
                club_colors: team.club_colors.clone(),
                metadata: team.raw.clone(),
            })
            .await
    }

    /// Find or create a team referenced by a fixture.
    ///
    /// A team stays bound to the league it was first discovered in; the
    /// league is only set when the stored team has none.
    pub async fn resolve_team(&self, team: &TeamRef, league: Option<&League>) -> Result<Team> {
        let Some(mut existing) = self.find_team(team).await? else {
            return self.create_team(team, league).await;
        };

        let mut changed = false;
        if existing.league_id.is_none() {
            if let Some(league) = league {
                existing.league_id = Some(league.id);
                changed = true;
            }
        }
        if existing.logo.is_none() && team.logo.is_some() {
            existing.logo = team.logo.clone();
            changed = true;
        }

        if changed {
            self.store.update_team(&existing).await?;
        }
        Ok(existing)
    }

    /// Detailed team import: supplied fields overwrite, absent ones are kept.
    pub async fn import_team(&self, team: &TeamRef, league: Option<&League>) -> Result<Team> {
        let Some(mut existing) = self.find_team(team).await? else {
            return self.create_team(team, league).await;
        };

        fn overwrite<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *slot = value.clone();
            }
        }

        if let Some(name) = &team.name {
            existing.name = name.clone();
        }
        overwrite(&mut existing.short_name, &team.short_name);
        overwrite(&mut existing.tla, &team.tla);
        overwrite(&mut existing.logo, &team.logo);
        overwrite(&mut existing.founded, &team.founded);
        overwrite(&mut existing.venue_name, &team.venue_name);
        overwrite(&mut existing.address, &team.address);
        overwrite(&mut existing.website, &team.website);
        overwrite(&mut existing.club_colors, &team.club_colors);
        overwrite(&mut existing.metadata, &team.raw);
        if let Some(country) = &team.country {
            existing.country_id = Some(self.resolve_country(country).await?.id);
        }
        if existing.league_id.is_none() {
            existing.league_id = league.map(|l| l.id);
        }
        if existing.api_team_id.is_none() {
            existing.api_team_id = team.api_id;
        }

        self.store.update_team(&existing).await?;
        Ok(existing)
    }

    /// Upsert a team's squad. Each player stands alone: one that cannot be
    /// stored is logged and counted.
    pub async fn store_squad(&self, team: &Team, squad: &[PersonRef]) -> SquadReport {
        let mut report = SquadReport::default();
        for person in squad {
            let (Some(api_id), Some(name)) = (person.api_id, person.name.as_ref()) else {
                warn!("Skipping squad entry of {} without id or name", team.name);
                report.skipped += 1;
                continue;
            };
            let player = Player {
                id: Uuid::new_v4(),
                team_id: team.id,
                api_player_id: api_id,
                name: name.clone(),
                first_name: person.first_name.clone(),
                last_name: person.last_name.clone(),
                position: person.position.clone(),
                date_of_birth: person.date_of_birth,
                nationality: person.nationality.clone(),
                shirt_number: person.shirt_number,
                market_value: person.market_value,
                contract_start: person.contract_start,
                contract_until: person.contract_until,
                metadata: person.raw.clone(),
            };
            match self.store.upsert_player(&player).await {
                Ok(_) => report.saved += 1,
                Err(e) => {
                    warn!("Failed to store player {} of {}: {}", name, team.name, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Upsert a team's coach. `None` when the entry has no id or name.
    pub async fn store_coach(&self, team: &Team, coach: &PersonRef) -> Result<Option<Coach>> {
        let (Some(api_id), Some(name)) = (coach.api_id, coach.name.as_ref()) else {
            warn!("Skipping coach of {} without id or name", team.name);
            return Ok(None);
        };
        let stored = self
            .store
            .upsert_coach(&Coach {
                id: Uuid::new_v4(),
                team_id: team.id,
                api_coach_id: api_id,
                name: name.clone(),
                first_name: coach.first_name.clone(),
                last_name: coach.last_name.clone(),
                date_of_birth: coach.date_of_birth,
                nationality: coach.nationality.clone(),
                contract_start: coach.contract_start,
                contract_until: coach.contract_until,
                metadata: coach.raw.clone(),
            })
            .await?;
        Ok(Some(stored))
    }
}
