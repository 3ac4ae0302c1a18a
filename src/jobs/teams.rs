//! Teams of a competition and detailed team updates from football-data.org.

use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::batch::{BatchReport, BatchRunner};
use crate::error::{IngestError, Result};
use crate::models::{League, Team};
use crate::normalize::{LeagueRef, PersonRef, SeasonRef, TeamRef};
use crate::reconcile::Reconciler;
use crate::store::FootballStore;
use crate::upstream::football_data::{FdPerson, FdTeam, FdTeamsPage};
use crate::upstream::FootballDataClient;

/// Import a detailed team payload (`teams/{id}` or an entry of
/// `competitions/{id}/teams`) with its squad and coach.
pub async fn apply_team_details<S: FootballStore + ?Sized>(
    store: &S,
    raw: &Value,
    league: Option<&League>,
) -> Result<Team> {
    let detail: FdTeam = serde_json::from_value(raw.clone())?;
    if detail.id.is_none() {
        return Err(IngestError::invalid("team payload without id"));
    }

    let reconciler = Reconciler::new(store);
    let team = reconciler
        .import_team(&TeamRef::from_fd_team(&detail, Some(raw.clone())), league)
        .await?;

    if let Some(Value::Array(entries)) = raw.get("squad") {
        let squad: Vec<PersonRef> = entries
            .iter()
            .filter_map(|entry| match serde_json::from_value::<FdPerson>(entry.clone()) {
                Ok(person) => Some(PersonRef::from_fd_person(&person, Some(entry.clone()))),
                Err(e) => {
                    warn!("Unreadable squad entry of {}: {}", team.name, e);
                    None
                }
            })
            .collect();
        let report = reconciler.store_squad(&team, &squad).await;
        info!(
            "Squad of {}: {} saved, {} skipped, {} failed",
            team.name, report.saved, report.skipped, report.failed
        );
    }

    if let Some(coach) = &detail.coach {
        let coach_ref = PersonRef::from_fd_person(coach, raw.get("coach").cloned());
        reconciler.store_coach(&team, &coach_ref).await?;
    }

    Ok(team)
}

/// Import one `competitions/{id}/teams` page.
pub async fn import_team_page<S: FootballStore + ?Sized>(
    store: &S,
    page: FdTeamsPage,
    season_year: Option<i32>,
) -> Result<BatchReport> {
    let competition = page
        .competition
        .as_ref()
        .ok_or_else(|| IngestError::invalid("teams page without competition"))?;

    let reconciler = Reconciler::new(store);
    let mut league_ref = LeagueRef::from_fd_competition(competition, None);
    if league_ref.current_matchday.is_none() {
        league_ref.current_matchday = page.season.as_ref().and_then(|s| s.current_matchday);
    }
    let league = reconciler.resolve_league(&league_ref).await?;

    if let Some(season) = SeasonRef::from_fd_season(page.season.as_ref(), season_year) {
        reconciler.resolve_season(&league, &season).await?;
    }

    let league = &league;
    let report = BatchRunner::new(format!("teams of {}", league.name), Duration::ZERO)
        .run(
            page.teams,
            |raw| {
                raw.get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("team without name")
                    .to_string()
            },
            |raw| async move { apply_team_details(store, &raw, Some(league)).await },
        )
        .await
        .report;
    Ok(report)
}

/// `fetch-teams`: all teams of one competition.
pub async fn fetch_teams<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    api_league_id: &str,
    season_year: Option<i32>,
) -> Result<BatchReport> {
    let page = client
        .competition_teams(api_league_id, season_year)
        .await
        .ok_or_else(|| {
            IngestError::no_data(
                FootballDataClient::PROVIDER.as_str(),
                format!("teams of competition {}", api_league_id),
            )
        })?;
    import_team_page(store, page, season_year).await
}

/// Refresh one stored team from `teams/{api id}`.
pub async fn update_team<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    team: &Team,
) -> Result<Team> {
    let api_id = team
        .api_team_id
        .ok_or_else(|| IngestError::invalid(format!("team {} has no upstream id", team.name)))?;
    let raw = client.team(api_id).await.ok_or_else(|| {
        IngestError::no_data(FootballDataClient::PROVIDER.as_str(), format!("team {}", api_id))
    })?;
    apply_team_details(store, &raw, None).await
}

/// Refresh several teams, pausing between them.
pub async fn update_teams<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    teams: Vec<Team>,
    delay: Duration,
) -> BatchReport {
    BatchRunner::new("update-teams", delay)
        .run(
            teams,
            |team| format!("{} (api id {:?})", team.name, team.api_team_id),
            |team| async move { update_team(store, client, &team).await },
        )
        .await
        .report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn arsenal() -> Value {
        json!({
            "id": 57,
            "name": "Arsenal FC",
            "shortName": "Arsenal",
            "tla": "ARS",
            "crest": "https://crests/57.png",
            "founded": 1886,
            "venue": "Emirates Stadium",
            "area": { "name": "England" },
            "runningCompetitions": [{ "id": 2021, "name": "Premier League" }],
            "coach": { "id": 99, "name": "Mikel Arteta", "nationality": "Spain", "contract": { "start": "2019-12", "until": "2027-06" } },
            "squad": [
                { "id": 1, "name": "Bukayo Saka", "position": "Right Winger", "dateOfBirth": "2001-09-05", "shirtNumber": 7 },
                { "id": 2, "name": "Declan Rice", "position": "Defensive Midfield" },
                { "name": "No Id" },
                "garbage"
            ]
        })
    }

    #[tokio::test]
    async fn team_details_store_squad_and_coach() {
        let store = MemoryStore::new();
        let team = apply_team_details(&store, &arsenal(), None).await.unwrap();

        assert_eq!(team.name, "Arsenal FC");
        assert_eq!(team.founded, Some(1886));
        assert_eq!(team.venue_name.as_deref(), Some("Emirates Stadium"));

        let (players, coaches) = store.snapshot(|s| (s.players.clone(), s.coaches.clone())).await;
        assert_eq!(players.len(), 2);
        assert_eq!(coaches.len(), 1);
        assert_eq!(coaches[0].name, "Mikel Arteta");
        let saka = players.iter().find(|p| p.api_player_id == 1).unwrap();
        assert_eq!(saka.shirt_number, Some(7));

        // Running it again updates rather than duplicates.
        apply_team_details(&store, &arsenal(), None).await.unwrap();
        let counts = store
            .snapshot(|s| (s.teams.len(), s.players.len(), s.coaches.len()))
            .await;
        assert_eq!(counts, (1, 2, 1));
    }

    #[tokio::test]
    async fn team_page_replaces_placeholder_league_name() {
        let store = MemoryStore::new();
        Reconciler::new(&store)
            .resolve_league(&LeagueRef {
                api_id: Some(2021),
                ..Default::default()
            })
            .await
            .unwrap();

        let page: FdTeamsPage = serde_json::from_value(json!({
            "competition": { "id": 2021, "name": "Premier League", "code": "PL" },
            "season": { "startDate": "2024-08-16", "endDate": "2025-05-25", "currentMatchday": 12 },
            "teams": [arsenal(), { "name": "Missing Id FC" }]
        }))
        .unwrap();

        let report = import_team_page(&store, page, Some(2024)).await.unwrap();
        assert_eq!((report.succeeded, report.failed), (1, 1));

        let league = store.league_by_api_id(2021).await.unwrap().unwrap();
        assert_eq!(league.name, "Premier League");
        assert_eq!(league.current_matchday, Some(12));

        let team = store.team_by_api_id(57).await.unwrap().unwrap();
        assert_eq!(team.league_id, Some(league.id));
        assert!(store.season_for(league.id, 2024).await.unwrap().is_some());
    }
}
