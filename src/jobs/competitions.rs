//! Competition fixtures from football-data.org.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::{BatchReport, BatchRunner};
use crate::error::{IngestError, Result};
use crate::models::League;
use crate::normalize::CanonicalFixture;
use crate::store::FootballStore;
use crate::upsert::FixtureImporter;
use crate::upstream::football_data::FdMatchesPage;
use crate::upstream::FootballDataClient;

/// A competition to fetch: a stored league, or an upstream id not seen yet.
#[derive(Debug, Clone, PartialEq)]
pub enum CompetitionTarget {
    Known(League),
    ApiId(i64),
}

impl CompetitionTarget {
    pub fn api_id(&self) -> Option<i64> {
        match self {
            CompetitionTarget::Known(league) => league.api_league_id,
            CompetitionTarget::ApiId(id) => Some(*id),
        }
    }

    pub fn league(&self) -> Option<&League> {
        match self {
            CompetitionTarget::Known(league) => Some(league),
            CompetitionTarget::ApiId(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CompetitionTarget::Known(league) => {
                format!("{} (api id {:?})", league.name, league.api_league_id)
            }
            CompetitionTarget::ApiId(id) => format!("competition {}", id),
        }
    }
}

/// Turn the command-line selection into fetch targets.
pub async fn resolve_targets<S: FootballStore + ?Sized>(
    store: &S,
    league_id: Option<Uuid>,
    api_league_id: Option<i64>,
    all_active: bool,
) -> Result<Vec<CompetitionTarget>> {
    if let Some(id) = league_id {
        let league = store
            .league_by_id(id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("league {}", id)))?;
        if league.api_league_id.is_none() {
            return Err(IngestError::invalid(format!(
                "league {} has no upstream id",
                league.name
            )));
        }
        return Ok(vec![CompetitionTarget::Known(league)]);
    }

    if let Some(api_id) = api_league_id {
        return Ok(match store.league_by_api_id(api_id).await? {
            Some(league) => vec![CompetitionTarget::Known(league)],
            None => {
                info!("Competition {} is not stored yet; it will be created from its fixtures", api_id);
                vec![CompetitionTarget::ApiId(api_id)]
            }
        });
    }

    if all_active {
        let leagues = store.active_leagues().await?;
        info!("{} active leagues selected", leagues.len());
        return Ok(leagues.into_iter().map(CompetitionTarget::Known).collect());
    }

    Err(IngestError::Config(
        "one of --league-id, --api-league-id or --all-active is required".to_string(),
    ))
}

fn describe(raw: &Value) -> String {
    match raw.get("id") {
        Some(id) => format!("match {}", id),
        None => "match without id".to_string(),
    }
}

/// Import one page of football-data matches, one batch item per match.
pub async fn import_competition_page<S: FootballStore + ?Sized>(
    store: &S,
    label: &str,
    page: FdMatchesPage,
    known_league: Option<&League>,
    now: DateTime<Utc>,
) -> BatchReport {
    let hint = page.competition;
    let hint = hint.as_ref();
    let importer = FixtureImporter::new(store);
    let importer = &importer;

    BatchRunner::new(label, Duration::ZERO)
        .run(page.matches, describe, |raw| async move {
            let fixture = CanonicalFixture::from_football_data(&raw, hint, now)?;
            importer.import(&fixture, known_league).await
        })
        .await
        .report
}

/// Fetch and import the fixtures of one competition.
pub async fn fetch_competition_matches_for<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    target: &CompetitionTarget,
    season: Option<i32>,
) -> Result<BatchReport> {
    let api_id = target
        .api_id()
        .ok_or_else(|| IngestError::invalid(format!("{} has no upstream id", target.describe())))?;

    let page = client
        .competition_matches(&api_id.to_string(), season, None, None)
        .await
        .ok_or_else(|| {
            IngestError::no_data(
                FootballDataClient::PROVIDER.as_str(),
                format!("matches of competition {}", api_id),
            )
        })?;
    if page.matches.is_empty() {
        warn!("Competition {} returned no matches", api_id);
    }

    let label = format!("competition {}", api_id);
    Ok(import_competition_page(store, &label, page, target.league(), Utc::now()).await)
}

/// Fetch several competitions, pausing between them.
pub async fn fetch_competition_matches<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    targets: Vec<CompetitionTarget>,
    season: Option<i32>,
    delay: Duration,
) -> BatchReport {
    BatchRunner::new("fetch-competition-matches", delay)
        .run(targets, CompetitionTarget::describe, |target| async move {
            fetch_competition_matches_for(store, client, &target, season).await
        })
        .await
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{LeagueRef, MatchStatus};
    use crate::reconcile::Reconciler;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn page(matchday: i32, status: &str, home_goals: Value) -> FdMatchesPage {
        serde_json::from_value(json!({
            "competition": { "id": 2021, "name": "Premier League", "code": "PL", "type": "LEAGUE" },
            "matches": [
                {
                    "id": 12345,
                    "utcDate": "2024-05-19T15:00:00Z",
                    "status": status,
                    "matchday": 38,
                    "competition": { "id": 2021, "name": "Premier League" },
                    "season": { "startDate": "2023-08-11", "endDate": "2024-05-19", "currentMatchday": matchday },
                    "homeTeam": { "id": 57, "name": "Arsenal FC" },
                    "awayTeam": { "id": 62, "name": "Everton FC" },
                    "score": { "fullTime": { "home": home_goals, "away": 1 } }
                },
                {
                    "id": 12346,
                    "utcDate": "2024-05-19T15:00:00Z",
                    "status": "TIMED",
                    "season": { "startDate": "2023-08-11", "currentMatchday": matchday },
                    "homeTeam": { "id": 61, "name": "Chelsea FC" },
                    "awayTeam": { "id": 66, "name": "Manchester United FC" },
                    "score": { "fullTime": { "home": null, "away": null } }
                }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn page_import_is_idempotent_and_patches_matchday() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let first = import_competition_page(&store, "PL", page(37, "FINISHED", json!(2)), None, now).await;
        assert_eq!((first.succeeded, first.failed), (2, 0));

        let second = import_competition_page(&store, "PL", page(38, "POSTPONED", json!(null)), None, now).await;
        assert_eq!((second.succeeded, second.failed), (2, 0));

        let (matches, leagues, seasons, teams) = store
            .snapshot(|s| (s.matches.len(), s.leagues.len(), s.seasons.len(), s.teams.len()))
            .await;
        assert_eq!((matches, leagues, seasons, teams), (2, 1, 1, 4));

        let league = store.league_by_api_id(2021).await.unwrap().unwrap();
        assert_eq!(league.current_matchday, Some(38));
        assert_eq!(league.name, "Premier League");

        let row = store.match_by_api_id(12345).await.unwrap().unwrap();
        assert_eq!(row.match_status(), MatchStatus::Postponed);
        assert_eq!(row.home_goals, Some(2));

        // The match without a competition block used the page competition.
        let other = store.match_by_api_id(12346).await.unwrap().unwrap();
        assert_eq!(other.league_id, league.id);
    }

    #[tokio::test]
    async fn targets_from_selection() {
        let store = MemoryStore::new();
        let league = Reconciler::new(&store)
            .resolve_league(&LeagueRef {
                api_id: Some(2021),
                name: Some("Premier League".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let by_id = resolve_targets(&store, Some(league.id), None, false).await.unwrap();
        assert_eq!(by_id, vec![CompetitionTarget::Known(league.clone())]);

        let unknown = resolve_targets(&store, None, Some(2014), false).await.unwrap();
        assert_eq!(unknown, vec![CompetitionTarget::ApiId(2014)]);

        let active = resolve_targets(&store, None, None, true).await.unwrap();
        assert_eq!(active.len(), 1);

        assert!(matches!(
            resolve_targets(&store, Some(Uuid::new_v4()), None, false).await,
            Err(IngestError::NotFound(_))
        ));
        assert!(matches!(
            resolve_targets(&store, None, None, false).await,
            Err(IngestError::Config(_))
        ));
    }
}
