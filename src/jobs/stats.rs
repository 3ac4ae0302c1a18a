//! Team stats snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::{BatchReport, BatchRunner};
use crate::error::{IngestError, Result};
use crate::models::{League, Team, TeamStats};
use crate::stats::TeamStatsSnapshot;
use crate::store::{FootballStore, TeamFilter};
use crate::upstream::FootballDataClient;

/// Which teams `sync-stats` walks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSelection {
    pub team_id: Option<Uuid>,
    pub league_id: Option<Uuid>,
    /// Fragment of a league name.
    pub competition: Option<String>,
    /// Rebuild snapshots that already exist.
    pub force: bool,
}

pub async fn select_teams<S: FootballStore + ?Sized>(
    store: &S,
    selection: &StatsSelection,
) -> Result<Vec<Team>> {
    // An explicitly named team is always refreshed.
    let without_stats = !selection.force && selection.team_id.is_none();

    if let Some(fragment) = &selection.competition {
        let leagues = store.leagues_matching(fragment).await?;
        if leagues.is_empty() {
            return Err(IngestError::NotFound(format!("league matching '{}'", fragment)));
        }
        let mut teams = Vec::new();
        for league in leagues {
            info!("Selecting teams of {}", league.name);
            teams.extend(
                store
                    .teams(&TeamFilter {
                        league_id: Some(league.id),
                        with_api_id: true,
                        without_stats,
                        ..Default::default()
                    })
                    .await?,
            );
        }
        return Ok(teams);
    }

    let teams = store
        .teams(&TeamFilter {
            team_id: selection.team_id,
            league_id: selection.league_id,
            with_api_id: true,
            without_stats,
        })
        .await?;
    if let (Some(id), true) = (selection.team_id, teams.is_empty()) {
        return Err(IngestError::NotFound(format!("team {} with an upstream id", id)));
    }
    Ok(teams)
}

/// League a snapshot is filed under: the competition the season stats came
/// from, else the team's own league, else a league named like the
/// competition.
pub async fn resolve_stats_league<S: FootballStore + ?Sized>(
    store: &S,
    team: &Team,
    snapshot: &TeamStatsSnapshot,
) -> Result<League> {
    if let Some(api_id) = snapshot.current_season.league_id {
        if let Some(league) = store.league_by_api_id(api_id).await? {
            return Ok(league);
        }
        warn!("Competition {} of {} is not stored", api_id, team.name);
    }

    if let Some(league_id) = team.league_id {
        if let Some(league) = store.league_by_id(league_id).await? {
            return Ok(league);
        }
    }

    if let Some(name) = &snapshot.current_season.league_name {
        if let Some(league) = store.league_by_name(name).await? {
            return Ok(league);
        }
    }

    Err(IngestError::NotFound(format!(
        "no stored league for the stats of {} (competition {:?} / {:?})",
        team.name, snapshot.current_season.league_id, snapshot.current_season.league_name
    )))
}

/// Upsert the snapshot as the (team, league, season) stats row.
pub async fn store_snapshot<S: FootballStore + ?Sized>(
    store: &S,
    team: &Team,
    snapshot: &TeamStatsSnapshot,
) -> Result<TeamStats> {
    let league = resolve_stats_league(store, team, snapshot).await?;
    let stats = TeamStats {
        id: Uuid::new_v4(),
        team_id: team.id,
        league_id: league.id,
        season: snapshot.current_season.year,
        stats_json: serde_json::to_value(snapshot)?,
        updated_at: snapshot.generated_at.unwrap_or_else(Utc::now),
    };
    let stored = store.upsert_team_stats(&stats).await?;
    info!(
        "Stored stats of {} for {} {}",
        team.name, league.name, stored.season
    );
    Ok(stored)
}

pub async fn sync_team<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    team: &Team,
    now: DateTime<Utc>,
) -> Result<TeamStats> {
    let api_id = team
        .api_team_id
        .ok_or_else(|| IngestError::invalid(format!("team {} has no upstream id", team.name)))?;
    let snapshot = TeamStatsSnapshot::fetch(client, api_id, now)
        .await
        .ok_or_else(|| {
            IngestError::no_data(FootballDataClient::PROVIDER.as_str(), format!("team {}", api_id))
        })?;
    store_snapshot(store, team, &snapshot).await
}

/// Build and store snapshots for several teams, pausing between them.
pub async fn sync_team_stats<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    teams: Vec<Team>,
    delay: Duration,
) -> BatchReport {
    BatchRunner::new("sync-stats", delay)
        .run(
            teams,
            |team| format!("{} (api id {:?})", team.name, team.api_team_id),
            |team| async move { sync_team(store, client, &team, Utc::now()).await },
        )
        .await
        .report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{LeagueRef, TeamRef};
    use crate::reconcile::Reconciler;
    use crate::stats::CurrentSeasonStats;
    use crate::store::memory::MemoryStore;

    async fn seed(store: &MemoryStore) -> (League, League, Team) {
        let reconciler = Reconciler::new(store);
        let pl = reconciler
            .resolve_league(&LeagueRef {
                api_id: Some(2021),
                name: Some("Premier League".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let cl = reconciler
            .resolve_league(&LeagueRef {
                api_id: Some(2001),
                name: Some("UEFA Champions League".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let team = reconciler
            .resolve_team(
                &TeamRef {
                    api_id: Some(57),
                    name: Some("Arsenal FC".to_string()),
                    ..Default::default()
                },
                Some(&pl),
            )
            .await
            .unwrap();
        (pl, cl, team)
    }

    fn snapshot(league_id: Option<i64>, league_name: Option<&str>) -> TeamStatsSnapshot {
        TeamStatsSnapshot {
            current_season: CurrentSeasonStats {
                year: 2024,
                league_id,
                league_name: league_name.map(str::to_string),
                stats: None,
            },
            generated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn league_resolution_order() {
        let store = MemoryStore::new();
        let (pl, cl, team) = seed(&store).await;

        // Payload competition wins over the team's league.
        let league = resolve_stats_league(&store, &team, &snapshot(Some(2001), None)).await.unwrap();
        assert_eq!(league.id, cl.id);

        // Unknown competition falls back to the team's league.
        let league = resolve_stats_league(&store, &team, &snapshot(Some(9999), None)).await.unwrap();
        assert_eq!(league.id, pl.id);

        // No team league: match by competition name.
        let mut orphan = team.clone();
        orphan.league_id = None;
        let league = resolve_stats_league(&store, &orphan, &snapshot(None, Some("uefa champions league")))
            .await
            .unwrap();
        assert_eq!(league.id, cl.id);

        // Nothing to go on is an explicit failure, not a default league.
        let err = resolve_stats_league(&store, &orphan, &snapshot(Some(9999), Some("Serie A")))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }

    #[tokio::test]
    async fn snapshot_upsert_is_keyed_by_team_league_season() {
        let store = MemoryStore::new();
        let (pl, _, team) = seed(&store).await;

        let first = store_snapshot(&store, &team, &snapshot(Some(2021), None)).await.unwrap();
        let second = store_snapshot(&store, &team, &snapshot(Some(2021), None)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.league_id, pl.id);
        assert_eq!(second.season, 2024);
        assert_eq!(second.stats_json["currentSeason"]["leagueId"], serde_json::json!(2021));
        assert_eq!(store.snapshot(|s| s.team_stats.len()).await, 1);
    }

    #[tokio::test]
    async fn selection_skips_teams_with_stats_unless_forced() {
        let store = MemoryStore::new();
        let (pl, _, team) = seed(&store).await;

        let all = StatsSelection::default();
        assert_eq!(select_teams(&store, &all).await.unwrap().len(), 1);

        store_snapshot(&store, &team, &snapshot(Some(2021), None)).await.unwrap();
        assert!(select_teams(&store, &all).await.unwrap().is_empty());

        let forced = StatsSelection {
            league_id: Some(pl.id),
            force: true,
            ..Default::default()
        };
        assert_eq!(select_teams(&store, &forced).await.unwrap().len(), 1);

        let by_name = StatsSelection {
            competition: Some("premier".to_string()),
            force: true,
            ..Default::default()
        };
        assert_eq!(select_teams(&store, &by_name).await.unwrap()[0].id, team.id);

        let missing = StatsSelection {
            competition: Some("Eredivisie".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            select_teams(&store, &missing).await,
            Err(IngestError::NotFound(_))
        ));
    }
}
