//! League catalogue from football-data.org.

use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::batch::{BatchReport, BatchRunner};
use crate::error::{IngestError, Result};
use crate::models::{League, Season};
use crate::normalize::{LeagueRef, SeasonRef};
use crate::reconcile::Reconciler;
use crate::store::FootballStore;
use crate::upstream::football_data::FdCompetition;
use crate::upstream::FootballDataClient;

/// Import one raw competition and, when known, its season.
///
/// `season_year` picks the season to record; without it the competition's
/// current season is used.
pub async fn import_competition<S: FootballStore + ?Sized>(
    store: &S,
    raw: &Value,
    season_year: Option<i32>,
) -> Result<(League, Option<Season>)> {
    let competition: FdCompetition = serde_json::from_value(raw.clone())?;
    let league_ref = LeagueRef::from_fd_competition(&competition, Some(raw.clone()));
    if !league_ref.is_identifiable() {
        return Err(IngestError::invalid("competition without id or name"));
    }

    let reconciler = Reconciler::new(store);
    let league = reconciler.import_league(&league_ref).await?;

    let current = SeasonRef::from_fd_season(competition.current_season.as_ref(), None);
    let season_ref = match (season_year, current) {
        (Some(year), Some(current)) if current.year == year => Some(current),
        (Some(year), _) => Some(SeasonRef::for_year(year)),
        (None, current) => current,
    };

    let season = match season_ref {
        Some(season_ref) => Some(reconciler.resolve_season(&league, &season_ref).await?),
        None => None,
    };

    info!(
        "Imported league {} (api id {:?}){}",
        league.name,
        league.api_league_id,
        season
            .as_ref()
            .map(|s| format!(", season {}", s.year))
            .unwrap_or_default()
    );
    Ok((league, season))
}

/// `fetch-league`: one competition by id or code.
pub async fn fetch_league<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    api_league_id: &str,
    season_year: Option<i32>,
) -> Result<(League, Option<Season>)> {
    let raw = client.competition(api_league_id).await.ok_or_else(|| {
        IngestError::no_data(
            FootballDataClient::PROVIDER.as_str(),
            format!("competition {}", api_league_id),
        )
    })?;
    import_competition(store, &raw, season_year).await
}

/// Import every competition of the catalogue.
pub async fn import_competitions<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
) -> Result<BatchReport> {
    let competitions = client.competitions().await.ok_or_else(|| {
        IngestError::no_data(FootballDataClient::PROVIDER.as_str(), "competitions")
    })?;
    Ok(import_competition_values(store, competitions).await)
}

pub async fn import_competition_values<S: FootballStore + ?Sized>(
    store: &S,
    competitions: Vec<Value>,
) -> BatchReport {
    BatchRunner::new("leagues", Duration::ZERO)
        .run(
            competitions,
            |raw| {
                raw.get("name")
                    .and_then(Value::as_str)
                    .map(|name| format!("competition {}", name))
                    .unwrap_or_else(|| "competition without name".to_string())
            },
            |raw| async move { import_competition(store, &raw, None).await },
        )
        .await
        .report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn premier_league() -> Value {
        json!({
            "id": 2021,
            "name": "Premier League",
            "code": "PL",
            "type": "LEAGUE",
            "emblem": "https://crests/PL.png",
            "area": { "id": 2072, "name": "England", "code": "ENG" },
            "currentSeason": { "id": 2287, "startDate": "2024-08-16", "endDate": "2025-05-25", "currentMatchday": 12 }
        })
    }

    #[tokio::test]
    async fn competition_import_creates_league_and_current_season() {
        let store = MemoryStore::new();
        let (league, season) = import_competition(&store, &premier_league(), None).await.unwrap();

        assert_eq!(league.name, "Premier League");
        assert_eq!(league.code(), Some("PL"));
        assert_eq!(league.current_matchday, Some(12));
        assert!(league.country_id.is_some());
        let season = season.unwrap();
        assert_eq!(season.year, 2024);
        assert_eq!(season.name.as_deref(), Some("2024/2025"));
        assert!(season.current);

        assert_eq!(store.league_by_code("pl").await.unwrap().map(|l| l.id), Some(league.id));
    }

    #[tokio::test]
    async fn explicit_past_season_is_recorded_by_year() {
        let store = MemoryStore::new();
        let (_, season) = import_competition(&store, &premier_league(), Some(2022)).await.unwrap();
        let season = season.unwrap();
        assert_eq!(season.year, 2022);
        assert!(!season.current);
    }

    #[tokio::test]
    async fn catalogue_import_counts_bad_entries() {
        let store = MemoryStore::new();
        let report = import_competition_values(
            &store,
            vec![premier_league(), json!({ "area": { "name": "Nowhere" } }), json!(42)],
        )
        .await;
        assert_eq!((report.succeeded, report.failed), (1, 2));

        // Re-import keeps a single row.
        import_competition_values(&store, vec![premier_league()]).await;
        assert_eq!(store.snapshot(|s| s.leagues.len()).await, 1);
    }
}
