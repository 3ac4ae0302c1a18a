//! Match upsert: one canonical fixture in, one match row out.

use tracing::debug;

use crate::error::{IngestError, Result};
use crate::models::{FootballMatch, League, NewMatch};
use crate::normalize::CanonicalFixture;
use crate::reconcile::Reconciler;
use crate::store::FootballStore;

pub struct FixtureImporter<'a, S: FootballStore + ?Sized> {
    store: &'a S,
    reconciler: Reconciler<'a, S>,
}

impl<'a, S: FootballStore + ?Sized> FixtureImporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            reconciler: Reconciler::new(store),
        }
    }

    /// Reconcile league, season and both teams, then upsert the match keyed
    /// by its upstream fixture id.
    ///
    /// `known_league` is used when the fixture itself does not identify its
    /// league (a page fetched for a league the caller already resolved).
    pub async fn import(
        &self,
        fixture: &CanonicalFixture,
        known_league: Option<&League>,
    ) -> Result<FootballMatch> {
        let league = match known_league {
            Some(known) if !fixture.league.is_identifiable() => known.clone(),
            _ => self.reconciler.resolve_league(&fixture.league).await?,
        };
        let season = self.reconciler.resolve_season(&league, &fixture.season).await?;
        let home = self.reconciler.resolve_team(&fixture.home, Some(&league)).await?;
        let away = self.reconciler.resolve_team(&fixture.away, Some(&league)).await?;

        if home.id == away.id {
            return Err(IngestError::invalid(format!(
                "fixture {} resolves both sides to team {}",
                fixture.api_fixture_id, home.name
            )));
        }

        let row = self
            .store
            .upsert_match(&NewMatch {
                api_fixture_id: fixture.api_fixture_id,
                league_id: league.id,
                season_id: season.id,
                home_team_id: home.id,
                away_team_id: away.id,
                match_date: fixture.kickoff,
                status: fixture.status,
                home_goals: fixture.home_goals,
                away_goals: fixture.away_goals,
                home_halftime_goals: fixture.home_halftime_goals,
                away_halftime_goals: fixture.away_halftime_goals,
                elapsed: fixture.elapsed,
                venue: fixture.venue.clone(),
                referee: fixture.referee.clone(),
                round: fixture.round.clone(),
                stats: fixture.stats.clone(),
                events: fixture.events.clone(),
                lineups: fixture.lineups.clone(),
                metadata: Some(fixture.raw.clone()),
            })
            .await?;

        debug!(
            "Stored fixture {} ({} vs {}, {})",
            fixture.api_fixture_id, home.name, away.name, row.status
        );
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::MatchStatus;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;
    use serde_json::{json, Value};

    fn api_sports_fixture(short: &str, home_goals: Value, away_goals: Value) -> Value {
        json!({
            "fixture": {
                "id": 12345,
                "date": "2024-05-19T15:00:00+00:00",
                "venue": { "name": "Emirates Stadium" },
                "status": { "short": short, "elapsed": null }
            },
            "league": { "id": 39, "name": "Premier League", "country": "England", "season": 2023 },
            "teams": {
                "home": { "id": 42, "name": "Arsenal" },
                "away": { "id": 45, "name": "Everton" }
            },
            "goals": { "home": home_goals, "away": away_goals }
        })
    }

    fn football_data_match(status: &str, full_time: Value) -> Value {
        json!({
            "id": 12345,
            "utcDate": "2024-05-19T15:00:00Z",
            "status": status,
            "competition": { "id": 2021, "name": "Premier League" },
            "season": { "startDate": "2023-08-11", "endDate": "2024-05-19" },
            "homeTeam": { "id": 57, "name": "Arsenal FC" },
            "awayTeam": { "id": 62, "name": "Everton FC" },
            "score": { "fullTime": full_time }
        })
    }

    #[tokio::test]
    async fn importing_same_fixture_twice_is_idempotent() {
        let store = MemoryStore::new();
        let importer = FixtureImporter::new(&store);
        let fixture =
            CanonicalFixture::from_api_sports(&api_sports_fixture("FT", json!(2), json!(1)))
                .unwrap();

        let first = importer.import(&fixture, None).await.unwrap();
        let second = importer.import(&fixture, None).await.unwrap();

        assert_eq!(first, second);
        let counts = store
            .snapshot(|s| (s.matches.len(), s.teams.len(), s.leagues.len(), s.seasons.len(), s.countries.len()))
            .await;
        assert_eq!(counts, (1, 2, 1, 1, 1));
    }

    #[tokio::test]
    async fn postponement_keeps_previous_score_api_sports() {
        let store = MemoryStore::new();
        let importer = FixtureImporter::new(&store);

        let finished =
            CanonicalFixture::from_api_sports(&api_sports_fixture("FT", json!(2), json!(1)))
                .unwrap();
        importer.import(&finished, None).await.unwrap();

        let postponed =
            CanonicalFixture::from_api_sports(&api_sports_fixture("PST", json!(null), json!(null)))
                .unwrap();
        importer.import(&postponed, None).await.unwrap();

        let row = store.match_by_api_id(12345).await.unwrap().unwrap();
        assert_eq!(row.match_status(), MatchStatus::Postponed);
        assert_eq!(row.status, "postponed");
        assert_eq!(row.home_goals, Some(2));
        assert_eq!(row.away_goals, Some(1));
        assert_eq!(row.venue.as_deref(), Some("Emirates Stadium"));
        assert_eq!(store.snapshot(|s| s.matches.len()).await, 1);
    }

    #[tokio::test]
    async fn postponement_keeps_previous_score_football_data() {
        let store = MemoryStore::new();
        let importer = FixtureImporter::new(&store);
        let now = Utc::now();

        let finished = CanonicalFixture::from_football_data(
            &football_data_match("FINISHED", json!({ "home": 2, "away": 1 })),
            None,
            now,
        )
        .unwrap();
        importer.import(&finished, None).await.unwrap();

        let postponed = CanonicalFixture::from_football_data(
            &football_data_match("POSTPONED", json!({ "home": null, "away": null })),
            None,
            now,
        )
        .unwrap();
        importer.import(&postponed, None).await.unwrap();

        let row = store.match_by_api_id(12345).await.unwrap().unwrap();
        assert_eq!(row.match_status(), MatchStatus::Postponed);
        assert_eq!(row.home_goals, Some(2));
        assert_eq!(row.away_goals, Some(1));
        assert_eq!(row.home_halftime_goals, None);
    }

    #[tokio::test]
    async fn kickoff_is_kept_when_update_has_none() {
        let store = MemoryStore::new();
        let importer = FixtureImporter::new(&store);

        let fixture =
            CanonicalFixture::from_api_sports(&api_sports_fixture("NS", json!(null), json!(null)))
                .unwrap();
        let first = importer.import(&fixture, None).await.unwrap();

        let mut without_kickoff = fixture.clone();
        without_kickoff.kickoff = None;
        without_kickoff.status = Some(MatchStatus::Live);
        let second = importer.import(&without_kickoff, None).await.unwrap();

        assert_eq!(second.match_date, first.match_date);
        assert_eq!(second.status, "live");
    }

    #[tokio::test]
    async fn missing_status_keeps_stored_status() {
        let store = MemoryStore::new();
        let importer = FixtureImporter::new(&store);

        let finished =
            CanonicalFixture::from_api_sports(&api_sports_fixture("FT", json!(2), json!(1)))
                .unwrap();
        importer.import(&finished, None).await.unwrap();

        let mut partial = api_sports_fixture("FT", json!(null), json!(null));
        partial["fixture"].as_object_mut().unwrap().remove("status");
        partial.as_object_mut().unwrap().remove("goals");
        let partial = CanonicalFixture::from_api_sports(&partial).unwrap();
        assert_eq!(partial.status, None);
        let row = importer.import(&partial, None).await.unwrap();

        assert_eq!(row.match_status(), MatchStatus::Finished);
        assert_eq!(row.home_goals, Some(2));
        assert_eq!(row.away_goals, Some(1));
    }

    #[tokio::test]
    async fn new_match_without_status_is_unknown() {
        let store = MemoryStore::new();
        let importer = FixtureImporter::new(&store);
        let mut payload = api_sports_fixture("NS", json!(null), json!(null));
        payload["fixture"].as_object_mut().unwrap().remove("status");
        let fixture = CanonicalFixture::from_api_sports(&payload).unwrap();

        let row = importer.import(&fixture, None).await.unwrap();
        assert_eq!(row.status, "unknown");

        let mut odd = api_sports_fixture("XYZ", json!(null), json!(null));
        odd["fixture"]["id"] = json!(777);
        let odd = CanonicalFixture::from_api_sports(&odd).unwrap();
        assert_eq!(odd.status, Some(MatchStatus::Unknown));
    }

    #[tokio::test]
    async fn known_league_is_used_for_unidentified_fixture_league() {
        let store = MemoryStore::new();
        let importer = FixtureImporter::new(&store);
        let league = Reconciler::new(&store)
            .resolve_league(&crate::normalize::LeagueRef {
                api_id: Some(2021),
                name: Some("Premier League".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut payload = api_sports_fixture("NS", json!(null), json!(null));
        payload.as_object_mut().unwrap().remove("league");
        let fixture = CanonicalFixture::from_api_sports(&payload).unwrap();

        let row = importer.import(&fixture, Some(&league)).await.unwrap();
        assert_eq!(row.league_id, league.id);

        assert!(importer.import(&fixture, None).await.is_err());
    }

    #[tokio::test]
    async fn same_team_on_both_sides_is_rejected() {
        let store = MemoryStore::new();
        let importer = FixtureImporter::new(&store);
        let mut payload = api_sports_fixture("NS", json!(null), json!(null));
        payload["teams"]["away"] = json!({ "id": 42, "name": "Arsenal" });
        let fixture = CanonicalFixture::from_api_sports(&payload).unwrap();

        let err = importer.import(&fixture, None).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidPayload(_)));
        assert_eq!(store.snapshot(|s| s.matches.len()).await, 0);
    }
}
