//! Public match browser: one UTC day of matches grouped by league.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::models::MatchListing;
use crate::normalize::MatchStatus;
use crate::store::FootballStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSummary {
    pub id: Uuid,
    pub api_fixture_id: i64,
    pub kickoff: Option<chrono::DateTime<Utc>>,
    pub status: MatchStatus,
    pub elapsed: Option<i32>,
    pub home_team: String,
    pub home_logo: Option<String>,
    pub away_team: String,
    pub away_logo: Option<String>,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
    pub venue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeagueMatches {
    pub league_id: Uuid,
    pub name: String,
    pub country: Option<String>,
    pub logo: Option<String>,
    pub matches: Vec<MatchSummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayCounts {
    pub total: usize,
    pub live: usize,
    pub finished: usize,
    pub upcoming: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDay {
    pub date: NaiveDate,
    pub leagues: Vec<LeagueMatches>,
    pub counts: DayCounts,
}

/// Group listings (already ordered by kickoff) by league, leagues in order of
/// their first match.
pub fn group_by_league(listings: Vec<MatchListing>, date: NaiveDate) -> MatchDay {
    let mut leagues: Vec<LeagueMatches> = Vec::new();
    let mut counts = DayCounts::default();

    for listing in listings {
        let status = MatchStatus::from_stored(&listing.status);
        counts.total += 1;
        if status.is_in_progress() {
            counts.live += 1;
        } else if status == MatchStatus::Finished {
            counts.finished += 1;
        } else if status == MatchStatus::Scheduled {
            counts.upcoming += 1;
        }

        let summary = MatchSummary {
            id: listing.id,
            api_fixture_id: listing.api_fixture_id,
            kickoff: listing.match_date,
            status,
            elapsed: listing.elapsed,
            home_team: listing.home_team_name,
            home_logo: listing.home_team_logo,
            away_team: listing.away_team_name,
            away_logo: listing.away_team_logo,
            home_goals: listing.home_goals,
            away_goals: listing.away_goals,
            venue: listing.venue,
        };

        match leagues.iter_mut().find(|l| l.league_id == listing.league_id) {
            Some(group) => group.matches.push(summary),
            None => leagues.push(LeagueMatches {
                league_id: listing.league_id,
                name: listing.league_name,
                country: listing.country_name,
                logo: listing.league_logo,
                matches: vec![summary],
            }),
        }
    }

    MatchDay {
        date,
        leagues,
        counts,
    }
}

pub async fn matches_for_day<S: FootballStore + ?Sized>(store: &S, date: NaiveDate) -> Result<MatchDay> {
    let start = date
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| IngestError::invalid(format!("invalid day {}", date)))?;
    let listings = store.match_listings(start, start + Duration::days(1)).await?;
    Ok(group_by_league(listings, date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::CanonicalFixture;
    use crate::store::memory::MemoryStore;
    use crate::upsert::FixtureImporter;
    use serde_json::{json, Value};

    fn fixture(id: i64, league: i64, date: &str, status: &str, home: i64, away: i64) -> Value {
        json!({
            "fixture": { "id": id, "date": date, "status": { "short": status } },
            "league": { "id": league, "name": format!("League {}", league), "country": "England", "season": 2024 },
            "teams": {
                "home": { "id": home, "name": format!("Team {}", home) },
                "away": { "id": away, "name": format!("Team {}", away) }
            },
            "goals": { "home": null, "away": null }
        })
    }

    #[tokio::test]
    async fn day_is_grouped_by_league_with_counts() {
        let store = MemoryStore::new();
        let importer = FixtureImporter::new(&store);
        for raw in [
            fixture(1, 39, "2025-03-01T12:30:00+00:00", "FT", 1, 2),
            fixture(2, 140, "2025-03-01T14:00:00+00:00", "1H", 3, 4),
            fixture(3, 39, "2025-03-01T17:30:00+00:00", "NS", 5, 6),
            fixture(4, 39, "2025-03-01T23:59:00+00:00", "HT", 7, 8),
            fixture(5, 39, "2025-03-02T00:00:00+00:00", "NS", 9, 10),
            fixture(6, 39, "2025-02-28T23:59:59+00:00", "FT", 11, 12),
        ] {
            let fixture = CanonicalFixture::from_api_sports(&raw).unwrap();
            importer.import(&fixture, None).await.unwrap();
        }

        let day = matches_for_day(&store, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
            .await
            .unwrap();

        assert_eq!(
            day.counts,
            DayCounts { total: 4, live: 2, finished: 1, upcoming: 1 }
        );
        assert_eq!(day.leagues.len(), 2);
        assert_eq!(day.leagues[0].name, "League 39");
        assert_eq!(day.leagues[0].country.as_deref(), Some("England"));
        let ids: Vec<i64> = day.leagues[0].matches.iter().map(|m| m.api_fixture_id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(day.leagues[1].matches[0].status, MatchStatus::Live);
    }

    #[tokio::test]
    async fn empty_day() {
        let store = MemoryStore::new();
        let day = matches_for_day(&store, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
            .await
            .unwrap();
        assert!(day.leagues.is_empty());
        assert_eq!(day.counts, DayCounts::default());
    }
}
