use std::num::NonZeroU32;

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{decode, get_json, limiter, null_as_empty, Limiter, Provider};
use crate::config::FootballDataConfig;
use crate::error::{IngestError, Result};

// ============================================================================
// Partial payload views (every field optional)
// ============================================================================

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FdArea {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub flag: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FdSeason {
    pub id: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub current_matchday: Option<i32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FdCompetition {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub competition_type: Option<String>,
    pub emblem: Option<String>,
    pub area: Option<FdArea>,
    pub current_season: Option<FdSeason>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FdContract {
    pub start: Option<String>,
    pub until: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FdPerson {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub position: Option<String>,
    pub shirt_number: Option<i32>,
    pub market_value: Option<i64>,
    pub contract: Option<FdContract>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FdTeam {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub tla: Option<String>,
    pub crest: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub founded: Option<i32>,
    pub club_colors: Option<String>,
    pub venue: Option<String>,
    pub area: Option<FdArea>,
    #[serde(deserialize_with = "null_as_empty")]
    pub running_competitions: Vec<FdCompetition>,
    pub coach: Option<FdPerson>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FdGoals {
    pub home: Option<i32>,
    pub away: Option<i32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FdScore {
    pub winner: Option<String>,
    pub full_time: Option<FdGoals>,
    pub half_time: Option<FdGoals>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FdReferee {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct FdMatch {
    pub id: Option<i64>,
    pub utc_date: Option<String>,
    pub status: Option<String>,
    pub matchday: Option<i32>,
    pub stage: Option<String>,
    pub competition: Option<FdCompetition>,
    pub area: Option<FdArea>,
    pub season: Option<FdSeason>,
    pub home_team: Option<FdTeam>,
    pub away_team: Option<FdTeam>,
    pub score: Option<FdScore>,
    pub venue: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub referees: Vec<FdReferee>,
}

/// `competitions/{id}/matches` and `matches`. Items stay raw so one bad
/// match cannot sink the page.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FdMatchesPage {
    pub competition: Option<FdCompetition>,
    #[serde(deserialize_with = "null_as_empty")]
    pub matches: Vec<Value>,
}

/// `competitions/{id}/teams`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FdTeamsPage {
    pub competition: Option<FdCompetition>,
    pub season: Option<FdSeason>,
    #[serde(deserialize_with = "null_as_empty")]
    pub teams: Vec<Value>,
}

// ============================================================================
// Client
// ============================================================================

/// Filters accepted by `teams/{id}/matches`.
#[derive(Debug, Clone, Default)]
pub struct TeamMatchFilter {
    pub status: Option<String>,
    pub season: Option<i32>,
    pub competitions: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<u32>,
}

impl TeamMatchFilter {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(status) = &self.status {
            params.push(("status", status.clone()));
        }
        if let Some(season) = self.season {
            params.push(("season", season.to_string()));
        }
        if let Some(competition) = self.competitions {
            params.push(("competitions", competition.to_string()));
        }
        if let Some(from) = self.date_from {
            params.push(("dateFrom", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            params.push(("dateTo", to.format("%Y-%m-%d").to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

pub struct FootballDataClient {
    base_url: String,
    headers: HeaderMap,
    http: reqwest::Client,
    limiter: Limiter,
}

impl FootballDataClient {
    pub fn new(
        config: &FootballDataConfig,
        http: reqwest::Client,
        requests_per_minute: NonZeroU32,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&config.api_key)
            .map_err(|_| IngestError::Config("FOOTBALL_DATA_API_KEY is not a valid header value".to_string()))?;
        headers.insert("X-Auth-Token", token);

        Ok(Self {
            base_url: config.base_url.clone(),
            headers,
            http,
            limiter: limiter(requests_per_minute),
        })
    }

    pub const PROVIDER: Provider = Provider::FootballData;

    /// GET `{base}/{endpoint}` with the auth header.
    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Option<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        get_json(
            &self.http,
            &self.limiter,
            Self::PROVIDER,
            &url,
            self.headers.clone(),
            params,
        )
        .await
    }

    pub async fn test_connection(&self) -> bool {
        match self.get("competitions", &[]).await {
            Some(body) => {
                let count = body
                    .get("competitions")
                    .and_then(Value::as_array)
                    .map(|c| c.len())
                    .unwrap_or(0);
                info!("football-data.org connection OK ({} competitions visible)", count);
                true
            }
            None => false,
        }
    }

    /// Raw competition entries of the catalogue.
    pub async fn competitions(&self) -> Option<Vec<Value>> {
        let body = self.get("competitions", &[]).await?;
        match body.get("competitions") {
            Some(Value::Array(items)) => Some(items.clone()),
            _ => {
                warn!("football-data.org competitions response has no competitions list");
                None
            }
        }
    }

    /// A single competition, raw. `id` may be numeric or a code such as `PL`.
    pub async fn competition(&self, id: &str) -> Option<Value> {
        self.get(&format!("competitions/{}", id), &[]).await
    }

    pub async fn competition_teams(&self, id: &str, season: Option<i32>) -> Option<FdTeamsPage> {
        let params: Vec<(&str, String)> = season.map(|s| ("season", s.to_string())).into_iter().collect();
        let body = self.get(&format!("competitions/{}/teams", id), &params).await?;
        decode(Self::PROVIDER, "competition teams", body)
    }

    pub async fn competition_matches(
        &self,
        id: &str,
        season: Option<i32>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Option<FdMatchesPage> {
        let mut params = Vec::new();
        if let Some(season) = season {
            params.push(("season", season.to_string()));
        }
        if let Some(from) = date_from {
            params.push(("dateFrom", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = date_to {
            params.push(("dateTo", to.format("%Y-%m-%d").to_string()));
        }
        let body = self.get(&format!("competitions/{}/matches", id), &params).await?;
        decode(Self::PROVIDER, "competition matches", body)
    }

    pub async fn matches_on(&self, date: NaiveDate) -> Option<FdMatchesPage> {
        let day = date.format("%Y-%m-%d").to_string();
        let body = self
            .get("matches", &[("dateFrom", day.clone()), ("dateTo", day)])
            .await?;
        decode(Self::PROVIDER, "matches", body)
    }

    /// Team detail including squad and coach, raw.
    pub async fn team(&self, id: i64) -> Option<Value> {
        self.get(&format!("teams/{}", id), &[]).await
    }

    pub async fn team_matches(&self, id: i64, filter: &TeamMatchFilter) -> Option<Vec<Value>> {
        let body = self
            .get(&format!("teams/{}/matches", id), &filter.params())
            .await?;
        let page: FdMatchesPage = decode(Self::PROVIDER, "team matches", body)?;
        Some(page.matches)
    }

    pub async fn match_detail(&self, id: i64) -> Option<Value> {
        self.get(&format!("matches/{}", id), &[]).await
    }
}
