use std::num::NonZeroU32;

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{decode, get_json, limiter, Limiter, Provider};
use crate::config::ApiSportsConfig;
use crate::error::{IngestError, Result};

// ============================================================================
// Partial payload views
// ============================================================================

/// `{ results, errors, response }` wrapper around every api-sports reply.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsEnvelope {
    pub results: Option<i64>,
    pub errors: Value,
    pub response: Value,
}

impl AsEnvelope {
    /// `errors` comes back as `[]` when empty and as an object otherwise.
    pub fn has_errors(&self) -> bool {
        match &self.errors {
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsStatus {
    pub long: Option<String>,
    pub short: Option<String>,
    pub elapsed: Option<i32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsVenue {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsFixture {
    pub id: Option<i64>,
    pub referee: Option<String>,
    pub timezone: Option<String>,
    pub date: Option<String>,
    pub venue: Option<AsVenue>,
    pub status: Option<AsStatus>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsLeague {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub logo: Option<String>,
    pub flag: Option<String>,
    pub season: Option<i32>,
    pub round: Option<String>,
    #[serde(rename = "type")]
    pub league_type: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsTeam {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsTeams {
    pub home: Option<AsTeam>,
    pub away: Option<AsTeam>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsGoals {
    pub home: Option<i32>,
    pub away: Option<i32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsScore {
    pub halftime: Option<AsGoals>,
    pub fulltime: Option<AsGoals>,
    pub extratime: Option<AsGoals>,
    pub penalty: Option<AsGoals>,
}

/// One entry of `fixtures` responses.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AsFixtureItem {
    pub fixture: Option<AsFixture>,
    pub league: Option<AsLeague>,
    pub teams: Option<AsTeams>,
    pub goals: Option<AsGoals>,
    pub score: Option<AsScore>,
    pub events: Option<Value>,
    pub lineups: Option<Value>,
    pub statistics: Option<Value>,
}

// ============================================================================
// Client
// ============================================================================

pub struct ApiSportsClient {
    base_url: String,
    headers: HeaderMap,
    http: reqwest::Client,
    limiter: Limiter,
}

impl ApiSportsClient {
    pub const PROVIDER: Provider = Provider::ApiSports;

    pub fn new(
        config: &ApiSportsConfig,
        http: reqwest::Client,
        requests_per_minute: NonZeroU32,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| IngestError::Config("API_SPORTS_KEY is not a valid header value".to_string()))?;
        let host = HeaderValue::from_str(&config.host)
            .map_err(|_| IngestError::Config("API_SPORTS_HOST is not a valid header value".to_string()))?;
        headers.insert("x-rapidapi-key", key);
        headers.insert("x-rapidapi-host", host);

        Ok(Self {
            base_url: config.base_url.clone(),
            headers,
            http,
            limiter: limiter(requests_per_minute),
        })
    }

    /// GET `{base}/{endpoint}` and unwrap the envelope's `response` field.
    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Option<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let body = get_json(
            &self.http,
            &self.limiter,
            Self::PROVIDER,
            &url,
            self.headers.clone(),
            params,
        )
        .await?;

        let envelope: AsEnvelope = decode(Self::PROVIDER, endpoint, body)?;
        if envelope.has_errors() {
            warn!(
                provider = %Self::PROVIDER,
                endpoint,
                errors = %envelope.errors,
                "api-sports.io reported errors"
            );
            return None;
        }
        Some(envelope.response)
    }

    pub async fn test_connection(&self) -> bool {
        match self.get("status", &[]).await {
            Some(status) => {
                let plan = status
                    .pointer("/subscription/plan")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                info!("api-sports.io connection OK (plan: {})", plan);
                true
            }
            None => false,
        }
    }

    /// Raw fixture entries for one calendar date.
    pub async fn fixtures_on(&self, date: NaiveDate) -> Option<Vec<Value>> {
        let response = self
            .get("fixtures", &[("date", date.format("%Y-%m-%d").to_string())])
            .await?;
        list(response, "fixtures")
    }

    pub async fn team_fixtures(&self, team: i64, last: u32) -> Option<Vec<Value>> {
        let response = self
            .get(
                "fixtures",
                &[("team", team.to_string()), ("last", last.to_string())],
            )
            .await?;
        list(response, "team fixtures")
    }

    pub async fn head_to_head(&self, team_a: i64, team_b: i64, last: u32) -> Option<Vec<Value>> {
        let response = self
            .get(
                "fixtures/headtohead",
                &[
                    ("h2h", format!("{}-{}", team_a, team_b)),
                    ("last", last.to_string()),
                ],
            )
            .await?;
        list(response, "head to head")
    }
}

fn list(response: Value, what: &str) -> Option<Vec<Value>> {
    match response {
        Value::Array(items) => Some(items),
        other => {
            warn!(
                provider = %ApiSportsClient::PROVIDER,
                what,
                "Expected a list response, got {}",
                kind(&other)
            );
            None
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
