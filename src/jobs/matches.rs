//! Daily fixtures from api-sports.io.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use crate::batch::{BatchReport, BatchRunner};
use crate::error::{IngestError, Result};
use crate::normalize::CanonicalFixture;
use crate::store::FootballStore;
use crate::upsert::FixtureImporter;
use crate::upstream::ApiSportsClient;

/// api-sports league ids kept by `--important-only`: the big five European
/// leagues, major American leagues, domestic and continental cups, and
/// national-team tournaments.
pub const IMPORTANT_LEAGUES: &[i64] = &[
    39, 140, 135, 78, 61, // PL, La Liga, Serie A, Bundesliga, Ligue 1
    128, 71, 253, 262, // Argentina, Brazil, MLS, Liga MX
    2, 3, 45, 48, 143, 137, 81, 66, // UCL, UEL, domestic cups
    1, 4, 9, 6, // World Cup, Euro, Copa America, AFCON
];

pub fn is_important(fixture: &Value) -> bool {
    fixture
        .pointer("/league/id")
        .and_then(Value::as_i64)
        .map(|id| IMPORTANT_LEAGUES.contains(&id))
        .unwrap_or(false)
}

fn describe(raw: &Value) -> String {
    match raw.pointer("/fixture/id") {
        Some(id) => format!("fixture {}", id),
        None => "fixture without id".to_string(),
    }
}

/// Import a list of raw api-sports fixtures, one batch item each.
pub async fn import_fixtures<S: FootballStore + ?Sized>(
    store: &S,
    label: &str,
    fixtures: Vec<Value>,
    important_only: bool,
) -> BatchReport {
    let fixtures: Vec<Value> = if important_only {
        let before = fixtures.len();
        let kept: Vec<Value> = fixtures.into_iter().filter(is_important).collect();
        info!("{}: {} of {} fixtures are in important leagues", label, kept.len(), before);
        kept
    } else {
        fixtures
    };

    let importer = FixtureImporter::new(store);
    let importer = &importer;
    BatchRunner::new(label, Duration::ZERO)
        .run(fixtures, describe, |raw| async move {
            let fixture = CanonicalFixture::from_api_sports(&raw)?;
            importer.import(&fixture, None).await
        })
        .await
        .report
}

/// Fetch and import one date. Fails when the provider returns nothing.
pub async fn fetch_matches_on<S: FootballStore + ?Sized>(
    store: &S,
    client: &ApiSportsClient,
    date: NaiveDate,
    important_only: bool,
) -> Result<BatchReport> {
    let fixtures = client.fixtures_on(date).await.ok_or_else(|| {
        IngestError::no_data(ApiSportsClient::PROVIDER.as_str(), format!("fixtures for {}", date))
    })?;
    if fixtures.is_empty() {
        warn!("No fixtures listed for {}", date);
    }
    Ok(import_fixtures(store, &format!("fixtures {}", date), fixtures, important_only).await)
}

/// Fetch and import several dates, pausing between them.
pub async fn fetch_matches<S: FootballStore + ?Sized>(
    store: &S,
    client: &ApiSportsClient,
    dates: Vec<NaiveDate>,
    important_only: bool,
    delay: Duration,
) -> BatchReport {
    BatchRunner::new("fetch-matches", delay)
        .run(
            dates,
            |date| format!("date {}", date),
            |date| fetch_matches_on(store, client, date, important_only),
        )
        .await
        .flatten()
}
