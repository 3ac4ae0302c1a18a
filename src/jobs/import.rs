//! Catalogue import from football-data.org: competitions, the teams of one
//! competition, and stats for that competition's teams.

use std::fmt;
use std::time::Duration;

use tracing::{error, info};

use crate::batch::{BatchReport, BatchRunner};
use crate::error::{IngestError, Result};
use crate::models::League;
use crate::store::{FootballStore, TeamFilter};
use crate::upstream::FootballDataClient;

use super::{leagues, stats, teams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ImportKind {
    All,
    Leagues,
    Teams,
    Stats,
}

impl ImportKind {
    fn steps(self) -> Vec<ImportKind> {
        match self {
            ImportKind::All => vec![ImportKind::Leagues, ImportKind::Teams, ImportKind::Stats],
            kind => vec![kind],
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportKind::All => "all",
            ImportKind::Leagues => "leagues",
            ImportKind::Teams => "teams",
            ImportKind::Stats => "stats",
        })
    }
}

/// A stored league by competition code, else the first whose name contains
/// the code.
pub async fn league_for_code<S: FootballStore + ?Sized>(store: &S, code: &str) -> Result<League> {
    if let Some(league) = store.league_by_code(code).await? {
        return Ok(league);
    }
    store
        .leagues_matching(code)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| IngestError::NotFound(format!("league with code '{}'; import teams first", code)))
}

async fn import_stats<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    league_code: &str,
    delay: Duration,
) -> Result<BatchReport> {
    let league = league_for_code(store, league_code).await?;
    let teams = store
        .teams(&TeamFilter {
            league_id: Some(league.id),
            with_api_id: true,
            ..Default::default()
        })
        .await?;
    if teams.is_empty() {
        return Err(IngestError::NotFound(format!(
            "teams of {}; import teams first",
            league.name
        )));
    }
    info!("Importing stats for {} teams of {}", teams.len(), league.name);
    Ok(stats::sync_team_stats(store, client, teams, delay).await)
}

async fn run_step<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    step: ImportKind,
    league_code: &str,
    season: Option<i32>,
    delay: Duration,
) -> Result<BatchReport> {
    match step {
        ImportKind::Leagues => leagues::import_competitions(store, client).await,
        ImportKind::Teams => teams::fetch_teams(store, client, league_code, season).await,
        ImportKind::Stats => import_stats(store, client, league_code, delay).await,
        ImportKind::All => Err(IngestError::invalid("'all' is not a single import step")),
    }
}

/// Run an import. A single kind propagates its error; `all` runs every step
/// and counts a failed step as one failed item.
pub async fn run_import<S: FootballStore + ?Sized>(
    store: &S,
    client: &FootballDataClient,
    kind: ImportKind,
    league_code: &str,
    season: Option<i32>,
    delay: Duration,
) -> Result<BatchReport> {
    if !client.test_connection().await {
        error!("Could not connect to football-data.org; check the API key");
        return Err(IngestError::no_data(
            FootballDataClient::PROVIDER.as_str(),
            "connection check",
        ));
    }

    if kind != ImportKind::All {
        return run_step(store, client, kind, league_code, season, delay).await;
    }

    Ok(BatchRunner::new("import", Duration::ZERO)
        .run(
            kind.steps(),
            |step| format!("import {} ({})", step, league_code),
            |step| run_step(store, client, step, league_code, season, delay),
        )
        .await
        .flatten())
}
