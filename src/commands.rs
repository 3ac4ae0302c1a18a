//! Subcommand dispatch.
//!
//! A command that runs to completion returns `Ok` even when some batch items
//! failed; the report lists them. Configuration and database errors, and a
//! single-target command that gets no data from its provider, return `Err`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use crate::analysis::{self, MatchupRequest};
use crate::batch::BatchReport;
use crate::cli::Command;
use crate::config::Config;
use crate::error::IngestError;
use crate::jobs::{competitions, connection, import, leagues, matches, stats, teams};
use crate::server::{self, AppState};
use crate::store::{FootballStore, PgStore, TeamFilter};
use crate::upstream::{self, ApiSportsClient, FootballDataClient, GeminiClient};

const DB_CONNECT_RETRIES: u32 = 5;

async fn connect(config: &Config) -> Result<PgStore> {
    PgStore::connect(&config.database_url, DB_CONNECT_RETRIES)
        .await
        .context("Failed to connect to the database")
}

fn http(config: &Config) -> Result<reqwest::Client> {
    Ok(upstream::http_client(config.http_timeout())?)
}

fn football_data(config: &Config) -> Result<FootballDataClient> {
    Ok(FootballDataClient::new(
        &config.football_data()?,
        http(config)?,
        config.requests_per_minute,
    )?)
}

fn api_sports(config: &Config) -> Result<ApiSportsClient> {
    Ok(ApiSportsClient::new(
        &config.api_sports()?,
        http(config)?,
        config.requests_per_minute,
    )?)
}

fn delay_or_default(delay: Option<u64>, config: &Config) -> Duration {
    delay.map(Duration::from_secs).unwrap_or_else(|| config.request_delay())
}

fn print_report(report: &BatchReport) {
    println!("{}", report);
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
}

pub async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::FetchMatches {
            date,
            important_only,
        } => {
            let client = api_sports(config)?;
            let store = connect(config).await?;
            let report = match date {
                Some(date) => matches::fetch_matches_on(&store, &client, date, important_only).await?,
                None => {
                    let today = Utc::now().date_naive();
                    let dates = vec![today, today + ChronoDuration::days(1)];
                    matches::fetch_matches(&store, &client, dates, important_only, config.request_delay())
                        .await
                }
            };
            print_report(&report);
        }

        Command::FetchCompetitionMatches {
            league_id,
            api_league_id,
            all_active,
            season,
            delay,
        } => {
            let client = football_data(config)?;
            let store = connect(config).await?;
            let targets =
                competitions::resolve_targets(&store, league_id, api_league_id, all_active).await?;
            let report = match targets.as_slice() {
                [single] if !all_active => {
                    competitions::fetch_competition_matches_for(&store, &client, single, season).await?
                }
                _ => {
                    competitions::fetch_competition_matches(
                        &store,
                        &client,
                        targets,
                        season,
                        delay_or_default(delay, config),
                    )
                    .await
                }
            };
            print_report(&report);
        }

        Command::FetchLeague {
            api_league_id,
            season,
        } => {
            let client = football_data(config)?;
            let store = connect(config).await?;
            let (league, season) = leagues::fetch_league(&store, &client, &api_league_id, season).await?;
            match season {
                Some(season) => println!("League {} ({}) season {} stored", league.name, league.id, season.year),
                None => println!("League {} ({}) stored; no season information", league.name, league.id),
            }
        }

        Command::FetchTeams {
            api_league_id,
            season,
        } => {
            let client = football_data(config)?;
            let store = connect(config).await?;
            let report = teams::fetch_teams(&store, &client, &api_league_id, season).await?;
            print_report(&report);
        }

        Command::UpdateTeams {
            team_id,
            all: _,
            delay,
        } => {
            let client = football_data(config)?;
            let store = connect(config).await?;
            if let Some(id) = team_id {
                let team = store
                    .team_by_id(id)
                    .await?
                    .ok_or_else(|| IngestError::NotFound(format!("team {}", id)))?;
                let team = teams::update_team(&store, &client, &team).await?;
                println!("Team {} updated", team.name);
            } else {
                let all = store
                    .teams(&TeamFilter {
                        with_api_id: true,
                        ..Default::default()
                    })
                    .await?;
                info!("{} teams to update", all.len());
                let report = teams::update_teams(&store, &client, all, delay_or_default(delay, config)).await;
                print_report(&report);
            }
        }

        Command::SyncStats {
            team_id,
            league_id,
            competition,
            delay,
            force,
        } => {
            let client = football_data(config)?;
            let store = connect(config).await?;
            let selection = stats::StatsSelection {
                team_id,
                league_id,
                competition,
                force,
            };
            let selected = stats::select_teams(&store, &selection).await?;
            match (team_id, selected.as_slice()) {
                (Some(_), [team]) => {
                    let row = stats::sync_team(&store, &client, team, Utc::now()).await?;
                    println!("Stats of {} stored for season {}", team.name, row.season);
                }
                _ => {
                    if selected.is_empty() {
                        println!("No teams need a stats update (use --force to rebuild)");
                        return Ok(());
                    }
                    let report =
                        stats::sync_team_stats(&store, &client, selected, delay_or_default(delay, config)).await;
                    print_report(&report);
                }
            }
        }

        Command::Import {
            kind,
            league,
            season,
            delay,
        } => {
            let client = football_data(config)?;
            let store = connect(config).await?;
            let report = import::run_import(
                &store,
                &client,
                kind,
                &league,
                season,
                delay_or_default(delay, config),
            )
            .await?;
            print_report(&report);
        }

        Command::TestApi => {
            let fd = match config.football_data() {
                Ok(_) => Some(football_data(config)?),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            };
            let api = match config.api_sports() {
                Ok(_) => Some(api_sports(config)?),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            };
            let report = connection::test_connections(fd.as_ref(), api.as_ref()).await;
            print!("{}", report);
            if !report.is_ok() {
                bail!("provider connection test failed");
            }
        }

        Command::Migrate => {
            let store = connect(config).await?;
            store.migrate().await?;
            println!("Migrations applied");
        }

        Command::Serve { port } => {
            let store = connect(config).await?;
            store.migrate().await?;
            let gemini = match config.gemini() {
                Ok(gemini_config) => Some(Arc::new(GeminiClient::new(gemini_config, http(config)?))),
                Err(e) => {
                    warn!("Analysis endpoint disabled: {}", e);
                    None
                }
            };
            let state = AppState {
                store: Arc::new(store),
                gemini,
            };
            server::serve(state, port.unwrap_or(config.http_port)).await?;
        }

        Command::Analyze { home, away, date } => {
            let gemini = GeminiClient::new(config.gemini()?, http(config)?);
            let store = connect(config).await?;
            let result = analysis::analyze(&store, &gemini, &MatchupRequest { home, away, date }).await?;
            println!("{} vs. {}\n\n{}", result.home, result.away, result.text);
        }
    }
    Ok(())
}
