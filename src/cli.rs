//! Command-line interface.

use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand};
use uuid::Uuid;

use crate::jobs::import::ImportKind;

#[derive(Parser, Debug)]
#[command(name = "football-ingestion", version, about = "Football data ingestion service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Import the fixtures of a day from api-sports.io (default: today and tomorrow)
    FetchMatches {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Keep only fixtures of the major leagues and tournaments
        #[arg(long)]
        important_only: bool,
    },

    /// Import the fixtures of one or more competitions from football-data.org
    #[command(group(
        ArgGroup::new("target")
            .required(true)
            .args(["league_id", "api_league_id", "all_active"])
    ))]
    FetchCompetitionMatches {
        /// Stored league id
        #[arg(long)]
        league_id: Option<Uuid>,
        /// football-data.org competition id
        #[arg(long)]
        api_league_id: Option<i64>,
        /// Every active league with an upstream id
        #[arg(long)]
        all_active: bool,
        #[arg(long)]
        season: Option<i32>,
        /// Seconds between competitions (default: REQUEST_DELAY_SECONDS)
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Import one competition and its season
    FetchLeague {
        /// football-data.org competition id or code
        api_league_id: String,
        season: Option<i32>,
    },

    /// Import the teams of one competition
    FetchTeams {
        /// football-data.org competition id or code
        api_league_id: String,
        season: Option<i32>,
    },

    /// Refresh stored teams with details, squad and coach
    #[command(group(ArgGroup::new("teams").required(true).args(["team_id", "all"])))]
    UpdateTeams {
        #[arg(long)]
        team_id: Option<Uuid>,
        #[arg(long)]
        all: bool,
        /// Seconds between teams (default: REQUEST_DELAY_SECONDS)
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Build and store team statistics snapshots
    #[command(group(ArgGroup::new("selection").args(["team_id", "league_id", "competition"])))]
    SyncStats {
        #[arg(long)]
        team_id: Option<Uuid>,
        #[arg(long)]
        league_id: Option<Uuid>,
        /// Part of a league name
        #[arg(long)]
        competition: Option<String>,
        /// Seconds between teams (default: REQUEST_DELAY_SECONDS)
        #[arg(long)]
        delay: Option<u64>,
        /// Rebuild snapshots that already exist
        #[arg(long)]
        force: bool,
    },

    /// Catalogue import from football-data.org
    Import {
        #[arg(value_enum, default_value_t = ImportKind::All)]
        kind: ImportKind,
        /// Competition code for the teams and stats steps
        #[arg(long, default_value = "CL")]
        league: String,
        #[arg(long)]
        season: Option<i32>,
        /// Seconds between teams in the stats step (default: REQUEST_DELAY_SECONDS)
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Check connectivity with the configured providers
    TestApi,

    /// Apply database migrations
    Migrate,

    /// Serve the health, match browser and analysis endpoints
    Serve {
        #[arg(long, env = "HTTP_PORT")]
        port: Option<u16>,
    },

    /// Print an AI analysis of a matchup
    Analyze {
        #[arg(long)]
        home: String,
        #[arg(long)]
        away: String,
        #[arg(long)]
        date: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        let mut argv = vec!["football-ingestion"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).map(|cli| cli.command)
    }

    #[test]
    fn fetch_matches_options() {
        assert_eq!(
            parse(&["fetch-matches", "--date", "2025-03-01", "--important-only"]).unwrap(),
            Command::FetchMatches {
                date: NaiveDate::from_ymd_opt(2025, 3, 1),
                important_only: true,
            }
        );
        assert!(parse(&["fetch-matches", "--date", "01/03/2025"]).is_err());
    }

    #[test]
    fn competition_matches_needs_a_target() {
        assert!(parse(&["fetch-competition-matches"]).is_err());
        assert!(parse(&["fetch-competition-matches", "--api-league-id", "2021", "--all-active"]).is_err());
        assert_eq!(
            parse(&["fetch-competition-matches", "--api-league-id", "2021", "--season", "2024"]).unwrap(),
            Command::FetchCompetitionMatches {
                league_id: None,
                api_league_id: Some(2021),
                all_active: false,
                season: Some(2024),
                delay: None,
            }
        );
    }

    #[test]
    fn positional_league_and_season() {
        assert_eq!(
            parse(&["fetch-teams", "PL", "2024"]).unwrap(),
            Command::FetchTeams {
                api_league_id: "PL".to_string(),
                season: Some(2024),
            }
        );
        assert_eq!(
            parse(&["fetch-league", "2021"]).unwrap(),
            Command::FetchLeague {
                api_league_id: "2021".to_string(),
                season: None,
            }
        );
    }

    #[test]
    fn update_teams_needs_team_or_all() {
        assert!(parse(&["update-teams"]).is_err());
        assert!(matches!(
            parse(&["update-teams", "--all", "--delay", "0"]).unwrap(),
            Command::UpdateTeams { all: true, delay: Some(0), team_id: None }
        ));
    }

    #[test]
    fn sync_stats_selection_is_exclusive() {
        assert!(parse(&["sync-stats", "--league-id", &Uuid::nil().to_string(), "--competition", "Premier"]).is_err());
        assert!(matches!(
            parse(&["sync-stats", "--competition", "Premier", "--force"]).unwrap(),
            Command::SyncStats { force: true, .. }
        ));
    }

    #[test]
    fn import_defaults() {
        assert_eq!(
            parse(&["import"]).unwrap(),
            Command::Import {
                kind: ImportKind::All,
                league: "CL".to_string(),
                season: None,
                delay: None,
            }
        );
        assert!(matches!(
            parse(&["import", "teams", "--league", "PL"]).unwrap(),
            Command::Import { kind: ImportKind::Teams, .. }
        ));
    }
}
