//! Team performance aggregation and the cached stats snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::normalize::{parse_date, parse_datetime};
use crate::upstream::football_data::{FdMatch, FdTeam, TeamMatchFilter};
use crate::upstream::FootballDataClient;

const FORM_LENGTH: usize = 5;
const HISTORY_LIMIT: u32 = 20;
const UPCOMING_LIMIT: u32 = 5;

/// Season a date belongs to: seasons start in July.
pub fn season_for_date(date: NaiveDate) -> i32 {
    if date.month() >= 7 {
        date.year()
    } else {
        date.year() - 1
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(f64::from(part) / f64::from(whole))
    }
}

fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(f64::from(part) / f64::from(whole) * 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    fn letter(self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Draw => 'D',
            Outcome::Loss => 'L',
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Record {
    pub played: u32,
    pub won: u32,
    pub draw: u32,
    pub lost: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl Record {
    fn add(&mut self, outcome: Outcome, goals_for: u32, goals_against: u32) {
        self.played += 1;
        match outcome {
            Outcome::Win => self.won += 1,
            Outcome::Draw => self.draw += 1,
            Outcome::Loss => self.lost += 1,
        }
        self.goals_for += goals_for;
        self.goals_against += goals_against;
    }

    pub fn points(&self) -> u32 {
        self.won * 3 + self.draw
    }

    pub fn win_percentage(&self) -> f64 {
        percentage(self.won, self.played)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Summary {
    pub played: u32,
    pub won: u32,
    pub draw: u32,
    pub lost: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub goal_difference: i64,
    pub points: u32,
    pub win_percentage: f64,
    pub draw_percentage: f64,
    pub loss_percentage: f64,
    pub clean_sheets: u32,
    pub clean_sheet_percentage: f64,
    pub failed_to_score: u32,
    pub failed_to_score_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Averages {
    pub goals_for_per_game: f64,
    pub goals_against_per_game: f64,
    pub points_per_game: f64,
    pub goals_for_per_game_home: f64,
    pub goals_against_per_game_home: f64,
    pub goals_for_per_game_away: f64,
    pub goals_against_per_game_away: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Streaks {
    /// Positive for consecutive wins, negative for consecutive losses.
    pub current: i32,
    pub longest_win: u32,
    pub longest_lose: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Margin {
    pub margin: u32,
    pub match_id: Option<i64>,
    pub opponent: Option<String>,
    pub score: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Records {
    pub biggest_win: Option<Margin>,
    pub biggest_defeat: Option<Margin>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TeamPerformance {
    pub summary: Summary,
    pub averages: Averages,
    pub home: Record,
    pub away: Record,
    pub streaks: Streaks,
    pub records: Records,
    /// Last five results, most recent first (`WDLWW`).
    pub form: String,
    pub by_season: BTreeMap<String, Record>,
    pub by_month: BTreeMap<String, Record>,
}

struct Played {
    match_id: Option<i64>,
    kickoff: Option<DateTime<Utc>>,
    season: Option<String>,
    is_home: bool,
    goals_for: u32,
    goals_against: u32,
    opponent: Option<String>,
}

impl TeamPerformance {
    /// Aggregate the finished matches among `matches` from the point of view
    /// of `team_api_id`. Entries that cannot be read or do not involve the
    /// team are ignored.
    pub fn from_matches(matches: &[Value], team_api_id: i64) -> Self {
        let mut played: Vec<Played> = matches
            .iter()
            .filter_map(|raw| serde_json::from_value::<FdMatch>(raw.clone()).ok())
            .filter(|m| m.status.as_deref() == Some("FINISHED"))
            .filter_map(|m| Self::perspective(&m, team_api_id))
            .collect();
        played.sort_by_key(|p| p.kickoff);

        let mut perf = TeamPerformance::default();
        let mut total = Record::default();
        let mut results = Vec::with_capacity(played.len());

        for game in &played {
            let outcome = match game.goals_for.cmp(&game.goals_against) {
                std::cmp::Ordering::Greater => Outcome::Win,
                std::cmp::Ordering::Less => Outcome::Loss,
                std::cmp::Ordering::Equal => Outcome::Draw,
            };
            results.push(outcome);
            total.add(outcome, game.goals_for, game.goals_against);
            if game.is_home {
                perf.home.add(outcome, game.goals_for, game.goals_against);
            } else {
                perf.away.add(outcome, game.goals_for, game.goals_against);
            }

            if game.goals_against == 0 {
                perf.summary.clean_sheets += 1;
            }
            if game.goals_for == 0 {
                perf.summary.failed_to_score += 1;
            }

            let streaks = &mut perf.streaks;
            match outcome {
                Outcome::Win => {
                    streaks.current = if streaks.current > 0 { streaks.current + 1 } else { 1 };
                    streaks.longest_win = streaks.longest_win.max(streaks.current.unsigned_abs());
                    Self::track_margin(&mut perf.records.biggest_win, game, game.goals_for - game.goals_against);
                }
                Outcome::Loss => {
                    streaks.current = if streaks.current < 0 { streaks.current - 1 } else { -1 };
                    streaks.longest_lose = streaks.longest_lose.max(streaks.current.unsigned_abs());
                    Self::track_margin(&mut perf.records.biggest_defeat, game, game.goals_against - game.goals_for);
                }
                Outcome::Draw => streaks.current = 0,
            }

            if let Some(season) = &game.season {
                perf.by_season
                    .entry(season.clone())
                    .or_default()
                    .add(outcome, game.goals_for, game.goals_against);
            }
            if let Some(kickoff) = game.kickoff {
                perf.by_month
                    .entry(kickoff.format("%Y-%m").to_string())
                    .or_default()
                    .add(outcome, game.goals_for, game.goals_against);
            }
        }

        perf.form = results
            .iter()
            .rev()
            .take(FORM_LENGTH)
            .map(|o| o.letter())
            .collect();

        let summary = &mut perf.summary;
        summary.played = total.played;
        summary.won = total.won;
        summary.draw = total.draw;
        summary.lost = total.lost;
        summary.goals_for = total.goals_for;
        summary.goals_against = total.goals_against;
        summary.goal_difference = i64::from(total.goals_for) - i64::from(total.goals_against);
        summary.points = total.points();
        summary.win_percentage = percentage(total.won, total.played);
        summary.draw_percentage = percentage(total.draw, total.played);
        summary.loss_percentage = percentage(total.lost, total.played);
        summary.clean_sheet_percentage = percentage(summary.clean_sheets, total.played);
        summary.failed_to_score_percentage = percentage(summary.failed_to_score, total.played);

        perf.averages = Averages {
            goals_for_per_game: ratio(total.goals_for, total.played),
            goals_against_per_game: ratio(total.goals_against, total.played),
            points_per_game: ratio(total.points(), total.played),
            goals_for_per_game_home: ratio(perf.home.goals_for, perf.home.played),
            goals_against_per_game_home: ratio(perf.home.goals_against, perf.home.played),
            goals_for_per_game_away: ratio(perf.away.goals_for, perf.away.played),
            goals_against_per_game_away: ratio(perf.away.goals_against, perf.away.played),
        };

        perf
    }

    fn perspective(m: &FdMatch, team_api_id: i64) -> Option<Played> {
        let home_id = m.home_team.as_ref().and_then(|t| t.id);
        let away_id = m.away_team.as_ref().and_then(|t| t.id);
        let is_home = if home_id == Some(team_api_id) {
            true
        } else if away_id == Some(team_api_id) {
            false
        } else {
            return None;
        };

        let full_time = m.score.as_ref().and_then(|s| s.full_time.as_ref());
        let home_goals = full_time.and_then(|g| g.home).unwrap_or(0).max(0).unsigned_abs();
        let away_goals = full_time.and_then(|g| g.away).unwrap_or(0).max(0).unsigned_abs();
        let kickoff = m.utc_date.as_deref().and_then(parse_datetime);
        let season = m
            .season
            .as_ref()
            .and_then(|s| s.start_date.as_deref())
            .and_then(parse_date)
            .map(|d| d.year())
            .or_else(|| kickoff.map(|k| k.year()))
            .map(|y| y.to_string());
        let opponent = if is_home { &m.away_team } else { &m.home_team };

        Some(Played {
            match_id: m.id,
            kickoff,
            season,
            is_home,
            goals_for: if is_home { home_goals } else { away_goals },
            goals_against: if is_home { away_goals } else { home_goals },
            opponent: opponent.as_ref().and_then(|t| t.name.clone()),
        })
    }

    fn track_margin(slot: &mut Option<Margin>, game: &Played, margin: u32) {
        let current = slot.as_ref().map(|m| m.margin).unwrap_or(0);
        if margin > current {
            *slot = Some(Margin {
                margin,
                match_id: game.match_id,
                opponent: game.opponent.clone(),
                score: Some(format!("{}-{}", game.goals_for, game.goals_against)),
            });
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TeamInfo {
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
    pub coach: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrentSeasonStats {
    pub year: i32,
    /// Upstream id of the competition the season stats were taken from.
    pub league_id: Option<i64>,
    pub league_name: Option<String>,
    pub stats: Option<TeamPerformance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct History {
    pub performance: Option<TeamPerformance>,
    pub matches: Vec<Value>,
}

/// Everything cached for a team: stored as `team_stats.stats_json` and read
/// back by the analysis prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TeamStatsSnapshot {
    pub team: TeamInfo,
    pub competitions: Vec<Value>,
    pub current_season: CurrentSeasonStats,
    pub history: History,
    pub squad: Option<Value>,
    pub upcoming_matches: Vec<Value>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl TeamStatsSnapshot {
    /// Assemble a snapshot from already fetched parts.
    pub fn assemble(
        team_raw: &Value,
        season_year: i32,
        season_matches: Option<&[Value]>,
        history: Vec<Value>,
        upcoming: Vec<Value>,
        generated_at: DateTime<Utc>,
    ) -> Option<Self> {
        let team: FdTeam = serde_json::from_value(team_raw.clone()).ok()?;
        let team_api_id = team.id?;
        let main_competition = team.running_competitions.first();

        Some(Self {
            team: TeamInfo {
                id: team.id,
                name: team.name.clone(),
                short_name: team.short_name.clone(),
                tla: team.tla.clone(),
                crest: team.crest.clone(),
                address: team.address.clone(),
                website: team.website.clone(),
                founded: team.founded,
                club_colors: team.club_colors.clone(),
                venue: team.venue.clone(),
                coach: team_raw.get("coach").cloned().filter(|c| !c.is_null()),
            },
            competitions: team_raw
                .get("runningCompetitions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            current_season: CurrentSeasonStats {
                year: season_year,
                league_id: main_competition.and_then(|c| c.id),
                league_name: main_competition.and_then(|c| c.name.clone()),
                stats: season_matches.map(|m| TeamPerformance::from_matches(m, team_api_id)),
            },
            history: History {
                performance: (!history.is_empty())
                    .then(|| TeamPerformance::from_matches(&history, team_api_id)),
                matches: history,
            },
            squad: team_raw.get("squad").cloned().filter(|s| !s.is_null()),
            upcoming_matches: upcoming,
            generated_at: Some(generated_at),
        })
    }

    /// Fetch everything needed for a team's snapshot from football-data.
    /// `None` when the team itself cannot be fetched.
    pub async fn fetch(client: &FootballDataClient, team_api_id: i64, now: DateTime<Utc>) -> Option<Self> {
        let Some(team_raw) = client.team(team_api_id).await else {
            warn!("Could not fetch team {} from football-data.org", team_api_id);
            return None;
        };
        let season_year = season_for_date(now.date_naive());

        let main_competition = team_raw
            .pointer("/runningCompetitions/0/id")
            .and_then(Value::as_i64);
        let season_matches = match main_competition {
            Some(competition) => {
                client
                    .team_matches(
                        team_api_id,
                        &TeamMatchFilter {
                            season: Some(season_year),
                            competitions: Some(competition),
                            ..Default::default()
                        },
                    )
                    .await
            }
            None => None,
        };
        let history = client
            .team_matches(
                team_api_id,
                &TeamMatchFilter {
                    status: Some("FINISHED".to_string()),
                    limit: Some(HISTORY_LIMIT),
                    ..Default::default()
                },
            )
            .await
            .unwrap_or_default();
        let upcoming = client
            .team_matches(
                team_api_id,
                &TeamMatchFilter {
                    status: Some("SCHEDULED".to_string()),
                    limit: Some(UPCOMING_LIMIT),
                    ..Default::default()
                },
            )
            .await
            .unwrap_or_default();

        let snapshot = Self::assemble(
            &team_raw,
            season_year,
            season_matches.as_deref(),
            history,
            upcoming,
            now,
        )?;
        let squad_size = snapshot.squad_size();
        info!(
            "Built stats snapshot for team {} ({} historical matches, squad of {})",
            team_api_id,
            snapshot.history.matches.len(),
            squad_size
        );
        Some(snapshot)
    }

    pub fn squad_size(&self) -> usize {
        self.squad.as_ref().and_then(Value::as_array).map_or(0, Vec::len)
    }

    /// Best available performance: current season, else recent history.
    pub fn performance(&self) -> Option<&TeamPerformance> {
        self.current_season
            .stats
            .as_ref()
            .filter(|p| p.summary.played > 0)
            .or(self.history.performance.as_ref())
    }
}
