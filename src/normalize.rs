//! Status and field normalization.
//!
//! Turns the two providers' payloads into one canonical shape: a closed set
//! of match statuses, and provider-neutral records for leagues, seasons,
//! teams, people and fixtures. Only the identifiers without which a record
//! is meaningless are required; every other field defaults to `None`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IngestError, Result};
use crate::upstream::api_sports::{AsFixtureItem, AsLeague, AsTeam};
use crate::upstream::football_data::{FdArea, FdCompetition, FdMatch, FdPerson, FdSeason, FdTeam};
use crate::upstream::Provider;

/// Upper bound for the derived elapsed minute of a football-data live match.
const MAX_DERIVED_ELAPSED: i64 = 100;

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Halftime,
    Break,
    Penalty,
    Finished,
    Suspended,
    Interrupted,
    Postponed,
    Canceled,
    Abandoned,
    Awarded,
    Walkover,
    Unknown,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 14] = [
        MatchStatus::Scheduled,
        MatchStatus::Live,
        MatchStatus::Halftime,
        MatchStatus::Break,
        MatchStatus::Penalty,
        MatchStatus::Finished,
        MatchStatus::Suspended,
        MatchStatus::Interrupted,
        MatchStatus::Postponed,
        MatchStatus::Canceled,
        MatchStatus::Abandoned,
        MatchStatus::Awarded,
        MatchStatus::Walkover,
        MatchStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Halftime => "halftime",
            MatchStatus::Break => "break",
            MatchStatus::Penalty => "penalty",
            MatchStatus::Finished => "finished",
            MatchStatus::Suspended => "suspended",
            MatchStatus::Interrupted => "interrupted",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Canceled => "canceled",
            MatchStatus::Abandoned => "abandoned",
            MatchStatus::Awarded => "awarded",
            MatchStatus::Walkover => "walkover",
            MatchStatus::Unknown => "unknown",
        }
    }

    /// Ball in play or a pause within the match.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            MatchStatus::Live | MatchStatus::Halftime | MatchStatus::Break | MatchStatus::Penalty
        )
    }

    /// Read a stored status. Anything unrecognised is `Unknown`.
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or(MatchStatus::Unknown)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognisedStatus(pub String);

impl fmt::Display for UnrecognisedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised match status '{}'", self.0)
    }
}

impl std::error::Error for UnrecognisedStatus {}

impl FromStr for MatchStatus {
    type Err = UnrecognisedStatus;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        MatchStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| UnrecognisedStatus(s.to_string()))
    }
}

/// football-data.org status code to canonical status.
pub fn football_data_status(code: &str) -> MatchStatus {
    match code.trim().to_ascii_uppercase().as_str() {
        "SCHEDULED" | "TIMED" => MatchStatus::Scheduled,
        "IN_PLAY" | "LIVE" => MatchStatus::Live,
        "PAUSED" => MatchStatus::Halftime,
        "FINISHED" => MatchStatus::Finished,
        "SUSPENDED" => MatchStatus::Suspended,
        "POSTPONED" => MatchStatus::Postponed,
        "CANCELLED" => MatchStatus::Canceled,
        "AWARDED" => MatchStatus::Awarded,
        _ => MatchStatus::Unknown,
    }
}

/// api-sports.io short status code to canonical status.
pub fn api_sports_status(code: &str) -> MatchStatus {
    match code.trim().to_ascii_uppercase().as_str() {
        "NS" | "TBD" => MatchStatus::Scheduled,
        "1H" | "2H" | "ET" => MatchStatus::Live,
        "HT" => MatchStatus::Halftime,
        "BT" => MatchStatus::Break,
        "P" => MatchStatus::Penalty,
        "FT" | "AET" | "PEN" => MatchStatus::Finished,
        "SUSP" => MatchStatus::Suspended,
        "INT" => MatchStatus::Interrupted,
        "PST" => MatchStatus::Postponed,
        "CANC" => MatchStatus::Canceled,
        "ABD" => MatchStatus::Abandoned,
        "AWD" => MatchStatus::Awarded,
        "WO" => MatchStatus::Walkover,
        _ => MatchStatus::Unknown,
    }
}

// ============================================================================
// Dates
// ============================================================================

/// RFC 3339, a naive timestamp taken as UTC, or a bare date at midnight UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    let date = parse_date(value)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// `YYYY-MM-DD`, the date part of a timestamp, or `YYYY-MM` (first of month).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if value.len() >= 10 {
        if let Some(prefix) = value.get(..10) {
            if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
                return Some(date);
            }
        }
    }
    NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").ok()
}

fn opt_date(value: Option<&String>) -> Option<NaiveDate> {
    value.and_then(|v| parse_date(v))
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Canonical records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountryRef {
    pub name: String,
    pub code: Option<String>,
    pub flag: Option<String>,
}

impl CountryRef {
    pub fn from_fd_area(area: &FdArea) -> Option<Self> {
        Some(Self {
            name: non_blank(area.name.as_ref())?,
            code: non_blank(area.code.as_ref()),
            flag: non_blank(area.flag.as_ref()),
        })
    }

    /// api-sports gives the country as a name plus a flag URL whose file stem
    /// is the country code (`.../flags/gb.svg`).
    pub fn from_api_sports(name: Option<&String>, flag: Option<&String>) -> Option<Self> {
        let flag = non_blank(flag);
        Some(Self {
            name: non_blank(name)?,
            code: flag.as_deref().and_then(flag_code),
            flag,
        })
    }
}

fn flag_code(url: &str) -> Option<String> {
    let file = url.rsplit('/').next()?;
    let stem = file.split('.').next()?;
    if stem.is_empty() || stem.len() > 6 || !stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    Some(stem.to_ascii_lowercase())
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeagueRef {
    pub api_id: Option<i64>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub league_type: Option<String>,
    pub logo: Option<String>,
    pub country: Option<CountryRef>,
    pub current_matchday: Option<i32>,
    pub raw: Option<Value>,
}

impl LeagueRef {
    pub fn from_fd_competition(competition: &FdCompetition, raw: Option<Value>) -> Self {
        Self {
            api_id: competition.id,
            name: non_blank(competition.name.as_ref()),
            code: non_blank(competition.code.as_ref()),
            league_type: competition.competition_type.as_deref().map(league_type),
            logo: non_blank(competition.emblem.as_ref()),
            country: competition.area.as_ref().and_then(CountryRef::from_fd_area),
            current_matchday: competition
                .current_season
                .as_ref()
                .and_then(|s| s.current_matchday),
            raw,
        }
    }

    pub fn from_api_sports(league: &AsLeague, raw: Option<Value>) -> Self {
        Self {
            api_id: league.id,
            name: non_blank(league.name.as_ref()),
            code: None,
            league_type: league.league_type.as_deref().map(league_type),
            logo: non_blank(league.logo.as_ref()),
            country: CountryRef::from_api_sports(league.country.as_ref(), league.flag.as_ref()),
            current_matchday: None,
            raw,
        }
    }

    pub fn is_identifiable(&self) -> bool {
        self.api_id.is_some() || self.name.is_some()
    }
}

/// `League`, `cup`, `LEAGUE_CUP` etc. to the stored upper-case form.
pub fn league_type(value: &str) -> String {
    value.trim().replace(' ', "_").to_ascii_uppercase()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeasonRef {
    pub year: i32,
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub current_matchday: Option<i32>,
    pub current: Option<bool>,
}

impl SeasonRef {
    /// Year from the start date, then the end date, then `fallback_year`.
    pub fn from_fd_season(season: Option<&FdSeason>, fallback_year: Option<i32>) -> Option<Self> {
        let start_date = season.and_then(|s| opt_date(s.start_date.as_ref()));
        let end_date = season.and_then(|s| opt_date(s.end_date.as_ref()));
        let year = start_date
            .map(|d| d.year())
            .or_else(|| end_date.map(|d| d.year()))
            .or(fallback_year)?;
        let current_matchday = season.and_then(|s| s.current_matchday);

        Some(Self {
            year,
            name: Some(season_name(start_date, end_date, year)),
            start_date,
            end_date,
            current_matchday,
            current: season.map(|_| current_matchday.is_some()),
        })
    }

    pub fn for_year(year: i32) -> Self {
        Self {
            year,
            name: Some(year.to_string()),
            ..Default::default()
        }
    }
}

fn season_name(start: Option<NaiveDate>, end: Option<NaiveDate>, year: i32) -> String {
    match (start, end) {
        (Some(s), Some(e)) if e.year() != s.year() => format!("{}/{}", s.year(), e.year()),
        _ => year.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TeamRef {
    pub api_id: Option<i64>,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub tla: Option<String>,
    pub logo: Option<String>,
    pub country: Option<CountryRef>,
    pub founded: Option<i32>,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub club_colors: Option<String>,
    pub raw: Option<Value>,
}

impl TeamRef {
    pub fn from_fd_team(team: &FdTeam, raw: Option<Value>) -> Self {
        Self {
            api_id: team.id,
            name: non_blank(team.name.as_ref()),
            short_name: non_blank(team.short_name.as_ref()),
            tla: non_blank(team.tla.as_ref()),
            logo: non_blank(team.crest.as_ref()),
            country: team.area.as_ref().and_then(CountryRef::from_fd_area),
            founded: team.founded,
            venue_name: non_blank(team.venue.as_ref()),
            address: non_blank(team.address.as_ref()),
            website: non_blank(team.website.as_ref()),
            club_colors: non_blank(team.club_colors.as_ref()),
            raw,
        }
    }

    pub fn from_api_sports(team: &AsTeam, raw: Option<Value>) -> Self {
        Self {
            api_id: team.id,
            name: non_blank(team.name.as_ref()),
            logo: non_blank(team.logo.as_ref()),
            raw,
            ..Default::default()
        }
    }
}

/// A squad member or coach.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersonRef {
    pub api_id: Option<i64>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub shirt_number: Option<i32>,
    pub market_value: Option<i64>,
    pub contract_start: Option<NaiveDate>,
    pub contract_until: Option<NaiveDate>,
    pub raw: Option<Value>,
}

impl PersonRef {
    pub fn from_fd_person(person: &FdPerson, raw: Option<Value>) -> Self {
        let contract = person.contract.as_ref();
        let name = non_blank(person.name.as_ref()).or_else(|| {
            let parts: Vec<&str> = [person.first_name.as_deref(), person.last_name.as_deref()]
                .into_iter()
                .flatten()
                .filter(|p| !p.trim().is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        });

        Self {
            api_id: person.id,
            name,
            first_name: non_blank(person.first_name.as_ref()),
            last_name: non_blank(person.last_name.as_ref()),
            position: non_blank(person.position.as_ref()),
            date_of_birth: opt_date(person.date_of_birth.as_ref()),
            nationality: non_blank(person.nationality.as_ref()),
            shirt_number: person.shirt_number,
            market_value: person.market_value,
            contract_start: contract.and_then(|c| opt_date(c.start.as_ref())),
            contract_until: contract.and_then(|c| opt_date(c.until.as_ref())),
            raw,
        }
    }
}

/// A fixture in provider-neutral form, ready for the match upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFixture {
    pub provider: Provider,
    pub api_fixture_id: i64,
    pub league: LeagueRef,
    pub season: SeasonRef,
    pub home: TeamRef,
    pub away: TeamRef,
    pub kickoff: Option<DateTime<Utc>>,
    /// `None` when the payload carries no status code at all.
    pub status: Option<MatchStatus>,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
    pub home_halftime_goals: Option<i32>,
    pub away_halftime_goals: Option<i32>,
    pub elapsed: Option<i32>,
    pub venue: Option<String>,
    pub referee: Option<String>,
    pub round: Option<String>,
    pub stats: Option<Value>,
    pub events: Option<Value>,
    pub lineups: Option<Value>,
    pub raw: Value,
}

impl CanonicalFixture {
    /// Build from one entry of a football-data `matches` list.
    ///
    /// `competition_hint` is the page-level competition, used when the match
    /// itself carries none.
    pub fn from_football_data(
        raw: &Value,
        competition_hint: Option<&FdCompetition>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let fd: FdMatch = serde_json::from_value(raw.clone())?;

        let api_fixture_id = fd
            .id
            .ok_or_else(|| IngestError::invalid("football-data match without id"))?;
        let home_team = fd.home_team.as_ref().filter(|t| t.id.is_some()).ok_or_else(|| {
            IngestError::invalid(format!("match {} has no home team id", api_fixture_id))
        })?;
        let away_team = fd.away_team.as_ref().filter(|t| t.id.is_some()).ok_or_else(|| {
            IngestError::invalid(format!("match {} has no away team id", api_fixture_id))
        })?;

        let kickoff = fd.utc_date.as_deref().and_then(parse_datetime);
        let status = fd.status.as_deref().map(football_data_status);

        let league = match fd.competition.as_ref() {
            Some(competition) => {
                let mut league =
                    LeagueRef::from_fd_competition(competition, raw.get("competition").cloned());
                if league.country.is_none() {
                    league.country = fd.area.as_ref().and_then(CountryRef::from_fd_area);
                }
                if league.current_matchday.is_none() {
                    league.current_matchday = fd.season.as_ref().and_then(|s| s.current_matchday);
                }
                league
            }
            None => competition_hint
                .map(|c| LeagueRef::from_fd_competition(c, None))
                .unwrap_or_default(),
        };

        let season = SeasonRef::from_fd_season(fd.season.as_ref(), kickoff.map(|k| k.year()))
            .ok_or_else(|| {
                IngestError::invalid(format!(
                    "match {} has no season dates and no kickoff",
                    api_fixture_id
                ))
            })?;

        let score = fd.score.as_ref();
        let full_time = score.and_then(|s| s.full_time.as_ref());
        let half_time = score.and_then(|s| s.half_time.as_ref());
        let referee = fd.referees.iter().find_map(|r| non_blank(r.name.as_ref()));

        Ok(Self {
            provider: Provider::FootballData,
            api_fixture_id,
            league,
            season,
            home: TeamRef::from_fd_team(home_team, raw.get("homeTeam").cloned()),
            away: TeamRef::from_fd_team(away_team, raw.get("awayTeam").cloned()),
            kickoff,
            status,
            home_goals: full_time.and_then(|g| g.home),
            away_goals: full_time.and_then(|g| g.away),
            home_halftime_goals: half_time.and_then(|g| g.home),
            away_halftime_goals: half_time.and_then(|g| g.away),
            elapsed: status.and_then(|s| derived_elapsed(s, kickoff, now)),
            venue: non_blank(fd.venue.as_ref()),
            referee,
            round: fd
                .matchday
                .map(|m| m.to_string())
                .or_else(|| non_blank(fd.stage.as_ref())),
            stats: None,
            events: None,
            lineups: None,
            raw: raw.clone(),
        })
    }

    /// Build from one entry of an api-sports `fixtures` response.
    pub fn from_api_sports(raw: &Value) -> Result<Self> {
        let item: AsFixtureItem = serde_json::from_value(raw.clone())?;

        let fixture = item.fixture.as_ref();
        let api_fixture_id = fixture
            .and_then(|f| f.id)
            .ok_or_else(|| IngestError::invalid("api-sports fixture without id"))?;
        let teams = item.teams.as_ref();
        let home_team = teams.and_then(|t| t.home.as_ref()).filter(|t| t.id.is_some()).ok_or_else(|| {
            IngestError::invalid(format!("fixture {} has no home team id", api_fixture_id))
        })?;
        let away_team = teams.and_then(|t| t.away.as_ref()).filter(|t| t.id.is_some()).ok_or_else(|| {
            IngestError::invalid(format!("fixture {} has no away team id", api_fixture_id))
        })?;

        let kickoff = fixture.and_then(|f| f.date.as_deref()).and_then(parse_datetime);
        let status_block = fixture.and_then(|f| f.status.as_ref());
        let status = status_block
            .and_then(|s| s.short.as_deref())
            .map(api_sports_status);

        let league = item
            .league
            .as_ref()
            .map(|l| LeagueRef::from_api_sports(l, raw.get("league").cloned()))
            .unwrap_or_default();
        let year = item
            .league
            .as_ref()
            .and_then(|l| l.season)
            .or_else(|| kickoff.map(|k| k.year()))
            .ok_or_else(|| {
                IngestError::invalid(format!(
                    "fixture {} has no season and no kickoff",
                    api_fixture_id
                ))
            })?;

        let goals = item.goals.as_ref();
        let half_time = item.score.as_ref().and_then(|s| s.halftime.as_ref());
        let venue = fixture
            .and_then(|f| f.venue.as_ref())
            .and_then(|v| non_blank(v.name.as_ref()));

        Ok(Self {
            provider: Provider::ApiSports,
            api_fixture_id,
            league,
            season: SeasonRef::for_year(year),
            home: TeamRef::from_api_sports(home_team, raw.pointer("/teams/home").cloned()),
            away: TeamRef::from_api_sports(away_team, raw.pointer("/teams/away").cloned()),
            kickoff,
            status,
            home_goals: goals.and_then(|g| g.home),
            away_goals: goals.and_then(|g| g.away),
            home_halftime_goals: half_time.and_then(|g| g.home),
            away_halftime_goals: half_time.and_then(|g| g.away),
            elapsed: status_block.and_then(|s| s.elapsed),
            venue,
            referee: fixture.and_then(|f| non_blank(f.referee.as_ref())),
            round: item.league.as_ref().and_then(|l| non_blank(l.round.as_ref())),
            stats: item.statistics.clone().filter(|v| !v.is_null()),
            events: item.events.clone().filter(|v| !v.is_null()),
            lineups: item.lineups.clone().filter(|v| !v.is_null()),
            raw: raw.clone(),
        })
    }
}

/// football-data does not report the running minute; derive it for live
/// matches from the kickoff time.
fn derived_elapsed(status: MatchStatus, kickoff: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i32> {
    if status != MatchStatus::Live {
        return None;
    }
    let minutes = (now - kickoff?).num_minutes().clamp(0, MAX_DERIVED_ELAPSED);
    i32::try_from(minutes).ok()
}
