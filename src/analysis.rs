//! AI matchup analysis built from the cached team stats.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{IngestError, Result};
use crate::models::Team;
use crate::stats::{TeamPerformance, TeamStatsSnapshot};
use crate::store::FootballStore;
use crate::upstream::GeminiClient;

const PROVIDER: &str = "generative-language API";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchupRequest {
    #[serde(alias = "local")]
    pub home: String,
    #[serde(alias = "visitante")]
    pub away: String,
    #[serde(default, alias = "fecha")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub home: String,
    pub away: String,
    pub prompt: String,
    pub text: String,
}

/// What the store knows about one side of the matchup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamContext {
    pub query: String,
    pub team: Option<Team>,
    pub snapshot: Option<TeamStatsSnapshot>,
}

impl TeamContext {
    fn display_name(&self) -> &str {
        self.team.as_ref().map(|t| t.name.as_str()).unwrap_or(&self.query)
    }
}

pub async fn team_context<S: FootballStore + ?Sized>(store: &S, query: &str) -> Result<TeamContext> {
    let Some(team) = store.find_team(query).await? else {
        warn!("No stored team matches '{}'", query);
        return Ok(TeamContext {
            query: query.to_string(),
            ..Default::default()
        });
    };

    let snapshot = match store.latest_team_stats(team.id).await? {
        Some(row) => match serde_json::from_value::<TeamStatsSnapshot>(row.stats_json) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Stored stats of {} are unreadable: {}", team.name, e);
                None
            }
        },
        None => None,
    };

    Ok(TeamContext {
        query: query.to_string(),
        team: Some(team),
        snapshot,
    })
}

fn line(out: &mut String, text: impl AsRef<str>) {
    out.push_str(text.as_ref());
    out.push('\n');
}

fn describe_performance(out: &mut String, perf: &TeamPerformance) {
    let s = &perf.summary;
    line(
        out,
        format!(
            "- Record: {} played, {} won, {} drawn, {} lost ({} points, {}% wins)",
            s.played, s.won, s.draw, s.lost, s.points, s.win_percentage
        ),
    );
    line(
        out,
        format!(
            "- Goals: {} for, {} against ({:+}), {} clean sheets, failed to score {} times",
            s.goals_for, s.goals_against, s.goal_difference, s.clean_sheets, s.failed_to_score
        ),
    );
    line(
        out,
        format!(
            "- Home: {}W {}D {}L, {}-{} goals; away: {}W {}D {}L, {}-{} goals",
            perf.home.won,
            perf.home.draw,
            perf.home.lost,
            perf.home.goals_for,
            perf.home.goals_against,
            perf.away.won,
            perf.away.draw,
            perf.away.lost,
            perf.away.goals_for,
            perf.away.goals_against
        ),
    );
    if !perf.form.is_empty() {
        line(out, format!("- Form (most recent first): {}", perf.form));
    }
}

fn describe_team(out: &mut String, side: &str, ctx: &TeamContext) {
    line(out, format!("{} team: {}", side, ctx.display_name()));

    let Some(team) = &ctx.team else {
        line(out, "- Not in our database; no statistics available.");
        return;
    };
    if let Some(venue) = &team.venue_name {
        line(out, format!("- Stadium: {}", venue));
    }

    match ctx.snapshot.as_ref().and_then(TeamStatsSnapshot::performance) {
        Some(perf) => describe_performance(out, perf),
        None => line(out, "- No cached statistics for this team."),
    }
    if let Some(next) = ctx
        .snapshot
        .as_ref()
        .and_then(|s| s.upcoming_matches.first())
        .and_then(|m| m.get("utcDate"))
        .and_then(|d| d.as_str())
    {
        line(out, format!("- Next scheduled match: {}", next));
    }
}

pub fn build_prompt(request: &MatchupRequest, home: &TeamContext, away: &TeamContext) -> String {
    let mut out = String::new();
    line(&mut out, format!("Match: {} vs. {}", home.display_name(), away.display_name()));
    line(
        &mut out,
        format!(
            "Date and time: {}\n",
            request.date.as_deref().unwrap_or("not specified")
        ),
    );

    line(&mut out, "Recent statistics:");
    describe_team(&mut out, "Home", home);
    describe_team(&mut out, "Away", away);

    out.push_str(
        "\nAlso consider, from your own knowledge:\n\
         - Head-to-head: last 5 meetings and results\n\
         - Squads and absences: key injuries or suspensions, formations, standout players\n\
         - External conditions: weather and pitch\n\
         - Bookmaker odds: 1X2, over/under 2.5 goals, Asian handicap, other popular markets\n\
         \n\
         Analysis instructions:\n\
         - Form: compare current level and trend of both teams.\n\
         - Tactics: strengths and weaknesses of each style of play.\n\
         - Absences and rotation: impact of missing key players.\n\
         - Match conditions: influence of weather or pitch.\n\
         - Implied probabilities: convert odds into implied probabilities and adjust them to your estimate of real value.\n\
         - Risk management: state the risk profile of each bet (low, medium, high).\n\
         \n\
         Expected output:\n\
         - Executive summary (2-3 sentences)\n\
         - Detailed analysis in sections: form and statistics; tactics and matchup; absences and squad changes; external factors; value of the odds\n\
         - Betting recommendation: suggested market, average observed odds, estimated probability (%), expected-value justification and confidence level\n\
         - Final verdict: the safest bet for this match and bankroll management advice\n",
    );
    out
}

pub async fn analyze<S: FootballStore + ?Sized>(
    store: &S,
    gemini: &GeminiClient,
    request: &MatchupRequest,
) -> Result<Analysis> {
    if request.home.trim().is_empty() || request.away.trim().is_empty() {
        return Err(IngestError::invalid("both home and away team names are required"));
    }

    let home = team_context(store, request.home.trim()).await?;
    let away = team_context(store, request.away.trim()).await?;
    info!(
        home = home.display_name(),
        away = away.display_name(),
        home_stats = home.snapshot.is_some(),
        away_stats = away.snapshot.is_some(),
        "Building matchup analysis"
    );

    let prompt = build_prompt(request, &home, &away);
    let text = gemini
        .generate(&prompt)
        .await
        .ok_or_else(|| IngestError::no_data(PROVIDER, "matchup analysis"))?;

    Ok(Analysis {
        home: home.display_name().to_string(),
        away: away.display_name().to_string(),
        prompt,
        text,
    })
}
