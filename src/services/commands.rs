use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{AnalyzedMatch, MatchRecord};
use crate::services::normalizer::{names_match, team_key};
use crate::services::predictor::PredictionEngine;

pub const COMMAND_ALIASES: [&str; 4] = ["/insight", "/insights", "/analise", "/analisar"];

/// Minimum Jaro-Winkler similarity for a query to name a team.
const TEAM_SIMILARITY: f64 = 0.85;

static WORD_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:vs\.?|v|x|-)\s+").expect("separator pattern is valid"));

pub const REFUSED: &str = "Este comando é reservado ao owner.";
pub const MISSING_QUERY: &str = "Forneça o nome de uma equipa ou o confronto (ex.: city-psg).";
pub const PAIR_NOT_FOUND: &str = "Não encontrei um confronto agendado entre as equipas.";

/// Split a chat message into `(command, query)` when it is one of the insight commands.
/// `"/analise@bot Benfica"` -> `("/analise", "Benfica")`.
pub fn extract_command(text: &str) -> Option<(String, String)> {
    let stripped = text.trim();
    if !stripped.starts_with('/') {
        return None;
    }
    let first = stripped.split_whitespace().next()?;
    let command = first.split('@').next().unwrap_or(first).to_lowercase();
    if !COMMAND_ALIASES.contains(&command.as_str()) {
        return None;
    }
    Some((command, stripped[first.len()..].trim().to_string()))
}

pub fn is_allowed(user_id: Option<i64>, allowed: &[i64]) -> bool {
    user_id.is_some_and(|id| allowed.contains(&id))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureQuery {
    Team(String),
    Pair(String, String),
}

/// Readings of a query, most specific first. `"city-psg"` is tried as a pair and
/// then as one hyphenated name.
pub fn parse_query(query: &str) -> Vec<FixtureQuery> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let mut readings = Vec::new();
    let spaced: Vec<&str> = WORD_SEPARATOR_RE.splitn(query, 2).map(str::trim).collect();
    if let [first, second] = spaced.as_slice() {
        if !first.is_empty() && !second.is_empty() {
            readings.push(FixtureQuery::Pair(first.to_string(), second.to_string()));
        }
    } else if let Some((first, second)) = query.split_once('-') {
        let (first, second) = (first.trim(), second.trim());
        if !first.is_empty() && !second.is_empty() {
            readings.push(FixtureQuery::Pair(first.to_string(), second.to_string()));
        }
    }
    if readings.is_empty() || !WORD_SEPARATOR_RE.is_match(query) {
        readings.push(FixtureQuery::Team(query.to_string()));
    }
    readings
}

fn similarity(query: &str, name: &str) -> f64 {
    if names_match(query, name) {
        return 1.0;
    }
    strsim::jaro_winkler(&team_key(query), &team_key(name))
}

fn team_score(query: &str, name: Option<&str>) -> Option<f64> {
    let score = similarity(query, name?);
    (score >= TEAM_SIMILARITY).then_some(score)
}

fn best<'a>(scored: impl Iterator<Item = (f64, &'a MatchRecord)>) -> Option<&'a MatchRecord> {
    // the earliest fixture wins ties
    scored
        .fold(None, |best: Option<(f64, &MatchRecord)>, (score, record)| match best {
            Some((top, _)) if top >= score => best,
            _ => Some((score, record)),
        })
        .map(|(_, record)| record)
}

/// Fixture of the day that the query names, matching team names loosely.
pub fn locate_fixture<'a>(query: &FixtureQuery, matches: &'a [MatchRecord]) -> Option<&'a MatchRecord> {
    match query {
        FixtureQuery::Team(team) => best(matches.iter().filter_map(|record| {
            let home = team_score(team, record.teams.home.name.as_deref());
            let away = team_score(team, record.teams.away.name.as_deref());
            let score = match (home, away) {
                (Some(home), Some(away)) => Some(home.max(away)),
                (home, away) => home.or(away),
            };
            score.map(|score| (score, record))
        })),
        FixtureQuery::Pair(first, second) => best(matches.iter().filter_map(|record| {
            let home = record.teams.home.name.as_deref();
            let away = record.teams.away.name.as_deref();
            let straight = team_score(first, home).zip(team_score(second, away));
            let reversed = team_score(first, away).zip(team_score(second, home));
            straight
                .or(reversed)
                .map(|(a, b)| (a + b, record))
        })),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Refused,
    MissingQuery,
    NotFound(FixtureQuery),
    Insight(Box<AnalyzedMatch>),
}

/// Answer an insight query against the day's fixtures.
pub fn answer(query: &str, matches: &[MatchRecord]) -> Reply {
    let readings = parse_query(query);
    let Some(last) = readings.last().cloned() else {
        return Reply::MissingQuery;
    };
    for reading in &readings {
        if let Some(record) = locate_fixture(reading, matches) {
            tracing::info!("Owner query {:?} resolved to fixture {:?}", query, record.fixture_id);
            return Reply::Insight(Box::new(PredictionEngine::new().analyze_match(record)));
        }
    }
    Reply::NotFound(last)
}

impl Reply {
    pub fn text(&self) -> String {
        match self {
            Reply::Refused => REFUSED.to_string(),
            Reply::MissingQuery => MISSING_QUERY.to_string(),
            Reply::NotFound(FixtureQuery::Team(team)) => {
                format!("Não encontrei a equipa '{}'.", crate::utils::escape_html(team))
            }
            Reply::NotFound(FixtureQuery::Pair(..)) => PAIR_NOT_FOUND.to_string(),
            Reply::Insight(analyzed) => crate::services::message_builder::format_match_insight(analyzed),
        }
    }
}
