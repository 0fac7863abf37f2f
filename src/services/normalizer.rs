//! Canonical vocabulary for bookmaker markets and outcome labels.
//!
//! Feeds label the same market in several ways ("Match Winner", "1X2",
//! "Resultado Final"), and outcomes in English, Portuguese or as `1`/`X`/`2`.
//! Everything is reduced to three markets and a fixed set of outcomes; labels
//! outside that vocabulary are simply not classified.

use crate::utils::normalize_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalMarket {
    MatchWinner,
    GoalsOverUnder,
    BothTeamsScore,
}

impl CanonicalMarket {
    pub fn key(self) -> &'static str {
        match self {
            CanonicalMarket::MatchWinner => "match_winner",
            CanonicalMarket::GoalsOverUnder => "goals_over_under",
            CanonicalMarket::BothTeamsScore => "both_teams_score",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Home,
    Draw,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsSide {
    Over,
    Under,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BttsOutcome {
    Yes,
    No,
}

const MATCH_WINNER_ALIASES: &[&str] = &[
    "match_winner",
    "match winner",
    "1x2",
    "full time result",
    "fulltime result",
    "match result",
    "resultado final",
    "resultado do jogo",
    "vencedor",
    "vencedor do jogo",
    "h2h",
];

const OVER_UNDER_ALIASES: &[&str] = &[
    "goals_over_under",
    "goals over/under",
    "over/under",
    "over under",
    "total goals",
    "totals",
    "golos mais/menos",
    "gols mais/menos",
    "mais/menos",
    "total de golos",
    "total de gols",
];

const BTTS_ALIASES: &[&str] = &[
    "both_teams_score",
    "both teams score",
    "both teams to score",
    "btts",
    "ambas marcam",
    "ambos marcam",
    "ambas equipas marcam",
    "ambas as equipas marcam",
];

const HOME_LABELS: &[&str] = &["home", "1", "casa", "home team"];
const DRAW_LABELS: &[&str] = &["draw", "x", "empate", "tie"];
const AWAY_LABELS: &[&str] = &["away", "2", "fora", "away team"];
const YES_LABELS: &[&str] = &["yes", "sim", "y", "s"];
const NO_LABELS: &[&str] = &["no", "nao", "n"];

/// Map a raw market name onto one of the three analysed markets.
pub fn canonical_market(name: &str) -> Option<CanonicalMarket> {
    let normalized = normalize_text(name);
    if MATCH_WINNER_ALIASES.contains(&normalized.as_str()) {
        Some(CanonicalMarket::MatchWinner)
    } else if OVER_UNDER_ALIASES.contains(&normalized.as_str()) {
        Some(CanonicalMarket::GoalsOverUnder)
    } else if BTTS_ALIASES.contains(&normalized.as_str()) {
        Some(CanonicalMarket::BothTeamsScore)
    } else {
        None
    }
}

/// Classify a 1X2 outcome label. Some bookmakers label outcomes with the team
/// names, so those are matched against the fixture's teams as a last resort.
pub fn classify_match_winner(
    label: &str,
    home_team: Option<&str>,
    away_team: Option<&str>,
) -> Option<MatchOutcome> {
    let normalized = normalize_text(label);
    if HOME_LABELS.contains(&normalized.as_str()) {
        return Some(MatchOutcome::Home);
    }
    if DRAW_LABELS.contains(&normalized.as_str()) {
        return Some(MatchOutcome::Draw);
    }
    if AWAY_LABELS.contains(&normalized.as_str()) {
        return Some(MatchOutcome::Away);
    }
    let label_key = team_key(&normalized);
    let exact = |team: Option<&str>| team.is_some_and(|team| !label_key.is_empty() && team_key(team) == label_key);
    match (exact(home_team), exact(away_team)) {
        (true, false) => return Some(MatchOutcome::Home),
        (false, true) => return Some(MatchOutcome::Away),
        (true, true) => return None,
        (false, false) => {}
    }

    // a label contained in both names is ambiguous
    let loose = |team: Option<&str>| team.is_some_and(|team| names_match(&normalized, team));
    match (loose(home_team), loose(away_team)) {
        (true, false) => Some(MatchOutcome::Home),
        (false, true) => Some(MatchOutcome::Away),
        _ => None,
    }
}

/// Over/under 2.5 labels: a direction keyword plus the 2.5 line.
pub fn classify_over_under(label: &str) -> Option<TotalsSide> {
    let normalized = normalize_text(label);
    if !(normalized.contains("2.5") || normalized.contains("25")) {
        return None;
    }
    if normalized.contains("over") || normalized.contains("mais de") {
        Some(TotalsSide::Over)
    } else if normalized.contains("under") || normalized.contains("menos de") {
        Some(TotalsSide::Under)
    } else {
        None
    }
}

pub fn classify_btts(label: &str) -> Option<BttsOutcome> {
    let normalized = normalize_text(label);
    if YES_LABELS.contains(&normalized.as_str()) {
        Some(BttsOutcome::Yes)
    } else if NO_LABELS.contains(&normalized.as_str()) {
        Some(BttsOutcome::No)
    } else {
        None
    }
}

/// Shortest key allowed to match as a substring of a longer name.
const MIN_PARTIAL_KEY: usize = 3;

/// Fuzzy team-name match: strips common club suffixes, then checks contains-both-ways.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = team_key(a);
    let b = team_key(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    short.chars().count() >= MIN_PARTIAL_KEY && long.contains(short.as_str())
}

/// Normalised team name with club suffixes and punctuation removed.
pub fn team_key(name: &str) -> String {
    let lowered = normalize_text(name).replace(['.', '-', '\''], " ");
    lowered
        .split_whitespace()
        .filter(|token| !matches!(*token, "fc" | "afc" | "sc" | "cf" | "sad"))
        .collect::<Vec<_>>()
        .join(" ")
}
