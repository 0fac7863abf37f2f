use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::{lenient_number, null_as_default, string_or_number};

// ── Match input ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    #[serde(default)]
    pub fixture_id: Option<i64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub competition: CompetitionInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub teams: MatchTeams,
    #[serde(default, deserialize_with = "null_as_default")]
    pub odds: Vec<OddsMarket>,
    #[serde(default, alias = "forebet")]
    pub third_party: Option<ThirdPartyPrediction>,
    #[serde(default, rename = "vendorPrediction", alias = "apiFootballPrediction")]
    pub vendor: Option<VendorPrediction>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub form: MatchForm,
}

impl MatchRecord {
    pub fn home_name(&self) -> &str {
        self.teams.home.name.as_deref().unwrap_or("Casa")
    }

    pub fn away_name(&self) -> &str {
        self.teams.away.name.as_deref().unwrap_or("Fora")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitionInfo {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchTeams {
    #[serde(default, deserialize_with = "null_as_default")]
    pub home: TeamRef,
    #[serde(default, deserialize_with = "null_as_default")]
    pub away: TeamRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRef {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OddsMarket {
    #[serde(default, deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(default, alias = "outcomes", deserialize_with = "null_as_default")]
    pub values: Vec<OutcomeOdds>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeOdds {
    #[serde(default, alias = "label", deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(default, alias = "price")]
    pub odd: Option<Price>,
}

/// A bookmaker price as delivered: a number, a decimal string, `"5/2"` or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Decimal(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThirdPartyPrediction {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub home_win_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub draw_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub away_win_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub over25_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub under25_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub btts_yes_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub btts_no_probability: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorPrediction {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub home_win_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub draw_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub away_win_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub over25_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub under25_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub btts_yes_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub btts_no_probability: Option<f64>,
    #[serde(default)]
    pub predicted_goals: Option<PredictedGoals>,
    /// Textual hint such as `"Over 2.5"` or `"-2.5"`.
    #[serde(default)]
    pub under_over: Option<String>,
    #[serde(default)]
    pub advice: Option<String>,
    #[serde(default)]
    pub winner: Option<VendorWinner>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comparison: BTreeMap<String, ComparisonEntry>,
}

impl VendorPrediction {
    /// Sum of the predicted goals pair, when both sides are known.
    pub fn predicted_total(&self) -> Option<f64> {
        let goals = self.predicted_goals.as_ref()?;
        Some(goals.home? + goals.away?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictedGoals {
    #[serde(default, deserialize_with = "lenient_number")]
    pub home: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub away: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorWinner {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    #[serde(default, deserialize_with = "lenient_number")]
    pub home: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub away: Option<f64>,
}

// ── Form ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchForm {
    #[serde(default)]
    pub home: Option<FormSummary>,
    #[serde(default)]
    pub away: Option<FormSummary>,
    #[serde(default)]
    pub head_to_head: Option<HeadToHeadSummary>,
}

impl MatchForm {
    pub fn is_empty(&self) -> bool {
        self.home.is_none() && self.away.is_none() && self.head_to_head.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    pub sample_size: u32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub draws: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    pub draw_rate: f64,
    #[serde(default)]
    pub loss_rate: f64,
    #[serde(default)]
    pub form_points: u32,
    #[serde(default)]
    pub avg_goals_for: f64,
    #[serde(default)]
    pub avg_goals_against: f64,
    #[serde(default)]
    pub avg_goals_total: f64,
    #[serde(default)]
    pub goal_difference_avg: f64,
    #[serde(default)]
    pub clean_sheets: u32,
    #[serde(default)]
    pub failed_to_score: u32,
    /// Most recent first: `V` win, `E` draw, `D` loss.
    #[serde(default)]
    pub recent_record: String,
    #[serde(default)]
    pub current_streak: Streak,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matches: Vec<FormMatch>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Streak {
    #[serde(default, rename = "type")]
    pub kind: StreakKind,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakKind {
    Win,
    Loss,
    #[default]
    Draw,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormMatch {
    pub fixture_id: Option<i64>,
    pub date: Option<String>,
    pub opponent: Option<String>,
    pub competition: Option<String>,
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadToHeadSummary {
    pub sample_size: u32,
    #[serde(default)]
    pub home_wins: u32,
    #[serde(default)]
    pub away_wins: u32,
    #[serde(default)]
    pub draws: u32,
    #[serde(default)]
    pub avg_goals_total: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matches: Vec<HeadToHeadMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadToHeadMatch {
    pub fixture_id: Option<i64>,
    pub date: Option<String>,
    pub venue: Option<String>,
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub result: String,
}

// ── Analysis output ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predictions {
    pub home_win_probability: u8,
    pub draw_probability: u8,
    pub away_win_probability: u8,
    pub over25_probability: u8,
    pub under25_probability: u8,
    pub btts_yes_probability: u8,
    pub btts_no_probability: u8,
}

impl Predictions {
    pub fn max_match_winner(&self) -> u8 {
        self.home_win_probability
            .max(self.draw_probability)
            .max(self.away_win_probability)
    }
}

/// Where a probability field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Market,
    ThirdParty,
    Vendor,
    Heuristic,
}

impl SignalSource {
    pub fn is_fallback(self) -> bool {
        matches!(self, SignalSource::ThirdParty | SignalSource::Vendor)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionSources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_win: Option<SignalSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw: Option<SignalSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away_win: Option<SignalSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub over25: Option<SignalSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub under25: Option<SignalSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btts_yes: Option<SignalSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btts_no: Option<SignalSource>,
}

impl PredictionSources {
    pub fn iter(&self) -> impl Iterator<Item = SignalSource> {
        [
            self.home_win,
            self.draw,
            self.away_win,
            self.over25,
            self.under25,
            self.btts_yes,
            self.btts_no,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_score(score: i32) -> Self {
        if score >= 5 {
            Confidence::High
        } else if score >= 3 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn rank(self) -> i64 {
        match self {
            Confidence::High => 3,
            Confidence::Medium => 2,
            Confidence::Low => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedMatch {
    #[serde(flatten)]
    pub record: MatchRecord,
    pub predictions: Predictions,
    pub prediction_sources: PredictionSources,
    pub recommended_bets: Vec<String>,
    pub analysis_notes: Vec<String>,
    pub confidence: Confidence,
    pub confidence_score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionBreakdown {
    pub region: String,
    pub label: String,
    pub total: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionMatches {
    pub region: String,
    pub label: String,
    pub matches: Vec<AnalyzedMatch>,
    pub top_matches: Vec<AnalyzedMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub total_analyzed: usize,
    pub best_matches: Vec<AnalyzedMatch>,
    pub all_matches: Vec<AnalyzedMatch>,
    pub high_confidence_count: usize,
    pub medium_confidence_count: usize,
    pub breakdown_by_region: Vec<RegionBreakdown>,
    pub best_matches_by_region: Vec<RegionMatches>,
}

// ── Fetch output ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDay {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub total_matches: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matches: Vec<MatchRecord>,
    #[serde(default)]
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchMetadata {
    #[serde(default)]
    pub total_fixtures: usize,
    #[serde(default)]
    pub supported_fixtures: usize,
    #[serde(default)]
    pub processed_fixtures: usize,
    #[serde(default)]
    pub per_region: Vec<RegionCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCount {
    pub region: String,
    pub label: String,
    pub total: usize,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_record_accepts_legacy_keys() {
        let raw = r#"{
            "fixtureId": 10,
            "competition": {"key": "pt-liga", "region": "portugal"},
            "teams": {"home": {"name": "Benfica"}, "away": {"name": "Porto"}},
            "odds": null,
            "forebet": {"source": "Forebet", "homeWinProbability": "48%", "drawProbability": 27},
            "apiFootballPrediction": {"predictedGoals": {"home": "1.6", "away": 1.1}, "underOver": "Over 2.5"},
            "form": null
        }"#;
        let record: MatchRecord = serde_json::from_str(raw).unwrap();
        assert!(record.odds.is_empty());
        assert!(record.form.is_empty());
        let third_party = record.third_party.as_ref().unwrap();
        assert_eq!(third_party.home_win_probability, Some(48.0));
        assert_eq!(third_party.draw_probability, Some(27.0));
        assert_eq!(third_party.away_win_probability, None);
        let vendor = record.vendor.as_ref().unwrap();
        assert!((vendor.predicted_total().unwrap() - 2.7).abs() < 1e-9);
        assert_eq!(record.competition.region.as_deref(), Some("portugal"));
    }

    #[test]
    fn test_outcome_odds_price_shapes() {
        let raw = r#"[{"value": "Home", "odd": "1.50"}, {"value": 1, "odd": 2.5}, {"label": "X", "price": "5/2"}]"#;
        let outcomes: Vec<OutcomeOdds> = serde_json::from_str(raw).unwrap();
        assert_eq!(outcomes[0].odd, Some(Price::Text("1.50".into())));
        assert_eq!(outcomes[1].value, "1");
        assert_eq!(outcomes[1].odd, Some(Price::Decimal(2.5)));
        assert_eq!(outcomes[2].value, "X");
    }

    #[test]
    fn test_confidence_from_score() {
        assert_eq!(Confidence::from_score(0), Confidence::Low);
        assert_eq!(Confidence::from_score(2), Confidence::Low);
        assert_eq!(Confidence::from_score(3), Confidence::Medium);
        assert_eq!(Confidence::from_score(4), Confidence::Medium);
        assert_eq!(Confidence::from_score(5), Confidence::High);
        assert_eq!(Confidence::from_score(9), Confidence::High);
    }

    #[test]
    fn test_form_summary_streak_roundtrip_names() {
        let raw = r#"{"sampleSize": 5, "currentStreak": {"type": "win", "count": 3}}"#;
        let summary: FormSummary = serde_json::from_str(raw).unwrap();
        assert_eq!(summary.current_streak.kind, StreakKind::Win);
        assert_eq!(summary.current_streak.count, 3);
    }
}
