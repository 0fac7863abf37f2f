use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigError, Settings};
use crate::models::{
    ComparisonEntry, CompetitionInfo, FetchMetadata, FormSummary, HeadToHeadSummary, MatchDay, MatchForm,
    MatchRecord, MatchTeams, OddsMarket, OutcomeOdds, PredictedGoals, RegionCount, TeamRef, VendorPrediction,
    VendorWinner,
};
use crate::services::cache::TtlCache;
use crate::services::competitions::{Competition, CompetitionIndex};
use crate::services::forebet::ForebetClient;
use crate::services::form_summary::{summarize_head_to_head, summarize_team_form};
use crate::utils::{parse_number, parse_percentage, to_percent};

pub const API_BASE: &str = "https://v3.football.api-sports.io";
const API_HOST: &str = "v3.football.api-sports.io";
pub const VENDOR_SOURCE: &str = "API-FOOTBALL";

const TEAM_FORM_TTL: Duration = Duration::from_secs(10 * 60);
const HEAD_TO_HEAD_TTL: Duration = Duration::from_secs(15 * 60);
const ODDS_TTL: Duration = Duration::from_secs(5 * 60);
const PREDICTION_TTL: Duration = Duration::from_secs(10 * 60);
const FAILURE_TTL: Duration = Duration::from_secs(60);
const RATE_LIMITED_FAILURE_TTL: Duration = Duration::from_secs(120);
const FORM_SAMPLE: &str = "5";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("API rate limit reached (HTTP 429)")]
    RateLimited,
    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

// ── API-FOOTBALL structures ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub response: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiFixture {
    #[serde(default)]
    pub fixture: FixtureInfo,
    #[serde(default)]
    pub league: LeagueInfo,
    #[serde(default)]
    pub teams: FixtureTeams,
    #[serde(default)]
    pub goals: GoalPair,
    #[serde(default)]
    pub score: ScoreBreakdown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureInfo {
    pub id: Option<i64>,
    pub date: Option<String>,
    pub timestamp: Option<i64>,
    pub venue: Option<VenueInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenueInfo {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeagueInfo {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureTeams {
    #[serde(default)]
    pub home: FixtureTeam,
    #[serde(default)]
    pub away: FixtureTeam,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureTeam {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub logo: Option<String>,
    pub winner: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct GoalPair {
    pub home: Option<i64>,
    pub away: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(default)]
    pub fulltime: GoalPair,
    #[serde(default)]
    pub extratime: GoalPair,
    #[serde(default)]
    pub penalty: GoalPair,
}

#[derive(Debug, Deserialize)]
pub struct ApiOddsEntry {
    #[serde(default)]
    pub bookmakers: Vec<ApiBookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBookmaker {
    pub id: Option<i64>,
    #[serde(default)]
    pub bets: Vec<ApiBet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBet {
    pub name: Option<String>,
    #[serde(default)]
    pub values: Option<Vec<OutcomeOdds>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiPrediction {
    #[serde(default, alias = "prediction")]
    pub predictions: Option<ApiPredictionBlock>,
    #[serde(default)]
    pub comparison: BTreeMap<String, ApiComparison>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiPredictionBlock {
    pub winner: Option<ApiWinner>,
    pub under_over: Option<String>,
    pub advice: Option<String>,
    pub goals: Option<ApiSides>,
    pub percent: Option<ApiPercent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiWinner {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSides {
    #[serde(default)]
    pub home: Value,
    #[serde(default)]
    pub away: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiPercent {
    #[serde(default)]
    pub home: Value,
    #[serde(default)]
    pub draw: Value,
    #[serde(default)]
    pub away: Value,
}

pub type ApiComparison = ApiSides;

// ── Normalisation ────────────────────────────────────────────────────────────

fn value_percentage(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().map(|value| to_percent(value) as f64),
        Value::String(text) => parse_percentage(text).map(f64::from),
        _ => None,
    }
}

fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_number(text),
        _ => None,
    }
}

/// Vendor prediction payload into the analyzer's shape. `None` without a prediction block.
pub fn normalize_vendor_prediction(payload: &ApiPrediction) -> Option<VendorPrediction> {
    let block = payload.predictions.as_ref()?;
    let percent = block.percent.as_ref();

    let predicted_goals = block.goals.as_ref().map(|goals| PredictedGoals {
        home: value_number(&goals.home),
        away: value_number(&goals.away),
    });

    let comparison = payload
        .comparison
        .iter()
        .map(|(name, sides)| {
            (
                name.clone(),
                ComparisonEntry {
                    home: value_percentage(&sides.home),
                    away: value_percentage(&sides.away),
                },
            )
        })
        .collect();

    Some(VendorPrediction {
        source: Some(VENDOR_SOURCE.to_string()),
        home_win_probability: percent.and_then(|percent| value_percentage(&percent.home)),
        draw_probability: percent.and_then(|percent| value_percentage(&percent.draw)),
        away_win_probability: percent.and_then(|percent| value_percentage(&percent.away)),
        predicted_goals,
        under_over: block.under_over.clone(),
        advice: block.advice.clone(),
        winner: block.winner.as_ref().map(|winner| VendorWinner {
            id: winner.id,
            name: winner.name.clone(),
            comment: winner.comment.clone(),
        }),
        comparison,
        ..Default::default()
    })
}

/// Merge bookmaker markets by name. The preferred bookmaker is read first and
/// the first non-empty value list per market name wins.
pub fn merge_bookmaker_markets(bookmakers: &[ApiBookmaker], preferred: Option<i64>) -> Vec<OddsMarket> {
    let mut ordered: Vec<&ApiBookmaker> = bookmakers.iter().collect();
    ordered.sort_by_key(|bookmaker| preferred.is_none() || bookmaker.id != preferred);

    let mut markets: Vec<OddsMarket> = Vec::new();
    for bet in ordered.iter().flat_map(|bookmaker| bookmaker.bets.iter()) {
        let Some(name) = bet.name.as_deref() else {
            continue;
        };
        let values = bet.values.clone().unwrap_or_default();
        match markets.iter_mut().find(|market| market.name == name) {
            Some(existing) if existing.values.is_empty() => existing.values = values,
            Some(_) => {}
            None => markets.push(OddsMarket {
                name: name.to_string(),
                values,
            }),
        }
    }
    markets
}

/// `HH:MM` from an RFC 3339 kickoff, or the raw string when it does not parse.
pub fn kickoff_time(date: &str) -> String {
    DateTime::parse_from_rfc3339(date)
        .map(|kickoff| kickoff.format("%H:%M").to_string())
        .unwrap_or_else(|_| date.to_string())
}

// ── Retry policy ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_wait: Duration,
    pub max_backoff: Duration,
    /// Delay between per-fixture requests, to stay under the plan's rate limit.
    pub pacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_wait: Duration::from_secs(30),
            max_backoff: Duration::from_secs(120),
            pacing: Duration::from_millis(100),
        }
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    let raw = response.headers().get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds = raw.trim().parse::<f64>().ok()?;
    Some(Duration::from_secs((seconds as u64).clamp(1, 300)))
}

// ── DataFetcher ──────────────────────────────────────────────────────────────

pub struct DataFetcher {
    client: Client,
    base_url: String,
    api_key: String,
    bookmaker_id: i64,
    max_fixtures: usize,
    retry: RetryPolicy,
    forebet: Option<Arc<ForebetClient>>,
    form_cache: TtlCache<i64, Option<FormSummary>>,
    h2h_cache: TtlCache<(i64, i64), Option<HeadToHeadSummary>>,
    odds_cache: TtlCache<i64, Vec<OddsMarket>>,
    prediction_cache: TtlCache<i64, Option<VendorPrediction>>,
}

impl DataFetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let api_key = settings.require_football_key()?.to_string();
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let forebet = settings
            .forebet_enabled
            .then(|| ForebetClient::new().map(Arc::new))
            .transpose()?;

        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            api_key,
            bookmaker_id: settings.bookmaker_id as i64,
            max_fixtures: settings.max_fixtures,
            retry: RetryPolicy::default(),
            forebet,
            form_cache: TtlCache::new(TEAM_FORM_TTL),
            h2h_cache: TtlCache::new(HEAD_TO_HEAD_TTL),
            odds_cache: TtlCache::new(ODDS_TTL),
            prediction_cache: TtlCache::new(PREDICTION_TTL),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_forebet(mut self, forebet: Option<Arc<ForebetClient>>) -> Self {
        self.forebet = forebet;
        self
    }

    /// GET with the API's retry rules: 429 honours `Retry-After` and gives up
    /// after `max_retries`; 5xx and transport errors back off and retry.
    async fn request_with_retry(&self, path: &str, query: &[(&str, String)]) -> Result<Response, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;
        let mut wait = self.retry.initial_wait;

        loop {
            let sent = self
                .client
                .get(&url)
                .query(query)
                .header("x-apisports-key", &self.api_key)
                .header("X-RapidAPI-Key", &self.api_key)
                .header("X-RapidAPI-Host", API_HOST)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(err) if attempt < self.retry.max_retries => {
                    let backoff = wait.min(self.retry.max_backoff);
                    tracing::warn!("Request to {} failed ({}), retrying in {:?}", url, err, backoff);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    wait *= 2;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                attempt += 1;
                if attempt > self.retry.max_retries {
                    return Err(FetchError::RateLimited);
                }
                let delay = retry_after(&response).unwrap_or(wait);
                tracing::warn!("Rate limited by {}, waiting {:?} (attempt {})", url, delay, attempt);
                tokio::time::sleep(delay).await;
                wait *= 2;
                continue;
            }

            if response.status().is_server_error() && attempt < self.retry.max_retries {
                let backoff = wait.min(self.retry.max_backoff);
                tracing::warn!("Server error {} from {}, retrying in {:?}", response.status(), url, backoff);
                tokio::time::sleep(backoff).await;
                attempt += 1;
                wait *= 2;
                continue;
            }

            return Ok(response);
        }
    }

    /// Decoded `response` list, or `None` when the API answers 404.
    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Vec<T>>, FetchError> {
        let response = self.request_with_retry(path, query).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }
        let bytes = response.bytes().await?;
        let envelope: ApiEnvelope<T> = serde_json::from_slice(&bytes)?;
        Ok(Some(envelope.response))
    }

    async fn fetch_team_form(&self, team_id: i64) -> Result<Option<FormSummary>, FetchError> {
        let fixtures: Vec<ApiFixture> = self
            .get_list("/fixtures", &[("team", team_id.to_string()), ("last", FORM_SAMPLE.to_string())])
            .await?
            .unwrap_or_default();
        Ok(summarize_team_form(team_id, &fixtures))
    }

    async fn fetch_head_to_head(&self, home_id: i64, away_id: i64) -> Result<Option<HeadToHeadSummary>, FetchError> {
        let fixtures: Vec<ApiFixture> = self
            .get_list(
                "/fixtures/headtohead",
                &[("h2h", format!("{home_id}-{away_id}")), ("last", FORM_SAMPLE.to_string())],
            )
            .await?
            .unwrap_or_default();
        Ok(summarize_head_to_head(home_id, away_id, &fixtures))
    }

    async fn fetch_odds(&self, fixture_id: i64) -> Result<Vec<OddsMarket>, FetchError> {
        let entries: Vec<ApiOddsEntry> = self
            .get_list("/odds", &[("fixture", fixture_id.to_string())])
            .await?
            .unwrap_or_default();
        let bookmakers = entries.into_iter().next().map(|entry| entry.bookmakers).unwrap_or_default();
        Ok(merge_bookmaker_markets(&bookmakers, Some(self.bookmaker_id)))
    }

    async fn fetch_prediction(&self, fixture_id: i64) -> Result<Option<VendorPrediction>, FetchError> {
        let payloads: Vec<ApiPrediction> = self
            .get_list("/predictions", &[("fixture", fixture_id.to_string())])
            .await?
            .unwrap_or_default();
        Ok(payloads.first().and_then(normalize_vendor_prediction))
    }

    async fn team_form(&self, team_id: Option<i64>) -> Option<FormSummary> {
        let team_id = team_id?;
        let result = self
            .form_cache
            .get_or_try_insert_with(team_id, || self.fetch_team_form(team_id))
            .await;
        settle(&self.form_cache, team_id, result, "team form").flatten()
    }

    async fn head_to_head(&self, home_id: Option<i64>, away_id: Option<i64>) -> Option<HeadToHeadSummary> {
        let key = (home_id?, away_id?);
        let result = self
            .h2h_cache
            .get_or_try_insert_with(key, || self.fetch_head_to_head(key.0, key.1))
            .await;
        settle(&self.h2h_cache, key, result, "head-to-head").flatten()
    }

    async fn odds(&self, fixture_id: i64) -> Vec<OddsMarket> {
        let result = self
            .odds_cache
            .get_or_try_insert_with(fixture_id, || self.fetch_odds(fixture_id))
            .await;
        settle(&self.odds_cache, fixture_id, result, "odds").unwrap_or_default()
    }

    async fn vendor_prediction(&self, fixture_id: i64) -> Option<VendorPrediction> {
        let result = self
            .prediction_cache
            .get_or_try_insert_with(fixture_id, || self.fetch_prediction(fixture_id))
            .await;
        settle(&self.prediction_cache, fixture_id, result, "vendor prediction").flatten()
    }

    /// Upcoming fixtures of supported competitions for `date`, enriched with odds,
    /// form, head-to-head and external predictions.
    pub async fn fetch_matches(&self, date: NaiveDate, index: &CompetitionIndex) -> Result<MatchDay, FetchError> {
        let iso_date = date.format("%Y-%m-%d").to_string();
        tracing::info!("Fetching fixtures for {}", iso_date);

        let fixtures: Vec<ApiFixture> = self
            .get_list("/fixtures", &[("date", iso_date.clone()), ("status", "NS".to_string())])
            .await?
            .ok_or_else(|| FetchError::Status {
                status: StatusCode::NOT_FOUND,
                body: "fixtures endpoint not found".to_string(),
            })?;

        let mut supported: Vec<&ApiFixture> = fixtures
            .iter()
            .filter(|fixture| identify(index, fixture).is_some())
            .collect();
        let supported_count = supported.len();
        supported.sort_by_key(|fixture| fixture.fixture.timestamp.unwrap_or(0));
        supported.truncate(self.max_fixtures);

        tracing::info!(
            "Processing fixtures: {} total, {} supported, {} to process",
            fixtures.len(),
            supported_count,
            supported.len()
        );

        let mut matches = Vec::with_capacity(supported.len());
        for fixture in &supported {
            let Some(competition) = identify(index, fixture) else {
                continue;
            };
            let Some(fixture_id) = fixture.fixture.id else {
                continue;
            };

            let home = &fixture.teams.home;
            let away = &fixture.teams.away;

            let odds = self.odds(fixture_id).await;
            let home_form = self.team_form(home.id).await;
            let away_form = self.team_form(away.id).await;
            let head_to_head = self.head_to_head(home.id, away.id).await;
            let vendor = self.vendor_prediction(fixture_id).await;
            let third_party = match (&self.forebet, home.name.as_deref(), away.name.as_deref()) {
                (Some(forebet), Some(home_name), Some(away_name)) => forebet.lookup(date, home_name, away_name).await,
                _ => None,
            };

            matches.push(MatchRecord {
                fixture_id: Some(fixture_id),
                date: fixture.fixture.date.clone(),
                time: fixture.fixture.date.as_deref().map(kickoff_time),
                venue: Some(
                    fixture
                        .fixture
                        .venue
                        .as_ref()
                        .and_then(|venue| venue.name.clone())
                        .unwrap_or_else(|| "TBD".to_string()),
                ),
                competition: CompetitionInfo {
                    key: Some(competition.key.clone()),
                    name: Some(competition.display_name.clone()),
                    region: Some(competition.region.clone()),
                    kind: Some(competition.kind.clone()),
                    country: Some(competition.country.clone()),
                },
                teams: MatchTeams {
                    home: team_ref(home),
                    away: team_ref(away),
                },
                odds,
                third_party,
                vendor,
                form: MatchForm {
                    home: home_form,
                    away: away_form,
                    head_to_head,
                },
            });

            if !self.retry.pacing.is_zero() {
                tokio::time::sleep(self.retry.pacing).await;
            }
        }

        let per_region = index
            .region_order()
            .iter()
            .map(|region| RegionCount {
                region: region.clone(),
                label: index.region_label(region).to_string(),
                total: matches
                    .iter()
                    .filter(|record| record.competition.region.as_deref() == Some(region.as_str()))
                    .count(),
            })
            .collect();

        tracing::info!("Fetched {} matches for {}", matches.len(), iso_date);

        Ok(MatchDay {
            date: iso_date,
            total_matches: matches.len(),
            metadata: FetchMetadata {
                total_fixtures: fixtures.len(),
                supported_fixtures: supported_count,
                processed_fixtures: supported.len(),
                per_region,
            },
            matches,
        })
    }
}

fn identify<'a>(index: &'a CompetitionIndex, fixture: &ApiFixture) -> Option<&'a Competition> {
    index.identify(
        fixture.league.id,
        fixture.league.name.as_deref(),
        fixture.league.country.as_deref(),
    )
}

fn team_ref(team: &FixtureTeam) -> TeamRef {
    TeamRef {
        id: team.id,
        name: team.name.clone(),
        logo: team.logo.clone(),
    }
}

/// Log a failed lookup and remember it so the next fixtures skip the call.
fn settle<K, V>(cache: &TtlCache<K, V>, key: K, result: Result<Option<V>, FetchError>, what: &str) -> Option<V>
where
    K: Eq + std::hash::Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("Failed to fetch {} for {:?}: {}", what, key, err);
            let ttl = if err.is_rate_limited() {
                RATE_LIMITED_FAILURE_TTL
            } else {
                FAILURE_TTL
            };
            cache.remember_failure(key, ttl);
            None
        }
    }
}
