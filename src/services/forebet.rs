use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};

use crate::models::ThirdPartyPrediction;
use crate::services::cache::TtlCache;
use crate::utils::{normalize_text, parse_percent_cell};

pub const SOURCE: &str = "Forebet";
const DESKTOP_BASE: &str = "https://www.forebet.com";
const MOBILE_BASE: &str = "https://m.forebet.com";
const PAGE_PATH: &str = "/en/football-tips-and-predictions-for-";
const LANDING_PATH: &str = "/en/football-predictions";

const BOARD_TTL: Duration = Duration::from_secs(6 * 60 * 60);
const FAILURE_BACKOFF: Duration = Duration::from_secs(180);
/// Minimum Jaro-Winkler similarity for both team names in a fuzzy lookup.
const FUZZY_THRESHOLD: f64 = 0.9;

const DESKTOP_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
const MOBILE_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Mobile Safari/537.36";

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("row selector is valid"));
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("cell selector is valid"));

const HOME_CLASSES: [&str; 3] = ["home", "tnms", "team1"];
const AWAY_CLASSES: [&str; 3] = ["away", "tnms2", "team2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForebetProbabilities {
    pub home: u8,
    pub draw: u8,
    pub away: u8,
    pub over25: Option<u8>,
    pub under25: Option<u8>,
    pub btts_yes: Option<u8>,
    pub btts_no: Option<u8>,
}

impl ForebetProbabilities {
    fn swapped(self) -> Self {
        Self {
            home: self.away,
            away: self.home,
            ..self
        }
    }

    pub fn into_prediction(self) -> ThirdPartyPrediction {
        let percent = |value: u8| Some(f64::from(value));
        ThirdPartyPrediction {
            source: Some(SOURCE.to_string()),
            home_win_probability: percent(self.home),
            draw_probability: percent(self.draw),
            away_win_probability: percent(self.away),
            over25_probability: self.over25.and_then(percent),
            under25_probability: self.under25.and_then(percent),
            btts_yes_probability: self.btts_yes.and_then(percent),
            btts_no_probability: self.btts_no.and_then(percent),
        }
    }
}

/// Lowercase ASCII-folded team name with punctuation collapsed to single spaces.
fn team_key(name: &str) -> String {
    normalize_text(name)
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn pair_key(home: &str, away: &str) -> String {
    format!("{}|{}", team_key(home), team_key(away))
}

/// Visible text of an element with whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Text of the first element below `row` carrying one of the given class markers.
fn marked_cell_text(row: ElementRef<'_>, markers: &[&str]) -> Option<String> {
    row.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|element| {
            element.value().classes().any(|class| {
                let class = class.to_ascii_lowercase();
                markers.iter().any(|marker| class.contains(marker))
            })
        })
        .map(element_text)
        .filter(|name| !name.is_empty())
}

/// One day of scraped predictions keyed by `home|away`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionBoard {
    entries: HashMap<String, ForebetProbabilities>,
}

impl PredictionBoard {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut board = Self::default();

        for row in document.select(&ROW_SELECTOR) {
            let cells: Vec<String> = row.select(&CELL_SELECTOR).map(element_text).collect();
            if cells.len() < 3 {
                continue;
            }

            let mut home = marked_cell_text(row, &HOME_CLASSES);
            let mut away = marked_cell_text(row, &AWAY_CLASSES);
            if home.is_none() || away.is_none() {
                let texts: Vec<&String> = cells.iter().filter(|text| !text.is_empty()).collect();
                if texts.len() >= 3 {
                    home = home.or_else(|| Some(texts[1].clone()));
                    away = away.or_else(|| Some(texts[2].clone()));
                }
            }
            let (Some(home), Some(away)) = (home, away) else {
                continue;
            };

            let percentages: Vec<Option<u8>> = cells.iter().map(|cell| parse_percent_cell(cell)).collect();
            board.add(&home, &away, &percentages);
        }

        board
    }

    fn add(&mut self, home: &str, away: &str, percentages: &[Option<u8>]) {
        if home.is_empty() || away.is_empty() {
            return;
        }
        let (Some(home_pct), Some(draw_pct), Some(away_pct)) = (percentages[0], percentages[1], percentages[2]) else {
            return;
        };
        let pair = |first: usize| match (percentages.get(first), percentages.get(first + 1)) {
            (Some(Some(a)), Some(Some(b))) => (Some(*a), Some(*b)),
            _ => (None, None),
        };
        let (over25, under25) = pair(3);
        let (btts_yes, btts_no) = pair(5);

        self.entries
            .entry(pair_key(home, away))
            .or_insert(ForebetProbabilities {
                home: home_pct,
                draw: draw_pct,
                away: away_pct,
                over25,
                under25,
                btts_yes,
                btts_no,
            });
    }

    pub fn insert(&mut self, home: &str, away: &str, probabilities: ForebetProbabilities) {
        self.entries.insert(pair_key(home, away), probabilities);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact pair, then the reversed pair with sides swapped, then the closest
    /// fuzzy pair when both names are similar enough.
    pub fn lookup(&self, home: &str, away: &str) -> Option<ForebetProbabilities> {
        if let Some(found) = self.entries.get(&pair_key(home, away)) {
            return Some(*found);
        }
        if let Some(found) = self.entries.get(&pair_key(away, home)) {
            return Some(found.swapped());
        }

        let (home, away) = (team_key(home), team_key(away));
        if home.is_empty() || away.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .filter_map(|(key, probabilities)| {
                let (entry_home, entry_away) = key.split_once('|')?;
                let home_score = strsim::jaro_winkler(&home, entry_home);
                let away_score = strsim::jaro_winkler(&away, entry_away);
                (home_score >= FUZZY_THRESHOLD && away_score >= FUZZY_THRESHOLD)
                    .then_some((home_score + away_score, key, probabilities))
            })
            .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, _, probabilities)| *probabilities)
    }
}

fn browser_headers(agent: &'static str, referer: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(agent));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(REFERER, HeaderValue::from_static(referer));
    headers
}

/// Scraper for the daily prediction page, cached per date.
pub struct ForebetClient {
    client: Client,
    desktop_base: String,
    mobile_base: String,
    boards: TtlCache<NaiveDate, Arc<PredictionBoard>>,
}

impl ForebetClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(browser_headers(
                DESKTOP_AGENT,
                "https://www.forebet.com/en/football-predictions",
            ))
            .build()?;
        Ok(Self {
            client,
            desktop_base: DESKTOP_BASE.to_string(),
            mobile_base: MOBILE_BASE.to_string(),
            boards: TtlCache::new(BOARD_TTL),
        })
    }

    pub fn with_base_urls(mut self, desktop: impl Into<String>, mobile: impl Into<String>) -> Self {
        self.desktop_base = desktop.into();
        self.mobile_base = mobile.into();
        self
    }

    fn slug(date: NaiveDate) -> String {
        if date == Utc::now().date_naive() {
            "today".to_string()
        } else {
            date.format("%Y-%m-%d").to_string()
        }
    }

    async fn get_text(&self, url: &str, headers: Option<HeaderMap>) -> Option<(StatusCode, String)> {
        let mut request = self.client.get(url);
        if let Some(headers) = headers {
            request = request.headers(headers);
        }
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.ok()?;
                Some((status, body))
            }
            Err(err) => {
                tracing::warn!("Unable to fetch Forebet page {}: {}", url, err);
                None
            }
        }
    }

    /// Desktop page first; on 403 warm up and retry, then fall back to the mobile site.
    async fn load_page(&self, date: NaiveDate) -> Option<String> {
        let path = format!("{PAGE_PATH}{}", Self::slug(date));
        let url = format!("{}{}", self.desktop_base, path);

        let (status, body) = self.get_text(&url, None).await?;
        if status.is_success() {
            return Some(body);
        }
        if status != StatusCode::FORBIDDEN {
            tracing::warn!("Forebet request failed: {} ({})", url, status);
            return None;
        }

        let landing = format!("{}{}", self.desktop_base, LANDING_PATH);
        let _ = self.get_text(&landing, None).await;
        if let Some((status, body)) = self.get_text(&url, None).await {
            if status.is_success() {
                tracing::info!("Forebet request recovered after warm-up: {}", url);
                return Some(body);
            }
        }

        let mobile_url = format!("{}{}", self.mobile_base, path);
        let mobile_headers = browser_headers(MOBILE_AGENT, "https://m.forebet.com/en/football-predictions");
        match self.get_text(&mobile_url, Some(mobile_headers)).await {
            Some((status, body)) if status.is_success() => {
                tracing::info!("Forebet mobile fallback used: {}", mobile_url);
                Some(body)
            }
            Some((status, _)) => {
                tracing::warn!("Forebet mobile fallback failed: {} ({})", mobile_url, status);
                None
            }
            None => None,
        }
    }

    async fn board(&self, date: NaiveDate) -> Option<Arc<PredictionBoard>> {
        let result = self
            .boards
            .get_or_try_insert_with(date, || async {
                let html = self.load_page(date).await.ok_or(())?;
                let board = PredictionBoard::parse(&html);
                tracing::debug!("Parsed {} Forebet predictions for {}", board.len(), date);
                Ok::<_, ()>(Arc::new(board))
            })
            .await;
        match result {
            Ok(board) => board,
            Err(()) => {
                self.boards.remember_failure(date, FAILURE_BACKOFF);
                None
            }
        }
    }

    pub async fn lookup(&self, date: NaiveDate, home: &str, away: &str) -> Option<ThirdPartyPrediction> {
        if home.trim().is_empty() || away.trim().is_empty() {
            return None;
        }
        let board = self.board(date).await?;
        board.lookup(home, away).map(ForebetProbabilities::into_prediction)
    }
}
