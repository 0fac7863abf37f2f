use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::models::{AnalysisReport, MatchDay, MatchRecord};
use crate::services::commands::{answer, extract_command, is_allowed, Reply};
use crate::services::export::to_csv_string;
use crate::services::message_builder::format_daily_message;
use crate::services::ranking::analyze_matches;
use crate::services::telegram::{DeliveryReport, IncomingMessage, TelegramClient};
use crate::services::{CompetitionIndex, DataFetcher};
use crate::snapshot::{load_match_data, SnapshotStore};

const FETCH_FAILED_REPLY: &str = "⚠️ Não foi possível obter os jogos de hoje. Tente novamente mais tarde.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
    Text,
}

pub fn load_index(path: &Path) -> Result<CompetitionIndex> {
    CompetitionIndex::from_path(path).with_context(|| format!("loading competitions from {}", path.display()))
}

/// Accepted shapes for `analyze --input`: a bare list of records, a match day,
/// or a previous `run --output` payload.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnalysisInput {
    RunOutput {
        #[serde(rename = "matchData")]
        match_data: MatchDay,
    },
    Matches(Vec<MatchRecord>),
    Day(MatchDay),
}

fn parse_input(raw: &str) -> Result<MatchDay> {
    let input: AnalysisInput = serde_json::from_str(raw).context("input is not a list of matches or a match day")?;
    Ok(match input {
        AnalysisInput::RunOutput { match_data } | AnalysisInput::Day(match_data) => match_data,
        AnalysisInput::Matches(matches) => MatchDay {
            total_matches: matches.len(),
            matches,
            ..Default::default()
        },
    })
}

fn render(format: OutputFormat, match_day: &MatchDay, report: &AnalysisReport) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Csv => to_csv_string(&report.all_matches)?,
        OutputFormat::Text => format_daily_message(match_day, report),
    })
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

pub fn analyze_file(input: &Path, format: OutputFormat, output: Option<&Path>, index: &CompetitionIndex) -> Result<()> {
    let raw = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let match_day = parse_input(&raw).with_context(|| format!("parsing {}", input.display()))?;

    let report = analyze_matches(&match_day.matches, index);
    let rendered = render(format, &match_day, &report)?;

    match output {
        Some(path) => {
            write_output(path, &rendered)?;
            println!("✅ Analyzed {} matches, written to {}", report.total_analyzed, path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

pub struct DailyOptions {
    pub date: Option<NaiveDate>,
    pub dry_run: bool,
    pub chat_id: Option<String>,
    pub output: Option<PathBuf>,
    pub no_cache: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DailyRun<'a> {
    success: bool,
    generated_at: DateTime<Utc>,
    match_data: &'a MatchDay,
    analysis: &'a AnalysisReport,
    message: &'a str,
    used_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    delivery: Option<&'a DeliveryReport>,
}

/// Fetch the day's fixtures, analyze them and deliver the daily message.
pub async fn run_daily(settings: &Settings, index: &CompetitionIndex, options: DailyOptions) -> Result<()> {
    let date = options.date.unwrap_or_else(|| Utc::now().date_naive());
    let fetcher = DataFetcher::new(settings).context("configuring the fixtures fetcher")?;
    let store = (!options.no_cache).then(|| SnapshotStore::new(&settings.cache_dir));

    let fetcher = &fetcher;
    let (match_data, used_cache) = load_match_data(date, store.as_ref(), move || fetcher.fetch_matches(date, index))
        .await
        .with_context(|| format!("fetching fixtures for {}", date))?;
    if used_cache {
        tracing::warn!("Using cached fixtures for {}", date);
    }

    let report = analyze_matches(&match_data.matches, index);
    let message = format_daily_message(&match_data, &report);

    let delivery = if options.dry_run {
        println!("{}", message);
        None
    } else {
        let telegram = TelegramClient::new(settings).context("configuring Telegram")?;
        let report = telegram
            .send_message(&message, options.chat_id.as_deref())
            .await
            .context("sending the daily message")?;
        tracing::info!("Daily message delivered to chat {}", report.chat_id);
        Some(report)
    };

    if let Some(path) = options.output.as_deref() {
        let payload = DailyRun {
            success: true,
            generated_at: Utc::now(),
            match_data: &match_data,
            analysis: &report,
            message: &message,
            used_cache,
            delivery: delivery.as_ref(),
        };
        write_output(path, &serde_json::to_string_pretty(&payload)?)?;
        println!("💾 Run output written to {}", path.display());
    }

    println!(
        "✅ {} fixtures, {} analyzed, {} high confidence",
        match_data.total_matches, report.total_analyzed, report.high_confidence_count
    );
    Ok(())
}

/// Reply text for an owner command. Fixtures are only fetched once the sender
/// has passed the allow-list.
async fn command_reply(
    message: &IncomingMessage,
    query: &str,
    settings: &Settings,
    fetcher: &DataFetcher,
    store: &SnapshotStore,
    index: &CompetitionIndex,
) -> String {
    let user_id = message.from.as_ref().map(|user| user.id);
    if !is_allowed(user_id, &settings.allowed_ids) {
        tracing::warn!("Refused owner command from {:?}", user_id);
        return Reply::Refused.text();
    }
    if query.trim().is_empty() {
        return Reply::MissingQuery.text();
    }

    let today = Utc::now().date_naive();
    match load_match_data(today, Some(store), move || fetcher.fetch_matches(today, index)).await {
        Ok((match_day, _)) => answer(query, &match_day.matches).text(),
        Err(e) => {
            tracing::error!("Failed to load fixtures for owner command: {}", e);
            FETCH_FAILED_REPLY.to_string()
        }
    }
}

/// Long-poll Telegram and answer owner commands until interrupted.
pub async fn listen(settings: &Settings, index: &CompetitionIndex, poll_interval: u64) -> Result<()> {
    let telegram = TelegramClient::new(settings).context("configuring Telegram")?;
    let fetcher = DataFetcher::new(settings).context("configuring the fixtures fetcher")?;
    let store = SnapshotStore::new(&settings.cache_dir);

    if settings.allowed_ids.is_empty() {
        tracing::warn!("No TELEGRAM_OWNER_ID or TELEGRAM_ALLOWED_IDS configured; every command will be refused");
    }
    println!("👂 Listening for owner commands (Ctrl+C to stop)");

    let mut offset = None;
    loop {
        let updates = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("👋 Stopping listener");
                return Ok(());
            }
            updates = telegram.get_updates(offset, poll_interval) => updates,
        };
        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                tracing::error!("Failed to poll Telegram updates: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(message) = update.any_message() else {
                continue;
            };
            let Some((command, query)) = message.text.as_deref().and_then(extract_command) else {
                continue;
            };
            tracing::info!("Received {} from chat {}", command, message.chat.id);

            let text = command_reply(message, &query, settings, &fetcher, &store, index).await;
            if let Err(e) = telegram.reply(message.chat.id, &text).await {
                tracing::error!("Failed to answer chat {}: {}", message.chat.id, e);
            }
        }
    }
}

pub fn show_regions(index: &CompetitionIndex) {
    println!("🌍 Supported regions:\n");
    for region in index.region_order() {
        println!("📊 {} ({}):", index.region_label(region), region);
        for competition in index.competitions().iter().filter(|competition| &competition.region == region) {
            println!("   • {} [{}]", competition.display_name, competition.key);
        }
    }
    println!("\n💡 Use 'oddsbot run --dry-run' to preview today's message");
}
