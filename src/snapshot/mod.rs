use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MatchDay;
use crate::services::data_fetcher::FetchError;

const MAX_AGE_HOURS: i64 = 12;

/// Last good fixture payload for a date, as persisted on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub cached_at: DateTime<Utc>,
    pub match_data: MatchDay,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFileOut<'a> {
    cached_at: String,
    match_data: &'a MatchDay,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFileIn {
    #[serde(default)]
    cached_at: Option<String>,
    match_data: MatchDay,
}

pub struct SnapshotStore {
    dir: PathBuf,
    max_age: Duration,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: Duration::hours(MAX_AGE_HOURS),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("fixtures_{}.json", date.format("%Y-%m-%d")))
    }

    /// Snapshot for `date`, unless missing, unreadable or older than the max age.
    /// A missing or malformed `cachedAt` counts as fresh.
    pub fn load(&self, date: NaiveDate) -> Option<Snapshot> {
        let path = self.path_for(date);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!("Unable to read cached fixtures {}: {}", path.display(), err);
                return None;
            }
        };
        let file: SnapshotFileIn = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!("Cached fixtures corrupted {}: {}", path.display(), err);
                return None;
            }
        };

        let now = Utc::now();
        let cached_at = file
            .cached_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|stamp| stamp.with_timezone(&Utc))
            .unwrap_or(now);

        let age = now - cached_at;
        if age > self.max_age {
            tracing::info!(
                "Cached fixtures expired {} (age {:.2}h)",
                path.display(),
                age.num_seconds() as f64 / 3600.0
            );
            return None;
        }

        Some(Snapshot {
            cached_at,
            match_data: file.match_data,
        })
    }

    /// Persist a fresh payload. Write failures are logged, never fatal.
    pub fn store(&self, date: NaiveDate, match_data: &MatchDay) {
        let path = self.path_for(date);
        if let Err(err) = write_snapshot(&path, match_data) {
            tracing::warn!("Unable to persist fixtures cache {}: {}", path.display(), err);
        }
    }
}

fn write_snapshot(path: &Path, match_data: &MatchDay) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let payload = SnapshotFileOut {
        cached_at: Utc::now().to_rfc3339(),
        match_data,
    };
    std::fs::write(path, serde_json::to_string(&payload)?)?;
    Ok(())
}

/// Whether the snapshot should replace what the fetch produced. An empty
/// fetch only defers to the snapshot when fixtures were seen upstream; a
/// genuine zero-fixture day stays empty.
pub fn should_use_snapshot(fetched: Option<&MatchDay>, cached: Option<&Snapshot>) -> bool {
    let Some(cached) = cached else {
        return false;
    };
    if cached.match_data.matches.is_empty() {
        return false;
    }
    let Some(fetched) = fetched else {
        return true;
    };
    if !fetched.matches.is_empty() {
        return false;
    }
    let metadata = &fetched.metadata;
    !(metadata.processed_fixtures == 0 && metadata.supported_fixtures == 0)
}

/// Fetch the day's fixtures, falling back to the snapshot when the fetch fails
/// or comes back suspiciously empty. Returns the data and whether the snapshot was used.
pub async fn load_match_data<F, Fut>(
    date: NaiveDate,
    store: Option<&SnapshotStore>,
    fetch: F,
) -> Result<(MatchDay, bool), FetchError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<MatchDay, FetchError>>,
{
    let cached = store.and_then(|store| store.load(date));

    let fetched = match fetch().await {
        Ok(fetched) => fetched,
        Err(err) => match cached {
            Some(snapshot) => {
                tracing::warn!("Fetch failed, using cached fixtures: {}", err);
                return Ok((snapshot.match_data, true));
            }
            None => return Err(err),
        },
    };

    if should_use_snapshot(Some(&fetched), cached.as_ref()) {
        if let Some(snapshot) = cached {
            tracing::warn!("Fetched fixtures were empty, using cached payload");
            return Ok((snapshot.match_data, true));
        }
    }

    if let Some(store) = store {
        if !fetched.matches.is_empty() {
            store.store(date, &fetched);
        }
    }

    Ok((fetched, false))
}
