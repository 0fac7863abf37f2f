use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::utils::normalize_text;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub key: String,
    pub display_name: String,
    pub region: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub country: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub api_football_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogueFile {
    competitions: Vec<Competition>,
    region_order: Vec<String>,
    region_label: HashMap<String, String>,
}

/// Supported competitions plus the declared region order used for bucketing.
/// Read-only once built.
#[derive(Debug, Clone)]
pub struct CompetitionIndex {
    competitions: Vec<Competition>,
    region_order: Vec<String>,
    region_label: HashMap<String, String>,
    names: Vec<HashSet<String>>,
    ids: HashMap<i64, usize>,
}

impl CompetitionIndex {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: CatalogueFile = serde_json::from_str(raw)?;
        Ok(Self::new(file.competitions, file.region_order, file.region_label))
    }

    pub fn new(
        competitions: Vec<Competition>,
        region_order: Vec<String>,
        region_label: HashMap<String, String>,
    ) -> Self {
        let mut names = Vec::with_capacity(competitions.len());
        let mut ids = HashMap::new();

        for (position, competition) in competitions.iter().enumerate() {
            let country = &competition.country;
            let mut candidates = vec![
                competition.display_name.clone(),
                country.clone(),
                format!("{country} {}", competition.display_name),
            ];
            for alias in &competition.aliases {
                candidates.push(alias.clone());
                candidates.push(format!("{country} {alias}"));
            }
            names.push(
                candidates
                    .iter()
                    .map(|name| normalize_text(name))
                    .filter(|name| !name.is_empty())
                    .collect(),
            );
            for id in &competition.api_football_ids {
                ids.insert(*id, position);
            }
        }

        Self {
            competitions,
            region_order,
            region_label,
            names,
            ids,
        }
    }

    /// Match a vendor league by id, then by name (optionally country-prefixed).
    pub fn identify(&self, id: Option<i64>, name: Option<&str>, country: Option<&str>) -> Option<&Competition> {
        if let Some(position) = id.and_then(|id| self.ids.get(&id)) {
            return self.competitions.get(*position);
        }

        let name = normalize_text(name?);
        if name.is_empty() {
            return None;
        }
        let qualified = country
            .map(normalize_text)
            .filter(|country| !country.is_empty())
            .map(|country| format!("{country} {name}"));

        self.names
            .iter()
            .position(|names| {
                names.contains(&name) || qualified.as_ref().is_some_and(|qualified| names.contains(qualified))
            })
            .and_then(|position| self.competitions.get(position))
    }

    pub fn get(&self, key: &str) -> Option<&Competition> {
        self.competitions.iter().find(|competition| competition.key == key)
    }

    pub fn competitions(&self) -> &[Competition] {
        &self.competitions
    }

    pub fn region_order(&self) -> &[String] {
        &self.region_order
    }

    pub fn is_known_region(&self, region: &str) -> bool {
        self.region_order.iter().any(|known| known == region)
    }

    pub fn region_label<'a>(&'a self, region: &'a str) -> &'a str {
        self.region_label.get(region).map(String::as_str).unwrap_or(region)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_index() -> CompetitionIndex {
        CompetitionIndex::from_json(
            r#"{
                "competitions": [
                    {"key": "pt-liga", "displayName": "Liga Portugal", "region": "portugal",
                     "type": "league", "country": "Portugal",
                     "aliases": ["Primeira Liga", "Liga Portugal Betclic"], "apiFootballIds": [94]},
                    {"key": "en-premier", "displayName": "Premier League", "region": "england",
                     "type": "league", "country": "England", "apiFootballIds": [39]},
                    {"key": "uefa-ucl", "displayName": "UEFA Champions League", "region": "europe",
                     "type": "cup", "country": "World", "aliases": ["Champions League"], "apiFootballIds": [2]}
                ],
                "regionOrder": ["portugal", "england", "europe"],
                "regionLabel": {"portugal": "Portugal", "england": "Inglaterra"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_identify_by_id_first() {
        let index = sample_index();
        let found = index.identify(Some(39), Some("Liga Portugal"), None).unwrap();
        assert_eq!(found.key, "en-premier");
    }

    #[test]
    fn test_identify_by_alias_and_country() {
        let index = sample_index();
        assert_eq!(index.identify(None, Some("primeira   LIGA"), None).unwrap().key, "pt-liga");
        assert_eq!(
            index.identify(Some(9999), Some("Champions League"), Some("World")).unwrap().key,
            "uefa-ucl"
        );
        assert_eq!(index.identify(None, Some("Premier League"), Some("England")).unwrap().key, "en-premier");
        assert!(index.identify(None, Some("Premier League"), Some("Russia")).is_some());
        assert!(index.identify(None, Some("Serie A"), Some("Italy")).is_none());
        assert!(index.identify(None, None, Some("Portugal")).is_none());
    }

    #[test]
    fn test_region_labels_fall_back_to_key() {
        let index = sample_index();
        assert_eq!(index.region_label("england"), "Inglaterra");
        assert_eq!(index.region_label("europe"), "europe");
        assert!(index.is_known_region("europe"));
        assert!(!index.is_known_region("asia"));
    }

    #[test]
    fn test_shipped_catalogue_parses() {
        let raw = include_str!("../../shared/competitions.json");
        let index = CompetitionIndex::from_json(raw).unwrap();
        assert!(!index.region_order().is_empty());
        for competition in index.competitions() {
            assert!(
                index.is_known_region(&competition.region),
                "{} has undeclared region {}",
                competition.key,
                competition.region
            );
        }
    }
}
