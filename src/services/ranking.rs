use std::collections::HashMap;

use crate::models::{AnalysisReport, AnalyzedMatch, Confidence, MatchRecord, RegionBreakdown, RegionMatches};
use crate::services::competitions::CompetitionIndex;
use crate::services::predictor::PredictionEngine;

const TOP_GLOBAL: usize = 10;
const TOP_PER_REGION: usize = 5;

/// Sort key, higher first: confidence tier, then number of bets, then the 1X2 favourite.
pub fn ranking_score(analyzed: &AnalyzedMatch) -> i64 {
    analyzed.confidence.rank() * 1000
        + analyzed.recommended_bets.len() as i64 * 10
        + analyzed.predictions.max_match_winner() as i64
}

/// Stable descending sort, so equal scores keep their input order.
fn rank(matches: &mut [AnalyzedMatch]) {
    matches.sort_by_key(|analyzed| std::cmp::Reverse(ranking_score(analyzed)));
}

pub fn analyze_matches(matches: &[MatchRecord], index: &CompetitionIndex) -> AnalysisReport {
    tracing::info!("Analyzing {} matches", matches.len());

    let engine = PredictionEngine::new();
    let analyzed: Vec<AnalyzedMatch> = matches.iter().map(|record| engine.analyze_match(record)).collect();

    let mut buckets: HashMap<&str, Vec<AnalyzedMatch>> = index
        .region_order()
        .iter()
        .map(|region| (region.as_str(), Vec::new()))
        .collect();
    for item in &analyzed {
        let Some(region) = item.record.competition.region.as_deref() else {
            continue;
        };
        if let Some(bucket) = buckets.get_mut(region) {
            bucket.push(item.clone());
        }
    }

    let mut breakdown_by_region = Vec::with_capacity(index.region_order().len());
    let mut best_matches_by_region = Vec::with_capacity(index.region_order().len());
    for region in index.region_order() {
        let mut region_matches = buckets.remove(region.as_str()).unwrap_or_default();
        rank(&mut region_matches);
        let label = index.region_label(region).to_string();

        breakdown_by_region.push(RegionBreakdown {
            region: region.clone(),
            label: label.clone(),
            total: region_matches.len(),
            high_confidence: count_tier(&region_matches, Confidence::High),
            medium_confidence: count_tier(&region_matches, Confidence::Medium),
        });
        best_matches_by_region.push(RegionMatches {
            region: region.clone(),
            label,
            top_matches: region_matches.iter().take(TOP_PER_REGION).cloned().collect(),
            matches: region_matches,
        });
    }

    let mut all_matches = analyzed;
    rank(&mut all_matches);

    let report = AnalysisReport {
        total_analyzed: all_matches.len(),
        best_matches: all_matches.iter().take(TOP_GLOBAL).cloned().collect(),
        high_confidence_count: count_tier(&all_matches, Confidence::High),
        medium_confidence_count: count_tier(&all_matches, Confidence::Medium),
        all_matches,
        breakdown_by_region,
        best_matches_by_region,
    };

    tracing::info!(
        "Analysis complete: {} matches, {} high confidence, {} medium confidence",
        report.total_analyzed,
        report.high_confidence_count,
        report.medium_confidence_count
    );

    report
}

fn count_tier(matches: &[AnalyzedMatch], tier: Confidence) -> usize {
    matches.iter().filter(|analyzed| analyzed.confidence == tier).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompetitionInfo, MatchTeams, OddsMarket, OutcomeOdds, Price, TeamRef};
    use crate::services::competitions::tests::sample_index;

    fn record(id: i64, region: Option<&str>, home_price: &str) -> MatchRecord {
        MatchRecord {
            fixture_id: Some(id),
            competition: CompetitionInfo {
                region: region.map(str::to_string),
                ..Default::default()
            },
            teams: MatchTeams {
                home: TeamRef {
                    name: Some(format!("Home {id}")),
                    ..Default::default()
                },
                away: TeamRef {
                    name: Some(format!("Away {id}")),
                    ..Default::default()
                },
            },
            odds: vec![OddsMarket {
                name: "Match Winner".into(),
                values: vec![OutcomeOdds {
                    value: "Home".into(),
                    odd: Some(Price::Text(home_price.into())),
                }],
            }],
            ..Default::default()
        }
    }

    fn ids(matches: &[AnalyzedMatch]) -> Vec<i64> {
        matches.iter().filter_map(|analyzed| analyzed.record.fixture_id).collect()
    }

    #[test]
    fn test_empty_input_lists_every_region() {
        let index = sample_index();
        let report = analyze_matches(&[], &index);

        assert_eq!(report.total_analyzed, 0);
        assert!(report.best_matches.is_empty());
        assert!(report.all_matches.is_empty());
        assert_eq!(report.high_confidence_count, 0);
        assert_eq!(report.medium_confidence_count, 0);
        let regions: Vec<&str> = report.breakdown_by_region.iter().map(|entry| entry.region.as_str()).collect();
        assert_eq!(regions, vec!["portugal", "england", "europe"]);
        assert!(report.breakdown_by_region.iter().all(|entry| entry.total == 0));
        assert!(report.best_matches_by_region.iter().all(|entry| entry.matches.is_empty()));
    }

    #[test]
    fn test_ranking_order_is_stable() {
        let index = sample_index();
        let matches = vec![
            record(1, Some("portugal"), "3.00"), // 33, no bet
            record(2, Some("england"), "1.25"),  // 80, strong favourite
            record(3, Some("portugal"), "1.70"), // 59, favourite
            record(4, Some("portugal"), "3.00"), // ties with 1
        ];
        let report = analyze_matches(&matches, &index);

        assert_eq!(ids(&report.all_matches), vec![2, 3, 1, 4]);
        assert_eq!(report.medium_confidence_count, 1);
        assert_eq!(ids(&report.best_matches_by_region[0].matches), vec![3, 1, 4]);
    }

    #[test]
    fn test_unknown_regions_stay_global_only() {
        let index = sample_index();
        let matches = vec![
            record(1, Some("portugal"), "2.00"),
            record(2, Some("asia"), "2.00"),
            record(3, None, "2.00"),
            record(4, Some("europe"), "2.00"),
        ];
        let report = analyze_matches(&matches, &index);

        assert_eq!(report.total_analyzed, 4);
        let bucketed: usize = report.breakdown_by_region.iter().map(|entry| entry.total).sum();
        assert_eq!(bucketed, 2);
        assert_eq!(report.breakdown_by_region[0].label, "Portugal");
        assert_eq!(report.breakdown_by_region[2].label, "europe");
    }

    #[test]
    fn test_top_slices() {
        let index = sample_index();
        let matches: Vec<MatchRecord> = (0..12).map(|id| record(id, Some("england"), "2.00")).collect();
        let report = analyze_matches(&matches, &index);

        assert_eq!(report.best_matches.len(), 10);
        assert_eq!(report.all_matches.len(), 12);
        let england = &report.best_matches_by_region[1];
        assert_eq!(england.matches.len(), 12);
        assert_eq!(ids(&england.top_matches), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_report_is_idempotent() {
        let index = sample_index();
        let matches = vec![record(1, Some("portugal"), "1.40"), record(2, Some("england"), "2.60")];
        assert_eq!(analyze_matches(&matches, &index), analyze_matches(&matches, &index));
    }
}
