use std::io::Write;

use crate::models::{AnalyzedMatch, Confidence};

const COLUMNS: [&str; 15] = [
    "fixture_id",
    "kickoff",
    "competition",
    "region",
    "home_team",
    "away_team",
    "home_win",
    "draw",
    "away_win",
    "over25",
    "under25",
    "btts_yes",
    "btts_no",
    "confidence",
    "recommendations",
];

fn confidence_key(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "high",
        Confidence::Medium => "medium",
        Confidence::Low => "low",
    }
}

fn kickoff(analyzed: &AnalyzedMatch) -> String {
    let record = &analyzed.record;
    match (record.date.as_deref(), record.time.as_deref()) {
        (Some(date), Some(time)) if date.len() >= 10 => format!("{} {}", &date[..10], time),
        (Some(date), _) => date.to_string(),
        (None, Some(time)) => time.to_string(),
        (None, None) => String::new(),
    }
}

/// One CSV row per analyzed match, written to any sink.
pub fn write_csv<W: Write>(matches: &[AnalyzedMatch], sink: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(COLUMNS)?;

    for analyzed in matches {
        let record = &analyzed.record;
        let p = &analyzed.predictions;
        writer.write_record([
            record.fixture_id.map(|id| id.to_string()).unwrap_or_default(),
            kickoff(analyzed),
            record.competition.name.clone().unwrap_or_default(),
            record.competition.region.clone().unwrap_or_default(),
            record.home_name().to_string(),
            record.away_name().to_string(),
            p.home_win_probability.to_string(),
            p.draw_probability.to_string(),
            p.away_win_probability.to_string(),
            p.over25_probability.to_string(),
            p.under25_probability.to_string(),
            p.btts_yes_probability.to_string(),
            p.btts_no_probability.to_string(),
            confidence_key(analyzed.confidence).to_string(),
            analyzed.recommended_bets.join(" | "),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn to_csv_string(matches: &[AnalyzedMatch]) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    write_csv(matches, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompetitionInfo, MatchRecord, MatchTeams, OddsMarket, OutcomeOdds, Price, TeamRef};
    use crate::services::predictor::PredictionEngine;

    fn analyzed() -> AnalyzedMatch {
        let record = MatchRecord {
            fixture_id: Some(77),
            date: Some("2025-10-15T20:00:00+00:00".into()),
            time: Some("20:00".into()),
            competition: CompetitionInfo {
                name: Some("Liga Portugal".into()),
                region: Some("portugal".into()),
                ..Default::default()
            },
            teams: MatchTeams {
                home: TeamRef {
                    name: Some("Benfica, SL".into()),
                    ..Default::default()
                },
                away: TeamRef {
                    name: Some("Porto".into()),
                    ..Default::default()
                },
            },
            odds: vec![OddsMarket {
                name: "Match Winner".into(),
                values: vec![
                    OutcomeOdds {
                        value: "Home".into(),
                        odd: Some(Price::Text("1.50".into())),
                    },
                    OutcomeOdds {
                        value: "Draw".into(),
                        odd: Some(Price::Text("4.00".into())),
                    },
                    OutcomeOdds {
                        value: "Away".into(),
                        odd: Some(Price::Text("6.50".into())),
                    },
                ],
            }],
            ..Default::default()
        };
        PredictionEngine::new().analyze_match(&record)
    }

    #[test]
    fn test_csv_rows() {
        let csv = to_csv_string(&[analyzed()]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("77,2025-10-15 20:00,Liga Portugal,portugal,\"Benfica, SL\",Porto,67,25,15,"));
        assert!(row.contains(",0,0,0,0,low,"));
        assert!(row.ends_with(",\"✅ Favorito: Benfica, SL (67%)\""));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let csv = to_csv_string(&[]).unwrap();
        assert_eq!(csv.trim_end(), COLUMNS.join(","));
    }
}
