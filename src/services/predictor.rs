use crate::models::{
    AnalyzedMatch, Confidence, MatchRecord, Predictions, PredictionSources, SignalSource, StreakKind,
};
use crate::services::form_strength;
use crate::services::normalizer::{
    canonical_market, classify_btts, classify_match_winner, classify_over_under, BttsOutcome,
    CanonicalMarket, MatchOutcome, TotalsSide,
};
use crate::utils::{implied_probability, normalize_text, parse_price, round_half_even};

const MAX_NOTES: usize = 3;
const VENDOR_HINT_PROBABILITY: u8 = 62;
const DEFAULT_THIRD_PARTY_NAME: &str = "Forebet";
const DEFAULT_VENDOR_NAME: &str = "API-FOOTBALL";

/// One source's opinion on a triple, field by field. `None` is no signal.
type Provider<const N: usize> = (SignalSource, fn(&MatchRecord) -> [Option<u8>; N]);

const MATCH_WINNER_PROVIDERS: [Provider<3>; 3] = [
    (SignalSource::Market, market_match_winner),
    (SignalSource::ThirdParty, third_party_match_winner),
    (SignalSource::Vendor, vendor_match_winner),
];

const TOTALS_PROVIDERS: [Provider<2>; 3] = [
    (SignalSource::Market, market_totals),
    (SignalSource::ThirdParty, third_party_totals),
    (SignalSource::Vendor, vendor_totals),
];

const BTTS_PROVIDERS: [Provider<2>; 3] = [
    (SignalSource::Market, market_btts),
    (SignalSource::ThirdParty, third_party_btts),
    (SignalSource::Vendor, vendor_btts),
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Slot {
    value: u8,
    source: Option<SignalSource>,
}

impl Slot {
    fn heuristic(value: u8) -> Self {
        Self {
            value,
            source: Some(SignalSource::Heuristic),
        }
    }
}

/// Per-match scorer: blends odds, external predictions and form into
/// probabilities, recommendations and a confidence tier.
#[derive(Debug, Default, Clone, Copy)]
pub struct PredictionEngine;

impl PredictionEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_match(&self, record: &MatchRecord) -> AnalyzedMatch {
        let mut match_winner = resolve(record, &MATCH_WINNER_PROVIDERS);
        if is_unset(&match_winner) && !record.form.is_empty() {
            let (home, draw, away) =
                form_strength::split_match_winner(record.form.home.as_ref(), record.form.away.as_ref());
            match_winner = [Slot::heuristic(home), Slot::heuristic(draw), Slot::heuristic(away)];
        }

        let mut totals = resolve(record, &TOTALS_PROVIDERS);
        if is_unset(&totals) {
            if let Some((over, under)) =
                form_strength::goals_estimate(record.form.home.as_ref(), record.form.away.as_ref())
            {
                totals = [Slot::heuristic(over), Slot::heuristic(under)];
            }
        }

        let mut btts = resolve(record, &BTTS_PROVIDERS);
        if is_unset(&btts) {
            if let Some((yes, no)) =
                form_strength::btts_estimate(record.form.home.as_ref(), record.form.away.as_ref())
            {
                btts = [Slot::heuristic(yes), Slot::heuristic(no)];
            }
        }

        let predictions = Predictions {
            home_win_probability: match_winner[0].value,
            draw_probability: match_winner[1].value,
            away_win_probability: match_winner[2].value,
            over25_probability: totals[0].value,
            under25_probability: totals[1].value,
            btts_yes_probability: btts[0].value,
            btts_no_probability: btts[1].value,
        };
        let sources = PredictionSources {
            home_win: match_winner[0].source,
            draw: match_winner[1].source,
            away_win: match_winner[2].source,
            over25: totals[0].source,
            under25: totals[1].source,
            btts_yes: btts[0].source,
            btts_no: btts[1].source,
        };

        let (recommended_bets, bet_points) = recommendations(record, &predictions);
        let (mut analysis_notes, note_points) = notes(record, &sources);
        analysis_notes.truncate(MAX_NOTES);

        let confidence_score = bet_points + note_points;
        let confidence = Confidence::from_score(confidence_score);

        tracing::debug!(
            "Analyzed {} vs {}: 1X2 {}/{}/{}, O/U {}/{}, BTTS {}/{}, confidence {:?} ({})",
            record.home_name(),
            record.away_name(),
            predictions.home_win_probability,
            predictions.draw_probability,
            predictions.away_win_probability,
            predictions.over25_probability,
            predictions.under25_probability,
            predictions.btts_yes_probability,
            predictions.btts_no_probability,
            confidence,
            confidence_score
        );

        AnalyzedMatch {
            record: record.clone(),
            predictions,
            prediction_sources: sources,
            recommended_bets,
            analysis_notes,
            confidence,
            confidence_score,
        }
    }
}

/// Walk the providers in order; each field keeps the first non-zero value offered.
fn resolve<const N: usize>(record: &MatchRecord, providers: &[Provider<N>]) -> [Slot; N] {
    let mut slots = [Slot::default(); N];
    for (source, provider) in providers {
        let offered = provider(record);
        for (slot, value) in slots.iter_mut().zip(offered) {
            if slot.value != 0 {
                continue;
            }
            if let Some(value) = value.filter(|value| *value > 0) {
                *slot = Slot {
                    value,
                    source: Some(*source),
                };
            }
        }
    }
    slots
}

fn is_unset(slots: &[Slot]) -> bool {
    slots.iter().all(|slot| slot.value == 0)
}

// ── Market odds ───────────────────────────────────────────────────────────────

/// First priced outcome per field across every raw market mapping to `market`.
fn market_signals<const N: usize>(
    record: &MatchRecord,
    market: CanonicalMarket,
    classify: impl Fn(&str) -> Option<usize>,
) -> [Option<u8>; N] {
    let mut found = [None; N];
    let outcomes = record
        .odds
        .iter()
        .filter(|raw| canonical_market(&raw.name) == Some(market))
        .flat_map(|raw| raw.values.iter());

    for outcome in outcomes {
        let Some(index) = classify(&outcome.value) else {
            continue;
        };
        if found[index].is_some() {
            continue;
        }
        let probability = outcome
            .odd
            .as_ref()
            .and_then(parse_price)
            .map(implied_probability)
            .unwrap_or(0);
        if probability > 0 {
            found[index] = Some(probability.min(100) as u8);
        }
    }
    found
}

fn market_match_winner(record: &MatchRecord) -> [Option<u8>; 3] {
    let home = record.teams.home.name.as_deref();
    let away = record.teams.away.name.as_deref();
    market_signals(record, CanonicalMarket::MatchWinner, |label| {
        classify_match_winner(label, home, away).map(|outcome| match outcome {
            MatchOutcome::Home => 0,
            MatchOutcome::Draw => 1,
            MatchOutcome::Away => 2,
        })
    })
}

fn market_totals(record: &MatchRecord) -> [Option<u8>; 2] {
    market_signals(record, CanonicalMarket::GoalsOverUnder, |label| {
        classify_over_under(label).map(|side| match side {
            TotalsSide::Over => 0,
            TotalsSide::Under => 1,
        })
    })
}

fn market_btts(record: &MatchRecord) -> [Option<u8>; 2] {
    market_signals(record, CanonicalMarket::BothTeamsScore, |label| {
        classify_btts(label).map(|outcome| match outcome {
            BttsOutcome::Yes => 0,
            BttsOutcome::No => 1,
        })
    })
}

// ── External predictions ──────────────────────────────────────────────────────

/// Integer percentage from an external source: rounded, positive, at most 100.
fn percent_signal(value: Option<f64>) -> Option<u8> {
    let value = value.filter(|value| value.is_finite())?;
    let rounded = round_half_even(value);
    (rounded > 0).then(|| rounded.min(100) as u8)
}

fn third_party_match_winner(record: &MatchRecord) -> [Option<u8>; 3] {
    let Some(prediction) = record.third_party.as_ref() else {
        return [None; 3];
    };
    [
        percent_signal(prediction.home_win_probability),
        percent_signal(prediction.draw_probability),
        percent_signal(prediction.away_win_probability),
    ]
}

fn third_party_totals(record: &MatchRecord) -> [Option<u8>; 2] {
    let Some(prediction) = record.third_party.as_ref() else {
        return [None; 2];
    };
    [
        percent_signal(prediction.over25_probability),
        percent_signal(prediction.under25_probability),
    ]
}

fn third_party_btts(record: &MatchRecord) -> [Option<u8>; 2] {
    let Some(prediction) = record.third_party.as_ref() else {
        return [None; 2];
    };
    [
        percent_signal(prediction.btts_yes_probability),
        percent_signal(prediction.btts_no_probability),
    ]
}

fn vendor_match_winner(record: &MatchRecord) -> [Option<u8>; 3] {
    let Some(prediction) = record.vendor.as_ref() else {
        return [None; 3];
    };
    [
        percent_signal(prediction.home_win_probability),
        percent_signal(prediction.draw_probability),
        percent_signal(prediction.away_win_probability),
    ]
}

/// Direct percentages first, then the predicted goals total, then the textual hint.
fn vendor_totals(record: &MatchRecord) -> [Option<u8>; 2] {
    let Some(prediction) = record.vendor.as_ref() else {
        return [None; 2];
    };

    let mut over = percent_signal(prediction.over25_probability);
    let mut under = percent_signal(prediction.under25_probability);

    if let Some(total) = prediction.predicted_total() {
        if total >= 3.0 {
            over = over.or(Some(round_half_even(55.0 + (total - 2.5) * 18.0).clamp(60, 85) as u8));
        } else if total <= 2.0 {
            under = under.or(Some(round_half_even(58.0 + (2.0 - total) * 18.0).clamp(60, 85) as u8));
        }
    }

    match prediction.under_over.as_deref().and_then(hint_side) {
        Some(TotalsSide::Over) => over = over.or(Some(VENDOR_HINT_PROBABILITY)),
        Some(TotalsSide::Under) => under = under.or(Some(VENDOR_HINT_PROBABILITY)),
        None => {}
    }

    [over, under]
}

fn vendor_btts(record: &MatchRecord) -> [Option<u8>; 2] {
    let Some(prediction) = record.vendor.as_ref() else {
        return [None; 2];
    };
    [
        percent_signal(prediction.btts_yes_probability),
        percent_signal(prediction.btts_no_probability),
    ]
}

/// `"Over 2.5"`, `"+2.5"` lean over; `"Under 2.5"`, `"-2.5"` lean under.
fn hint_side(hint: &str) -> Option<TotalsSide> {
    let hint = normalize_text(hint);
    if hint.contains("over") || hint.starts_with('+') {
        Some(TotalsSide::Over)
    } else if hint.contains("under") || hint.starts_with('-') {
        Some(TotalsSide::Under)
    } else {
        None
    }
}

// ── Recommendations & notes ───────────────────────────────────────────────────

fn recommendations(record: &MatchRecord, predictions: &Predictions) -> (Vec<String>, i32) {
    let mut bets = Vec::new();
    let mut points = 0;

    let max_probability = predictions.max_match_winner();
    let favourite = if predictions.away_win_probability > predictions.home_win_probability {
        record.away_name()
    } else {
        record.home_name()
    };
    if max_probability >= 70 {
        bets.push(format!("🏆 Forte favorito: {favourite} ({max_probability}%)"));
        points += 3;
    } else if max_probability >= 55 {
        bets.push(format!("✅ Favorito: {favourite} ({max_probability}%)"));
        points += 2;
    }

    if predictions.over25_probability >= 60 {
        bets.push(format!("⚽ Over 2.5 golos ({}%)", predictions.over25_probability));
        points += 2;
    } else if predictions.under25_probability >= 60 {
        bets.push(format!("🛡️ Under 2.5 golos ({}%)", predictions.under25_probability));
        points += 2;
    }

    if predictions.btts_yes_probability >= 60 {
        bets.push(format!("🥅 Ambos marcam: SIM ({}%)", predictions.btts_yes_probability));
        points += 1;
    } else if predictions.btts_no_probability >= 60 {
        bets.push(format!("🚫 Ambos marcam: NÃO ({}%)", predictions.btts_no_probability));
        points += 1;
    }

    (bets, points)
}

/// Form and head-to-head observations, in generation order. Points are
/// returned for every note, including those later dropped by the cap.
fn notes(record: &MatchRecord, sources: &PredictionSources) -> (Vec<String>, i32) {
    let mut notes = Vec::new();
    let mut points = 0;
    let form = &record.form;

    if let Some(home) = form.home.as_ref() {
        let streak = home.current_streak;
        if streak.kind == StreakKind::Win && streak.count >= 3 {
            notes.push(format!("🔥 {} vem de {} vitórias seguidas", record.home_name(), streak.count));
            points += 1;
        }
    }

    if let Some(away) = form.away.as_ref() {
        let streak = away.current_streak;
        if streak.kind == StreakKind::Loss && streak.count >= 2 {
            notes.push(format!("📉 {} soma {} derrotas seguidas", record.away_name(), streak.count));
            points += 1;
        }
    }

    let attack: Vec<f64> = [form.home.as_ref(), form.away.as_ref()]
        .into_iter()
        .flatten()
        .map(|side| side.avg_goals_for)
        .collect();
    if !attack.is_empty() {
        let average = attack.iter().sum::<f64>() / attack.len() as f64;
        if average >= 1.6 {
            notes.push(format!("⚡ Ataques inspirados: média de {average:.1} golos marcados por jogo"));
        } else if average <= 1.0 {
            notes.push(format!("🧱 Ataques pouco produtivos: média de {average:.1} golos marcados por jogo"));
        }
    }

    if let Some(h2h) = form.head_to_head.as_ref() {
        if h2h.home_wins >= 3 {
            notes.push(format!(
                "📊 {} venceu {} dos últimos {} confrontos diretos",
                record.home_name(),
                h2h.home_wins,
                h2h.sample_size
            ));
            points += 1;
        }
        if h2h.avg_goals_total >= 3.0 {
            notes.push(format!(
                "🎯 Confrontos diretos com média de {:.1} golos",
                h2h.avg_goals_total
            ));
        }
    }

    if let Some(attribution) = attribution(record, sources) {
        notes.push(attribution);
    }

    (notes, points)
}

fn attribution(record: &MatchRecord, sources: &PredictionSources) -> Option<String> {
    let mut names: Vec<&str> = Vec::new();
    for source in sources.iter().filter(|source| source.is_fallback()) {
        let name = match source {
            SignalSource::ThirdParty => record
                .third_party
                .as_ref()
                .and_then(|prediction| prediction.source.as_deref())
                .unwrap_or(DEFAULT_THIRD_PARTY_NAME),
            _ => record
                .vendor
                .as_ref()
                .and_then(|prediction| prediction.source.as_deref())
                .unwrap_or(DEFAULT_VENDOR_NAME),
        };
        if !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        return None;
    }
    Some(format!("ℹ️ Probabilidades complementadas com {}", names.join(" e ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FormSummary, HeadToHeadSummary, MatchForm, MatchTeams, OddsMarket, OutcomeOdds,
        PredictedGoals, Price, Streak, TeamRef, ThirdPartyPrediction, VendorPrediction,
    };

    fn market(name: &str, outcomes: &[(&str, &str)]) -> OddsMarket {
        OddsMarket {
            name: name.to_string(),
            values: outcomes
                .iter()
                .map(|(label, price)| OutcomeOdds {
                    value: label.to_string(),
                    odd: Some(Price::Text(price.to_string())),
                })
                .collect(),
        }
    }

    fn fixture(odds: Vec<OddsMarket>) -> MatchRecord {
        MatchRecord {
            fixture_id: Some(1),
            teams: MatchTeams {
                home: TeamRef {
                    name: Some("Benfica".into()),
                    ..Default::default()
                },
                away: TeamRef {
                    name: Some("Porto".into()),
                    ..Default::default()
                },
            },
            odds,
            ..Default::default()
        }
    }

    fn form(avg_for: f64, avg_total: f64, streak: Streak) -> FormSummary {
        FormSummary {
            sample_size: 5,
            wins: 3,
            draws: 1,
            losses: 1,
            win_rate: 0.6,
            draw_rate: 0.2,
            loss_rate: 0.2,
            form_points: 10,
            avg_goals_for: avg_for,
            avg_goals_against: 1.0,
            avg_goals_total: avg_total,
            goal_difference_avg: avg_for - 1.0,
            clean_sheets: 1,
            failed_to_score: 1,
            current_streak: streak,
            ..Default::default()
        }
    }

    #[test]
    fn test_market_odds_are_implied_without_normalisation() {
        let record = fixture(vec![market(
            "Match Winner",
            &[("Home", "1.50"), ("Draw", "4.00"), ("Away", "6.50")],
        )]);
        let analyzed = PredictionEngine::new().analyze_match(&record);

        assert_eq!(analyzed.predictions.home_win_probability, 67);
        assert_eq!(analyzed.predictions.draw_probability, 25);
        assert_eq!(analyzed.predictions.away_win_probability, 15);
        assert_eq!(analyzed.prediction_sources.home_win, Some(SignalSource::Market));
        assert_eq!(analyzed.recommended_bets, vec!["✅ Favorito: Benfica (67%)".to_string()]);
        assert_eq!(analyzed.confidence_score, 2);
        assert_eq!(analyzed.confidence, Confidence::Low);
    }

    #[test]
    fn test_market_beats_every_other_source() {
        let mut record = fixture(vec![market(
            "1X2",
            &[("1", "2.00"), ("X", "3.20"), ("2", "4.00")],
        )]);
        record.third_party = Some(ThirdPartyPrediction {
            home_win_probability: Some(20.0),
            draw_probability: Some(20.0),
            away_win_probability: Some(60.0),
            over25_probability: Some(64.4),
            under25_probability: Some(35.6),
            ..Default::default()
        });
        record.vendor = Some(VendorPrediction {
            home_win_probability: Some(10.0),
            away_win_probability: Some(80.0),
            ..Default::default()
        });
        record.form.home = Some(form(2.0, 3.0, Streak::default()));

        let analyzed = PredictionEngine::new().analyze_match(&record);
        let predictions = analyzed.predictions;
        assert_eq!(
            (predictions.home_win_probability, predictions.draw_probability, predictions.away_win_probability),
            (50, 31, 25)
        );
        assert_eq!(analyzed.prediction_sources.away_win, Some(SignalSource::Market));

        // no totals market, so the third party fills that triple
        assert_eq!(predictions.over25_probability, 64);
        assert_eq!(predictions.under25_probability, 36);
        assert_eq!(analyzed.prediction_sources.over25, Some(SignalSource::ThirdParty));
        assert!(analyzed
            .analysis_notes
            .iter()
            .any(|note| note.contains("complementadas com Forebet")));
    }

    #[test]
    fn test_form_only_match_winner_sums_to_hundred() {
        let mut record = fixture(Vec::new());
        record.form = MatchForm {
            home: Some(form(2.2, 3.1, Streak::default())),
            away: Some(form(0.8, 2.0, Streak::default())),
            head_to_head: None,
        };
        let predictions = PredictionEngine::new().analyze_match(&record).predictions;
        let sum = predictions.home_win_probability as u32
            + predictions.draw_probability as u32
            + predictions.away_win_probability as u32;
        assert_eq!(sum, 100);
        assert!(predictions.home_win_probability > predictions.away_win_probability);
        assert!(predictions.over25_probability > 0);
        assert!(predictions.btts_yes_probability > 0);
    }

    #[test]
    fn test_streak_note_counts_with_market_odds() {
        let mut record = fixture(vec![
            market("Match Winner", &[("Home", "1.30"), ("Away", "9.00")]),
            market("Both Teams Score", &[("Yes", "2.00"), ("No", "1.90")]),
        ]);
        record.form.home = Some(form(
            2.0,
            2.8,
            Streak {
                kind: StreakKind::Win,
                count: 4,
            },
        ));
        let analyzed = PredictionEngine::new().analyze_match(&record);

        assert_eq!(analyzed.prediction_sources.home_win, Some(SignalSource::Market));
        assert_eq!(analyzed.analysis_notes[0], "🔥 Benfica vem de 4 vitórias seguidas");
        // strong favourite (+3) and the streak (+1)
        assert_eq!(analyzed.confidence_score, 4);
        assert_eq!(analyzed.confidence, Confidence::Medium);
    }

    #[test]
    fn test_partial_triple_is_not_backfilled() {
        let mut record = fixture(vec![market("Match Winner", &[("Home", "2.00")])]);
        record.form.home = Some(form(1.5, 2.5, Streak::default()));
        record.form.away = Some(form(1.5, 2.5, Streak::default()));
        let analyzed = PredictionEngine::new().analyze_match(&record);

        assert_eq!(analyzed.predictions.home_win_probability, 50);
        assert_eq!(analyzed.predictions.draw_probability, 0);
        assert_eq!(analyzed.predictions.away_win_probability, 0);
        assert_eq!(analyzed.prediction_sources.draw, None);
        assert_eq!(analyzed.prediction_sources.over25, Some(SignalSource::Heuristic));
    }

    #[test]
    fn test_match_without_any_signal() {
        let analyzed = PredictionEngine::new().analyze_match(&fixture(Vec::new()));
        assert_eq!(analyzed.predictions, Predictions::default());
        assert_eq!(analyzed.prediction_sources, PredictionSources::default());
        assert!(analyzed.recommended_bets.is_empty());
        assert!(analyzed.analysis_notes.is_empty());
        assert_eq!(analyzed.confidence, Confidence::Low);
    }

    #[test]
    fn test_unparseable_prices_do_not_block_later_entries() {
        let record = fixture(vec![
            market("Match Winner", &[("Home", "n/a"), ("Home", "1.80"), ("Home", "1.20")]),
            market("Goals Over/Under", &[("Over 3.5", "1.50"), ("Over 2.5", "1.70")]),
        ]);
        let predictions = PredictionEngine::new().analyze_match(&record).predictions;
        assert_eq!(predictions.home_win_probability, 56);
        assert_eq!(predictions.over25_probability, 59);
        assert_eq!(predictions.under25_probability, 0);
    }

    #[test]
    fn test_vendor_goals_and_hint() {
        let mut record = fixture(Vec::new());
        record.vendor = Some(VendorPrediction {
            predicted_goals: Some(PredictedGoals {
                home: Some(2.0),
                away: Some(1.5),
            }),
            under_over: Some("Under 2.5".into()),
            ..Default::default()
        });
        let analyzed = PredictionEngine::new().analyze_match(&record);

        assert_eq!(analyzed.predictions.over25_probability, 73);
        assert_eq!(analyzed.predictions.under25_probability, 62);
        assert_eq!(analyzed.prediction_sources.under25, Some(SignalSource::Vendor));
        assert_eq!(
            analyzed.recommended_bets,
            vec!["⚽ Over 2.5 golos (73%)".to_string()]
        );
        assert_eq!(
            analyzed.analysis_notes,
            vec!["ℹ️ Probabilidades complementadas com API-FOOTBALL".to_string()]
        );
    }

    #[test]
    fn test_vendor_low_total_leans_under() {
        let mut record = fixture(Vec::new());
        record.vendor = Some(VendorPrediction {
            predicted_goals: Some(PredictedGoals {
                home: Some(0.5),
                away: Some(1.0),
            }),
            under_over: Some("-3.5".into()),
            ..Default::default()
        });
        let predictions = PredictionEngine::new().analyze_match(&record).predictions;
        assert_eq!(predictions.under25_probability, 67);
        assert_eq!(predictions.over25_probability, 0);
    }

    #[test]
    fn test_third_party_values_are_rounded_and_capped() {
        let mut record = fixture(Vec::new());
        record.third_party = Some(ThirdPartyPrediction {
            source: Some("Scraper".into()),
            home_win_probability: Some(48.6),
            draw_probability: Some(0.0),
            away_win_probability: Some(120.0),
            ..Default::default()
        });
        let analyzed = PredictionEngine::new().analyze_match(&record);
        assert_eq!(analyzed.predictions.home_win_probability, 49);
        assert_eq!(analyzed.predictions.draw_probability, 0);
        assert_eq!(analyzed.predictions.away_win_probability, 100);
        assert_eq!(analyzed.recommended_bets, vec!["🏆 Forte favorito: Porto (100%)".to_string()]);
        assert!(analyzed.analysis_notes[0].ends_with("Scraper"));
    }

    #[test]
    fn test_notes_are_capped_but_all_points_count() {
        let mut record = fixture(vec![
            market("Match Winner", &[("Home", "2.50"), ("Draw", "3.30"), ("Away", "3.00")]),
            market("Goals Over/Under", &[("Over 2.5", "1.90"), ("Under 2.5", "1.90")]),
            market("Both Teams Score", &[("Yes", "1.80"), ("No", "2.00")]),
        ]);
        record.form = MatchForm {
            home: Some(form(2.0, 3.0, Streak { kind: StreakKind::Win, count: 3 })),
            away: Some(form(1.4, 2.6, Streak { kind: StreakKind::Loss, count: 2 })),
            head_to_head: Some(HeadToHeadSummary {
                sample_size: 5,
                home_wins: 3,
                away_wins: 1,
                draws: 1,
                avg_goals_total: 3.5,
                ..Default::default()
            }),
        };
        let analyzed = PredictionEngine::new().analyze_match(&record);

        assert!(analyzed.recommended_bets.is_empty());
        assert_eq!(analyzed.analysis_notes.len(), 3);
        assert!(analyzed.analysis_notes[2].starts_with("⚡"));
        assert_eq!(analyzed.confidence_score, 3);
        assert_eq!(analyzed.confidence, Confidence::Medium);
    }

    #[test]
    fn test_analysis_is_repeatable() {
        let mut record = fixture(vec![market("Both Teams Score", &[("Sim", "1.55")])]);
        record.form.away = Some(form(0.6, 1.6, Streak::default()));
        let engine = PredictionEngine::new();
        assert_eq!(engine.analyze_match(&record), engine.analyze_match(&record));
    }

    #[test]
    fn test_head_to_head_alone_uses_prior_split() {
        let mut record = fixture(Vec::new());
        record.form = MatchForm {
            home: None,
            away: None,
            head_to_head: Some(HeadToHeadSummary {
                sample_size: 2,
                home_wins: 1,
                away_wins: 1,
                draws: 0,
                avg_goals_total: 2.0,
                ..Default::default()
            }),
        };
        let analyzed = PredictionEngine::new().analyze_match(&record);
        let p = &analyzed.predictions;

        assert_eq!(
            (p.home_win_probability, p.draw_probability, p.away_win_probability),
            (38, 24, 38)
        );
        let sources = &analyzed.prediction_sources;
        assert_eq!(sources.home_win, Some(SignalSource::Heuristic));
        assert_eq!(sources.draw, Some(SignalSource::Heuristic));
        assert_eq!(sources.away_win, Some(SignalSource::Heuristic));

        // totals and BTTS need team form, not just meetings
        assert_eq!((p.over25_probability, p.under25_probability), (0, 0));
        assert_eq!((p.btts_yes_probability, p.btts_no_probability), (0, 0));
        assert_eq!(sources.over25, None);
        assert_eq!(sources.btts_yes, None);
    }
}
