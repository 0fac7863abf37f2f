use chrono::NaiveDate;

use crate::models::{AnalysisReport, AnalyzedMatch, Confidence, MatchDay, Predictions};
use crate::utils::escape_html;

const TOP_IN_MESSAGE: usize = 5;
const NOTES_PER_MATCH: usize = 2;

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "🔥 Alta",
        Confidence::Medium => "⚡ Média",
        Confidence::Low => "💡 Baixa",
    }
}

fn confidence_emoji(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "🔥",
        Confidence::Medium => "⚡",
        Confidence::Low => "💡",
    }
}

fn escape_join<'a>(values: impl IntoIterator<Item = &'a String>, separator: &str) -> String {
    values
        .into_iter()
        .map(|value| escape_html(value))
        .collect::<Vec<_>>()
        .join(separator)
}

/// `dd/mm/yyyy` for ISO dates, anything else verbatim.
fn display_date(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|parsed| parsed.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}

fn probability_lines(predictions: &Predictions) -> Vec<String> {
    let mut lines = Vec::new();
    let (home, draw, away) = (
        predictions.home_win_probability,
        predictions.draw_probability,
        predictions.away_win_probability,
    );
    if home > 0 || draw > 0 || away > 0 {
        lines.push(format!("↳ 📈 1X2: Casa {home}% | Empate {draw}% | Fora {away}%"));
    }
    let (over, under) = (predictions.over25_probability, predictions.under25_probability);
    if over > 0 || under > 0 {
        lines.push(format!("↳ ⚽ Linhas 2.5: Over {over}% | Under {under}%"));
    }
    let (yes, no) = (predictions.btts_yes_probability, predictions.btts_no_probability);
    if yes > 0 || no > 0 {
        lines.push(format!("↳ 🤝 Ambos marcam: Sim {yes}% | Não {no}%"));
    }
    lines
}

fn match_details(analyzed: &AnalyzedMatch, prefix: &str) -> Vec<String> {
    let record = &analyzed.record;
    let mut header = vec![
        prefix.to_string(),
        format!(
            "<b>{} vs {}</b>",
            escape_html(record.home_name()),
            escape_html(record.away_name())
        ),
    ];
    if let Some(time) = record.time.as_deref().filter(|time| !time.is_empty() && *time != "TBD") {
        header.push(format!("({})", escape_html(time)));
    }
    if let Some(league) = record.competition.name.as_deref().filter(|name| !name.is_empty()) {
        header.push(format!("— {}", escape_html(league)));
    }

    let mut lines = vec![header.join(" ")];
    lines.push(format!("↳ Confiança: {}", confidence_label(analyzed.confidence)));

    if analyzed.recommended_bets.is_empty() {
        lines.push("↳ 🎯 Sem recomendação automática — avaliar manualmente".to_string());
    } else {
        lines.push(format!("↳ 🎯 {}", escape_join(&analyzed.recommended_bets, " | ")));
    }

    lines.extend(probability_lines(&analyzed.predictions));

    if !analyzed.analysis_notes.is_empty() {
        let notes = analyzed.analysis_notes.iter().take(NOTES_PER_MATCH);
        lines.push(format!("↳ 📝 {}", escape_join(notes, " • ")));
    }

    lines
}

/// Daily Telegram message (HTML parse mode) for a fetched day and its analysis.
pub fn format_daily_message(match_day: &MatchDay, report: &AnalysisReport) -> String {
    let mut lines = vec![
        format!("🏆 <b>PREVISÕES FUTEBOL - {}</b>", escape_html(&display_date(&match_day.date))),
        String::new(),
        "📊 <b>Resumo Global:</b>".to_string(),
        format!("• {} jogos elegíveis nas competições suportadas", match_day.total_matches),
        format!("• {} jogos com odds válidas analisados", report.total_analyzed),
        format!(
            "• {} jogos de alta confiança | {} de média confiança",
            report.high_confidence_count, report.medium_confidence_count
        ),
        String::new(),
    ];

    let active: Vec<_> = report.breakdown_by_region.iter().filter(|region| region.total > 0).collect();
    if !active.is_empty() {
        lines.push("🌍 <b>Distribuição por Região:</b>".to_string());
        for region in active {
            lines.push(format!(
                "• {}: {} jogos ({} alta | {} média)",
                escape_html(&region.label),
                region.total,
                region.high_confidence,
                region.medium_confidence
            ));
        }
        lines.push(String::new());
    }

    if report.best_matches.is_empty() {
        lines.push("😔 <b>Não há jogos com odds interessantes hoje.</b>".to_string());
        lines.push("Voltamos amanhã com mais análises!".to_string());
        lines.push(String::new());
    } else {
        let top: Vec<&AnalyzedMatch> = report.best_matches.iter().take(TOP_IN_MESSAGE).collect();
        lines.push(format!("🔥 <b>TOP GLOBAL ({})</b>", top.len()));
        for analyzed in top {
            let mut details = match_details(analyzed, confidence_emoji(analyzed.confidence));
            if let Some(time) = analyzed.record.time.as_deref().filter(|time| !time.is_empty()) {
                let league = analyzed.record.competition.name.as_deref().unwrap_or("Horário a definir");
                details.insert(1, format!("↳ ⏰ {} | 🏆 {}", escape_html(time), escape_html(league)));
            }
            lines.extend(details);
            lines.push(String::new());
        }
    }

    let detailed: Vec<_> = report
        .best_matches_by_region
        .iter()
        .filter(|region| !region.matches.is_empty())
        .collect();
    if !detailed.is_empty() {
        lines.push("🗺️ <b>Lista completa por região/competição:</b>".to_string());
        for region in detailed {
            lines.push(format!("📍 <b>{}</b>", escape_html(&region.label)));
            for analyzed in &region.matches {
                lines.extend(match_details(analyzed, "•"));
                lines.push(String::new());
            }
        }
        if lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
    }

    lines.extend(
        [
            "",
            "💡 <b>Lembre-se:</b>",
            "• Aposte com responsabilidade",
            "• Nunca aposte mais do que pode perder",
            "• Estas são apenas previsões baseadas em probabilidades",
            "",
            "⚽ Boa sorte com as suas apostas!",
            "🤖 Bot de Previsões Futebol",
        ]
        .map(str::to_string),
    );

    lines.join("\n")
}

/// Reply to an owner `/insight` command for a single analyzed fixture.
pub fn format_match_insight(analyzed: &AnalyzedMatch) -> String {
    let record = &analyzed.record;
    let competition = &record.competition;
    let predictions = &analyzed.predictions;

    let mut lines = vec![
        "🔒 <b>Pedido do owner</b>".to_string(),
        format!(
            "🏟️ {} vs {}",
            escape_html(record.home_name()),
            escape_html(record.away_name())
        ),
    ];

    let mut competition_line = escape_html(competition.name.as_deref().unwrap_or("Competição desconhecida"));
    if let Some(region) = competition
        .region
        .as_deref()
        .or(competition.country.as_deref())
        .filter(|region| !region.is_empty())
    {
        competition_line.push_str(&format!(" · {}", escape_html(region)));
    }
    lines.push(format!("🏆 {competition_line}"));

    let date = record.date.as_deref().unwrap_or("");
    let time = record.time.as_deref().unwrap_or("");
    if !date.is_empty() || !time.is_empty() {
        let time = if time.is_empty() { "--:--" } else { time };
        lines.push(format!("🗓️ {} · {}", escape_html(date), escape_html(time)));
    }

    lines.push(String::new());
    lines.push("📊 Probabilidades estimadas".to_string());
    lines.push(format!("• Casa: {}%", predictions.home_win_probability));
    lines.push(format!("• Empate: {}%", predictions.draw_probability));
    lines.push(format!("• Fora: {}%", predictions.away_win_probability));
    lines.push(format!(
        "• Over 2.5: {}% | Under 2.5: {}%",
        predictions.over25_probability, predictions.under25_probability
    ));
    lines.push(format!(
        "• BTTS Sim: {}% | BTTS Não: {}%",
        predictions.btts_yes_probability, predictions.btts_no_probability
    ));

    lines.push(String::new());
    let label = match analyzed.confidence {
        Confidence::High => "Alta",
        Confidence::Medium => "Média",
        Confidence::Low => "Baixa",
    };
    lines.push(format!("🔥 Confiança geral: {label}"));

    if !analyzed.recommended_bets.is_empty() {
        lines.push(String::new());
        lines.push("🎯 Sugestões do modelo:".to_string());
        lines.extend(analyzed.recommended_bets.iter().map(|bet| format!("• {}", escape_html(bet))));
    }

    if !analyzed.analysis_notes.is_empty() {
        lines.push(String::new());
        lines.push("🧠 Pontos em destaque:".to_string());
        lines.extend(analyzed.analysis_notes.iter().map(|note| format!("• {}", escape_html(note))));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompetitionInfo, MatchRecord, MatchTeams, PredictionSources, RegionBreakdown, RegionMatches, TeamRef};

    fn analyzed(home: &str, away: &str, confidence: Confidence, bets: &[&str]) -> AnalyzedMatch {
        AnalyzedMatch {
            record: MatchRecord {
                date: Some("2025-10-14".into()),
                time: Some("20:00".into()),
                competition: CompetitionInfo {
                    name: Some("Primeira Liga".into()),
                    region: Some("portugal".into()),
                    ..Default::default()
                },
                teams: MatchTeams {
                    home: TeamRef {
                        name: Some(home.into()),
                        ..Default::default()
                    },
                    away: TeamRef {
                        name: Some(away.into()),
                        ..Default::default()
                    },
                },
                ..Default::default()
            },
            predictions: Predictions {
                home_win_probability: 55,
                draw_probability: 25,
                away_win_probability: 20,
                over25_probability: 60,
                under25_probability: 40,
                btts_yes_probability: 58,
                btts_no_probability: 42,
            },
            prediction_sources: PredictionSources::default(),
            recommended_bets: bets.iter().map(|bet| bet.to_string()).collect(),
            analysis_notes: vec!["Equipa em boa forma".into(), "Segunda nota".into(), "Terceira nota".into()],
            confidence,
            confidence_score: 0,
        }
    }

    fn day(total: usize) -> MatchDay {
        MatchDay {
            date: "2025-10-14".into(),
            total_matches: total,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_day_message() {
        let message = format_daily_message(&day(0), &AnalysisReport::default());
        assert!(message.starts_with("🏆 <b>PREVISÕES FUTEBOL - 14/10/2025</b>"));
        assert!(message.contains("• 0 jogos elegíveis nas competições suportadas"));
        assert!(message.contains("Não há jogos com odds interessantes"));
        assert!(!message.contains("Distribuição por Região"));
        assert!(message.ends_with("🤖 Bot de Previsões Futebol"));
    }

    #[test]
    fn test_daily_message_sections() {
        let top = analyzed("Alpha & Sons", "Beta", Confidence::Medium, &["✅ Favorito: Alpha (60%)"]);
        let report = AnalysisReport {
            total_analyzed: 1,
            best_matches: vec![top.clone()],
            all_matches: vec![top.clone()],
            medium_confidence_count: 1,
            breakdown_by_region: vec![
                RegionBreakdown {
                    region: "portugal".into(),
                    label: "🇵🇹 Portugal".into(),
                    total: 1,
                    high_confidence: 0,
                    medium_confidence: 1,
                },
                RegionBreakdown {
                    region: "england".into(),
                    label: "Inglaterra".into(),
                    total: 0,
                    high_confidence: 0,
                    medium_confidence: 0,
                },
            ],
            best_matches_by_region: vec![RegionMatches {
                region: "portugal".into(),
                label: "🇵🇹 Portugal".into(),
                matches: vec![top.clone()],
                top_matches: vec![top],
            }],
            ..Default::default()
        };

        let message = format_daily_message(&day(1), &report);
        assert!(message.contains("🔥 <b>TOP GLOBAL (1)</b>"));
        assert!(message.contains("⚡ <b>Alpha &amp; Sons vs Beta</b> (20:00) — Primeira Liga"));
        assert!(message.contains("↳ ⏰ 20:00 | 🏆 Primeira Liga"));
        assert!(message.contains("• 🇵🇹 Portugal: 1 jogos (0 alta | 1 média)"));
        assert!(!message.contains("Inglaterra"));
        assert!(message.contains("↳ 📈 1X2: Casa 55% | Empate 25% | Fora 20%"));
        assert!(message.contains("↳ 📝 Equipa em boa forma • Segunda nota"));
        assert!(!message.contains("Terceira nota"));
        assert!(message.contains("📍 <b>🇵🇹 Portugal</b>"));
        assert!(!message.contains("Não há jogos com odds interessantes"));
    }

    #[test]
    fn test_match_without_bets_asks_for_manual_review() {
        let mut item = analyzed("Team A", "Team B", Confidence::Low, &[]);
        item.predictions = Predictions::default();
        let lines = match_details(&item, "•");
        assert_eq!(lines[0], "• <b>Team A vs Team B</b> (20:00) — Primeira Liga");
        assert!(lines.iter().any(|line| line.contains("Sem recomendação automática")));
        assert!(!lines.iter().any(|line| line.contains("1X2")));
    }

    #[test]
    fn test_match_insight_sections() {
        let item = analyzed("Benfica", "Porto", Confidence::High, &["Casa -1.0"]);
        let message = format_match_insight(&item);
        for fragment in [
            "Benfica vs Porto",
            "🏆 Primeira Liga · portugal",
            "🗓️ 2025-10-14 · 20:00",
            "Casa: 55%",
            "Over 2.5: 60% | Under 2.5: 40%",
            "🔥 Confiança geral: Alta",
            "Sugestões do modelo",
            "• Casa -1.0",
            "• Terceira nota",
        ] {
            assert!(message.contains(fragment), "missing {fragment}");
        }
    }
}
