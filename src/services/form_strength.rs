use crate::models::{FormSummary, StreakKind};
use crate::utils::round_half_even;

/// Strength assumed for a side without form when the opponent has some.
pub const MISSING_FORM_STRENGTH: f64 = 0.85;
const STRENGTH_FLOOR: f64 = 0.35;
/// Home/draw/away split used when neither side has form.
pub const PRIOR_SPLIT: (u8, u8, u8) = (38, 24, 38);

/// Relative strength of a side from its recent form. Only meaningful when
/// compared against the opponent's score.
pub fn strength(form: Option<&FormSummary>) -> f64 {
    let Some(form) = form else {
        return MISSING_FORM_STRENGTH;
    };

    let momentum = if form.sample_size > 0 {
        (form.form_points as f64 / (form.sample_size as f64 * 3.0)).min(1.0)
    } else {
        0.0
    };
    let defence_quality = (3.0 - form.avg_goals_against.min(3.0)).max(0.0) / 3.0;
    let attack_quality = form.avg_goals_for.max(0.0).min(4.0) / 4.0;
    let streak_weight = form.current_streak.count.min(5) as f64 * 0.08;
    let streak_bonus = match form.current_streak.kind {
        StreakKind::Win => streak_weight,
        StreakKind::Loss => -streak_weight,
        StreakKind::Draw => 0.0,
    };

    let score = 1.0
        + form.win_rate * 1.8
        + (1.0 - form.loss_rate) * 0.6
        + form.draw_rate * 0.3
        + form.goal_difference_avg.clamp(-3.5, 3.5) * 0.12
        + momentum * 0.4
        + attack_quality * 0.25
        + defence_quality * 0.2
        + streak_bonus;

    score.max(STRENGTH_FLOOR)
}

/// Draw weight in the 1X2 split, raised by draw-prone and low-scoring sides.
pub fn draw_component(home: Option<&FormSummary>, away: Option<&FormSummary>) -> f64 {
    let sides: Vec<&FormSummary> = [home, away].into_iter().flatten().collect();
    if sides.is_empty() {
        return 0.9;
    }
    let contribution: f64 = sides
        .iter()
        .map(|form| form.draw_rate * 1.2 + (2.2 - form.avg_goals_total).max(0.0) * 0.2)
        .sum();
    (0.9 + contribution / sides.len() as f64).clamp(0.5, 1.8)
}

/// Home/draw/away percentages from the two sides' form. The three values sum to 100.
pub fn split_match_winner(home: Option<&FormSummary>, away: Option<&FormSummary>) -> (u8, u8, u8) {
    if home.is_none() && away.is_none() {
        return PRIOR_SPLIT;
    }

    let home_strength = strength(home);
    let away_strength = strength(away);
    let draw = draw_component(home, away);
    let total = home_strength + away_strength + draw;

    let home_pct = round_half_even(home_strength / total * 100.0);
    let draw_pct = round_half_even(draw / total * 100.0);
    let away_pct = (100 - home_pct - draw_pct).max(0);

    (clamp_pct(home_pct), clamp_pct(draw_pct), clamp_pct(away_pct))
}

/// Over/under 2.5 estimate from average match goals. `None` without any side form.
pub fn goals_estimate(home: Option<&FormSummary>, away: Option<&FormSummary>) -> Option<(u8, u8)> {
    let avg = mean_goals_total(home, away)?;

    let (over, under) = if avg >= 3.2 {
        let over = round_half_even(62.0 + (avg - 3.2) * 12.0).min(78);
        (over, (100 - over).max(18))
    } else if avg <= 1.8 {
        let under = round_half_even(64.0 + (1.8 - avg) * 18.0).min(80);
        ((100 - under).max(18), under)
    } else {
        let tilt = (avg - 2.5) * 18.0;
        let over = round_half_even(52.0 + tilt).clamp(40, 60);
        (over, (100 - over).clamp(40, 60))
    };

    Some((clamp_pct(over), clamp_pct(under)))
}

/// BTTS yes/no estimate from clean sheets, blanks and scoring rate. `None` without any side form.
pub fn btts_estimate(home: Option<&FormSummary>, away: Option<&FormSummary>) -> Option<(u8, u8)> {
    let avg = mean_goals_total(home, away)?;
    let sides: Vec<&FormSummary> = [home, away].into_iter().flatten().collect();

    let samples: u32 = sides.iter().map(|form| form.sample_size).sum();
    let (shutout_rate, fail_rate) = if samples > 0 {
        let clean_sheets: u32 = sides.iter().map(|form| form.clean_sheets).sum();
        let failed: u32 = sides.iter().map(|form| form.failed_to_score).sum();
        (clean_sheets as f64 / samples as f64, failed as f64 / samples as f64)
    } else {
        (0.0, 0.0)
    };

    let yes_score = (1.0 - shutout_rate) * 0.5 + (1.0 - fail_rate) * 0.3 + (avg - 2.3).max(0.0) * 0.25;
    let no_score = shutout_rate * 0.5 + fail_rate * 0.3 + (2.3 - avg).max(0.0) * 0.25;

    let combined = yes_score + no_score;
    let winning = |score: f64| {
        if combined > 0.0 {
            round_half_even(score / combined * 100.0).clamp(35, 80)
        } else {
            50
        }
    };

    if yes_score >= no_score {
        let yes = winning(yes_score);
        Some((clamp_pct(yes), clamp_pct(100 - yes)))
    } else {
        let no = winning(no_score);
        Some((clamp_pct(100 - no), clamp_pct(no)))
    }
}

fn mean_goals_total(home: Option<&FormSummary>, away: Option<&FormSummary>) -> Option<f64> {
    let totals: Vec<f64> = [home, away]
        .into_iter()
        .flatten()
        .map(|form| form.avg_goals_total)
        .collect();
    if totals.is_empty() {
        return None;
    }
    Some(totals.iter().sum::<f64>() / totals.len() as f64)
}

fn clamp_pct(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}
