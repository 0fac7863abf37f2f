use crate::models::{FormMatch, FormSummary, HeadToHeadMatch, HeadToHeadSummary, Streak, StreakKind};
use crate::services::data_fetcher::{ApiFixture, GoalPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Winner {
    Home,
    Away,
    Draw,
}

/// Outcome from one team's point of view, serialized as V/E/D.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchResult {
    Win,
    Draw,
    Loss,
}

impl MatchResult {
    fn code(self) -> &'static str {
        match self {
            MatchResult::Win => "V",
            MatchResult::Draw => "E",
            MatchResult::Loss => "D",
        }
    }

    fn streak_kind(self) -> StreakKind {
        match self {
            MatchResult::Win => StreakKind::Win,
            MatchResult::Draw => StreakKind::Draw,
            MatchResult::Loss => StreakKind::Loss,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Final score, falling back through full time, extra time and penalties
/// when the goals pair is missing.
fn extract_score(fixture: &ApiFixture) -> (i64, i64) {
    let breakdown = &fixture.score;
    let fallback = |pick: fn(&GoalPair) -> Option<i64>| {
        [&breakdown.fulltime, &breakdown.extratime, &breakdown.penalty]
            .into_iter()
            .filter_map(pick)
            .find(|goals| *goals != 0)
            .unwrap_or(0)
    };
    let home = fixture.goals.home.unwrap_or_else(|| fallback(|pair| pair.home));
    let away = fixture.goals.away.unwrap_or_else(|| fallback(|pair| pair.away));
    (home, away)
}

/// Winner flags beat the scoreline, which covers shoot-outs.
fn winner(fixture: &ApiFixture, home_goals: i64, away_goals: i64) -> Winner {
    match (fixture.teams.home.winner, fixture.teams.away.winner) {
        (Some(true), Some(false)) => Winner::Home,
        (Some(false), Some(true)) => Winner::Away,
        _ if home_goals > away_goals => Winner::Home,
        _ if away_goals > home_goals => Winner::Away,
        _ => Winner::Draw,
    }
}

fn most_recent_first(fixtures: &[ApiFixture]) -> Vec<&ApiFixture> {
    let mut ordered: Vec<&ApiFixture> = fixtures.iter().collect();
    ordered.sort_by_key(|fixture| std::cmp::Reverse(fixture.fixture.timestamp.unwrap_or(0)));
    ordered
}

pub fn summarize_team_form(team_id: i64, fixtures: &[ApiFixture]) -> Option<FormSummary> {
    if team_id == 0 || fixtures.is_empty() {
        return None;
    }

    let mut summary = FormSummary::default();
    let mut results = Vec::new();
    let (mut goals_for, mut goals_against) = (0i64, 0i64);

    for fixture in most_recent_first(fixtures) {
        let (home_goals, away_goals) = extract_score(fixture);
        let is_home = fixture.teams.home.id == Some(team_id);
        let opponent = if is_home { &fixture.teams.away } else { &fixture.teams.home };

        let own_side = if is_home { Winner::Home } else { Winner::Away };
        let result = match winner(fixture, home_goals, away_goals) {
            Winner::Draw => MatchResult::Draw,
            side if side == own_side => MatchResult::Win,
            _ => MatchResult::Loss,
        };

        let (scored, conceded) = if is_home {
            (home_goals, away_goals)
        } else {
            (away_goals, home_goals)
        };
        goals_for += scored;
        goals_against += conceded;

        match result {
            MatchResult::Win => summary.wins += 1,
            MatchResult::Draw => summary.draws += 1,
            MatchResult::Loss => summary.losses += 1,
        }
        if conceded == 0 {
            summary.clean_sheets += 1;
        }
        if scored == 0 {
            summary.failed_to_score += 1;
        }

        results.push(result);
        summary.matches.push(FormMatch {
            fixture_id: fixture.fixture.id,
            date: fixture.fixture.date.clone(),
            opponent: opponent.name.clone(),
            competition: fixture.league.name.clone(),
            score: format!("{home_goals}-{away_goals}"),
            result: result.code().to_string(),
        });
    }

    let total = results.len() as u32;
    let first = *results.first()?;
    let count = results.iter().take_while(|result| **result == first).count() as u32;
    let kind = first.streak_kind();

    let sample = f64::from(total);
    summary.sample_size = total;
    summary.win_rate = f64::from(summary.wins) / sample;
    summary.draw_rate = f64::from(summary.draws) / sample;
    summary.loss_rate = f64::from(summary.losses) / sample;
    summary.form_points = summary.wins * 3 + summary.draws;
    summary.avg_goals_for = round2(goals_for as f64 / sample);
    summary.avg_goals_against = round2(goals_against as f64 / sample);
    summary.avg_goals_total = round2((goals_for + goals_against) as f64 / sample);
    summary.goal_difference_avg = round2(summary.avg_goals_for - summary.avg_goals_against);
    summary.recent_record = results.iter().map(|result| result.code()).collect();
    summary.current_streak = Streak { kind, count };

    Some(summary)
}

/// Head-to-head from the point of view of the upcoming fixture's home side.
pub fn summarize_head_to_head(home_id: i64, away_id: i64, fixtures: &[ApiFixture]) -> Option<HeadToHeadSummary> {
    if home_id == 0 || away_id == 0 || fixtures.is_empty() {
        return None;
    }

    let mut summary = HeadToHeadSummary::default();
    let mut total_goals = 0i64;

    for fixture in most_recent_first(fixtures) {
        let (home_goals, away_goals) = extract_score(fixture);
        let was_home = fixture.teams.home.id == Some(home_id);

        let home_side_won = match winner(fixture, home_goals, away_goals) {
            Winner::Home => Some(was_home),
            Winner::Away => Some(!was_home),
            Winner::Draw => None,
        };
        let result = match home_side_won {
            None => MatchResult::Draw,
            Some(true) => MatchResult::Win,
            Some(false) => MatchResult::Loss,
        };
        match result {
            MatchResult::Win => summary.home_wins += 1,
            MatchResult::Draw => summary.draws += 1,
            MatchResult::Loss => summary.away_wins += 1,
        }

        summary.matches.push(HeadToHeadMatch {
            fixture_id: fixture.fixture.id,
            date: fixture.fixture.date.clone(),
            venue: fixture.fixture.venue.as_ref().and_then(|venue| venue.name.clone()),
            score: format!("{home_goals}-{away_goals}"),
            result: result.code().to_string(),
        });
        total_goals += home_goals + away_goals;
    }

    summary.sample_size = summary.matches.len() as u32;
    summary.avg_goals_total = round2(total_goals as f64 / f64::from(summary.sample_size));
    Some(summary)
}
