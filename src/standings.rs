use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{EntityId, Fixture, MatchResult, Team};

const WIN_POINTS: u32 = 3;
const DRAW_POINTS: u32 = 1;
const FORM_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Drawn,
    Lost,
}

impl Outcome {
    pub fn letter(self) -> char {
        match self {
            Outcome::Won => 'W',
            Outcome::Drawn => 'D',
            Outcome::Lost => 'L',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingRow {
    pub position: usize,
    pub team_id: EntityId,
    pub team: String,
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub points: u32,
    /// Latest first.
    pub form: Vec<Outcome>,
}

impl StandingRow {
    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }

    pub fn form_string(&self) -> String {
        self.form.iter().map(|o| o.letter()).collect()
    }
}

/// League table from recorded results. Teams of the league with no result
/// yet still get a row. With `league` unset every team is ranked together.
pub fn compute_standings(
    teams: &[Team],
    fixtures: &[Fixture],
    results: &[MatchResult],
    league: Option<&EntityId>,
) -> Vec<StandingRow> {
    let in_league = |team: &Team| league.is_none() || team.league_id.as_ref() == league;
    let mut rows: Vec<StandingRow> = teams
        .iter()
        .filter(|t| in_league(t))
        .map(|t| StandingRow {
            position: 0,
            team_id: t.id.clone(),
            team: t.name.clone(),
            played: 0,
            won: 0,
            drawn: 0,
            lost: 0,
            goals_for: 0,
            goals_against: 0,
            points: 0,
            form: Vec::new(),
        })
        .collect();
    let index: HashMap<EntityId, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (r.team_id.clone(), i))
        .collect();
    let fixtures_by_id: HashMap<&EntityId, &Fixture> = fixtures.iter().map(|f| (&f.id, f)).collect();

    let mut played: Vec<(&MatchResult, &Fixture)> = results
        .iter()
        .filter_map(|r| fixtures_by_id.get(&r.fixture_id).map(|f| (r, *f)))
        .collect();
    // Oldest first so form ends up latest first after the reverse below.
    played.sort_by(|a, b| a.1.match_date.cmp(&b.1.match_date));

    for (result, fixture) in played {
        let (Some(home), Some(away)) = (&fixture.home_team_id, &fixture.away_team_id) else {
            continue;
        };
        if let Some(&i) = index.get(home) {
            record(&mut rows[i], result.home_score, result.away_score);
        }
        if let Some(&i) = index.get(away) {
            record(&mut rows[i], result.away_score, result.home_score);
        }
    }

    for row in &mut rows {
        row.form.reverse();
        row.form.truncate(FORM_LEN);
    }
    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| b.goal_difference().cmp(&a.goal_difference()))
            .then_with(|| b.goals_for.cmp(&a.goals_for))
            .then_with(|| a.team.to_lowercase().cmp(&b.team.to_lowercase()))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.position = i + 1;
    }
    rows
}

fn record(row: &mut StandingRow, scored: u32, conceded: u32) {
    row.played += 1;
    row.goals_for = row.goals_for.saturating_add(scored);
    row.goals_against = row.goals_against.saturating_add(conceded);
    let outcome = match scored.cmp(&conceded) {
        Ordering::Greater => Outcome::Won,
        Ordering::Equal => Outcome::Drawn,
        Ordering::Less => Outcome::Lost,
    };
    match outcome {
        Outcome::Won => {
            row.won += 1;
            row.points = row.points.saturating_add(WIN_POINTS);
        }
        Outcome::Drawn => {
            row.drawn += 1;
            row.points = row.points.saturating_add(DRAW_POINTS);
        }
        Outcome::Lost => row.lost += 1,
    }
    row.form.push(outcome);
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::FixtureStatus;

    fn team(id: &str, name: &str, league: &str) -> Team {
        Team {
            id: EntityId::from(id),
            name: name.into(),
            league_id: Some(EntityId::from(league)),
            coach_id: None,
            league_name: None,
            coach_name: None,
        }
    }

    fn played(id: &str, home: &str, away: &str, day: u32) -> Fixture {
        Fixture {
            id: EntityId::from(id),
            league_id: None,
            home_team_id: Some(EntityId::from(home)),
            away_team_id: Some(EntityId::from(away)),
            venue_id: None,
            referee_id: None,
            match_date: NaiveDate::from_ymd_opt(2025, 3, day).and_then(|d| d.and_hms_opt(9, 0, 0)),
            status: FixtureStatus::Completed,
            home_team_name: None,
            away_team_name: None,
            venue_name: None,
        }
    }

    fn score(fixture: &str, home: u32, away: u32) -> MatchResult {
        MatchResult {
            id: EntityId::from(fixture),
            fixture_id: EntityId::from(fixture),
            home_score: home,
            away_score: away,
            recorded_at: None,
        }
    }

    #[test]
    fn ranks_by_points_then_goal_difference() {
        let teams = vec![
            team("1", "Lightning Bolts", "A"),
            team("2", "Thunder Hawks", "A"),
            team("3", "Fire Dragons", "A"),
            team("9", "Elsewhere", "B"),
        ];
        let fixtures = vec![played("f1", "1", "2", 1), played("f2", "2", "3", 8), played("f3", "3", "1", 15)];
        let results = vec![score("f1", 3, 0), score("f2", 1, 1), score("f3", 2, 2)];
        let table = compute_standings(&teams, &fixtures, &results, Some(&EntityId::from("A")));

        assert_eq!(table.len(), 3);
        assert_eq!(table[0].team, "Lightning Bolts");
        assert_eq!((table[0].points, table[0].goal_difference()), (4, 3));
        assert_eq!(table[0].form_string(), "DW");
        assert_eq!(table[1].team, "Fire Dragons");
        assert_eq!(table[2].points, 1);
        assert_eq!(table[2].position, 3);
    }

    #[test]
    fn teams_without_results_still_appear() {
        let teams = vec![team("1", "Bolts", "A"), team("2", "Hawks", "A")];
        let table = compute_standings(&teams, &[], &[], None);
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|r| r.played == 0));
        assert_eq!(table[0].team, "Bolts");
    }

    #[test]
    fn huge_scores_saturate_instead_of_overflowing() {
        let teams = vec![team("1", "Bolts", "A"), team("2", "Hawks", "A")];
        let fixtures = vec![played("f1", "1", "2", 1), played("f2", "1", "2", 8)];
        let results = vec![score("f1", u32::MAX, 0), score("f2", u32::MAX, 1)];
        let table = compute_standings(&teams, &fixtures, &results, None);

        assert_eq!(table[0].team, "Bolts");
        assert_eq!(table[0].goals_for, u32::MAX);
        assert_eq!(table[0].points, 6);
        assert_eq!(table[1].goals_against, u32::MAX);
        assert_eq!(table[1].goals_for, 1);
    }
}
