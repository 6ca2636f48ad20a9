//! Views derived from the loaded collections: which team a coach runs, and
//! the players, fixtures and results scoped to one team.
//!
//! Every function here is pure and tolerates partially loaded input; the
//! caller re-derives whenever a collection changes.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::model::{EntityId, Fixture, FixtureStatus, MatchResult, Player, Team, User};

pub const DEFAULT_SLICE: usize = 5;

/// The team whose coach is `user`, first in collection order.
pub fn resolve_coach_team<'a>(teams: &'a [Team], user: &User) -> Option<&'a Team> {
    teams
        .iter()
        .find(|team| team.coach_id.as_ref() == Some(&user.id))
}

/// Every team naming `user` as coach.
pub fn coach_teams<'a>(teams: &'a [Team], user: &User) -> Vec<&'a Team> {
    teams
        .iter()
        .filter(|team| team.coach_id.as_ref() == Some(&user.id))
        .collect()
}

pub fn team_players<'a>(players: &'a [Player], team: &Team) -> Vec<&'a Player> {
    players
        .iter()
        .filter(|p| p.team_id.as_ref() == Some(&team.id))
        .collect()
}

pub fn team_fixtures<'a>(fixtures: &'a [Fixture], team: &Team) -> Vec<&'a Fixture> {
    fixtures.iter().filter(|f| f.involves(&team.id)).collect()
}

/// Scheduled fixtures, soonest first, undated ones last.
pub fn upcoming_fixtures<'a>(fixtures: &[&'a Fixture], limit: usize) -> Vec<&'a Fixture> {
    let mut upcoming: Vec<&Fixture> = fixtures
        .iter()
        .copied()
        .filter(|f| f.status == FixtureStatus::Scheduled)
        .collect();
    upcoming.sort_by(|a, b| match (a.match_date, b.match_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    upcoming.truncate(limit);
    upcoming
}

/// Results whose fixture involves `team`. Results pointing at a fixture that
/// is not loaded yet are left out.
pub fn team_results<'a>(
    results: &'a [MatchResult],
    fixtures: &[Fixture],
    team: &Team,
) -> Vec<&'a MatchResult> {
    let team_fixture_ids: HashSet<&EntityId> = fixtures
        .iter()
        .filter(|f| f.involves(&team.id))
        .map(|f| &f.id)
        .collect();
    results
        .iter()
        .filter(|r| team_fixture_ids.contains(&r.fixture_id))
        .collect()
}

/// Most recent first, by the date of the fixture each result belongs to.
pub fn recent_results<'a>(
    results: &[&'a MatchResult],
    fixtures: &[Fixture],
    limit: usize,
) -> Vec<&'a MatchResult> {
    let played_at = |r: &MatchResult| {
        fixtures
            .iter()
            .find(|f| f.id == r.fixture_id)
            .and_then(|f| f.match_date)
            .or(r.recorded_at)
    };
    let mut recent: Vec<&MatchResult> = results.to_vec();
    recent.sort_by(|a, b| match (played_at(a), played_at(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    recent.truncate(limit);
    recent
}

/// Fixtures a result can be recorded for. When `editing` names a fixture it
/// stays selectable even though it already has a result.
pub fn completed_fixtures<'a>(
    fixtures: &'a [Fixture],
    results: &[MatchResult],
    editing: Option<&EntityId>,
) -> Vec<&'a Fixture> {
    let scored: HashSet<&EntityId> = results.iter().map(|r| &r.fixture_id).collect();
    fixtures
        .iter()
        .filter(|f| f.status == FixtureStatus::Completed)
        .filter(|f| !scored.contains(&f.id) || editing == Some(&f.id))
        .collect()
}

pub fn find_fixture<'a>(fixtures: &'a [Fixture], id: &EntityId) -> Option<&'a Fixture> {
    fixtures.iter().find(|f| &f.id == id)
}

pub fn team_name<'a>(teams: &'a [Team], id: Option<&EntityId>) -> Option<&'a str> {
    let id = id?;
    teams
        .iter()
        .find(|t| &t.id == id)
        .map(|t| t.name.as_str())
}

/// "Home vs Away", falling back to embedded names, then to "TBD".
pub fn fixture_label(fixture: &Fixture, teams: &[Team]) -> String {
    let home = team_name(teams, fixture.home_team_id.as_ref())
        .or(fixture.home_team_name.as_deref())
        .unwrap_or("TBD");
    let away = team_name(teams, fixture.away_team_id.as_ref())
        .or(fixture.away_team_name.as_deref())
        .unwrap_or("TBD");
    format!("{home} vs {away}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardCounts {
    pub leagues: usize,
    pub teams: usize,
    pub players: usize,
    pub scheduled_fixtures: usize,
    pub results: usize,
}

impl DashboardCounts {
    pub fn compute(
        leagues: usize,
        teams: &[Team],
        players: &[Player],
        fixtures: &[Fixture],
        results: &[MatchResult],
    ) -> Self {
        Self {
            leagues,
            teams: teams.len(),
            players: players.len(),
            scheduled_fixtures: fixtures
                .iter()
                .filter(|f| f.status == FixtureStatus::Scheduled)
                .count(),
            results: results.len(),
        }
    }
}
