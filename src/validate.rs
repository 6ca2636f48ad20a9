//! Client-side checks run before any write is sent. A failed check never
//! reaches the network.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::derive;
use crate::error::ApiError;
use crate::model::{
    EntityId, Fixture, FixtureDraft, FixtureStatus, League, LeagueDraft, PlayerDraft, RefereeDraft,
    ResultDraft, Role, Team, TeamDraft, User, UserDraft, VenueDraft,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("All required fields must be filled")]
    MissingFixtureFields,
    #[error("Home team and away team must be different")]
    SameTeams,
    #[error("Home and Away teams must be in the same league")]
    LeagueMismatch { home: EntityId, away: EntityId },
    #[error("Please provide both date and time")]
    MissingDateTime,
    #[error("Invalid date or time format. Please check your inputs")]
    InvalidDateTime,
    #[error("Invalid date for {0}, expected YYYY-MM-DD")]
    InvalidDate(&'static str),
    #[error("End date must not be before the start date")]
    DateOrder,
    #[error("{0} must be a whole number")]
    InvalidNumber(&'static str),
    #[error("Fixture ID is missing. Cannot save result")]
    MissingFixture,
    #[error("Results can only be recorded for completed fixtures")]
    FixtureNotCompleted,
    #[error("Email address looks invalid")]
    InvalidEmail,
    #[error("Password is required for new users")]
    PasswordRequired,
    #[error("Unknown role {0}")]
    UnknownRole(String),
    #[error("You cannot delete your own account")]
    SelfDelete,
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// Outcome of comparing the leagues of a fixture's two teams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeagueCheck {
    Same(EntityId),
    Mismatch { home: EntityId, away: EntityId },
    /// Only one side resolved; the fixture takes that league.
    Partial(EntityId),
    Unresolved,
}

impl LeagueCheck {
    pub fn is_blocking(&self) -> bool {
        matches!(self, LeagueCheck::Mismatch { .. })
    }

    /// League the fixture is assigned to, home side first.
    pub fn league(&self) -> Option<&EntityId> {
        match self {
            LeagueCheck::Same(id) | LeagueCheck::Partial(id) => Some(id),
            LeagueCheck::Mismatch { home, .. } => Some(home),
            LeagueCheck::Unresolved => None,
        }
    }

    pub fn warning(&self, leagues: &[League]) -> Option<String> {
        let LeagueCheck::Mismatch { home, away } = self else {
            return None;
        };
        let home_name = league_name(leagues, home);
        let away_name = league_name(leagues, away);
        Some(format!(
            "Cross-league fixture between teams from different leagues: {home_name} vs {away_name}. \
             The fixture would be assigned to the {home_name} league."
        ))
    }
}

pub fn league_name<'a>(leagues: &'a [League], id: &EntityId) -> &'a str {
    leagues
        .iter()
        .find(|l| &l.id == id)
        .map(|l| l.name.as_str())
        .unwrap_or("Unknown League")
}

/// Unresolvable leagues do not block; only two known, different leagues do.
pub fn check_fixture_leagues(home: &EntityId, away: &EntityId, teams: &[Team]) -> LeagueCheck {
    let league_of = |id: &EntityId| {
        teams
            .iter()
            .find(|t| &t.id == id)
            .and_then(|t| t.league_id.clone())
    };
    match (league_of(home), league_of(away)) {
        (Some(h), Some(a)) if h == a => LeagueCheck::Same(h),
        (Some(h), Some(a)) => LeagueCheck::Mismatch { home: h, away: a },
        (Some(only), None) | (None, Some(only)) => LeagueCheck::Partial(only),
        (None, None) => LeagueCheck::Unresolved,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureInput {
    pub home_team_id: String,
    pub away_team_id: String,
    pub venue_id: String,
    pub referee_id: String,
    pub date: String,
    pub time: String,
    pub status: String,
}

pub fn validate_fixture(input: &FixtureInput, teams: &[Team]) -> Result<FixtureDraft, ValidationError> {
    let home = EntityId::new(input.home_team_id.as_str());
    let away = EntityId::new(input.away_team_id.as_str());
    let venue = EntityId::new(input.venue_id.as_str());
    let (Some(home), Some(away), Some(venue)) = (home, away, venue) else {
        return Err(ValidationError::MissingFixtureFields);
    };
    if input.date.trim().is_empty() || input.time.trim().is_empty() {
        return Err(ValidationError::MissingDateTime);
    }
    if home == away {
        return Err(ValidationError::SameTeams);
    }
    let check = check_fixture_leagues(&home, &away, teams);
    if let LeagueCheck::Mismatch { home, away } = check {
        return Err(ValidationError::LeagueMismatch { home, away });
    }
    let match_date = parse_date_time(&input.date, &input.time)?;
    let status = if input.status.trim().is_empty() {
        FixtureStatus::Scheduled
    } else {
        FixtureStatus::parse(&input.status)
    };
    Ok(FixtureDraft {
        league_id: check.league().cloned(),
        home_team_id: home,
        away_team_id: away,
        venue_id: venue,
        referee_id: EntityId::new(input.referee_id.as_str()),
        match_date,
        status,
    })
}

pub fn parse_date_time(date: &str, time: &str) -> Result<NaiveDateTime, ValidationError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDateTime)?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidDateTime)?;
    Ok(date.and_time(time))
}

pub fn validate_result(
    fixture_id: &str,
    home_score: &str,
    away_score: &str,
    fixtures: &[Fixture],
) -> Result<ResultDraft, ValidationError> {
    let fixture_id = EntityId::new(fixture_id).ok_or(ValidationError::MissingFixture)?;
    let home_score = required_number(home_score, "Home score")?;
    let away_score = required_number(away_score, "Away score")?;
    match derive::find_fixture(fixtures, &fixture_id) {
        Some(f) if f.status == FixtureStatus::Completed => {}
        _ => return Err(ValidationError::FixtureNotCompleted),
    }
    Ok(ResultDraft {
        fixture_id,
        home_score,
        away_score,
    })
}

pub fn validate_league(
    name: &str,
    season: &str,
    start: &str,
    end: &str,
) -> Result<LeagueDraft, ValidationError> {
    let name = required(name, "League name")?;
    let start_date = optional_date(start, "start date")?;
    let end_date = optional_date(end, "end date")?;
    if let (Some(s), Some(e)) = (start_date, end_date) {
        if e < s {
            return Err(ValidationError::DateOrder);
        }
    }
    Ok(LeagueDraft {
        name,
        season: optional(season),
        start_date,
        end_date,
    })
}

pub fn validate_team(name: &str, league_id: &str, creating: bool) -> Result<TeamDraft, ValidationError> {
    let name = required(name, "Team name")?;
    let league_id = EntityId::new(league_id);
    if creating && league_id.is_none() {
        return Err(ValidationError::Required("League"));
    }
    Ok(TeamDraft { name, league_id })
}

pub fn validate_player(
    first_name: &str,
    last_name: &str,
    team_id: &str,
    position: &str,
    jersey_number: &str,
) -> Result<PlayerDraft, ValidationError> {
    Ok(PlayerDraft {
        first_name: required(first_name, "First name")?,
        last_name: required(last_name, "Last name")?,
        team_id: EntityId::new(team_id),
        position: optional(position),
        jersey_number: optional_number(jersey_number, "Jersey number")?,
    })
}

pub fn validate_referee(
    first_name: &str,
    last_name: &str,
    email: &str,
    phone: &str,
    experience: &str,
) -> Result<RefereeDraft, ValidationError> {
    let email = optional(email);
    if email.as_deref().is_some_and(|e| !looks_like_email(e)) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(RefereeDraft {
        first_name: required(first_name, "First name")?,
        last_name: required(last_name, "Last name")?,
        email,
        phone: optional(phone),
        experience: optional_number(experience, "Experience")?,
    })
}

pub fn validate_venue(
    name: &str,
    location: &str,
    city: &str,
    country: &str,
    capacity: &str,
) -> Result<VenueDraft, ValidationError> {
    Ok(VenueDraft {
        name: required(name, "Venue name")?,
        location: optional(location),
        city: optional(city),
        country: optional(country),
        capacity: optional_number(capacity, "Capacity")?,
    })
}

pub fn validate_user(
    first_name: &str,
    last_name: &str,
    email: &str,
    role: &str,
    password: &str,
    creating: bool,
) -> Result<UserDraft, ValidationError> {
    let first_name = required(first_name, "First name")?;
    let last_name = required(last_name, "Last name")?;
    let email = required(email, "Email")?;
    if !looks_like_email(&email) {
        return Err(ValidationError::InvalidEmail);
    }
    if creating && password.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    let role = if role.trim().is_empty() {
        Role::Coach
    } else {
        Role::parse(role).ok_or_else(|| ValidationError::UnknownRole(role.trim().to_string()))?
    };
    Ok(UserDraft {
        first_name,
        last_name,
        email,
        role,
        password: (!password.is_empty()).then(|| password.to_string()),
    })
}

pub fn check_user_delete(current: &User, target: &EntityId) -> Result<(), ValidationError> {
    if &current.id == target {
        return Err(ValidationError::SelfDelete);
    }
    Ok(())
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(trimmed.to_string())
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn required_number(value: &str, field: &'static str) -> Result<u32, ValidationError> {
    optional_number(value, field)?.ok_or(ValidationError::Required(field))
}

fn optional_number(value: &str, field: &'static str) -> Result<Option<u32>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ValidationError::InvalidNumber(field))
}

fn optional_date(value: &str, field: &'static str) -> Result<Option<NaiveDate>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ValidationError::InvalidDate(field))
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: &str, league: Option<&str>) -> Team {
        Team {
            id: EntityId::from(id),
            name: id.to_string(),
            league_id: league.map(EntityId::from),
            coach_id: None,
            league_name: None,
            coach_name: None,
        }
    }

    fn input(home: &str, away: &str) -> FixtureInput {
        FixtureInput {
            home_team_id: home.into(),
            away_team_id: away.into(),
            venue_id: "v1".into(),
            referee_id: String::new(),
            date: "2025-05-10".into(),
            time: "09:30".into(),
            status: "Scheduled".into(),
        }
    }

    #[test]
    fn guard_cases() {
        let teams = vec![team("1", Some("A")), team("2", Some("A")), team("3", Some("B")), team("4", None)];
        let id = EntityId::from;
        assert_eq!(check_fixture_leagues(&id("1"), &id("2"), &teams), LeagueCheck::Same(id("A")));
        assert!(check_fixture_leagues(&id("1"), &id("3"), &teams).is_blocking());
        assert_eq!(check_fixture_leagues(&id("4"), &id("3"), &teams), LeagueCheck::Partial(id("B")));
        assert_eq!(check_fixture_leagues(&id("4"), &id("9"), &teams), LeagueCheck::Unresolved);
    }

    #[test]
    fn fixture_takes_the_resolved_league() {
        let teams = vec![team("1", None), team("2", Some("L2"))];
        let draft = validate_fixture(&input("1", "2"), &teams).unwrap();
        assert_eq!(draft.league_id, Some(EntityId::from("L2")));
        assert_eq!(draft.referee_id, None);
        assert_eq!(draft.match_date.format("%Y-%m-%d %H:%M").to_string(), "2025-05-10 09:30");
    }

    #[test]
    fn fixture_rejections() {
        let teams = vec![team("1", Some("A")), team("2", Some("B")), team("3", Some("A"))];
        assert_eq!(validate_fixture(&input("1", "1"), &teams), Err(ValidationError::SameTeams));
        assert!(matches!(
            validate_fixture(&input("1", "2"), &teams),
            Err(ValidationError::LeagueMismatch { .. })
        ));
        assert_eq!(
            validate_fixture(&input("", "2"), &teams),
            Err(ValidationError::MissingFixtureFields)
        );
        let mut bad_time = input("1", "3");
        bad_time.time = "25:99".into();
        assert_eq!(validate_fixture(&bad_time, &teams), Err(ValidationError::InvalidDateTime));
    }

    #[test]
    fn results_need_a_completed_fixture_and_whole_scores() {
        let fixture = |status| Fixture {
            id: EntityId::from("f"),
            league_id: None,
            home_team_id: None,
            away_team_id: None,
            venue_id: None,
            referee_id: None,
            match_date: None,
            status,
            home_team_name: None,
            away_team_name: None,
            venue_name: None,
        };
        let done = vec![fixture(FixtureStatus::Completed)];
        let pending = vec![fixture(FixtureStatus::Scheduled)];
        assert!(validate_result("f", "2", "0", &done).is_ok());
        assert_eq!(
            validate_result("f", "2", "0", &pending),
            Err(ValidationError::FixtureNotCompleted)
        );
        assert_eq!(
            validate_result("f", "-1", "0", &done),
            Err(ValidationError::InvalidNumber("Home score"))
        );
        assert_eq!(validate_result("", "1", "0", &done), Err(ValidationError::MissingFixture));
    }

    #[test]
    fn new_users_need_a_password() {
        assert_eq!(
            validate_user("Sam", "Reed", "sam@example.com", "COACH", "", true),
            Err(ValidationError::PasswordRequired)
        );
        let draft = validate_user("Sam", "Reed", "sam@example.com", "admin", "", false).unwrap();
        assert_eq!(draft.role, Role::Admin);
        assert_eq!(draft.password, None);
    }

    #[test]
    fn league_dates_must_be_ordered() {
        assert_eq!(
            validate_league("Spring", "", "2025-06-01", "2025-03-01"),
            Err(ValidationError::DateOrder)
        );
        assert!(validate_league("Spring", "2025", "2025-03-01", "").is_ok());
    }
}
