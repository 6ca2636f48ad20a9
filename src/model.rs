use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Canonical identifier. The API hands out numeric and string ids
/// interchangeably, so both are kept as their text form and compared as such.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for EntityId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Coach,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "COACH" => Some(Role::Coach),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Coach => "COACH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixtureStatus {
    Scheduled,
    Completed,
    Postponed,
    Cancelled,
    Other(String),
}

impl FixtureStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scheduled" => FixtureStatus::Scheduled,
            "completed" => FixtureStatus::Completed,
            "postponed" => FixtureStatus::Postponed,
            "cancelled" | "canceled" => FixtureStatus::Cancelled,
            _ => FixtureStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            FixtureStatus::Scheduled => "Scheduled",
            FixtureStatus::Completed => "Completed",
            FixtureStatus::Postponed => "Postponed",
            FixtureStatus::Cancelled => "Cancelled",
            FixtureStatus::Other(raw) => raw.as_str(),
        }
    }

    /// Statuses an administrator can pick in the status cycle.
    pub fn next(&self) -> Self {
        match self {
            FixtureStatus::Scheduled => FixtureStatus::Completed,
            FixtureStatus::Completed => FixtureStatus::Postponed,
            FixtureStatus::Postponed => FixtureStatus::Cancelled,
            FixtureStatus::Cancelled | FixtureStatus::Other(_) => FixtureStatus::Scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: EntityId,
    pub name: String,
    pub season: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: EntityId,
    pub name: String,
    pub league_id: Option<EntityId>,
    pub coach_id: Option<EntityId>,
    // Embedded display names when the API joins them in.
    pub league_name: Option<String>,
    pub coach_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub team_id: Option<EntityId>,
    pub position: Option<String>,
    pub jersey_number: Option<u32>,
}

impl Player {
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: EntityId,
    pub league_id: Option<EntityId>,
    pub home_team_id: Option<EntityId>,
    pub away_team_id: Option<EntityId>,
    pub venue_id: Option<EntityId>,
    pub referee_id: Option<EntityId>,
    pub match_date: Option<NaiveDateTime>,
    pub status: FixtureStatus,
    pub home_team_name: Option<String>,
    pub away_team_name: Option<String>,
    pub venue_name: Option<String>,
}

impl Fixture {
    pub fn involves(&self, team_id: &EntityId) -> bool {
        self.home_team_id.as_ref() == Some(team_id) || self.away_team_id.as_ref() == Some(team_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Falls back to the fixture id when the API does not give results their own id.
    pub id: EntityId,
    pub fixture_id: EntityId,
    pub home_score: u32,
    pub away_score: u32,
    pub recorded_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referee {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub experience: Option<u32>,
}

impl Referee {
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: EntityId,
    pub name: String,
    pub location: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Option<Role>,
    pub team_id: Option<EntityId>,
}

impl User {
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

fn full_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim()).trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeagueDraft {
    pub name: String,
    pub season: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamDraft {
    pub name: String,
    pub league_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerDraft {
    pub first_name: String,
    pub last_name: String,
    pub team_id: Option<EntityId>,
    pub position: Option<String>,
    pub jersey_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDraft {
    pub league_id: Option<EntityId>,
    pub home_team_id: EntityId,
    pub away_team_id: EntityId,
    pub venue_id: EntityId,
    pub referee_id: Option<EntityId>,
    pub match_date: NaiveDateTime,
    pub status: FixtureStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDraft {
    pub fixture_id: EntityId,
    pub home_score: u32,
    pub away_score: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefereeDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub experience: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VenueDraft {
    pub name: String,
    pub location: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub password: Option<String>,
}
